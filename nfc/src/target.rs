//! Typed results of PN532 commands.

use core::fmt::Write;

use heapless::{String, Vec};

use crate::error::Error;

/// Longest NFCID1 for ISO14443A cards (double size UID).
pub const MAX_UID_LEN: usize = 7;

/// Card identifier, fixed capacity so it can never overflow.
pub type Uid = Vec<u8, MAX_UID_LEN>;

/// Uppercase hex rendering of a [`Uid`], no separators.
pub type UidHex = String<{ MAX_UID_LEN * 2 }>;

/// Baud rate / modulation byte (BrTy) of InListPassiveTarget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CardType {
    /// 106 kbps type A (ISO/IEC 14443 Type A, MIFARE, NTAG)
    Iso14443a = 0x00,
}

impl CardType {
    pub const fn byte(self) -> u8 {
        self as u8
    }
}

/// Response of GetFirmwareVersion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirmwareVersion {
    /// 0x32 for the PN532
    pub ic: u8,
    pub version: u8,
    pub revision: u8,
    /// Bit field of supported card families.
    pub support: u8,
}

impl FirmwareVersion {
    /// Parse `[03, IC, Ver, Rev, Support]`.
    pub(crate) fn from_payload(payload: &[u8]) -> Result<Self, Error> {
        if payload.len() < 5 {
            return Err(Error::Truncated {
                needed: 5,
                len: payload.len(),
            });
        }
        Ok(Self {
            ic: payload[1],
            version: payload[2],
            revision: payload[3],
            support: payload[4],
        })
    }

    /// `IC | Ver | Rev | Support`, big endian.
    pub fn as_u32(&self) -> u32 {
        u32::from_be_bytes([self.ic, self.version, self.revision, self.support])
    }
}

impl From<FirmwareVersion> for u32 {
    fn from(v: FirmwareVersion) -> Self {
        v.as_u32()
    }
}

/// Card family guessed from SENS_RES (ATQA) and SEL_RES (SAK).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
    MifareClassic1K,
    MifareClassic4K,
    Ntag,
    Unknown,
}

/// One target found by InListPassiveTarget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PassiveTarget {
    /// Logical number the PN532 assigned (Tg).
    pub target_number: u8,
    /// ATQA
    pub sens_res: [u8; 2],
    /// SAK
    pub sel_res: u8,
    pub uid: Uid,
}

// payload: 4B NbTg Tg SENS_RES(2) SEL_RES NFCIDLength NFCID...
const RESPONSE_CODE: usize = 0;
const TARGET_COUNT: usize = 1;
const TARGET_NUMBER: usize = 2;
const SENS_RES: usize = 3;
const SEL_RES: usize = 5;
const UID_LEN: usize = 6;
const UID_START: usize = 7;

impl PassiveTarget {
    /// Parse an InListPassiveTarget payload for a single type A target.
    ///
    /// `Ok(None)` when the response code is not `expected_code` or the target
    /// count is not exactly one.
    pub(crate) fn from_payload(payload: &[u8], expected_code: u8) -> Result<Option<Self>, Error> {
        if payload.len() <= TARGET_COUNT
            || payload[RESPONSE_CODE] != expected_code
            || payload[TARGET_COUNT] != 1
        {
            return Ok(None);
        }
        if payload.len() <= UID_LEN {
            return Err(Error::Truncated {
                needed: UID_LEN + 1,
                len: payload.len(),
            });
        }

        let uid_len = usize::from(payload[UID_LEN]);
        if uid_len > MAX_UID_LEN {
            return Err(Error::BufferTooSmall {
                needed: uid_len,
                capacity: MAX_UID_LEN,
            });
        }
        let uid_end = UID_START + uid_len;
        if payload.len() < uid_end {
            return Err(Error::Truncated {
                needed: uid_end,
                len: payload.len(),
            });
        }

        let mut uid = Uid::new();
        // uid_len <= MAX_UID_LEN
        let _ = uid.extend_from_slice(&payload[UID_START..uid_end]);

        Ok(Some(Self {
            target_number: payload[TARGET_NUMBER],
            sens_res: [payload[SENS_RES], payload[SENS_RES + 1]],
            sel_res: payload[SEL_RES],
            uid,
        }))
    }

    pub fn uid_len(&self) -> usize {
        self.uid.len()
    }

    pub fn uid_hex(&self) -> UidHex {
        uid_hex(&self.uid)
    }

    pub fn kind(&self) -> TagKind {
        match (self.sens_res[1], self.sel_res) {
            (0x44, 0x00) => TagKind::Ntag,
            (0x04, 0x08) | (0x44, 0x08) => TagKind::MifareClassic1K,
            (0x04, 0x18) | (0x02, 0x18) => TagKind::MifareClassic4K,
            _ => TagKind::Unknown,
        }
    }
}

/// Render `uid` as uppercase hex.
pub fn uid_hex(uid: &[u8]) -> UidHex {
    let mut out = UidHex::new();
    for byte in uid.iter().take(MAX_UID_LEN) {
        // two chars per byte always fit
        let _ = write!(out, "{:02X}", byte);
    }
    out
}
