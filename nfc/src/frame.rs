//! Normal information frame layout and checksum arithmetic.

pub const PREAMBLE: u8 = 0x00;
pub const START_CODE: [u8; 2] = [0x00, 0xFF];
pub const POSTAMBLE: u8 = 0x00;

pub const HOST_TO_PN532: u8 = 0xD4;
pub const PN532_TO_HOST: u8 = 0xD5;

/// `LEN` counts the TFI byte, so the data part holds at most 254 bytes.
pub const MAX_PAYLOAD_LEN: usize = 254;

/// Preamble, start code, LEN, LCS, TFI, DCS, postamble.
pub const FRAME_OVERHEAD: usize = 8;

pub const MAX_FRAME_LEN: usize = MAX_PAYLOAD_LEN + FRAME_OVERHEAD;

/// ACK frame, no checksum.
pub const ACK_FRAME: [u8; 6] = [0x00, 0x00, 0xFF, 0x00, 0xFF, 0x00];

/// Frame identifier (TFI) byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Direction {
    HostToDevice = HOST_TO_PN532,
    DeviceToHost = PN532_TO_HOST,
}

impl Direction {
    pub const fn byte(self) -> u8 {
        self as u8
    }

    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            HOST_TO_PN532 => Some(Direction::HostToDevice),
            PN532_TO_HOST => Some(Direction::DeviceToHost),
            _ => None,
        }
    }
}

/// Two's complement of `len`, so that `len + lcs == 0 (mod 256)`.
pub const fn length_checksum(len: u8) -> u8 {
    (!len).wrapping_add(1)
}

/// Wrapping byte sum seeded with `seed`.
pub fn wrapping_sum(seed: u8, bytes: &[u8]) -> u8 {
    bytes.iter().fold(seed, |acc, b| acc.wrapping_add(*b))
}

/// DCS for a frame: `direction + sum(data) + dcs == 0 (mod 256)`.
pub fn data_checksum(direction: Direction, data: &[u8]) -> u8 {
    length_checksum(wrapping_sum(direction.byte(), data))
}
