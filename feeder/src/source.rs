//! Where card identifiers come from.

use std::io::Read;

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiBus;
use log::{info, warn};
use petfeeder_nfc::{CardType, Clock, Error as NfcError, FirmwareVersion, Pn532};

use crate::bridge::LineBridge;
use crate::error::Result;

/// Yields the identifier of a card in range, if any.
pub trait TagSource {
    fn next_tag(&mut self) -> Result<Option<String>>;
}

/// PN532 polled directly over SPI.
pub struct NfcReader<SPI, CS, D, C> {
    pn532: Pn532<SPI, CS, D, C>,
    card_type: CardType,
}

impl<SPI, CS, D, C> NfcReader<SPI, CS, D, C>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    pub fn new(pn532: Pn532<SPI, CS, D, C>) -> Self {
        Self {
            pn532,
            card_type: CardType::Iso14443a,
        }
    }

    /// Wake the chip, check it answers and configure the SAM.
    pub fn start(&mut self) -> Result<FirmwareVersion> {
        self.pn532.init()?;
        let version = self.pn532.firmware_version()?;
        info!(
            "Found chip PN5{:02X}, firmware {}.{}",
            version.ic, version.version, version.revision
        );
        self.pn532.configure_security_module()?;
        Ok(version)
    }

    pub fn session(&mut self) -> &mut Pn532<SPI, CS, D, C> {
        &mut self.pn532
    }
}

impl<SPI, CS, D, C> TagSource for NfcReader<SPI, CS, D, C>
where
    SPI: SpiBus,
    CS: OutputPin,
    D: DelayNs,
    C: Clock,
{
    /// Protocol errors count as "no card this round"; bus faults propagate.
    fn next_tag(&mut self) -> Result<Option<String>> {
        match self.pn532.enumerate_passive_target(self.card_type) {
            Ok(Some(target)) => Ok(Some(target.uid_hex().to_string())),
            Ok(None) | Err(NfcError::Timeout(_)) => Ok(None),
            Err(e) if e.is_bus_fault() => Err(e.into()),
            Err(e) => {
                warn!("Discarding PN532 response: {}", e);
                Ok(None)
            }
        }
    }
}

impl<R: Read> TagSource for LineBridge<R> {
    fn next_tag(&mut self) -> Result<Option<String>> {
        self.next_identifier()
    }
}
