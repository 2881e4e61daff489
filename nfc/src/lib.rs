//! PN532 NFC controller driver (SPI).
//!
//! The PN532 talks over SPI mode 0, LSB first, with the following pins:
//! - MOSI, MISO, SCLK - Standard SPI
//! - NSS - Chip select (active low, driven by this driver)
//!
//! Every SPI transaction starts with one bus command byte:
//! - `0x02` status read (bit 0 set = response ready)
//! - `0x01` data write (followed by a host frame)
//! - `0x03` data read (followed by an ACK or response frame)
//!
//! Frames look like:
//! `[00] [00 FF] [LEN] [LCS] [TFI] [DATA...] [DCS] [00]`
//!
//! A command exchange is: write the command frame, wait for ready and read
//! the 6 byte ACK, wait for ready again and read the response frame.
//!
//! ```ignore
//! let mut pn532 = Pn532::new(spi, cs, delay, StdClock::new(), Config::default());
//! pn532.init()?;
//! pn532.configure_security_module()?;
//! if let Some(target) = pn532.enumerate_passive_target(CardType::Iso14443a)? {
//!     log::info!("card {}", target.uid_hex());
//! }
//! ```

#![cfg_attr(not(any(test, feature = "std")), no_std)]

pub mod ack;
pub mod bus;
pub mod config;
pub mod decoder;
pub mod encoder;
pub mod error;
pub mod frame;
pub mod ready;
pub mod session;
#[cfg(any(test, feature = "sim"))]
pub mod sim;
pub mod target;

pub use bus::{BusLink, Clock};
#[cfg(feature = "std")]
pub use bus::StdClock;
pub use config::{AckPolicy, Config};
pub use error::{ChecksumField, Error};
pub use frame::Direction;
pub use session::Pn532;
pub use target::{CardType, FirmwareVersion, PassiveTarget, TagKind, Uid, MAX_UID_LEN};

/// Result type alias for driver operations.
pub type Result<T> = core::result::Result<T, Error>;
