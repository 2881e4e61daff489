//! PN532 driver errors.

use embedded_hal::digital;
use embedded_hal::spi;

/// Which checksum of a frame failed to verify.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChecksumField {
    /// `LEN + LCS` did not sum to zero.
    Length,
    /// `TFI + DATA + DCS` did not sum to zero.
    Data,
}

impl core::fmt::Display for ChecksumField {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ChecksumField::Length => f.write_str("length"),
            ChecksumField::Data => f.write_str("data"),
        }
    }
}

/// PN532 errors
///
/// None of these are retried by the driver. Chip select is released before
/// any of them is returned, so the bus stays usable for the next attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// The SPI peripheral reported a fault.
    #[error("SPI bus error: {0:?}")]
    Spi(spi::ErrorKind),

    /// Driving the chip-select line failed.
    #[error("chip select error: {0:?}")]
    ChipSelect(digital::ErrorKind),

    /// The ready flag was not observed within the given number of ms.
    #[error("PN532 not ready after {0} ms")]
    Timeout(u32),

    /// Frame corruption.
    #[error("{0} checksum mismatch")]
    ChecksumMismatch(ChecksumField),

    /// The frame identifier byte was not the expected direction.
    #[error("unexpected frame direction byte 0x{0:02X}")]
    UnexpectedDirection(u8),

    /// Preamble and start code were not `00 00 FF` (strict framing only).
    #[error("invalid start of frame {0:02X?}")]
    InvalidStartCode([u8; 3]),

    /// The frame does not fit into the capacity provided for it.
    #[error("frame needs {needed} bytes, capacity is {capacity}")]
    BufferTooSmall { needed: usize, capacity: usize },

    /// The ACK frame did not match `00 00 FF 00 FF 00`.
    #[error("acknowledgment frame mismatch")]
    HandshakeMismatch,

    /// A response payload ended before a field the command defines.
    #[error("response payload truncated: need {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },
}

impl Error {
    pub(crate) fn spi<E: spi::Error>(e: E) -> Self {
        Error::Spi(e.kind())
    }

    pub(crate) fn pin<E: digital::Error>(e: E) -> Self {
        Error::ChipSelect(e.kind())
    }

    /// True for faults of the physical link rather than the protocol.
    pub fn is_bus_fault(&self) -> bool {
        matches!(self, Error::Spi(_) | Error::ChipSelect(_))
    }
}
