//! Error types for the feeder.

use embedded_hal::digital;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FeederError {
    /// PN532 driver error.
    #[error("NFC error: {0}")]
    Nfc(#[from] petfeeder_nfc::Error),

    /// HTTP transport error talking to the authorization server.
    #[cfg(feature = "http")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Any other HTTP stack, e.g. the ESP-IDF client on the device.
    #[error("transport error: {0}")]
    Transport(String),

    /// The server answered with a status that carries no decision.
    #[error("unexpected HTTP status {0}")]
    UnexpectedStatus(u16),

    /// JSON encoding or decoding of the authorization exchange failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading the identifier bridge failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Driving a stepper coil failed.
    #[error("GPIO error: {0:?}")]
    Pin(digital::ErrorKind),

    /// Invalid setting.
    #[error("config error: {0}")]
    Config(String),
}

impl FeederError {
    pub(crate) fn pin<E: digital::Error>(e: E) -> Self {
        FeederError::Pin(e.kind())
    }
}

pub type Result<T> = std::result::Result<T, FeederError>;
