//! Pet feeder device logic.
//!
//! A tag source (the PN532 reader, or a second microcontroller relaying UIDs
//! over UART) yields card identifiers. Each new identifier is sent to the
//! authorization server, and an authorized pet gets the dispenser turned for
//! the granted duration.
//!
//! Everything here is blocking and single threaded, like the NFC driver
//! underneath it.

pub mod access;
pub mod bridge;
pub mod config;
pub mod error;
pub mod feeder;
#[cfg(feature = "http")]
pub mod http;
pub mod source;
pub mod stepper;

pub use access::{AccessDecision, AccessStatus, Authorizer, DispenseLimits, StaticAuthorizer, TagReport};
pub use bridge::LineBridge;
pub use config::FeederConfig;
pub use error::FeederError;
pub use feeder::{Feeder, Outcome};
#[cfg(feature = "http")]
pub use http::HttpAuthorizer;
pub use source::{NfcReader, TagSource};
pub use stepper::{Actuator, Stepper};
