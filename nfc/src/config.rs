//! Session configuration.

/// What to do when the ACK frame is missing or malformed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AckPolicy {
    /// Log a warning and read the response anyway.
    #[default]
    Lenient,
    /// Abort the exchange with `HandshakeMismatch` or `Timeout`.
    Strict,
}

/// Timing and validation settings for a [`crate::Pn532`] session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub ack_policy: AckPolicy,
    /// Wait for the ACK frame, in ms.
    pub ack_timeout_ms: u32,
    /// Wait for a response frame, in ms.
    pub response_timeout_ms: u32,
    /// Sleep between status probes, in ms.
    pub poll_interval_ms: u32,
    /// Delay after asserting NSS for data transactions, in ms.
    pub settle_delay_ms: u32,
    /// Check the preamble and start code of responses.
    pub strict_framing: bool,
    /// Reverse bits in software for MSB-first-only SPI peripherals.
    pub reverse_bits: bool,
}

impl Config {
    pub const DEFAULT_ACK_TIMEOUT_MS: u32 = 10;
    pub const DEFAULT_RESPONSE_TIMEOUT_MS: u32 = 1000;

    pub fn strict() -> Self {
        Self {
            ack_policy: AckPolicy::Strict,
            strict_framing: true,
            ..Self::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ack_policy: AckPolicy::Lenient,
            ack_timeout_ms: Self::DEFAULT_ACK_TIMEOUT_MS,
            response_timeout_ms: Self::DEFAULT_RESPONSE_TIMEOUT_MS,
            poll_interval_ms: 10,
            settle_delay_ms: 2,
            strict_framing: false,
            reverse_bits: false,
        }
    }
}
