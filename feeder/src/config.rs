//! Feeder configuration from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use log::warn;

use crate::access::DispenseLimits;
use crate::error::{FeederError, Result};

#[derive(Debug, Clone)]
pub struct FeederConfig {
    /// Base URL of the authorization server
    pub server_url: String,
    /// HTTP request timeout
    pub request_timeout: Duration,
    /// Pause between reader polls
    pub poll_interval: Duration,
    /// The same tag seen again within this window is ignored
    pub repeat_window: Duration,
    pub dispense: DispenseLimits,
    /// Time per stepper half step
    pub step_interval_ms: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:5000".into(),
            request_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(250),
            repeat_window: Duration::from_secs(10),
            dispense: DispenseLimits::default(),
            step_interval_ms: 2,
        }
    }
}

impl FeederConfig {
    /// Read `PETFEEDER_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build from any variable lookup, then validate.
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let env_or = |key: &str, default: u64| parse_or(key, lookup(key), default);
        let env_or_u32 = |key: &str, default: u32| parse_or(key, lookup(key), default);
        let config = Self {
            server_url: lookup("PETFEEDER_SERVER_URL").unwrap_or(defaults.server_url),
            request_timeout: Duration::from_millis(env_or(
                "PETFEEDER_REQUEST_TIMEOUT_MS",
                defaults.request_timeout.as_millis() as u64,
            )),
            poll_interval: Duration::from_millis(env_or(
                "PETFEEDER_POLL_INTERVAL_MS",
                defaults.poll_interval.as_millis() as u64,
            )),
            repeat_window: Duration::from_millis(env_or(
                "PETFEEDER_REPEAT_WINDOW_MS",
                defaults.repeat_window.as_millis() as u64,
            )),
            dispense: DispenseLimits {
                min_ms: env_or_u32("PETFEEDER_DISPENSE_MIN_MS", defaults.dispense.min_ms),
                max_ms: env_or_u32("PETFEEDER_DISPENSE_MAX_MS", defaults.dispense.max_ms),
                default_ms: env_or_u32("PETFEEDER_DISPENSE_DEFAULT_MS", defaults.dispense.default_ms),
            },
            step_interval_ms: env_or_u32("PETFEEDER_STEP_INTERVAL_MS", defaults.step_interval_ms),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let limits = &self.dispense;
        if limits.min_ms > limits.max_ms {
            return Err(FeederError::Config(format!(
                "dispense minimum {} ms exceeds maximum {} ms",
                limits.min_ms, limits.max_ms
            )));
        }
        if self.step_interval_ms == 0 {
            return Err(FeederError::Config("step interval must be at least 1 ms".into()));
        }
        Ok(())
    }
}

fn parse_or<T: FromStr>(key: &str, value: Option<String>, default: T) -> T {
    match value {
        Some(value) => value.trim().parse().unwrap_or_else(|_| {
            warn!("Ignoring invalid {}={:?}", key, value);
            default
        }),
        None => default,
    }
}
