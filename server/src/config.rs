use std::env;

use crate::error::AppError;

/// Server configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_address: String,
    /// Minimum time between two feedings of the same pet, 0 = unlimited
    pub feed_interval_secs: u64,
    /// Sent to the device for pets without their own dispense time
    pub default_dispense_ms: Option<u32>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_url: "sqlite:petfeeder.db".into(),
            bind_address: "0.0.0.0:5000".into(),
            feed_interval_secs: 0,
            default_dispense_ms: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let defaults = Self::default();
        Ok(Self {
            database_url: env::var("DATABASE_URL").unwrap_or(defaults.database_url),
            bind_address: env::var("BIND_ADDRESS").unwrap_or(defaults.bind_address),
            feed_interval_secs: match env::var("FEED_INTERVAL_SECS") {
                Ok(v) => parse("FEED_INTERVAL_SECS", &v)?,
                Err(_) => defaults.feed_interval_secs,
            },
            default_dispense_ms: match env::var("DEFAULT_DISPENSE_MS") {
                Ok(v) => Some(parse("DEFAULT_DISPENSE_MS", &v)?),
                Err(_) => defaults.default_dispense_ms,
            },
        })
    }
}

fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, AppError> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::InvalidConfig(format!("{}={:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_rejects_garbage() {
        assert!(parse::<u64>("FEED_INTERVAL_SECS", "soon").is_err());
        assert_eq!(parse::<u64>("FEED_INTERVAL_SECS", " 3600 ").unwrap(), 3600);
    }
}
