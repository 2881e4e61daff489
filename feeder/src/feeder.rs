//! Feeder control loop: read tag, authorize, dispense.

use std::time::{Duration, Instant};

use log::{info, warn};

use crate::access::{Authorizer, DispenseLimits};
use crate::config::FeederConfig;
use crate::error::Result;
use crate::source::TagSource;
use crate::stepper::Actuator;

/// What one poll of the feeder did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// No tag in range.
    Idle,
    /// Same tag as last time, still within the repeat window.
    Repeat(String),
    Denied {
        uid: String,
        message: Option<String>,
    },
    Dispensed {
        uid: String,
        pet_name: Option<String>,
        duration: Duration,
    },
}

pub struct Feeder<S, A, M> {
    source: S,
    authorizer: A,
    actuator: M,
    limits: DispenseLimits,
    repeat_window: Duration,
    last_seen: Option<(String, Instant)>,
}

impl<S, A, M> Feeder<S, A, M>
where
    S: TagSource,
    A: Authorizer,
    M: Actuator,
{
    pub fn new(source: S, authorizer: A, actuator: M, limits: DispenseLimits, repeat_window: Duration) -> Self {
        Self {
            source,
            authorizer,
            actuator,
            limits,
            repeat_window,
            last_seen: None,
        }
    }

    pub fn from_config(source: S, authorizer: A, actuator: M, config: &FeederConfig) -> Self {
        Self::new(source, authorizer, actuator, config.dispense, config.repeat_window)
    }

    /// Handle at most one tag.
    pub fn poll(&mut self) -> Result<Outcome> {
        let uid = match self.source.next_tag()? {
            Some(uid) => uid,
            None => return Ok(Outcome::Idle),
        };

        let now = Instant::now();
        if let Some((last_uid, seen)) = &mut self.last_seen {
            if *last_uid == uid && now.duration_since(*seen) < self.repeat_window {
                // a tag resting on the reader keeps extending the window
                *seen = now;
                return Ok(Outcome::Repeat(uid));
            }
        }

        info!("Tag detected: {}", uid);
        let decision = self.authorizer.authorize(&uid)?;
        self.last_seen = Some((uid.clone(), now));

        if !decision.is_authorized() {
            warn!(
                "Access DENIED for {}: {}",
                uid,
                decision.message.as_deref().unwrap_or("no reason given")
            );
            return Ok(Outcome::Denied {
                uid,
                message: decision.message,
            });
        }

        let duration = self.limits.clamp(decision.dispense_ms);
        info!(
            "Access GRANTED for {} ({}), dispensing {:?}",
            uid,
            decision.pet_name.as_deref().unwrap_or("unnamed"),
            duration
        );
        self.actuator.dispense(duration)?;
        Ok(Outcome::Dispensed {
            uid,
            pet_name: decision.pet_name,
            duration,
        })
    }

    pub fn source(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn actuator(&self) -> &M {
        &self.actuator
    }
}
