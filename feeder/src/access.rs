//! Authorization exchange with the pet registry.
//!
//! Request: `POST /tag` with `{"uid": "049A3C7F"}`.
//! Response (200 or 403): `{"status": "authorized" | "denied", ...}`.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Body reported to the server for each detected tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagReport {
    pub uid: String,
}

impl TagReport {
    pub fn new(uid: impl Into<String>) -> Self {
        Self { uid: uid.into() }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessStatus {
    Authorized,
    Denied,
}

/// Decision returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessDecision {
    pub status: AccessStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pet_name: Option<String>,
    /// Requested dispense time, clamped by the device.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dispense_ms: Option<u32>,
}

impl AccessDecision {
    pub fn authorized(pet_name: impl Into<String>, dispense_ms: Option<u32>) -> Self {
        Self {
            status: AccessStatus::Authorized,
            message: Some("Feeding allowed".into()),
            pet_name: Some(pet_name.into()),
            dispense_ms,
        }
    }

    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: AccessStatus::Denied,
            message: Some(message.into()),
            pet_name: None,
            dispense_ms: None,
        }
    }

    pub fn from_json(body: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(body)?)
    }

    pub fn is_authorized(&self) -> bool {
        self.status == AccessStatus::Authorized
    }
}

/// Bounds for how long one dispense may run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispenseLimits {
    pub min_ms: u32,
    pub max_ms: u32,
    /// Used when the server does not send a duration.
    pub default_ms: u32,
}

impl Default for DispenseLimits {
    fn default() -> Self {
        Self {
            min_ms: 500,
            max_ms: 10_000,
            default_ms: 2_000,
        }
    }
}

impl DispenseLimits {
    /// Never longer than `max_ms`, even when the bounds are inverted.
    pub fn clamp(&self, requested_ms: Option<u32>) -> Duration {
        let ms = requested_ms
            .unwrap_or(self.default_ms)
            .max(self.min_ms)
            .min(self.max_ms);
        Duration::from_millis(u64::from(ms))
    }
}

/// Decides whether an identifier may be fed.
pub trait Authorizer {
    fn authorize(&mut self, uid: &str) -> Result<AccessDecision>;
}

/// Fixed allow list, for offline operation and tests.
#[derive(Debug, Clone, Default)]
pub struct StaticAuthorizer {
    pets: HashMap<String, (String, Option<u32>)>,
}

impl StaticAuthorizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allow(mut self, uid: &str, pet_name: &str, dispense_ms: Option<u32>) -> Self {
        self.pets
            .insert(uid.to_ascii_uppercase(), (pet_name.to_string(), dispense_ms));
        self
    }
}

impl Authorizer for StaticAuthorizer {
    fn authorize(&mut self, uid: &str) -> Result<AccessDecision> {
        Ok(match self.pets.get(&uid.to_ascii_uppercase()) {
            Some((name, dispense_ms)) => AccessDecision::authorized(name.clone(), *dispense_ms),
            None => AccessDecision::denied("Pet not recognized"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_authorized_response() {
        let body = br#"{"status":"authorized","message":"Feeding allowed","pet_name":"Miso","dispense_ms":1500}"#;
        let decision = AccessDecision::from_json(body).unwrap();
        assert!(decision.is_authorized());
        assert_eq!(decision.pet_name.as_deref(), Some("Miso"));
        assert_eq!(decision.dispense_ms, Some(1500));
    }

    #[test]
    fn parses_denied_response_without_optional_fields() {
        let body = br#"{"status":"denied","message":"Pet not recognized"}"#;
        let decision = AccessDecision::from_json(body).unwrap();
        assert!(!decision.is_authorized());
        assert_eq!(decision.dispense_ms, None);
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(AccessDecision::from_json(br#"{"status":"maybe"}"#).is_err());
    }

    #[test]
    fn report_body() {
        let body = TagReport::new("049A3C7F").to_json().unwrap();
        assert_eq!(body, br#"{"uid":"049A3C7F"}"#);
    }

    #[test]
    fn dispense_duration_is_clamped() {
        let limits = DispenseLimits {
            min_ms: 500,
            max_ms: 5_000,
            default_ms: 2_000,
        };
        assert_eq!(limits.clamp(None), Duration::from_millis(2_000));
        assert_eq!(limits.clamp(Some(100)), Duration::from_millis(500));
        assert_eq!(limits.clamp(Some(60_000)), Duration::from_millis(5_000));
        assert_eq!(limits.clamp(Some(1_234)), Duration::from_millis(1_234));
    }

    #[test]
    fn inverted_bounds_cap_at_maximum() {
        let limits = DispenseLimits {
            min_ms: 5_000,
            max_ms: 1_000,
            default_ms: 2_000,
        };
        assert_eq!(limits.clamp(Some(2_000)), Duration::from_millis(1_000));
    }

    #[test]
    fn static_authorizer_matches_case_insensitively() {
        let mut auth = StaticAuthorizer::new().allow("049a3c7f", "Miso", None);
        assert!(auth.authorize("049A3C7F").unwrap().is_authorized());
        assert!(!auth.authorize("DEADBEEF").unwrap().is_authorized());
    }
}
