//! Device-facing endpoint: one request per scanned tag.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Json, Router,
};
use petfeeder::AccessDecision;
use serde::Serialize;
use serde_json::Value;

use crate::{
    config::Config,
    db::{self, Pet},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/tag", post(report_tag))
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

type TagError = (StatusCode, Json<ErrorBody>);

fn error(status: StatusCode, message: impl Into<String>) -> TagError {
    (status, Json(ErrorBody { error: message.into() }))
}

/// POST /tag - Decide whether the scanned pet gets fed
async fn report_tag(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<(StatusCode, Json<AccessDecision>), TagError> {
    let request: Value = serde_json::from_slice(&body)
        .map_err(|_| error(StatusCode::BAD_REQUEST, "Invalid JSON"))?;
    let raw_uid = request
        .get("uid")
        .and_then(Value::as_str)
        .filter(|uid| !uid.trim().is_empty())
        .ok_or_else(|| error(StatusCode::BAD_REQUEST, "UID missing"))?;
    let uid = db::normalize_uid(raw_uid).ok_or_else(|| error(StatusCode::BAD_REQUEST, "Invalid UID"))?;

    let internal = |e: sqlx::Error| error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string());

    let now = chrono::Utc::now().timestamp();
    let pet = db::find_pet_by_uid(&state.db, &uid).await.map_err(internal)?;
    let decision = decide(pet.as_ref(), now, &state.config);

    if decision.is_authorized() {
        if let Some(pet) = &pet {
            db::mark_fed(&state.db, pet.id, now).await.map_err(internal)?;
        }
    }

    let reason = decision.message.as_deref().unwrap_or_default();
    db::record_scan(
        &state.db,
        &uid,
        pet.as_ref().map(|p| p.id),
        decision.is_authorized(),
        reason,
        now,
    )
    .await
    .map_err(internal)?;

    let status = if decision.is_authorized() {
        tracing::info!("Authorized {} ({})", uid, decision.pet_name.as_deref().unwrap_or_default());
        StatusCode::OK
    } else {
        tracing::info!("Denied {}: {}", uid, reason);
        StatusCode::FORBIDDEN
    };
    Ok((status, Json(decision)))
}

fn decide(pet: Option<&Pet>, now: i64, config: &Config) -> AccessDecision {
    let Some(pet) = pet else {
        return AccessDecision::denied("Pet not recognized");
    };

    if config.feed_interval_secs > 0 {
        if let Some(last) = pet.last_fed_at {
            let elapsed = now.saturating_sub(last);
            if elapsed >= 0 && (elapsed as u64) < config.feed_interval_secs {
                return AccessDecision::denied("Fed too recently");
            }
        }
    }

    let dispense_ms = pet
        .dispense_ms
        .and_then(|ms| u32::try_from(ms).ok())
        .or(config.default_dispense_ms);
    AccessDecision::authorized(pet.name.clone(), dispense_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pet(last_fed_at: Option<i64>, dispense_ms: Option<i64>) -> Pet {
        Pet {
            id: 1,
            name: "Miso".into(),
            rfid_uid: "049A3C7F".into(),
            dispense_ms,
            last_fed_at,
            created_at: 0,
        }
    }

    fn config(feed_interval_secs: u64) -> Config {
        Config {
            feed_interval_secs,
            default_dispense_ms: Some(1_500),
            ..Config::default()
        }
    }

    #[test]
    fn unknown_pet_is_denied() {
        let d = decide(None, 1_000, &config(0));
        assert!(!d.is_authorized());
        assert_eq!(d.message.as_deref(), Some("Pet not recognized"));
    }

    #[test]
    fn interval_blocks_recent_feeding() {
        let p = pet(Some(1_000), None);
        assert!(!decide(Some(&p), 1_500, &config(3_600)).is_authorized());
        assert!(decide(Some(&p), 4_600, &config(3_600)).is_authorized());
        assert!(decide(Some(&p), 1_001, &config(0)).is_authorized());
    }

    #[test]
    fn pet_dispense_time_overrides_default() {
        assert_eq!(decide(Some(&pet(None, Some(800))), 0, &config(0)).dispense_ms, Some(800));
        assert_eq!(decide(Some(&pet(None, None)), 0, &config(0)).dispense_ms, Some(1_500));
    }
}
