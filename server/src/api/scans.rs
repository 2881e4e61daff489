use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use crate::{db::Scan, AppState};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", get(list_scans))
}

#[derive(Debug, Deserialize)]
pub struct ScanQuery {
    limit: Option<u32>,
}

/// GET /api/scans - Most recent scans first
async fn list_scans(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ScanQuery>,
) -> Result<Json<Vec<Scan>>, (StatusCode, String)> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    let scans = sqlx::query_as::<_, Scan>("SELECT * FROM scans ORDER BY scanned_at DESC, id DESC LIMIT ?")
        .bind(limit)
        .fetch_all(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(scans))
}
