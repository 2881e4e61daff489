mod pets;
mod scans;

use std::sync::Arc;

use axum::Router;

use crate::AppState;

/// Build the API router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .nest("/pets", pets::router())
        .nest("/scans", scans::router())
}
