use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get},
    Json, Router,
};

use crate::{
    db::{self, Pet, PetInput},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_pets).post(create_pet))
        .route("/{id}", delete(delete_pet))
}

/// GET /api/pets - List registered pets
async fn list_pets(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Pet>>, (StatusCode, String)> {
    let pets = db::list_pets(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Json(pets))
}

/// POST /api/pets - Register a pet
async fn create_pet(
    State(state): State<Arc<AppState>>,
    Json(mut input): Json<PetInput>,
) -> Result<(StatusCode, Json<Pet>), (StatusCode, String)> {
    if input.name.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Missing name".into()));
    }
    input.rfid_uid = db::normalize_uid(&input.rfid_uid)
        .ok_or((StatusCode::BAD_REQUEST, "Invalid UID".to_string()))?;

    let pet = db::insert_pet(&state.db, &input).await.map_err(|e| {
        if db::is_duplicate(&e) {
            (StatusCode::CONFLICT, format!("UID {} already registered", input.rfid_uid))
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;

    tracing::info!("Registered pet {} with tag {}", pet.name, pet.rfid_uid);
    Ok((StatusCode::CREATED, Json(pet)))
}

/// DELETE /api/pets/{id} - Remove a pet
async fn delete_pet(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, (StatusCode, String)> {
    let result = sqlx::query("DELETE FROM pets WHERE id = ?")
        .bind(id)
        .execute(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    if result.rows_affected() == 0 {
        return Err((StatusCode::NOT_FOUND, format!("Pet {} not found", id)));
    }

    Ok(StatusCode::NO_CONTENT)
}
