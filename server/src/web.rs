//! Minimal HTML front end: pet list and registration form.

use std::fmt::Write;
use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, Redirect},
    routing::{get, post},
    Form, Router,
};
use serde::Deserialize;

use crate::{
    db::{self, Pet, PetInput},
    AppState,
};

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/register", post(register))
}

/// GET / - Registered pets and the registration form
async fn index(State(state): State<Arc<AppState>>) -> Result<Html<String>, (StatusCode, String)> {
    let pets = db::list_pets(&state.db)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(Html(render_index(&pets)))
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    name: Option<String>,
    uid: Option<String>,
    dispense_ms: Option<String>,
}

/// POST /register - Register a pet from the form, then back to the list
async fn register(
    State(state): State<Arc<AppState>>,
    Form(form): Form<RegisterForm>,
) -> Result<Redirect, (StatusCode, String)> {
    let missing = || (StatusCode::BAD_REQUEST, "Missing name or UID".to_string());
    let name = form.name.filter(|n| !n.trim().is_empty()).ok_or_else(missing)?;
    let uid = form.uid.filter(|u| !u.trim().is_empty()).ok_or_else(missing)?;

    let rfid_uid = db::normalize_uid(&uid).ok_or((StatusCode::BAD_REQUEST, "Invalid UID".to_string()))?;
    let dispense_ms = match form.dispense_ms.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(ms) => Some(
            ms.parse::<u32>()
                .map_err(|_| (StatusCode::BAD_REQUEST, "Invalid dispense time".to_string()))?,
        ),
    };

    let input = PetInput {
        name,
        rfid_uid,
        dispense_ms,
    };
    db::insert_pet(&state.db, &input).await.map_err(|e| {
        if db::is_duplicate(&e) {
            (StatusCode::CONFLICT, format!("UID {} already registered", input.rfid_uid))
        } else {
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
    })?;

    tracing::info!("Registered pet {} with tag {}", input.name.trim(), input.rfid_uid);
    Ok(Redirect::to("/"))
}

fn render_index(pets: &[Pet]) -> String {
    let mut rows = String::new();
    for pet in pets {
        let dispense = pet
            .dispense_ms
            .map(|ms| format!("{} ms", ms))
            .unwrap_or_else(|| "default".into());
        let _ = write!(
            rows,
            "<tr><td>{}</td><td><code>{}</code></td><td>{}</td></tr>",
            escape(&pet.name),
            escape(&pet.rfid_uid),
            dispense
        );
    }
    if pets.is_empty() {
        rows.push_str("<tr><td colspan=\"3\">No pets registered</td></tr>");
    }

    format!(
        r#"<!DOCTYPE html>
<html>
<head><meta charset="utf-8"><title>Pet Feeder</title></head>
<body>
<h1>Pet Feeder</h1>
<h2>Register a pet</h2>
<form method="post" action="/register">
  <label>Name <input name="name" required></label>
  <label>Tag UID <input name="uid" required pattern="[0-9A-Fa-f]{{2,14}}"></label>
  <label>Dispense (ms) <input name="dispense_ms" type="number" min="0"></label>
  <button type="submit">Register</button>
</form>
<h2>Registered pets</h2>
<table>
<tr><th>Name</th><th>UID</th><th>Dispense</th></tr>
{}
</table>
</body>
</html>
"#,
        rows
    )
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
