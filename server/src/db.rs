use std::str::FromStr;

use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{FromRow, SqlitePool};

use crate::error::AppError;

const SCHEMA: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS pets (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        rfid_uid TEXT NOT NULL UNIQUE,
        dispense_ms INTEGER,
        last_fed_at INTEGER,
        created_at INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS scans (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        rfid_uid TEXT NOT NULL,
        pet_id INTEGER REFERENCES pets(id) ON DELETE SET NULL,
        authorized INTEGER NOT NULL,
        reason TEXT NOT NULL,
        scanned_at INTEGER NOT NULL
    )
    "#,
    "CREATE INDEX IF NOT EXISTS idx_scans_scanned_at ON scans(scanned_at)",
];

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Pet {
    pub id: i64,
    pub name: String,
    pub rfid_uid: String,
    pub dispense_ms: Option<i64>,
    /// Unix seconds
    pub last_fed_at: Option<i64>,
    pub created_at: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PetInput {
    pub name: String,
    pub rfid_uid: String,
    pub dispense_ms: Option<u32>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Scan {
    pub id: i64,
    pub rfid_uid: String,
    pub pet_id: Option<i64>,
    pub authorized: bool,
    pub reason: String,
    pub scanned_at: i64,
}

pub async fn connect(url: &str) -> Result<SqlitePool, AppError> {
    let options = SqliteConnectOptions::from_str(url)?
        .create_if_missing(true)
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;
    Ok(pool)
}

pub async fn migrate(pool: &SqlitePool) -> Result<(), AppError> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}

/// Canonical form of a tag identifier: trimmed uppercase hex, 14 chars max.
pub fn normalize_uid(raw: &str) -> Option<String> {
    let uid = raw.trim();
    if uid.is_empty() || uid.len() > 14 || !uid.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    Some(uid.to_ascii_uppercase())
}

pub async fn insert_pet(pool: &SqlitePool, input: &PetInput) -> Result<Pet, sqlx::Error> {
    sqlx::query_as::<_, Pet>(
        r#"
        INSERT INTO pets (name, rfid_uid, dispense_ms, created_at)
        VALUES (?, ?, ?, ?)
        RETURNING *
        "#,
    )
    .bind(input.name.trim())
    .bind(&input.rfid_uid)
    .bind(input.dispense_ms)
    .bind(chrono::Utc::now().timestamp())
    .fetch_one(pool)
    .await
}

pub async fn list_pets(pool: &SqlitePool) -> Result<Vec<Pet>, sqlx::Error> {
    sqlx::query_as::<_, Pet>("SELECT * FROM pets ORDER BY name")
        .fetch_all(pool)
        .await
}

pub async fn find_pet_by_uid(pool: &SqlitePool, uid: &str) -> Result<Option<Pet>, sqlx::Error> {
    sqlx::query_as::<_, Pet>("SELECT * FROM pets WHERE rfid_uid = ?")
        .bind(uid)
        .fetch_optional(pool)
        .await
}

pub async fn mark_fed(pool: &SqlitePool, pet_id: i64, at: i64) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE pets SET last_fed_at = ? WHERE id = ?")
        .bind(at)
        .bind(pet_id)
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn record_scan(
    pool: &SqlitePool,
    uid: &str,
    pet_id: Option<i64>,
    authorized: bool,
    reason: &str,
    at: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO scans (rfid_uid, pet_id, authorized, reason, scanned_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(uid)
    .bind(pet_id)
    .bind(authorized)
    .bind(reason)
    .bind(at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Whether a unique constraint rejected the statement.
pub fn is_duplicate(e: &sqlx::Error) -> bool {
    e.as_database_error()
        .is_some_and(|db| db.is_unique_violation())
}

#[cfg(test)]
pub async fn memory_pool() -> SqlitePool {
    // single connection so every query sees the same in-memory database
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    migrate(&pool).await.unwrap();
    pool
}
