//! Operator account persistence.

use anyhow::Result;
use orvd_core::crypto::sha256_hex;
use orvd_core::models::OperatorUser;
use rand::RngCore;
use sqlx::SqlitePool;

/// Random 32-hex-character access token.
pub fn generate_access_token() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Ensure the configured operator exists with the configured password.
///
/// The access token is generated once and kept across restarts.
pub async fn ensure_user(pool: &SqlitePool, username: &str, password: &str) -> Result<OperatorUser> {
    let password_hash = sha256_hex(password);
    sqlx::query(
        r#"
        INSERT INTO users (username, password_hash, access_token) VALUES (?1, ?2, ?3)
        ON CONFLICT(username) DO UPDATE SET password_hash = ?2
        "#,
    )
    .bind(username)
    .bind(&password_hash)
    .bind(generate_access_token())
    .execute(pool)
    .await?;

    get_user(pool, username)
        .await?
        .ok_or_else(|| anyhow::anyhow!("user {} missing after upsert", username))
}

pub async fn get_user(pool: &SqlitePool, username: &str) -> Result<Option<OperatorUser>> {
    let row: Option<(String, String, String)> = sqlx::query_as(
        "SELECT username, password_hash, access_token FROM users WHERE username = ?1",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|(username, password_hash, access_token)| OperatorUser {
        username,
        password_hash,
        access_token,
    }))
}

pub async fn token_exists(pool: &SqlitePool, token: &str) -> Result<bool> {
    let row: Option<(i64,)> = sqlx::query_as("SELECT 1 FROM users WHERE access_token = ?1")
        .bind(token)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}
