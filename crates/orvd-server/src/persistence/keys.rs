//! Public key persistence for vehicles and mission senders.

use anyhow::Result;
use orvd_core::crypto::PublicKey;
use sqlx::SqlitePool;

/// Pin a vehicle key. An existing key is never overwritten; returns whether it was stored.
pub async fn insert_vehicle_key_if_absent(
    pool: &SqlitePool,
    vehicle_id: &str,
    key: &PublicKey,
) -> Result<bool> {
    let result = sqlx::query(
        "INSERT INTO vehicle_keys (vehicle_id, n, e) VALUES (?1, ?2, ?3) ON CONFLICT(vehicle_id) DO NOTHING",
    )
    .bind(vehicle_id)
    .bind(key.n_hex())
    .bind(key.e_hex())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn get_vehicle_key(pool: &SqlitePool, vehicle_id: &str) -> Result<Option<PublicKey>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT n, e FROM vehicle_keys WHERE vehicle_id = ?1")
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await?;
    row.map(|(n, e)| PublicKey::from_hex(&n, &e).map_err(anyhow::Error::from))
        .transpose()
}

/// Store or replace a mission sender key.
pub async fn upsert_sender_key(pool: &SqlitePool, sender_id: &str, key: &PublicKey) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sender_keys (sender_id, n, e) VALUES (?1, ?2, ?3)
        ON CONFLICT(sender_id) DO UPDATE SET n = ?2, e = ?3
        "#,
    )
    .bind(sender_id)
    .bind(key.n_hex())
    .bind(key.e_hex())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_sender_key(pool: &SqlitePool, sender_id: &str) -> Result<Option<PublicKey>> {
    let row: Option<(String, String)> =
        sqlx::query_as("SELECT n, e FROM sender_keys WHERE sender_id = ?1")
            .bind(sender_id)
            .fetch_optional(pool)
            .await?;
    row.map(|(n, e)| PublicKey::from_hex(&n, &e).map_err(anyhow::Error::from))
        .transpose()
}
