//! Vehicle persistence operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use orvd_core::models::{Vehicle, VehicleState};
use sqlx::SqlitePool;

/// Insert or fully overwrite a vehicle record. `created_at` is kept on conflict.
pub async fn upsert_vehicle(pool: &SqlitePool, vehicle: &Vehicle) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO vehicles (vehicle_id, is_armed, state, kill_switch_state, delay_secs, created_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        ON CONFLICT(vehicle_id) DO UPDATE SET
            is_armed = ?2,
            state = ?3,
            kill_switch_state = ?4,
            delay_secs = ?5
        "#,
    )
    .bind(&vehicle.id)
    .bind(vehicle.is_armed)
    .bind(vehicle.state.as_key())
    .bind(vehicle.kill_switch_state)
    .bind(vehicle.delay)
    .bind(vehicle.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_vehicle(pool: &SqlitePool, vehicle_id: &str) -> Result<Option<Vehicle>> {
    let row = sqlx::query_as::<_, VehicleRow>(
        "SELECT vehicle_id, is_armed, state, kill_switch_state, delay_secs, created_at FROM vehicles WHERE vehicle_id = ?1",
    )
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// All vehicles, oldest first.
pub async fn list_vehicles(pool: &SqlitePool) -> Result<Vec<Vehicle>> {
    let rows = sqlx::query_as::<_, VehicleRow>(
        "SELECT vehicle_id, is_armed, state, kill_switch_state, delay_secs, created_at FROM vehicles ORDER BY created_at ASC, rowid ASC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

#[derive(sqlx::FromRow)]
struct VehicleRow {
    vehicle_id: String,
    is_armed: bool,
    state: String,
    kill_switch_state: bool,
    delay_secs: i64,
    created_at: String,
}

impl From<VehicleRow> for Vehicle {
    fn from(row: VehicleRow) -> Self {
        let created_at = DateTime::parse_from_rfc3339(&row.created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        Vehicle {
            id: row.vehicle_id,
            is_armed: row.is_armed,
            state: VehicleState::from_key(&row.state),
            kill_switch_state: row.kill_switch_state,
            delay: row.delay_secs,
            created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    #[tokio::test]
    async fn upsert_keeps_creation_time() {
        let db = init_database(":memory:", 1).await.unwrap();
        let mut vehicle = Vehicle::new("V1");
        upsert_vehicle(db.pool(), &vehicle).await.unwrap();
        let created = get_vehicle(db.pool(), "V1").await.unwrap().unwrap().created_at;

        vehicle.is_armed = true;
        vehicle.state = VehicleState::Flying;
        vehicle.created_at = Utc::now() + chrono::Duration::hours(1);
        upsert_vehicle(db.pool(), &vehicle).await.unwrap();

        let loaded = get_vehicle(db.pool(), "V1").await.unwrap().unwrap();
        assert!(loaded.is_armed);
        assert_eq!(loaded.state, VehicleState::Flying);
        assert_eq!(loaded.created_at, created);
    }

    #[tokio::test]
    async fn list_orders_by_registration() {
        let db = init_database(":memory:", 1).await.unwrap();
        for id in ["B", "A"] {
            upsert_vehicle(db.pool(), &Vehicle::new(id)).await.unwrap();
        }
        let ids: Vec<_> = list_vehicles(db.pool())
            .await
            .unwrap()
            .into_iter()
            .map(|v| v.id)
            .collect();
        assert_eq!(ids, ["B", "A"]);
        assert!(get_vehicle(db.pool(), "missing").await.unwrap().is_none());
    }
}
