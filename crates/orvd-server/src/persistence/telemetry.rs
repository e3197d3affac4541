//! Telemetry persistence operations.

use anyhow::Result;
use chrono::{DateTime, SecondsFormat, Utc};
use orvd_core::models::TelemetrySample;
use sqlx::SqlitePool;

/// Store a sample, overwriting one with the same `(vehicle_id, record_time)`.
pub async fn insert_sample(pool: &SqlitePool, sample: &TelemetrySample) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO telemetry (vehicle_id, record_time, lat, lon, alt, azimuth, dop, sats, speed)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        ON CONFLICT(vehicle_id, record_time) DO UPDATE SET
            lat = ?3, lon = ?4, alt = ?5, azimuth = ?6,
            dop = ?7, sats = ?8, speed = ?9
        "#,
    )
    .bind(&sample.vehicle_id)
    .bind(time_key(&sample.record_time))
    .bind(sample.lat)
    .bind(sample.lon)
    .bind(sample.alt)
    .bind(sample.azimuth)
    .bind(sample.dop)
    .bind(sample.sats)
    .bind(sample.speed)
    .execute(pool)
    .await?;

    Ok(())
}

/// Most recent sample for a vehicle.
pub async fn latest_sample(pool: &SqlitePool, vehicle_id: &str) -> Result<Option<TelemetrySample>> {
    let row = sqlx::query_as::<_, TelemetryRow>(
        "SELECT vehicle_id, record_time, lat, lon, alt, azimuth, dop, sats, speed FROM telemetry WHERE vehicle_id = ?1 ORDER BY record_time DESC LIMIT 1",
    )
    .bind(vehicle_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(Into::into))
}

/// Full history for a vehicle, oldest first.
pub async fn list_samples(pool: &SqlitePool, vehicle_id: &str) -> Result<Vec<TelemetrySample>> {
    let rows = sqlx::query_as::<_, TelemetryRow>(
        "SELECT vehicle_id, record_time, lat, lon, alt, azimuth, dop, sats, speed FROM telemetry WHERE vehicle_id = ?1 ORDER BY record_time ASC",
    )
    .bind(vehicle_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(Into::into).collect())
}

/// Fixed-width UTC timestamp so text order matches time order.
fn time_key(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(sqlx::FromRow)]
struct TelemetryRow {
    vehicle_id: String,
    record_time: String,
    lat: Option<f64>,
    lon: Option<f64>,
    alt: Option<f64>,
    azimuth: Option<f64>,
    dop: Option<f64>,
    sats: Option<i64>,
    speed: Option<f64>,
}

impl From<TelemetryRow> for TelemetrySample {
    fn from(row: TelemetryRow) -> Self {
        let record_time = DateTime::parse_from_rfc3339(&row.record_time)
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|_| Utc::now());

        TelemetrySample {
            vehicle_id: row.vehicle_id,
            record_time,
            lat: row.lat,
            lon: row.lon,
            alt: row.alt,
            azimuth: row.azimuth,
            dop: row.dop,
            sats: row.sats,
            speed: row.speed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    fn sample(lat: f64, at: DateTime<Utc>) -> TelemetrySample {
        TelemetrySample {
            vehicle_id: "V1".to_string(),
            record_time: at,
            lat: Some(lat),
            lon: Some(20.0),
            alt: None,
            azimuth: None,
            dop: None,
            sats: Some(7),
            speed: None,
        }
    }

    #[tokio::test]
    async fn latest_is_by_record_time() {
        let db = init_database(":memory:", 1).await.unwrap();
        let now = Utc::now();
        insert_sample(db.pool(), &sample(2.0, now)).await.unwrap();
        insert_sample(db.pool(), &sample(1.0, now - chrono::Duration::seconds(5)))
            .await
            .unwrap();

        let latest = latest_sample(db.pool(), "V1").await.unwrap().unwrap();
        assert_eq!(latest.lat, Some(2.0));

        let history = list_samples(db.pool(), "V1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].lat, Some(1.0));
        assert!(latest_sample(db.pool(), "V2").await.unwrap().is_none());
    }
}
