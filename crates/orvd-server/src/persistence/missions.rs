//! Mission persistence operations.

use anyhow::Result;
use orvd_core::models::Mission;
use sqlx::SqlitePool;

/// Replace the vehicle's mission with `steps`, unaccepted, in one transaction.
pub async fn replace_mission(pool: &SqlitePool, vehicle_id: &str, steps: &[String]) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM mission_steps WHERE vehicle_id = ?1")
        .bind(vehicle_id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        r#"
        INSERT INTO missions (vehicle_id, is_accepted) VALUES (?1, 0)
        ON CONFLICT(vehicle_id) DO UPDATE SET is_accepted = 0
        "#,
    )
    .bind(vehicle_id)
    .execute(&mut *tx)
    .await?;

    for (idx, operation) in steps.iter().enumerate() {
        sqlx::query("INSERT INTO mission_steps (vehicle_id, step, operation) VALUES (?1, ?2, ?3)")
            .bind(vehicle_id)
            .bind(idx as i64)
            .bind(operation)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await?;
    Ok(())
}

pub async fn get_mission(pool: &SqlitePool, vehicle_id: &str) -> Result<Option<Mission>> {
    let row: Option<(bool,)> =
        sqlx::query_as("SELECT is_accepted FROM missions WHERE vehicle_id = ?1")
            .bind(vehicle_id)
            .fetch_optional(pool)
            .await?;

    let Some((is_accepted,)) = row else {
        return Ok(None);
    };

    let steps: Vec<(String,)> = sqlx::query_as(
        "SELECT operation FROM mission_steps WHERE vehicle_id = ?1 ORDER BY step ASC",
    )
    .bind(vehicle_id)
    .fetch_all(pool)
    .await?;

    Ok(Some(Mission {
        vehicle_id: vehicle_id.to_string(),
        is_accepted,
        steps: steps.into_iter().map(|(op,)| op).collect(),
    }))
}

/// Set the acceptance flag. Returns false when the vehicle has no mission.
pub async fn set_accepted(pool: &SqlitePool, vehicle_id: &str, accepted: bool) -> Result<bool> {
    let result = sqlx::query("UPDATE missions SET is_accepted = ?2 WHERE vehicle_id = ?1")
        .bind(vehicle_id)
        .bind(accepted)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::init_database;

    #[tokio::test]
    async fn replace_resets_acceptance_and_steps() {
        let db = init_database(":memory:", 1).await.unwrap();
        let first = vec!["H1.0_2.0_3.0".to_string(), "T5.0".to_string()];
        replace_mission(db.pool(), "V1", &first).await.unwrap();
        assert!(set_accepted(db.pool(), "V1", true).await.unwrap());
        assert!(get_mission(db.pool(), "V1").await.unwrap().unwrap().is_accepted);

        let second = vec!["T9.0".to_string()];
        replace_mission(db.pool(), "V1", &second).await.unwrap();
        let mission = get_mission(db.pool(), "V1").await.unwrap().unwrap();
        assert!(!mission.is_accepted);
        assert_eq!(mission.steps, second);
    }

    #[tokio::test]
    async fn missing_mission() {
        let db = init_database(":memory:", 1).await.unwrap();
        assert!(get_mission(db.pool(), "none").await.unwrap().is_none());
        assert!(!set_accepted(db.pool(), "none", true).await.unwrap());
    }
}
