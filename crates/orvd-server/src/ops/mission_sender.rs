//! Mission sender key exchange and WPL upload.

use orvd_core::mission::{read_mission, MISSION_OK};
use orvd_core::models::Vehicle;
use tracing::{info, warn};

use crate::dispatch::Answer;
use crate::error::ApiError;
use crate::persistence::{missions, vehicles};
use crate::state::AppState;

pub async fn key_exchange(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(Answer::Text(state.keys.exchange_sender_key(id).await?))
}

/// Verify a WPL plan and store it as the vehicle's unaccepted mission.
///
/// The answer is the verification status string either way.
pub async fn upload_mission(state: &AppState, id: &str, wpl: &str) -> Result<Answer, ApiError> {
    let steps = match read_mission(wpl) {
        Ok(steps) => steps,
        Err(status) => {
            warn!("Mission for {} rejected: {}", id, status);
            return Ok(Answer::Text(status.to_string()));
        }
    };

    let _guard = state.lock_vehicle(id).await;
    if state.display_only() && vehicles::get_vehicle(state.db.pool(), id).await?.is_none() {
        vehicles::upsert_vehicle(state.db.pool(), &Vehicle::new(id)).await?;
        info!("Display mode: registered vehicle {} from mission upload", id);
    }
    missions::replace_mission(state.db.pool(), id, &steps).await?;
    info!("Stored mission for {} ({} steps)", id, steps.len());
    Ok(Answer::text(MISSION_OK))
}
