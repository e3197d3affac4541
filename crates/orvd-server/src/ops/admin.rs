//! Operator operations.

use orvd_core::crypto::sha256_hex;
use orvd_core::models::{
    Decision, TelemetrySample, Vehicle, VehicleState, MISSION_PENDING_REVISION, NOT_FOUND,
};
use orvd_core::zones::{parse_ring, ZoneSet};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::dispatch::Answer;
use crate::error::ApiError;
use crate::persistence::{missions, telemetry, users, vehicles};
use crate::pubsub::outbound;
use crate::state::AppState;

/// Access token for valid credentials, `""` for a wrong password, `$-1` for an unknown user.
pub async fn login(state: &AppState, login: &str, password: &str) -> Result<Answer, ApiError> {
    let Some(user) = users::get_user(state.db.pool(), login).await? else {
        return Ok(Answer::not_found());
    };
    if sha256_hex(password) == user.password_hash {
        info!("Operator {} logged in", login);
        Ok(Answer::Text(user.access_token))
    } else {
        warn!("Wrong password for operator {}", login);
        Ok(Answer::text(""))
    }
}

/// Release a pending arm request.
pub async fn arm_decision(state: &AppState, id: &str, decision: i64) -> Result<Answer, ApiError> {
    let _guard = state.lock_vehicle(id).await;
    let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
        return Ok(Answer::not_found());
    };
    if !state.arm_queue.contains(id) {
        return Ok(Answer::text("$Arm: -1"));
    }
    let decision_kind = Decision::from_code(decision);
    vehicle.is_armed = decision_kind.is_approve();
    vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
    state.arm_queue.release(id, decision_kind);
    info!("Arm decision {} for {}", decision, id);
    Ok(Answer::Text(format!("$Arm: {}", decision)))
}

/// Accept or reject the stored mission. Accepted missions are pushed to the vehicle.
pub async fn mission_decision(
    state: &AppState,
    id: &str,
    decision: i64,
) -> Result<Answer, ApiError> {
    let _guard = state.lock_vehicle(id).await;
    let Some(mission) = missions::get_mission(state.db.pool(), id).await? else {
        return Ok(Answer::not_found());
    };
    let accept = Decision::from_code(decision).is_approve();
    missions::set_accepted(state.db.pool(), id, accept).await?;
    if accept {
        outbound::publish_mission(state, id, &mission.joined());
    }
    info!("Mission for {} {}", id, if accept { "accepted" } else { "rejected" });
    Ok(Answer::ok())
}

async fn update_vehicle(
    state: &AppState,
    id: &str,
    change: impl FnOnce(&mut Vehicle),
) -> Result<Option<Vehicle>, ApiError> {
    let _guard = state.lock_vehicle(id).await;
    let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
        return Ok(None);
    };
    change(&mut vehicle);
    vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
    Ok(Some(vehicle))
}

async fn transition(
    state: &AppState,
    id: &str,
    change: impl FnOnce(&mut Vehicle),
) -> Result<Answer, ApiError> {
    Ok(match update_vehicle(state, id, change).await? {
        Some(vehicle) => {
            outbound::publish_flight_state(state, &vehicle);
            Answer::ok()
        }
        None => Answer::not_found(),
    })
}

pub async fn force_disarm(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    transition(state, id, |v| {
        v.is_armed = false;
        v.state = VehicleState::Online;
    })
    .await
}

pub async fn force_disarm_all(state: &AppState) -> Result<Answer, ApiError> {
    let ids: Vec<String> = vehicles::list_vehicles(state.db.pool())
        .await?
        .into_iter()
        .map(|v| v.id)
        .collect();
    for id in &ids {
        update_vehicle(state, id, |v| {
            v.is_armed = false;
            v.state = VehicleState::Online;
        })
        .await?;
    }
    info!("Force disarmed {} vehicles", ids.len());
    Ok(Answer::ok())
}

pub async fn kill_switch(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    let answer = transition(state, id, |v| {
        v.is_armed = false;
        v.kill_switch_state = true;
        v.state = VehicleState::KillSwitchOn;
    })
    .await?;
    if answer == Answer::ok() {
        warn!("Kill switch engaged for {}", id);
    }
    Ok(answer)
}

/// `0` arms and marks the vehicle flying, anything else disarms it.
pub async fn change_fly_accept(
    state: &AppState,
    id: &str,
    decision: i64,
) -> Result<Answer, ApiError> {
    let approve = Decision::from_code(decision).is_approve();
    transition(state, id, |v| {
        v.is_armed = approve;
        v.state = if approve {
            VehicleState::Flying
        } else {
            VehicleState::Online
        };
    })
    .await
}

pub async fn get_state(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(match vehicles::get_vehicle(state.db.pool(), id).await? {
        Some(vehicle) => Answer::text(vehicle.state.label()),
        None => Answer::not_found(),
    })
}

async fn mission_state_text(state: &AppState, id: &str) -> Result<String, ApiError> {
    if state.revise_queue.contains(id) {
        return Ok(MISSION_PENDING_REVISION.to_string());
    }
    if vehicles::get_vehicle(state.db.pool(), id).await?.is_none() {
        return Ok(NOT_FOUND.to_string());
    }
    Ok(match missions::get_mission(state.db.pool(), id).await? {
        Some(mission) => mission.state_code().to_string(),
        None => NOT_FOUND.to_string(),
    })
}

pub async fn get_mission_state(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(Answer::Text(mission_state_text(state, id).await?))
}

pub async fn get_mission(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    if vehicles::get_vehicle(state.db.pool(), id).await?.is_none() {
        return Ok(Answer::not_found());
    }
    Ok(match missions::get_mission(state.db.pool(), id).await? {
        Some(mission) if !mission.steps.is_empty() => Answer::Text(mission.joined()),
        _ => Answer::not_found(),
    })
}

fn telemetry_json(sample: &TelemetrySample) -> Value {
    json!({
        "lat": sample.lat,
        "lon": sample.lon,
        "alt": sample.alt,
        "azimuth": sample.azimuth,
        "dop": sample.dop,
        "sats": sample.sats,
        "speed": sample.speed,
    })
}

pub async fn get_telemetry(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(Answer::Json(
        match telemetry::latest_sample(state.db.pool(), id).await? {
            Some(sample) => telemetry_json(&sample),
            None => json!({ "error": "NOT_FOUND" }),
        },
    ))
}

pub async fn get_waiter_number(state: &AppState) -> Result<Answer, ApiError> {
    Ok(Answer::Text(state.arm_queue.len().to_string()))
}

/// Vehicle ids in registration order, rendered as `['A', 'B']`.
pub async fn get_id_list(state: &AppState) -> Result<Answer, ApiError> {
    let ids: Vec<String> = vehicles::list_vehicles(state.db.pool())
        .await?
        .into_iter()
        .map(|v| format!("'{}'", v.id))
        .collect();
    Ok(Answer::Text(format!("[{}]", ids.join(", "))))
}

pub async fn get_delay(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(match vehicles::get_vehicle(state.db.pool(), id).await? {
        Some(vehicle) => Answer::Text(vehicle.delay.to_string()),
        None => Answer::not_found(),
    })
}

/// Store a new ping cadence and restart the ping task with it.
pub async fn set_delay(state: &Arc<AppState>, id: &str, delay: i64) -> Result<Answer, ApiError> {
    match update_vehicle(state, id, |v| v.delay = delay).await? {
        Some(_) => {
            state.schedule_ping(id, delay);
            info!("Ping delay for {} set to {}s", id, delay);
            Ok(Answer::ok())
        }
        None => Ok(Answer::not_found()),
    }
}

/// Resolve a pending mission revision.
pub async fn revise_mission_decision(
    state: &AppState,
    id: &str,
    decision: i64,
) -> Result<Answer, ApiError> {
    let _guard = state.lock_vehicle(id).await;
    let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
        return Ok(Answer::not_found());
    };
    if !state.revise_queue.contains(id) {
        return Ok(Answer::text("$Arm: -1"));
    }
    let decision_kind = Decision::from_code(decision);
    let accept = decision_kind.is_approve();
    vehicle.is_armed = accept;
    vehicle.state = if accept {
        VehicleState::Flying
    } else {
        VehicleState::Online
    };
    vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
    missions::set_accepted(state.db.pool(), id, accept).await?;
    if accept {
        if let Some(mission) = missions::get_mission(state.db.pool(), id).await? {
            outbound::publish_mission(state, id, &mission.joined());
        }
    }
    outbound::publish_flight_state(state, &vehicle);
    state.revise_queue.release(id, decision_kind);
    info!("Revision decision {} for {}", decision, id);
    Ok(Answer::Text(format!("$Arm: {}", decision)))
}

/// `0` when display-only mode is on.
pub async fn get_display_mode(state: &AppState) -> Result<Answer, ApiError> {
    Ok(Answer::text(if state.display_only() { "0" } else { "1" }))
}

pub async fn toggle_display_mode(state: &AppState) -> Result<Answer, ApiError> {
    let enabled = state.toggle_display_only();
    info!("Display-only mode {}", if enabled { "on" } else { "off" });
    Ok(Answer::ok())
}

/// `0` when vehicles may query flight info.
pub async fn get_flight_info_response_mode(state: &AppState) -> Result<Answer, ApiError> {
    Ok(Answer::text(if state.flight_info_response() {
        "0"
    } else {
        "1"
    }))
}

pub async fn toggle_flight_info_response_mode(state: &AppState) -> Result<Answer, ApiError> {
    let enabled = state.flight_info_response();
    state.toggle_flight_info_response();
    info!("Flight info responses {}", if enabled { "off" } else { "on" });
    Ok(Answer::ok())
}

/// Dashboard snapshot of the whole fleet.
pub async fn get_all_data(state: &AppState) -> Result<Answer, ApiError> {
    let fleet = vehicles::list_vehicles(state.db.pool()).await?;
    let mut uav_data = Map::new();
    for vehicle in &fleet {
        let telemetry = telemetry::latest_sample(state.db.pool(), &vehicle.id)
            .await?
            .map(|s| telemetry_json(&s))
            .unwrap_or(Value::Null);
        uav_data.insert(
            vehicle.id.clone(),
            json!({
                "state": vehicle.state.label(),
                "telemetry": telemetry,
                "mission_state": mission_state_text(state, &vehicle.id).await?,
                "delay": vehicle.delay.to_string(),
            }),
        );
    }
    Ok(Answer::Json(json!({
        "ids": fleet.iter().map(|v| v.id.clone()).collect::<Vec<_>>(),
        "waiters": state.arm_queue.len().to_string(),
        "uav_data": uav_data,
    })))
}

// Zones

async fn load_zones(state: &AppState) -> Result<ZoneSet, ApiError> {
    Ok(state.zones.load().await?)
}

/// The zone snapshot as GeoJSON.
pub async fn get_forbidden_zones(state: &AppState) -> Result<Answer, ApiError> {
    let zones = load_zones(state).await?;
    Ok(Answer::Json(serde_json::to_value(&zones).map_err(anyhow::Error::from)?))
}

/// Outer ring of one zone.
pub async fn get_forbidden_zone(state: &AppState, name: &str) -> Result<Answer, ApiError> {
    let zones = load_zones(state).await?;
    Ok(match zones.get(name) {
        Some(zone) => Answer::Json(json!(zone.geometry.outer_ring())),
        None => Answer::not_found(),
    })
}

pub async fn get_forbidden_zones_names(state: &AppState) -> Result<Answer, ApiError> {
    let zones = load_zones(state).await?;
    Ok(Answer::Json(json!(zones.names())))
}

/// Create or replace a zone from operator JSON. Positions must be `[lon, lat]` pairs.
pub async fn set_forbidden_zone(
    state: &AppState,
    name: &str,
    geometry: &Value,
) -> Result<Answer, ApiError> {
    let Some(ring) = parse_ring(geometry) else {
        return Ok(Answer::text("Bad geometry"));
    };
    let ((), zones) = state
        .zones
        .mutate(|zones| zones.set_zone(name, ring))
        .await?;
    outbound::publish_zones(state, &zones);
    info!("Forbidden zone {} saved", name);
    Ok(Answer::ok())
}

/// Remove a zone. Unknown names still answer `$OK`.
pub async fn delete_forbidden_zone(state: &AppState, name: &str) -> Result<Answer, ApiError> {
    let (removed, zones) = state.zones.mutate(|zones| zones.delete_zone(name)).await?;
    if removed {
        info!("Forbidden zone {} deleted", name);
    }
    outbound::publish_zones(state, &zones);
    Ok(Answer::ok())
}

pub async fn export_forbidden_zones(state: &AppState) -> Result<Answer, ApiError> {
    Ok(Answer::Attachment {
        filename: "forbidden_zones.json".to_string(),
        content: state.zones.export().await?,
    })
}

/// Replace the snapshot with an uploaded FeatureCollection. Unparsable uploads are a `BadRequest`.
pub async fn import_forbidden_zones(state: &AppState, body: &str) -> Result<Answer, ApiError> {
    let imported = ZoneSet::from_json(body).map_err(|e| {
        error!("Zone import rejected: {}", e);
        ApiError::bad_request("Failed to save file")
    })?;
    let zones = state.zones.replace(imported).await?;
    outbound::publish_zones(state, &zones);
    info!("Imported {} forbidden zones", zones.len());
    Ok(Answer::Json(json!({ "status": "success" })))
}
