//! Operations invoked by vehicles over the signed API.

use chrono::Utc;
use orvd_core::mission::split_compact;
use orvd_core::models::{
    Decision, TelemetryReport, Vehicle, VehicleState, ARMED, DISARMED, KILL_SWITCH_OFF,
    KILL_SWITCH_ON, NOT_FOUND,
};
use orvd_core::wire::MessageBuilder;
use std::sync::Arc;
use tracing::{error, info};

use crate::dispatch::Answer;
use crate::error::ApiError;
use crate::persistence::{missions, telemetry, vehicles};
use crate::pubsub::outbound;
use crate::state::AppState;

fn arm_reply(code: i64, delay: i64) -> Answer {
    Answer::Text(
        MessageBuilder::new()
            .segment("Arm", code)
            .segment("Delay", delay)
            .build(),
    )
}

/// Register or reset a vehicle and start its ping task.
pub async fn auth(state: &Arc<AppState>, id: &str) -> Result<Answer, ApiError> {
    let vehicle = {
        let _guard = state.lock_vehicle(id).await;
        let mut vehicle = vehicles::get_vehicle(state.db.pool(), id)
            .await?
            .unwrap_or_else(|| Vehicle::new(id));
        vehicle.is_armed = false;
        vehicle.kill_switch_state = false;
        vehicle.state = VehicleState::Online;
        vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
        vehicle
    };

    state.schedule_ping(id, vehicle.delay);
    outbound::publish_flight_state(state, &vehicle);
    outbound::publish_current_zones(state).await;

    let reply = MessageBuilder::new()
        .segment("Auth", format!("id={}", id))
        .build();
    outbound::publish_auth(state, id, &reply);
    info!("Vehicle {} authenticated", id);
    Ok(Answer::Text(reply))
}

/// Ask to arm. With an accepted mission this blocks until an operator decides.
pub async fn arm(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    let ticket = {
        let _guard = state.lock_vehicle(id).await;
        let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
            return Ok(Answer::not_found());
        };
        if vehicle.is_armed {
            return Ok(arm_reply(ARMED, vehicle.delay));
        }
        let accepted = missions::get_mission(state.db.pool(), id)
            .await?
            .map(|m| m.is_accepted)
            .unwrap_or(false);
        if !accepted {
            return Ok(arm_reply(DISARMED, vehicle.delay));
        }
        let Some(ticket) = state.arm_queue.enqueue(id) else {
            info!("Vehicle {} already waiting for arm decision", id);
            return Ok(arm_reply(DISARMED, vehicle.delay));
        };
        vehicle.state = VehicleState::Waiting;
        vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
        ticket
    };

    info!("Vehicle {} waiting for arm decision", id);
    let decision = ticket.wait(state.config.decision_timeout()).await;

    let _guard = state.lock_vehicle(id).await;
    let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
        return Ok(Answer::not_found());
    };
    vehicle.state = if vehicle.is_armed {
        VehicleState::Flying
    } else {
        VehicleState::Online
    };
    vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
    outbound::publish_flight_state(state, &vehicle);
    info!("Vehicle {} arm decision {:?}", id, decision);
    Ok(arm_reply(vehicle.arm_code(), vehicle.delay))
}

/// `$Arm: {0|1}` for the current arm flag.
pub async fn fly_accept(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(match vehicles::get_vehicle(state.db.pool(), id).await? {
        Some(vehicle) => Answer::Text(format!("$Arm: {}", vehicle.arm_code())),
        None => Answer::not_found(),
    })
}

/// `$KillSwitch: {0|1}`, `0` when the kill switch is engaged.
pub async fn kill_switch(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(match vehicles::get_vehicle(state.db.pool(), id).await? {
        Some(vehicle) => {
            let code = if vehicle.kill_switch_state {
                KILL_SWITCH_ON
            } else {
                KILL_SWITCH_OFF
            };
            Answer::Text(format!("$KillSwitch: {}", code))
        }
        None => Answer::not_found(),
    })
}

/// Flight status, zone hash and ping delay in one reply.
pub async fn flight_info(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    if !state.flight_info_response() {
        return Err(ApiError::Forbidden);
    }
    let Some(vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? else {
        return Ok(Answer::not_found());
    };
    let hash = zones_hash_text(state).await;
    Ok(Answer::Text(
        MessageBuilder::new()
            .segment("Flight", vehicle.flight_code())
            .raw(&hash)
            .segment("Delay", vehicle.delay)
            .build(),
    ))
}

/// Store one telemetry sample and report the arm flag back.
pub async fn telemetry(
    state: &AppState,
    id: &str,
    report: &TelemetryReport,
) -> Result<Answer, ApiError> {
    let _guard = state.lock_vehicle(id).await;
    let vehicle = match vehicles::get_vehicle(state.db.pool(), id).await? {
        Some(vehicle) => vehicle,
        None if state.display_only() => {
            let vehicle = Vehicle::new(id);
            vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
            info!("Display mode: registered vehicle {} from telemetry", id);
            vehicle
        }
        None => return Ok(Answer::not_found()),
    };
    let sample = report.decode(id, Utc::now());
    telemetry::insert_sample(state.db.pool(), &sample).await?;
    Ok(Answer::Text(format!("$Arm: {}", vehicle.arm_code())))
}

/// The accepted mission in compact form.
pub async fn fmission_kos(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    Ok(match missions::get_mission(state.db.pool(), id).await? {
        Some(mission) if mission.is_accepted && !mission.steps.is_empty() => Answer::Text(
            MessageBuilder::new()
                .segment("FlightMission", mission.joined())
                .build(),
        ),
        _ => Answer::not_found(),
    })
}

pub async fn get_all_forbidden_zones(state: &AppState) -> Result<Answer, ApiError> {
    Ok(match state.zones.load().await {
        Ok(zones) => Answer::Text(zones.canonical()),
        Err(e) => {
            error!("Zone snapshot unavailable: {:#}", e);
            Answer::not_found()
        }
    })
}

pub async fn get_forbidden_zones_delta(state: &AppState) -> Result<Answer, ApiError> {
    Ok(match state.zones.load_delta().await {
        Ok(delta) => Answer::Text(delta.delta_string()),
        Err(e) => {
            error!("Zone delta unavailable: {:#}", e);
            Answer::not_found()
        }
    })
}

pub async fn forbidden_zones_hash(state: &AppState) -> Result<Answer, ApiError> {
    Ok(Answer::Text(zones_hash_text(state).await))
}

async fn zones_hash_text(state: &AppState) -> String {
    match state.zones.load().await {
        Ok(zones) => zones.hash_message(),
        Err(e) => {
            error!("Zone snapshot unavailable: {:#}", e);
            NOT_FOUND.to_string()
        }
    }
}

/// Replace the mission with a vehicle-revised one and wait for the operator.
///
/// `$Approve 0` when the revision ends up accepted, `$Approve 1` otherwise.
pub async fn revise_mission(state: &AppState, id: &str, mission: &str) -> Result<Answer, ApiError> {
    let rejected = || Answer::Text(MessageBuilder::new().segment("Approve", 1).build());

    let ticket = {
        let _guard = state.lock_vehicle(id).await;
        let Some(ticket) = state.revise_queue.enqueue(id) else {
            info!("Vehicle {} already waiting for revision decision", id);
            return Ok(rejected());
        };
        let steps = split_compact(mission);
        missions::replace_mission(state.db.pool(), id, &steps).await?;
        // The mission is kept even for an id with no vehicle row yet.
        if let Some(mut vehicle) = vehicles::get_vehicle(state.db.pool(), id).await? {
            vehicle.is_armed = false;
            vehicle.state = VehicleState::Waiting;
            vehicles::upsert_vehicle(state.db.pool(), &vehicle).await?;
            outbound::publish_flight_state(state, &vehicle);
        }
        ticket
    };

    info!("Vehicle {} waiting for revision decision", id);
    let decision = ticket.wait(state.config.decision_timeout()).await;

    let accepted = missions::get_mission(state.db.pool(), id)
        .await?
        .map(|m| m.is_accepted)
        .unwrap_or(false);
    info!("Vehicle {} revision decision {:?}", id, decision);
    if accepted && decision == Decision::Approve {
        Ok(Answer::Text(
            MessageBuilder::new().segment("Approve", 0).build(),
        ))
    } else {
        Ok(rejected())
    }
}
