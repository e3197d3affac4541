//! Signed notifications pushed to vehicles.

use orvd_core::models::Vehicle;
use orvd_core::wire::MessageBuilder;
use orvd_core::zones::ZoneSet;
use tracing::{debug, error, info};

use super::topics;
use crate::persistence::vehicles;
use crate::state::AppState;

fn publish_signed(state: &AppState, topic: &str, body: &str) {
    state.broker.publish(topic, state.keys.sign_reply(body));
}

/// `$Flight {-1|0|1}` on `api/flight_status/{id}`.
pub fn publish_flight_state(state: &AppState, vehicle: &Vehicle) {
    let body = MessageBuilder::new()
        .segment("Flight", vehicle.flight_code())
        .build();
    publish_signed(state, &topics::flight_status(&vehicle.id), &body);
    info!("Vehicle {} flight state {}", vehicle.id, vehicle.flight_code());
}

/// `$Delay {d}` on `ping/{id}`. Silently skipped for unknown vehicles.
pub async fn publish_ping(state: &AppState, vehicle_id: &str) {
    match vehicles::get_vehicle(state.db.pool(), vehicle_id).await {
        Ok(Some(vehicle)) => {
            let body = MessageBuilder::new().segment("Delay", vehicle.delay).build();
            publish_signed(state, &topics::ping(vehicle_id), &body);
        }
        Ok(None) => debug!("Ping skipped, vehicle {} not found", vehicle_id),
        Err(e) => error!("Ping for {} failed: {:#}", vehicle_id, e),
    }
}

/// Canonical zone string on `api/forbidden_zones`.
pub fn publish_zones(state: &AppState, zones: &ZoneSet) {
    publish_signed(state, topics::FORBIDDEN_ZONES, &zones.canonical());
    info!("Published {} forbidden zones", zones.len());
}

/// Reload the snapshot and publish it. Read failures are logged only.
pub async fn publish_current_zones(state: &AppState) {
    match state.zones.load().await {
        Ok(zones) => publish_zones(state, &zones),
        Err(e) => error!("Zone publish skipped: {:#}", e),
    }
}

/// `$FlightMission {steps}` on `api/fmission_kos/{id}`.
pub fn publish_mission(state: &AppState, vehicle_id: &str, joined_steps: &str) {
    let body = MessageBuilder::new()
        .segment("FlightMission", joined_steps)
        .build();
    publish_signed(state, &topics::fmission_kos(vehicle_id), &body);
    info!("Mission sent to vehicle {}", vehicle_id);
}

/// Auth acknowledgement on `api/auth/{id}`.
pub fn publish_auth(state: &AppState, vehicle_id: &str, reply: &str) {
    publish_signed(state, &topics::auth(vehicle_id), reply);
}

/// Answer to a request that arrived over pub/sub, already signed by the dispatch layer.
pub fn publish_reply(state: &AppState, topic: &str, signed_reply: String) {
    debug!("Replied on {}", topic);
    state.broker.publish(topic, signed_reply);
}
