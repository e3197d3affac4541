//! Route table.

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;

use crate::api::{admin, logs, mission_sender, request_id, vehicle, ws};
use crate::state::AppState;

/// Create the API router.
pub fn create_router() -> Router<Arc<AppState>> {
    // Signed by the vehicle, key exchange excepted
    let vehicle_routes = Router::new()
        .route("/api/key", get(vehicle::key))
        .route("/api/auth", get(vehicle::auth))
        .route("/api/arm", get(vehicle::arm))
        .route("/api/fly_accept", get(vehicle::fly_accept))
        .route("/api/flight_info", get(vehicle::flight_info))
        .route("/api/telemetry", get(vehicle::telemetry))
        .route("/api/kill_switch", get(vehicle::kill_switch))
        .route("/api/fmission_kos", get(vehicle::fmission_kos))
        .route("/api/get_all_forbidden_zones", get(vehicle::get_all_forbidden_zones))
        .route("/api/get_forbidden_zones_delta", get(vehicle::get_forbidden_zones_delta))
        .route("/api/forbidden_zones_hash", get(vehicle::forbidden_zones_hash))
        .route("/api/nmission", get(vehicle::nmission))
        .route("/api/logs", get(vehicle::log));

    let mission_sender_routes = Router::new()
        .route("/mission_sender/key", get(mission_sender::key))
        .route("/mission_sender/fmission_ms", post(mission_sender::fmission_ms));

    // Token checked per handler
    let admin_routes = Router::new()
        .route("/admin/auth", get(admin::login))
        .route("/admin/arm_decision", get(admin::arm_decision))
        .route("/admin/mission_decision", get(admin::mission_decision))
        .route("/admin/force_disarm", get(admin::force_disarm))
        .route("/admin/force_disarm_all", get(admin::force_disarm_all))
        .route("/admin/kill_switch", get(admin::kill_switch))
        .route("/admin/get_state", get(admin::get_state))
        .route("/admin/get_mission_state", get(admin::get_mission_state))
        .route("/admin/get_mission", get(admin::get_mission))
        .route("/admin/get_telemetry", get(admin::get_telemetry))
        .route("/admin/get_waiter_number", get(admin::get_waiter_number))
        .route("/admin/get_id_list", get(admin::get_id_list))
        .route("/admin/change_fly_accept", get(admin::change_fly_accept))
        .route("/admin/get_forbidden_zones", get(admin::get_forbidden_zones))
        .route("/admin/get_forbidden_zone", get(admin::get_forbidden_zone))
        .route("/admin/get_forbidden_zones_names", get(admin::get_forbidden_zones_names))
        .route("/admin/set_forbidden_zone", post(admin::set_forbidden_zone))
        .route("/admin/delete_forbidden_zone", delete(admin::delete_forbidden_zone))
        .route("/admin/export_forbidden_zones", get(admin::export_forbidden_zones))
        .route("/admin/import_forbidden_zones", post(admin::import_forbidden_zones))
        .route("/admin/get_delay", get(admin::get_delay))
        .route("/admin/set_delay", get(admin::set_delay))
        .route("/admin/revise_mission_decision", get(admin::revise_mission_decision))
        .route("/admin/get_display_mode", get(admin::get_display_mode))
        .route("/admin/toggle_display_mode", get(admin::toggle_display_mode))
        .route(
            "/admin/get_flight_info_response_mode",
            get(admin::get_flight_info_response_mode),
        )
        .route(
            "/admin/toggle_flight_info_response_mode",
            get(admin::toggle_flight_info_response_mode),
        )
        .route("/admin/get_all_data", get(admin::get_all_data));

    let general_routes = Router::new()
        .route("/logs/get_logs", get(logs::get_logs))
        .route("/logs/get_telemetry_csv", get(logs::get_telemetry_csv))
        .route("/health", get(logs::health))
        .route("/v1/pubsub", get(ws::ws_handler));

    vehicle_routes
        .merge(mission_sender_routes)
        .merge(admin_routes)
        .merge(general_routes)
        .layer(middleware::from_fn(request_id::ensure_request_id))
}
