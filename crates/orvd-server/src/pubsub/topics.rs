//! Topic names.

// Inbound, published by vehicles and mission senders.
pub const TELEMETRY: &str = "api/telemetry/{id}";
pub const MISSION: &str = "api/mission/{id}";
pub const ARM_REQUEST: &str = "api/arm/request/{id}";
pub const NMISSION_REQUEST: &str = "api/nmission/request/{id}";
pub const LOGS: &str = "api/logs/{id}";

// Outbound, signed by the relay.
pub const FORBIDDEN_ZONES: &str = "api/forbidden_zones";

pub fn ping(id: &str) -> String {
    format!("ping/{}", id)
}

pub fn arm_response(id: &str) -> String {
    format!("api/arm/response/{}", id)
}

pub fn nmission_response(id: &str) -> String {
    format!("api/nmission/response/{}", id)
}

pub fn flight_status(id: &str) -> String {
    format!("api/flight_status/{}", id)
}

pub fn fmission_kos(id: &str) -> String {
    format!("api/fmission_kos/{}", id)
}

pub fn auth(id: &str) -> String {
    format!("api/auth/{}", id)
}
