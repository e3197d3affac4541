//! Core data models for the ORVD relay.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Arm status code sent to vehicles when arming is granted.
pub const ARMED: i64 = 0;
/// Arm status code sent to vehicles when arming is refused.
pub const DISARMED: i64 = 1;

pub const KILL_SWITCH_ON: i64 = 0;
pub const KILL_SWITCH_OFF: i64 = 1;

pub const MISSION_ACCEPTED: i64 = 0;
pub const MISSION_NOT_ACCEPTED: i64 = 1;
/// Reported while the vehicle waits in the revise-mission queue.
pub const MISSION_PENDING_REVISION: i64 = 2;

/// Generic "entity absent" reply.
pub const NOT_FOUND: &str = "$-1";
/// Generic success reply.
pub const OK: &str = "$OK";

/// Ping cadence assigned to freshly created vehicles.
pub const DEFAULT_DELAY_SECS: i64 = 1;

/// Namespace of an asymmetric key: whose key signs or verifies a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyGroup {
    /// The relay itself.
    Server,
    /// A vehicle (KOS board), by id.
    Vehicle(String),
    /// A mission-authoring client, by id.
    MissionSender(String),
}

impl KeyGroup {
    pub fn vehicle(id: impl Into<String>) -> Self {
        Self::Vehicle(id.into())
    }

    pub fn mission_sender(id: impl Into<String>) -> Self {
        Self::MissionSender(id.into())
    }

    /// Principal id for per-client groups.
    pub fn principal_id(&self) -> Option<&str> {
        match self {
            Self::Server => None,
            Self::Vehicle(id) | Self::MissionSender(id) => Some(id),
        }
    }
}

impl fmt::Display for KeyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Server => write!(f, "orvd"),
            Self::Vehicle(id) => write!(f, "kos{}", id),
            Self::MissionSender(id) => write!(f, "ms{}", id),
        }
    }
}

impl FromStr for KeyGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "orvd" {
            Ok(Self::Server)
        } else if let Some(id) = s.strip_prefix("kos") {
            Ok(Self::Vehicle(id.to_string()))
        } else if let Some(id) = s.strip_prefix("ms") {
            Ok(Self::MissionSender(id.to_string()))
        } else {
            Err(format!("unknown key group '{}'", s))
        }
    }
}

/// Lifecycle state of a vehicle as shown to operators.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VehicleState {
    /// Authenticated, not flying
    #[default]
    Online,
    /// Blocked on an operator decision
    Waiting,
    /// Armed with an accepted mission
    Flying,
    /// Emergency stop engaged
    KillSwitchOn,
}

impl VehicleState {
    /// Display label reported by the state query.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Online => "Online",
            Self::Waiting => "Waiting",
            Self::Flying => "Flying",
            Self::KillSwitchOn => "Kill switch ON",
        }
    }

    /// Storage key used by the persistence layer.
    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Waiting => "waiting",
            Self::Flying => "flying",
            Self::KillSwitchOn => "kill_switch_on",
        }
    }

    pub fn from_key(key: &str) -> Self {
        match key {
            "waiting" => Self::Waiting,
            "flying" => Self::Flying,
            "kill_switch_on" => Self::KillSwitchOn,
            _ => Self::Online,
        }
    }
}

/// A vehicle record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: String,
    pub is_armed: bool,
    pub state: VehicleState,
    pub kill_switch_state: bool,
    /// Ping cadence in seconds
    pub delay: i64,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// A vehicle as created on first contact.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            is_armed: false,
            state: VehicleState::Online,
            kill_switch_state: false,
            delay: DEFAULT_DELAY_SECS,
            created_at: Utc::now(),
        }
    }

    /// Flight status code: `-1` kill switch, `0` armed, `1` disarmed.
    pub fn flight_code(&self) -> i64 {
        if self.kill_switch_state {
            -1
        } else if self.is_armed {
            ARMED
        } else {
            DISARMED
        }
    }

    pub fn arm_code(&self) -> i64 {
        if self.is_armed {
            ARMED
        } else {
            DISARMED
        }
    }
}

/// Operator verdict on a pending request. Code `0` approves, anything else rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn from_code(code: i64) -> Self {
        if code == 0 {
            Self::Approve
        } else {
            Self::Reject
        }
    }

    pub fn is_approve(&self) -> bool {
        matches!(self, Self::Approve)
    }
}

/// The single active mission of a vehicle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mission {
    pub vehicle_id: String,
    pub is_accepted: bool,
    /// Compact-encoded commands in step order
    pub steps: Vec<String>,
}

impl Mission {
    pub fn new(vehicle_id: impl Into<String>, steps: Vec<String>) -> Self {
        Self {
            vehicle_id: vehicle_id.into(),
            is_accepted: false,
            steps,
        }
    }

    /// Steps joined into the wire form.
    pub fn joined(&self) -> String {
        self.steps.join("&")
    }

    pub fn state_code(&self) -> i64 {
        if self.is_accepted {
            MISSION_ACCEPTED
        } else {
            MISSION_NOT_ACCEPTED
        }
    }
}

/// A stored telemetry sample with physical units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySample {
    pub vehicle_id: String,
    pub record_time: DateTime<Utc>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub alt: Option<f64>,
    pub azimuth: Option<f64>,
    pub dop: Option<f64>,
    pub sats: Option<i64>,
    pub speed: Option<f64>,
}

/// Raw telemetry as reported by a vehicle: fixed-point integers rendered as text.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryReport {
    pub lat: Option<String>,
    pub lon: Option<String>,
    pub alt: Option<String>,
    pub azimuth: Option<String>,
    pub dop: Option<String>,
    pub sats: Option<String>,
    pub speed: Option<String>,
}

impl TelemetryReport {
    /// Scale the raw report into a sample. Unparsable fields become `None`.
    ///
    /// Latitude, longitude and azimuth arrive in 1e-7 units, altitude in centimeters.
    pub fn decode(&self, vehicle_id: &str, record_time: DateTime<Utc>) -> TelemetrySample {
        TelemetrySample {
            vehicle_id: vehicle_id.to_string(),
            record_time,
            lat: parse_f64(&self.lat).map(|v| v / 1e7),
            lon: parse_f64(&self.lon).map(|v| v / 1e7),
            alt: parse_f64(&self.alt).map(|v| v / 1e2),
            azimuth: parse_f64(&self.azimuth).map(|v| v / 1e7),
            dop: parse_f64(&self.dop),
            sats: self
                .sats
                .as_deref()
                .and_then(|s| s.trim().parse::<i64>().ok()),
            speed: parse_f64(&self.speed),
        }
    }
}

fn parse_f64(value: &Option<String>) -> Option<f64> {
    value
        .as_deref()
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}

/// Registered operator account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperatorUser {
    pub username: String,
    pub password_hash: String,
    pub access_token: String,
}
