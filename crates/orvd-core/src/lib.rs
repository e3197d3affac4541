pub mod crypto;
pub mod mission;
pub mod models;
pub mod topic;
pub mod wire;
pub mod zones;

pub use crypto::{CryptoError, KeyPair, PublicKey};
pub use mission::{MissionCommand, MissionError, MISSION_OK};
pub use models::{
    Decision, KeyGroup, Mission, OperatorUser, TelemetryReport, TelemetrySample, Vehicle,
    VehicleState,
};
pub use topic::{TopicError, TopicParams, TopicPattern};
pub use wire::{Message, MessageBuilder};
pub use zones::{compute_delta, ChangeType, ZoneFeature, ZoneSet};
