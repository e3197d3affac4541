//! ORVD SDK - vehicle and mission sender integration library
//!
//! Signs requests the way the relay expects and checks the relay's signature on replies.

pub mod client;
pub mod mission_sender;
pub mod subscriber;
pub mod telemetry;

pub use client::{SignedReply, VehicleClient};
pub use mission_sender::MissionSenderClient;
pub use orvd_core::models::TelemetryReport;
pub use subscriber::{Publication, TopicStream};
