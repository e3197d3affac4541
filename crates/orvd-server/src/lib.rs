//! ORVD relay backend: vehicle protocol, operator API and pub/sub bridge.

pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod ops;
pub mod persistence;
pub mod pubsub;
pub mod scheduler;
pub mod state;
