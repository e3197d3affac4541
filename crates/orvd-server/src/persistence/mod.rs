//! Persistence layer for the ORVD relay.
//!
//! SQLite-backed storage for vehicles, missions, telemetry, pinned keys and
//! operator accounts.

pub mod db;
pub mod keys;
pub mod missions;
pub mod telemetry;
pub mod users;
pub mod vehicles;

pub use db::{init_database, Database};
