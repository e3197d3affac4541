//! Vehicle simulation helpers.

pub mod path;

pub use path::{FlightPath, MissionPath};
