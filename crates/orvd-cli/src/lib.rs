//! ORVD CLI - Command line tools for the ORVD relay.
//!
//! - kos_sim: vehicle simulator flying the accepted mission
//! - send_mission: upload a WPL file as a mission sender
//! - watch_topics: print relay publications

pub mod sim;
