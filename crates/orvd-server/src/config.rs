//! Server configuration from environment.

use std::env;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub database_path: String,
    pub database_max_connections: u32,
    pub zones_path: String,
    pub zones_delta_path: String,
    pub logs_path: String,
    /// Modulus size for generated keypairs
    pub key_bits: usize,
    /// Upper bound on arm / revision waits
    pub decision_timeout_secs: u64,
    pub admin_login: String,
    pub admin_password: String,
    /// Accept telemetry and missions from vehicles that never authenticated
    pub display_only: bool,
    /// Wipe vehicles, missions and telemetry at startup
    pub clean_db: bool,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            server_port: env::var("ORVD_PORT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(8080),
            database_path: env::var("ORVD_DATABASE_PATH")
                .unwrap_or_else(|_| "data/orvd.db".to_string()),
            database_max_connections: env::var("ORVD_DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
            zones_path: env::var("ORVD_ZONES_PATH")
                .unwrap_or_else(|_| "data/forbidden_zones.json".to_string()),
            zones_delta_path: env::var("ORVD_ZONES_DELTA_PATH")
                .unwrap_or_else(|_| "data/forbidden_zones_delta.json".to_string()),
            logs_path: env::var("ORVD_LOGS_PATH").unwrap_or_else(|_| "logs".to_string()),
            key_bits: env::var("ORVD_KEY_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(orvd_core::crypto::DEFAULT_KEY_BITS),
            decision_timeout_secs: env::var("ORVD_DECISION_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(300),
            admin_login: env::var("ADMIN_LOGIN").unwrap_or_else(|_| "admin".to_string()),
            admin_password: env::var("ADMIN_PASSW").unwrap_or_else(|_| "passw".to_string()),
            display_only: env_flag("ORVD_DISPLAY_ONLY"),
            clean_db: env_flag("ORVD_CLEAN_DB"),
        }
    }

    pub fn decision_timeout(&self) -> Duration {
        Duration::from_secs(self.decision_timeout_secs)
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
