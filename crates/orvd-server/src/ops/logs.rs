//! Per-vehicle text logs and telemetry export.

use anyhow::Context;
use orvd_core::mission::format_float;
use orvd_core::models::TelemetrySample;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;

use crate::dispatch::Answer;
use crate::error::ApiError;
use crate::persistence::telemetry;
use crate::state::AppState;

pub const CSV_HEADER: &str = "record_time,lat,lon,alt,azimuth,dop,sats,speed";

fn log_path(state: &AppState, id: &str) -> PathBuf {
    PathBuf::from(&state.config.logs_path).join(format!("{}.txt", id))
}

/// Append `\n{log}` to the vehicle's log file.
pub async fn append_log(state: &AppState, id: &str, log: &str) -> Result<Answer, ApiError> {
    let path = log_path(state, id);
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("create {}", parent.display()))?;
    }
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .await
        .with_context(|| format!("open {}", path.display()))?;
    file.write_all(format!("\n{}", log).as_bytes())
        .await
        .with_context(|| format!("append {}", path.display()))?;
    Ok(Answer::ok())
}

/// Whole log file, `$-1` when the vehicle never logged.
pub async fn get_logs(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    let path = log_path(state, id);
    match tokio::fs::read_to_string(&path).await {
        Ok(text) => Ok(Answer::Text(text)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Answer::not_found()),
        Err(e) => Err(anyhow::Error::from(e)
            .context(format!("read {}", path.display()))
            .into()),
    }
}

/// All stored samples of a vehicle as CSV, oldest first.
pub async fn telemetry_csv(state: &AppState, id: &str) -> Result<Answer, ApiError> {
    let samples = telemetry::list_samples(state.db.pool(), id).await?;
    Ok(Answer::Text(render_csv(&samples)))
}

fn render_csv(samples: &[TelemetrySample]) -> String {
    fn cell(value: Option<f64>) -> String {
        value.map(format_float).unwrap_or_default()
    }

    let mut out = String::from(CSV_HEADER);
    for s in samples {
        out.push('\n');
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{}",
            s.record_time.to_rfc3339(),
            cell(s.lat),
            cell(s.lon),
            cell(s.alt),
            cell(s.azimuth),
            cell(s.dop),
            s.sats.map(|v| v.to_string()).unwrap_or_default(),
            cell(s.speed),
        ));
    }
    out
}
