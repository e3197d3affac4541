//! Telemetry encoding and upload helpers.

use crate::client::SignedReply;
use crate::VehicleClient;
use anyhow::Result;
use orvd_core::models::TelemetryReport;

/// One position fix in natural units.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Fix {
    pub lat: f64,
    pub lon: f64,
    pub alt_m: f64,
    pub azimuth_deg: f64,
    pub dop: f64,
    pub sats: u32,
    pub speed: f64,
}

impl Fix {
    /// Fixed-point encoding: degrees in 1e-7 units, altitude in centimeters.
    pub fn encode(&self) -> TelemetryReport {
        TelemetryReport {
            lat: Some(format!("{}", (self.lat * 1e7).round() as i64)),
            lon: Some(format!("{}", (self.lon * 1e7).round() as i64)),
            alt: Some(format!("{}", (self.alt_m * 1e2).round() as i64)),
            azimuth: Some(format!("{}", (self.azimuth_deg * 1e7).round() as i64)),
            dop: Some(self.dop.to_string()),
            sats: Some(self.sats.to_string()),
            speed: Some(self.speed.to_string()),
        }
    }
}

/// Present fields of a report as query pairs, in wire order.
pub fn report_pairs(report: &TelemetryReport) -> Vec<(&'static str, &str)> {
    [
        ("lat", &report.lat),
        ("lon", &report.lon),
        ("alt", &report.alt),
        ("azimuth", &report.azimuth),
        ("dop", &report.dop),
        ("sats", &report.sats),
        ("speed", &report.speed),
    ]
    .into_iter()
    .filter_map(|(key, value)| value.as_deref().map(|v| (key, v)))
    .collect()
}

impl VehicleClient {
    /// Send telemetry; the reply carries the current arm flag as `$Arm: {0|1}`.
    pub async fn send_telemetry(&self, report: &TelemetryReport) -> Result<SignedReply> {
        self.signed_get("/api/telemetry", &report_pairs(report)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fix_encodes_to_fixed_point() {
        let fix = Fix {
            lat: 55.7512345,
            lon: 37.6,
            alt_m: 5.0,
            azimuth_deg: 90.0,
            dop: 1.5,
            sats: 7,
            speed: 3.0,
        };
        let report = fix.encode();
        assert_eq!(report.lat.as_deref(), Some("557512345"));
        assert_eq!(report.alt.as_deref(), Some("500"));

        let sample = report.decode("V1", Default::default());
        assert_eq!(sample.alt, Some(5.0));
        assert_eq!(sample.sats, Some(7));
        assert!((sample.lat.unwrap() - 55.7512345).abs() < 1e-9);
    }

    #[test]
    fn pairs_skip_missing_fields() {
        let report = TelemetryReport {
            lat: Some("1".into()),
            speed: Some("2".into()),
            ..Default::default()
        };
        assert_eq!(report_pairs(&report), vec![("lat", "1"), ("speed", "2")]);
    }
}
