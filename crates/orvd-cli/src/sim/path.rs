//! Flight path along an accepted mission.

use anyhow::{Context, Result};
use orvd_core::mission::parse_compact;

/// Trait for flight path implementations.
pub trait FlightPath: Send + Sync {
    /// Get (lat, lon, altitude_m) at time t seconds from start.
    fn get_position(&self, t: f64) -> (f64, f64, f64);

    /// Get approximate heading at time t (degrees, 0 = North).
    fn get_heading(&self, t: f64) -> f64 {
        let dt = 0.1;
        let (lat1, lon1, _) = self.get_position(t);
        let (lat2, lon2, _) = self.get_position(t + dt);

        let dlat = lat2 - lat1;
        let dlon = lon2 - lon1;

        if dlat.abs() < 1e-10 && dlon.abs() < 1e-10 {
            return 0.0;
        }

        let heading_deg = dlon.atan2(dlat).to_degrees();
        if heading_deg < 0.0 {
            heading_deg + 360.0
        } else {
            heading_deg
        }
    }

    /// Get speed in meters per second.
    fn get_speed_mps(&self) -> f64;

    /// Seconds until the path ends.
    fn duration(&self) -> f64;
}

/// Piecewise-linear path through the positional steps of a compact mission.
///
/// `H` starts the path, `T` climbs in place, `W` and `L` add points.
/// Servo and delay steps do not move the vehicle.
#[derive(Debug, Clone)]
pub struct MissionPath {
    points: Vec<(f64, f64, f64)>,
    /// Cumulative seconds at each point
    times: Vec<f64>,
    speed_mps: f64,
}

impl MissionPath {
    /// Build from `H..&T..&W..` or a `$FlightMission` value.
    pub fn from_compact(mission: &str, speed_mps: f64) -> Result<Self> {
        let mut points: Vec<(f64, f64, f64)> = Vec::new();
        for command in parse_compact(mission) {
            let values = command
                .fields
                .iter()
                .map(|f| f.parse::<f64>())
                .collect::<Result<Vec<_>, _>>()
                .with_context(|| format!("bad step {}", command.encode()))?;
            match (command.letter, values.as_slice()) {
                ('H' | 'W' | 'L', [lat, lon, alt]) => points.push((*lat, *lon, *alt)),
                ('T', [alt]) => {
                    let &(lat, lon, _) = points.last().context("takeoff before home")?;
                    points.push((lat, lon, *alt));
                }
                ('S' | 'D', _) => {}
                _ => anyhow::bail!("unexpected step {}", command.encode()),
            }
        }
        if points.is_empty() {
            anyhow::bail!("mission has no positions");
        }

        let mut times = vec![0.0];
        for pair in points.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            let horizontal = haversine_distance(a.0, a.1, b.0, b.1);
            let vertical = b.2 - a.2;
            let leg = (horizontal.powi(2) + vertical.powi(2)).sqrt();
            let secs = if speed_mps > 0.0 { leg / speed_mps } else { 0.0 };
            times.push(times[times.len() - 1] + secs);
        }

        Ok(Self {
            points,
            times,
            speed_mps,
        })
    }

    pub fn points(&self) -> &[(f64, f64, f64)] {
        &self.points
    }
}

impl FlightPath for MissionPath {
    fn get_position(&self, t: f64) -> (f64, f64, f64) {
        let last = self.points.len() - 1;
        if t <= 0.0 || last == 0 {
            return self.points[0];
        }
        if t >= self.times[last] {
            return self.points[last];
        }
        let i = self.times.partition_point(|&start| start <= t) - 1;
        let span = self.times[i + 1] - self.times[i];
        let frac = if span > 0.0 { (t - self.times[i]) / span } else { 1.0 };
        let (a, b) = (self.points[i], self.points[i + 1]);
        (
            a.0 + (b.0 - a.0) * frac,
            a.1 + (b.1 - a.1) * frac,
            a.2 + (b.2 - a.2) * frac,
        )
    }

    fn get_speed_mps(&self) -> f64 {
        self.speed_mps
    }

    fn duration(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    const R: f64 = 6_371_000.0; // Earth radius in meters

    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();

    let a = (dphi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (dlambda / 2.0).sin().powi(2);

    2.0 * R * a.sqrt().atan2((1.0 - a).sqrt())
}
