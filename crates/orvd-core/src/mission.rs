//! Mission codec.
//!
//! Missions arrive as QGroundControl `QGC WPL 110` plans and travel to vehicles
//! in a compact grammar: one letter per command followed by `_`-joined fields,
//! commands joined with `&`.

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const WPL_HEADER: &str = "QGC WPL 110";

pub const CMD_WAYPOINT: i64 = 16;
pub const CMD_LAND: i64 = 21;
pub const CMD_TAKEOFF: i64 = 22;
pub const CMD_DELAY: i64 = 93;
pub const CMD_SERVO: i64 = 183;

/// Verification outcome reported to mission senders.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MissionError {
    #[error("Error: The mission contains a waypoint with non-zero delay.")]
    NonZeroDelayWaypoint,

    #[error("Error: Delay in the mission can contain only one parameter (delay in seconds).")]
    WrongDelay,

    #[error("Error: The mission contains an unknown command. Allowed commands: 16, 21, 22, 93, 183.")]
    UnknownCommand,

    #[error("Error: File is not supported WP version")]
    UnsupportedFormat,
}

/// Status string for an accepted plan.
pub const MISSION_OK: &str = "Mission accepted.";

/// A decoded mission command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MissionCommand {
    Home { lat: f64, lon: f64, alt: f64 },
    Takeoff { alt: f64 },
    Waypoint { lat: f64, lon: f64, alt: f64 },
    Servo { number: f64, pwm: f64 },
    Land { lat: f64, lon: f64, alt: f64 },
    Delay { secs: f64 },
}

impl MissionCommand {
    pub fn letter(&self) -> char {
        match self {
            Self::Home { .. } => 'H',
            Self::Takeoff { .. } => 'T',
            Self::Waypoint { .. } => 'W',
            Self::Servo { .. } => 'S',
            Self::Land { .. } => 'L',
            Self::Delay { .. } => 'D',
        }
    }

    /// Compact form, e.g. `H55.75_37.61_150.0`.
    pub fn encode(&self) -> String {
        let fields: Vec<String> = match self {
            Self::Home { lat, lon, alt }
            | Self::Waypoint { lat, lon, alt }
            | Self::Land { lat, lon, alt } => {
                vec![format_float(*lat), format_float(*lon), format_float(*alt)]
            }
            Self::Takeoff { alt } => vec![format_float(*alt)],
            Self::Servo { number, pwm } => vec![format_float(*number), format_float(*pwm)],
            Self::Delay { secs } => vec![format_float(*secs)],
        };
        format!("{}{}", self.letter(), fields.join("_"))
    }
}

/// One raw WPL data row.
#[derive(Debug, Clone, PartialEq)]
struct WplRow {
    index: i64,
    current_wp: i64,
    frame: i64,
    command: i64,
    params: [f64; 7],
}

impl WplRow {
    fn parse(line: &str) -> Result<Self, MissionError> {
        let cols: Vec<&str> = line.split('\t').collect();
        if cols.len() < 11 {
            return Err(MissionError::UnsupportedFormat);
        }
        let int = |s: &str| s.trim().parse::<i64>().map_err(|_| MissionError::UnsupportedFormat);
        let float = |s: &str| s.trim().parse::<f64>().map_err(|_| MissionError::UnsupportedFormat);

        let mut params = [0.0; 7];
        for (slot, col) in params.iter_mut().zip(&cols[4..11]) {
            *slot = float(col)?;
        }
        Ok(Self {
            index: int(cols[0])?,
            current_wp: int(cols[1])?,
            frame: int(cols[2])?,
            command: int(cols[3])?,
            params,
        })
    }
}

/// Decode a WPL plan into commands.
///
/// The first failing row decides the error. An empty line ends the plan.
pub fn decode_wpl(text: &str) -> Result<Vec<MissionCommand>, MissionError> {
    let separator = if text.contains('\r') { "\r\n" } else { "\n" };
    let mut commands: Vec<MissionCommand> = Vec::new();

    for (i, line) in text.split(separator).enumerate() {
        if line.is_empty() {
            break;
        }
        if i == 0 {
            if !line.starts_with(WPL_HEADER) {
                return Err(MissionError::UnsupportedFormat);
            }
            continue;
        }

        let row = WplRow::parse(line)?;
        let [p1, p2, p3, p4, p5, p6, p7] = row.params;

        let command = if row.index == 0 && row.current_wp == 1 && row.frame == 0 {
            MissionCommand::Home {
                lat: round_to(p5, 7),
                lon: round_to(p6, 7),
                alt: round_to(p7, 2),
            }
        } else {
            match row.command {
                CMD_TAKEOFF => MissionCommand::Takeoff { alt: round_to(p7, 2) },
                CMD_WAYPOINT if p1 == 0.0 => MissionCommand::Waypoint {
                    lat: round_to(p5, 7),
                    lon: round_to(p6, 7),
                    alt: round_to(p7, 2),
                },
                CMD_WAYPOINT => return Err(MissionError::NonZeroDelayWaypoint),
                CMD_SERVO => MissionCommand::Servo { number: p1, pwm: p2 },
                CMD_LAND => land_command(p5, p6, p7, commands.first()),
                CMD_DELAY if p2 == 0.0 && p3 == 0.0 && p4 == 0.0 => {
                    MissionCommand::Delay { secs: p1 }
                }
                CMD_DELAY => return Err(MissionError::WrongDelay),
                _ => return Err(MissionError::UnknownCommand),
            }
        };
        commands.push(command);
    }

    Ok(commands)
}

/// Land with zeroed coordinates inherits them from Home when Home leads the plan.
fn land_command(lat: f64, lon: f64, alt: f64, first: Option<&MissionCommand>) -> MissionCommand {
    let (lat, lon, alt) = match first {
        Some(MissionCommand::Home {
            lat: h_lat,
            lon: h_lon,
            alt: h_alt,
        }) => (
            if lat == 0.0 { *h_lat } else { lat },
            if lon == 0.0 { *h_lon } else { lon },
            if alt == 0.0 { *h_alt } else { alt },
        ),
        _ => (lat, lon, alt),
    };
    MissionCommand::Land {
        lat: round_to(lat, 7),
        lon: round_to(lon, 7),
        alt: round_to(alt, 2),
    }
}

/// Decode and encode in one step, yielding compact steps.
pub fn read_mission(text: &str) -> Result<Vec<String>, MissionError> {
    Ok(encode_mission(&decode_wpl(text)?))
}

pub fn encode_mission(commands: &[MissionCommand]) -> Vec<String> {
    commands.iter().map(MissionCommand::encode).collect()
}

/// A compact command split into its letter and raw fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactCommand {
    pub letter: char,
    pub fields: Vec<String>,
}

impl CompactCommand {
    pub fn encode(&self) -> String {
        format!("{}{}", self.letter, self.fields.join("_"))
    }
}

/// Split a compact mission into steps. Both `&` and `*` separate commands.
pub fn split_compact(mission: &str) -> Vec<String> {
    mission
        .split(['&', '*'])
        .filter(|step| !step.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse a compact mission without interpreting field values.
pub fn parse_compact(mission: &str) -> Vec<CompactCommand> {
    split_compact(mission)
        .into_iter()
        .filter_map(|step| {
            let mut chars = step.chars();
            let letter = chars.next()?;
            let rest = chars.as_str();
            let fields = if rest.is_empty() {
                Vec::new()
            } else {
                rest.split('_').map(str::to_string).collect()
            };
            Some(CompactCommand { letter, fields })
        })
        .collect()
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Shortest round-trip rendering; integral values keep a trailing `.0`.
///
/// Magnitudes below `1e-4` or from `1e16` up switch to exponent form with a
/// signed two-digit exponent (`1e-05`, `1.5e+16`).
pub fn format_float(value: f64) -> String {
    if !value.is_finite() {
        return format!("{}", value);
    }
    let scientific = format!("{:e}", value);
    let exponent = scientific
        .split_once('e')
        .and_then(|(mantissa, exp)| Some((mantissa, exp.parse::<i32>().ok()?)));
    match exponent {
        Some((mantissa, exp)) if value != 0.0 && !(-4..16).contains(&exp) => {
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{}e{}{:02}", mantissa, sign, exp.abs())
        }
        _ if value.fract() == 0.0 => format!("{:.1}", value),
        _ => format!("{}", value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(index: i64, current: i64, frame: i64, cmd: i64, p: [f64; 7]) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t1",
            index, current, frame, cmd, p[0], p[1], p[2], p[3], p[4], p[5], p[6]
        )
    }

    fn plan(rows: &[String]) -> String {
        let mut text = String::from("QGC WPL 110\n");
        for r in rows {
            text.push_str(r);
            text.push('\n');
        }
        text
    }

    #[test]
    fn decodes_full_plan() {
        let text = plan(&[
            row(0, 1, 0, 16, [0.0, 0.0, 0.0, 0.0, 55.123456789, 37.5, 150.456]),
            row(1, 0, 3, 22, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]),
            row(2, 0, 3, 16, [0.0, 0.0, 0.0, 0.0, 55.2, 37.6, 5.0]),
            row(3, 0, 3, 183, [5.0, 1200.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            row(4, 0, 3, 93, [3.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            row(5, 0, 3, 21, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        let steps = read_mission(&text).unwrap();
        assert_eq!(
            steps,
            vec![
                "H55.1234568_37.5_150.46",
                "T5.0",
                "W55.2_37.6_5.0",
                "S5.0_1200.0",
                "D3.0",
                "L55.1234568_37.5_150.46",
            ]
        );
    }

    #[test]
    fn land_without_home_keeps_zeros() {
        let text = plan(&[
            row(1, 0, 3, 22, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]),
            row(2, 0, 3, 21, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
        ]);
        assert_eq!(read_mission(&text).unwrap(), vec!["T5.0", "L0.0_0.0_0.0"]);
    }

    #[test]
    fn crlf_plans_split_on_crlf() {
        let text = "QGC WPL 110\r\n".to_string()
            + &row(1, 0, 3, 22, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 7.5])
            + "\r\n";
        assert_eq!(read_mission(&text).unwrap(), vec!["T7.5"]);
    }

    #[test]
    fn verification_errors() {
        let waypoint = plan(&[row(1, 0, 3, 16, [2.0, 0.0, 0.0, 0.0, 1.0, 1.0, 1.0])]);
        assert_eq!(read_mission(&waypoint), Err(MissionError::NonZeroDelayWaypoint));

        let delay = plan(&[row(1, 0, 3, 93, [2.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0])]);
        assert_eq!(read_mission(&delay), Err(MissionError::WrongDelay));

        let unknown = plan(&[row(1, 0, 3, 17, [0.0; 7])]);
        assert_eq!(read_mission(&unknown), Err(MissionError::UnknownCommand));

        assert_eq!(read_mission("QGC WPL 200\n"), Err(MissionError::UnsupportedFormat));
        assert_eq!(
            read_mission("QGC WPL 110\n1\t0\t3\tabc"),
            Err(MissionError::UnsupportedFormat)
        );
    }

    #[test]
    fn status_strings() {
        assert_eq!(
            MissionError::UnknownCommand.to_string(),
            "Error: The mission contains an unknown command. Allowed commands: 16, 21, 22, 93, 183."
        );
        assert_eq!(
            MissionError::UnsupportedFormat.to_string(),
            "Error: File is not supported WP version"
        );
    }

    #[test]
    fn compact_roundtrip_is_stable() {
        let text = plan(&[
            row(0, 1, 0, 16, [0.0, 0.0, 0.0, 0.0, 10.5, 20.25, 100.0]),
            row(1, 0, 3, 22, [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 5.0]),
            row(2, 0, 3, 16, [0.0, 0.0, 0.0, 0.0, 10.6, 20.3, 5.0]),
        ]);
        let steps = read_mission(&text).unwrap();
        let joined = steps.join("&");
        let reencoded: Vec<String> = parse_compact(&joined).iter().map(CompactCommand::encode).collect();
        assert_eq!(reencoded, steps);
    }

    #[test]
    fn revision_payload_splits_on_star() {
        assert_eq!(split_compact("H1.0_2.0_3.0*T5.0*L1.0_2.0_0.0"), vec![
            "H1.0_2.0_3.0",
            "T5.0",
            "L1.0_2.0_0.0"
        ]);
        let parsed = parse_compact("W1.0_2.0_3.0");
        assert_eq!(parsed[0].letter, 'W');
        assert_eq!(parsed[0].fields, vec!["1.0", "2.0", "3.0"]);
    }

    #[test]
    fn float_rendering() {
        assert_eq!(format_float(5.0), "5.0");
        assert_eq!(format_float(-0.5), "-0.5");
        assert_eq!(format_float(55.1234568), "55.1234568");
        assert_eq!(format_float(0.0), "0.0");
    }

    #[test]
    fn float_rendering_switches_to_exponent_form() {
        assert_eq!(format_float(0.0001), "0.0001");
        assert_eq!(format_float(round_to(0.00001, 7)), "1e-05");
        assert_eq!(format_float(-0.0000015), "-1.5e-06");
        assert_eq!(format_float(1e15), "1000000000000000.0");
        assert_eq!(format_float(1e16), "1e+16");
        assert_eq!(format_float(1.5e17), "1.5e+17");
        assert_eq!(format_float(1.234e120), "1.234e+120");
    }
}
