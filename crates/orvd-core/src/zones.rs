//! Forbidden zones: canonical string, hash and change deltas.
//!
//! Zones are stored as a GeoJSON `FeatureCollection` of polygons. Order matters:
//! it is the authoring order and feeds the canonical string and hash.

use crate::crypto::sha256_hex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Kind of change recorded for a zone in a delta snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Modified,
    Deleted,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Deleted => "deleted",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneProperties {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_type: Option<ChangeType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    #[serde(rename = "type")]
    pub kind: String,
    /// Polygon rings; the first is the outer ring of `[lon, lat]` positions.
    pub coordinates: Vec<Vec<Vec<f64>>>,
}

impl Geometry {
    pub fn polygon(ring: Vec<Vec<f64>>) -> Self {
        Self {
            kind: "Polygon".to_string(),
            coordinates: vec![ring],
        }
    }

    pub fn outer_ring(&self) -> &[Vec<f64>] {
        self.coordinates.first().map(Vec::as_slice).unwrap_or(&[])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneFeature {
    #[serde(rename = "type")]
    pub kind: String,
    pub properties: ZoneProperties,
    pub geometry: Geometry,
}

impl ZoneFeature {
    pub fn new(name: impl Into<String>, ring: Vec<Vec<f64>>) -> Self {
        Self {
            kind: "Feature".to_string(),
            properties: ZoneProperties {
                name: name.into(),
                change_type: None,
            },
            geometry: Geometry::polygon(ring),
        }
    }

    pub fn name(&self) -> &str {
        &self.properties.name
    }

    fn with_change(&self, change: ChangeType) -> Self {
        let mut feature = self.clone();
        feature.properties.change_type = Some(change);
        feature
    }

    /// `&name&vertexCount&lat_lon&...` with optional change token before the count.
    fn write_canonical(&self, out: &mut String, with_change: bool) {
        let ring = self.geometry.outer_ring();
        out.push('&');
        out.push_str(self.name());
        if with_change {
            out.push('&');
            out.push_str(
                self.properties
                    .change_type
                    .map(|c| c.as_str())
                    .unwrap_or(""),
            );
        }
        out.push('&');
        out.push_str(&ring.len().to_string());
        out.push('&');
        let vertices: Vec<String> = ring.iter().map(|p| format_vertex(p)).collect();
        out.push_str(&vertices.join("&"));
    }
}

/// `lat_lon` with 7 decimals; positions are stored `[lon, lat]`.
fn format_vertex(position: &[f64]) -> String {
    let lon = position.first().copied().unwrap_or(0.0);
    let lat = position.get(1).copied().unwrap_or(0.0);
    format!("{:.7}_{:.7}", lat, lon)
}

/// Ordered set of forbidden zones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneSet {
    #[serde(rename = "type")]
    pub kind: String,
    pub features: Vec<ZoneFeature>,
}

impl Default for ZoneSet {
    fn default() -> Self {
        Self {
            kind: "FeatureCollection".to_string(),
            features: Vec::new(),
        }
    }
}

impl ZoneSet {
    pub fn new(features: Vec<ZoneFeature>) -> Self {
        Self {
            features,
            ..Self::default()
        }
    }

    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }

    pub fn to_json_pretty(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&ZoneFeature> {
        self.features.iter().find(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.features.iter().map(|f| f.name().to_string()).collect()
    }

    /// Insert or replace the outer ring of `name`. New zones go last.
    pub fn set_zone(&mut self, name: &str, ring: Vec<Vec<f64>>) {
        let ring = round_ring(ring);
        match self.features.iter_mut().find(|f| f.name() == name) {
            Some(feature) => match feature.geometry.coordinates.first_mut() {
                Some(outer) => *outer = ring,
                None => feature.geometry.coordinates.push(ring),
            },
            None => self.features.push(ZoneFeature::new(name, ring)),
        }
    }

    /// Remove `name`. Returns whether a zone was removed.
    pub fn delete_zone(&mut self, name: &str) -> bool {
        match self.features.iter().position(|f| f.name() == name) {
            Some(idx) => {
                self.features.remove(idx);
                true
            }
            None => false,
        }
    }

    /// Round every stored position to 7 decimals.
    pub fn round_coordinates(&mut self) {
        for feature in &mut self.features {
            for ring in &mut feature.geometry.coordinates {
                let rounded = round_ring(std::mem::take(ring));
                *ring = rounded;
            }
        }
    }

    /// `$ForbiddenZones {count}` followed by each zone.
    pub fn canonical(&self) -> String {
        let mut out = format!("$ForbiddenZones {}", self.features.len());
        for feature in &self.features {
            feature.write_canonical(&mut out, false);
        }
        out
    }

    /// SHA-256 of the canonical string, hex without leading zeros.
    pub fn hash(&self) -> String {
        sha256_hex(&self.canonical())
    }

    pub fn hash_message(&self) -> String {
        format!("$ForbiddenZonesHash {}", self.hash())
    }

    /// `$ForbiddenZonesDelta {count}` followed by each changed zone and its change type.
    pub fn delta_string(&self) -> String {
        let mut out = format!("$ForbiddenZonesDelta {}", self.features.len());
        for feature in &self.features {
            feature.write_canonical(&mut out, true);
        }
        out
    }
}

/// Classify changes from `old` to `new` by zone name.
///
/// Added and modified zones follow `new` order, deleted zones follow `old` order.
pub fn compute_delta(old: &ZoneSet, new: &ZoneSet) -> ZoneSet {
    let old_by_name: HashMap<&str, &ZoneFeature> =
        old.features.iter().map(|f| (f.name(), f)).collect();
    let new_by_name: HashMap<&str, &ZoneFeature> =
        new.features.iter().map(|f| (f.name(), f)).collect();

    let mut features = Vec::new();
    for zone in &new.features {
        match old_by_name.get(zone.name()) {
            None => features.push(zone.with_change(ChangeType::Added)),
            Some(previous) if previous.geometry != zone.geometry => {
                features.push(zone.with_change(ChangeType::Modified))
            }
            Some(_) => {}
        }
    }
    for zone in &old.features {
        if !new_by_name.contains_key(zone.name()) {
            features.push(zone.with_change(ChangeType::Deleted));
        }
    }
    ZoneSet::new(features)
}

/// Validate a ring submitted by an operator: every position is exactly `[lon, lat]`.
pub fn parse_ring(value: &serde_json::Value) -> Option<Vec<Vec<f64>>> {
    let positions = value.as_array()?;
    positions
        .iter()
        .map(|p| {
            let pair = p.as_array()?;
            if pair.len() != 2 {
                return None;
            }
            Some(vec![pair[0].as_f64()?, pair[1].as_f64()?])
        })
        .collect()
}

fn round_ring(ring: Vec<Vec<f64>>) -> Vec<Vec<f64>> {
    ring.into_iter()
        .map(|p| p.into_iter().map(round7).collect())
        .collect()
}

fn round7(value: f64) -> f64 {
    (value * 1e7).round() / 1e7
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(offset: f64) -> Vec<Vec<f64>> {
        vec![
            vec![37.0 + offset, 55.0],
            vec![37.1 + offset, 55.0],
            vec![37.1 + offset, 55.1],
        ]
    }

    #[test]
    fn canonical_string_format() {
        let mut zones = ZoneSet::default();
        zones.set_zone("A", vec![vec![37.5, 55.25]]);
        assert_eq!(zones.canonical(), "$ForbiddenZones 1&A&1&55.2500000_37.5000000");
        assert_eq!(ZoneSet::default().canonical(), "$ForbiddenZones 0");
    }

    #[test]
    fn hash_is_order_sensitive() {
        let mut ab = ZoneSet::default();
        ab.set_zone("A", square(0.0));
        ab.set_zone("B", square(1.0));
        let mut ba = ZoneSet::default();
        ba.set_zone("B", square(1.0));
        ba.set_zone("A", square(0.0));

        assert_eq!(ab.hash(), ab.clone().hash());
        assert_ne!(ab.hash(), ba.hash());
        assert!(ab.hash_message().starts_with("$ForbiddenZonesHash "));
    }

    #[test]
    fn whitespace_in_file_does_not_change_hash() {
        let compact = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"Z"},"geometry":{"type":"Polygon","coordinates":[[[1.0,2.0],[3.0,4.0]]]}}]}"#;
        let mut zones = ZoneSet::from_json(compact).unwrap();
        let pretty = zones.to_json_pretty().unwrap();
        let reparsed = ZoneSet::from_json(&pretty).unwrap();
        assert_eq!(zones.hash(), reparsed.hash());
        zones.round_coordinates();
        assert_eq!(zones.hash(), reparsed.hash());
    }

    #[test]
    fn delta_classification() {
        let mut old = ZoneSet::default();
        old.set_zone("keep", square(0.0));
        old.set_zone("move", square(1.0));
        old.set_zone("gone", square(2.0));

        let mut new = old.clone();
        new.set_zone("move", square(5.0));
        new.delete_zone("gone");
        new.set_zone("fresh", square(3.0));

        let delta = compute_delta(&old, &new);
        let changes: Vec<(String, ChangeType)> = delta
            .features
            .iter()
            .map(|f| (f.name().to_string(), f.properties.change_type.unwrap()))
            .collect();
        assert_eq!(
            changes,
            vec![
                ("move".to_string(), ChangeType::Modified),
                ("fresh".to_string(), ChangeType::Added),
                ("gone".to_string(), ChangeType::Deleted),
            ]
        );
        assert!(delta
            .delta_string()
            .starts_with("$ForbiddenZonesDelta 3&move&modified&3&"));
    }

    #[test]
    fn set_zone_rounds_and_replaces() {
        let mut zones = ZoneSet::default();
        zones.set_zone("A", vec![vec![1.123456789, 2.0]]);
        assert_eq!(zones.get("A").unwrap().geometry.outer_ring()[0][0], 1.1234568);
        zones.set_zone("A", vec![vec![9.0, 9.0]]);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones.names(), vec!["A"]);
        assert!(zones.delete_zone("A"));
        assert!(!zones.delete_zone("A"));
    }

    #[test]
    fn ring_validation() {
        let good = serde_json::json!([[1.0, 2.0], [3, 4]]);
        assert_eq!(parse_ring(&good).unwrap().len(), 2);
        assert!(parse_ring(&serde_json::json!([[1.0, 2.0, 3.0]])).is_none());
        assert!(parse_ring(&serde_json::json!("nope")).is_none());
        assert!(parse_ring(&serde_json::json!([["a", 1.0]])).is_none());
    }
}
