use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use utoipa::ToSchema;

// ─── Defaults for omitted array fields ───────────────────────────────────────

pub const DEFAULT_DECLINATION: f64 = 30.0;
pub const DEFAULT_AZIMUTH: f64 = 180.0;
pub const DEFAULT_KWP: f64 = 5.0;
pub const DEFAULT_DAMPING: f64 = 0.0;

fn default_declination() -> f64 { DEFAULT_DECLINATION }
fn default_azimuth() -> f64 { DEFAULT_AZIMUTH }
fn default_kwp() -> f64 { DEFAULT_KWP }
fn default_damping() -> f64 { DEFAULT_DAMPING }

// ─── Location ────────────────────────────────────────────────────────────────

/// Geographic point every array of one system is forecast for.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

// ─── Array descriptor ────────────────────────────────────────────────────────

/// Static configuration for one physical array.
///
/// Range checks happen once in [`crate::config::Config::validate`]; nothing
/// downstream re-validates a descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ArrayDescriptor {
    /// Unique within a system
    pub name: String,
    /// Rated capacity (kWp)
    #[serde(rename = "kwp", default = "default_kwp")]
    pub peak_power_kwp: f64,
    /// Panel tilt from horizontal (deg, 0..=90)
    #[serde(rename = "declination", default = "default_declination")]
    pub declination_deg: f64,
    /// Compass bearing the panels face (deg, 0..=360)
    #[serde(rename = "azimuth", default = "default_azimuth")]
    pub azimuth_deg: f64,
    /// Fractional system loss (0..=1)
    #[serde(default = "default_damping")]
    pub damping: f64,
    /// Optional horizon shading profile
    #[serde(default, deserialize_with = "deserialize_horizon", skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, example = "0,5,10,5")]
    pub horizon: Option<HorizonProfile>,
}

impl ArrayDescriptor {
    pub fn new(name: impl Into<String>, peak_power_kwp: f64, declination_deg: f64, azimuth_deg: f64) -> Self {
        Self {
            name: name.into(),
            peak_power_kwp,
            declination_deg,
            azimuth_deg,
            damping: DEFAULT_DAMPING,
            horizon: None,
        }
    }

}

// ─── Horizon profile ─────────────────────────────────────────────────────────

/// Obstruction elevations (deg) sampled at equal azimuth steps around the array.
///
/// Written as a comma separated string, e.g. `"0,5,12,5"`. An empty string
/// means no shading profile.
#[derive(Debug, Clone, PartialEq)]
pub struct HorizonProfile(Vec<f64>);

impl HorizonProfile {
    pub fn elevations(&self) -> &[f64] {
        &self.0
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid horizon profile: {0}")]
pub struct HorizonParseError(String);

impl FromStr for HorizonProfile {
    type Err = HorizonParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut elevations = Vec::new();
        for part in s.split(',').map(str::trim) {
            let value: f64 = part
                .parse()
                .map_err(|_| HorizonParseError(format!("'{}' is not a number", part)))?;
            if !(0.0..=90.0).contains(&value) {
                return Err(HorizonParseError(format!("elevation {} outside 0..=90", value)));
            }
            elevations.push(value);
        }
        Ok(Self(elevations))
    }
}

impl fmt::Display for HorizonProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.elevations().iter().map(|v| v.to_string()).collect();
        write!(f, "{}", parts.join(","))
    }
}

impl Serialize for HorizonProfile {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

fn deserialize_horizon<'de, D>(deserializer: D) -> Result<Option<HorizonProfile>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_applied_for_missing_fields() {
        let array: ArrayDescriptor = serde_json::from_str(r#"{"name": "roof"}"#).unwrap();
        assert_eq!(array.peak_power_kwp, DEFAULT_KWP);
        assert_eq!(array.declination_deg, DEFAULT_DECLINATION);
        assert_eq!(array.azimuth_deg, DEFAULT_AZIMUTH);
        assert_eq!(array.damping, 0.0);
        assert!(array.horizon.is_none());
    }

    #[test]
    fn test_empty_horizon_is_none() {
        let array: ArrayDescriptor =
            serde_json::from_str(r#"{"name": "garage", "kwp": 3.2, "horizon": ""}"#).unwrap();
        assert!(array.horizon.is_none());
    }

    #[test]
    fn test_horizon_parsed_and_serialized() {
        let array: ArrayDescriptor =
            serde_json::from_str(r#"{"name": "barn", "horizon": "0, 5,12.5,5"}"#).unwrap();
        let horizon = array.horizon.as_ref().unwrap();
        assert_eq!(horizon.elevations(), &[0.0, 5.0, 12.5, 5.0]);

        let json = serde_json::to_value(&array).unwrap();
        assert_eq!(json["horizon"], "0,5,12.5,5");
    }

    #[test]
    fn test_horizon_rejects_out_of_range() {
        let res: Result<ArrayDescriptor, _> =
            serde_json::from_str(r#"{"name": "barn", "horizon": "0,95"}"#);
        assert!(res.is_err());
    }
}
