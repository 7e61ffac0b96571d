use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::array::ArrayDescriptor;
use crate::services::aggregator;

// ─── Substitutes for missing secondary fields ────────────────────────────────

pub const DEFAULT_TEMPERATURE_C: f64 = 25.0;
pub const DEFAULT_CLOUD_COVER_PCT: f64 = 0.0;
pub const DEFAULT_WIND_SPEED: f64 = 0.0;

// ─── Model input ─────────────────────────────────────────────────────────────

/// One forecast hour of weather for the system location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub irradiance_w_m2: f64,
    pub temperature_c: f64,
    pub cloud_cover_pct: f64,
    pub wind_speed: f64,
}

impl ForecastPoint {
    /// Point with only irradiance known; secondary fields take their defaults.
    pub fn new(timestamp: DateTime<FixedOffset>, irradiance_w_m2: f64) -> Self {
        Self {
            timestamp,
            irradiance_w_m2,
            temperature_c: DEFAULT_TEMPERATURE_C,
            cloud_cover_pct: DEFAULT_CLOUD_COVER_PCT,
            wind_speed: DEFAULT_WIND_SPEED,
        }
    }
}

// ─── Model output ────────────────────────────────────────────────────────────

/// Anything on an hourly power axis. Energy for an hour equals the kW sample
/// taken at its start, so every series must be spaced one hour apart.
pub trait TimedPower {
    fn timestamp(&self) -> DateTime<FixedOffset>;
    fn power_kw(&self) -> f64;

    fn instant(&self) -> DateTime<Utc> {
        self.timestamp().with_timezone(&Utc)
    }
}

/// A modeled forecast hour for one array.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct PowerPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub power_kw: f64,
    pub temperature_c: f64,
    pub cloud_cover_pct: f64,
    pub wind_speed: f64,
}

impl TimedPower for PowerPoint {
    fn timestamp(&self) -> DateTime<FixedOffset> { self.timestamp }
    fn power_kw(&self) -> f64 { self.power_kw }
}

/// Summary figures computed when a series is built.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, ToSchema)]
pub struct SummaryMetrics {
    pub current_power: f64,
    pub today_energy: f64,
    pub tomorrow_energy: f64,
    pub peak_power_today: f64,
    pub peak_power_today_remaining: f64,
    pub peak_power_tomorrow: f64,
}

/// Modeled series for one array plus the descriptor it was computed with.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArraySeries {
    pub array: ArrayDescriptor,
    pub points: Vec<PowerPoint>,
    pub summary: SummaryMetrics,
    pub last_updated: DateTime<Utc>,
}

impl ArraySeries {
    /// Degraded-but-valid result for a provider that returned no usable hours.
    pub fn empty(array: ArrayDescriptor, now: DateTime<Utc>) -> Self {
        Self {
            array,
            points: Vec::new(),
            summary: SummaryMetrics::default(),
            last_updated: now,
        }
    }

    pub fn name(&self) -> &str {
        &self.array.name
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }
}

// ─── Whole-system view ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct CombinedPoint {
    pub timestamp: DateTime<FixedOffset>,
    pub power_kw: f64,
    /// Number of arrays that had a sample at this timestamp
    pub arrays_contributing: usize,
}

impl TimedPower for CombinedPoint {
    fn timestamp(&self) -> DateTime<FixedOffset> { self.timestamp }
    fn power_kw(&self) -> f64 { self.power_kw }
}

/// Published state of one system. Replaced wholesale on every successful refresh.
#[derive(Debug, Clone)]
pub struct SystemSnapshot {
    /// In configuration order
    pub arrays: Vec<ArraySeries>,
    pub last_updated: DateTime<Utc>,
    combined: OnceLock<Vec<CombinedPoint>>,
}

impl SystemSnapshot {
    pub fn new(arrays: Vec<ArraySeries>, last_updated: DateTime<Utc>) -> Self {
        Self { arrays, last_updated, combined: OnceLock::new() }
    }

    pub fn get(&self, name: &str) -> Option<&ArraySeries> {
        self.arrays.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.arrays.iter().map(ArraySeries::name)
    }

    /// Elementwise sum of every array, derived on first access.
    pub fn combined(&self) -> &[CombinedPoint] {
        self.combined.get_or_init(|| aggregator::combine(&self.arrays))
    }

    pub fn total_kwp(&self) -> f64 {
        self.arrays.iter().map(|s| s.array.peak_power_kwp).sum()
    }
}

// ─── Open-Meteo wire types ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct HourlyForecastResponse {
    #[serde(default)]
    pub utc_offset_seconds: i32,
    pub hourly: HourlyBlock,
}

/// Columnar hourly block. Every column may be shorter than `time` or hold nulls.
#[derive(Debug, Default, Deserialize)]
pub struct HourlyBlock {
    #[serde(default)]
    pub time: Vec<String>,
    #[serde(default)]
    pub shortwave_radiation: Vec<Option<f64>>,
    #[serde(default)]
    pub temperature_2m: Vec<Option<f64>>,
    #[serde(default)]
    pub cloud_cover: Vec<Option<f64>>,
    #[serde(default)]
    pub wind_speed_10m: Vec<Option<f64>>,
}
