use std::collections::BTreeMap;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::array::{ArrayDescriptor, Location};
use crate::models::forecast::SummaryMetrics;

// ─── Query parameters ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DashboardPeriod {
    #[default]
    Today,
    Tomorrow,
    RemainingToday,
}

// ─── Forecast responses ──────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct HourlyForecastEntry {
    pub datetime: DateTime<FixedOffset>,
    pub power: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct EnergySlot {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct DashboardForecast {
    pub forecast: Vec<EnergySlot>,
    pub total_energy: f64,
    pub forecast_type: DashboardPeriod,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TotalForecastEntry {
    pub datetime: DateTime<FixedOffset>,
    pub power_kw: f64,
    pub energy_kwh: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct TotalSystemForecast {
    pub forecast: Vec<TotalForecastEntry>,
    pub total_energy_kwh: f64,
    pub system_kwp: f64,
    pub arrays_count: usize,
    pub hours_requested: u32,
    pub data_points: usize,
    pub generated_at: DateTime<Utc>,
}

// ─── System views ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SystemInfo {
    pub id: String,
    pub location: Location,
    pub arrays: Vec<ArrayDescriptor>,
    pub available: bool,
    pub last_updated: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ArraySummary {
    pub name: String,
    pub kwp: f64,
    pub points: usize,
    pub summary: SummaryMetrics,
    pub last_updated: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SnapshotResponse {
    pub system_id: String,
    pub last_updated: DateTime<Utc>,
    pub arrays: Vec<ArraySummary>,
    /// Per-metric sum across arrays
    pub totals: SummaryMetrics,
    pub total_kwp: f64,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SensorReading {
    pub key: String,
    pub name: String,
    pub unit: String,
    pub value: Option<f64>,
    pub available: bool,
    #[schema(value_type = Object)]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefreshReport {
    pub system_id: String,
    pub refreshed: Vec<String>,
    /// Array name to failure reason
    pub failed: BTreeMap<String, String>,
    /// Set when nothing was published
    pub error: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}
