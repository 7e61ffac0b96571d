//! Read-only metric providers built on a system's published snapshot.
//!
//! Three families share one interface: per-array metrics, whole-system
//! totals and energy-dashboard figures. A provider never touches the
//! network; it only reads whatever the coordinator last published.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde_json::{json, Map, Value};

use crate::models::array::ArrayDescriptor;
use crate::models::dashboard::SensorReading;
use crate::models::forecast::{ArraySeries, SummaryMetrics, SystemSnapshot, TimedPower};
use crate::services::aggregator::{self, round_dp, DayWindows};
use crate::services::coordinator::Coordinator;

const FORECAST_ENTRIES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetricKind {
    CurrentPower,
    TodayEnergy,
    TomorrowEnergy,
    PeakPowerToday,
    PeakPowerTodayRemaining,
    PeakPowerTomorrow,
}

impl MetricKind {
    pub const ALL: [MetricKind; 6] = [
        MetricKind::CurrentPower,
        MetricKind::TodayEnergy,
        MetricKind::TomorrowEnergy,
        MetricKind::PeakPowerToday,
        MetricKind::PeakPowerTodayRemaining,
        MetricKind::PeakPowerTomorrow,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            MetricKind::CurrentPower => "current_power",
            MetricKind::TodayEnergy => "today_energy",
            MetricKind::TomorrowEnergy => "tomorrow_energy",
            MetricKind::PeakPowerToday => "peak_power_today",
            MetricKind::PeakPowerTodayRemaining => "peak_power_today_remaining",
            MetricKind::PeakPowerTomorrow => "peak_power_tomorrow",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            MetricKind::CurrentPower => "Current Power",
            MetricKind::TodayEnergy => "Today Energy",
            MetricKind::TomorrowEnergy => "Tomorrow Energy",
            MetricKind::PeakPowerToday => "Peak Power Today",
            MetricKind::PeakPowerTodayRemaining => "Peak Power Today Remaining",
            MetricKind::PeakPowerTomorrow => "Peak Power Tomorrow",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            MetricKind::TodayEnergy | MetricKind::TomorrowEnergy => "kWh",
            _ => "kW",
        }
    }

    pub fn of(&self, m: &SummaryMetrics) -> f64 {
        match self {
            MetricKind::CurrentPower => m.current_power,
            MetricKind::TodayEnergy => m.today_energy,
            MetricKind::TomorrowEnergy => m.tomorrow_energy,
            MetricKind::PeakPowerToday => m.peak_power_today,
            MetricKind::PeakPowerTodayRemaining => m.peak_power_today_remaining,
            MetricKind::PeakPowerTomorrow => m.peak_power_tomorrow,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DashboardKind {
    Today,
    Tomorrow,
    RemainingToday,
    ThisHour,
    NextHour,
}

impl DashboardKind {
    pub const ALL: [DashboardKind; 5] = [
        DashboardKind::Today,
        DashboardKind::Tomorrow,
        DashboardKind::RemainingToday,
        DashboardKind::ThisHour,
        DashboardKind::NextHour,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            DashboardKind::Today => "energy_production_today",
            DashboardKind::Tomorrow => "energy_production_tomorrow",
            DashboardKind::RemainingToday => "energy_production_remaining_today",
            DashboardKind::ThisHour => "energy_production_this_hour",
            DashboardKind::NextHour => "energy_production_next_hour",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DashboardKind::Today => "Energy Production Today",
            DashboardKind::Tomorrow => "Energy Production Tomorrow",
            DashboardKind::RemainingToday => "Energy Production Remaining Today",
            DashboardKind::ThisHour => "Energy Production This Hour",
            DashboardKind::NextHour => "Energy Production Next Hour",
        }
    }

    /// Energy of one array for this figure.
    fn energy(&self, series: &ArraySeries, windows: &DayWindows) -> f64 {
        match self {
            DashboardKind::Today => series.summary.today_energy,
            DashboardKind::Tomorrow => series.summary.tomorrow_energy,
            DashboardKind::RemainingToday => aggregator::remaining_today_energy(&series.points, windows),
            DashboardKind::ThisHour => aggregator::this_hour_energy(&series.points, windows),
            DashboardKind::NextHour => aggregator::next_hour_energy(&series.points, windows),
        }
    }

    fn window(&self, windows: &DayWindows) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        match self {
            DashboardKind::Today => Some((windows.today_start, windows.tomorrow_start)),
            DashboardKind::Tomorrow => Some((windows.tomorrow_start, windows.day_after_tomorrow)),
            _ => None,
        }
    }
}

/// Everything a provider may read.
pub struct SensorContext<'a> {
    pub snapshot: Option<&'a SystemSnapshot>,
    pub arrays: &'a [ArrayDescriptor],
    pub last_update_success: bool,
    pub now: DateTime<Utc>,
    pub tz: Tz,
}

impl SensorContext<'_> {
    fn has_data(&self) -> bool {
        self.snapshot.is_some_and(|s| !s.arrays.is_empty())
    }

    fn total_kwp(&self) -> f64 {
        self.arrays.iter().map(|a| a.peak_power_kwp).sum()
    }
}

pub trait MetricProvider {
    fn key(&self) -> String;
    fn name(&self) -> String;
    fn unit(&self) -> &'static str;
    fn value(&self, ctx: &SensorContext) -> Option<f64>;
    fn attributes(&self, ctx: &SensorContext) -> Map<String, Value>;
    fn available(&self, ctx: &SensorContext) -> bool;

    fn read(&self, ctx: &SensorContext) -> SensorReading {
        SensorReading {
            key: self.key(),
            name: self.name(),
            unit: self.unit().to_string(),
            value: self.value(ctx),
            available: self.available(ctx),
            attributes: self.attributes(ctx),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sensor {
    Array { array: String, kind: MetricKind },
    Total { kind: MetricKind },
    Dashboard { kind: DashboardKind },
}

impl MetricProvider for Sensor {
    fn key(&self) -> String {
        match self {
            Sensor::Array { array, kind } => format!("{}_{}", array, kind.key()),
            Sensor::Total { kind } => format!("total_{}", kind.key()),
            Sensor::Dashboard { kind } => kind.key().to_string(),
        }
    }

    fn name(&self) -> String {
        match self {
            Sensor::Array { array, kind } => format!("{} {}", array, kind.label()),
            Sensor::Total { kind } => format!("Total {}", kind.label()),
            Sensor::Dashboard { kind } => kind.label().to_string(),
        }
    }

    fn unit(&self) -> &'static str {
        match self {
            Sensor::Array { kind, .. } | Sensor::Total { kind } => kind.unit(),
            Sensor::Dashboard { .. } => "kWh",
        }
    }

    fn value(&self, ctx: &SensorContext) -> Option<f64> {
        let snapshot = ctx.snapshot?;
        match self {
            Sensor::Array { array, kind } => snapshot.get(array).map(|s| round_dp(kind.of(&s.summary), 2)),
            Sensor::Total { kind } => {
                if snapshot.arrays.is_empty() {
                    return None;
                }
                let sum: f64 = snapshot.arrays.iter().map(|s| kind.of(&s.summary)).sum();
                Some(round_dp(sum, 2))
            }
            Sensor::Dashboard { kind } => {
                if snapshot.arrays.is_empty() {
                    return None;
                }
                let windows = DayWindows::new(ctx.now, ctx.tz);
                let sum: f64 = snapshot.arrays.iter().map(|s| kind.energy(s, &windows)).sum();
                Some(round_dp(sum, 3))
            }
        }
    }

    fn attributes(&self, ctx: &SensorContext) -> Map<String, Value> {
        match self {
            Sensor::Array { array, kind } => array_attributes(array, *kind, ctx),
            Sensor::Total { kind } => total_attributes(*kind, ctx),
            Sensor::Dashboard { kind } => dashboard_attributes(*kind, ctx),
        }
    }

    fn available(&self, ctx: &SensorContext) -> bool {
        if !ctx.last_update_success {
            return false;
        }
        match self {
            Sensor::Array { array, .. } => ctx.snapshot.is_some_and(|s| s.get(array).is_some()),
            Sensor::Total { .. } | Sensor::Dashboard { .. } => ctx.has_data(),
        }
    }
}

fn array_attributes(name: &str, kind: MetricKind, ctx: &SensorContext) -> Map<String, Value> {
    let mut attrs = Map::new();
    if let Some(array) = ctx.arrays.iter().find(|a| a.name == name) {
        attrs.insert("kwp".into(), json!(array.peak_power_kwp));
        attrs.insert("declination".into(), json!(array.declination_deg));
        attrs.insert("azimuth".into(), json!(array.azimuth_deg));
        attrs.insert("damping".into(), json!(array.damping));
        if let Some(horizon) = &array.horizon {
            attrs.insert("horizon".into(), json!(horizon.to_string()));
        }
    }

    let Some(series) = ctx.snapshot.and_then(|s| s.get(name)) else {
        return attrs;
    };
    attrs.insert("last_updated".into(), json!(series.last_updated));

    if kind == MetricKind::CurrentPower {
        let forecast: Vec<Value> = aggregator::upcoming(&series.points, ctx.now, FORECAST_ENTRIES)
            .map(|p| json!({ "datetime": p.timestamp, "power": round_dp(p.power_kw, 2) }))
            .collect();
        attrs.insert("forecast".into(), Value::Array(forecast));
    }
    attrs
}

fn total_attributes(kind: MetricKind, ctx: &SensorContext) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("arrays_count".into(), json!(ctx.arrays.len()));
    attrs.insert("total_system_kwp".into(), json!(ctx.total_kwp()));

    let Some(snapshot) = ctx.snapshot else {
        attrs.insert("arrays_with_data".into(), json!(0));
        return attrs;
    };
    attrs.insert("arrays_with_data".into(), json!(snapshot.arrays.len()));

    let individual: Map<String, Value> = snapshot
        .arrays
        .iter()
        .map(|s| (s.name().to_string(), json!(round_dp(kind.of(&s.summary), 2))))
        .collect();
    attrs.insert("individual_arrays".into(), Value::Object(individual));
    attrs.insert(
        "energy_next_24h".into(),
        json!(round_dp(aggregator::hours_ahead_energy(snapshot.combined(), ctx.now, 24), 2)),
    );

    if kind == MetricKind::CurrentPower {
        let forecast: Vec<Value> = aggregator::upcoming(snapshot.combined(), ctx.now, FORECAST_ENTRIES)
            .map(|p| {
                json!({
                    "datetime": p.timestamp,
                    "power": round_dp(p.power_kw, 2),
                    "arrays_contributing": p.arrays_contributing,
                })
            })
            .collect();
        attrs.insert("forecast".into(), Value::Array(forecast));
    }
    attrs
}

fn dashboard_attributes(kind: DashboardKind, ctx: &SensorContext) -> Map<String, Value> {
    let mut attrs = Map::new();
    attrs.insert("arrays_count".into(), json!(ctx.arrays.len()));
    attrs.insert("unit_of_measurement".into(), json!("kWh"));
    attrs.insert("total_system_kwp".into(), json!(ctx.total_kwp()));

    let windows = DayWindows::new(ctx.now, ctx.tz);
    if let (Some(snapshot), Some((start, end))) = (ctx.snapshot, kind.window(&windows)) {
        let forecast: Vec<Value> = snapshot
            .combined()
            .iter()
            .filter(|p| start <= p.instant() && p.instant() < end)
            .map(|p| {
                json!({
                    "datetime": p.timestamp,
                    "power": round_dp(p.power_kw, 3),
                    "energy": round_dp(p.power_kw, 3),
                })
            })
            .collect();
        attrs.insert("forecast".into(), Value::Array(forecast));
    }
    attrs
}

/// Every sensor a system exposes, per-array first in configuration order.
pub fn catalogue(arrays: &[ArrayDescriptor]) -> Vec<Sensor> {
    let per_array = arrays.iter().flat_map(|a| {
        MetricKind::ALL.into_iter().map(move |kind| Sensor::Array { array: a.name.clone(), kind })
    });
    let totals = MetricKind::ALL.into_iter().map(|kind| Sensor::Total { kind });
    let dashboard = DashboardKind::ALL.into_iter().map(|kind| Sensor::Dashboard { kind });

    per_array.chain(totals).chain(dashboard).collect()
}

/// Reads every sensor of `coordinator` at `now`.
pub fn read_all(coordinator: &Coordinator, now: DateTime<Utc>) -> Vec<SensorReading> {
    let snapshot = coordinator.snapshot();
    let ctx = SensorContext {
        snapshot: snapshot.as_deref(),
        arrays: coordinator.arrays(),
        last_update_success: coordinator.last_update_success(),
        now,
        tz: coordinator.tz(),
    };
    catalogue(coordinator.arrays()).iter().map(|s| s.read(&ctx)).collect()
}
