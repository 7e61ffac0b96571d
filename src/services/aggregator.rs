//! Time-window aggregation over hourly power series.
//!
//! Every series is sampled once per hour, so the kW value at an hour's start
//! doubles as the kWh produced during that hour. Windows are half-open
//! `[start, end)` and are compared as instants; day and hour boundaries are
//! anchored to the configured business timezone.

use std::collections::BTreeMap;

use chrono::{DateTime, DurationRound, NaiveDate, NaiveTime, TimeDelta, TimeZone, Utc};
use chrono_tz::Tz;
use tracing::warn;

use crate::models::array::ArrayDescriptor;
use crate::models::dashboard::{
    DashboardForecast, DashboardPeriod, EnergySlot, HourlyForecastEntry, TotalForecastEntry,
    TotalSystemForecast,
};
use crate::models::forecast::{ArraySeries, CombinedPoint, PowerPoint, SummaryMetrics, TimedPower};

// ─── Window boundaries ───────────────────────────────────────────────────────

/// Boundaries derived from `now` in the business timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayWindows {
    pub now: DateTime<Utc>,
    pub today_start: DateTime<Utc>,
    pub tomorrow_start: DateTime<Utc>,
    pub day_after_tomorrow: DateTime<Utc>,
    pub hour_start: DateTime<Utc>,
    pub next_hour_start: DateTime<Utc>,
}

impl DayWindows {
    pub fn new(now: DateTime<Utc>, tz: Tz) -> Self {
        let local = now.with_timezone(&tz);
        let today = local.date_naive();
        let tomorrow = today.succ_opt().unwrap_or(today);
        let day_after = tomorrow.succ_opt().unwrap_or(tomorrow);

        let hour_start = local
            .duration_trunc(TimeDelta::hours(1))
            .map(|h| h.with_timezone(&Utc))
            .unwrap_or(now);

        Self {
            now,
            today_start: local_midnight(tz, today),
            tomorrow_start: local_midnight(tz, tomorrow),
            day_after_tomorrow: local_midnight(tz, day_after),
            hour_start,
            next_hour_start: hour_start + TimeDelta::hours(1),
        }
    }

    /// `[start, end)` for a dashboard period.
    pub fn period(&self, period: DashboardPeriod) -> (DateTime<Utc>, DateTime<Utc>) {
        match period {
            DashboardPeriod::Today => (self.today_start, self.tomorrow_start),
            DashboardPeriod::Tomorrow => (self.tomorrow_start, self.day_after_tomorrow),
            DashboardPeriod::RemainingToday => (self.now, self.tomorrow_start),
        }
    }
}

/// First instant of `date` in `tz`. Zones that skip midnight start the day an hour later.
fn local_midnight(tz: Tz, date: NaiveDate) -> DateTime<Utc> {
    let naive = date.and_time(NaiveTime::MIN);
    tz.from_local_datetime(&naive)
        .earliest()
        .or_else(|| tz.from_local_datetime(&(naive + TimeDelta::hours(1))).earliest())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}

fn in_window<S: TimedPower>(sample: &S, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
    let t = sample.instant();
    start <= t && t < end
}

pub fn round_dp(value: f64, dp: i32) -> f64 {
    let factor = 10f64.powi(dp);
    (value * factor).round() / factor
}

// ─── Point-in-time and window metrics ────────────────────────────────────────

/// Power of the sample nearest to `now`; the earliest sample wins a tie.
pub fn current_power<S: TimedPower>(series: &[S], now: DateTime<Utc>) -> f64 {
    let mut best: Option<(i64, f64)> = None;
    for sample in series {
        let diff = (sample.instant() - now).num_milliseconds().abs();
        if best.is_none_or(|(closest, _)| diff < closest) {
            best = Some((diff, sample.power_kw()));
        }
    }
    best.map_or(0.0, |(_, power)| power)
}

/// Energy (kWh) over `[start, end)`.
pub fn rolling_window_energy<S: TimedPower>(series: &[S], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    series
        .iter()
        .filter(|s| in_window(*s, start, end))
        .map(TimedPower::power_kw)
        .sum()
}

pub fn daily_energy<S: TimedPower>(series: &[S], day_start: DateTime<Utc>, day_end: DateTime<Utc>) -> f64 {
    rolling_window_energy(series, day_start, day_end)
}

/// Highest power over `[start, end)`, `0.0` when the window is empty.
pub fn peak_power<S: TimedPower>(series: &[S], start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    series
        .iter()
        .filter(|s| in_window(*s, start, end))
        .map(TimedPower::power_kw)
        .fold(0.0, f64::max)
}

pub fn this_hour_energy<S: TimedPower>(series: &[S], windows: &DayWindows) -> f64 {
    rolling_window_energy(series, windows.hour_start, windows.next_hour_start)
}

pub fn next_hour_energy<S: TimedPower>(series: &[S], windows: &DayWindows) -> f64 {
    rolling_window_energy(series, windows.next_hour_start, windows.next_hour_start + TimeDelta::hours(1))
}

pub fn remaining_today_energy<S: TimedPower>(series: &[S], windows: &DayWindows) -> f64 {
    rolling_window_energy(series, windows.now, windows.tomorrow_start)
}

/// Energy over the next `hours` hours starting at `now`.
pub fn hours_ahead_energy<S: TimedPower>(series: &[S], now: DateTime<Utc>, hours: u32) -> f64 {
    rolling_window_energy(series, now, now + TimeDelta::hours(i64::from(hours)))
}

pub fn summary_metrics(points: &[PowerPoint], now: DateTime<Utc>, tz: Tz) -> SummaryMetrics {
    if points.is_empty() {
        return SummaryMetrics::default();
    }
    let w = DayWindows::new(now, tz);
    SummaryMetrics {
        current_power: current_power(points, now),
        today_energy: daily_energy(points, w.today_start, w.tomorrow_start),
        tomorrow_energy: daily_energy(points, w.tomorrow_start, w.day_after_tomorrow),
        peak_power_today: peak_power(points, w.today_start, w.tomorrow_start),
        peak_power_today_remaining: peak_power(points, now, w.tomorrow_start),
        peak_power_tomorrow: peak_power(points, w.tomorrow_start, w.day_after_tomorrow),
    }
}

// ─── Multi-array summation ───────────────────────────────────────────────────

/// Sums every array's power per timestamp.
///
/// Rows are keyed by instant, so an array with a shorter or shifted axis only
/// adds to the hours it actually has. The result covers the union of all axes.
pub fn combine(series: &[ArraySeries]) -> Vec<CombinedPoint> {
    let mut rows: BTreeMap<DateTime<Utc>, CombinedPoint> = BTreeMap::new();
    for s in series {
        for p in &s.points {
            rows.entry(p.instant())
                .and_modify(|row| {
                    row.power_kw += p.power_kw;
                    row.arrays_contributing += 1;
                })
                .or_insert(CombinedPoint {
                    timestamp: p.timestamp,
                    power_kw: p.power_kw,
                    arrays_contributing: 1,
                });
        }
    }

    let mut with_data = series.iter().filter(|s| !s.is_empty());
    if let Some(reference) = with_data.next() {
        for other in with_data {
            if !same_axis(&reference.points, &other.points) {
                warn!(
                    "Forecast axis of array '{}' ({} points) differs from '{}' ({} points); totals use matching hours only",
                    other.name(), other.points.len(), reference.name(), reference.points.len()
                );
            }
        }
    }

    rows.into_values().collect()
}

fn same_axis(a: &[PowerPoint], b: &[PowerPoint]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.instant() == y.instant())
}

// ─── Presentation series ─────────────────────────────────────────────────────

/// Samples at or after `now`, at most `limit` of them.
pub fn upcoming<S: TimedPower>(series: &[S], now: DateTime<Utc>, limit: usize) -> impl Iterator<Item = &S> {
    series.iter().filter(move |s| s.instant() >= now).take(limit)
}

/// The series from its first sample up to and including `now + days`.
pub fn hourly_forecast<S: TimedPower>(series: &[S], now: DateTime<Utc>, days: u32) -> Vec<HourlyForecastEntry> {
    let end = now + TimeDelta::days(i64::from(days));
    series
        .iter()
        .take_while(|s| s.instant() <= end)
        .map(|s| HourlyForecastEntry { datetime: s.timestamp(), power: s.power_kw() })
        .collect()
}

pub fn dashboard_forecast<S: TimedPower>(
    series: &[S],
    period: DashboardPeriod,
    now: DateTime<Utc>,
    tz: Tz,
) -> DashboardForecast {
    let (start, end) = DayWindows::new(now, tz).period(period);

    let mut total = 0.0;
    let forecast = series
        .iter()
        .filter(|s| in_window(*s, start, end))
        .map(|s| {
            total += s.power_kw();
            EnergySlot {
                start: s.timestamp(),
                end: s.timestamp() + TimeDelta::hours(1),
                energy_kwh: round_dp(s.power_kw(), 3),
            }
        })
        .collect();

    DashboardForecast {
        forecast,
        total_energy: round_dp(total, 3),
        forecast_type: period,
        generated_at: now,
    }
}

/// Samples in `[now, now + hours]`, sized against the configured arrays.
pub fn total_system_forecast<S: TimedPower>(
    series: &[S],
    arrays: &[ArrayDescriptor],
    hours: u32,
    now: DateTime<Utc>,
) -> TotalSystemForecast {
    let end = now + TimeDelta::hours(i64::from(hours));

    let forecast: Vec<TotalForecastEntry> = series
        .iter()
        .take_while(|s| s.instant() <= end)
        .filter(|s| s.instant() >= now)
        .map(|s| TotalForecastEntry {
            datetime: s.timestamp(),
            power_kw: round_dp(s.power_kw(), 3),
            energy_kwh: round_dp(s.power_kw(), 3),
        })
        .collect();
    let total: f64 = series
        .iter()
        .filter(|s| s.instant() >= now && s.instant() <= end)
        .map(TimedPower::power_kw)
        .sum();

    TotalSystemForecast {
        data_points: forecast.len(),
        forecast,
        total_energy_kwh: round_dp(total, 3),
        system_kwp: arrays.iter().map(|a| a.peak_power_kwp).sum(),
        arrays_count: arrays.len(),
        hours_requested: hours,
        generated_at: now,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use chrono_tz::Europe::London;

    fn bst() -> FixedOffset {
        FixedOffset::east_opt(3600).unwrap()
    }

    fn point(timestamp: DateTime<FixedOffset>, power_kw: f64) -> PowerPoint {
        PowerPoint { timestamp, power_kw, temperature_c: 20.0, cloud_cover_pct: 0.0, wind_speed: 1.0 }
    }

    /// Hourly series starting at local midnight 2025-06-21 (BST).
    fn series_from(powers: &[f64]) -> Vec<PowerPoint> {
        let start = bst().with_ymd_and_hms(2025, 6, 21, 0, 0, 0).unwrap();
        powers
            .iter()
            .enumerate()
            .map(|(i, p)| point(start + TimeDelta::hours(i as i64), *p))
            .collect()
    }

    fn array_series(name: &str, points: Vec<PowerPoint>) -> ArraySeries {
        ArraySeries {
            array: ArrayDescriptor::new(name, 4.0, 30.0, 180.0),
            points,
            summary: SummaryMetrics::default(),
            last_updated: Utc.with_ymd_and_hms(2025, 6, 21, 6, 0, 0).unwrap(),
        }
    }

    fn utc(d: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, d, h, m, 0).unwrap()
    }

    #[test]
    fn test_day_windows_in_london_summer() {
        let w = DayWindows::new(utc(21, 10, 30), London);
        assert_eq!(w.today_start, utc(20, 23, 0));
        assert_eq!(w.tomorrow_start, utc(21, 23, 0));
        assert_eq!(w.day_after_tomorrow, utc(22, 23, 0));
        assert_eq!(w.hour_start, utc(21, 10, 0));
        assert_eq!(w.next_hour_start, utc(21, 11, 0));
    }

    #[test]
    fn test_day_windows_across_spring_forward() {
        let now = Utc.with_ymd_and_hms(2025, 3, 30, 12, 0, 0).unwrap();
        let w = DayWindows::new(now, London);
        assert_eq!(w.today_start, Utc.with_ymd_and_hms(2025, 3, 30, 0, 0, 0).unwrap());
        assert_eq!(w.tomorrow_start, Utc.with_ymd_and_hms(2025, 3, 30, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_daily_energy_excludes_end_boundary() {
        let mut powers = vec![1.0; 25];
        powers[24] = 100.0; // next local midnight
        let series = series_from(&powers);
        let w = DayWindows::new(utc(21, 10, 30), London);

        assert_eq!(daily_energy(&series, w.today_start, w.tomorrow_start), 24.0);
        assert_eq!(daily_energy(&series, w.tomorrow_start, w.day_after_tomorrow), 100.0);
    }

    #[test]
    fn test_windows_anchor_to_business_zone() {
        // 00:30 in Berlin is still the previous day in London
        let cest = FixedOffset::east_opt(7200).unwrap();
        let series = vec![
            point(cest.with_ymd_and_hms(2025, 6, 21, 0, 30, 0).unwrap(), 2.0),
            point(cest.with_ymd_and_hms(2025, 6, 21, 1, 30, 0).unwrap(), 3.0),
        ];
        let w = DayWindows::new(utc(21, 10, 0), London);
        assert_eq!(daily_energy(&series, w.today_start, w.tomorrow_start), 3.0);
    }

    #[test]
    fn test_peak_power_empty_window_is_zero() {
        let series = series_from(&[0.5, 2.5, 1.5]);
        assert_eq!(peak_power(&series, utc(22, 0, 0), utc(23, 0, 0)), 0.0);
        assert_eq!(peak_power(&series, utc(20, 23, 0), utc(21, 23, 0)), 2.5);
        assert_eq!(peak_power::<PowerPoint>(&[], utc(20, 0, 0), utc(23, 0, 0)), 0.0);
    }

    #[test]
    fn test_current_power_nearest_and_ties() {
        let series = series_from(&[1.0, 2.0, 3.0]);
        // 00:20 BST → nearest is 00:00
        assert_eq!(current_power(&series, utc(20, 23, 20)), 1.0);
        // 01:40 BST → nearest is 02:00
        assert_eq!(current_power(&series, utc(21, 0, 40)), 3.0);
        // 00:30 BST is equidistant; first wins
        assert_eq!(current_power(&series, utc(20, 23, 30)), 1.0);
        assert_eq!(current_power::<PowerPoint>(&[], utc(21, 0, 0)), 0.0);
    }

    #[test]
    fn test_rolling_windows() {
        let powers: Vec<f64> = (0..48).map(|h| h as f64).collect();
        let series = series_from(&powers);
        // 10:30 BST
        let w = DayWindows::new(utc(21, 9, 30), London);

        assert_eq!(this_hour_energy(&series, &w), 10.0);
        assert_eq!(next_hour_energy(&series, &w), 11.0);
        // 11:00..23:00 BST
        assert_eq!(remaining_today_energy(&series, &w), (11..24).sum::<i32>() as f64);
        assert_eq!(hours_ahead_energy(&series, utc(21, 9, 0), 3), 10.0 + 11.0 + 12.0);
    }

    #[test]
    fn test_summary_metrics() {
        let mut powers = vec![0.0; 48];
        powers[12] = 3.0;
        powers[13] = 4.0;
        powers[9] = 1.0;
        powers[36] = 2.0;
        let series = series_from(&powers);

        let m = summary_metrics(&series, utc(21, 11, 0), London);
        assert_eq!(m.current_power, 3.0);
        assert_eq!(m.today_energy, 8.0);
        assert_eq!(m.tomorrow_energy, 2.0);
        assert_eq!(m.peak_power_today, 4.0);
        assert_eq!(m.peak_power_today_remaining, 4.0);
        assert_eq!(m.peak_power_tomorrow, 2.0);

        assert_eq!(summary_metrics(&[], utc(21, 11, 0), London), SummaryMetrics::default());
    }

    #[test]
    fn test_combine_identical_series_scales() {
        let points = series_from(&[0.0, 1.5, 2.25, 4.0]);
        let arrays: Vec<ArraySeries> = ["a", "b", "c"]
            .iter()
            .map(|n| array_series(n, points.clone()))
            .collect();

        let combined = combine(&arrays);
        assert_eq!(combined.len(), points.len());
        for (c, p) in combined.iter().zip(&points) {
            assert_eq!(c.timestamp, p.timestamp);
            assert_eq!(c.power_kw, 3.0 * p.power_kw);
            assert_eq!(c.arrays_contributing, 3);
        }
    }

    #[test]
    fn test_combine_aligns_by_timestamp() {
        let long = series_from(&[1.0, 1.0, 1.0, 1.0]);
        let shifted: Vec<PowerPoint> = series_from(&[5.0, 5.0, 5.0, 5.0]).into_iter().skip(2).collect();

        let combined = combine(&[array_series("east", long), array_series("west", shifted)]);
        let powers: Vec<f64> = combined.iter().map(|c| c.power_kw).collect();
        let counts: Vec<usize> = combined.iter().map(|c| c.arrays_contributing).collect();
        assert_eq!(powers, vec![1.0, 1.0, 6.0, 6.0]);
        assert_eq!(counts, vec![1, 1, 2, 2]);
    }

    #[test]
    fn test_combine_skips_empty_arrays() {
        let combined = combine(&[
            array_series("empty", Vec::new()),
            array_series("roof", series_from(&[2.0, 3.0])),
        ]);
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[1].power_kw, 3.0);
        assert!(combine(&[]).is_empty());
    }

    #[test]
    fn test_hourly_forecast_caps_horizon() {
        let series = series_from(&vec![1.0; 72]);
        let now = utc(20, 23, 0);
        // Local midnight + 1 day, inclusive
        assert_eq!(hourly_forecast(&series, now, 1).len(), 25);
        assert_eq!(hourly_forecast(&series, now, 7).len(), 72);
    }

    #[test]
    fn test_dashboard_forecast_periods() {
        let powers: Vec<f64> = (0..48).map(|h| if h % 24 == 12 { 2.5 } else { 0.1234 }).collect();
        let series = series_from(&powers);
        let now = utc(21, 19, 0); // 20:00 BST

        let today = dashboard_forecast(&series, DashboardPeriod::Today, now, London);
        assert_eq!(today.forecast.len(), 24);
        assert_eq!(today.forecast_type, DashboardPeriod::Today);
        assert_eq!(today.total_energy, round_dp(2.5 + 23.0 * 0.1234, 3));
        let slot = &today.forecast[12];
        assert_eq!(slot.end - slot.start, TimeDelta::hours(1));
        assert_eq!(slot.energy_kwh, 2.5);
        assert_eq!(today.forecast[0].energy_kwh, 0.123);

        let remaining = dashboard_forecast(&series, DashboardPeriod::RemainingToday, now, London);
        assert_eq!(remaining.forecast.len(), 4);

        let tomorrow = dashboard_forecast(&series, DashboardPeriod::Tomorrow, now, London);
        assert_eq!(tomorrow.forecast.len(), 24);
        assert_eq!(tomorrow.generated_at, now);
    }

    #[test]
    fn test_total_system_forecast_window() {
        let series = series_from(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let arrays = vec![
            ArrayDescriptor::new("a", 4.0, 30.0, 180.0),
            ArrayDescriptor::new("b", 2.5, 30.0, 90.0),
        ];
        // 01:00 BST, two hours ahead inclusive of both ends
        let total = total_system_forecast(&series, &arrays, 2, utc(21, 0, 0));
        assert_eq!(total.data_points, 3);
        assert_eq!(total.total_energy_kwh, 9.0);
        assert_eq!(total.system_kwp, 6.5);
        assert_eq!(total.arrays_count, 2);
        assert_eq!(total.hours_requested, 2);
        assert_eq!(total.forecast[0].power_kw, 2.0);
    }

    #[test]
    fn test_upcoming_limit() {
        let series = series_from(&vec![1.0; 48]);
        let next: Vec<_> = upcoming(&series, utc(21, 4, 30), 24).collect();
        assert_eq!(next.len(), 24);
        assert_eq!(next[0].instant(), utc(21, 5, 0));
    }
}
