//! In-process forecast source shared by the service and controller tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DurationRound, FixedOffset, TimeDelta, Utc};
use chrono_tz::Europe::London;

use crate::errors::FetchError;
use crate::models::array::{ArrayDescriptor, Location};
use crate::models::forecast::{ArraySeries, PowerPoint};
use crate::services::aggregator;
use crate::services::forecast_fetcher::ForecastSource;

pub fn location() -> Location {
    Location { latitude: 51.5, longitude: -0.12 }
}

pub fn three_arrays() -> Vec<ArrayDescriptor> {
    vec![
        ArrayDescriptor::new("A", 4.0, 30.0, 180.0),
        ArrayDescriptor::new("B", 2.0, 20.0, 90.0),
        ArrayDescriptor::new("C", 1.0, 45.0, 270.0),
    ]
}

/// Serves a flat `kwp * 0.1 * generation` profile over four days around now.
pub struct FakeSource {
    generation: AtomicUsize,
    calls: AtomicUsize,
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self {
            generation: AtomicUsize::new(1),
            calls: AtomicUsize::new(0),
            failing: Mutex::new(HashSet::new()),
            delays: Mutex::new(HashMap::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_generation(&self, generation: usize) {
        self.generation.store(generation, Ordering::SeqCst);
    }

    pub fn set_failing(&self, names: &[&str]) {
        let mut failing = self.failing.lock().unwrap();
        failing.clear();
        failing.extend(names.iter().map(|n| n.to_string()));
    }

    pub fn set_delay(&self, name: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(name.to_string(), delay);
    }

    fn series(&self, array: &ArrayDescriptor) -> ArraySeries {
        let now = Utc::now();
        let offset = FixedOffset::east_opt(0).unwrap();
        let start = now.duration_trunc(TimeDelta::hours(1)).unwrap() - TimeDelta::hours(24);
        let power = array.peak_power_kwp * 0.1 * self.generation.load(Ordering::SeqCst) as f64;

        let points: Vec<PowerPoint> = (0..96)
            .map(|h| PowerPoint {
                timestamp: (start + TimeDelta::hours(h)).with_timezone(&offset),
                power_kw: power,
                temperature_c: 20.0,
                cloud_cover_pct: 10.0,
                wind_speed: 2.0,
            })
            .collect();
        let summary = aggregator::summary_metrics(&points, now, London);

        ArraySeries { array: array.clone(), points, summary, last_updated: now }
    }
}

#[async_trait]
impl ForecastSource for FakeSource {
    async fn fetch_array_forecast(&self, _location: &Location, array: &ArrayDescriptor) -> Result<ArraySeries, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let delay = self.delays.lock().unwrap().get(&array.name).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(&array.name) {
            return Err(FetchError::Status { status: 503 });
        }
        Ok(self.series(array))
    }

    fn name(&self) -> &str {
        "fake"
    }
}
