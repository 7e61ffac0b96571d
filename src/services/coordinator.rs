use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::SystemConfig;
use crate::errors::RefreshError;
use crate::models::array::{ArrayDescriptor, Location};
use crate::models::dashboard::{
    DashboardForecast, DashboardPeriod, HourlyForecastEntry, RefreshReport, TotalSystemForecast,
};
use crate::models::forecast::{CombinedPoint, SystemSnapshot};
use crate::services::aggregator;
use crate::services::orchestrator::{Orchestrator, RefreshOutcome};

/// Owns one system's published snapshot and its refresh cycle.
pub struct Coordinator {
    id: String,
    location: Location,
    arrays: Vec<ArrayDescriptor>,
    tz: Tz,
    orchestrator: Orchestrator,
    snapshot: RwLock<Option<Arc<SystemSnapshot>>>,
    last_update_success: AtomicBool,
    /// Held for the whole cycle so two refreshes never overlap
    refresh_lock: Mutex<()>,
}

impl Coordinator {
    pub fn new(system: &SystemConfig, tz: Tz, orchestrator: Orchestrator) -> Self {
        Self {
            id: system.id.clone(),
            location: system.location(),
            arrays: system.arrays.clone(),
            tz,
            orchestrator,
            snapshot: RwLock::new(None),
            last_update_success: AtomicBool::new(false),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn arrays(&self) -> &[ArrayDescriptor] {
        &self.arrays
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    pub fn has_array(&self, name: &str) -> bool {
        self.arrays.iter().any(|a| a.name == name)
    }

    /// Last published snapshot, if any refresh ever succeeded.
    pub fn snapshot(&self) -> Option<Arc<SystemSnapshot>> {
        self.snapshot.read().ok().and_then(|guard| guard.clone())
    }

    pub fn last_update_success(&self) -> bool {
        self.last_update_success.load(Ordering::Relaxed)
    }

    pub fn available(&self) -> bool {
        self.last_update_success() && self.snapshot().is_some_and(|s| !s.arrays.is_empty())
    }

    /// Runs one refresh cycle, for every array or only `scope`.
    ///
    /// A scoped refresh carries the other arrays over from the current
    /// snapshot. On error nothing is published and the previous snapshot
    /// stays readable.
    pub async fn refresh_now(&self, scope: Option<&str>) -> Result<RefreshOutcome, RefreshError> {
        let targets: Vec<ArrayDescriptor> = match scope {
            None => self.arrays.clone(),
            Some(name) => {
                let array = self
                    .arrays
                    .iter()
                    .find(|a| a.name == name)
                    .ok_or_else(|| RefreshError::UnknownArray(name.to_string()))?;
                vec![array.clone()]
            }
        };

        let _guard = self.refresh_lock.lock().await;
        let previous = self.snapshot();

        let mut outcome = match self.orchestrator.refresh(&self.location, &targets, previous.as_deref()).await {
            Ok(outcome) => outcome,
            Err(e) => {
                self.last_update_success.store(false, Ordering::Relaxed);
                error!("Refresh of system {} failed: {}", self.id, e);
                return Err(e);
            }
        };

        if scope.is_some() {
            outcome.snapshot = Arc::new(self.merge_scoped(&outcome.snapshot, previous.as_deref()));
        }

        self.publish(outcome.snapshot.clone());
        info!(
            "[UPDATE] System: {} | arrays: {}/{} | total kWp: {:.2}",
            self.id,
            outcome.snapshot.arrays.len(),
            self.arrays.len(),
            outcome.snapshot.total_kwp()
        );
        Ok(outcome)
    }

    /// Configuration-ordered merge of freshly fetched arrays over the previous snapshot.
    fn merge_scoped(&self, fresh: &SystemSnapshot, previous: Option<&SystemSnapshot>) -> SystemSnapshot {
        let series = self
            .arrays
            .iter()
            .filter_map(|a| fresh.get(&a.name).or_else(|| previous.and_then(|p| p.get(&a.name))))
            .cloned()
            .collect();
        SystemSnapshot::new(series, fresh.last_updated)
    }

    fn publish(&self, snapshot: Arc<SystemSnapshot>) {
        if let Ok(mut guard) = self.snapshot.write() {
            *guard = Some(snapshot);
        }
        self.last_update_success.store(true, Ordering::Relaxed);
    }

    /// Refreshes every `interval` until the handle is aborted.
    pub fn spawn_refresh_loop(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                debug!("Scheduled refresh for system {}", self.id);
                if let Ok(outcome) = self.refresh_now(None).await {
                    if outcome.is_partial() {
                        warn!("System {} refreshed with {} failed arrays", self.id, outcome.failed.len());
                    }
                }
            }
        })
    }

    // ─── Read-only queries ───────────────────────────────────────────────────

    /// Hourly series of one array, or of the whole system when `array` is `None`.
    pub fn hourly_forecast(&self, array: Option<&str>, days: u32, now: DateTime<Utc>) -> Vec<HourlyForecastEntry> {
        let Some(snapshot) = self.snapshot() else {
            return Vec::new();
        };
        match array {
            Some(name) => snapshot
                .get(name)
                .map(|s| aggregator::hourly_forecast(&s.points, now, days))
                .unwrap_or_default(),
            None => aggregator::hourly_forecast(snapshot.combined(), now, days),
        }
    }

    pub fn dashboard_forecast(&self, period: DashboardPeriod, now: DateTime<Utc>) -> DashboardForecast {
        let snapshot = self.snapshot();
        aggregator::dashboard_forecast(combined_or_empty(snapshot.as_deref()), period, now, self.tz)
    }

    pub fn total_system_forecast(&self, hours: u32, now: DateTime<Utc>) -> TotalSystemForecast {
        let snapshot = self.snapshot();
        aggregator::total_system_forecast(combined_or_empty(snapshot.as_deref()), &self.arrays, hours, now)
    }

    pub fn report(&self, result: &Result<RefreshOutcome, RefreshError>) -> RefreshReport {
        match result {
            Ok(outcome) => RefreshReport {
                system_id: self.id.clone(),
                refreshed: outcome.refreshed.clone(),
                failed: outcome.failed.iter().cloned().collect::<BTreeMap<_, _>>(),
                error: None,
                last_updated: Some(outcome.snapshot.last_updated),
            },
            Err(e) => RefreshReport {
                system_id: self.id.clone(),
                refreshed: Vec::new(),
                failed: BTreeMap::new(),
                error: Some(e.to_string()),
                last_updated: self.snapshot().map(|s| s.last_updated),
            },
        }
    }
}

fn combined_or_empty(snapshot: Option<&SystemSnapshot>) -> &[CombinedPoint] {
    snapshot.map(SystemSnapshot::combined).unwrap_or(&[])
}
