use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, error, warn};

use crate::errors::{FetchError, RefreshError};
use crate::models::array::{ArrayDescriptor, Location};
use crate::models::forecast::{ArraySeries, SystemSnapshot};
use crate::services::forecast_fetcher::ForecastSource;

/// Result of a refresh that published something.
#[derive(Debug, Clone)]
pub struct RefreshOutcome {
    pub snapshot: Arc<SystemSnapshot>,
    /// Arrays fetched fresh in this cycle
    pub refreshed: Vec<String>,
    /// Arrays that failed, with the reason; their previous entry was kept if one existed
    pub failed: Vec<(String, String)>,
}

impl RefreshOutcome {
    pub fn is_partial(&self) -> bool {
        !self.failed.is_empty()
    }
}

/// Fans out one fetch per array and folds the results into a snapshot.
pub struct Orchestrator {
    source: Arc<dyn ForecastSource>,
    fetch_timeout: Duration,
}

impl Orchestrator {
    pub fn new(source: Arc<dyn ForecastSource>, fetch_timeout: Duration) -> Self {
        Self { source, fetch_timeout }
    }

    /// Fetches every array concurrently and waits for all of them.
    ///
    /// A failed array keeps its entry from `previous` (or stays absent).
    /// Fails only when no array succeeded; `previous` is never modified.
    pub async fn refresh(
        &self,
        location: &Location,
        arrays: &[ArrayDescriptor],
        previous: Option<&SystemSnapshot>,
    ) -> Result<RefreshOutcome, RefreshError> {
        debug!("Fetching solar forecast data for {} arrays from {}", arrays.len(), self.source.name());

        let fetches = arrays.iter().map(|array| self.fetch_one(location, array));
        let results = join_all(fetches).await;

        let mut series: Vec<ArraySeries> = Vec::with_capacity(arrays.len());
        let mut refreshed = Vec::new();
        let mut failed = Vec::new();

        for (array, result) in arrays.iter().zip(results) {
            match result {
                Ok(fresh) => {
                    refreshed.push(array.name.clone());
                    series.push(fresh);
                }
                Err(e) => {
                    warn!("Failed to fetch data for array {}: {}", array.name, e);
                    if let Some(stale) = previous.and_then(|p| p.get(&array.name)) {
                        series.push(stale.clone());
                    }
                    failed.push((array.name.clone(), e.to_string()));
                }
            }
        }

        if refreshed.is_empty() {
            error!("Failed to fetch data for any of {} solar arrays", arrays.len());
            return Err(RefreshError::AllFailed { attempted: arrays.len() });
        }
        if !failed.is_empty() {
            warn!("Only {} of {} arrays updated successfully", refreshed.len(), arrays.len());
        }

        Ok(RefreshOutcome {
            snapshot: Arc::new(SystemSnapshot::new(series, Utc::now())),
            refreshed,
            failed,
        })
    }

    async fn fetch_one(&self, location: &Location, array: &ArrayDescriptor) -> Result<ArraySeries, FetchError> {
        match tokio::time::timeout(self.fetch_timeout, self.source.fetch_array_forecast(location, array)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout { seconds: self.fetch_timeout.as_secs() }),
        }
    }
}
