use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use chrono_tz::Tz;
use reqwest::{Client, StatusCode};
use tracing::{debug, info, warn};

use crate::config::ProviderConfig;
use crate::errors::FetchError;
use crate::models::array::{ArrayDescriptor, Location};
use crate::models::forecast::{
    ArraySeries, ForecastPoint, HourlyBlock, HourlyForecastResponse, PowerPoint,
};
use crate::services::{aggregator, power_model};

const HOURLY_VARIABLES: &str = "shortwave_radiation,temperature_2m,cloud_cover,wind_speed_10m";

/// Source of modeled per-array forecasts.
/// The orchestrator only knows this trait, never the provider behind it.
#[async_trait]
pub trait ForecastSource: Send + Sync {
    /// Fetch the provider's hourly window for `location` and model it for `array`
    async fn fetch_array_forecast(&self, location: &Location, array: &ArrayDescriptor) -> Result<ArraySeries, FetchError>;

    /// Source name for logging
    fn name(&self) -> &str;
}

/// Open-Meteo hourly forecast client
pub struct OpenMeteoClient {
    client: Client,
    provider: ProviderConfig,
    tz: Tz,
}

impl OpenMeteoClient {
    /// Returns a new client with a bounded request timeout
    ///
    /// # Arguments
    ///
    /// * 'provider' - endpoint, timeout, horizon and weather model
    /// * 'tz' - business timezone used for the series' summary metrics
    pub fn new(provider: ProviderConfig, tz: Tz) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(provider.timeout())
            .build()?;

        Ok(Self { client, provider, tz })
    }

    fn classify(&self, e: reqwest::Error) -> FetchError {
        if e.is_timeout() {
            FetchError::Timeout { seconds: self.provider.timeout_secs }
        } else {
            FetchError::Http(e)
        }
    }
}

#[async_trait]
impl ForecastSource for OpenMeteoClient {
    async fn fetch_array_forecast(&self, location: &Location, array: &ArrayDescriptor) -> Result<ArraySeries, FetchError> {
        debug!("Fetching forecast for array: {}", array.name);

        let params = [
            ("latitude", location.latitude.to_string()),
            ("longitude", location.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.to_string()),
            ("timezone", "auto".to_string()),
            ("forecast_days", self.provider.forecast_days.to_string()),
            ("models", self.provider.model.clone()),
        ];

        let response = self.client
            .get(&self.provider.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        debug!("Received response for {} - Status: {}", array.name, status.as_u16());
        if status != StatusCode::OK {
            return Err(FetchError::Status { status: status.as_u16() });
        }

        let body = response.text().await.map_err(|e| self.classify(e))?;
        let payload: HourlyForecastResponse =
            serde_json::from_str(&body).map_err(|e| FetchError::Payload(e.to_string()))?;
        debug!("Received {} hourly data points for {}", payload.hourly.time.len(), array.name);

        let series = build_series(&payload, array, Utc::now(), self.tz);
        if series.is_empty() {
            warn!("No usable forecast data received for array {}", array.name);
        } else {
            info!("Fetched {} forecast hours for array: {}", series.points.len(), array.name);
        }
        Ok(series)
    }

    fn name(&self) -> &str {
        "open-meteo"
    }
}

// ─── Payload → series ────────────────────────────────────────────────────────

/// Turns the provider's columnar hourly block into a modeled series.
///
/// Hours without irradiance are dropped; missing temperature, cloud cover or
/// wind fall back to defaults so the time axis is never shortened by them.
pub fn build_series(
    payload: &HourlyForecastResponse,
    array: &ArrayDescriptor,
    now: DateTime<Utc>,
    tz: Tz,
) -> ArraySeries {
    let Some(offset) = FixedOffset::east_opt(payload.utc_offset_seconds) else {
        warn!("Ignoring invalid utc offset {}s for array {}", payload.utc_offset_seconds, array.name);
        return ArraySeries::empty(array.clone(), now);
    };

    let points: Vec<PowerPoint> = forecast_points(&payload.hourly, offset, &array.name)
        .map(|fp| PowerPoint {
            timestamp: fp.timestamp,
            power_kw: power_model::compute_power(array, &fp),
            temperature_c: fp.temperature_c,
            cloud_cover_pct: fp.cloud_cover_pct,
            wind_speed: fp.wind_speed,
        })
        .collect();

    if points.is_empty() {
        return ArraySeries::empty(array.clone(), now);
    }

    ArraySeries {
        array: array.clone(),
        summary: aggregator::summary_metrics(&points, now, tz),
        points,
        last_updated: now,
    }
}

fn forecast_points<'a>(
    hourly: &'a HourlyBlock,
    offset: FixedOffset,
    array_name: &'a str,
) -> impl Iterator<Item = ForecastPoint> + 'a {
    hourly.time.iter().enumerate().filter_map(move |(i, raw)| {
        let irradiance = hourly.shortwave_radiation.get(i).copied().flatten()?;
        let Some(timestamp) = parse_time(raw, offset) else {
            warn!("Skipping forecast hour {} for {}: unparseable time '{}'", i, array_name, raw);
            return None;
        };
        let base = ForecastPoint::new(timestamp, irradiance);
        Some(ForecastPoint {
            temperature_c: column(&hourly.temperature_2m, i).unwrap_or(base.temperature_c),
            cloud_cover_pct: column(&hourly.cloud_cover, i).unwrap_or(base.cloud_cover_pct),
            wind_speed: column(&hourly.wind_speed_10m, i).unwrap_or(base.wind_speed),
            ..base
        })
    })
}

fn column(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

/// Open-Meteo sends local wall-clock times like "2025-06-21T12:00"; the
/// payload's utc offset makes them absolute. Full RFC 3339 is also accepted.
fn parse_time(raw: &str, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .and_then(|naive| naive.and_local_timezone(offset).single())
}
