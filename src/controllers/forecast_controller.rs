use std::sync::Arc;

use axum::{
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use futures_util::future::join_all;
use serde::Deserialize;
use serde_json::json;

use crate::errors::RefreshError;
use crate::models::dashboard::{
    ArraySummary, DashboardForecast, DashboardPeriod, HourlyForecastEntry, RefreshReport, SensorReading,
    SnapshotResponse, SystemInfo, TotalSystemForecast,
};
use crate::models::forecast::SummaryMetrics;
use crate::services::coordinator::Coordinator;
use crate::services::sensors;
use crate::shared_state::AppState;

pub const MAX_FORECAST_DAYS: u32 = 7;
pub const MAX_FORECAST_HOURS: u32 = 168;

fn default_days() -> u32 { 1 }
fn default_hours() -> u32 { 24 }

#[derive(Debug, Deserialize)]
pub struct RefreshQuery {
    pub array: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct HourlyQuery {
    pub array: Option<String>,
    #[serde(default = "default_days")]
    pub days: u32,
}

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    #[serde(default)]
    pub period: DashboardPeriod,
}

#[derive(Debug, Deserialize)]
pub struct TotalQuery {
    #[serde(default = "default_hours")]
    pub hours: u32,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(json!({"error": message.into()}))).into_response()
}

fn parse_query<T>(query: Result<Query<T>, QueryRejection>) -> Result<T, Response> {
    query
        .map(|Query(q)| q)
        .map_err(|e| error_response(StatusCode::BAD_REQUEST, e.body_text()))
}

fn lookup(state: &AppState, id: &str) -> Result<Arc<Coordinator>, Response> {
    state
        .get(id)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, format!("System '{}' not found", id)))
}

fn system_info(c: &Coordinator) -> SystemInfo {
    SystemInfo {
        id: c.id().to_string(),
        location: c.location(),
        arrays: c.arrays().to_vec(),
        available: c.available(),
        last_updated: c.snapshot().map(|s| s.last_updated),
    }
}

/// GET /api/systems
/// List registered systems
///
/// Returns every registered system with its arrays and whether its last refresh succeeded.
#[utoipa::path(
    get,
    path = "/api/systems",
    responses(
        (status = 200, description = "Registered systems", body = Vec<SystemInfo>)
    )
)]
pub async fn list_systems(State(state): State<AppState>) -> impl IntoResponse {
    let systems: Vec<SystemInfo> = state.all().iter().map(|c| system_info(c)).collect();
    Json(systems).into_response()
}

/// GET /api/systems/{id}/snapshot
/// Get the published snapshot summary
///
/// Per-array summary metrics plus their per-metric totals. The snapshot is the
/// last one published; a failed refresh does not replace it.
#[utoipa::path(
    get,
    path = "/api/systems/{id}/snapshot",
    params(
        ("id" = String, Path, description = "System ID")
    ),
    responses(
        (status = 200, description = "Snapshot summary", body = SnapshotResponse),
        (status = 404, description = "System not found or no forecast published yet")
    )
)]
pub async fn get_snapshot(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    let coordinator = match lookup(&state, &id) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let Some(snapshot) = coordinator.snapshot() else {
        return error_response(StatusCode::NOT_FOUND, format!("No forecast data yet for system '{}'", id));
    };

    let mut totals = SummaryMetrics::default();
    let arrays: Vec<ArraySummary> = snapshot
        .arrays
        .iter()
        .map(|s| {
            totals.current_power += s.summary.current_power;
            totals.today_energy += s.summary.today_energy;
            totals.tomorrow_energy += s.summary.tomorrow_energy;
            totals.peak_power_today += s.summary.peak_power_today;
            totals.peak_power_today_remaining += s.summary.peak_power_today_remaining;
            totals.peak_power_tomorrow += s.summary.peak_power_tomorrow;
            ArraySummary {
                name: s.name().to_string(),
                kwp: s.array.peak_power_kwp,
                points: s.points.len(),
                summary: s.summary,
                last_updated: s.last_updated,
            }
        })
        .collect();

    let response = SnapshotResponse {
        system_id: id,
        last_updated: snapshot.last_updated,
        arrays,
        totals,
        total_kwp: snapshot.total_kwp(),
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// GET /api/systems/{id}/sensors
/// Read every sensor of a system
#[utoipa::path(
    get,
    path = "/api/systems/{id}/sensors",
    params(
        ("id" = String, Path, description = "System ID")
    ),
    responses(
        (status = 200, description = "Sensor readings", body = Vec<SensorReading>),
        (status = 404, description = "System not found")
    )
)]
pub async fn get_sensors(Path(id): Path<String>, State(state): State<AppState>) -> Response {
    match lookup(&state, &id) {
        Ok(c) => Json(sensors::read_all(&c, Utc::now())).into_response(),
        Err(response) => response,
    }
}

/// POST /api/refresh
/// Force a refresh of every registered system
///
/// Systems refresh concurrently. Each entry reports what was refreshed or why nothing was published.
#[utoipa::path(
    post,
    path = "/api/refresh",
    responses(
        (status = 200, description = "One report per system", body = Vec<RefreshReport>)
    )
)]
pub async fn refresh_all(State(state): State<AppState>) -> impl IntoResponse {
    let coordinators = state.all();
    let reports: Vec<RefreshReport> = join_all(coordinators.iter().map(|c| async move {
        let result = c.refresh_now(None).await;
        c.report(&result)
    }))
    .await;
    Json(reports).into_response()
}

/// POST /api/systems/{id}/refresh
/// Force a refresh of one system, optionally of a single array
///
/// With `array`, only that array is fetched and the others are carried over.
#[utoipa::path(
    post,
    path = "/api/systems/{id}/refresh",
    params(
        ("id" = String, Path, description = "System ID"),
        ("array" = Option<String>, Query, description = "Refresh only this array")
    ),
    responses(
        (status = 200, description = "Refresh report", body = RefreshReport),
        (status = 404, description = "System or array not found"),
        (status = 503, description = "No array could be refreshed; previous data kept")
    )
)]
pub async fn refresh_system(
    Path(id): Path<String>,
    query: Result<Query<RefreshQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Response {
    let coordinator = match lookup(&state, &id) {
        Ok(c) => c,
        Err(response) => return response,
    };

    let query = match parse_query(query) {
        Ok(q) => q,
        Err(response) => return response,
    };

    let result = coordinator.refresh_now(query.array.as_deref()).await;
    match &result {
        Ok(_) => (StatusCode::OK, Json(coordinator.report(&result))).into_response(),
        Err(RefreshError::UnknownArray(name)) => {
            error_response(StatusCode::NOT_FOUND, format!("Array '{}' not found in system '{}'", name, id))
        }
        Err(e) => error_response(StatusCode::SERVICE_UNAVAILABLE, e.to_string()),
    }
}

/// GET /api/systems/{id}/forecast/hourly
/// Hourly power forecast
///
/// Entries from the start of the series up to `now + days`. Without `array`
/// the whole-system sum is returned.
#[utoipa::path(
    get,
    path = "/api/systems/{id}/forecast/hourly",
    params(
        ("id" = String, Path, description = "System ID"),
        ("array" = Option<String>, Query, description = "Array name; omit for the whole system"),
        ("days" = Option<u32>, Query, description = "Days ahead, 1 to 7 (default 1)")
    ),
    responses(
        (status = 200, description = "Hourly entries", body = Vec<HourlyForecastEntry>),
        (status = 400, description = "Invalid query"),
        (status = 404, description = "System or array not found")
    )
)]
pub async fn get_hourly_forecast(
    Path(id): Path<String>,
    query: Result<Query<HourlyQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Response {
    let coordinator = match lookup(&state, &id) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let query = match parse_query(query) {
        Ok(q) => q,
        Err(response) => return response,
    };
    if !(1..=MAX_FORECAST_DAYS).contains(&query.days) {
        return error_response(StatusCode::BAD_REQUEST, format!("days must be between 1 and {}", MAX_FORECAST_DAYS));
    }
    if let Some(name) = query.array.as_deref() {
        if !coordinator.has_array(name) {
            return error_response(StatusCode::NOT_FOUND, format!("Array '{}' not found in system '{}'", name, id));
        }
    }

    let entries = coordinator.hourly_forecast(query.array.as_deref(), query.days, Utc::now());
    Json(entries).into_response()
}

/// GET /api/systems/{id}/forecast/dashboard
/// Energy dashboard forecast
///
/// Hourly energy slots for today, tomorrow or the rest of today, summed over all arrays.
#[utoipa::path(
    get,
    path = "/api/systems/{id}/forecast/dashboard",
    params(
        ("id" = String, Path, description = "System ID"),
        ("period" = Option<DashboardPeriod>, Query, description = "today (default), tomorrow or remaining_today")
    ),
    responses(
        (status = 200, description = "Dashboard forecast", body = DashboardForecast),
        (status = 400, description = "Invalid query"),
        (status = 404, description = "System not found")
    )
)]
pub async fn get_dashboard_forecast(
    Path(id): Path<String>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Response {
    let coordinator = match lookup(&state, &id) {
        Ok(c) => c,
        Err(response) => return response,
    };
    match parse_query(query) {
        Ok(q) => Json(coordinator.dashboard_forecast(q.period, Utc::now())).into_response(),
        Err(response) => response,
    }
}

/// GET /api/systems/{id}/forecast/total
/// Whole-system forecast for the next hours
#[utoipa::path(
    get,
    path = "/api/systems/{id}/forecast/total",
    params(
        ("id" = String, Path, description = "System ID"),
        ("hours" = Option<u32>, Query, description = "Hours ahead, 1 to 168 (default 24)")
    ),
    responses(
        (status = 200, description = "Total system forecast", body = TotalSystemForecast),
        (status = 400, description = "Invalid query"),
        (status = 404, description = "System not found")
    )
)]
pub async fn get_total_forecast(
    Path(id): Path<String>,
    query: Result<Query<TotalQuery>, QueryRejection>,
    State(state): State<AppState>,
) -> Response {
    let coordinator = match lookup(&state, &id) {
        Ok(c) => c,
        Err(response) => return response,
    };
    let query = match parse_query(query) {
        Ok(q) => q,
        Err(response) => return response,
    };
    if !(1..=MAX_FORECAST_HOURS).contains(&query.hours) {
        return error_response(StatusCode::BAD_REQUEST, format!("hours must be between 1 and {}", MAX_FORECAST_HOURS));
    }
    Json(coordinator.total_system_forecast(query.hours, Utc::now())).into_response()
}
