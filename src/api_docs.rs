use utoipa::OpenApi;
use crate::controllers::forecast_controller;
use crate::models::{array, dashboard, forecast};

#[derive(OpenApi)]
#[openapi(
    paths(
        forecast_controller::list_systems,
        forecast_controller::get_snapshot,
        forecast_controller::get_sensors,
        forecast_controller::refresh_all,
        forecast_controller::refresh_system,
        forecast_controller::get_hourly_forecast,
        forecast_controller::get_dashboard_forecast,
        forecast_controller::get_total_forecast
    ),
    components(
        schemas(
            array::Location,
            array::ArrayDescriptor,
            forecast::SummaryMetrics,
            forecast::CombinedPoint,
            dashboard::DashboardPeriod,
            dashboard::SystemInfo,
            dashboard::SnapshotResponse,
            dashboard::ArraySummary,
            dashboard::SensorReading,
            dashboard::RefreshReport,
            dashboard::HourlyForecastEntry,
            dashboard::EnergySlot,
            dashboard::DashboardForecast,
            dashboard::TotalForecastEntry,
            dashboard::TotalSystemForecast
        )
    ),
    tags(
        (name = "multi-solar-forecast", description = "Multi-array solar production forecast API")
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_route_is_documented() {
        let doc = ApiDoc::openapi();
        for path in [
            "/api/systems",
            "/api/systems/{id}/snapshot",
            "/api/systems/{id}/sensors",
            "/api/refresh",
            "/api/systems/{id}/refresh",
            "/api/systems/{id}/forecast/hourly",
            "/api/systems/{id}/forecast/dashboard",
            "/api/systems/{id}/forecast/total",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {}", path);
        }
    }
}
