use axum::{routing::{get, post}, Router};
use crate::controllers::forecast_controller::{
    // Systems
    list_systems, get_snapshot, get_sensors,
    // Refresh triggers
    refresh_all, refresh_system,
    // Presentation queries
    get_hourly_forecast, get_dashboard_forecast, get_total_forecast,
};
use crate::shared_state::AppState;

/// Build the `/api/*` sub-router.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/systems",                          get(list_systems))
        .route("/systems/{id}/snapshot",            get(get_snapshot))
        .route("/systems/{id}/sensors",             get(get_sensors))
        .route("/refresh",                          post(refresh_all))
        .route("/systems/{id}/refresh",             post(refresh_system))
        .route("/systems/{id}/forecast/hourly",     get(get_hourly_forecast))
        .route("/systems/{id}/forecast/dashboard",  get(get_dashboard_forecast))
        .route("/systems/{id}/forecast/total",      get(get_total_forecast))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    use axum::body::Body;
    use axum::http::{Method, Request, StatusCode};
    use chrono_tz::Europe::London;
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::config::SystemConfig;
    use crate::services::coordinator::Coordinator;
    use crate::services::orchestrator::Orchestrator;
    use crate::services::testing::{three_arrays, FakeSource};

    async fn setup(refresh: bool) -> (Router, Arc<FakeSource>) {
        let source = Arc::new(FakeSource::new());
        let system = SystemConfig { id: "home".into(), latitude: 51.5, longitude: -0.12, arrays: three_arrays() };
        let coordinator = Arc::new(Coordinator::new(
            &system,
            London,
            Orchestrator::new(source.clone(), Duration::from_secs(2)),
        ));
        if refresh {
            coordinator.refresh_now(None).await.unwrap();
        }
        let state = AppState::new();
        state.insert(coordinator);
        (api_routes(state), source)
    }

    async fn call(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_list_systems() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app, Method::GET, "/systems").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["id"], "home");
        assert_eq!(body[0]["available"], true);
        assert_eq!(body[0]["arrays"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_unknown_system_is_404() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app, Method::GET, "/systems/barn/snapshot").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("barn"));
    }

    #[tokio::test]
    async fn test_snapshot_before_first_refresh_is_404() {
        let (app, _) = setup(false).await;
        let (status, _) = call(app, Method::GET, "/systems/home/snapshot").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_snapshot_totals() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app, Method::GET, "/systems/home/snapshot").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["arrays"].as_array().unwrap().len(), 3);
        assert_eq!(body["total_kwp"], 7.0);
        assert_eq!(body["arrays"][0]["points"], 96);
    }

    #[tokio::test]
    async fn test_sensors() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app, Method::GET, "/systems/home/sensors").await;

        assert_eq!(status, StatusCode::OK);
        let readings = body.as_array().unwrap();
        assert_eq!(readings.len(), 3 * 6 + 6 + 5);
        assert!(readings.iter().all(|r| r["available"] == true));
    }

    #[tokio::test]
    async fn test_scoped_refresh() {
        let (app, source) = setup(true).await;
        let (status, body) = call(app, Method::POST, "/systems/home/refresh?array=B").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["refreshed"], serde_json::json!(["B"]));
        assert_eq!(source.calls(), 4);
    }

    #[tokio::test]
    async fn test_refresh_unknown_array_is_404() {
        let (app, _) = setup(true).await;
        let (status, _) = call(app, Method::POST, "/systems/home/refresh?array=west").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_failed_refresh_is_503_and_keeps_data() {
        let (app, source) = setup(true).await;
        source.set_failing(&["A", "B", "C"]);

        let (status, body) = call(app.clone(), Method::POST, "/systems/home/refresh").await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert!(body["error"].as_str().unwrap().contains("any of 3"));

        let (status, body) = call(app, Method::GET, "/systems/home/snapshot").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["arrays"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_refresh_all_reports_partial_failure() {
        let (app, source) = setup(true).await;
        source.set_failing(&["C"]);

        let (status, body) = call(app, Method::POST, "/refresh").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body[0]["system_id"], "home");
        assert_eq!(body[0]["refreshed"], serde_json::json!(["A", "B"]));
        assert!(body[0]["failed"]["C"].is_string());
        assert!(body[0]["error"].is_null());
    }

    #[tokio::test]
    async fn test_hourly_forecast_query() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app.clone(), Method::GET, "/systems/home/forecast/hourly?array=A&days=1").await;
        assert_eq!(status, StatusCode::OK);
        assert!(!body.as_array().unwrap().is_empty());

        let (status, _) = call(app.clone(), Method::GET, "/systems/home/forecast/hourly?days=30").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = call(app.clone(), Method::GET, "/systems/home/forecast/hourly?days=soon").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = call(app, Method::GET, "/systems/home/forecast/hourly?array=west").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_dashboard_forecast_query() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app.clone(), Method::GET, "/systems/home/forecast/dashboard?period=tomorrow").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["forecast_type"], "tomorrow");
        assert!(body["total_energy"].as_f64().unwrap() > 0.0);

        let (status, _) = call(app, Method::GET, "/systems/home/forecast/dashboard?period=yesterday").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_total_forecast_query() {
        let (app, _) = setup(true).await;
        let (status, body) = call(app.clone(), Method::GET, "/systems/home/forecast/total?hours=12").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hours_requested"], 12);
        assert_eq!(body["arrays_count"], 3);
        assert_eq!(body["system_kwp"], 7.0);
        assert!(body["data_points"].as_u64().unwrap() >= 12);

        let (status, _) = call(app, Method::GET, "/systems/home/forecast/total?hours=0").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
