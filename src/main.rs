mod routes;
mod controllers;
mod services;
mod models;
mod api_docs;
mod shared_state;
mod config;
mod errors;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, routing::get, response::Html};
use chrono_tz::Tz;
use tokio::task::JoinHandle;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_scalar::Scalar;

use crate::api_docs::ApiDoc;
use crate::config::{Config, SystemConfig};
use crate::errors::FetchError;
use crate::routes::forecast_routes::api_routes;
use crate::services::coordinator::Coordinator;
use crate::services::forecast_fetcher::OpenMeteoClient;
use crate::services::orchestrator::Orchestrator;
use crate::shared_state::AppState;

#[cfg(feature = "verbose_log")]
const DEFAULT_LOG_FILTER: &str = "multi_solar_forecast=debug,tower_http=debug";
#[cfg(not(feature = "verbose_log"))]
const DEFAULT_LOG_FILTER: &str = "multi_solar_forecast=info,tower_http=info";

/// Builds a system's coordinator, runs its first refresh, registers it and
/// starts its refresh loop. A failed first refresh still registers the system.
async fn setup_system(
    state: &AppState,
    config: &Config,
    system: &SystemConfig,
    tz: Tz,
) -> Result<JoinHandle<()>, FetchError> {
    let client = OpenMeteoClient::new(config.provider.clone(), tz)?;
    let orchestrator = Orchestrator::new(Arc::new(client), config.provider.timeout());
    let coordinator = Arc::new(Coordinator::new(system, tz, orchestrator));

    match coordinator.refresh_now(None).await {
        Ok(outcome) if outcome.is_partial() => {
            warn!("System {} started with {} of {} arrays", system.id, outcome.refreshed.len(), system.arrays.len());
        }
        Ok(_) => {}
        Err(e) => warn!("Initial refresh of system {} failed, data unavailable until next cycle: {}", system.id, e),
    }

    state.insert(coordinator.clone());
    Ok(coordinator.spawn_refresh_loop(config.update_interval()))
}

fn teardown_system(state: &AppState, system_id: &str, refresh_loop: JoinHandle<()>) {
    refresh_loop.abort();
    if state.remove(system_id).is_some() {
        info!("Unloaded system {}", system_id);
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    // 1. Load configuration
    let config_path = Config::path_from_env();
    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            error!("Failed to load {}: {}", config_path, e);
            return;
        }
    };
    let tz = match config.business_tz() {
        Ok(tz) => tz,
        Err(e) => {
            error!("{}", e);
            return;
        }
    };
    info!("Configuration loaded: {} systems, business timezone {}", config.systems.len(), tz);

    // 2. Initialize shared state
    let state = AppState::new();

    // 3. Register each system and start its refresh loop
    let mut refresh_loops: Vec<(String, JoinHandle<()>)> = Vec::new();
    for system in &config.systems {
        match setup_system(&state, &config, system, tz).await {
            Ok(handle) => {
                info!(
                    "[SETUP] System: {} | arrays: {} | refresh every {}s",
                    system.id,
                    system.arrays.len(),
                    config.update_interval_secs
                );
                refresh_loops.push((system.id.clone(), handle));
            }
            Err(e) => error!("Failed to set up system {}: {}", system.id, e),
        }
    }

    info!("Registered systems: {}", state.ids().join(", "));

    // 4. Start Axum HTTP server
    let app = Router::new()
        .nest("/api", api_routes(state.clone()))
        .route("/scalar", get(|| async {
            Html(Scalar::new(ApiDoc::openapi()).to_html())
        }))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("API Server listening on http://{}", addr);
    info!("Scalar UI: http://{}/scalar", addr);

    tokio::select! {
        result = axum_server::bind(addr).serve(app.into_make_service()) => {
            if let Err(e) = result {
                error!("HTTP server error: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown requested");
        }
    }

    // 5. Unload every system
    for (system_id, handle) in refresh_loops {
        teardown_system(&state, &system_id, handle);
    }
}
