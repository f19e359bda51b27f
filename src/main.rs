// Main entry point - Dependency injection and server setup
mod domain;
mod application;
mod infrastructure;
mod presentation;

use std::{net::SocketAddr, sync::Arc};
use anyhow::Context;
use axum::{routing::{get, post}, Router};
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::application::connection_supervisor::SupervisorContext;
use crate::application::fallback_cache::{DurableFallbackCache, KeyValueStore};
use crate::application::fleet_service::FleetService;
use crate::domain::clock::SystemClock;
use crate::infrastructure::config::load_settings;
use crate::infrastructure::key_value_store::{FileStore, MemoryStore};
use crate::infrastructure::robot_api::HttpRobotApi;
use crate::infrastructure::websocket_stream::WebSocketConnector;
use crate::presentation::app_state::AppState;
use crate::presentation::handlers::{
    health_check, list_robots, robot_telemetry, stream_robot, unwatch_robot, watch_robot,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Load configuration
    let settings = load_settings().context("Failed to load configuration")?;

    // Create adapters (infrastructure layer)
    let store: Arc<dyn KeyValueStore> = if settings.storage.persist {
        Arc::new(FileStore::new(&settings.storage.dir))
    } else {
        tracing::warn!("Fallback cache persistence disabled, cached telemetry is lost on restart");
        Arc::new(MemoryStore::new())
    };
    let connector = Arc::new(WebSocketConnector::new(settings.stream.ws_base.clone()));
    let directory = Arc::new(HttpRobotApi::new(
        settings.api.base_url.clone(),
        settings.api.access_token.clone(),
        settings.api.refresh_token.clone(),
        settings.api.refresh_path.clone(),
    ));

    // Create services (application layer)
    let context = SupervisorContext {
        connector,
        fallback: DurableFallbackCache::new(store),
        clock: Arc::new(SystemClock::new()),
        settings: settings.stream.supervisor_settings(),
    };
    let fleet = Arc::new(FleetService::new(context, directory, settings.fleet.robots.clone()));

    if settings.fleet.discover {
        fleet.watch_fleet().await;
    } else {
        for robot_id in &settings.fleet.robots {
            fleet.watch(robot_id).await;
        }
    }

    let state = Arc::new(AppState { fleet: fleet.clone() });

    // Build router (presentation layer)
    // Stream chunks are compressed individually, so no CompressionLayer here
    let router = Router::new()
        .route("/healthz", get(health_check))
        .route("/robots", get(list_robots))
        .route("/robots/:id/telemetry", get(robot_telemetry))
        .route("/robots/:id/watch", post(watch_robot).delete(unwatch_robot))
        .route("/robots/:id/stream", get(stream_robot))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = settings
        .server
        .listen
        .parse()
        .with_context(|| format!("Invalid listen address {}", settings.server.listen))?;
    tracing::info!(%addr, "Starting robot-telemetry service");

    axum::serve(tokio::net::TcpListener::bind(addr).await?, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    fleet.shutdown().await;
    tracing::info!("Stopped all robot connections");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
