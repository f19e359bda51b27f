// HTTP request handlers
use crate::application::fleet_service::RobotOverview;
use crate::application::robot_feed::{RobotFeed, TelemetryNotice};
use crate::domain::snapshot::{ConnectionState, TelemetrySnapshot};
use crate::infrastructure::chunked_json::chunked_json_stream;
use crate::presentation::app_state::AppState;
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

/// One chunk of the live feed: what changed plus the state after the change
#[derive(Debug, Serialize)]
pub struct FeedUpdate {
    pub notice: Option<TelemetryNotice>,
    pub state: ConnectionState,
    pub status: &'static str,
    pub live: bool,
    pub error: Option<String>,
    pub snapshot: TelemetrySnapshot,
}

impl FeedUpdate {
    fn current(feed: &RobotFeed, notice: Option<TelemetryNotice>) -> Self {
        let state = feed.connection_state();
        Self {
            notice,
            state,
            status: feed.status(),
            live: state.is_live(),
            error: feed.last_error(),
            snapshot: feed.snapshot(),
        }
    }
}

fn accepts_brotli(headers: &HeaderMap) -> bool {
    headers
        .get("accept-encoding")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.contains("br"))
        .unwrap_or(false)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Overview of every watched robot
pub async fn list_robots(State(state): State<Arc<AppState>>) -> Json<Vec<RobotOverview>> {
    let mut overviews = Vec::new();
    for robot_id in state.fleet.watched().await {
        if let Some(overview) = state.fleet.overview(&robot_id).await {
            overviews.push(overview);
        }
    }
    Json(overviews)
}

/// Current snapshot and connection state of one robot
pub async fn robot_telemetry(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<Json<RobotOverview>, StatusCode> {
    state
        .fleet
        .overview(&id)
        .await
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// Start watching a robot (idempotent). Unknown robots are rejected.
pub async fn watch_robot(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> Result<(StatusCode, Json<FeedUpdate>), StatusCode> {
    let feed = state
        .fleet
        .watch_known(&id)
        .await
        .ok_or(StatusCode::NOT_FOUND)?;
    Ok((StatusCode::ACCEPTED, Json(FeedUpdate::current(&feed, None))))
}

/// Stop watching a robot
pub async fn unwatch_robot(
    Path(id): Path<String>,
    State(state): State<Arc<AppState>>,
) -> StatusCode {
    if state.fleet.unwatch(&id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

/// Live feed for one robot: the current state first, then one chunk per change
/// until the robot is unwatched
pub async fn stream_robot(
    Path(id): Path<String>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> Response {
    let Some(feed) = state.fleet.feed(&id).await else {
        return StatusCode::NOT_FOUND.into_response();
    };
    let compress = accepts_brotli(&headers);
    let mut notices = feed.subscribe();

    let updates = async_stream::stream! {
        yield FeedUpdate::current(&feed, None);
        loop {
            match notices.recv().await {
                Ok(notice) => {
                    let stopped = notice
                        == TelemetryNotice::ConnectionChanged { state: ConnectionState::Idle };
                    yield FeedUpdate::current(&feed, Some(notice));
                    if stopped {
                        break;
                    }
                }
                // every update carries a full snapshot, so skipped notices lose nothing
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(robot_id = %feed.robot_id(), skipped, "Live feed subscriber lagged");
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    match chunked_json_stream(updates, compress) {
        Ok(response) => response,
        Err(status) => status.into_response(),
    }
}
