// Fleet service - mounts and unmounts per-robot telemetry watches
use crate::application::connection_supervisor::{ConnectionSupervisor, SupervisorContext};
use crate::application::robot_directory::RobotDirectory;
use crate::application::robot_feed::{RobotFeed, TelemetryNotice};
use crate::domain::robot::{RobotInfo, is_battery_low};
use crate::domain::snapshot::{ConnectionState, TelemetrySnapshot};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::time::Instant;

/// How long a failed metadata lookup is remembered before the backend is asked again
pub const METADATA_RETRY: Duration = Duration::from_secs(60);

struct Watch {
    feed: Arc<RobotFeed>,
    supervisor: ConnectionSupervisor,
}

enum Metadata {
    Known(RobotInfo),
    Missing { retry_at: Instant },
}

#[derive(Debug, Clone, Serialize)]
pub struct RobotOverview {
    pub robot_id: String,
    pub name: Option<String>,
    pub state: ConnectionState,
    pub status: &'static str,
    /// Reason of the last failed connection, until a connection opens again
    pub error: Option<String>,
    /// Milliseconds since the newest value in the snapshot
    pub data_age_ms: Option<i64>,
    pub battery_low: Option<bool>,
    pub snapshot: TelemetrySnapshot,
}

pub struct FleetService {
    context: SupervisorContext,
    directory: Arc<dyn RobotDirectory>,
    configured_robots: Vec<String>,
    watches: Mutex<HashMap<String, Watch>>,
    robot_info: RwLock<HashMap<String, Metadata>>,
}

impl FleetService {
    pub fn new(
        context: SupervisorContext,
        directory: Arc<dyn RobotDirectory>,
        configured_robots: Vec<String>,
    ) -> Self {
        Self {
            context,
            directory,
            configured_robots,
            watches: Mutex::new(HashMap::new()),
            robot_info: RwLock::new(HashMap::new()),
        }
    }

    /// Mount: seed from the fallback cache, then start the connection supervisor.
    /// Watching an already watched robot returns the existing feed.
    pub async fn watch(&self, robot_id: &str) -> Arc<RobotFeed> {
        let mut watches = self.watches.lock().await;
        if let Some(existing) = watches.get(robot_id) {
            return existing.feed.clone();
        }

        let feed = Arc::new(RobotFeed::new(robot_id));
        if let Some(cached) = self.context.fallback.load(robot_id).await {
            tracing::info!(
                robot_id = %robot_id,
                channels = cached.entries().count(),
                "Seeded telemetry from fallback cache"
            );
            feed.seed(&cached);
        }

        let supervisor = ConnectionSupervisor::start(feed.clone(), self.context.clone());
        watches.insert(
            robot_id.to_string(),
            Watch {
                feed: feed.clone(),
                supervisor,
            },
        );
        feed
    }

    /// Watch only robots the backend knows or the configuration names
    pub async fn watch_known(&self, robot_id: &str) -> Option<Arc<RobotFeed>> {
        if let Some(feed) = self.feed(robot_id).await {
            return Some(feed);
        }

        let configured = self.configured_robots.iter().any(|id| id == robot_id);
        if !configured && self.robot_info(robot_id).await.is_none() {
            tracing::debug!(robot_id = %robot_id, "Refusing to watch unknown robot");
            return None;
        }
        Some(self.watch(robot_id).await)
    }

    /// Unmount: stop the supervisor and drop the in-memory cache
    pub async fn unwatch(&self, robot_id: &str) -> bool {
        let removed = self.watches.lock().await.remove(robot_id);
        match removed {
            Some(watch) => {
                watch.supervisor.stop().await;
                true
            }
            None => false,
        }
    }

    /// Watch every robot the backend lists, or the configured robots if discovery fails
    pub async fn watch_fleet(&self) -> Vec<String> {
        let robot_ids = match self.directory.list_robots().await {
            Ok(robots) => {
                let mut info = self.robot_info.write().await;
                robots
                    .into_iter()
                    .map(|robot| {
                        let id = robot.id.to_string();
                        info.insert(id.clone(), Metadata::Known(robot));
                        id
                    })
                    .collect()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Robot discovery failed, using configured robots");
                self.configured_robots.clone()
            }
        };

        for robot_id in &robot_ids {
            self.watch(robot_id).await;
        }
        tracing::info!(count = robot_ids.len(), "Watching fleet");
        robot_ids
    }

    pub async fn shutdown(&self) {
        let watches: Vec<Watch> = self.watches.lock().await.drain().map(|(_, w)| w).collect();
        for watch in watches {
            watch.supervisor.stop().await;
        }
    }

    pub async fn feed(&self, robot_id: &str) -> Option<Arc<RobotFeed>> {
        self.watches
            .lock()
            .await
            .get(robot_id)
            .map(|w| w.feed.clone())
    }

    pub async fn snapshot(&self, robot_id: &str) -> Option<TelemetrySnapshot> {
        self.feed(robot_id).await.map(|feed| feed.snapshot())
    }

    pub async fn connection_state(&self, robot_id: &str) -> Option<ConnectionState> {
        self.feed(robot_id).await.map(|feed| feed.connection_state())
    }

    pub async fn subscribe(&self, robot_id: &str) -> Option<broadcast::Receiver<TelemetryNotice>> {
        self.feed(robot_id).await.map(|feed| feed.subscribe())
    }

    pub async fn watched(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.watches.lock().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn overview(&self, robot_id: &str) -> Option<RobotOverview> {
        let feed = self.feed(robot_id).await?;
        let snapshot = feed.snapshot();
        let state = feed.connection_state();
        let robot = self.robot_info(robot_id).await;

        let battery_low = match (&robot, snapshot.battery()) {
            (Some(robot), Some(battery)) => Some(is_battery_low(robot, battery)),
            _ => None,
        };

        Some(RobotOverview {
            robot_id: robot_id.to_string(),
            name: robot.as_ref().map(RobotInfo::display_name),
            state,
            status: feed.status(),
            error: feed.last_error(),
            data_age_ms: snapshot.age_ms(self.context.clock.now_ms()),
            battery_low,
            snapshot,
        })
    }

    /// Cached robot metadata, fetched from the backend on first use.
    /// A failed lookup is not retried until `METADATA_RETRY` has passed.
    async fn robot_info(&self, robot_id: &str) -> Option<RobotInfo> {
        match self.robot_info.read().await.get(robot_id) {
            Some(Metadata::Known(robot)) => return Some(robot.clone()),
            Some(Metadata::Missing { retry_at }) if Instant::now() < *retry_at => return None,
            _ => {}
        }

        let entry = match self.directory.get_robot(robot_id).await {
            Ok(robot) => Metadata::Known(robot),
            Err(e) => {
                tracing::warn!(robot_id = %robot_id, error = %e, "Failed to fetch robot metadata");
                Metadata::Missing {
                    retry_at: Instant::now() + METADATA_RETRY,
                }
            }
        };

        let robot = match &entry {
            Metadata::Known(robot) => Some(robot.clone()),
            Metadata::Missing { .. } => None,
        };
        self.robot_info
            .write()
            .await
            .insert(robot_id.to_string(), entry);
        robot
    }
}
