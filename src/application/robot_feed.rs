// Robot feed - per-robot telemetry cache, connection state and change notifications
use crate::application::telemetry_cache::TelemetryCache;
use crate::domain::channel::Channel;
use crate::domain::snapshot::{ConnectionState, TelemetrySnapshot};
use serde::Serialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::{broadcast, watch};

const NOTICE_CAPACITY: usize = 64;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelemetryNotice {
    SnapshotChanged { channels: Vec<Channel> },
    ConnectionChanged { state: ConnectionState },
    /// Set on a failed connect or transport error, cleared once a connection opens
    ErrorChanged { error: Option<String> },
}

/// Shared between the supervisor that writes it and the readers that render it.
/// Never shared across robots.
pub struct RobotFeed {
    robot_id: String,
    cache: Mutex<TelemetryCache>,
    state: watch::Sender<ConnectionState>,
    last_error: watch::Sender<Option<String>>,
    notices: broadcast::Sender<TelemetryNotice>,
}

impl RobotFeed {
    pub fn new(robot_id: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Idle);
        let (last_error, _) = watch::channel(None);
        let (notices, _) = broadcast::channel(NOTICE_CAPACITY);
        Self {
            robot_id: robot_id.into(),
            cache: Mutex::new(TelemetryCache::new()),
            state,
            last_error,
            notices,
        }
    }

    pub fn robot_id(&self) -> &str {
        &self.robot_id
    }

    pub fn snapshot(&self) -> TelemetrySnapshot {
        self.cache().snapshot()
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn last_error(&self) -> Option<String> {
        self.last_error.borrow().clone()
    }

    /// Presentation text, "Connection Error" while a failure is unresolved
    pub fn status(&self) -> &'static str {
        let has_error = self.last_error.borrow().is_some();
        self.connection_state().status(has_error)
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TelemetryNotice> {
        self.notices.subscribe()
    }

    /// Replace the cache contents with a previously persisted snapshot
    pub fn seed(&self, snapshot: &TelemetrySnapshot) {
        self.cache().seed(snapshot);
        let channels = snapshot.entries().map(|(channel, _)| channel).collect();
        self.notify_changed(channels);
    }

    /// Run `f` with exclusive access to the cache. Does not notify.
    pub fn update<R>(&self, f: impl FnOnce(&mut TelemetryCache) -> R) -> R {
        f(&mut *self.cache())
    }

    pub fn notify_changed(&self, channels: Vec<Channel>) {
        if channels.is_empty() {
            return;
        }
        let _ = self.notices.send(TelemetryNotice::SnapshotChanged { channels });
    }

    /// Returns true and notifies subscribers only if the state actually changed
    pub fn set_state(&self, next: ConnectionState) -> bool {
        let changed = self.state.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });

        if changed {
            tracing::debug!(robot_id = %self.robot_id, state = ?next, "Connection state changed");
            let _ = self.notices.send(TelemetryNotice::ConnectionChanged { state: next });
        }
        changed
    }

    /// Returns true and notifies subscribers only if the flag actually changed
    pub fn set_error(&self, error: Option<String>) -> bool {
        let changed = self.last_error.send_if_modified(|current| {
            if *current == error {
                false
            } else {
                *current = error.clone();
                true
            }
        });

        if changed {
            let _ = self.notices.send(TelemetryNotice::ErrorChanged { error });
        }
        changed
    }

    fn cache(&self) -> MutexGuard<'_, TelemetryCache> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
