// Connection supervisor - owns one robot's event-stream lifecycle and reconnects
use crate::application::event_stream::{EventStream, EventStreamConnector, TransportError};
use crate::application::fallback_cache::DurableFallbackCache;
use crate::application::robot_feed::RobotFeed;
use crate::application::staleness_sweeper::{
    DEFAULT_STALE_TIMEOUT, DEFAULT_SWEEP_INTERVAL, StalenessSweeper,
};
use crate::application::stream_reconciler::StreamReconciler;
use crate::domain::clock::Clock;
use crate::domain::snapshot::ConnectionState;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(5_000);

#[derive(Debug, Clone, Copy)]
pub struct SupervisorSettings {
    /// Fixed delay between a disconnect and the next attempt
    pub reconnect_delay: Duration,
    pub sweep_interval: Duration,
    pub stale_timeout: Duration,
}

impl Default for SupervisorSettings {
    fn default() -> Self {
        Self {
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
            stale_timeout: DEFAULT_STALE_TIMEOUT,
        }
    }
}

/// Collaborators shared by every supervisor in the process
#[derive(Clone)]
pub struct SupervisorContext {
    pub connector: Arc<dyn EventStreamConnector>,
    pub fallback: DurableFallbackCache,
    pub clock: Arc<dyn Clock>,
    pub settings: SupervisorSettings,
}

enum SessionEnd {
    Shutdown,
    Closed,
    Failed(TransportError),
}

/// Running supervisor for one robot. Stops on `stop()` or when dropped.
pub struct ConnectionSupervisor {
    shutdown: watch::Sender<bool>,
    task: Option<JoinHandle<()>>,
}

impl ConnectionSupervisor {
    pub fn start(feed: Arc<RobotFeed>, context: SupervisorContext) -> Self {
        feed.set_state(ConnectionState::Connecting);

        let (shutdown, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(supervise(feed, context, shutdown_rx));

        Self {
            shutdown,
            task: Some(task),
        }
    }

    /// Manual close: cancels any pending reconnect, closes the stream and
    /// waits until the feed has settled in `Idle`
    pub async fn stop(mut self) {
        let _ = self.shutdown.send(true);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                tracing::error!(error = %e, "Connection supervisor task failed");
            }
        }
    }
}

impl Drop for ConnectionSupervisor {
    fn drop(&mut self) {
        let _ = self.shutdown.send(true);
    }
}

/// Resolves once shutdown was requested or the supervisor handle is gone
async fn shutdown_requested(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|stop| *stop).await;
}

async fn supervise(
    feed: Arc<RobotFeed>,
    context: SupervisorContext,
    mut shutdown: watch::Receiver<bool>,
) {
    let robot_id = feed.robot_id().to_string();
    let reconciler = StreamReconciler::new(robot_id.clone());
    let sweeper = StalenessSweeper::new(context.settings.stale_timeout);
    let mut attempt: u64 = 0;

    loop {
        attempt += 1;
        feed.set_state(ConnectionState::Connecting);
        tracing::debug!(robot_id = %robot_id, attempt, "Opening event stream");

        let connected = tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            result = context.connector.connect(&robot_id) => result,
        };

        match connected {
            Ok(mut stream) => {
                feed.set_error(None);
                feed.set_state(ConnectionState::Connected);
                tracing::info!(robot_id = %robot_id, attempt, "Event stream connected");

                let end = run_session(
                    &feed,
                    &context,
                    &reconciler,
                    &sweeper,
                    stream.as_mut(),
                    &mut shutdown,
                )
                .await;

                match end {
                    SessionEnd::Shutdown => {
                        stream.close().await;
                        break;
                    }
                    SessionEnd::Closed => {
                        tracing::info!(robot_id = %robot_id, "Event stream closed by peer");
                    }
                    SessionEnd::Failed(e) => {
                        tracing::warn!(robot_id = %robot_id, error = %e, "Event stream failed");
                        feed.set_error(Some(e.to_string()));
                        feed.set_state(ConnectionState::Erroring);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(robot_id = %robot_id, attempt, error = %e, "Event stream connection failed");
                feed.set_error(Some(e.to_string()));
                feed.set_state(ConnectionState::Erroring);
            }
        }

        feed.set_state(ConnectionState::Disconnected);
        tracing::info!(
            robot_id = %robot_id,
            delay_ms = context.settings.reconnect_delay.as_millis() as u64,
            "Reconnecting after delay"
        );

        tokio::select! {
            _ = shutdown_requested(&mut shutdown) => break,
            _ = tokio::time::sleep(context.settings.reconnect_delay) => {}
        }
    }

    feed.set_error(None);
    feed.set_state(ConnectionState::Idle);
    tracing::info!(robot_id = %robot_id, "Connection supervisor stopped");
}

/// Connected phase. The sweep timer only exists here, so no sweeping happens
/// while disconnected.
async fn run_session(
    feed: &RobotFeed,
    context: &SupervisorContext,
    reconciler: &StreamReconciler,
    sweeper: &StalenessSweeper,
    stream: &mut dyn EventStream,
    shutdown: &mut watch::Receiver<bool>,
) -> SessionEnd {
    let period = context.settings.sweep_interval;
    let mut sweep = tokio::time::interval_at(Instant::now() + period, period);
    sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown_requested(shutdown) => return SessionEnd::Shutdown,
            frame = stream.next_frame() => match frame {
                Some(Ok(payload)) => {
                    let now = context.clock.now_ms();
                    let updated = feed.update(|cache| reconciler.on_message(cache, &payload, now));
                    if let Some(channel) = updated {
                        let snapshot = feed.snapshot();
                        context.fallback.save(feed.robot_id(), &snapshot, now).await;
                        feed.notify_changed(vec![channel]);
                    }
                }
                Some(Err(e)) => return SessionEnd::Failed(e),
                None => return SessionEnd::Closed,
            },
            _ = sweep.tick() => {
                let now = context.clock.now_ms();
                let cleared = feed.update(|cache| sweeper.sweep(cache, now));
                if !cleared.is_empty() {
                    tracing::debug!(robot_id = %feed.robot_id(), ?cleared, "Evicted stale channels");
                    feed.notify_changed(cleared);
                }
            }
        }
    }
}
