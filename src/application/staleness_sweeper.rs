// Staleness sweeper - evicts channels that stopped receiving updates
use crate::application::telemetry_cache::TelemetryCache;
use crate::domain::channel::Channel;
use std::time::Duration;

pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_STALE_TIMEOUT: Duration = Duration::from_millis(2_000);

#[derive(Debug, Clone, Copy)]
pub struct StalenessSweeper {
    timeout_ms: i64,
}

impl StalenessSweeper {
    /// One timeout shared by every channel
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout_ms: timeout.as_millis() as i64,
        }
    }

    /// Clear every channel older than the timeout. A channel exactly at the
    /// timeout is kept. Returns the cleared channels.
    pub fn sweep(&self, cache: &mut TelemetryCache, now_ms: i64) -> Vec<Channel> {
        let stale: Vec<Channel> = cache
            .channels_with_values()
            .into_iter()
            .filter(|(_, updated_at)| now_ms - updated_at > self.timeout_ms)
            .map(|(channel, _)| channel)
            .collect();

        for channel in &stale {
            cache.clear(*channel);
        }

        stale
    }
}

impl Default for StalenessSweeper {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_TIMEOUT)
    }
}
