// Time source for telemetry timestamps (epoch milliseconds)
use tokio::time::Instant;

pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

/// Wall-clock anchored once, then advanced by the monotonic tokio clock.
/// Timestamps never jump backwards and follow tokio's paused time in tests.
#[derive(Debug, Clone)]
pub struct SystemClock {
    anchor_wall_ms: i64,
    anchor: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            anchor_wall_ms: chrono::Utc::now().timestamp_millis(),
            anchor: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        self.anchor_wall_ms + self.anchor.elapsed().as_millis() as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test(start_paused = true)]
    async fn test_follows_tokio_time() {
        let clock = SystemClock::new();
        let start = clock.now_ms();

        tokio::time::advance(Duration::from_millis(1_500)).await;

        assert_eq!(clock.now_ms() - start, 1_500);
    }
}
