// Event stream traits - transport seam for per-robot telemetry connections
use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("failed to connect to {url}: {reason}")]
    Connect { url: String, reason: String },
    #[error("event stream protocol error: {0}")]
    Protocol(String),
}

/// An open event stream delivering frames in arrival order
#[async_trait]
pub trait EventStream: Send {
    /// Next frame payload. `None` means the peer closed the stream cleanly.
    async fn next_frame(&mut self) -> Option<Result<Bytes, TransportError>>;

    async fn close(&mut self);
}

#[async_trait]
pub trait EventStreamConnector: Send + Sync {
    async fn connect(&self, robot_id: &str) -> Result<Box<dyn EventStream>, TransportError>;
}
