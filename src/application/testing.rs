// In-memory event stream used by supervisor and fleet tests
use crate::application::event_stream::{EventStream, EventStreamConnector, TransportError};
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::{Mutex, mpsc};

pub type FrameSender = mpsc::UnboundedSender<Result<Bytes, TransportError>>;

pub struct FakeStream {
    frames: mpsc::UnboundedReceiver<Result<Bytes, TransportError>>,
}

#[async_trait]
impl EventStream for FakeStream {
    async fn next_frame(&mut self) -> Option<Result<Bytes, TransportError>> {
        self.frames.recv().await
    }

    async fn close(&mut self) {
        self.frames.close();
    }
}

/// Each accepted connection hands its frame sender to the test through `accepted`.
/// Dropping that sender closes the stream cleanly.
pub struct FakeConnector {
    accepted_tx: mpsc::UnboundedSender<FrameSender>,
    accepted_rx: Mutex<mpsc::UnboundedReceiver<FrameSender>>,
    refuse: AtomicBool,
    hold: AtomicBool,
    attempts: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Self {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        Self {
            accepted_tx,
            accepted_rx: Mutex::new(accepted_rx),
            refuse: AtomicBool::new(false),
            hold: AtomicBool::new(false),
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Leave connection attempts pending forever
    pub fn hold_connections(&self, hold: bool) {
        self.hold.store(hold, Ordering::SeqCst);
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Wait for the next accepted connection
    pub async fn accept(&self) -> FrameSender {
        self.accepted_rx
            .lock()
            .await
            .recv()
            .await
            .expect("connector dropped")
    }

    pub async fn try_accept(&self) -> Option<FrameSender> {
        self.accepted_rx.lock().await.try_recv().ok()
    }
}

#[async_trait]
impl EventStreamConnector for FakeConnector {
    async fn connect(&self, robot_id: &str) -> Result<Box<dyn EventStream>, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.hold.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if self.refuse.load(Ordering::SeqCst) {
            return Err(TransportError::Connect {
                url: format!("fake://{robot_id}"),
                reason: "connection refused".to_string(),
            });
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = self.accepted_tx.send(tx);
        Ok(Box::new(FakeStream { frames: rx }))
    }
}

pub fn frame(json: serde_json::Value) -> Result<Bytes, TransportError> {
    Ok(Bytes::from(json.to_string()))
}
