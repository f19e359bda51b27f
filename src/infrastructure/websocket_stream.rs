// WebSocket event-stream connector
use crate::application::event_stream::{EventStream, EventStreamConnector, TransportError};
use crate::infrastructure::config::robot_stream_url;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    ws_base: String,
}

impl WebSocketConnector {
    pub fn new(ws_base: impl Into<String>) -> Self {
        Self {
            ws_base: ws_base.into(),
        }
    }
}

#[async_trait]
impl EventStreamConnector for WebSocketConnector {
    async fn connect(&self, robot_id: &str) -> Result<Box<dyn EventStream>, TransportError> {
        let url = robot_stream_url(&self.ws_base, robot_id);
        tracing::debug!(url = %url, "Connecting WebSocket");

        let (socket, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Connect {
                url: url.clone(),
                reason: e.to_string(),
            })?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");
        Ok(Box::new(WebSocketEventStream { socket }))
    }
}

pub struct WebSocketEventStream {
    socket: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventStream for WebSocketEventStream {
    async fn next_frame(&mut self) -> Option<Result<Bytes, TransportError>> {
        loop {
            let message = match self.socket.next().await? {
                Ok(message) => message,
                Err(e) => return Some(Err(TransportError::Protocol(e.to_string()))),
            };

            match message {
                Message::Text(text) => return Some(Ok(Bytes::from(text))),
                Message::Binary(data) => return Some(Ok(Bytes::from(data))),
                Message::Close(frame) => {
                    tracing::debug!(?frame, "WebSocket closed by peer");
                    return None;
                }
                // Ping replies are queued by tungstenite itself
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.socket.close(None).await {
            tracing::debug!(error = %e, "WebSocket close failed");
        }
        // Drain until the peer acknowledges the close
        let drain = async { while let Some(Ok(_)) = self.socket.next().await {} };
        let _ = tokio::time::timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await;
    }
}
