//! WebSocket transport to an `inkless-relay` server

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::debug;

use super::{Relay, TransportError, TransportResult};
use crate::relay::{Frame, RelayMessage};

type Socket = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket connection to a relay server
///
/// Calls on one connection are serialized. Every request carries a fresh
/// id; responses with any other id belong to abandoned calls and are
/// skipped, so a timed-out or cancelled call does not poison the next one.
pub struct WebSocketRelay {
    ws: Mutex<Socket>,
    next_id: AtomicU64,
}

impl WebSocketRelay {
    /// Connect to a relay server
    pub async fn connect(relay_url: &str) -> TransportResult<Self> {
        let (ws, _) = connect_async(relay_url)
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        Ok(WebSocketRelay {
            ws: Mutex::new(ws),
            next_id: AtomicU64::new(1),
        })
    }

    /// Close the connection
    pub async fn close(&self) -> TransportResult<()> {
        self.ws
            .lock()
            .await
            .close(None)
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn send_frame(ws: &mut Socket, frame: &Frame) -> TransportResult<()> {
        let json = serde_json::to_string(frame).map_err(|e| TransportError::SendFailed(e.to_string()))?;

        ws.send(Message::Text(json))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))
    }

    async fn receive_frame(ws: &mut Socket) -> TransportResult<Frame> {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str(&text)
                        .map_err(|e| TransportError::InvalidData(e.to_string()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::Disconnected);
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = ws.send(Message::Pong(data)).await;
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
                _ => continue,
            }
        }
    }
}

#[async_trait]
impl Relay for WebSocketRelay {
    async fn call(&self, request: RelayMessage) -> TransportResult<RelayMessage> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let mut ws = self.ws.lock().await;
        Self::send_frame(&mut ws, &Frame::new(id, request)).await?;
        loop {
            let frame = Self::receive_frame(&mut ws).await?;
            if frame.id == id {
                return Ok(frame.message);
            }
            debug!(id = frame.id, expected = id, "dropping response to an abandoned request");
        }
    }
}
