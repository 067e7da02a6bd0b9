//! In-process relay transport
//!
//! Requests go through a channel to a worker task that owns a handle to the
//! [`RelayService`], the same way a WebSocket connection task would. Every
//! message is encoded to JSON and back so the wire format is exercised even
//! without a socket.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::{Relay, TransportError, TransportResult};
use crate::relay::{RelayMessage, RelayService};

type Envelope = (String, oneshot::Sender<String>);

/// Relay endpoint served by an in-process worker task
#[derive(Clone)]
pub struct LocalRelay {
    tx: mpsc::Sender<Envelope>,
}

impl LocalRelay {
    /// Spawn a worker serving `service`
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(service: Arc<RelayService>) -> Self {
        let (tx, mut rx) = mpsc::channel::<Envelope>(100);

        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let response = match serde_json::from_str::<RelayMessage>(&request) {
                    Ok(msg) => service.handle(msg).await,
                    Err(e) => RelayMessage::invalid(e.to_string()),
                };
                match serde_json::to_string(&response) {
                    Ok(json) => {
                        let _ = reply.send(json);
                    }
                    Err(e) => debug!(error = %e, "failed to encode relay response"),
                }
            }
        });

        LocalRelay { tx }
    }
}

#[async_trait]
impl Relay for LocalRelay {
    async fn call(&self, request: RelayMessage) -> TransportResult<RelayMessage> {
        let json = serde_json::to_string(&request)
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((json, reply_tx))
            .await
            .map_err(|_| TransportError::SendFailed("Channel closed".to_string()))?;

        let response = reply_rx.await.map_err(|_| TransportError::Disconnected)?;
        serde_json::from_str(&response).map_err(|e| TransportError::InvalidData(e.to_string()))
    }
}
