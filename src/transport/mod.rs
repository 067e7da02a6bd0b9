//! Client-side transport to the relay
//!
//! The anchor client never talks to the ledger. It sends [`RelayMessage`]
//! requests through a [`Relay`] and gets one response back per request.
//!
//! - `local`: in-process relay (tests, single-binary deployments)
//! - `websocket`: JSON over WebSocket to an `inkless-relay` server
//!
//! # Design
//!
//! A transport only moves messages. Interpreting the response (including
//! rebuilding typed errors from `RelayMessage::Error`) is the anchor
//! client's job.

use async_trait::async_trait;
use thiserror::Error;

use crate::relay::RelayMessage;

pub mod local;
pub mod websocket;

pub use local::LocalRelay;
pub use websocket::WebSocketRelay;

/// Failures moving a message to or from the relay
#[derive(Error, Debug, Clone)]
pub enum TransportError {
    /// The relay could not be reached
    #[error("Could not reach relay: {0}")]
    ConnectionFailed(String),

    /// The relay closed the connection
    #[error("Relay closed the connection")]
    Disconnected,

    /// The request could not be written
    #[error("Failed to send request: {0}")]
    SendFailed(String),

    /// The response could not be read
    #[error("Failed to read response: {0}")]
    ReceiveFailed(String),

    /// No response within the request timeout
    #[error("Relay did not answer in time")]
    Timeout,

    /// The response was not a valid protocol message
    #[error("Malformed response: {0}")]
    InvalidData(String),
}

/// Result alias for the transport layer
pub type TransportResult<T> = Result<T, TransportError>;

/// A request/response channel to the relay
#[async_trait]
pub trait Relay: Send + Sync {
    /// Send one request and wait for its response
    async fn call(&self, request: RelayMessage) -> TransportResult<RelayMessage>;
}

#[async_trait]
impl<R: Relay + ?Sized> Relay for std::sync::Arc<R> {
    async fn call(&self, request: RelayMessage) -> TransportResult<RelayMessage> {
        (**self).call(request).await
    }
}
