//! WebSocket front end for a [`RelayService`]
//!
//! Each connection gets a reader loop and a writer task. Requests are served
//! concurrently and answered with the id of the [`Frame`] they arrived in, so
//! responses may go out in a different order than the requests came in.

use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::{accept_async, tungstenite::Message};
use tracing::{debug, error, info, warn};

use super::{Frame, RelayMessage, RelayService};

/// Accept connections until the listener fails
pub async fn serve(listener: TcpListener, service: Arc<RelayService>) {
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(serve_connection(stream, addr, service.clone()));
            }
            Err(e) => {
                error!("Accept failed: {}", e);
                break;
            }
        }
    }
}

fn encode(frame: &Frame) -> Option<Message> {
    match serde_json::to_string(frame) {
        Ok(json) => Some(Message::Text(json)),
        Err(e) => {
            error!("Failed to encode {} for request {}: {}", frame.message.name(), frame.id, e);
            None
        }
    }
}

/// Handle a single WebSocket connection
pub async fn serve_connection(stream: TcpStream, addr: SocketAddr, service: Arc<RelayService>) {
    info!("New connection from: {}", addr);

    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };

    let (mut write, mut read) = ws_stream.split();
    let (tx, mut rx) = mpsc::channel::<Message>(100);

    let writer = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if write.send(msg).await.is_err() {
                warn!("Client {} went away before a response was sent", addr);
                break;
            }
        }
    });

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => match serde_json::from_str::<Frame>(&text) {
                Ok(Frame { id, message }) => {
                    let service = service.clone();
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        let response = Frame::new(id, service.handle(message).await);
                        if let Some(out) = encode(&response) {
                            let _ = tx.send(out).await;
                        }
                    });
                }
                Err(e) => {
                    warn!("Invalid message from {}: {}", addr, e);
                    let response = Frame::new(
                        Frame::salvage_id(&text),
                        RelayMessage::invalid(format!("malformed message: {}", e)),
                    );
                    if let Some(out) = encode(&response) {
                        let _ = tx.send(out).await;
                    }
                }
            },

            Ok(Message::Ping(data)) => {
                let _ = tx.send(Message::Pong(data)).await;
            }

            Ok(Message::Close(_)) => break,

            Err(e) => {
                error!("WebSocket error from {}: {}", addr, e);
                break;
            }

            _ => {}
        }
    }

    // In-flight handlers keep their senders; the writer drains what they produce
    drop(tx);
    if writer.await.is_err() {
        debug!("Writer for {} panicked", addr);
    }
    info!("Client {} disconnected", addr);
}
