//! Persistent connections
//!
//! WebSocket and IPC clients share one driver: messages read from the
//! connection are dispatched concurrently, and everything written back
//! (replies and subscription pushes) goes through a bounded outbound queue
//! drained by a dedicated writer task.

use std::fmt::Display;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::handler::RpcHandler;

/// Handle to one connection's outbound queue
#[derive(Debug, Clone)]
pub struct Session {
    id: u64,
    outbound: mpsc::Sender<String>,
}

impl Session {
    /// Wrap an outbound queue
    pub fn new(id: u64, outbound: mpsc::Sender<String>) -> Self {
        Self { id, outbound }
    }

    /// Connection id
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Queue a reply, waiting for room; `false` once the connection is gone
    pub async fn reply(&self, message: String) -> bool {
        self.outbound.send(message).await.is_ok()
    }

    /// Queue a notification without waiting
    pub fn push(&self, message: String) -> Result<(), TrySendError<String>> {
        self.outbound.try_send(message)
    }

    /// Whether the writer side has gone away
    pub fn is_closed(&self) -> bool {
        self.outbound.is_closed()
    }
}

/// Drive one connection until its incoming stream ends
///
/// On return every subscription the connection owned has been removed and
/// the writer has been stopped, so nothing more is written to it.
pub async fn serve_connection<S, W>(handler: RpcHandler, incoming: S, outgoing: W, queue_size: usize)
where
    S: Stream<Item = String> + Send,
    W: Sink<String> + Send + 'static,
    W::Error: Display,
{
    let subscriptions = handler.context().subscriptions.clone();
    let id = subscriptions.next_connection_id();
    let (tx, mut rx) = mpsc::channel::<String>(queue_size.max(1));
    let session = Session::new(id, tx);

    let writer = tokio::spawn(async move {
        futures::pin_mut!(outgoing);
        while let Some(message) = rx.recv().await {
            if let Err(e) = outgoing.send(message).await {
                tracing::debug!(session = id, error = %e, "write failed");
                break;
            }
        }
    });
    tracing::debug!(session = id, "connection opened");

    futures::pin_mut!(incoming);
    while let Some(text) = incoming.next().await {
        let handler = handler.clone();
        let session = session.clone();
        tokio::spawn(async move {
            let reply = match handler.handle_body(text.as_bytes(), Some(session.clone())).await {
                Ok(reply) | Err(reply) => reply,
            };
            session.reply(reply.to_string()).await;
        });
    }

    let removed = subscriptions.remove_connection(id);
    writer.abort();
    tracing::debug!(session = id, subscriptions = removed, "connection closed");
}
