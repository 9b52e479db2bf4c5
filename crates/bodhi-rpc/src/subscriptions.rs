//! Push subscriptions (`eth_subscribe`)

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::JsonRpcError;
use crate::filters::{new_id, LogFilter};
use crate::provider::{ChainEvent, LogQuery};
use crate::session::Session;
use crate::types::{subscription_notification, to_json, RpcHeader, RpcLog};

/// What a subscription delivers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionKind {
    /// Every new block header
    NewHeads,
    /// Logs matching an address/topic predicate
    Logs(LogQuery),
}

impl SubscriptionKind {
    /// Parse `eth_subscribe` arguments
    pub fn parse(params: &[Value]) -> Result<Self, JsonRpcError> {
        match params.first().and_then(Value::as_str) {
            Some("newHeads") => Ok(SubscriptionKind::NewHeads),
            Some("logs") => {
                let query = match params.get(1) {
                    None | Some(Value::Null) => LogQuery::default(),
                    Some(value) => {
                        let filter = LogFilter::from_value(value)?;
                        filter.query(0, u64::MAX)
                    }
                };
                Ok(SubscriptionKind::Logs(query))
            }
            Some(other) => Err(JsonRpcError::invalid_params(format!(
                "unsupported subscription type: {}",
                other
            ))),
            None => Err(JsonRpcError::invalid_argument(0, "expected a subscription type")),
        }
    }
}

struct Subscription {
    kind: SubscriptionKind,
    session: Session,
}

/// Live subscriptions across all connections
#[derive(Default)]
pub struct SubscriptionManager {
    subscriptions: DashMap<String, Subscription>,
    next_connection: AtomicU64,
}

impl SubscriptionManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate a connection id
    pub fn next_connection_id(&self) -> u64 {
        self.next_connection.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Register a subscription owned by `session`
    pub fn subscribe(&self, session: &Session, kind: SubscriptionKind) -> String {
        let id = new_id();
        self.subscriptions.insert(
            id.clone(),
            Subscription {
                kind,
                session: session.clone(),
            },
        );
        tracing::debug!(subscription = %id, session = session.id(), "subscribed");
        id
    }

    /// Remove a subscription; only its owning connection may do so
    pub fn unsubscribe(&self, session: &Session, id: &str) -> bool {
        self.subscriptions
            .remove_if(id, |_, sub| sub.session.id() == session.id())
            .is_some()
    }

    /// Drop everything a connection owned
    pub fn remove_connection(&self, connection: u64) -> usize {
        let before = self.subscriptions.len();
        self.subscriptions
            .retain(|_, sub| sub.session.id() != connection);
        before.saturating_sub(self.subscriptions.len())
    }

    /// Live subscription count
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Whether nothing is subscribed
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Fan one chain event out to every matching subscription
    pub fn notify(&self, event: &ChainEvent) {
        let ChainEvent::NewBlock { block, logs } = event;
        let mut header: Option<Result<Value, JsonRpcError>> = None;
        let mut closed = Vec::new();

        for entry in self.subscriptions.iter() {
            let (id, sub) = entry.pair();
            let payloads: Vec<Result<Value, JsonRpcError>> = match &sub.kind {
                SubscriptionKind::NewHeads => vec![header
                    .get_or_insert_with(|| to_json(&RpcHeader::from(block.as_ref())))
                    .clone()],
                SubscriptionKind::Logs(query) => logs
                    .iter()
                    .filter(|log| query.matches(log))
                    .map(|log| to_json(&RpcLog::from(log)))
                    .collect(),
            };

            for payload in payloads {
                let result = match payload {
                    Ok(result) => result,
                    Err(error) => {
                        tracing::warn!(
                            subscription = %id,
                            error = %error.message,
                            "failed to serialize notification"
                        );
                        continue;
                    }
                };
                match sub.session.push(subscription_notification(id, result).to_string()) {
                    Ok(()) => {}
                    Err(TrySendError::Full(_)) => {
                        tracing::warn!(
                            subscription = %id,
                            session = sub.session.id(),
                            "outbound queue full, dropping notification"
                        );
                    }
                    Err(TrySendError::Closed(_)) => {
                        closed.push(id.clone());
                        break;
                    }
                }
            }
        }

        for id in closed {
            self.subscriptions.remove(&id);
        }
    }

    /// Forward provider events to subscribers until the provider goes away
    pub fn spawn_dispatcher(
        self: &Arc<Self>,
        mut events: broadcast::Receiver<ChainEvent>,
    ) -> JoinHandle<()> {
        let manager = Arc::clone(self);
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => manager.notify(&event),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "subscription dispatcher lagged behind chain events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}
