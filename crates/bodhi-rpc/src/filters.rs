//! Poll-based filters
//!
//! Each filter keeps a cursor (the next block it has not reported) behind its
//! own async mutex, so a poll of one filter never waits on another and two
//! concurrent polls of the same filter cannot double-deliver.

use std::sync::{Arc, Weak};
use std::time::Duration;

use bodhi_primitives::{Address, H256};
use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::block_tag::{parse_block_tag, resolve_number, BlockTag, PendingPolicy};
use crate::error::JsonRpcError;
use crate::provider::{Log, LogQuery, Provider};
use crate::types::{logs_to_value, LogFilterRequest};

/// Random 128-bit identifier rendered as `0x` hex
pub(crate) fn new_id() -> String {
    format!("0x{:032x}", rand::random::<u128>())
}

/// Block range of a log filter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterRange {
    /// `fromBlock`/`toBlock`, resolved on every use
    Tags {
        /// Start
        from: BlockTag,
        /// End
        to: BlockTag,
    },
    /// A single block
    Hash(H256),
}

/// Validated log filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Block range
    pub range: FilterRange,
    /// Emitting addresses; empty matches any
    pub addresses: Vec<Address>,
    /// Positional topic sets
    pub topics: Vec<Option<Vec<H256>>>,
}

impl LogFilter {
    /// Parse and validate a client filter object
    pub fn from_value(value: &Value) -> Result<Self, JsonRpcError> {
        let request: LogFilterRequest = serde_json::from_value(value.clone())
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid filter: {}", e)))?;
        Self::from_request(request)
    }

    /// Validate a deserialized filter object
    pub fn from_request(request: LogFilterRequest) -> Result<Self, JsonRpcError> {
        let range = match request.block_hash {
            Some(_) if request.from_block.is_some() || request.to_block.is_some() => {
                return Err(JsonRpcError::invalid_params(
                    "cannot specify both blockHash and fromBlock/toBlock",
                ))
            }
            Some(hash) => FilterRange::Hash(hash),
            None => {
                let tag = |v: Option<Value>| -> Result<BlockTag, JsonRpcError> {
                    let tag = v.as_ref().map(parse_block_tag).transpose()?.unwrap_or_default();
                    match tag {
                        BlockTag::Pending => {
                            Err(JsonRpcError::invalid_params("pending tag is not supported"))
                        }
                        tag => Ok(tag),
                    }
                };
                FilterRange::Tags {
                    from: tag(request.from_block)?,
                    to: tag(request.to_block)?,
                }
            }
        };

        Ok(Self {
            range,
            addresses: request.address.map(|a| a.into_vec()).unwrap_or_default(),
            topics: request
                .topics
                .unwrap_or_default()
                .into_iter()
                .map(|t| t.map(|t| t.into_vec()))
                .collect(),
        })
    }

    /// Query over an explicit range with this filter's predicates
    pub fn query(&self, from_block: u64, to_block: u64) -> LogQuery {
        LogQuery {
            from_block,
            to_block,
            addresses: self.addresses.clone(),
            topics: self.topics.clone(),
        }
    }

    /// Blocks a poll covers given the first unreported block and the best
    /// block, plus the cursor to store afterwards.
    ///
    /// Moving tags (`latest`, `safe`, `finalized`, `earliest`) as `fromBlock`
    /// start at the cursor; explicit numbers only clamp it. A finalized
    /// `toBlock` holds the cursor back until finality catches up.
    async fn poll_window(
        &self,
        provider: &dyn Provider,
        cursor: u64,
        best: u64,
    ) -> Result<(u64, u64, u64), JsonRpcError> {
        match self.range {
            FilterRange::Hash(hash) => {
                let number = provider
                    .block_number_of(&hash)
                    .await?
                    .ok_or_else(JsonRpcError::header_not_found)?;
                Ok((number.max(cursor), number.min(best), best + 1))
            }
            FilterRange::Tags { from, to } => {
                let from = match from {
                    BlockTag::Number(number) => number.max(cursor),
                    BlockTag::Hash(_) => {
                        resolve_number(provider, from, PendingPolicy::Reject).await?.max(cursor)
                    }
                    _ => cursor,
                };
                let (to, next) = match to {
                    BlockTag::Safe | BlockTag::Finalized => {
                        let finalized = provider.finalized_number().await?.min(best);
                        (finalized, finalized + 1)
                    }
                    _ => {
                        let to = resolve_number(provider, to, PendingPolicy::Reject).await?;
                        (to.min(best), best + 1)
                    }
                };
                Ok((from, to, next))
            }
        }
    }

    /// Resolve the full range against the provider
    pub async fn resolve(&self, provider: &dyn Provider) -> Result<LogQuery, JsonRpcError> {
        match self.range {
            FilterRange::Hash(hash) => {
                let number = provider
                    .block_number_of(&hash)
                    .await?
                    .ok_or_else(JsonRpcError::header_not_found)?;
                Ok(self.query(number, number))
            }
            FilterRange::Tags { from, to } => {
                let from = resolve_number(provider, from, PendingPolicy::Reject).await?;
                let to = resolve_number(provider, to, PendingPolicy::Reject).await?;
                Ok(self.query(from, to))
            }
        }
    }
}

/// Filter limits
#[derive(Debug, Clone)]
pub struct FilterConfig {
    /// Maximum installed filters
    pub max_filters: usize,
    /// Filters not polled for this long are removed
    pub filter_timeout: Duration,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            max_filters: 500,
            filter_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// What a filter accumulates
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterKind {
    /// New block hashes
    Block,
    /// Matching logs
    Log(LogFilter),
}

/// Result of a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterChanges {
    /// Block hashes
    Hashes(Vec<H256>),
    /// Logs
    Logs(Vec<Log>),
}

impl FilterChanges {
    /// Wire form
    pub fn to_value(&self) -> Result<Value, JsonRpcError> {
        match self {
            FilterChanges::Hashes(hashes) => Ok(Value::Array(
                hashes.iter().map(|h| Value::String(h.to_hex())).collect(),
            )),
            FilterChanges::Logs(logs) => logs_to_value(logs),
        }
    }

    fn empty(kind: &FilterKind) -> Self {
        match kind {
            FilterKind::Block => FilterChanges::Hashes(Vec::new()),
            FilterKind::Log(_) => FilterChanges::Logs(Vec::new()),
        }
    }

    /// Number of items
    pub fn len(&self) -> usize {
        match self {
            FilterChanges::Hashes(h) => h.len(),
            FilterChanges::Logs(l) => l.len(),
        }
    }

    /// Whether nothing changed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

struct FilterState {
    kind: FilterKind,
    cursor: u64,
}

struct FilterEntry {
    state: Mutex<FilterState>,
    last_poll: parking_lot::Mutex<Instant>,
}

impl FilterEntry {
    fn touch(&self) {
        *self.last_poll.lock() = Instant::now();
    }
}

/// Store of installed filters, one lock per entry
pub struct FilterManager {
    config: FilterConfig,
    filters: DashMap<String, Arc<FilterEntry>>,
}

impl FilterManager {
    /// Create an empty store
    pub fn new(config: FilterConfig) -> Self {
        Self {
            config,
            filters: DashMap::new(),
        }
    }

    /// Install a filter; reporting starts after the current best block
    pub async fn install(
        &self,
        kind: FilterKind,
        provider: &dyn Provider,
    ) -> Result<String, JsonRpcError> {
        if self.filters.len() >= self.config.max_filters {
            return Err(JsonRpcError::app_error("filter limit reached"));
        }
        let best = provider.block_number().await?;
        let id = new_id();
        self.filters.insert(
            id.clone(),
            Arc::new(FilterEntry {
                state: Mutex::new(FilterState {
                    kind,
                    cursor: best + 1,
                }),
                last_poll: parking_lot::Mutex::new(Instant::now()),
            }),
        );
        tracing::debug!(filter = %id, "installed filter");
        Ok(id)
    }

    fn entry(&self, id: &str) -> Result<Arc<FilterEntry>, JsonRpcError> {
        self.filters
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or_else(JsonRpcError::filter_not_found)
    }

    /// Drain everything since the last poll
    pub async fn changes(
        &self,
        id: &str,
        provider: &dyn Provider,
    ) -> Result<FilterChanges, JsonRpcError> {
        let entry = self.entry(id)?;
        entry.touch();
        let mut state = entry.state.lock().await;

        let best = provider.block_number().await?;
        if best < state.cursor {
            return Ok(FilterChanges::empty(&state.kind));
        }

        let cursor = state.cursor;
        let (changes, next) = match &state.kind {
            FilterKind::Block => {
                let mut hashes = Vec::with_capacity((best + 1 - cursor) as usize);
                for number in cursor..=best {
                    if let Some(hash) = provider.block_hash(number).await? {
                        hashes.push(hash);
                    }
                }
                (FilterChanges::Hashes(hashes), best + 1)
            }
            FilterKind::Log(filter) => {
                let (from, to, next) = filter.poll_window(provider, cursor, best).await?;
                let logs = if from > to {
                    Vec::new()
                } else {
                    provider.logs(&filter.query(from, to)).await?
                };
                (FilterChanges::Logs(logs), next)
            }
        };
        state.cursor = next.max(cursor);
        Ok(changes)
    }

    /// Every log in the filter's full range; does not move the cursor
    pub async fn logs(&self, id: &str, provider: &dyn Provider) -> Result<Vec<Log>, JsonRpcError> {
        let entry = self.entry(id)?;
        entry.touch();
        let filter = match &entry.state.lock().await.kind {
            FilterKind::Log(filter) => filter.clone(),
            FilterKind::Block => return Err(JsonRpcError::filter_not_found()),
        };
        let query = filter.resolve(provider).await?;
        Ok(provider.logs(&query).await?)
    }

    /// Remove a filter; `false` if it was not installed
    pub fn uninstall(&self, id: &str) -> bool {
        let removed = self.filters.remove(id).is_some();
        if removed {
            tracing::debug!(filter = %id, "uninstalled filter");
        }
        removed
    }

    /// Installed filter count
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Whether no filter is installed
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Drop filters idle longer than the timeout, returning how many went
    pub fn sweep(&self) -> usize {
        let timeout = self.config.filter_timeout;
        let before = self.filters.len();
        self.filters
            .retain(|_, entry| entry.last_poll.lock().elapsed() <= timeout);
        before.saturating_sub(self.filters.len())
    }

    /// Run [`FilterManager::sweep`] periodically until the store is dropped
    pub fn spawn_sweeper(self: &Arc<Self>) -> JoinHandle<()> {
        let period = self
            .config
            .filter_timeout
            .min(Duration::from_secs(30))
            .max(Duration::from_millis(10));
        let manager: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let Some(manager) = manager.upgrade() else {
                    break;
                };
                let expired = manager.sweep();
                if expired > 0 {
                    tracing::debug!(expired, "expired idle filters");
                }
            }
        })
    }
}
