//! Chain-data provider interface
//!
//! The gateway never owns chain state. Everything it serves comes through a
//! [`Provider`], addressed by a [`StateRef`] the block-tag resolver produced.

mod dev;

use std::sync::Arc;

use async_trait::async_trait;
use bodhi_primitives::{Address, H256, U256};
use bodhi_tx::TxEnvelope;
use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::types::CallRequest;

pub use dev::{DevConfig, DevLog, DevProvider, GenesisAccount};

/// Provider failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The chain has no such object (block, header, state)
    #[error("{0}")]
    NotFound(String),

    /// The chain refused a submission
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// Call execution reverted
    #[error("{message}")]
    Reverted {
        /// Revert reason
        message: String,
        /// Raw revert data
        data: Option<Bytes>,
    },

    /// Anything else on the provider side
    #[error("provider error: {0}")]
    Internal(String),
}

/// Result alias for provider calls
pub type ProviderResult<T> = Result<T, ProviderError>;

/// Resolved chain state a call executes against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateRef {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: H256,
    /// Project the mempool on top of this block
    pub pending: bool,
}

/// Block with its transactions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Block number
    pub number: u64,
    /// Block hash
    pub hash: H256,
    /// Parent hash
    pub parent_hash: H256,
    /// Unix timestamp in seconds
    pub timestamp: u64,
    /// Block author
    pub miner: Address,
    /// State root
    pub state_root: H256,
    /// Transactions root
    pub transactions_root: H256,
    /// Receipts root
    pub receipts_root: H256,
    /// Gas limit
    pub gas_limit: U256,
    /// Gas used
    pub gas_used: U256,
    /// Base fee, when the chain has one
    pub base_fee_per_gas: Option<U256>,
    /// Extra data
    pub extra_data: Bytes,
    /// Transactions in block order
    pub transactions: Vec<TransactionInfo>,
}

/// A mined transaction with its position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionInfo {
    /// Transaction hash
    pub hash: H256,
    /// Decoded envelope
    pub envelope: TxEnvelope,
    /// Containing block hash
    pub block_hash: Option<H256>,
    /// Containing block number
    pub block_number: Option<u64>,
    /// Index within the block
    pub transaction_index: Option<u64>,
}

/// Transaction receipt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash
    pub transaction_hash: H256,
    /// Index within the block
    pub transaction_index: u64,
    /// Block hash
    pub block_hash: H256,
    /// Block number
    pub block_number: u64,
    /// Sender
    pub from: Address,
    /// Recipient
    pub to: Option<Address>,
    /// Created contract
    pub contract_address: Option<Address>,
    /// Gas used by the block up to and including this transaction
    pub cumulative_gas_used: U256,
    /// Gas used by this transaction
    pub gas_used: U256,
    /// Price actually paid per gas
    pub effective_gas_price: U256,
    /// Execution succeeded
    pub status: bool,
    /// Emitted logs
    pub logs: Vec<Log>,
    /// Envelope type byte
    pub tx_type: u8,
}

/// An emitted log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Log {
    /// Emitting contract
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<H256>,
    /// Non-indexed data
    pub data: Bytes,
    /// Block hash
    pub block_hash: H256,
    /// Block number
    pub block_number: u64,
    /// Transaction hash
    pub transaction_hash: H256,
    /// Transaction index
    pub transaction_index: u64,
    /// Index within the block
    pub log_index: u64,
    /// Removed by a reorg
    pub removed: bool,
}

/// A resolved log query over an inclusive block range
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    /// First block
    pub from_block: u64,
    /// Last block
    pub to_block: u64,
    /// Emitting addresses; empty matches any
    pub addresses: Vec<Address>,
    /// Positional topic sets; `None` matches any
    pub topics: Vec<Option<Vec<H256>>>,
}

impl LogQuery {
    /// Address and topic match, ignoring the block range
    pub fn matches(&self, log: &Log) -> bool {
        if !self.addresses.is_empty() && !self.addresses.contains(&log.address) {
            return false;
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            None => true,
            Some(set) if set.is_empty() => true,
            Some(set) => log.topics.get(i).map_or(false, |t| set.contains(t)),
        })
    }

    /// Whether a block number lies in the range
    pub fn covers(&self, number: u64) -> bool {
        self.from_block <= number && number <= self.to_block
    }
}

/// Events pushed by the provider
#[derive(Debug, Clone)]
pub enum ChainEvent {
    /// A block was sealed, with the logs it emitted
    NewBlock {
        /// The block
        block: Arc<Block>,
        /// Logs in block order
        logs: Arc<Vec<Log>>,
    },
}

/// Chain-data provider consumed by the method bridge
#[async_trait]
pub trait Provider: Send + Sync {
    /// Chain id
    async fn chain_id(&self) -> ProviderResult<u64>;

    /// Best block number
    async fn block_number(&self) -> ProviderResult<u64>;

    /// Most recent finalized block number
    async fn finalized_number(&self) -> ProviderResult<u64>;

    /// Hash of the canonical block at `number`
    async fn block_hash(&self, number: u64) -> ProviderResult<Option<H256>>;

    /// Number of the canonical block with `hash`
    async fn block_number_of(&self, hash: &H256) -> ProviderResult<Option<u64>>;

    /// Block at a resolved state
    async fn block(&self, at: &StateRef, full: bool) -> ProviderResult<Option<Block>>;

    /// Account balance
    async fn balance(&self, address: &Address, at: &StateRef) -> ProviderResult<U256>;

    /// Account nonce; `at.pending` includes queued transactions
    async fn transaction_count(&self, address: &Address, at: &StateRef) -> ProviderResult<U256>;

    /// Contract code
    async fn code(&self, address: &Address, at: &StateRef) -> ProviderResult<Bytes>;

    /// Storage slot value
    async fn storage_at(&self, address: &Address, slot: &H256, at: &StateRef)
        -> ProviderResult<H256>;

    /// Execute a read-only call
    async fn call(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<Bytes>;

    /// Estimate gas for a call
    async fn estimate_gas(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<U256>;

    /// Current gas price
    async fn gas_price(&self) -> ProviderResult<U256>;

    /// Suggested priority fee
    async fn max_priority_fee(&self) -> ProviderResult<U256>;

    /// Submit signed wire bytes, returning the chain's transaction hash
    async fn send_raw_transaction(&self, raw: &[u8]) -> ProviderResult<H256>;

    /// Logs matching a resolved query
    async fn logs(&self, query: &LogQuery) -> ProviderResult<Vec<Log>>;

    /// Mined transaction by hash
    async fn transaction_by_hash(&self, hash: &H256) -> ProviderResult<Option<TransactionInfo>>;

    /// Receipt by transaction hash
    async fn transaction_receipt(&self, hash: &H256) -> ProviderResult<Option<Receipt>>;

    /// Stream of chain events
    fn subscribe(&self) -> broadcast::Receiver<ChainEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(address: Address, topics: Vec<H256>) -> Log {
        Log {
            address,
            topics,
            data: Bytes::new(),
            block_hash: H256::ZERO,
            block_number: 1,
            transaction_hash: H256::ZERO,
            transaction_index: 0,
            log_index: 0,
            removed: false,
        }
    }

    fn topic(b: u8) -> H256 {
        H256::from_bytes([b; 32])
    }

    #[test]
    fn test_empty_query_matches_everything() {
        let query = LogQuery::default();
        assert!(query.matches(&log(Address::ZERO, vec![])));
        assert!(query.matches(&log(Address::from_bytes([1; 20]), vec![topic(1)])));
    }

    #[test]
    fn test_address_match() {
        let query = LogQuery {
            addresses: vec![Address::from_bytes([1; 20]), Address::from_bytes([2; 20])],
            ..Default::default()
        };
        assert!(query.matches(&log(Address::from_bytes([2; 20]), vec![])));
        assert!(!query.matches(&log(Address::from_bytes([3; 20]), vec![])));
    }

    #[test]
    fn test_topics_positional_and_or_within_position() {
        let query = LogQuery {
            topics: vec![None, Some(vec![topic(2), topic(3)])],
            ..Default::default()
        };
        assert!(query.matches(&log(Address::ZERO, vec![topic(9), topic(3)])));
        assert!(query.matches(&log(Address::ZERO, vec![topic(9), topic(2), topic(7)])));
        assert!(!query.matches(&log(Address::ZERO, vec![topic(2), topic(9)])));
        // position 1 is constrained but the log has a single topic
        assert!(!query.matches(&log(Address::ZERO, vec![topic(2)])));
    }

    #[test]
    fn test_range_cover() {
        let query = LogQuery {
            from_block: 3,
            to_block: 5,
            ..Default::default()
        };
        assert!(!query.covers(2));
        assert!(query.covers(3));
        assert!(query.covers(5));
        assert!(!query.covers(6));
    }
}
