//! In-memory development chain
//!
//! Seals one block per accepted raw transaction. Account state is kept per
//! block so historical reads resolve against the right snapshot.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bodhi_crypto::{keccak256, keccak256_concat};
use bodhi_primitives::{Address, H256, U256};
use bodhi_rlp::{append_uint, RlpStream};
use bodhi_tx::{decode_with, transaction_hash, FeeDelegationContext, Transaction, TxEnvelope};
use bytes::Bytes;
use parking_lot::RwLock;
use tokio::sync::broadcast;

use super::{
    Block, ChainEvent, Log, LogQuery, Provider, ProviderError, ProviderResult, Receipt, StateRef,
    TransactionInfo,
};
use crate::types::CallRequest;

const TX_GAS: u64 = 21_000;
const TX_CREATE_GAS: u64 = 32_000;
const TX_DATA_ZERO_GAS: u64 = 4;
const TX_DATA_NON_ZERO_GAS: u64 = 16;

/// Genesis allocation for one account
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisAccount {
    /// Initial balance
    pub balance: U256,
    /// Initial nonce
    pub nonce: U256,
    /// Contract code
    pub code: Bytes,
    /// Storage slots
    pub storage: HashMap<H256, H256>,
}

/// Development chain configuration
#[derive(Debug, Clone)]
pub struct DevConfig {
    /// Chain ID
    pub chain_id: u64,
    /// Gas price reported to clients
    pub gas_price: U256,
    /// Suggested priority fee
    pub max_priority_fee: U256,
    /// Block gas limit
    pub block_gas_limit: U256,
    /// Blocks between best and finalized
    pub finality_lag: u64,
    /// Genesis timestamp
    pub genesis_timestamp: u64,
    /// Genesis allocation
    pub alloc: HashMap<Address, GenesisAccount>,
    /// Context used to decode fee-delegated submissions
    pub fee_context: FeeDelegationContext,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for DevConfig {
    fn default() -> Self {
        Self {
            chain_id: 595,
            gas_price: U256::from(1_000_000_000u64),
            max_priority_fee: U256::zero(),
            block_gas_limit: U256::from(30_000_000u64),
            finality_lag: 0,
            genesis_timestamp: 0,
            alloc: HashMap::new(),
            fee_context: FeeDelegationContext::default(),
            event_capacity: 256,
        }
    }
}

/// A log emitted outside any transaction, for system events and tests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevLog {
    /// Emitting address
    pub address: Address,
    /// Indexed topics
    pub topics: Vec<H256>,
    /// Data
    pub data: Bytes,
}

type State = HashMap<Address, GenesisAccount>;

/// A transaction accepted into the next block
struct Executed {
    info: TransactionInfo,
    from: Address,
    gas_used: U256,
    price: U256,
    contract_address: Option<Address>,
}

#[derive(Default)]
struct Chain {
    blocks: Vec<Block>,
    states: Vec<State>,
    logs: Vec<Vec<Log>>,
    by_hash: HashMap<H256, u64>,
    transactions: HashMap<H256, TransactionInfo>,
    receipts: HashMap<H256, Receipt>,
}

impl Chain {
    fn best(&self) -> u64 {
        self.blocks.len().saturating_sub(1) as u64
    }

    fn state(&self, at: &StateRef) -> ProviderResult<&State> {
        self.states
            .get(at.number as usize)
            .ok_or_else(|| ProviderError::NotFound("header not found".to_string()))
    }

    fn account(&self, address: &Address, at: &StateRef) -> ProviderResult<GenesisAccount> {
        Ok(self.state(at)?.get(address).cloned().unwrap_or_default())
    }

    fn seal(
        &mut self,
        executed: Vec<Executed>,
        extra_logs: Vec<DevLog>,
        state: State,
        config: &DevConfig,
    ) -> (Block, Vec<Log>) {
        let number = self.blocks.len() as u64;
        let parent = self.blocks.last();
        let parent_hash = parent.map(|b| b.hash).unwrap_or(H256::ZERO);
        let timestamp = match parent {
            Some(parent) => now().max(parent.timestamp + 1),
            None => config.genesis_timestamp,
        };

        let mut preimage = Vec::with_capacity(48 + executed.len() * 32);
        preimage.extend_from_slice(parent_hash.as_bytes());
        preimage.extend_from_slice(&number.to_be_bytes());
        preimage.extend_from_slice(&timestamp.to_be_bytes());
        preimage.extend_from_slice(&config.chain_id.to_be_bytes());
        for tx in &executed {
            preimage.extend_from_slice(tx.info.hash.as_bytes());
        }
        let hash = keccak256(&preimage);

        let tx_hashes: Vec<&[u8]> = executed.iter().map(|tx| &tx.info.hash.as_bytes()[..]).collect();
        let transactions_root = keccak256_concat(&tx_hashes);

        let mut logs = Vec::new();
        let mut cumulative = U256::zero();
        let mut transactions = Vec::with_capacity(executed.len());
        for (index, tx) in executed.into_iter().enumerate() {
            cumulative += tx.gas_used;
            let mut info = tx.info;
            info.block_hash = Some(hash);
            info.block_number = Some(number);
            info.transaction_index = Some(index as u64);

            let receipt = Receipt {
                transaction_hash: info.hash,
                transaction_index: index as u64,
                block_hash: hash,
                block_number: number,
                from: tx.from,
                to: info.envelope.tx.to().copied(),
                contract_address: tx.contract_address,
                cumulative_gas_used: cumulative,
                gas_used: tx.gas_used,
                effective_gas_price: tx.price,
                status: true,
                logs: Vec::new(),
                tx_type: info.envelope.tx.tx_type() as u8,
            };
            self.receipts.insert(info.hash, receipt);
            self.transactions.insert(info.hash, info.clone());
            transactions.push(info);
        }

        for entry in extra_logs {
            logs.push(Log {
                address: entry.address,
                topics: entry.topics,
                data: entry.data,
                block_hash: hash,
                block_number: number,
                transaction_hash: H256::ZERO,
                transaction_index: 0,
                log_index: logs.len() as u64,
                removed: false,
            });
        }

        let block = Block {
            number,
            hash,
            parent_hash,
            timestamp,
            miner: Address::ZERO,
            state_root: state_root(&state),
            transactions_root,
            receipts_root: keccak256_concat(&[
                transactions_root.as_bytes(),
                &be_word(&cumulative),
            ]),
            gas_limit: config.block_gas_limit,
            gas_used: cumulative,
            base_fee_per_gas: None,
            extra_data: Bytes::new(),
            transactions,
        };

        self.by_hash.insert(hash, number);
        self.blocks.push(block.clone());
        self.states.push(state);
        self.logs.push(logs.clone());
        (block, logs)
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn be_word(value: &U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}

fn state_root(state: &State) -> H256 {
    let mut entries: Vec<_> = state.iter().collect();
    entries.sort_by_key(|(address, _)| **address);
    let mut preimage = Vec::with_capacity(entries.len() * 84);
    for (address, account) in entries {
        preimage.extend_from_slice(address.as_bytes());
        preimage.extend_from_slice(&be_word(&account.balance));
        preimage.extend_from_slice(&be_word(&account.nonce));
        preimage.extend_from_slice(keccak256(&account.code).as_bytes());
    }
    keccak256(&preimage)
}

/// Intrinsic gas of a call or transaction payload
pub(crate) fn intrinsic_gas(data: &[u8], create: bool) -> U256 {
    let data_gas: u64 = data
        .iter()
        .map(|b| if *b == 0 { TX_DATA_ZERO_GAS } else { TX_DATA_NON_ZERO_GAS })
        .sum();
    let base = if create { TX_GAS + TX_CREATE_GAS } else { TX_GAS };
    U256::from(base + data_gas)
}

/// Address of a contract created by `sender` at `nonce`
fn create_address(sender: &Address, nonce: &U256) -> Address {
    let mut stream = RlpStream::new_list(2);
    stream.append(sender);
    append_uint(&mut stream, nonce);
    let hash = keccak256(&stream.out());
    let mut bytes = [0u8; 20];
    bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(bytes)
}

fn effective_price(tx: &Transaction) -> U256 {
    match tx {
        Transaction::Legacy(tx) => tx.gas_price,
        Transaction::AccessList(tx) => tx.gas_price,
        Transaction::DynamicFee(tx) => tx.max_priority_fee_per_gas.min(tx.max_fee_per_gas),
        // paid by the chain's fee delegation, not the sender
        Transaction::FeeDelegated(_) => U256::zero(),
    }
}

/// In-memory instant-seal provider
pub struct DevProvider {
    config: DevConfig,
    chain: RwLock<Chain>,
    events: broadcast::Sender<ChainEvent>,
}

impl DevProvider {
    /// Create a chain holding only the genesis block
    pub fn new(config: DevConfig) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        let mut chain = Chain::default();
        let genesis_state = config.alloc.clone();
        chain.seal(Vec::new(), Vec::new(), genesis_state, &config);
        tracing::info!(
            chain_id = config.chain_id,
            accounts = config.alloc.len(),
            genesis = %chain.blocks[0].hash,
            "dev chain initialized"
        );
        Self {
            config,
            chain: RwLock::new(chain),
            events,
        }
    }

    /// Genesis block hash
    pub fn genesis_hash(&self) -> H256 {
        self.chain.read().blocks[0].hash
    }

    /// Seal a block without transactions, optionally carrying logs
    pub fn seal_block(&self, logs: Vec<DevLog>) -> Block {
        let mut chain = self.chain.write();
        let state = chain.states.last().cloned().unwrap_or_default();
        let (block, logs) = chain.seal(Vec::new(), logs, state, &self.config);
        // published under the write lock so events leave in block order
        self.publish(&block, logs);
        block
    }

    fn publish(&self, block: &Block, logs: Vec<Log>) {
        tracing::debug!(number = block.number, hash = %block.hash, "sealed block");
        // no receivers is fine
        let _ = self.events.send(ChainEvent::NewBlock {
            block: Arc::new(block.clone()),
            logs: Arc::new(logs),
        });
    }

    fn apply(&self, envelope: TxEnvelope, hash: H256, chain: &Chain) -> ProviderResult<(Executed, State)> {
        let from = envelope
            .from
            .ok_or_else(|| ProviderError::Rejected("transaction is not signed".to_string()))?;
        let tx = &envelope.tx;
        if let Some(chain_id) = tx.chain_id() {
            if chain_id != self.config.chain_id {
                return Err(ProviderError::Rejected(format!(
                    "invalid chain id: {} (expected {})",
                    chain_id, self.config.chain_id
                )));
            }
        }

        let mut state = chain.states.last().cloned().unwrap_or_default();
        let mut sender = state.get(&from).cloned().unwrap_or_default();
        if tx.nonce() < sender.nonce {
            return Err(ProviderError::Rejected("nonce too low".to_string()));
        }
        if tx.nonce() > sender.nonce {
            return Err(ProviderError::Rejected("nonce too high".to_string()));
        }

        let gas_used = intrinsic_gas(tx.data(), tx.is_contract_creation());
        if tx.gas_limit() < gas_used {
            return Err(ProviderError::Rejected("intrinsic gas too low".to_string()));
        }
        let price = effective_price(tx);
        let cost = gas_used
            .checked_mul(price)
            .and_then(|fee| fee.checked_add(tx.value()))
            .filter(|cost| *cost <= sender.balance)
            .ok_or_else(|| {
                ProviderError::Rejected("insufficient funds for gas * price + value".to_string())
            })?;

        let contract_address = tx
            .is_contract_creation()
            .then(|| create_address(&from, &sender.nonce));
        sender.balance -= cost;
        sender.nonce += U256::one();
        state.insert(from, sender);

        let recipient = tx.to().copied().or(contract_address);
        if let Some(recipient) = recipient {
            let account = state.entry(recipient).or_default();
            account.balance += tx.value();
            if contract_address.is_some() {
                account.code = tx.data().clone();
            }
        }

        Ok((
            Executed {
                info: TransactionInfo {
                    hash,
                    envelope,
                    block_hash: None,
                    block_number: None,
                    transaction_index: None,
                },
                from,
                gas_used,
                price,
                contract_address,
            },
            state,
        ))
    }
}

#[async_trait]
impl Provider for DevProvider {
    async fn chain_id(&self) -> ProviderResult<u64> {
        Ok(self.config.chain_id)
    }

    async fn block_number(&self) -> ProviderResult<u64> {
        Ok(self.chain.read().best())
    }

    async fn finalized_number(&self) -> ProviderResult<u64> {
        Ok(self.chain.read().best().saturating_sub(self.config.finality_lag))
    }

    async fn block_hash(&self, number: u64) -> ProviderResult<Option<H256>> {
        Ok(self.chain.read().blocks.get(number as usize).map(|b| b.hash))
    }

    async fn block_number_of(&self, hash: &H256) -> ProviderResult<Option<u64>> {
        Ok(self.chain.read().by_hash.get(hash).copied())
    }

    async fn block(&self, at: &StateRef, _full: bool) -> ProviderResult<Option<Block>> {
        Ok(self.chain.read().blocks.get(at.number as usize).cloned())
    }

    async fn balance(&self, address: &Address, at: &StateRef) -> ProviderResult<U256> {
        Ok(self.chain.read().account(address, at)?.balance)
    }

    async fn transaction_count(&self, address: &Address, at: &StateRef) -> ProviderResult<U256> {
        // instant seal leaves nothing queued, so pending equals latest
        Ok(self.chain.read().account(address, at)?.nonce)
    }

    async fn code(&self, address: &Address, at: &StateRef) -> ProviderResult<Bytes> {
        Ok(self.chain.read().account(address, at)?.code)
    }

    async fn storage_at(
        &self,
        address: &Address,
        slot: &H256,
        at: &StateRef,
    ) -> ProviderResult<H256> {
        let account = self.chain.read().account(address, at)?;
        Ok(account.storage.get(slot).copied().unwrap_or(H256::ZERO))
    }

    async fn call(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<Bytes> {
        let chain = self.chain.read();
        if let (Some(from), Some(value)) = (request.from, request.value) {
            if chain.account(&from, at)?.balance < value {
                return Err(ProviderError::Reverted {
                    message: "insufficient balance for transfer".to_string(),
                    data: None,
                });
            }
        }
        // no EVM here: calls succeed with empty return data
        Ok(Bytes::new())
    }

    async fn estimate_gas(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<U256> {
        self.call(request, at).await?;
        let data = request.data.clone().unwrap_or_default();
        Ok(intrinsic_gas(&data, request.to.is_none()))
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        Ok(self.config.gas_price)
    }

    async fn max_priority_fee(&self) -> ProviderResult<U256> {
        Ok(self.config.max_priority_fee)
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ProviderResult<H256> {
        let envelope = decode_with(raw, &self.config.fee_context)
            .map_err(|e| ProviderError::Rejected(e.to_string()))?;
        let hash = transaction_hash(raw);

        let mut chain = self.chain.write();
        if chain.transactions.contains_key(&hash) {
            return Err(ProviderError::Rejected("already known".to_string()));
        }
        let (executed, state) = self.apply(envelope, hash, &chain)?;
        let (block, logs) = chain.seal(vec![executed], Vec::new(), state, &self.config);
        self.publish(&block, logs);
        Ok(hash)
    }

    async fn logs(&self, query: &LogQuery) -> ProviderResult<Vec<Log>> {
        let chain = self.chain.read();
        let to = query.to_block.min(chain.best());
        if query.from_block > to {
            return Ok(Vec::new());
        }
        Ok(chain.logs[query.from_block as usize..=to as usize]
            .iter()
            .flatten()
            .filter(|log| query.matches(log))
            .cloned()
            .collect())
    }

    async fn transaction_by_hash(&self, hash: &H256) -> ProviderResult<Option<TransactionInfo>> {
        Ok(self.chain.read().transactions.get(hash).cloned())
    }

    async fn transaction_receipt(&self, hash: &H256) -> ProviderResult<Option<Receipt>> {
        Ok(self.chain.read().receipts.get(hash).cloned())
    }

    fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.events.subscribe()
    }
}
