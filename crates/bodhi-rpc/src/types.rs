//! RPC request and response types

use bodhi_primitives::{parse_quantity, Address, H256, U256};
use bodhi_tx::{Transaction, TxEnvelope};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::error::JsonRpcError;
use crate::provider::{Block, Log, Receipt, TransactionInfo};

/// JSON-RPC request ID (can be number, string, or null)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(untagged)]
pub enum JsonRpcId {
    /// Numeric ID
    Number(u64),
    /// String ID
    String(String),
    /// Null ID
    #[default]
    Null,
}

/// JSON-RPC 2.0 request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonRpcRequest {
    /// JSON-RPC version (must be "2.0")
    pub jsonrpc: String,
    /// Request ID; a request without one is rejected
    #[serde(default)]
    pub id: Option<JsonRpcId>,
    /// Method name
    pub method: String,
    /// Method parameters, positional array or a single object
    #[serde(default)]
    pub params: Value,
}

impl JsonRpcRequest {
    /// Build a request with positional parameters
    pub fn new(id: JsonRpcId, method: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: Some(id),
            method: method.into(),
            params: Value::Array(params),
        }
    }

    /// Parameters as a positional list; an object becomes the sole argument
    pub fn positional_params(&self) -> Vec<Value> {
        match &self.params {
            Value::Array(items) => items.clone(),
            Value::Null => Vec::new(),
            other => vec![other.clone()],
        }
    }
}

/// JSON-RPC 2.0 response
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC version
    pub jsonrpc: String,
    /// Request ID
    pub id: JsonRpcId,
    /// Result (on success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error (on failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    /// Create success response
    pub fn success(id: JsonRpcId, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Create error response
    pub fn error(id: JsonRpcId, error: JsonRpcError) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }

    /// Serialize to a JSON value
    pub fn to_value(&self) -> Value {
        // JsonRpcResponse holds only strings, numbers and Values
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Serialize a response object, reporting failure as an internal error
pub fn to_json<T: Serialize>(value: &T) -> Result<Value, JsonRpcError> {
    serde_json::to_value(value).map_err(|e| JsonRpcError::internal_error(e.to_string()))
}

/// Server push for a subscription
pub fn subscription_notification(subscription: &str, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "method": "eth_subscription",
        "params": {
            "subscription": subscription,
            "result": result,
        }
    })
}

/// A single value or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ValueOrArray<T> {
    /// One value
    Value(T),
    /// Several values
    Array(Vec<T>),
}

impl<T> ValueOrArray<T> {
    /// Flatten into a vector
    pub fn into_vec(self) -> Vec<T> {
        match self {
            ValueOrArray::Value(v) => vec![v],
            ValueOrArray::Array(v) => v,
        }
    }
}

/// Log filter object as sent by clients
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilterRequest {
    /// Start of the range
    pub from_block: Option<Value>,
    /// End of the range
    pub to_block: Option<Value>,
    /// Single block, exclusive with the range
    pub block_hash: Option<H256>,
    /// Emitting addresses
    pub address: Option<ValueOrArray<Address>>,
    /// Positional topic filters
    pub topics: Option<Vec<Option<ValueOrArray<H256>>>>,
}

/// Parse address from JSON value
pub fn parse_address(value: &Value) -> Result<Address, JsonRpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| JsonRpcError::invalid_params("address must be a string"))?;
    Address::from_hex(s)
        .map_err(|e| JsonRpcError::invalid_params(format!("invalid address: {}", e)))
}

/// Parse H256 from JSON value
pub fn parse_h256(value: &Value) -> Result<H256, JsonRpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| JsonRpcError::invalid_params("hash must be a string"))?;
    H256::from_hex(s).map_err(|e| JsonRpcError::invalid_params(format!("invalid hash: {}", e)))
}

/// Parse a storage position: any quantity up to 32 bytes, left padded
pub fn parse_position(value: &Value) -> Result<H256, JsonRpcError> {
    let quantity = parse_u256(value)?;
    let mut buf = [0u8; 32];
    quantity.to_big_endian(&mut buf);
    Ok(H256::from_bytes(buf))
}

/// Parse hex bytes from JSON value
pub fn parse_hex_bytes(value: &Value) -> Result<Bytes, JsonRpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| JsonRpcError::invalid_params("data must be a hex string"))?;
    decode_hex(s)
}

fn decode_hex(s: &str) -> Result<Bytes, JsonRpcError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| JsonRpcError::invalid_params("hex data must start with 0x"))?;
    hex::decode(digits)
        .map(Bytes::from)
        .map_err(|e| JsonRpcError::invalid_params(format!("invalid hex data: {}", e)))
}

/// Parse U256 from JSON value (hex string)
pub fn parse_u256(value: &Value) -> Result<U256, JsonRpcError> {
    let s = value
        .as_str()
        .ok_or_else(|| JsonRpcError::invalid_params("quantity must be a hex string"))?;
    parse_quantity(s).map_err(|e| JsonRpcError::invalid_params(e.to_string()))
}

/// Parse a boolean flag
pub fn parse_bool(value: &Value) -> Result<bool, JsonRpcError> {
    value
        .as_bool()
        .ok_or_else(|| JsonRpcError::invalid_params("flag must be a boolean"))
}

/// Format U256 as hex string
pub fn format_u256(value: &U256) -> String {
    format!("0x{:x}", value)
}

/// Format u64 as hex string
pub fn format_u64(value: u64) -> String {
    format!("0x{:x}", value)
}

/// Format bytes as hex string
pub fn format_bytes(bytes: &[u8]) -> String {
    format!("0x{}", hex::encode(bytes))
}

fn empty_bloom() -> String {
    format_bytes(&[0u8; 256])
}

/// Call request for eth_call and eth_estimateGas (raw JSON form)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallRequestRaw {
    /// From address
    pub from: Option<String>,
    /// To address (None for contract creation)
    pub to: Option<String>,
    /// Gas limit
    pub gas: Option<String>,
    /// Gas price (legacy)
    pub gas_price: Option<String>,
    /// Max fee per gas (EIP-1559)
    pub max_fee_per_gas: Option<String>,
    /// Max priority fee per gas (EIP-1559)
    pub max_priority_fee_per_gas: Option<String>,
    /// Value to send
    pub value: Option<String>,
    /// Input data
    #[serde(default, alias = "input")]
    pub data: Option<String>,
    /// Nonce
    pub nonce: Option<String>,
}

/// Call request for eth_call and eth_estimateGas (parsed form)
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    /// From address
    pub from: Option<Address>,
    /// To address (None for contract creation)
    pub to: Option<Address>,
    /// Gas limit
    pub gas: Option<U256>,
    /// Gas price (legacy)
    pub gas_price: Option<U256>,
    /// Max fee per gas (EIP-1559)
    pub max_fee_per_gas: Option<U256>,
    /// Max priority fee per gas (EIP-1559)
    pub max_priority_fee_per_gas: Option<U256>,
    /// Value to send
    pub value: Option<U256>,
    /// Input data
    pub data: Option<Bytes>,
    /// Nonce
    pub nonce: Option<U256>,
}

impl CallRequest {
    /// Parse from raw JSON form
    pub fn from_raw(raw: CallRequestRaw) -> Result<Self, JsonRpcError> {
        let address = |field: &str, s: Option<String>| {
            s.map(|s| Address::from_hex(&s))
                .transpose()
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid {}: {}", field, e)))
        };
        let quantity = |field: &str, s: Option<String>| {
            s.map(|s| parse_quantity(&s))
                .transpose()
                .map_err(|e| JsonRpcError::invalid_params(format!("invalid {}: {}", field, e)))
        };
        Ok(Self {
            from: address("from", raw.from)?,
            to: address("to", raw.to)?,
            gas: quantity("gas", raw.gas)?,
            gas_price: quantity("gasPrice", raw.gas_price)?,
            max_fee_per_gas: quantity("maxFeePerGas", raw.max_fee_per_gas)?,
            max_priority_fee_per_gas: quantity("maxPriorityFeePerGas", raw.max_priority_fee_per_gas)?,
            value: quantity("value", raw.value)?,
            data: raw.data.map(|s| decode_hex(&s)).transpose()?,
            nonce: quantity("nonce", raw.nonce)?,
        })
    }

    /// Parse from a JSON object
    pub fn from_value(value: &Value) -> Result<Self, JsonRpcError> {
        let raw: CallRequestRaw = serde_json::from_value(value.clone())
            .map_err(|e| JsonRpcError::invalid_params(format!("invalid call request: {}", e)))?;
        Self::from_raw(raw)
    }
}

/// RPC block header representation, the `newHeads` payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcHeader {
    /// Block hash
    pub hash: String,
    /// Parent block hash
    pub parent_hash: String,
    /// Sha3 uncles hash
    pub sha3_uncles: String,
    /// Miner/coinbase address
    pub miner: String,
    /// State root
    pub state_root: String,
    /// Transactions root
    pub transactions_root: String,
    /// Receipts root
    pub receipts_root: String,
    /// Logs bloom
    pub logs_bloom: String,
    /// Difficulty
    pub difficulty: String,
    /// Block number
    pub number: String,
    /// Gas limit
    pub gas_limit: String,
    /// Gas used
    pub gas_used: String,
    /// Timestamp
    pub timestamp: String,
    /// Extra data
    pub extra_data: String,
    /// Mix hash
    pub mix_hash: String,
    /// Nonce
    pub nonce: String,
    /// Base fee per gas (EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_fee_per_gas: Option<String>,
}

/// Keccak-256 of the RLP of an empty list
const EMPTY_UNCLES_HASH: &str =
    "0x1dcc4de8dec75d7aab85b567b6ccd41ad312451b948a7413f0a142fd40d49347";

impl From<&Block> for RpcHeader {
    fn from(block: &Block) -> Self {
        Self {
            hash: block.hash.to_hex(),
            parent_hash: block.parent_hash.to_hex(),
            sha3_uncles: EMPTY_UNCLES_HASH.to_string(),
            miner: block.miner.to_hex(),
            state_root: block.state_root.to_hex(),
            transactions_root: block.transactions_root.to_hex(),
            receipts_root: block.receipts_root.to_hex(),
            logs_bloom: empty_bloom(),
            difficulty: format_u64(0),
            number: format_u64(block.number),
            gas_limit: format_u256(&block.gas_limit),
            gas_used: format_u256(&block.gas_used),
            timestamp: format_u64(block.timestamp),
            extra_data: format_bytes(&block.extra_data),
            mix_hash: H256::ZERO.to_hex(),
            nonce: format_bytes(&[0u8; 8]),
            base_fee_per_gas: block.base_fee_per_gas.as_ref().map(format_u256),
        }
    }
}

/// RPC block representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcBlock {
    /// Header fields
    #[serde(flatten)]
    pub header: RpcHeader,
    /// Total difficulty
    pub total_difficulty: String,
    /// Encoded size of the block's transactions
    pub size: String,
    /// Transactions (hashes or full objects)
    pub transactions: Vec<BlockTransaction>,
    /// Uncles
    pub uncles: Vec<String>,
}

impl RpcBlock {
    /// Reshape a block; `full` inlines transaction objects instead of hashes
    pub fn from_block(block: &Block, full: bool) -> Self {
        let transactions = block
            .transactions
            .iter()
            .map(|tx| {
                if full {
                    BlockTransaction::Full(Box::new(RpcTransaction::from(tx)))
                } else {
                    BlockTransaction::Hash(tx.hash.to_hex())
                }
            })
            .collect();
        let size: usize = block
            .transactions
            .iter()
            .map(|tx| tx.envelope.encode().len())
            .sum();
        Self {
            header: RpcHeader::from(block),
            total_difficulty: format_u64(0),
            size: format_u64(size as u64),
            transactions,
            uncles: Vec::new(),
        }
    }
}

/// Entry of a block's transaction list
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum BlockTransaction {
    /// Hash only
    Hash(String),
    /// Inlined transaction object
    Full(Box<RpcTransaction>),
}

/// RPC transaction representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcTransaction {
    /// Transaction hash
    pub hash: String,
    /// Nonce
    pub nonce: String,
    /// Block hash (None if pending)
    pub block_hash: Option<String>,
    /// Block number (None if pending)
    pub block_number: Option<String>,
    /// Transaction index (None if pending)
    pub transaction_index: Option<String>,
    /// From address
    pub from: String,
    /// To address (None for contract creation)
    pub to: Option<String>,
    /// Value
    pub value: String,
    /// Gas limit
    pub gas: String,
    /// Gas price
    pub gas_price: String,
    /// Input data
    pub input: String,
    /// V
    pub v: String,
    /// R
    pub r: String,
    /// S
    pub s: String,
    /// Transaction type
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Chain ID
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chain_id: Option<String>,
    /// Max fee per gas (EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_fee_per_gas: Option<String>,
    /// Max priority fee per gas (EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_priority_fee_per_gas: Option<String>,
    /// Access list (EIP-2930 and EIP-1559)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_list: Option<Vec<Value>>,
}

fn effective_gas_price(tx: &Transaction) -> U256 {
    tx.gas_price()
        .or_else(|| tx.max_fee_per_gas())
        .unwrap_or_default()
}

impl From<&TransactionInfo> for RpcTransaction {
    fn from(info: &TransactionInfo) -> Self {
        let TxEnvelope {
            tx,
            signature,
            from,
        } = &info.envelope;
        let access_list = match tx {
            Transaction::AccessList(_) | Transaction::DynamicFee(_) => Some(
                tx.access_list()
                    .iter()
                    .map(|item| {
                        json!({
                            "address": item.address.to_hex(),
                            "storageKeys": item.storage_keys.iter().map(H256::to_hex).collect::<Vec<_>>(),
                        })
                    })
                    .collect(),
            ),
            _ => None,
        };
        let (v, r, s) = signature
            .map(|sig| (sig.v, sig.r, sig.s))
            .unwrap_or((0, H256::ZERO, H256::ZERO));

        Self {
            hash: info.hash.to_hex(),
            nonce: format_u256(&tx.nonce()),
            block_hash: info.block_hash.as_ref().map(H256::to_hex),
            block_number: info.block_number.map(format_u64),
            transaction_index: info.transaction_index.map(format_u64),
            from: from.unwrap_or(Address::ZERO).to_hex(),
            to: tx.to().map(Address::to_hex),
            value: format_u256(&tx.value()),
            gas: format_u256(&tx.gas_limit()),
            gas_price: format_u256(&effective_gas_price(tx)),
            input: format_bytes(tx.data()),
            v: format_u64(v),
            r: format_u256(&U256::from_big_endian(r.as_bytes())),
            s: format_u256(&U256::from_big_endian(s.as_bytes())),
            tx_type: format_u64(tx.tx_type() as u64),
            chain_id: tx.chain_id().map(format_u64),
            max_fee_per_gas: tx.max_fee_per_gas().as_ref().map(format_u256),
            max_priority_fee_per_gas: tx.max_priority_fee_per_gas().as_ref().map(format_u256),
            access_list,
        }
    }
}

/// RPC receipt representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    /// Transaction hash
    pub transaction_hash: String,
    /// Transaction index
    pub transaction_index: String,
    /// Block hash
    pub block_hash: String,
    /// Block number
    pub block_number: String,
    /// From address
    pub from: String,
    /// To address (None for contract creation)
    pub to: Option<String>,
    /// Cumulative gas used
    pub cumulative_gas_used: String,
    /// Gas used
    pub gas_used: String,
    /// Contract address (if contract creation)
    pub contract_address: Option<String>,
    /// Logs
    pub logs: Vec<RpcLog>,
    /// Logs bloom
    pub logs_bloom: String,
    /// Transaction type
    #[serde(rename = "type")]
    pub tx_type: String,
    /// Status (1 = success, 0 = failure)
    pub status: String,
    /// Effective gas price
    pub effective_gas_price: String,
}

impl From<&Receipt> for RpcReceipt {
    fn from(receipt: &Receipt) -> Self {
        Self {
            transaction_hash: receipt.transaction_hash.to_hex(),
            transaction_index: format_u64(receipt.transaction_index),
            block_hash: receipt.block_hash.to_hex(),
            block_number: format_u64(receipt.block_number),
            from: receipt.from.to_hex(),
            to: receipt.to.as_ref().map(Address::to_hex),
            cumulative_gas_used: format_u256(&receipt.cumulative_gas_used),
            gas_used: format_u256(&receipt.gas_used),
            contract_address: receipt.contract_address.as_ref().map(Address::to_hex),
            logs: receipt.logs.iter().map(RpcLog::from).collect(),
            logs_bloom: empty_bloom(),
            tx_type: format_u64(receipt.tx_type as u64),
            status: format_u64(receipt.status as u64),
            effective_gas_price: format_u256(&receipt.effective_gas_price),
        }
    }
}

/// RPC log representation
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    /// Log address
    pub address: String,
    /// Log topics
    pub topics: Vec<String>,
    /// Log data
    pub data: String,
    /// Block hash
    pub block_hash: String,
    /// Block number
    pub block_number: String,
    /// Transaction hash
    pub transaction_hash: String,
    /// Transaction index
    pub transaction_index: String,
    /// Log index
    pub log_index: String,
    /// Removed by a reorg
    pub removed: bool,
}

impl From<&Log> for RpcLog {
    fn from(log: &Log) -> Self {
        Self {
            address: log.address.to_hex(),
            topics: log.topics.iter().map(H256::to_hex).collect(),
            data: format_bytes(&log.data),
            block_hash: log.block_hash.to_hex(),
            block_number: format_u64(log.block_number),
            transaction_hash: log.transaction_hash.to_hex(),
            transaction_index: format_u64(log.transaction_index),
            log_index: format_u64(log.log_index),
            removed: log.removed,
        }
    }
}

/// Serialize a list of logs
pub fn logs_to_value(logs: &[Log]) -> Result<Value, JsonRpcError> {
    to_json(&logs.iter().map(RpcLog::from).collect::<Vec<_>>())
}
