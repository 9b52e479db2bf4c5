//! Block tag parsing and resolution
//!
//! A tag is parsed once per call and resolved against the provider into a
//! [`StateRef`]. Resolution is never cached: `latest` moves.

use bodhi_primitives::H256;
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::provider::{Provider, StateRef};

/// Tags decoding to this number or above are rejected
pub const MAX_BLOCK_NUMBER: u64 = 1 << 32;

/// Block identifier for RPC calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BlockTag {
    /// Latest block
    #[default]
    Latest,
    /// Earliest block (genesis)
    Earliest,
    /// Pending block
    Pending,
    /// Safe block
    Safe,
    /// Finalized block
    Finalized,
    /// Block number
    Number(u64),
    /// Block hash
    Hash(H256),
}

/// How a method treats the `pending` tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPolicy {
    /// `pending` is an invalid argument
    Reject,
    /// `pending` reads the latest block
    AsLatest,
    /// `pending` reads the latest block with the mempool projected on top
    Mempool,
}

fn out_of_range() -> JsonRpcError {
    JsonRpcError::invalid_params("block number should be less than u32")
}

fn check_number(number: u64) -> Result<BlockTag, JsonRpcError> {
    if number >= MAX_BLOCK_NUMBER {
        return Err(out_of_range());
    }
    Ok(BlockTag::Number(number))
}

fn parse_number_str(s: &str) -> Result<BlockTag, JsonRpcError> {
    let number = match s.strip_prefix("0x") {
        Some(digits) => {
            if digits.is_empty() {
                return Err(JsonRpcError::invalid_params("invalid block number: 0x"));
            }
            if digits.trim_start_matches('0').len() > 16 {
                return Err(out_of_range());
            }
            u64::from_str_radix(digits, 16)
        }
        None => {
            if s.trim_start_matches('0').len() > 20 {
                return Err(out_of_range());
            }
            s.parse::<u64>()
        }
    }
    .map_err(|e| JsonRpcError::invalid_params(format!("invalid block number: {}", e)))?;
    check_number(number)
}

/// Parse block tag from JSON value
pub fn parse_block_tag(value: &Value) -> Result<BlockTag, JsonRpcError> {
    match value {
        Value::Null => Ok(BlockTag::Latest),
        Value::String(s) => {
            let s = s.to_lowercase();
            match s.as_str() {
                "latest" => Ok(BlockTag::Latest),
                "earliest" => Ok(BlockTag::Earliest),
                "pending" => Ok(BlockTag::Pending),
                "safe" => Ok(BlockTag::Safe),
                "finalized" => Ok(BlockTag::Finalized),
                _ if s.starts_with("0x") || s.chars().all(|c| c.is_ascii_digit()) => {
                    parse_number_str(&s)
                }
                _ => Err(JsonRpcError::invalid_params(format!(
                    "invalid block tag: {}",
                    s
                ))),
            }
        }
        Value::Number(n) => {
            let number = n
                .as_u64()
                .ok_or_else(|| JsonRpcError::invalid_params("invalid block number"))?;
            check_number(number)
        }
        Value::Object(map) => {
            let number = map.get("blockNumber");
            let hash = map.get("blockHash");
            match (number, hash) {
                (Some(number), None) => match parse_block_tag(number)? {
                    BlockTag::Hash(_) => Err(JsonRpcError::invalid_params(
                        "blockNumber must be a number or tag",
                    )),
                    tag => Ok(tag),
                },
                (None, Some(Value::String(hash))) => H256::from_hex(hash)
                    .map(BlockTag::Hash)
                    .map_err(|e| {
                        JsonRpcError::invalid_params(format!("invalid block hash: {}", e))
                    }),
                (None, Some(_)) => Err(JsonRpcError::invalid_params("blockHash must be a string")),
                _ => Err(JsonRpcError::invalid_params(
                    "block object must contain exactly one of blockNumber or blockHash",
                )),
            }
        }
        _ => Err(JsonRpcError::invalid_params("invalid block tag type")),
    }
}

/// Parse an optional positional tag, defaulting to `latest`
pub fn block_tag_at(params: &[Value], index: usize) -> Result<BlockTag, JsonRpcError> {
    params
        .get(index)
        .map(parse_block_tag)
        .transpose()
        .map(Option::unwrap_or_default)
}

/// Resolve a block tag into a chain-state reference
pub async fn resolve(
    provider: &dyn Provider,
    tag: BlockTag,
    policy: PendingPolicy,
) -> Result<StateRef, JsonRpcError> {
    let mut pending = false;
    let number = match tag {
        BlockTag::Earliest => 0,
        BlockTag::Latest => provider.block_number().await?,
        BlockTag::Pending => match policy {
            PendingPolicy::Reject => {
                return Err(JsonRpcError::invalid_params("pending tag is not supported"))
            }
            PendingPolicy::AsLatest => provider.block_number().await?,
            PendingPolicy::Mempool => {
                pending = true;
                provider.block_number().await?
            }
        },
        BlockTag::Safe | BlockTag::Finalized => provider.finalized_number().await?,
        BlockTag::Number(number) => {
            if number > provider.block_number().await? {
                return Err(JsonRpcError::header_not_found());
            }
            number
        }
        BlockTag::Hash(hash) => {
            let number = provider
                .block_number_of(&hash)
                .await?
                .ok_or_else(JsonRpcError::header_not_found)?;
            return Ok(StateRef {
                number,
                hash,
                pending: false,
            });
        }
    };

    let hash = provider
        .block_hash(number)
        .await?
        .ok_or_else(JsonRpcError::header_not_found)?;
    Ok(StateRef {
        number,
        hash,
        pending,
    })
}

/// Resolve a tag to a block number only
pub async fn resolve_number(
    provider: &dyn Provider,
    tag: BlockTag,
    policy: PendingPolicy,
) -> Result<u64, JsonRpcError> {
    match tag {
        BlockTag::Earliest => Ok(0),
        BlockTag::Latest => Ok(provider.block_number().await?),
        BlockTag::Number(number) => Ok(number),
        BlockTag::Pending if policy != PendingPolicy::Reject => {
            Ok(provider.block_number().await?)
        }
        other => resolve(provider, other, policy).await.map(|at| at.number),
    }
}
