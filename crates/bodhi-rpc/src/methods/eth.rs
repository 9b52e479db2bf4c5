//! Ethereum namespace RPC methods (eth_*)
//!
//! Every method validates its arguments against a declared schema, resolves
//! block tags with its own `pending` policy, asks the provider and reshapes
//! the answer into wire format.

use std::sync::Arc;

use bodhi_tx::{decode_with, transaction_hash};
use serde_json::Value;

use crate::block_tag::{block_tag_at, resolve, PendingPolicy};
use crate::error::JsonRpcError;
use crate::filters::LogFilter;
use crate::handler::RpcContext;
use crate::provider::StateRef;
use crate::types::{
    format_bytes, format_u256, format_u64, logs_to_value, parse_address, parse_bool, parse_h256,
    parse_hex_bytes, parse_position, to_json, CallRequest, RpcBlock, RpcReceipt, RpcTransaction,
};
use crate::validator::{validate, Param, ParamType};

const NO_ARGS: &[Param] = &[];
const ACCOUNT: &[Param] = &[
    Param::required(ParamType::Address),
    Param::optional(ParamType::Block),
];
const STORAGE: &[Param] = &[
    Param::required(ParamType::Address),
    Param::required(ParamType::Position),
    Param::optional(ParamType::Block),
];
const CALL: &[Param] = &[
    Param::required(ParamType::Transaction),
    Param::optional(ParamType::Block),
];
const RAW_TRANSACTION: &[Param] = &[Param::required(ParamType::TransactionData)];
const BLOCK_BY_NUMBER: &[Param] = &[
    Param::required(ParamType::Block),
    Param::optional(ParamType::Flag),
];
const BLOCK_BY_HASH: &[Param] = &[
    Param::required(ParamType::BlockHash),
    Param::optional(ParamType::Flag),
];
const BLOCK_ONLY: &[Param] = &[Param::required(ParamType::Block)];
const HASH_ONLY: &[Param] = &[Param::required(ParamType::BlockHash)];
const LOG_FILTER: &[Param] = &[Param::required(ParamType::Object)];

fn full_flag(params: &[Value], index: usize) -> Result<bool, JsonRpcError> {
    match params.get(index) {
        None | Some(Value::Null) => Ok(false),
        Some(value) => parse_bool(value),
    }
}

/// Unknown blocks read as `null` rather than an error
fn missing_as_null(result: Result<Value, JsonRpcError>) -> Result<Value, JsonRpcError> {
    match result {
        Err(e) if e == JsonRpcError::header_not_found() => Ok(Value::Null),
        other => other,
    }
}

/// eth_chainId - Returns the chain ID
pub async fn eth_chain_id(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::String(format_u64(ctx.provider.chain_id().await?)))
}

/// eth_blockNumber - Returns the current block number
pub async fn eth_block_number(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::String(format_u64(ctx.provider.block_number().await?)))
}

/// eth_gasPrice - Returns the current gas price
pub async fn eth_gas_price(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::String(format_u256(&ctx.provider.gas_price().await?)))
}

/// eth_maxPriorityFeePerGas - Returns the suggested priority fee
pub async fn eth_max_priority_fee_per_gas(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::String(format_u256(&ctx.provider.max_priority_fee().await?)))
}

/// eth_accounts - The gateway holds no keys
pub async fn eth_accounts(_ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::Array(Vec::new()))
}

/// eth_syncing - Always reports a synced node
pub async fn eth_syncing(_ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::Bool(false))
}

/// eth_getBalance - Returns the balance of an account
pub async fn eth_get_balance(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ACCOUNT, &params)?;
    let address = parse_address(&params[0])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 1)?, PendingPolicy::AsLatest).await?;

    let balance = provider.balance(&address, &at).await?;
    Ok(Value::String(format_u256(&balance)))
}

/// eth_getTransactionCount - Returns the nonce of an account
///
/// `pending` includes transactions the provider has accepted but not sealed.
pub async fn eth_get_transaction_count(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ACCOUNT, &params)?;
    let address = parse_address(&params[0])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 1)?, PendingPolicy::Mempool).await?;

    let nonce = provider.transaction_count(&address, &at).await?;
    Ok(Value::String(format_u256(&nonce)))
}

/// eth_getCode - Returns the code at an address
pub async fn eth_get_code(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(ACCOUNT, &params)?;
    let address = parse_address(&params[0])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 1)?, PendingPolicy::Reject).await?;

    let code = provider.code(&address, &at).await?;
    Ok(Value::String(format_bytes(&code)))
}

/// eth_getStorageAt - Returns storage value at a position
pub async fn eth_get_storage_at(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(STORAGE, &params)?;
    let address = parse_address(&params[0])?;
    let slot = parse_position(&params[1])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 2)?, PendingPolicy::Reject).await?;

    let value = provider.storage_at(&address, &slot, &at).await?;
    Ok(Value::String(value.to_hex()))
}

/// eth_call - Executes a call without creating a transaction
pub async fn eth_call(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(CALL, &params)?;
    let request = CallRequest::from_value(&params[0])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 1)?, PendingPolicy::AsLatest).await?;

    let output = provider.call(&request, &at).await?;
    Ok(Value::String(format_bytes(&output)))
}

/// eth_estimateGas - Estimates gas for a transaction
pub async fn eth_estimate_gas(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(CALL, &params)?;
    let request = CallRequest::from_value(&params[0])?;
    let provider = ctx.provider.as_ref();
    let at = resolve(provider, block_tag_at(&params, 1)?, PendingPolicy::AsLatest).await?;

    let gas = provider.estimate_gas(&request, &at).await?;
    Ok(Value::String(format_u256(&gas)))
}

/// eth_sendRawTransaction - Submits a raw transaction
///
/// The payload is decoded locally so malformed or unsupported transactions
/// never reach the provider. The bytes are forwarded unchanged and the
/// locally computed hash is returned.
pub async fn eth_send_raw_transaction(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(RAW_TRANSACTION, &params)?;
    let raw = parse_hex_bytes(&params[0])?;

    let envelope = decode_with(&raw, &ctx.fee_context)?;
    let sender = envelope
        .from
        .ok_or_else(|| JsonRpcError::invalid_params("transaction is not signed"))?;
    let hash = transaction_hash(&raw);
    tracing::debug!(
        %hash,
        from = %sender,
        tx_type = ?envelope.tx.tx_type(),
        nonce = %envelope.tx.nonce(),
        "routing raw transaction"
    );

    let submitted = ctx.provider.send_raw_transaction(&raw).await?;
    if submitted != hash {
        tracing::warn!(
            local = %hash,
            provider = %submitted,
            "provider reported a different transaction hash"
        );
    }
    Ok(Value::String(hash.to_hex()))
}

/// eth_getBlockByNumber - Returns block by number
pub async fn eth_get_block_by_number(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(BLOCK_BY_NUMBER, &params)?;
    let full = full_flag(&params, 1)?;
    let provider = ctx.provider.as_ref();

    missing_as_null(async {
        let at = resolve(provider, block_tag_at(&params, 0)?, PendingPolicy::AsLatest).await?;
        Ok::<_, JsonRpcError>(match provider.block(&at, full).await? {
            Some(block) => to_json(&RpcBlock::from_block(&block, full))?,
            None => Value::Null,
        })
    }
    .await)
}

/// eth_getBlockByHash - Returns block by hash
pub async fn eth_get_block_by_hash(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(BLOCK_BY_HASH, &params)?;
    let hash = parse_h256(&params[0])?;
    let full = full_flag(&params, 1)?;
    let provider = ctx.provider.as_ref();

    let Some(number) = provider.block_number_of(&hash).await? else {
        return Ok(Value::Null);
    };
    let at = StateRef {
        number,
        hash,
        pending: false,
    };
    match provider.block(&at, full).await? {
        Some(block) => to_json(&RpcBlock::from_block(&block, full)),
        None => Ok(Value::Null),
    }
}

/// eth_getBlockTransactionCountByNumber - Number of transactions in a block
pub async fn eth_get_block_transaction_count_by_number(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(BLOCK_ONLY, &params)?;
    let provider = ctx.provider.as_ref();

    missing_as_null(async {
        let at = resolve(provider, block_tag_at(&params, 0)?, PendingPolicy::AsLatest).await?;
        Ok::<_, JsonRpcError>(provider.block(&at, false).await?.map_or(Value::Null, |block| {
            Value::String(format_u64(block.transactions.len() as u64))
        }))
    }
    .await)
}

/// eth_getBlockTransactionCountByHash - Number of transactions in a block
pub async fn eth_get_block_transaction_count_by_hash(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(HASH_ONLY, &params)?;
    let hash = parse_h256(&params[0])?;
    let provider = ctx.provider.as_ref();

    let Some(number) = provider.block_number_of(&hash).await? else {
        return Ok(Value::Null);
    };
    let at = StateRef {
        number,
        hash,
        pending: false,
    };
    Ok(provider
        .block(&at, false)
        .await?
        .map_or(Value::Null, |block| {
            Value::String(format_u64(block.transactions.len() as u64))
        }))
}

/// eth_getTransactionByHash - Returns transaction by hash
pub async fn eth_get_transaction_by_hash(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(HASH_ONLY, &params)?;
    let hash = parse_h256(&params[0])?;

    match ctx.provider.transaction_by_hash(&hash).await? {
        Some(tx) => to_json(&RpcTransaction::from(&tx)),
        None => Ok(Value::Null),
    }
}

/// eth_getTransactionReceipt - Returns transaction receipt
pub async fn eth_get_transaction_receipt(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(HASH_ONLY, &params)?;
    let hash = parse_h256(&params[0])?;

    match ctx.provider.transaction_receipt(&hash).await? {
        Some(receipt) => to_json(&RpcReceipt::from(&receipt)),
        None => Ok(Value::Null),
    }
}

/// eth_getLogs - Returns logs matching a filter object
pub async fn eth_get_logs(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(LOG_FILTER, &params)?;
    let filter = LogFilter::from_value(&params[0])?;
    let provider = ctx.provider.as_ref();

    let query = filter.resolve(provider).await?;
    let logs = provider.logs(&query).await?;
    logs_to_value(&logs)
}
