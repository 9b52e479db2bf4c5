//! Network namespace RPC methods (net_*)

use std::sync::Arc;

use serde_json::Value;

use crate::error::JsonRpcError;
use crate::handler::RpcContext;
use crate::types::format_u64;
use crate::validator::{validate, Param};

const NO_ARGS: &[Param] = &[];

/// net_version - Returns the network ID
pub async fn net_version(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    // network id is the chain id, in decimal
    Ok(Value::String(ctx.provider.chain_id().await?.to_string()))
}

/// net_listening - Returns true if client is actively listening
pub async fn net_listening(
    _ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::Bool(true))
}

/// net_peerCount - Returns number of peers
pub async fn net_peer_count(
    _ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    // the gateway is not a p2p node
    Ok(Value::String(format_u64(0)))
}
