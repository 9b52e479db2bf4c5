//! Filter and subscription methods (eth_newFilter, eth_subscribe, ...)

use std::sync::Arc;

use serde_json::Value;

use crate::error::JsonRpcError;
use crate::filters::{FilterKind, LogFilter};
use crate::handler::RpcContext;
use crate::session::Session;
use crate::subscriptions::SubscriptionKind;
use crate::types::logs_to_value;
use crate::validator::{validate, Param, ParamType};

const NO_ARGS: &[Param] = &[];
const FILTER_OBJECT: &[Param] = &[Param::required(ParamType::Object)];
const ID: &[Param] = &[Param::required(ParamType::Id)];
const SUBSCRIBE: &[Param] = &[
    Param::required(ParamType::Text),
    Param::optional(ParamType::Object),
];

/// Identifiers are issued lowercase; accept any case back
fn id_at(params: &[Value]) -> String {
    params[0].as_str().unwrap_or_default().to_ascii_lowercase()
}

/// eth_newFilter - Install a log filter
pub async fn eth_new_filter(ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(FILTER_OBJECT, &params)?;
    let filter = LogFilter::from_value(&params[0])?;

    let id = ctx
        .filters
        .install(FilterKind::Log(filter), ctx.provider.as_ref())
        .await?;
    Ok(Value::String(id))
}

/// eth_newBlockFilter - Install a new-block filter
pub async fn eth_new_block_filter(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    let id = ctx
        .filters
        .install(FilterKind::Block, ctx.provider.as_ref())
        .await?;
    Ok(Value::String(id))
}

/// eth_getFilterChanges - Drain a filter
pub async fn eth_get_filter_changes(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ID, &params)?;
    let changes = ctx
        .filters
        .changes(&id_at(&params), ctx.provider.as_ref())
        .await?;
    changes.to_value()
}

/// eth_getFilterLogs - Every log in a log filter's range
pub async fn eth_get_filter_logs(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ID, &params)?;
    let logs = ctx
        .filters
        .logs(&id_at(&params), ctx.provider.as_ref())
        .await?;
    logs_to_value(&logs)
}

/// eth_uninstallFilter - Remove a filter
pub async fn eth_uninstall_filter(
    ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ID, &params)?;
    Ok(Value::Bool(ctx.filters.uninstall(&id_at(&params))))
}

/// eth_subscribe - Start pushing events to this connection
pub async fn eth_subscribe(
    ctx: Arc<RpcContext>,
    session: Session,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(SUBSCRIBE, &params)?;
    let kind = SubscriptionKind::parse(&params)?;
    Ok(Value::String(ctx.subscriptions.subscribe(&session, kind)))
}

/// eth_unsubscribe - Stop a subscription owned by this connection
pub async fn eth_unsubscribe(
    ctx: Arc<RpcContext>,
    session: Session,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(ID, &params)?;
    Ok(Value::Bool(
        ctx.subscriptions.unsubscribe(&session, &id_at(&params)),
    ))
}
