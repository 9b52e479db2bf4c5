//! Request handler and method dispatcher

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use bodhi_tx::FeeDelegationContext;
use serde_json::Value;
use tokio::task::JoinHandle;

use crate::error::{error_code, JsonRpcError};
use crate::filters::{FilterConfig, FilterManager};
use crate::methods::{eth, filter, net, web3};
use crate::provider::Provider;
use crate::session::Session;
use crate::subscriptions::SubscriptionManager;
use crate::types::{JsonRpcId, JsonRpcRequest, JsonRpcResponse};

/// Boxed future returned by every method
pub type MethodFuture = Pin<Box<dyn Future<Output = Result<Value, JsonRpcError>> + Send>>;

/// Type alias for async method handler
pub type MethodFn = Box<dyn Fn(Arc<RpcContext>, Vec<Value>) -> MethodFuture + Send + Sync>;

/// Handler for methods that need the caller's connection
pub type SessionMethodFn =
    Box<dyn Fn(Arc<RpcContext>, Session, Vec<Value>) -> MethodFuture + Send + Sync>;

/// Namespaces reachable through the router
const NAMESPACES: [&str; 3] = ["eth_", "net_", "web3_"];

enum Handler {
    Plain(MethodFn),
    Session(SessionMethodFn),
}

/// Shared context for RPC handlers
pub struct RpcContext {
    /// Chain data
    pub provider: Arc<dyn Provider>,
    /// Values for fee-delegated digests
    pub fee_context: FeeDelegationContext,
    /// Installed poll filters
    pub filters: Arc<FilterManager>,
    /// Live push subscriptions
    pub subscriptions: Arc<SubscriptionManager>,
}

impl RpcContext {
    /// Create a new RPC context
    pub fn new(
        provider: Arc<dyn Provider>,
        fee_context: FeeDelegationContext,
        filter_config: FilterConfig,
    ) -> Self {
        Self {
            provider,
            fee_context,
            filters: Arc::new(FilterManager::new(filter_config)),
            subscriptions: Arc::new(SubscriptionManager::new()),
        }
    }

    /// Start the filter sweeper and the subscription dispatcher
    pub fn spawn_background_tasks(&self) -> Vec<JoinHandle<()>> {
        vec![
            self.filters.spawn_sweeper(),
            self.subscriptions.spawn_dispatcher(self.provider.subscribe()),
        ]
    }
}

/// Method registry for dispatching RPC calls
pub struct MethodRegistry {
    methods: HashMap<String, Handler>,
}

impl Default for MethodRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl MethodRegistry {
    /// Create a new method registry with all methods registered
    pub fn new() -> Self {
        let mut registry = Self {
            methods: HashMap::new(),
        };

        // Register eth_* methods
        registry.register("eth_chainId", eth::eth_chain_id);
        registry.register("eth_blockNumber", eth::eth_block_number);
        registry.register("eth_gasPrice", eth::eth_gas_price);
        registry.register("eth_maxPriorityFeePerGas", eth::eth_max_priority_fee_per_gas);
        registry.register("eth_accounts", eth::eth_accounts);
        registry.register("eth_syncing", eth::eth_syncing);
        registry.register("eth_getBalance", eth::eth_get_balance);
        registry.register("eth_getTransactionCount", eth::eth_get_transaction_count);
        registry.register("eth_getCode", eth::eth_get_code);
        registry.register("eth_getStorageAt", eth::eth_get_storage_at);
        registry.register("eth_call", eth::eth_call);
        registry.register("eth_estimateGas", eth::eth_estimate_gas);
        registry.register("eth_sendRawTransaction", eth::eth_send_raw_transaction);
        registry.register("eth_getBlockByNumber", eth::eth_get_block_by_number);
        registry.register("eth_getBlockByHash", eth::eth_get_block_by_hash);
        registry.register(
            "eth_getBlockTransactionCountByNumber",
            eth::eth_get_block_transaction_count_by_number,
        );
        registry.register(
            "eth_getBlockTransactionCountByHash",
            eth::eth_get_block_transaction_count_by_hash,
        );
        registry.register("eth_getTransactionByHash", eth::eth_get_transaction_by_hash);
        registry.register("eth_getTransactionReceipt", eth::eth_get_transaction_receipt);
        registry.register("eth_getLogs", eth::eth_get_logs);

        // Filters and subscriptions
        registry.register("eth_newFilter", filter::eth_new_filter);
        registry.register("eth_newBlockFilter", filter::eth_new_block_filter);
        registry.register("eth_getFilterChanges", filter::eth_get_filter_changes);
        registry.register("eth_getFilterLogs", filter::eth_get_filter_logs);
        registry.register("eth_uninstallFilter", filter::eth_uninstall_filter);
        registry.register_session("eth_subscribe", filter::eth_subscribe);
        registry.register_session("eth_unsubscribe", filter::eth_unsubscribe);

        // Register net_* methods
        registry.register("net_version", net::net_version);
        registry.register("net_listening", net::net_listening);
        registry.register("net_peerCount", net::net_peer_count);

        // Register web3_* methods
        registry.register("web3_clientVersion", web3::web3_client_version);
        registry.register("web3_sha3", web3::web3_sha3);

        registry
    }

    /// Register a method handler
    pub fn register<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Arc<RpcContext>, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, JsonRpcError>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            Handler::Plain(Box::new(move |ctx, params| Box::pin(handler(ctx, params)))),
        );
    }

    /// Register a handler that only works over a persistent connection
    pub fn register_session<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Arc<RpcContext>, Session, Vec<Value>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value, JsonRpcError>> + Send + 'static,
    {
        self.methods.insert(
            name.to_string(),
            Handler::Session(Box::new(move |ctx, session, params| {
                Box::pin(handler(ctx, session, params))
            })),
        );
    }

    /// Dispatch a method call
    ///
    /// A method is reachable only if its name carries a served namespace
    /// prefix and it is registered.
    pub async fn dispatch(
        &self,
        ctx: Arc<RpcContext>,
        session: Option<Session>,
        method: &str,
        params: Vec<Value>,
    ) -> Result<Value, JsonRpcError> {
        if !NAMESPACES.iter().any(|ns| method.starts_with(ns)) {
            return Err(JsonRpcError::method_not_found(method));
        }
        match self.methods.get(method) {
            Some(Handler::Plain(handler)) => handler(ctx, params).await,
            Some(Handler::Session(handler)) => match session {
                Some(session) => handler(ctx, session, params).await,
                None => Err(JsonRpcError::new(
                    error_code::METHOD_NOT_FOUND,
                    "notifications not supported",
                )),
            },
            None => Err(JsonRpcError::method_not_found(method)),
        }
    }

    /// Check if a method is registered
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    /// Get list of registered methods
    pub fn method_names(&self) -> Vec<&str> {
        self.methods.keys().map(|s| s.as_str()).collect()
    }
}

/// Router limits
#[derive(Debug, Clone)]
pub struct HandlerConfig {
    /// Largest accepted batch
    pub max_batch_size: usize,
    /// Per-request deadline, if any
    pub request_timeout: Option<Duration>,
}

impl Default for HandlerConfig {
    fn default() -> Self {
        Self {
            max_batch_size: 50,
            request_timeout: None,
        }
    }
}

/// RPC request handler
///
/// Cheap to clone; every transport holds its own copy.
#[derive(Clone)]
pub struct RpcHandler {
    ctx: Arc<RpcContext>,
    registry: Arc<MethodRegistry>,
    config: HandlerConfig,
}

impl RpcHandler {
    /// Create a new RPC handler
    pub fn new(ctx: Arc<RpcContext>) -> Self {
        Self::with_config(ctx, HandlerConfig::default())
    }

    /// Create a handler with explicit limits
    pub fn with_config(ctx: Arc<RpcContext>, config: HandlerConfig) -> Self {
        Self::with_registry(ctx, MethodRegistry::new(), config)
    }

    /// Create a handler over a custom method table
    pub fn with_registry(
        ctx: Arc<RpcContext>,
        registry: MethodRegistry,
        config: HandlerConfig,
    ) -> Self {
        Self {
            ctx,
            registry: Arc::new(registry),
            config,
        }
    }

    /// Handle a raw request body
    ///
    /// `Err` carries the error response for a body that is not JSON at all.
    pub async fn handle_body(&self, body: &[u8], session: Option<Session>) -> Result<Value, Value> {
        match serde_json::from_slice::<Value>(body) {
            Ok(value) => Ok(self.handle_value(value, session).await),
            Err(e) => {
                tracing::debug!(error = %e, "malformed request body");
                Err(JsonRpcResponse::error(
                    JsonRpcId::Null,
                    JsonRpcError::invalid_request(format!("invalid JSON: {}", e)),
                )
                .to_value())
            }
        }
    }

    /// Handle a single request object or a batch
    pub async fn handle_value(&self, value: Value, session: Option<Session>) -> Value {
        match value {
            Value::Array(items) => {
                if items.is_empty() {
                    return invalid_request("empty batch");
                }
                if items.len() > self.config.max_batch_size {
                    return invalid_request(format!(
                        "batch size {} exceeds limit {}",
                        items.len(),
                        self.config.max_batch_size
                    ));
                }
                let responses = futures::future::join_all(
                    items
                        .into_iter()
                        .map(|item| self.handle_item(item, session.clone())),
                )
                .await;
                Value::Array(responses.iter().map(JsonRpcResponse::to_value).collect())
            }
            item => self.handle_item(item, session).await.to_value(),
        }
    }

    async fn handle_item(&self, item: Value, session: Option<Session>) -> JsonRpcResponse {
        let id = item
            .get("id")
            .and_then(|id| serde_json::from_value::<JsonRpcId>(id.clone()).ok())
            .unwrap_or_default();
        match serde_json::from_value::<JsonRpcRequest>(item) {
            Ok(request) => self.handle_request(request, session).await,
            Err(e) => JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request(format!("invalid request: {}", e)),
            ),
        }
    }

    /// Handle a JSON-RPC request
    pub async fn handle_request(
        &self,
        request: JsonRpcRequest,
        session: Option<Session>,
    ) -> JsonRpcResponse {
        let id = match request.id.clone() {
            Some(JsonRpcId::Null) | None => {
                return JsonRpcResponse::error(
                    JsonRpcId::Null,
                    JsonRpcError::invalid_request("missing request id"),
                )
            }
            Some(id) => id,
        };

        // Validate JSON-RPC version
        if request.jsonrpc != "2.0" {
            return JsonRpcResponse::error(
                id,
                JsonRpcError::invalid_request("invalid JSON-RPC version"),
            );
        }

        let params = request.positional_params();
        match self.call(request.method, params, session).await {
            Ok(result) => JsonRpcResponse::success(id, result),
            Err(error) => JsonRpcResponse::error(id, error),
        }
    }

    /// Run one method on its own task so a panic stays contained
    async fn call(
        &self,
        method: String,
        params: Vec<Value>,
        session: Option<Session>,
    ) -> Result<Value, JsonRpcError> {
        tracing::debug!(method = %method, "dispatching");
        let ctx = self.ctx.clone();
        let registry = self.registry.clone();
        let name = method.clone();
        let mut task =
            tokio::spawn(async move { registry.dispatch(ctx, session, &name, params).await });

        let joined = match self.config.request_timeout {
            Some(limit) => match tokio::time::timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_) => {
                    task.abort();
                    tracing::warn!(method = %method, "request timed out");
                    return Err(JsonRpcError::internal_error("request timed out"));
                }
            },
            None => task.await,
        };

        joined.unwrap_or_else(|e| {
            if e.is_panic() {
                tracing::error!(method = %method, "method handler panicked");
            }
            Err(JsonRpcError::internal_error("internal error"))
        })
    }

    /// Get the RPC context
    pub fn context(&self) -> &Arc<RpcContext> {
        &self.ctx
    }

    /// Router limits
    pub fn config(&self) -> &HandlerConfig {
        &self.config
    }
}

fn invalid_request(message: impl Into<String>) -> Value {
    JsonRpcResponse::error(JsonRpcId::Null, JsonRpcError::invalid_request(message)).to_value()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{DevConfig, DevProvider};
    use serde_json::json;

    fn context() -> Arc<RpcContext> {
        Arc::new(RpcContext::new(
            Arc::new(DevProvider::new(DevConfig::default())),
            FeeDelegationContext::default(),
            FilterConfig::default(),
        ))
    }

    fn handler() -> RpcHandler {
        RpcHandler::new(context())
    }

    // ===== MethodRegistry Tests =====

    #[test]
    fn test_method_registry_default_methods() {
        let registry = MethodRegistry::new();

        assert!(registry.has_method("eth_chainId"));
        assert!(registry.has_method("eth_getLogs"));
        assert!(registry.has_method("eth_subscribe"));
        assert!(registry.has_method("net_version"));
        assert!(registry.has_method("web3_clientVersion"));
        assert!(!registry.has_method("unknown_method"));
    }

    #[test]
    fn test_method_count() {
        let registry = MethodRegistry::new();
        // 27 eth + 3 net + 2 web3
        assert_eq!(registry.method_names().len(), 32);
    }

    #[tokio::test]
    async fn test_registered_method_outside_namespace_unreachable() {
        let mut registry = MethodRegistry::new();

        async fn custom_handler(
            _ctx: Arc<RpcContext>,
            _params: Vec<Value>,
        ) -> Result<Value, JsonRpcError> {
            Ok(Value::String("custom".to_string()))
        }

        registry.register("debug_custom", custom_handler);
        registry.register("eth_custom", custom_handler);
        assert!(registry.has_method("debug_custom"));

        let err = registry
            .dispatch(context(), None, "debug_custom", vec![])
            .await
            .unwrap_err();
        assert_eq!(err.code, error_code::METHOD_NOT_FOUND);
        let ok = registry.dispatch(context(), None, "eth_custom", vec![]).await;
        assert_eq!(ok.unwrap(), json!("custom"));
    }

    #[tokio::test]
    async fn test_session_method_over_http() {
        let response = handler()
            .handle_value(
                json!({"jsonrpc": "2.0", "id": 1, "method": "eth_subscribe", "params": ["newHeads"]}),
                None,
            )
            .await;
        assert_eq!(response["error"]["code"], error_code::METHOD_NOT_FOUND);
        assert_eq!(response["error"]["message"], "notifications not supported");
    }

    // ===== Envelope Tests =====

    #[tokio::test]
    async fn test_single_request() {
        let response = handler()
            .handle_value(json!({"jsonrpc": "2.0", "id": "a", "method": "eth_chainId"}), None)
            .await;
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": "a", "result": "0x253"}));
    }

    #[tokio::test]
    async fn test_envelope_errors() {
        let handler = handler();

        let missing_id = handler
            .handle_value(json!({"jsonrpc": "2.0", "method": "eth_chainId"}), None)
            .await;
        assert_eq!(missing_id["error"]["code"], error_code::INVALID_REQUEST);
        assert_eq!(missing_id["id"], Value::Null);

        let bad_version = handler
            .handle_value(json!({"jsonrpc": "1.0", "id": 3, "method": "eth_chainId"}), None)
            .await;
        assert_eq!(bad_version["error"]["code"], error_code::INVALID_REQUEST);
        assert_eq!(bad_version["id"], 3);

        let no_method = handler.handle_value(json!({"jsonrpc": "2.0", "id": 4}), None).await;
        assert_eq!(no_method["error"]["code"], error_code::INVALID_REQUEST);
        assert_eq!(no_method["id"], 4);

        let unknown = handler
            .handle_value(json!({"jsonrpc": "2.0", "id": 5, "method": "eth_foo"}), None)
            .await;
        assert_eq!(unknown["error"]["code"], error_code::METHOD_NOT_FOUND);

        let scalar = handler.handle_value(json!(42), None).await;
        assert_eq!(scalar["error"]["code"], error_code::INVALID_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_body() {
        let err = handler().handle_body(b"{\"jsonrpc\":", None).await.unwrap_err();
        assert_eq!(err["error"]["code"], error_code::INVALID_REQUEST);
        assert_eq!(err["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_object_params_become_single_argument() {
        let response = handler()
            .handle_value(
                json!({"jsonrpc": "2.0", "id": 1, "method": "eth_getLogs", "params": {"fromBlock": "earliest"}}),
                None,
            )
            .await;
        assert_eq!(response["result"], json!([]));
    }

    // ===== Batch Tests =====

    #[tokio::test]
    async fn test_batch_limits() {
        let handler = RpcHandler::with_config(
            context(),
            HandlerConfig {
                max_batch_size: 2,
                ..Default::default()
            },
        );
        let item = json!({"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"});

        let response = handler.handle_value(json!([item, item, item]), None).await;
        assert!(response.is_object());
        assert_eq!(response["error"]["code"], error_code::INVALID_REQUEST);

        let response = handler.handle_value(json!([]), None).await;
        assert_eq!(response["error"]["code"], error_code::INVALID_REQUEST);

        let response = handler.handle_value(json!([item, item]), None).await;
        assert_eq!(response.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_bad_item_does_not_abort_batch() {
        let response = handler()
            .handle_value(
                json!([
                    {"jsonrpc": "2.0", "id": 1, "method": "eth_chainId"},
                    {"id": 2},
                    {"jsonrpc": "2.0", "id": 3, "method": "eth_getBalance", "params": []},
                    {"jsonrpc": "2.0", "id": 4, "method": "net_version"},
                ]),
                None,
            )
            .await;
        let items = response.as_array().unwrap();
        assert_eq!(items[0]["result"], "0x253");
        assert_eq!(items[1]["error"]["code"], error_code::INVALID_REQUEST);
        assert_eq!(items[2]["error"]["code"], error_code::INVALID_PARAMS);
        assert_eq!(items[3]["result"], "595");
    }

    // ===== Containment Tests =====

    #[tokio::test]
    async fn test_panic_becomes_internal_error() {
        let mut registry = MethodRegistry::new();

        async fn exploding(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> Result<Value, JsonRpcError> {
            panic!("boom")
        }

        registry.register("eth_explode", exploding);
        let handler = RpcHandler::with_registry(context(), registry, HandlerConfig::default());
        let response = handler
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "eth_explode"}), None)
            .await;
        assert_eq!(response["error"]["code"], error_code::INTERNAL_ERROR);
        assert_eq!(response["error"]["message"], "internal error");
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_timeout() {
        let mut registry = MethodRegistry::new();

        async fn stalls(_ctx: Arc<RpcContext>, _params: Vec<Value>) -> Result<Value, JsonRpcError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(Value::Null)
        }

        registry.register("eth_stall", stalls);
        let handler = RpcHandler::with_registry(
            context(),
            registry,
            HandlerConfig {
                request_timeout: Some(Duration::from_secs(1)),
                ..Default::default()
            },
        );
        let response = handler
            .handle_value(json!({"jsonrpc": "2.0", "id": 1, "method": "eth_stall"}), None)
            .await;
        assert_eq!(response["error"]["message"], "request timed out");
    }
}
