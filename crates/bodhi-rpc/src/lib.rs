//! # bodhi-rpc
//!
//! Ethereum JSON-RPC 2.0 gateway for Acala/Karura EVM chains.
//!
//! Requests arrive over HTTP, WebSocket or a Unix socket, are validated,
//! have their block tags resolved and are answered by a [`Provider`] that
//! owns the chain data. Raw transactions are decoded locally, including the
//! chain's fee-delegated type.
//!
//! ## Features
//!
//! - Full JSON-RPC 2.0 support, including batches
//! - Ethereum-compatible `eth_*` methods with per-method `pending` handling
//! - Poll filters and WebSocket/IPC subscriptions
//! - Network information via `net_*` methods
//! - Utility methods via `web3_*` methods
//! - An in-memory [`DevProvider`] for standalone use
//!
//! ## Usage
//!
//! ```ignore
//! use bodhi_rpc::{DevConfig, DevProvider, FilterConfig, RpcContext, RpcHandler, RpcServer, ServerConfig};
//! use std::sync::Arc;
//!
//! let provider = Arc::new(DevProvider::new(DevConfig::default()));
//! let ctx = Arc::new(RpcContext::new(provider, Default::default(), FilterConfig::default()));
//!
//! let config = ServerConfig::default();
//! let handler = RpcHandler::with_config(ctx, config.handler_config());
//! RpcServer::new(config, handler).run().await?;
//! ```
//!
//! ## Supported Methods
//!
//! ### eth_* Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | `eth_chainId` | Returns the chain ID |
//! | `eth_blockNumber` | Returns the current block number |
//! | `eth_gasPrice` | Returns the current gas price |
//! | `eth_maxPriorityFeePerGas` | Returns the suggested priority fee |
//! | `eth_accounts` | Always empty |
//! | `eth_syncing` | Always `false` |
//! | `eth_getBalance` | Returns the balance of an account |
//! | `eth_getTransactionCount` | Returns the nonce of an account |
//! | `eth_getCode` | Returns the code at an address |
//! | `eth_getStorageAt` | Returns storage value at a position |
//! | `eth_call` | Executes a call without creating a transaction |
//! | `eth_estimateGas` | Estimates gas for a transaction |
//! | `eth_sendRawTransaction` | Submits a raw transaction |
//! | `eth_getBlockByNumber` | Returns block by number |
//! | `eth_getBlockByHash` | Returns block by hash |
//! | `eth_getBlockTransactionCountByNumber` | Transaction count by block number |
//! | `eth_getBlockTransactionCountByHash` | Transaction count by block hash |
//! | `eth_getTransactionByHash` | Returns transaction by hash |
//! | `eth_getTransactionReceipt` | Returns transaction receipt |
//! | `eth_getLogs` | Returns logs matching a filter |
//! | `eth_newFilter` | Installs a log filter |
//! | `eth_newBlockFilter` | Installs a block filter |
//! | `eth_getFilterChanges` | Drains a filter |
//! | `eth_getFilterLogs` | Replays a log filter's range |
//! | `eth_uninstallFilter` | Removes a filter |
//! | `eth_subscribe` | Starts a push subscription (WebSocket/IPC) |
//! | `eth_unsubscribe` | Stops a push subscription |
//!
//! ### net_* Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | `net_version` | Returns the network ID |
//! | `net_listening` | Returns true if listening |
//! | `net_peerCount` | Returns the number of peers |
//!
//! ### web3_* Methods
//!
//! | Method | Description |
//! |--------|-------------|
//! | `web3_clientVersion` | Returns the client version |
//! | `web3_sha3` | Returns Keccak-256 hash of data |

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod block_tag;
pub mod error;
pub mod filters;
pub mod handler;
#[cfg(unix)]
pub mod ipc;
pub mod methods;
pub mod provider;
pub mod server;
pub mod session;
pub mod subscriptions;
pub mod types;
pub mod validator;

// Re-export main types
pub use block_tag::{BlockTag, PendingPolicy};
pub use error::{JsonRpcError, RpcError, RpcResult};
pub use filters::{FilterConfig, FilterManager};
pub use handler::{HandlerConfig, MethodRegistry, RpcContext, RpcHandler};
pub use provider::{
    ChainEvent, DevConfig, DevLog, DevProvider, GenesisAccount, Provider, ProviderError,
};
pub use server::{RpcServer, ServerConfig};
pub use session::Session;
pub use subscriptions::SubscriptionManager;
pub use types::{
    CallRequest, CallRequestRaw, JsonRpcId, JsonRpcRequest, JsonRpcResponse, RpcBlock, RpcLog,
    RpcReceipt, RpcTransaction,
};
