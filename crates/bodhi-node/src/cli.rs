//! CLI argument parsing for the bodhi gateway

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;

/// Ethereum JSON-RPC gateway for Acala EVM chains
#[derive(Parser, Debug, Clone)]
#[command(name = "bodhi")]
#[command(about = "Ethereum JSON-RPC gateway for Acala EVM chains")]
#[command(version)]
pub struct Cli {
    /// HTTP listen address (also accepts WebSocket upgrades)
    #[arg(long, default_value = "0.0.0.0:8545")]
    pub http_addr: SocketAddr,

    /// Dedicated WebSocket listen address (defaults to the HTTP listener)
    #[arg(long)]
    pub ws_addr: Option<SocketAddr>,

    /// Unix socket path for IPC clients
    #[arg(long)]
    pub ipc_path: Option<PathBuf>,

    /// Chain ID
    #[arg(long, default_value = "595")]
    pub chain_id: u64,

    /// Largest accepted batch
    #[arg(long, default_value = "50")]
    pub max_batch_size: usize,

    /// Largest accepted request body in bytes
    #[arg(long, default_value = "10485760")]
    pub max_body_size: usize,

    /// Per-request timeout in seconds
    #[arg(long, default_value = "30")]
    pub request_timeout_secs: u64,

    /// Maximum number of installed poll filters
    #[arg(long, default_value = "500")]
    pub max_filters: usize,

    /// Seconds an unpolled filter survives
    #[arg(long, default_value = "300")]
    pub filter_timeout_secs: u64,

    /// EIP-712 domain salt for fee-delegated transactions (32-byte hex)
    #[arg(long)]
    pub eip712_salt: Option<String>,

    /// Default storage limit for fee-delegated transactions
    #[arg(long, default_value = "64000")]
    pub storage_limit: u64,

    /// Default validity bound for fee-delegated transactions
    #[arg(long, default_value = "4294967295")]
    pub valid_until: u64,

    /// Genesis allocation file (JSON)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Seal an empty block every N seconds (0 disables)
    #[arg(long, default_value = "0")]
    pub block_time_secs: u64,

    /// Blocks between best and finalized
    #[arg(long, default_value = "0")]
    pub finality_lag: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub log_json: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
