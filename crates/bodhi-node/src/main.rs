//! Bodhi gateway binary
//!
//! Runs the Ethereum JSON-RPC gateway against an in-memory development chain.

mod cli;
mod config;

use anyhow::{Context, Result};
use bodhi_primitives::{H256, U256};
use bodhi_rpc::{
    DevConfig, DevProvider, FilterConfig, RpcContext, RpcHandler, RpcServer, ServerConfig,
};
use bodhi_tx::FeeDelegationContext;
use cli::Cli;
use config::{parse_number, GenesisConfig};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let json_layer = cli.log_json.then(|| fmt::layer().json());
    let text_layer = (!cli.log_json).then(fmt::layer);

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();

    tracing::info!("Bodhi gateway starting...");

    let genesis = match &cli.config {
        Some(path) => load_genesis_file(path)?,
        None => GenesisConfig::default(),
    };
    let fee_context = fee_context(&cli)?;
    let provider = Arc::new(DevProvider::new(dev_config(&cli, &genesis, fee_context.clone())?));
    tracing::info!(chain_id = cli.chain_id, accounts = genesis.alloc.len(), "Dev chain ready");

    let ctx = Arc::new(RpcContext::new(
        provider.clone(),
        fee_context,
        FilterConfig {
            max_filters: cli.max_filters,
            filter_timeout: Duration::from_secs(cli.filter_timeout_secs),
        },
    ));
    let server_config = server_config(&cli);
    let handler = RpcHandler::with_config(ctx, server_config.handler_config());
    let server = RpcServer::new(server_config, handler);

    // Interval sealing keeps filters and subscriptions moving without traffic
    if cli.block_time_secs > 0 {
        let provider = Arc::clone(&provider);
        let period = Duration::from_secs(cli.block_time_secs);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                let block = provider.seal_block(Vec::new());
                tracing::debug!(number = block.number, "Sealed empty block");
            }
        });
    }

    tokio::select! {
        result = server.run() => result.context("RPC server failed")?,
        _ = tokio::signal::ctrl_c() => tracing::info!("Shutdown signal received"),
    }

    tracing::info!("Bodhi gateway stopped");

    Ok(())
}

/// Load genesis configuration from file
fn load_genesis_file(path: &std::path::Path) -> Result<GenesisConfig> {
    tracing::info!("Loading genesis from {:?}", path);
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let genesis: GenesisConfig = serde_json::from_str(&content)?;
    Ok(genesis)
}

/// Fee-delegation defaults shared by the codec and the dev chain
fn fee_context(cli: &Cli) -> Result<FeeDelegationContext> {
    let salt = match &cli.eip712_salt {
        Some(salt) => H256::from_hex(salt).context("invalid --eip712-salt")?,
        None => H256::ZERO,
    };
    Ok(FeeDelegationContext {
        salt,
        storage_limit: U256::from(cli.storage_limit),
        valid_until: U256::from(cli.valid_until),
        ..Default::default()
    })
}

fn dev_config(
    cli: &Cli,
    genesis: &GenesisConfig,
    fee_context: FeeDelegationContext,
) -> Result<DevConfig> {
    let mut config = DevConfig {
        chain_id: cli.chain_id,
        finality_lag: cli.finality_lag,
        genesis_timestamp: genesis.timestamp,
        alloc: genesis.accounts()?,
        fee_context,
        ..Default::default()
    };
    if let Some(gas_limit) = &genesis.gas_limit {
        config.block_gas_limit = parse_number(gas_limit)?;
    }
    if let Some(gas_price) = &genesis.gas_price {
        config.gas_price = parse_number(gas_price)?;
    }
    Ok(config)
}

fn server_config(cli: &Cli) -> ServerConfig {
    ServerConfig {
        ws_addr: cli.ws_addr,
        ipc_path: cli.ipc_path.clone(),
        max_body_size: cli.max_body_size,
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
        max_batch_size: cli.max_batch_size,
        ..ServerConfig::new(cli.http_addr)
    }
}
