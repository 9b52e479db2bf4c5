//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bodhi_crypto::{keccak256, public_key_to_address};
use bodhi_primitives::{Address, H256, U256};
use bodhi_rpc::provider::{
    Block, ChainEvent, Log, LogQuery, ProviderResult, Receipt, StateRef, TransactionInfo,
};
use bodhi_rpc::{
    CallRequest, DevConfig, DevProvider, FilterConfig, GenesisAccount, Provider, RpcContext,
    RpcHandler,
};
use bodhi_tx::FeeDelegationContext;
use bytes::Bytes;
use k256::ecdsa::SigningKey;
use parking_lot::Mutex;
use tokio::sync::broadcast;

pub fn key(byte: u8) -> SigningKey {
    SigningKey::from_bytes(&[byte; 32].into()).unwrap()
}

pub fn address_of(key: &SigningKey) -> Address {
    public_key_to_address(key.verifying_key())
}

/// Dev chain with `accounts` funded at genesis
pub fn dev_provider(accounts: &[Address]) -> DevProvider {
    let alloc: HashMap<Address, GenesisAccount> = accounts
        .iter()
        .map(|address| {
            (
                *address,
                GenesisAccount {
                    balance: U256::from(10u64).pow(U256::from(21u64)),
                    ..Default::default()
                },
            )
        })
        .collect();
    DevProvider::new(DevConfig {
        alloc,
        ..Default::default()
    })
}

pub fn handler_for(provider: Arc<dyn Provider>) -> RpcHandler {
    RpcHandler::new(Arc::new(RpcContext::new(
        provider,
        FeeDelegationContext::default(),
        FilterConfig::default(),
    )))
}

/// Dev chain wrapper that can stall balance reads and record submissions
pub struct TestProvider {
    pub inner: DevProvider,
    pub slow: Option<(Address, Duration)>,
    /// Accept every submission without executing it
    pub accept_all: bool,
    pub submitted: Mutex<Vec<Vec<u8>>>,
}

impl TestProvider {
    pub fn new(inner: DevProvider) -> Self {
        Self {
            inner,
            slow: None,
            accept_all: false,
            submitted: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Provider for TestProvider {
    async fn chain_id(&self) -> ProviderResult<u64> {
        self.inner.chain_id().await
    }

    async fn block_number(&self) -> ProviderResult<u64> {
        self.inner.block_number().await
    }

    async fn finalized_number(&self) -> ProviderResult<u64> {
        self.inner.finalized_number().await
    }

    async fn block_hash(&self, number: u64) -> ProviderResult<Option<H256>> {
        self.inner.block_hash(number).await
    }

    async fn block_number_of(&self, hash: &H256) -> ProviderResult<Option<u64>> {
        self.inner.block_number_of(hash).await
    }

    async fn block(&self, at: &StateRef, full: bool) -> ProviderResult<Option<Block>> {
        self.inner.block(at, full).await
    }

    async fn balance(&self, address: &Address, at: &StateRef) -> ProviderResult<U256> {
        if let Some((slow, delay)) = self.slow {
            if slow == *address {
                tokio::time::sleep(delay).await;
            }
        }
        self.inner.balance(address, at).await
    }

    async fn transaction_count(&self, address: &Address, at: &StateRef) -> ProviderResult<U256> {
        self.inner.transaction_count(address, at).await
    }

    async fn code(&self, address: &Address, at: &StateRef) -> ProviderResult<Bytes> {
        self.inner.code(address, at).await
    }

    async fn storage_at(
        &self,
        address: &Address,
        slot: &H256,
        at: &StateRef,
    ) -> ProviderResult<H256> {
        self.inner.storage_at(address, slot, at).await
    }

    async fn call(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<Bytes> {
        self.inner.call(request, at).await
    }

    async fn estimate_gas(&self, request: &CallRequest, at: &StateRef) -> ProviderResult<U256> {
        self.inner.estimate_gas(request, at).await
    }

    async fn gas_price(&self) -> ProviderResult<U256> {
        self.inner.gas_price().await
    }

    async fn max_priority_fee(&self) -> ProviderResult<U256> {
        self.inner.max_priority_fee().await
    }

    async fn send_raw_transaction(&self, raw: &[u8]) -> ProviderResult<H256> {
        self.submitted.lock().push(raw.to_vec());
        if self.accept_all {
            return Ok(keccak256(raw));
        }
        self.inner.send_raw_transaction(raw).await
    }

    async fn logs(&self, query: &LogQuery) -> ProviderResult<Vec<Log>> {
        self.inner.logs(query).await
    }

    async fn transaction_by_hash(&self, hash: &H256) -> ProviderResult<Option<TransactionInfo>> {
        self.inner.transaction_by_hash(hash).await
    }

    async fn transaction_receipt(&self, hash: &H256) -> ProviderResult<Option<Receipt>> {
        self.inner.transaction_receipt(hash).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ChainEvent> {
        self.inner.subscribe()
    }
}
