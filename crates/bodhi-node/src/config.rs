//! Genesis configuration for the development chain

use bodhi_primitives::{Address, H256, U256};
use bodhi_rpc::GenesisAccount as DevAccount;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Genesis file errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Unparseable account address
    #[error("invalid address {0}")]
    Address(String),

    /// Unparseable number
    #[error("invalid number {0}")]
    Number(String),

    /// Unparseable hex data
    #[error("invalid hex {0}")]
    Hex(String),

    /// Storage key or value longer than 32 bytes
    #[error("invalid storage word {0}")]
    StorageWord(String),
}

/// Genesis configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisConfig {
    /// Initial account allocations
    #[serde(default)]
    pub alloc: HashMap<String, GenesisAccount>,
    /// Genesis timestamp
    #[serde(default)]
    pub timestamp: u64,
    /// Block gas limit (hex or decimal)
    #[serde(default)]
    pub gas_limit: Option<String>,
    /// Gas price reported to clients (hex or decimal)
    #[serde(default)]
    pub gas_price: Option<String>,
}

impl GenesisConfig {
    /// Convert the string-typed allocation into dev-chain accounts
    pub fn accounts(&self) -> Result<HashMap<Address, DevAccount>, ConfigError> {
        self.alloc
            .iter()
            .map(|(address, account)| {
                let address = Address::from_hex(address.trim())
                    .map_err(|_| ConfigError::Address(address.clone()))?;
                Ok((address, account.to_dev_account()?))
            })
            .collect()
    }
}

/// Genesis account allocation
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Account balance (hex or decimal string)
    #[serde(default)]
    pub balance: String,
    /// Account nonce
    #[serde(default)]
    pub nonce: u64,
    /// Contract code (hex string)
    #[serde(default)]
    pub code: Option<String>,
    /// Storage (slot -> value mapping)
    #[serde(default)]
    pub storage: HashMap<String, String>,
}

impl GenesisAccount {
    /// Parse balance from hex or decimal string
    pub fn parse_balance(&self) -> Result<U256, ConfigError> {
        parse_number(&self.balance)
    }

    /// Parse code from hex string
    pub fn parse_code(&self) -> Result<Bytes, ConfigError> {
        match &self.code {
            Some(code) => parse_hex(code).map(Bytes::from),
            None => Ok(Bytes::new()),
        }
    }

    /// Parse storage entries, left-padding short words
    pub fn parse_storage(&self) -> Result<HashMap<H256, H256>, ConfigError> {
        self.storage
            .iter()
            .map(|(key, value)| Ok((parse_word(key)?, parse_word(value)?)))
            .collect()
    }

    fn to_dev_account(&self) -> Result<DevAccount, ConfigError> {
        Ok(DevAccount {
            balance: self.parse_balance()?,
            nonce: U256::from(self.nonce),
            code: self.parse_code()?,
            storage: self.parse_storage()?,
        })
    }
}

/// Parse a hex (`0x`) or decimal number; empty means zero
pub fn parse_number(s: &str) -> Result<U256, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Ok(U256::zero());
    }
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(digits) => U256::from_str_radix(digits, 16).ok(),
        None => U256::from_dec_str(s).ok(),
    };
    parsed.ok_or_else(|| ConfigError::Number(s.to_string()))
}

fn parse_hex(s: &str) -> Result<Vec<u8>, ConfigError> {
    let s = s.trim();
    hex::decode(s.strip_prefix("0x").unwrap_or(s)).map_err(|_| ConfigError::Hex(s.to_string()))
}

fn parse_word(s: &str) -> Result<H256, ConfigError> {
    let bytes = parse_hex(s)?;
    H256::left_padded(&bytes).map_err(|_| ConfigError::StorageWord(s.to_string()))
}
