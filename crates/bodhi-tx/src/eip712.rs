//! EIP-712 typed-data hashing for fee-delegated transactions
//!
//! The signed message is
//! `keccak256(0x19 0x01 || domainSeparator || hashStruct(Transaction))`,
//! never the RLP bytes that carry the transaction on the wire.

use bodhi_crypto::{keccak256, keccak256_concat};
use bodhi_primitives::{Address, H256, U256};

use crate::transaction::FeeDelegatedTx;

/// Domain name
pub const DOMAIN_NAME: &str = "Acala EVM";

/// Domain version
pub const DOMAIN_VERSION: &str = "1";

/// Encoded type of the domain struct
pub const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,bytes32 salt)";

/// Encoded type of the transaction struct
pub const TRANSACTION_TYPE: &str = "Transaction(string action,address to,uint256 nonce,uint256 tip,bytes data,uint256 value,uint256 gasLimit,uint256 storageLimit,uint256 validUntil)";

fn word(value: &U256) -> [u8; 32] {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    buf
}

fn address_word(address: &Address) -> [u8; 32] {
    let mut buf = [0u8; 32];
    buf[12..].copy_from_slice(address.as_bytes());
    buf
}

/// `hashStruct(EIP712Domain)` for a chain id and salt
pub fn domain_separator(chain_id: u64, salt: &H256) -> H256 {
    keccak256_concat(&[
        keccak256(DOMAIN_TYPE.as_bytes()).as_bytes(),
        keccak256(DOMAIN_NAME.as_bytes()).as_bytes(),
        keccak256(DOMAIN_VERSION.as_bytes()).as_bytes(),
        &word(&U256::from(chain_id)),
        salt.as_bytes(),
    ])
}

/// `"Call"` when a recipient is present, `"Create"` otherwise
pub fn action(tx: &FeeDelegatedTx) -> &'static str {
    if tx.to.is_some() {
        "Call"
    } else {
        "Create"
    }
}

/// `hashStruct(Transaction)`; a missing recipient hashes as the zero address
pub fn struct_hash(tx: &FeeDelegatedTx) -> H256 {
    let to = tx.to.unwrap_or(Address::ZERO);
    keccak256_concat(&[
        keccak256(TRANSACTION_TYPE.as_bytes()).as_bytes(),
        keccak256(action(tx).as_bytes()).as_bytes(),
        &address_word(&to),
        &word(&tx.nonce),
        &word(&tx.tip),
        keccak256(&tx.data).as_bytes(),
        &word(&tx.value),
        &word(&tx.gas_limit),
        &word(&tx.storage_limit),
        &word(&tx.valid_until),
    ])
}

/// Final signing digest
pub fn signing_hash(tx: &FeeDelegatedTx) -> H256 {
    let domain = domain_separator(tx.chain_id, &tx.salt);
    let message = struct_hash(tx);
    keccak256_concat(&[&[0x19, 0x01], domain.as_bytes(), message.as_bytes()])
}
