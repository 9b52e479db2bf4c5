//! # bodhi-tx
//!
//! The transaction codec of the bodhi gateway.
//!
//! This crate provides:
//! - [`Transaction`] - a sum type over legacy, EIP-2930, EIP-1559 and
//!   fee-delegated (`0x60`) transactions
//! - [`decode`] / [`encode`] - wire codec with signer recovery
//! - [`digest`] - the variant-specific signing hash (EIP-712 for `0x60`)
//! - [`sign`] / [`sign_transaction`] - local signing

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod eip712;
mod error;
mod signer;
pub mod transaction;

pub use codec::{
    decode, decode_with, digest, encode, encode_signed, recover_sender, recover_signer,
    transaction_hash, tx_type_of,
};
pub use error::{TxError, TxResult};
pub use signer::{sign, sign_transaction};
pub use transaction::{
    AccessListItem, AccessListTx, DynamicFeeTx, FeeDelegatedTx, FeeDelegationContext, LegacyTx,
    Transaction, TxEnvelope, TxSignature, TxType,
};
