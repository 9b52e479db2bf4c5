//! # bodhi-crypto
//!
//! Cryptographic primitives used by the transaction codec.
//!
//! - Keccak-256 hashing
//! - ECDSA signing over secp256k1 (low-s normalised, EIP-2)
//! - Signer recovery and address derivation

#![warn(missing_docs)]
#![warn(clippy::all)]

mod error;
mod hash;
mod signature;

pub use error::CryptoError;
pub use hash::{keccak256, keccak256_concat};
pub use signature::{
    private_key_from_hex, public_key_to_address, recover_address, recover_public_key, sign,
    PrivateKey, PublicKey, Signature,
};
