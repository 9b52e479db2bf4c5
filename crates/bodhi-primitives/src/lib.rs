//! # bodhi-primitives
//!
//! Primitive types shared by the bodhi gateway crates.
//!
//! Addresses display as EIP-55 checksums and serialize as lowercase `0x`
//! strings, the form Ethereum JSON-RPC clients expect on the wire.

#![warn(missing_docs)]
#![warn(clippy::all)]

mod address;
mod error;
mod hash;

pub use address::{Address, AddressError};
pub use error::PrimitiveError;
pub use hash::{HashError, H256};

// Re-export primitive-types for U256
pub use primitive_types::U256;

/// Block number type
pub type BlockNumber = u64;

/// Minimal big-endian bytes of a U256 (empty for zero)
pub fn u256_to_be_trimmed(value: &U256) -> Vec<u8> {
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    let start = buf.iter().position(|&b| b != 0).unwrap_or(32);
    buf[start..].to_vec()
}

/// Format a U256 as a `0x` quantity (no leading zeros, `0x0` for zero)
pub fn format_quantity(value: &U256) -> String {
    format!("0x{:x}", value)
}

/// Parse a `0x`-prefixed hex quantity
pub fn parse_quantity(s: &str) -> Result<U256, PrimitiveError> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| PrimitiveError::Quantity(format!("missing 0x prefix: {}", s)))?;
    if digits.is_empty() || digits.len() > 64 {
        return Err(PrimitiveError::Quantity(s.to_string()));
    }
    U256::from_str_radix(digits, 16).map_err(|e| PrimitiveError::Quantity(format!("{}: {:?}", s, e)))
}
