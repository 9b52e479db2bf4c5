//! # bodhi-rlp
//!
//! Canonical RLP (Recursive Length Prefix) helpers for the transaction codec.
//!
//! Builds on the `rlp` crate and adds the rules Ethereum transactions rely on:
//!
//! - Integers are minimal big-endian byte strings; zero is the empty string `0x80`
//! - Decoded integers must not carry leading zero bytes and must fit in 32 bytes
//! - Optional addresses are either empty (contract creation) or exactly 20 bytes
//! - Envelopes are lists of an exact arity with no trailing bytes

#![warn(missing_docs)]
#![warn(clippy::all)]

use bytes::Bytes;
use thiserror::Error;

// Re-export rlp crate for direct use
pub use rlp::{decode, encode, Decodable, DecoderError, Encodable, Rlp, RlpStream};

pub use bodhi_primitives::{u256_to_be_trimmed, Address, H256, U256};

/// RLP decoding error with field context
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RlpError {
    /// Structural problem: bad prefix, wrong arity, trailing bytes, non-canonical integer
    #[error("malformed rlp: {0}")]
    Malformed(String),

    /// Integer wider than 256 bits
    #[error("field {field} exceeds 32 bytes ({len} bytes)")]
    FieldTooLarge {
        /// Field name
        field: &'static str,
        /// Encoded length in bytes
        len: usize,
    },
}

impl From<DecoderError> for RlpError {
    fn from(e: DecoderError) -> Self {
        RlpError::Malformed(e.to_string())
    }
}

/// Result alias for RLP helpers
pub type RlpResult<T> = Result<T, RlpError>;

/// Append an integer as a minimal big-endian byte string
pub fn append_uint(stream: &mut RlpStream, value: &U256) {
    stream.append(&u256_to_be_trimmed(value));
}

/// Append a 32-byte scalar (signature r/s) with leading zeros stripped
pub fn append_scalar(stream: &mut RlpStream, value: &H256) {
    stream.append(&value.trimmed().to_vec());
}

/// Append an optional recipient; `None` encodes as the empty string
pub fn append_optional_address(stream: &mut RlpStream, to: Option<&Address>) {
    match to {
        Some(address) => stream.append(address),
        None => stream.append_empty_data(),
    };
}

/// Open `data` as a list whose item count is one of `arities`.
///
/// Returns the list and its item count. Trailing bytes after the list are rejected.
pub fn expect_list<'a>(data: &'a [u8], arities: &[usize]) -> RlpResult<(Rlp<'a>, usize)> {
    let rlp = Rlp::new(data);
    if !rlp.is_list() {
        return Err(RlpError::Malformed("expected an rlp list".to_string()));
    }
    let info = rlp.payload_info()?;
    if info.header_len + info.value_len != data.len() {
        return Err(RlpError::Malformed(format!(
            "trailing bytes after list: {} of {} consumed",
            info.header_len + info.value_len,
            data.len()
        )));
    }
    let count = rlp.item_count()?;
    if !arities.contains(&count) {
        return Err(RlpError::Malformed(format!(
            "expected {} fields, got {}",
            arities
                .iter()
                .map(|n| n.to_string())
                .collect::<Vec<_>>()
                .join(" or "),
            count
        )));
    }
    Ok((rlp, count))
}

/// Raw bytes of a data item
pub fn decode_bytes(rlp: &Rlp, index: usize) -> RlpResult<Bytes> {
    let item = rlp.at(index)?;
    Ok(Bytes::copy_from_slice(item.data()?))
}

/// Canonical unsigned integer of at most 32 bytes
pub fn decode_uint(rlp: &Rlp, index: usize, field: &'static str) -> RlpResult<U256> {
    let item = rlp.at(index)?;
    let data = item.data()?;
    if data.len() > 32 {
        return Err(RlpError::FieldTooLarge {
            field,
            len: data.len(),
        });
    }
    if data.first() == Some(&0) {
        return Err(RlpError::Malformed(format!(
            "{} has leading zero bytes",
            field
        )));
    }
    Ok(U256::from_big_endian(data))
}

/// Canonical integer that must fit in a u64 (chain id, v)
pub fn decode_u64(rlp: &Rlp, index: usize, field: &'static str) -> RlpResult<u64> {
    let value = decode_uint(rlp, index, field)?;
    if value > U256::from(u64::MAX) {
        return Err(RlpError::FieldTooLarge {
            field,
            len: u256_to_be_trimmed(&value).len(),
        });
    }
    Ok(value.low_u64())
}

/// 32-byte scalar stored with leading zeros stripped; returned zero-padded
pub fn decode_scalar(rlp: &Rlp, index: usize, field: &'static str) -> RlpResult<H256> {
    let value = decode_uint(rlp, index, field)?;
    let mut buf = [0u8; 32];
    value.to_big_endian(&mut buf);
    Ok(H256::from_bytes(buf))
}

/// Recipient: empty for contract creation, otherwise exactly 20 bytes
pub fn decode_optional_address(rlp: &Rlp, index: usize) -> RlpResult<Option<Address>> {
    let item = rlp.at(index)?;
    let data = item.data()?;
    match data.len() {
        0 => Ok(None),
        20 => Ok(Some(
            Address::from_slice(data).map_err(|e| RlpError::Malformed(e.to_string()))?,
        )),
        n => Err(RlpError::Malformed(format!("invalid to address length: {}", n))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(value: &U256) -> Vec<u8> {
        let mut stream = RlpStream::new_list(1);
        append_uint(&mut stream, value);
        stream.out().to_vec()
    }

    #[test]
    fn test_zero_is_empty_string() {
        assert_eq!(single(&U256::zero()), vec![0xc1, 0x80]);
    }

    #[test]
    fn test_small_integer_is_single_byte() {
        assert_eq!(single(&U256::from(0x7fu64)), vec![0xc1, 0x7f]);
        assert_eq!(single(&U256::from(0x80u64)), vec![0xc2, 0x81, 0x80]);
    }

    #[test]
    fn test_integer_has_no_leading_zeros() {
        let encoded = single(&U256::from(0x0400u64));
        assert_eq!(encoded, vec![0xc3, 0x82, 0x04, 0x00]);
    }

    #[test]
    fn test_scalar_is_trimmed() {
        let mut r = [0u8; 32];
        r[31] = 0x05;
        let mut stream = RlpStream::new_list(1);
        append_scalar(&mut stream, &H256::from_bytes(r));
        assert_eq!(stream.out().to_vec(), vec![0xc1, 0x05]);
    }

    #[test]
    fn test_decode_uint_rejects_leading_zero() {
        // [0x820001]
        let data = [0xc3, 0x82, 0x00, 0x01];
        let (rlp, _) = expect_list(&data, &[1]).unwrap();
        assert!(matches!(
            decode_uint(&rlp, 0, "nonce"),
            Err(RlpError::Malformed(_))
        ));
    }

    #[test]
    fn test_decode_uint_rejects_33_bytes() {
        let mut stream = RlpStream::new_list(1);
        stream.append(&vec![0x01u8; 33]);
        let data = stream.out().to_vec();
        let (rlp, _) = expect_list(&data, &[1]).unwrap();
        assert_eq!(
            decode_uint(&rlp, 0, "value"),
            Err(RlpError::FieldTooLarge {
                field: "value",
                len: 33
            })
        );
    }

    #[test]
    fn test_decode_scalar_pads() {
        let data = [0xc1, 0x05];
        let (rlp, _) = expect_list(&data, &[1]).unwrap();
        let scalar = decode_scalar(&rlp, 0, "r").unwrap();
        assert_eq!(scalar.as_bytes()[31], 0x05);
        assert!(scalar.as_bytes()[..31].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_expect_list_arity() {
        let data = [0xc2, 0x01, 0x02];
        assert!(expect_list(&data, &[2]).is_ok());
        let err = expect_list(&data, &[6, 9]).unwrap_err();
        assert_eq!(err, RlpError::Malformed("expected 6 or 9 fields, got 2".to_string()));
    }

    #[test]
    fn test_expect_list_trailing_bytes() {
        let data = [0xc2, 0x01, 0x02, 0xff];
        assert!(matches!(expect_list(&data, &[2]), Err(RlpError::Malformed(_))));
    }

    #[test]
    fn test_expect_list_not_a_list() {
        assert!(matches!(expect_list(&[0x80], &[0]), Err(RlpError::Malformed(_))));
    }

    #[test]
    fn test_optional_address() {
        let mut stream = RlpStream::new_list(2);
        append_optional_address(&mut stream, None);
        append_optional_address(&mut stream, Some(&Address::from_bytes([0x35; 20])));
        let data = stream.out().to_vec();
        let (rlp, _) = expect_list(&data, &[2]).unwrap();
        assert_eq!(decode_optional_address(&rlp, 0).unwrap(), None);
        assert_eq!(
            decode_optional_address(&rlp, 1).unwrap(),
            Some(Address::from_bytes([0x35; 20]))
        );
    }

    #[test]
    fn test_decode_u64_bounds() {
        let mut stream = RlpStream::new_list(2);
        append_uint(&mut stream, &U256::from(u64::MAX));
        append_uint(&mut stream, &(U256::from(u64::MAX) + 1));
        let data = stream.out().to_vec();
        let (rlp, _) = expect_list(&data, &[2]).unwrap();
        assert_eq!(decode_u64(&rlp, 0, "v").unwrap(), u64::MAX);
        assert!(matches!(
            decode_u64(&rlp, 1, "v"),
            Err(RlpError::FieldTooLarge { field: "v", .. })
        ));
    }
}
