//! Codec error types

use bodhi_crypto::CryptoError;
use bodhi_rlp::RlpError;
use thiserror::Error;

/// Transaction codec errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TxError {
    /// Leading byte is not a known transaction type
    #[error("unsupported transaction type: 0x{0:02x}")]
    UnsupportedType(u8),

    /// Bad RLP structure, wrong field count or non-canonical integer
    #[error("malformed rlp: {0}")]
    MalformedRlp(String),

    /// Integer field wider than 32 bytes
    #[error("field too large: {0}")]
    FieldTooLarge(&'static str),

    /// Signature does not recover to a sender
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    /// Local signing failed (bad key)
    #[error("signing failed: {0}")]
    Signing(String),
}

impl TxError {
    /// Authentication failures, as opposed to parse failures
    pub fn is_authentication(&self) -> bool {
        matches!(self, TxError::InvalidSignature(_))
    }
}

impl From<RlpError> for TxError {
    fn from(e: RlpError) -> Self {
        match e {
            RlpError::Malformed(msg) => TxError::MalformedRlp(msg),
            RlpError::FieldTooLarge { field, .. } => TxError::FieldTooLarge(field),
        }
    }
}

impl From<CryptoError> for TxError {
    fn from(e: CryptoError) -> Self {
        match e {
            CryptoError::SigningFailed(_) | CryptoError::InvalidPrivateKey => {
                TxError::Signing(e.to_string())
            }
            other => TxError::InvalidSignature(other.to_string()),
        }
    }
}

/// Result alias for codec operations
pub type TxResult<T> = Result<T, TxError>;
