//! RPC error types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::provider::ProviderError;

/// JSON-RPC error codes used by the gateway
pub mod error_code {
    /// Parse error: Invalid JSON was received
    pub const PARSE_ERROR: i64 = -32700;
    /// Invalid Request: The JSON is not a valid Request object
    pub const INVALID_REQUEST: i64 = -32600;
    /// Method not found
    pub const METHOD_NOT_FOUND: i64 = -32601;
    /// Invalid params
    pub const INVALID_PARAMS: i64 = -32602;
    /// Internal error
    pub const INTERNAL_ERROR: i64 = -32603;

    // Ethereum-specific error codes
    /// Execution error (revert)
    pub const EXECUTION_ERROR: i64 = 3;
    /// Domain errors from the chain side ("header not found", "filter not found")
    pub const APP_ERROR: i64 = 6969;
}

/// JSON-RPC error object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JsonRpcError {
    /// Error code
    pub code: i64,
    /// Error message
    pub message: String,
    /// Optional additional data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl JsonRpcError {
    /// Create a new JSON-RPC error
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// Create error with additional data
    pub fn with_data(code: i64, message: impl Into<String>, data: Value) -> Self {
        Self {
            code,
            message: message.into(),
            data: Some(data),
        }
    }

    /// Invalid request
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(error_code::INVALID_REQUEST, message)
    }

    /// Method not found
    pub fn method_not_found(method: &str) -> Self {
        Self::new(
            error_code::METHOD_NOT_FOUND,
            format!("method not found: {}", method),
        )
    }

    /// Invalid params
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(error_code::INVALID_PARAMS, message)
    }

    /// Invalid params pinned to one positional argument
    pub fn invalid_argument(index: usize, reason: impl std::fmt::Display) -> Self {
        Self::with_data(
            error_code::INVALID_PARAMS,
            format!("invalid argument {}: {}", index, reason),
            serde_json::json!({ "argument": index }),
        )
    }

    /// Internal error
    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(error_code::INTERNAL_ERROR, message)
    }

    /// Execution error (for eth_call/eth_estimateGas)
    pub fn execution_error(message: impl Into<String>) -> Self {
        Self::new(error_code::EXECUTION_ERROR, message)
    }

    /// Application error
    pub fn app_error(message: impl Into<String>) -> Self {
        Self::new(error_code::APP_ERROR, message)
    }

    /// `filter not found`
    pub fn filter_not_found() -> Self {
        Self::app_error("filter not found")
    }

    /// `header not found`
    pub fn header_not_found() -> Self {
        Self::app_error("header not found")
    }
}

impl From<ProviderError> for JsonRpcError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::NotFound(msg) => JsonRpcError::app_error(msg),
            ProviderError::Reverted { message, data } => match data {
                Some(data) => JsonRpcError::with_data(
                    error_code::EXECUTION_ERROR,
                    message,
                    Value::String(format!("0x{}", hex::encode(data))),
                ),
                None => JsonRpcError::execution_error(message),
            },
            other => JsonRpcError::internal_error(other.to_string()),
        }
    }
}

impl From<bodhi_tx::TxError> for JsonRpcError {
    fn from(e: bodhi_tx::TxError) -> Self {
        JsonRpcError::invalid_params(e.to_string())
    }
}

/// RPC server errors
#[derive(Debug, Error)]
pub enum RpcError {
    /// Server bind error
    #[error("failed to bind server: {0}")]
    Bind(#[from] std::io::Error),

    /// JSON serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A transport task stopped unexpectedly
    #[error("transport error: {0}")]
    Transport(String),
}

/// Result type for RPC operations
pub type RpcResult<T> = Result<T, RpcError>;

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    // ===== Error Code Tests =====

    #[test]
    fn test_error_codes() {
        assert_eq!(error_code::PARSE_ERROR, -32700);
        assert_eq!(error_code::INVALID_REQUEST, -32600);
        assert_eq!(error_code::METHOD_NOT_FOUND, -32601);
        assert_eq!(error_code::INVALID_PARAMS, -32602);
        assert_eq!(error_code::INTERNAL_ERROR, -32603);
        assert_eq!(error_code::EXECUTION_ERROR, 3);
        assert_eq!(error_code::APP_ERROR, 6969);
    }

    // ===== JsonRpcError Construction Tests =====

    #[test]
    fn test_json_rpc_error_method_not_found() {
        let err = JsonRpcError::method_not_found("eth_unknown");
        assert_eq!(err.code, error_code::METHOD_NOT_FOUND);
        assert!(err.message.contains("eth_unknown"));
    }

    #[test]
    fn test_invalid_argument_carries_index() {
        let err = JsonRpcError::invalid_argument(1, "block number should be less than u32");
        assert_eq!(err.code, error_code::INVALID_PARAMS);
        assert_eq!(
            err.message,
            "invalid argument 1: block number should be less than u32"
        );
        assert_eq!(err.data, Some(serde_json::json!({ "argument": 1 })));
    }

    #[test]
    fn test_app_errors() {
        assert_eq!(JsonRpcError::filter_not_found().code, 6969);
        assert_eq!(JsonRpcError::filter_not_found().message, "filter not found");
        assert_eq!(JsonRpcError::header_not_found().message, "header not found");
    }

    // ===== Conversion Tests =====

    #[test]
    fn test_provider_error_conversion() {
        let err: JsonRpcError = ProviderError::NotFound("header not found".into()).into();
        assert_eq!(err.code, error_code::APP_ERROR);

        let err: JsonRpcError = ProviderError::Rejected("nonce too low".into()).into();
        assert_eq!(err.code, error_code::INTERNAL_ERROR);
        assert!(err.message.contains("nonce too low"));

        let err: JsonRpcError = ProviderError::Internal("storage offline".into()).into();
        assert_eq!(err.code, error_code::INTERNAL_ERROR);
        assert!(err.message.contains("storage offline"));
    }

    #[test]
    fn test_revert_carries_data() {
        let err: JsonRpcError = ProviderError::Reverted {
            message: "execution reverted".into(),
            data: Some(Bytes::from_static(&[0x08, 0xc3])),
        }
        .into();
        assert_eq!(err.code, error_code::EXECUTION_ERROR);
        assert_eq!(err.data, Some(Value::String("0x08c3".into())));
    }

    #[test]
    fn test_tx_error_is_invalid_params() {
        let err: JsonRpcError = bodhi_tx::TxError::UnsupportedType(0x03).into();
        assert_eq!(err.code, error_code::INVALID_PARAMS);
        assert!(err.message.contains("0x03"));
    }

    // ===== Serialization Tests =====

    #[test]
    fn test_json_rpc_error_serialize_without_data() {
        let err = JsonRpcError::invalid_params("test");
        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains("\"code\":-32602"));
        assert!(json.contains("\"message\":\"test\""));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn test_rpc_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::AddrInUse, "in use");
        let err: RpcError = io_err.into();
        assert!(matches!(err, RpcError::Bind(_)));
    }
}
