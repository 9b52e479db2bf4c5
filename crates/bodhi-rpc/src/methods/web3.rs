//! Web3 namespace RPC methods (web3_*)

use std::sync::Arc;

use bodhi_crypto::keccak256;
use serde_json::Value;

use crate::error::JsonRpcError;
use crate::handler::RpcContext;
use crate::types::parse_hex_bytes;
use crate::validator::{validate, Param, ParamType};

/// Client version string
pub const CLIENT_VERSION: &str = concat!("Bodhi/", env!("CARGO_PKG_VERSION"));

const NO_ARGS: &[Param] = &[];
const DATA: &[Param] = &[Param::required(ParamType::Data)];

/// web3_clientVersion - Returns the client version
pub async fn web3_client_version(
    _ctx: Arc<RpcContext>,
    params: Vec<Value>,
) -> Result<Value, JsonRpcError> {
    validate(NO_ARGS, &params)?;
    Ok(Value::String(CLIENT_VERSION.to_string()))
}

/// web3_sha3 - Returns Keccak-256 hash of the given data
pub async fn web3_sha3(_ctx: Arc<RpcContext>, params: Vec<Value>) -> Result<Value, JsonRpcError> {
    validate(DATA, &params)?;
    let data = parse_hex_bytes(&params[0])?;
    Ok(Value::String(keccak256(&data).to_hex()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_version_format() {
        let parts: Vec<&str> = CLIENT_VERSION.split('/').collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], "Bodhi");

        let version_parts: Vec<&str> = parts[1].split('.').collect();
        assert_eq!(version_parts.len(), 3);
        for part in version_parts {
            assert!(part.parse::<u32>().is_ok(), "Version part '{}' is not numeric", part);
        }
    }

    #[test]
    fn test_keccak256_empty_input() {
        // keccak256("") = 0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470
        assert_eq!(
            keccak256(&[]).to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }
}
