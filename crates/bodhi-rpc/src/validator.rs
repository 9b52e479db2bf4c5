//! Declarative argument schemas
//!
//! Every bridge method declares the shape of its positional arguments and
//! calls [`validate`] before touching the provider. Failures always come back
//! as `InvalidParams` naming the argument index.

use serde_json::Value;

use crate::block_tag::parse_block_tag;
use crate::error::JsonRpcError;
use crate::types::{parse_address, parse_h256, parse_hex_bytes, parse_position, CallRequest};

/// Argument kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    /// 20-byte hex address
    Address,
    /// Block tag, number or EIP-1898 object
    Block,
    /// Call/transaction request object
    Transaction,
    /// 32-byte hex hash
    BlockHash,
    /// Boolean
    Flag,
    /// Storage slot quantity
    Position,
    /// Signed raw transaction bytes
    TransactionData,
    /// Any JSON object
    Object,
    /// Arbitrary hex bytes
    Data,
    /// Hex identifier issued by the server
    Id,
    /// Any string
    Text,
}

impl ParamType {
    fn name(self) -> &'static str {
        match self {
            ParamType::Address => "address",
            ParamType::Block => "block",
            ParamType::Transaction => "transaction",
            ParamType::BlockHash => "blockHash",
            ParamType::Flag => "flag",
            ParamType::Position => "position",
            ParamType::TransactionData => "transactionData",
            ParamType::Object => "object",
            ParamType::Data => "data",
            ParamType::Id => "id",
            ParamType::Text => "string",
        }
    }

    fn check(self, value: &Value) -> Result<(), String> {
        let reason = |e: JsonRpcError| e.message;
        match self {
            ParamType::Address => parse_address(value).map(drop).map_err(reason),
            ParamType::Block => parse_block_tag(value).map(drop).map_err(reason),
            ParamType::Transaction => CallRequest::from_value(value).map(drop).map_err(reason),
            ParamType::BlockHash => parse_h256(value).map(drop).map_err(reason),
            ParamType::Flag => match value {
                Value::Bool(_) => Ok(()),
                _ => Err("expected a boolean".to_string()),
            },
            ParamType::Position => parse_position(value).map(drop).map_err(reason),
            ParamType::TransactionData => match parse_hex_bytes(value) {
                Ok(bytes) if bytes.is_empty() => Err("empty transaction data".to_string()),
                Ok(_) => Ok(()),
                Err(e) => Err(e.message),
            },
            ParamType::Object => match value {
                Value::Object(_) => Ok(()),
                _ => Err("expected an object".to_string()),
            },
            ParamType::Data => parse_hex_bytes(value).map(drop).map_err(reason),
            ParamType::Id => match value.as_str() {
                Some(s) if s.starts_with("0x") && s.len() > 2 => {
                    hex::decode(pad_even(&s[2..])).map(drop).map_err(|e| e.to_string())
                }
                _ => Err("expected a hex identifier".to_string()),
            },
            ParamType::Text => match value {
                Value::String(_) => Ok(()),
                _ => Err("expected a string".to_string()),
            },
        }
    }
}

fn pad_even(digits: &str) -> String {
    if digits.len() % 2 == 1 {
        format!("0{}", digits)
    } else {
        digits.to_string()
    }
}

/// One positional argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    /// Expected kind
    pub kind: ParamType,
    /// Whether the argument may be omitted
    pub optional: bool,
}

impl Param {
    /// A required argument
    pub const fn required(kind: ParamType) -> Self {
        Self {
            kind,
            optional: false,
        }
    }

    /// An argument that may be omitted or null
    pub const fn optional(kind: ParamType) -> Self {
        Self {
            kind,
            optional: true,
        }
    }
}

/// Check `args` against `schema`
pub fn validate(schema: &[Param], args: &[Value]) -> Result<(), JsonRpcError> {
    if args.len() > schema.len() {
        return Err(JsonRpcError::invalid_params(format!(
            "too many arguments, want at most {}",
            schema.len()
        )));
    }

    for (index, param) in schema.iter().enumerate() {
        match args.get(index) {
            None | Some(Value::Null) if param.optional => {}
            None | Some(Value::Null) => {
                return Err(JsonRpcError::invalid_argument(
                    index,
                    format!("missing value for required argument ({})", param.kind.name()),
                ))
            }
            Some(value) => param
                .kind
                .check(value)
                .map_err(|reason| JsonRpcError::invalid_argument(index, reason))?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::error_code;
    use serde_json::json;

    const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const BALANCE: &[Param] = &[
        Param::required(ParamType::Address),
        Param::optional(ParamType::Block),
    ];

    #[test]
    fn test_missing_required_argument_cites_index_zero() {
        let err = validate(BALANCE, &[]).unwrap_err();
        assert_eq!(err.code, error_code::INVALID_PARAMS);
        assert!(err.message.starts_with("invalid argument 0:"), "{}", err.message);
        assert_eq!(err.data, Some(json!({ "argument": 0 })));
    }

    #[test]
    fn test_block_number_bound() {
        let err = validate(BALANCE, &[json!(ADDRESS), json!("0x1ffffffff")]).unwrap_err();
        assert_eq!(err.code, error_code::INVALID_PARAMS);
        assert!(err.message.contains("block number should be less than u32"));
        assert!(err.message.starts_with("invalid argument 1:"));

        let wide = format!("0x{}", "ff".repeat(32));
        let err = validate(BALANCE, &[json!(ADDRESS), json!(wide)]).unwrap_err();
        assert!(err.message.contains("block number should be less than u32"));
    }

    #[test]
    fn test_valid_arguments() {
        assert!(validate(BALANCE, &[json!(ADDRESS)]).is_ok());
        assert!(validate(BALANCE, &[json!(ADDRESS), json!("latest")]).is_ok());
        assert!(validate(BALANCE, &[json!(ADDRESS), Value::Null]).is_ok());
        assert!(validate(BALANCE, &[json!(ADDRESS), json!({ "blockNumber": "0x0" })]).is_ok());
    }

    #[test]
    fn test_too_many_arguments() {
        let err = validate(BALANCE, &[json!(ADDRESS), json!("latest"), json!(1)]).unwrap_err();
        assert_eq!(err.code, error_code::INVALID_PARAMS);
        assert!(err.message.contains("too many arguments"));
    }

    #[test]
    fn test_type_predicates() {
        let cases = [
            (ParamType::Address, json!("0x1234"), false),
            (ParamType::Address, json!(1), false),
            (ParamType::BlockHash, json!(format!("0x{}", "ab".repeat(32))), true),
            (ParamType::BlockHash, json!(format!("0x{}", "ab".repeat(20))), false),
            (ParamType::Flag, json!(true), true),
            (ParamType::Flag, json!("true"), false),
            (ParamType::Position, json!("0x0"), true),
            (ParamType::Position, json!("zero"), false),
            (ParamType::TransactionData, json!("0xf86c"), true),
            (ParamType::TransactionData, json!("0x"), false),
            (ParamType::TransactionData, json!("f86c"), false),
            (ParamType::Object, json!({}), true),
            (ParamType::Object, json!([]), false),
            (ParamType::Transaction, json!({ "to": ADDRESS, "data": "0x" }), true),
            (ParamType::Transaction, json!({ "to": "0x12" }), false),
            (ParamType::Block, json!("pending"), true),
            (ParamType::Block, json!("soon"), false),
            (ParamType::Id, json!("0x1f"), true),
            (ParamType::Id, json!("0xabc"), true),
            (ParamType::Id, json!("0x"), false),
            (ParamType::Id, json!(12), false),
            (ParamType::Text, json!("newHeads"), true),
        ];
        for (kind, value, ok) in cases {
            let result = validate(&[Param::required(kind)], &[value.clone()]);
            assert_eq!(result.is_ok(), ok, "{:?} {}", kind, value);
        }
    }

    #[test]
    fn test_wrapped_reason_not_raw() {
        let err = validate(&[Param::required(ParamType::Flag)], &[json!(1)]).unwrap_err();
        assert_eq!(err.message, "invalid argument 0: expected a boolean");
    }
}
