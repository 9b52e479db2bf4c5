//! Wire encoding, decoding and hashing of transactions.
//!
//! The first byte selects the variant before any field is read:
//! `0x60` fee-delegated, `0x01` EIP-2930, `0x02` EIP-1559, anything above
//! `0x7f` a legacy RLP list. Every other leading byte is rejected.

use bodhi_crypto::{keccak256, recover_address, Signature};
use bodhi_primitives::{Address, H256, U256};
use bodhi_rlp::{
    append_optional_address, append_scalar, append_uint, decode_bytes, decode_optional_address,
    decode_scalar, decode_u64, decode_uint, expect_list, Rlp, RlpError, RlpStream,
};
use bytes::Bytes;

use crate::eip712;
use crate::error::{TxError, TxResult};
use crate::transaction::{
    AccessListItem, AccessListTx, DynamicFeeTx, FeeDelegatedTx, FeeDelegationContext, LegacyTx,
    Transaction, TxEnvelope, TxSignature, TxType,
};

/// Map the leading byte of a raw payload to its variant
pub fn tx_type_of(first: u8) -> TxResult<TxType> {
    match first {
        0x60 => Ok(TxType::FeeDelegated),
        0x01 => Ok(TxType::AccessList),
        0x02 => Ok(TxType::DynamicFee),
        b if b > 0x7f => Ok(TxType::Legacy),
        other => Err(TxError::UnsupportedType(other)),
    }
}

/// Decode a raw transaction using the default fee-delegation context
pub fn decode(bytes: &[u8]) -> TxResult<TxEnvelope> {
    decode_with(bytes, &FeeDelegationContext::default())
}

/// Decode a raw transaction and recover its sender.
///
/// Signed payloads must recover to a sender; failure is
/// [`TxError::InvalidSignature`].
pub fn decode_with(bytes: &[u8], ctx: &FeeDelegationContext) -> TxResult<TxEnvelope> {
    let first = *bytes
        .first()
        .ok_or_else(|| TxError::MalformedRlp("empty transaction data".to_string()))?;

    let (tx, signature) = match tx_type_of(first)? {
        TxType::Legacy => decode_legacy(bytes)?,
        TxType::AccessList => decode_access_list(&bytes[1..])?,
        TxType::DynamicFee => decode_dynamic_fee(&bytes[1..])?,
        TxType::FeeDelegated => decode_fee_delegated(&bytes[1..], ctx)?,
    };

    let from = match &signature {
        Some(sig) => Some(recover_signer(&tx, sig)?),
        None => None,
    };

    Ok(TxEnvelope {
        tx,
        signature,
        from,
    })
}

/// Encode a transaction, optionally with a compact signature over [`digest`].
///
/// The recovery id is converted to the variant's `v` convention.
pub fn encode(tx: &Transaction, signature: Option<&Signature>) -> Bytes {
    let wire = signature.map(|sig| wire_signature(tx, sig));
    encode_signed(tx, wire.as_ref())
}

/// Encode a transaction with a signature already in wire form
pub fn encode_signed(tx: &Transaction, signature: Option<&TxSignature>) -> Bytes {
    let (unsigned, signed) = tx.tx_type().field_counts();
    let mut stream = RlpStream::new_list(if signature.is_some() { signed } else { unsigned });
    append_fields(&mut stream, tx);
    if let Some(sig) = signature {
        append_uint(&mut stream, &U256::from(sig.v));
        append_scalar(&mut stream, &sig.r);
        append_scalar(&mut stream, &sig.s);
    }
    with_type_prefix(tx.tx_type(), stream)
}

/// The hash a sender signs.
///
/// Keccak-256 of the unsigned RLP (type-prefixed for typed variants, with the
/// EIP-155 `chainId, 0, 0` suffix for legacy), or the EIP-712 digest for
/// fee-delegated transactions.
pub fn digest(tx: &Transaction) -> H256 {
    match tx {
        Transaction::Legacy(legacy) => match legacy.chain_id {
            Some(chain_id) => {
                let mut stream = RlpStream::new_list(9);
                append_fields(&mut stream, tx);
                append_uint(&mut stream, &U256::from(chain_id));
                stream.append_empty_data();
                stream.append_empty_data();
                keccak256(&stream.out())
            }
            None => {
                let mut stream = RlpStream::new_list(6);
                append_fields(&mut stream, tx);
                keccak256(&stream.out())
            }
        },
        Transaction::AccessList(_) | Transaction::DynamicFee(_) => {
            keccak256(&encode_signed(tx, None))
        }
        Transaction::FeeDelegated(inner) => eip712::signing_hash(inner),
    }
}

/// Keccak-256 of the full signed wire bytes
pub fn transaction_hash(raw: &[u8]) -> H256 {
    keccak256(raw)
}

/// Recover the address that produced `signature` over `digest`
pub fn recover_sender(digest: &H256, signature: &Signature) -> TxResult<Address> {
    Ok(recover_address(digest, signature)?)
}

/// Convert a compact signature into the variant's wire form
pub fn wire_signature(tx: &Transaction, signature: &Signature) -> TxSignature {
    let recovery_id = signature.recovery_id() as u64;
    let v = match tx {
        Transaction::Legacy(LegacyTx {
            chain_id: Some(chain_id),
            ..
        }) => recovery_id + 35 + 2 * chain_id,
        Transaction::Legacy(_) => recovery_id + 27,
        _ => recovery_id,
    };
    TxSignature::new(v, H256::from_bytes(signature.r), H256::from_bytes(signature.s))
}

/// Recovery id (0 or 1) from a wire signature
pub fn recovery_id(tx: &Transaction, signature: &TxSignature) -> TxResult<u8> {
    let v = signature.v;
    match tx {
        Transaction::Legacy(legacy) => match (v, legacy.chain_id) {
            (27 | 28, None) => Ok((v - 27) as u8),
            (v, Some(chain_id)) if v >= 35 && (v - 35) / 2 == chain_id => Ok(((v - 35) % 2) as u8),
            _ => Err(TxError::InvalidSignature(format!("invalid legacy v value: {}", v))),
        },
        _ => match v {
            0 | 1 => Ok(v as u8),
            _ => Err(TxError::InvalidSignature(format!(
                "invalid recovery param: {}",
                v
            ))),
        },
    }
}

/// Recover the sender of `tx` from its wire signature
pub fn recover_signer(tx: &Transaction, signature: &TxSignature) -> TxResult<Address> {
    if !signature.is_valid() {
        return Err(TxError::InvalidSignature("zero r or s".to_string()));
    }
    let id = recovery_id(tx, signature)?;
    let compact = Signature::from_recovery_id(*signature.r.as_bytes(), *signature.s.as_bytes(), id);
    recover_sender(&digest(tx), &compact)
}

impl TxEnvelope {
    /// Wire bytes of this envelope
    pub fn encode(&self) -> Bytes {
        encode_signed(&self.tx, self.signature.as_ref())
    }

    /// Transaction hash (Keccak-256 of the wire bytes)
    pub fn hash(&self) -> H256 {
        transaction_hash(&self.encode())
    }
}

// ==================== Field layout ====================

fn append_access_list(stream: &mut RlpStream, list: &[AccessListItem]) {
    stream.append_list::<AccessListItem, AccessListItem>(list);
}

fn append_fields(stream: &mut RlpStream, tx: &Transaction) {
    match tx {
        Transaction::Legacy(t) => {
            append_uint(stream, &t.nonce);
            append_uint(stream, &t.gas_price);
            append_uint(stream, &t.gas_limit);
            append_optional_address(stream, t.to.as_ref());
            append_uint(stream, &t.value);
            stream.append(&t.data.to_vec());
        }
        Transaction::AccessList(t) => {
            append_uint(stream, &U256::from(t.chain_id));
            append_uint(stream, &t.nonce);
            append_uint(stream, &t.gas_price);
            append_uint(stream, &t.gas_limit);
            append_optional_address(stream, t.to.as_ref());
            append_uint(stream, &t.value);
            stream.append(&t.data.to_vec());
            append_access_list(stream, &t.access_list);
        }
        Transaction::DynamicFee(t) => {
            append_uint(stream, &U256::from(t.chain_id));
            append_uint(stream, &t.nonce);
            append_uint(stream, &t.max_priority_fee_per_gas);
            append_uint(stream, &t.max_fee_per_gas);
            append_uint(stream, &t.gas_limit);
            append_optional_address(stream, t.to.as_ref());
            append_uint(stream, &t.value);
            stream.append(&t.data.to_vec());
            append_access_list(stream, &t.access_list);
        }
        Transaction::FeeDelegated(t) => {
            append_uint(stream, &U256::from(t.chain_id));
            append_uint(stream, &t.nonce);
            append_uint(stream, &t.gas_limit);
            append_optional_address(stream, t.to.as_ref());
            append_uint(stream, &t.value);
            stream.append(&t.data.to_vec());
        }
    }
}

fn with_type_prefix(tx_type: TxType, stream: RlpStream) -> Bytes {
    let body = stream.out();
    match tx_type {
        TxType::Legacy => body.freeze(),
        typed => {
            let mut out = Vec::with_capacity(body.len() + 1);
            out.push(typed as u8);
            out.extend_from_slice(&body);
            Bytes::from(out)
        }
    }
}

fn decode_access_list_at(rlp: &Rlp, index: usize) -> TxResult<Vec<AccessListItem>> {
    rlp.list_at(index)
        .map_err(|e| TxError::from(RlpError::from(e)))
}

fn decode_trailing_signature(
    rlp: &Rlp,
    count: usize,
    tx_type: TxType,
) -> TxResult<Option<TxSignature>> {
    let (unsigned, _) = tx_type.field_counts();
    if count == unsigned {
        return Ok(None);
    }
    Ok(Some(TxSignature::new(
        decode_u64(rlp, unsigned, "v")?,
        decode_scalar(rlp, unsigned + 1, "r")?,
        decode_scalar(rlp, unsigned + 2, "s")?,
    )))
}

fn arities(tx_type: TxType) -> [usize; 2] {
    let (unsigned, signed) = tx_type.field_counts();
    [unsigned, signed]
}

fn decode_legacy(payload: &[u8]) -> TxResult<(Transaction, Option<TxSignature>)> {
    let (rlp, count) = expect_list(payload, &arities(TxType::Legacy))?;
    let signature = decode_trailing_signature(&rlp, count, TxType::Legacy)?;

    let chain_id = match signature.as_ref().map(|s| s.v) {
        None | Some(27) | Some(28) => None,
        Some(v) if v >= 35 => Some((v - 35) / 2),
        Some(v) => {
            return Err(TxError::InvalidSignature(format!(
                "invalid legacy v value: {}",
                v
            )))
        }
    };

    let tx = LegacyTx {
        chain_id,
        nonce: decode_uint(&rlp, 0, "nonce")?,
        gas_price: decode_uint(&rlp, 1, "gasPrice")?,
        gas_limit: decode_uint(&rlp, 2, "gasLimit")?,
        to: decode_optional_address(&rlp, 3)?,
        value: decode_uint(&rlp, 4, "value")?,
        data: decode_bytes(&rlp, 5)?,
    };
    Ok((Transaction::Legacy(tx), signature))
}

fn decode_access_list(payload: &[u8]) -> TxResult<(Transaction, Option<TxSignature>)> {
    let (rlp, count) = expect_list(payload, &arities(TxType::AccessList))?;
    let tx = AccessListTx {
        chain_id: decode_u64(&rlp, 0, "chainId")?,
        nonce: decode_uint(&rlp, 1, "nonce")?,
        gas_price: decode_uint(&rlp, 2, "gasPrice")?,
        gas_limit: decode_uint(&rlp, 3, "gasLimit")?,
        to: decode_optional_address(&rlp, 4)?,
        value: decode_uint(&rlp, 5, "value")?,
        data: decode_bytes(&rlp, 6)?,
        access_list: decode_access_list_at(&rlp, 7)?,
    };
    let signature = decode_trailing_signature(&rlp, count, TxType::AccessList)?;
    Ok((Transaction::AccessList(tx), signature))
}

fn decode_dynamic_fee(payload: &[u8]) -> TxResult<(Transaction, Option<TxSignature>)> {
    let (rlp, count) = expect_list(payload, &arities(TxType::DynamicFee))?;
    let tx = DynamicFeeTx {
        chain_id: decode_u64(&rlp, 0, "chainId")?,
        nonce: decode_uint(&rlp, 1, "nonce")?,
        max_priority_fee_per_gas: decode_uint(&rlp, 2, "maxPriorityFeePerGas")?,
        max_fee_per_gas: decode_uint(&rlp, 3, "maxFeePerGas")?,
        gas_limit: decode_uint(&rlp, 4, "gasLimit")?,
        to: decode_optional_address(&rlp, 5)?,
        value: decode_uint(&rlp, 6, "value")?,
        data: decode_bytes(&rlp, 7)?,
        access_list: decode_access_list_at(&rlp, 8)?,
    };
    let signature = decode_trailing_signature(&rlp, count, TxType::DynamicFee)?;
    Ok((Transaction::DynamicFee(tx), signature))
}

fn decode_fee_delegated(
    payload: &[u8],
    ctx: &FeeDelegationContext,
) -> TxResult<(Transaction, Option<TxSignature>)> {
    let (rlp, count) = expect_list(payload, &arities(TxType::FeeDelegated))?;
    let tx = FeeDelegatedTx::new(
        decode_u64(&rlp, 0, "chainId")?,
        decode_uint(&rlp, 1, "nonce")?,
        decode_uint(&rlp, 2, "gasLimit")?,
        decode_optional_address(&rlp, 3)?,
        decode_uint(&rlp, 4, "value")?,
        decode_bytes(&rlp, 5)?,
        ctx,
    );
    let signature = decode_trailing_signature(&rlp, count, TxType::FeeDelegated)?;
    Ok((Transaction::FeeDelegated(tx), signature))
}
