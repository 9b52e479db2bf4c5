//! Signing with a local private key

use bodhi_crypto::{public_key_to_address, PrivateKey, Signature};

use crate::codec::{digest, wire_signature};
use crate::error::TxResult;
use crate::transaction::{Transaction, TxEnvelope};

/// Sign `digest(tx)`; returns the 65-byte compact signature (`v` = 27/28)
pub fn sign(private_key: &PrivateKey, tx: &Transaction) -> TxResult<Signature> {
    Ok(bodhi_crypto::sign(&digest(tx), private_key)?)
}

/// Sign and wrap into an envelope ready for [`TxEnvelope::encode`]
pub fn sign_transaction(private_key: &PrivateKey, tx: Transaction) -> TxResult<TxEnvelope> {
    let signature = sign(private_key, &tx)?;
    let wire = wire_signature(&tx, &signature);
    Ok(TxEnvelope {
        tx,
        signature: Some(wire),
        from: Some(public_key_to_address(private_key.verifying_key())),
    })
}
