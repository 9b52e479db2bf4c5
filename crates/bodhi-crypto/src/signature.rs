//! ECDSA signature operations using secp256k1

use bodhi_primitives::{Address, H256};
use k256::ecdsa::{RecoveryId, Signature as K256Signature, SigningKey, VerifyingKey};

use crate::{keccak256, CryptoError};

/// ECDSA signature with recovery id, in the 65-byte compact form `r || s || v`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    /// r component (32 bytes)
    pub r: [u8; 32],
    /// s component (32 bytes)
    pub s: [u8; 32],
    /// recovery id, stored as 27 or 28 for Ethereum compatibility
    pub v: u8,
}

/// Public key
pub type PublicKey = VerifyingKey;

/// Private key (32 bytes)
pub type PrivateKey = SigningKey;

impl Signature {
    /// Create signature from r, s, v components
    pub fn new(r: [u8; 32], s: [u8; 32], v: u8) -> Self {
        Signature { r, s, v }
    }

    /// Build from a raw recovery id (0 or 1)
    pub fn from_recovery_id(r: [u8; 32], s: [u8; 32], recovery_id: u8) -> Self {
        Signature {
            r,
            s,
            v: recovery_id + 27,
        }
    }

    /// Get recovery ID (0 or 1)
    pub fn recovery_id(&self) -> u8 {
        if self.v >= 27 {
            self.v - 27
        } else {
            self.v
        }
    }

    fn to_k256(self) -> Result<K256Signature, CryptoError> {
        let r: k256::FieldBytes = self.r.into();
        let s: k256::FieldBytes = self.s.into();
        K256Signature::from_scalars(r, s).map_err(|e| CryptoError::InvalidSignature(e.to_string()))
    }
}

/// Parse a private key from hex (with or without 0x prefix)
pub fn private_key_from_hex(s: &str) -> Result<PrivateKey, CryptoError> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    let bytes = hex::decode(s).map_err(|_| CryptoError::InvalidPrivateKey)?;
    SigningKey::from_slice(&bytes).map_err(|_| CryptoError::InvalidPrivateKey)
}

/// Sign a message hash with a private key (EIP-2 compliant with low-s)
pub fn sign(message_hash: &H256, private_key: &PrivateKey) -> Result<Signature, CryptoError> {
    let (signature, recovery_id) = private_key
        .sign_prehash_recoverable(message_hash.as_bytes())
        .map_err(|e| CryptoError::SigningFailed(e.to_string()))?;

    // High s flips the parity of the recovered point
    let (signature, recovery_id) = match signature.normalize_s() {
        Some(normalized) => (normalized, recovery_id.to_byte() ^ 1),
        None => (signature, recovery_id.to_byte()),
    };

    Ok(Signature::from_recovery_id(
        signature.r().to_bytes().into(),
        signature.s().to_bytes().into(),
        recovery_id,
    ))
}

/// Recover public key from signature and message hash
pub fn recover_public_key(
    message_hash: &H256,
    signature: &Signature,
) -> Result<PublicKey, CryptoError> {
    let sig = signature.to_k256()?;
    let recovery_id = RecoveryId::from_byte(signature.recovery_id())
        .ok_or(CryptoError::InvalidRecoveryId(signature.recovery_id()))?;

    VerifyingKey::recover_from_prehash(message_hash.as_bytes(), &sig, recovery_id)
        .map_err(|e| CryptoError::RecoveryFailed(e.to_string()))
}

/// Recover the signer address for a digest
pub fn recover_address(message_hash: &H256, signature: &Signature) -> Result<Address, CryptoError> {
    recover_public_key(message_hash, signature).map(|key| public_key_to_address(&key))
}

/// Derive Ethereum address from public key
pub fn public_key_to_address(public_key: &PublicKey) -> Address {
    // Uncompressed point is 0x04 || x || y; the address hashes x || y
    let encoded = public_key.to_encoded_point(false);
    let hash = keccak256(&encoded.as_bytes()[1..]);

    let mut addr_bytes = [0u8; 20];
    addr_bytes.copy_from_slice(&hash.as_bytes()[12..]);
    Address::from_bytes(addr_bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;

    #[test]
    fn test_sign_normalises_s() {
        let private_key = SigningKey::random(&mut OsRng);
        let message_hash = keccak256(b"test message");

        let signature = sign(&message_hash, &private_key).unwrap();
        assert!(signature.v == 27 || signature.v == 28);
        let scalars = signature.to_k256().unwrap();
        assert!(scalars.normalize_s().is_none());
    }

    #[test]
    fn test_recover_address_matches_key() {
        let private_key = SigningKey::random(&mut OsRng);
        let expected = public_key_to_address(private_key.verifying_key());
        let message_hash = keccak256(b"recover me");

        let signature = sign(&message_hash, &private_key).unwrap();
        assert_eq!(recover_address(&message_hash, &signature).unwrap(), expected);
    }

    #[test]
    fn test_known_key_address() {
        let key = private_key_from_hex(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        )
        .unwrap();
        assert_eq!(
            public_key_to_address(key.verifying_key()).to_checksum(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
    }

    #[test]
    fn test_out_of_range_s_fails_recovery() {
        let private_key = SigningKey::random(&mut OsRng);
        let message_hash = keccak256(b"test");
        let mut signature = sign(&message_hash, &private_key).unwrap();
        signature.s = [0xFF; 32];
        assert!(matches!(
            recover_address(&message_hash, &signature),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_zero_scalars_fail_recovery() {
        let signature = Signature::new([0u8; 32], [0u8; 32], 27);
        assert!(matches!(
            recover_address(&H256::ZERO, &signature),
            Err(CryptoError::InvalidSignature(_))
        ));
    }

    #[test]
    fn test_invalid_private_key() {
        assert!(matches!(
            private_key_from_hex("0x00"),
            Err(CryptoError::InvalidPrivateKey)
        ));
        assert!(matches!(
            private_key_from_hex("zz"),
            Err(CryptoError::InvalidPrivateKey)
        ));
    }
}
