//! Signing and recovery tests for bodhi-crypto

use bodhi_crypto::{
    keccak256, private_key_from_hex, public_key_to_address, recover_address, sign, Signature,
};
use bodhi_primitives::H256;

const EIP155_KEY: &str = "0x4646464646464646464646464646464646464646464646464646464646464646";

#[test]
fn test_eip155_example_key_address() {
    let key = private_key_from_hex(EIP155_KEY).unwrap();
    assert_eq!(
        public_key_to_address(key.verifying_key()).to_checksum(),
        "0x9d8A62f656a8d1615C1294fd71e9CFb3E4855A4F"
    );
}

#[test]
fn test_eip155_example_signature() {
    // Signing hash from the EIP-155 worked example
    let key = private_key_from_hex(EIP155_KEY).unwrap();
    let hash =
        H256::from_hex("0xdaf5a779ae972f972197303d7b574746c7ef83eadac0f2791ad23db92e4c8e53")
            .unwrap();

    let signature = sign(&hash, &key).unwrap();
    assert_eq!(
        hex::encode(signature.r),
        "28ef61340bd939bc2195fe537567866003e1a15d3c71ff63e1590620aa636276"
    );
    assert_eq!(
        hex::encode(signature.s),
        "67cbe9d8997f761aecb703304b3800ccf555c9f3dc64214b297fb1966a3b6d83"
    );
    assert_eq!(signature.recovery_id(), 0);
}

#[test]
fn test_signing_is_deterministic() {
    let key = private_key_from_hex(EIP155_KEY).unwrap();
    let hash = keccak256(b"rfc6979");
    assert_eq!(sign(&hash, &key).unwrap(), sign(&hash, &key).unwrap());
}

#[test]
fn test_wrong_recovery_id_yields_other_address() {
    let key = private_key_from_hex(EIP155_KEY).unwrap();
    let expected = public_key_to_address(key.verifying_key());
    let hash = keccak256(b"parity");

    let signature = sign(&hash, &key).unwrap();
    let flipped = Signature::from_recovery_id(signature.r, signature.s, signature.recovery_id() ^ 1);

    match recover_address(&hash, &flipped) {
        Ok(address) => assert_ne!(address, expected),
        Err(_) => {}
    }
}
