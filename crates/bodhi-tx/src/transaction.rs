//! Transaction types

use bodhi_primitives::{Address, H256, U256};
use bodhi_rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use bytes::Bytes;

/// Transaction type identifier, the leading byte of a typed envelope
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum TxType {
    /// Legacy transaction (pre-EIP-2718, optionally EIP-155)
    #[default]
    Legacy = 0x00,
    /// EIP-2930 access list transaction
    AccessList = 0x01,
    /// EIP-1559 dynamic fee transaction
    DynamicFee = 0x02,
    /// Fee-delegated transaction signed over EIP-712 typed data
    FeeDelegated = 0x60,
}

impl TxType {
    /// Number of RLP fields without and with a signature
    pub const fn field_counts(self) -> (usize, usize) {
        match self {
            TxType::Legacy => (6, 9),
            TxType::AccessList => (8, 11),
            TxType::DynamicFee => (9, 12),
            TxType::FeeDelegated => (6, 9),
        }
    }
}

/// Access list item (address + storage keys)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessListItem {
    /// Account address
    pub address: Address,
    /// Storage keys
    pub storage_keys: Vec<H256>,
}

impl Encodable for AccessListItem {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.address);
        s.append_list::<H256, H256>(&self.storage_keys);
    }
}

impl Decodable for AccessListItem {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        if rlp.item_count()? != 2 {
            return Err(DecoderError::RlpIncorrectListLen);
        }
        Ok(Self {
            address: rlp.val_at(0)?,
            storage_keys: rlp.list_at(1)?,
        })
    }
}

/// Legacy transaction (type 0)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LegacyTx {
    /// EIP-155 chain id; `None` signs with the pre-EIP-155 digest
    pub chain_id: Option<u64>,
    /// Transaction nonce
    pub nonce: U256,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: U256,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
}

/// EIP-2930 access list transaction (type 1)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccessListTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: U256,
    /// Gas price in wei
    pub gas_price: U256,
    /// Gas limit
    pub gas_limit: U256,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// EIP-1559 dynamic fee transaction (type 2)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DynamicFeeTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: U256,
    /// Max priority fee per gas (tip)
    pub max_priority_fee_per_gas: U256,
    /// Max fee per gas
    pub max_fee_per_gas: U256,
    /// Gas limit
    pub gas_limit: U256,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// Access list
    pub access_list: Vec<AccessListItem>,
}

/// Fee-delegated transaction (type 0x60).
///
/// Only `chain_id`, `nonce`, `gas_limit`, `to`, `value` and `data` travel in
/// the RLP payload. `salt`, `tip`, `storage_limit` and `valid_until` enter
/// the EIP-712 digest only and are supplied by a [`FeeDelegationContext`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeDelegatedTx {
    /// Chain ID
    pub chain_id: u64,
    /// Transaction nonce
    pub nonce: U256,
    /// Gas limit
    pub gas_limit: U256,
    /// Recipient address (None for contract creation)
    pub to: Option<Address>,
    /// Value to transfer in wei
    pub value: U256,
    /// Input data
    pub data: Bytes,
    /// EIP-712 domain salt
    pub salt: H256,
    /// Tip paid to the block author
    pub tip: U256,
    /// Storage the call may consume, in bytes
    pub storage_limit: U256,
    /// Block number after which the transaction is void
    pub valid_until: U256,
}

impl FeeDelegatedTx {
    /// Build a payload with the digest-only fields taken from `ctx`
    pub fn new(
        chain_id: u64,
        nonce: U256,
        gas_limit: U256,
        to: Option<Address>,
        value: U256,
        data: Bytes,
        ctx: &FeeDelegationContext,
    ) -> Self {
        Self {
            chain_id,
            nonce,
            gas_limit,
            to,
            value,
            data,
            salt: ctx.salt,
            tip: ctx.tip,
            storage_limit: ctx.storage_limit,
            valid_until: ctx.valid_until,
        }
    }
}

/// Chain-level values the fee-delegated digest needs but the wire omits
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FeeDelegationContext {
    /// EIP-712 domain salt (the chain's genesis hash)
    pub salt: H256,
    /// Default tip
    pub tip: U256,
    /// Default storage limit
    pub storage_limit: U256,
    /// Default validity bound
    pub valid_until: U256,
}

impl Default for FeeDelegationContext {
    fn default() -> Self {
        Self {
            salt: H256::ZERO,
            tip: U256::zero(),
            storage_limit: U256::from(64_000u64),
            valid_until: U256::from(u32::MAX),
        }
    }
}

/// A transaction of any supported wire format
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Transaction {
    /// Legacy / EIP-155
    Legacy(LegacyTx),
    /// EIP-2930
    AccessList(AccessListTx),
    /// EIP-1559
    DynamicFee(DynamicFeeTx),
    /// Fee-delegated EIP-712
    FeeDelegated(FeeDelegatedTx),
}

impl Transaction {
    /// Wire type of this variant
    pub fn tx_type(&self) -> TxType {
        match self {
            Transaction::Legacy(_) => TxType::Legacy,
            Transaction::AccessList(_) => TxType::AccessList,
            Transaction::DynamicFee(_) => TxType::DynamicFee,
            Transaction::FeeDelegated(_) => TxType::FeeDelegated,
        }
    }

    /// Chain id, if the variant carries one
    pub fn chain_id(&self) -> Option<u64> {
        match self {
            Transaction::Legacy(tx) => tx.chain_id,
            Transaction::AccessList(tx) => Some(tx.chain_id),
            Transaction::DynamicFee(tx) => Some(tx.chain_id),
            Transaction::FeeDelegated(tx) => Some(tx.chain_id),
        }
    }

    /// Get transaction nonce
    pub fn nonce(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.nonce,
            Transaction::AccessList(tx) => tx.nonce,
            Transaction::DynamicFee(tx) => tx.nonce,
            Transaction::FeeDelegated(tx) => tx.nonce,
        }
    }

    /// Get gas limit
    pub fn gas_limit(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.gas_limit,
            Transaction::AccessList(tx) => tx.gas_limit,
            Transaction::DynamicFee(tx) => tx.gas_limit,
            Transaction::FeeDelegated(tx) => tx.gas_limit,
        }
    }

    /// Gas price for variants that have one
    pub fn gas_price(&self) -> Option<U256> {
        match self {
            Transaction::Legacy(tx) => Some(tx.gas_price),
            Transaction::AccessList(tx) => Some(tx.gas_price),
            Transaction::DynamicFee(_) | Transaction::FeeDelegated(_) => None,
        }
    }

    /// Max fee per gas (EIP-1559 only)
    pub fn max_fee_per_gas(&self) -> Option<U256> {
        match self {
            Transaction::DynamicFee(tx) => Some(tx.max_fee_per_gas),
            _ => None,
        }
    }

    /// Max priority fee per gas (EIP-1559 only)
    pub fn max_priority_fee_per_gas(&self) -> Option<U256> {
        match self {
            Transaction::DynamicFee(tx) => Some(tx.max_priority_fee_per_gas),
            _ => None,
        }
    }

    /// Get recipient address
    pub fn to(&self) -> Option<&Address> {
        match self {
            Transaction::Legacy(tx) => tx.to.as_ref(),
            Transaction::AccessList(tx) => tx.to.as_ref(),
            Transaction::DynamicFee(tx) => tx.to.as_ref(),
            Transaction::FeeDelegated(tx) => tx.to.as_ref(),
        }
    }

    /// Get transfer value
    pub fn value(&self) -> U256 {
        match self {
            Transaction::Legacy(tx) => tx.value,
            Transaction::AccessList(tx) => tx.value,
            Transaction::DynamicFee(tx) => tx.value,
            Transaction::FeeDelegated(tx) => tx.value,
        }
    }

    /// Get input data
    pub fn data(&self) -> &Bytes {
        match self {
            Transaction::Legacy(tx) => &tx.data,
            Transaction::AccessList(tx) => &tx.data,
            Transaction::DynamicFee(tx) => &tx.data,
            Transaction::FeeDelegated(tx) => &tx.data,
        }
    }

    /// Access list, empty for variants without one
    pub fn access_list(&self) -> &[AccessListItem] {
        match self {
            Transaction::AccessList(tx) => &tx.access_list,
            Transaction::DynamicFee(tx) => &tx.access_list,
            Transaction::Legacy(_) | Transaction::FeeDelegated(_) => &[],
        }
    }

    /// Check if this is a contract creation transaction
    pub fn is_contract_creation(&self) -> bool {
        self.to().is_none()
    }
}

/// Signature as stored on the wire.
///
/// `v` is the EIP-155 / 27-28 value for legacy transactions, the y-parity for
/// EIP-2930 and EIP-1559, and the raw recovery param for fee-delegated ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxSignature {
    /// Recovery value in the variant's convention
    pub v: u64,
    /// R component
    pub r: H256,
    /// S component
    pub s: H256,
}

impl TxSignature {
    /// Create a new signature
    pub fn new(v: u64, r: H256, s: H256) -> Self {
        Self { v, r, s }
    }

    /// Check if signature is valid (non-zero r and s)
    pub fn is_valid(&self) -> bool {
        !self.r.is_zero() && !self.s.is_zero()
    }
}

/// A decoded transaction with its signature and recovered sender
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxEnvelope {
    /// Transaction body
    pub tx: Transaction,
    /// Signature, absent for unsigned payloads
    pub signature: Option<TxSignature>,
    /// Sender recovered from the signature
    pub from: Option<Address>,
}

impl TxEnvelope {
    /// Whether the payload carried a signature
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn legacy() -> LegacyTx {
        LegacyTx {
            chain_id: Some(1),
            nonce: U256::from(5u64),
            gas_price: U256::from(100u64),
            gas_limit: U256::from(50_000u64),
            to: Some(Address::from_bytes([0x42; 20])),
            value: U256::from(1000u64),
            data: Bytes::from(vec![0x01, 0x02]),
        }
    }

    // ==================== TxType tests ====================

    #[test]
    fn test_tx_type_values() {
        assert_eq!(TxType::Legacy as u8, 0);
        assert_eq!(TxType::AccessList as u8, 1);
        assert_eq!(TxType::DynamicFee as u8, 2);
        assert_eq!(TxType::FeeDelegated as u8, 0x60);
    }

    #[test]
    fn test_field_counts() {
        assert_eq!(TxType::Legacy.field_counts(), (6, 9));
        assert_eq!(TxType::AccessList.field_counts(), (8, 11));
        assert_eq!(TxType::DynamicFee.field_counts(), (9, 12));
        assert_eq!(TxType::FeeDelegated.field_counts(), (6, 9));
    }

    // ==================== Accessor tests ====================

    #[test]
    fn test_accessors_legacy() {
        let tx = Transaction::Legacy(legacy());
        assert_eq!(tx.tx_type(), TxType::Legacy);
        assert_eq!(tx.nonce(), U256::from(5u64));
        assert_eq!(tx.gas_price(), Some(U256::from(100u64)));
        assert_eq!(tx.max_fee_per_gas(), None);
        assert_eq!(tx.to(), Some(&Address::from_bytes([0x42; 20])));
        assert_eq!(tx.data().len(), 2);
        assert!(tx.access_list().is_empty());
        assert!(!tx.is_contract_creation());
    }

    #[test]
    fn test_fee_delegated_takes_context() {
        let ctx = FeeDelegationContext {
            salt: H256::from_bytes([0xaa; 32]),
            tip: U256::from(2u64),
            storage_limit: U256::from(10u64),
            valid_until: U256::from(99u64),
        };
        let tx = FeeDelegatedTx::new(
            595,
            U256::zero(),
            U256::from(21_000u64),
            None,
            U256::zero(),
            Bytes::new(),
            &ctx,
        );
        assert_eq!(tx.salt, ctx.salt);
        assert_eq!(tx.valid_until, U256::from(99u64));
        let tx = Transaction::FeeDelegated(tx);
        assert_eq!(tx.chain_id(), Some(595));
        assert!(tx.gas_price().is_none());
        assert!(tx.is_contract_creation());
    }

    // ==================== TxSignature tests ====================

    #[test]
    fn test_signature_validity() {
        let valid = TxSignature::new(27, H256::from_bytes([1u8; 32]), H256::from_bytes([2u8; 32]));
        assert!(valid.is_valid());

        let zero_r = TxSignature::new(27, H256::ZERO, H256::from_bytes([2u8; 32]));
        assert!(!zero_r.is_valid());
    }

    #[test]
    fn test_access_list_item_rlp() {
        let item = AccessListItem {
            address: Address::from_bytes([0x42; 20]),
            storage_keys: vec![H256::from_bytes([0x01; 32]), H256::from_bytes([0x02; 32])],
        };
        let encoded = bodhi_rlp::encode(&item);
        let decoded: AccessListItem = bodhi_rlp::decode(&encoded).unwrap();
        assert_eq!(decoded, item);
    }
}
