use alloy_primitives::{Address, B256, U256};
use alloy_rlp::{Encodable, RlpEncodable};
use sha3::{Digest, Keccak256};

use crate::error::EthError;
use crate::identity::{recover_prehash, Identity};

/// EIP-2718 type byte of a dynamic-fee transaction.
pub const EIP1559_TX_TYPE: u8 = 0x02;

/// Destination of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxKind {
    Call(Address),
    /// Contract creation; `data` carries the init code.
    Create,
}

impl TxKind {
    pub fn to(&self) -> Option<Address> {
        match self {
            TxKind::Call(addr) => Some(*addr),
            TxKind::Create => None,
        }
    }
}

impl From<Address> for TxKind {
    fn from(value: Address) -> Self {
        TxKind::Call(value)
    }
}

/// An unsigned EIP-1559 (type 2) transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsignedTransaction {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas_limit: u64,
    pub to: TxKind,
    /// Native value in wei.
    pub value: U256,
    /// Calldata (empty for plain value transfers).
    pub data: Vec<u8>,
}

/// Signature over a transaction's signing hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxSignature {
    pub r: B256,
    pub s: B256,
    pub y_parity: bool,
}

/// A signed EIP-1559 transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedTransaction {
    tx: UnsignedTransaction,
    signature: TxSignature,
    raw: Vec<u8>,
    hash: B256,
}

impl UnsignedTransaction {
    /// Checks the invariants every signable transaction must hold.
    pub fn validate(&self) -> Result<(), EthError> {
        if self.max_fee_per_gas < self.max_priority_fee_per_gas {
            return Err(EthError::TransactionBuildError(format!(
                "max fee {} is below priority fee {}",
                self.max_fee_per_gas, self.max_priority_fee_per_gas
            )));
        }
        if self.gas_limit == 0 {
            return Err(EthError::TransactionBuildError("gas limit is zero".into()));
        }
        if self.to == TxKind::Create && self.data.is_empty() {
            return Err(EthError::TransactionBuildError(
                "contract creation without init code".into(),
            ));
        }
        Ok(())
    }

    /// Encodes the signing payload `0x02 || rlp(fields)`.
    ///
    /// The RLP-encoded fields are:
    /// `[chain_id, nonce, max_priority_fee_per_gas, max_fee_per_gas, gas_limit, to,
    ///   value, data, access_list]`
    pub fn signing_payload(&self) -> Vec<u8> {
        let fields = UnsignedTxFields {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas_limit: self.gas_limit,
            to: RlpTo(self.to),
            value: RlpU256(self.value.to_be_bytes::<32>()),
            data: RlpBytes(&self.data),
            access_list: EmptyAccessList,
        };
        typed_envelope(&fields)
    }

    /// Keccak-256 of the signing payload.
    pub fn signature_hash(&self) -> B256 {
        B256::from_slice(&Keccak256::digest(self.signing_payload()))
    }

    /// Signs this transaction with `identity`, consuming it.
    pub fn sign(self, identity: &Identity) -> Result<SignedTransaction, EthError> {
        self.validate()?;

        let (r, s, y_parity) = identity.sign_prehash(&self.signature_hash())?;
        let signature = TxSignature { r, s, y_parity };

        let signed_fields = SignedTxFields {
            chain_id: self.chain_id,
            nonce: self.nonce,
            max_priority_fee_per_gas: self.max_priority_fee_per_gas,
            max_fee_per_gas: self.max_fee_per_gas,
            gas_limit: self.gas_limit,
            to: RlpTo(self.to),
            value: RlpU256(self.value.to_be_bytes::<32>()),
            data: RlpBytes(&self.data),
            access_list: EmptyAccessList,
            signature_y_parity: y_parity,
            signature_r: RlpU256(r.0),
            signature_s: RlpU256(s.0),
        };
        let raw = typed_envelope(&signed_fields);

        // Transaction hash is the Keccak-256 of the signed raw bytes.
        let hash = B256::from_slice(&Keccak256::digest(&raw));

        Ok(SignedTransaction { tx: self, signature, raw, hash })
    }
}

impl SignedTransaction {
    pub fn tx(&self) -> &UnsignedTransaction {
        &self.tx
    }

    pub fn signature(&self) -> &TxSignature {
        &self.signature
    }

    /// Raw EIP-2718 bytes (`0x02 || rlp(...)`) for `eth_sendRawTransaction`.
    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }

    pub fn hash(&self) -> B256 {
        self.hash
    }

    /// Recovers the address that signed this transaction.
    pub fn recover_signer(&self) -> Result<Address, EthError> {
        recover_prehash(
            &self.tx.signature_hash(),
            &self.signature.r,
            &self.signature.s,
            self.signature.y_parity,
        )
    }

    /// Returns `true` if this transaction was signed by `address`.
    pub fn verify(&self, address: Address) -> bool {
        self.recover_signer().map(|a| a == address).unwrap_or(false)
    }
}

/// Recovers the signer of `signed`.
pub fn recover_signer(signed: &SignedTransaction) -> Result<Address, EthError> {
    signed.recover_signer()
}

fn typed_envelope<T: Encodable>(fields: &T) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + fields.length());
    out.push(EIP1559_TX_TYPE);
    fields.encode(&mut out);
    out
}

// ---------------------------------------------------------------------------
// RLP-encodable structures
// ---------------------------------------------------------------------------

#[derive(RlpEncodable)]
struct UnsignedTxFields<'a> {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpTo,
    value: RlpU256,
    data: RlpBytes<'a>,
    access_list: EmptyAccessList,
}

#[derive(RlpEncodable)]
struct SignedTxFields<'a> {
    chain_id: u64,
    nonce: u64,
    max_priority_fee_per_gas: u128,
    max_fee_per_gas: u128,
    gas_limit: u64,
    to: RlpTo,
    value: RlpU256,
    data: RlpBytes<'a>,
    access_list: EmptyAccessList,
    signature_y_parity: bool,
    signature_r: RlpU256,
    signature_s: RlpU256,
}

/// `to` as a 20-byte string, or the empty string for contract creation.
struct RlpTo(TxKind);

impl Encodable for RlpTo {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        match self.0 {
            TxKind::Call(addr) => addr.as_slice().encode(out),
            TxKind::Create => [0u8; 0].as_slice().encode(out),
        }
    }

    fn length(&self) -> usize {
        match self.0 {
            TxKind::Call(addr) => addr.as_slice().length(),
            TxKind::Create => 1,
        }
    }
}

/// A 256-bit integer encoded as minimal big-endian bytes (leading zeros stripped).
struct RlpU256([u8; 32]);

impl RlpU256 {
    fn trimmed(&self) -> &[u8] {
        let start = self.0.iter().position(|&b| b != 0).unwrap_or(32);
        &self.0[start..]
    }
}

impl Encodable for RlpU256 {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.trimmed().encode(out);
    }

    fn length(&self) -> usize {
        self.trimmed().length()
    }
}

/// Byte string; a bare `Vec<u8>` would not encode as an RLP string.
struct RlpBytes<'a>(&'a [u8]);

impl Encodable for RlpBytes<'_> {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        self.0.encode(out);
    }

    fn length(&self) -> usize {
        self.0.length()
    }
}

/// Always-empty EIP-2930 access list (`0xc0`).
struct EmptyAccessList;

impl Encodable for EmptyAccessList {
    fn encode(&self, out: &mut dyn alloy_rlp::BufMut) {
        alloy_rlp::Header { list: true, payload_length: 0 }.encode(out);
    }

    fn length(&self) -> usize {
        1
    }
}
