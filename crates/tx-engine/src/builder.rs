//! Transaction assembly and signing.
//!
//! The builder gathers the three chain reads a transaction needs (nonce, fee
//! caps, gas limit) concurrently, assembles the unsigned transaction once all
//! of them have succeeded, and signs it last. Each read maps to its own
//! [`TxError`] variant so callers can tell which step failed.

use alloy_primitives::{Address, U256};
use eth_core::abi::{AbiValue, Function};
use eth_core::{erc20, Identity, SignedTransaction, TxKind, UnsignedTransaction};
use eth_rpc::{CallRequest, ChainClient};

use crate::error::TxError;
use crate::fee::{FeeCaps, FeePolicy};

/// What to send: destination, native value and call data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxRequest {
    pub to: TxKind,
    pub value: U256,
    pub data: Vec<u8>,
}

impl TxRequest {
    /// Plain native-currency transfer.
    pub fn native_transfer(to: Address, value: U256) -> Self {
        Self { to: TxKind::Call(to), value, data: Vec::new() }
    }

    /// Contract call with pre-encoded call data and no value.
    pub fn call(to: Address, data: Vec<u8>) -> Self {
        Self { to: TxKind::Call(to), value: U256::ZERO, data }
    }

    /// Contract call encoded from a declared function and arguments.
    pub fn contract_call(to: Address, function: &Function, args: &[AbiValue]) -> Result<Self, TxError> {
        Ok(Self::call(to, function.encode_input(args)?))
    }

    /// ERC-20 `transfer(recipient, amount)` on `token`; `amount` is in base units.
    pub fn erc20_transfer(token: Address, recipient: Address, amount: U256) -> Result<Self, TxError> {
        Ok(Self::call(token, erc20::encode_transfer(recipient, amount)?))
    }

    /// Contract deployment with `init_code`.
    pub fn deploy(init_code: Vec<u8>, value: U256) -> Self {
        Self { to: TxKind::Create, value, data: init_code }
    }

    pub(crate) fn estimate_request(&self, from: Address) -> CallRequest {
        CallRequest { from: Some(from), to: self.to.to(), value: Some(self.value), data: self.data.clone() }
    }
}

/// Builds and signs `request` for `identity` on `chain_id`.
///
/// Nonce, fee caps and gas estimate are read concurrently. Nothing is signed
/// unless all three succeed.
pub async fn build_and_sign<C>(
    identity: &Identity,
    chain_id: u64,
    request: &TxRequest,
    client: &C,
    policy: &FeePolicy,
) -> Result<SignedTransaction, TxError>
where
    C: ChainClient + ?Sized,
{
    let (nonce, caps, gas_limit) = tokio::try_join!(
        fetch_nonce(client, identity.address()),
        fetch_fee_caps(client, policy),
        fetch_gas_limit(client, identity.address(), request),
    )?;

    sign(identity, assemble(chain_id, nonce, caps, gas_limit, request))
}

/// Assembles the unsigned transaction from already-fetched inputs.
pub fn assemble(chain_id: u64, nonce: u64, caps: FeeCaps, gas_limit: u64, request: &TxRequest) -> UnsignedTransaction {
    UnsignedTransaction {
        chain_id,
        nonce,
        max_priority_fee_per_gas: caps.max_priority_fee_per_gas,
        max_fee_per_gas: caps.max_fee_per_gas,
        gas_limit,
        to: request.to,
        value: request.value,
        data: request.data.clone(),
    }
}

pub(crate) fn sign(identity: &Identity, tx: UnsignedTransaction) -> Result<SignedTransaction, TxError> {
    let signed = tx.sign(identity)?;
    tracing::info!(
        from = %identity.address(),
        chain_id = signed.tx().chain_id,
        nonce = signed.tx().nonce,
        gas_limit = signed.tx().gas_limit,
        max_fee_per_gas = signed.tx().max_fee_per_gas,
        max_priority_fee_per_gas = signed.tx().max_priority_fee_per_gas,
        tx_hash = %signed.hash(),
        "transaction signed"
    );
    Ok(signed)
}

pub(crate) async fn fetch_chain_id<C>(client: &C) -> Result<u64, TxError>
where
    C: ChainClient + ?Sized,
{
    client.chain_id().await.map_err(TxError::ChainId)
}

pub(crate) async fn fetch_nonce<C>(client: &C, address: Address) -> Result<u64, TxError>
where
    C: ChainClient + ?Sized,
{
    let nonce = client.pending_nonce(address).await.map_err(TxError::NonceFetch)?;
    tracing::debug!(%address, nonce, "pending nonce fetched");
    Ok(nonce)
}

pub(crate) async fn fetch_fee_caps<C>(client: &C, policy: &FeePolicy) -> Result<FeeCaps, TxError>
where
    C: ChainClient + ?Sized,
{
    Ok(policy.compute(client).await?)
}

pub(crate) async fn fetch_gas_limit<C>(client: &C, from: Address, request: &TxRequest) -> Result<u64, TxError>
where
    C: ChainClient + ?Sized,
{
    let gas = client
        .estimate_gas(&request.estimate_request(from))
        .await
        .map_err(|e| TxError::GasEstimation(e.to_string()))?;
    if gas == 0 {
        return Err(TxError::GasEstimation("node estimated zero gas".into()));
    }
    tracing::debug!(gas, "gas estimated");
    Ok(gas)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assemble_copies_every_input() {
        let request = TxRequest::native_transfer(Address::repeat_byte(2), U256::from(7u8));
        let caps = FeeCaps { max_priority_fee_per_gas: 1, max_fee_per_gas: 41 };
        let tx = assemble(5, 9, caps, 21_000, &request);

        assert_eq!(tx.chain_id, 5);
        assert_eq!(tx.nonce, 9);
        assert_eq!(tx.max_priority_fee_per_gas, 1);
        assert_eq!(tx.max_fee_per_gas, 41);
        assert_eq!(tx.gas_limit, 21_000);
        assert_eq!(tx.to, TxKind::Call(Address::repeat_byte(2)));
        assert_eq!(tx.value, U256::from(7u8));
        assert!(tx.data.is_empty());
    }

    #[test]
    fn erc20_request_has_zero_value() {
        let request =
            TxRequest::erc20_transfer(Address::repeat_byte(0xaa), Address::repeat_byte(0xbb), U256::from(10u8)).unwrap();
        assert_eq!(request.value, U256::ZERO);
        assert_eq!(request.to, TxKind::Call(Address::repeat_byte(0xaa)));
        assert_eq!(&request.data[..4], &erc20::TRANSFER_SELECTOR);
    }

    #[test]
    fn estimate_request_mirrors_transaction() {
        let request = TxRequest::deploy(vec![0x60, 0x00], U256::ZERO);
        let estimate = request.estimate_request(Address::repeat_byte(1));
        assert_eq!(estimate.from, Some(Address::repeat_byte(1)));
        assert_eq!(estimate.to, None);
        assert_eq!(estimate.data, vec![0x60, 0x00]);
    }

    #[test]
    fn contract_call_type_mismatch_is_encoding_error() {
        let f = Function::parse("setValue(uint256)").unwrap();
        let err = TxRequest::contract_call(Address::ZERO, &f, &[AbiValue::Bool(true)]).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Encoding);
    }

    #[test]
    fn unsignable_transaction_is_invalid_input() {
        let identity = Identity::from_hex(&format!("{:064x}", 1)).unwrap();
        let caps = FeeCaps { max_priority_fee_per_gas: 1, max_fee_per_gas: 41 };
        let tx = assemble(1, 0, caps, 21_000, &TxRequest::deploy(Vec::new(), U256::ZERO));

        let err = sign(&identity, tx).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidInput);
    }
}
