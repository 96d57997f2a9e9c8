//! Aggregated read-only calls through Multicall3.
//!
//! The batch is strict: if any sub-call reverts, `aggregate` reverts and the
//! whole batch fails. There are no partial results.

use alloy_primitives::Address;
use eth_core::abi::{AbiValue, Function};
use eth_core::multicall::Call;
use eth_rpc::{ChainClient, RpcError};

use crate::error::TxError;

/// Executes `calls` in one round trip; results are in call order.
pub async fn aggregate<C>(client: &C, multicall: Address, calls: &[Call]) -> Result<Vec<Vec<u8>>, TxError>
where
    C: ChainClient + ?Sized,
{
    if calls.is_empty() {
        return Ok(Vec::new());
    }

    let results = client.aggregated_call(multicall, calls).await.map_err(|e| {
        tracing::warn!(calls = calls.len(), error = %e, "aggregated call failed");
        match e {
            RpcError::CallResult(message) => TxError::Decoding(message),
            other => TxError::Network(other),
        }
    })?;

    // Overridden `aggregated_call` implementations are not bound to check this.
    if results.len() != calls.len() {
        return Err(TxError::Decoding(format!(
            "aggregate returned {} results for {} calls",
            results.len(),
            calls.len()
        )));
    }

    tracing::debug!(calls = calls.len(), "aggregated call completed");
    Ok(results)
}

/// A batch of typed reads, each decoded with its own function's outputs.
#[derive(Debug, Clone, Default)]
pub struct BatchRead {
    calls: Vec<Call>,
    functions: Vec<Function>,
}

impl BatchRead {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues `function(args)` against `target`.
    pub fn push(&mut self, target: Address, function: Function, args: &[AbiValue]) -> Result<&mut Self, TxError> {
        let call_data = function.encode_input(args)?;
        self.calls.push(Call::new(target, call_data));
        self.functions.push(function);
        Ok(self)
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn calls(&self) -> &[Call] {
        &self.calls
    }

    /// Runs the batch and decodes every result; one bad entry fails the batch.
    pub async fn execute<C>(&self, client: &C, multicall: Address) -> Result<Vec<Vec<AbiValue>>, TxError>
    where
        C: ChainClient + ?Sized,
    {
        let raw = aggregate(client, multicall, &self.calls).await?;
        raw.iter()
            .zip(&self.functions)
            .enumerate()
            .map(|(i, (bytes, function))| {
                function
                    .decode_output(bytes)
                    .map_err(|e| TxError::Decoding(format!("batch entry {i} ({}): {e}", function.name)))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eth_core::erc20;

    #[test]
    fn push_encodes_calls_in_order() {
        let token = Address::repeat_byte(1);
        let mut batch = BatchRead::new();
        batch
            .push(token, erc20::total_supply(), &[])
            .unwrap()
            .push(token, erc20::balance_of(), &[AbiValue::Address(Address::repeat_byte(2))])
            .unwrap();

        assert_eq!(batch.len(), 2);
        assert_eq!(batch.calls()[0].call_data, erc20::encode_total_supply().unwrap());
        assert_eq!(batch.calls()[1].call_data.len(), 36);
    }

    #[test]
    fn push_rejects_bad_arguments() {
        let mut batch = BatchRead::new();
        assert!(batch.push(Address::ZERO, erc20::balance_of(), &[]).is_err());
        assert!(batch.is_empty());
    }
}
