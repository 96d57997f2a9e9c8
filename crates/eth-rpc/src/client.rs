use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use eth_core::events::Log;
use eth_core::multicall::{self, Call};

use crate::error::RpcError;
use crate::types::{CallRequest, LogFilter};

/// The operations the transaction pipeline needs from a node.
///
/// Implementations must bound every call by a timeout and report it as
/// [`RpcError::Timeout`].
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn chain_id(&self) -> Result<u64, RpcError>;

    /// Next nonce for `address` including pending transactions.
    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcError>;

    /// Suggested tip per gas in wei.
    async fn suggested_priority_fee(&self) -> Result<u128, RpcError>;

    /// Base fee of the latest block in wei.
    async fn latest_base_fee(&self) -> Result<u128, RpcError>;

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError>;

    /// Read-only call against the latest block.
    async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError>;

    /// Submits raw signed bytes; returns the hash reported by the node.
    async fn submit(&self, raw: &[u8]) -> Result<B256, RpcError>;

    /// Executes `calls` in one round trip through the Multicall3 contract at
    /// `multicall`. A reverting sub-call reverts the whole batch.
    async fn aggregated_call(&self, multicall: Address, calls: &[Call]) -> Result<Vec<Vec<u8>>, RpcError> {
        let data = multicall::encode_aggregate(calls).map_err(|e| RpcError::InvalidRequest(e.to_string()))?;
        let reply = self.call(multicall, &data).await?;
        let decoded =
            multicall::decode_aggregate(&reply, calls.len()).map_err(|e| RpcError::CallResult(e.to_string()))?;
        Ok(decoded.return_data)
    }
}

/// Chain state reads used by token and event helpers.
#[async_trait]
pub trait ChainState: Send + Sync {
    async fn block_number(&self) -> Result<u64, RpcError>;

    /// Native balance in wei at the latest block.
    async fn balance(&self, address: Address) -> Result<U256, RpcError>;

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError>;
}
