//! Dynamic fee caps for EIP-1559 transactions.

use eth_core::units::GWEI;
use eth_rpc::{ChainClient, RpcError};
use serde::Serialize;
use thiserror::Error;

/// Per-gas fee caps of one transaction. `max_fee_per_gas >= max_priority_fee_per_gas`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeCaps {
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FeeError {
    #[error("base fee unavailable: {0}")]
    BaseFeeUnavailable(RpcError),

    #[error("fee cap overflow (base fee {base_fee}, priority fee {priority_fee})")]
    Overflow { base_fee: u128, priority_fee: u128 },

    #[error("base fee multiplier must be greater than zero")]
    ZeroMultiplier,
}

/// `max_fee = base_fee_multiplier * base_fee + priority_fee`.
///
/// The multiplier leaves headroom for the base fee to rise over the next
/// blocks before the transaction is included.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeePolicy {
    pub base_fee_multiplier: u128,
    /// Priority fee used when the node cannot suggest one.
    pub fallback_priority_fee: u128,
}

impl Default for FeePolicy {
    fn default() -> Self {
        Self { base_fee_multiplier: 2, fallback_priority_fee: GWEI }
    }
}

impl FeePolicy {
    pub fn caps_from(&self, priority_fee: u128, base_fee: u128) -> Result<FeeCaps, FeeError> {
        if self.base_fee_multiplier == 0 {
            return Err(FeeError::ZeroMultiplier);
        }
        let max_fee = base_fee
            .checked_mul(self.base_fee_multiplier)
            .and_then(|v| v.checked_add(priority_fee))
            .ok_or(FeeError::Overflow { base_fee, priority_fee })?;

        Ok(FeeCaps { max_priority_fee_per_gas: priority_fee, max_fee_per_gas: max_fee })
    }

    /// Reads the priority and base fee from `client` and derives the caps.
    ///
    /// A failed priority suggestion falls back to the floor; a failed base fee
    /// read fails the computation.
    pub async fn compute<C>(&self, client: &C) -> Result<FeeCaps, FeeError>
    where
        C: ChainClient + ?Sized,
    {
        let (priority, base_fee) = tokio::join!(client.suggested_priority_fee(), client.latest_base_fee());

        let priority = match priority {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    fallback_wei = self.fallback_priority_fee,
                    "priority fee suggestion failed, using fallback"
                );
                self.fallback_priority_fee
            }
        };
        let base_fee = base_fee.map_err(FeeError::BaseFeeUnavailable)?;

        let caps = self.caps_from(priority, base_fee)?;
        tracing::debug!(
            base_fee,
            max_priority_fee_per_gas = caps.max_priority_fee_per_gas,
            max_fee_per_gas = caps.max_fee_per_gas,
            "fee caps computed"
        );
        Ok(caps)
    }
}

/// [`FeePolicy::compute`] with the default policy.
pub async fn compute_fee_caps<C>(client: &C) -> Result<FeeCaps, FeeError>
where
    C: ChainClient + ?Sized,
{
    FeePolicy::default().compute(client).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, B256};
    use async_trait::async_trait;
    use eth_rpc::CallRequest;
    use std::time::Duration;

    struct FeeStub {
        priority: Result<u128, RpcError>,
        base_fee: Result<u128, RpcError>,
    }

    #[async_trait]
    impl ChainClient for FeeStub {
        async fn chain_id(&self) -> Result<u64, RpcError> {
            Ok(1)
        }
        async fn pending_nonce(&self, _: Address) -> Result<u64, RpcError> {
            Ok(0)
        }
        async fn suggested_priority_fee(&self) -> Result<u128, RpcError> {
            self.priority.clone()
        }
        async fn latest_base_fee(&self) -> Result<u128, RpcError> {
            self.base_fee.clone()
        }
        async fn estimate_gas(&self, _: &CallRequest) -> Result<u64, RpcError> {
            Ok(21_000)
        }
        async fn call(&self, _: Address, _: &[u8]) -> Result<Vec<u8>, RpcError> {
            Ok(Vec::new())
        }
        async fn submit(&self, _: &[u8]) -> Result<B256, RpcError> {
            Ok(B256::ZERO)
        }
    }

    #[test]
    fn caps_are_twice_base_plus_priority() {
        let caps = FeePolicy::default().caps_from(1, 20).unwrap();
        assert_eq!(caps, FeeCaps { max_priority_fee_per_gas: 1, max_fee_per_gas: 41 });
    }

    #[test]
    fn caps_never_below_priority() {
        for (priority, base) in [(0, 0), (5, 0), (100, 1), (1, 1_000_000)] {
            let caps = FeePolicy::default().caps_from(priority, base).unwrap();
            assert!(caps.max_fee_per_gas >= caps.max_priority_fee_per_gas);
        }
    }

    #[test]
    fn overflow_is_an_error() {
        let err = FeePolicy::default().caps_from(1, u128::MAX / 2 + 1).unwrap_err();
        assert!(matches!(err, FeeError::Overflow { .. }));
        assert!(FeePolicy::default().caps_from(u128::MAX, 1).is_err());
    }

    #[test]
    fn zero_multiplier_rejected() {
        let policy = FeePolicy { base_fee_multiplier: 0, ..FeePolicy::default() };
        assert_eq!(policy.caps_from(1, 1).unwrap_err(), FeeError::ZeroMultiplier);
    }

    #[test]
    fn custom_multiplier() {
        let policy = FeePolicy { base_fee_multiplier: 3, ..FeePolicy::default() };
        assert_eq!(policy.caps_from(2, 10).unwrap().max_fee_per_gas, 32);
    }

    #[tokio::test]
    async fn compute_uses_node_values() {
        let stub = FeeStub { priority: Ok(GWEI), base_fee: Ok(20 * GWEI) };
        let caps = compute_fee_caps(&stub).await.unwrap();
        assert_eq!(caps.max_priority_fee_per_gas, GWEI);
        assert_eq!(caps.max_fee_per_gas, 41 * GWEI);
    }

    #[tokio::test]
    async fn priority_failure_falls_back_to_floor() {
        let stub = FeeStub {
            priority: Err(RpcError::Protocol { code: -32601, message: "method not found".into() }),
            base_fee: Ok(10),
        };
        let caps = compute_fee_caps(&stub).await.unwrap();
        assert_eq!(caps.max_priority_fee_per_gas, GWEI);
        assert_eq!(caps.max_fee_per_gas, 20 + GWEI);
    }

    #[tokio::test]
    async fn base_fee_failure_fails_computation() {
        let stub = FeeStub { priority: Ok(1), base_fee: Err(RpcError::Timeout(Duration::from_secs(10))) };
        let err = compute_fee_caps(&stub).await.unwrap_err();
        assert!(matches!(err, FeeError::BaseFeeUnavailable(RpcError::Timeout(_))));
    }
}
