use std::sync::Arc;

use alloy_primitives::{Address, B256};
use eth_core::multicall::{Call, MULTICALL3_ADDRESS};
use eth_core::{Identity, SignedTransaction};
use eth_rpc::{ChainClient, RpcError};
use tokio::time::{timeout_at, Instant};

use crate::batch;
use crate::broadcast;
use crate::builder::{self, TxRequest};
use crate::config::EngineConfig;
use crate::error::TxError;
use crate::fee::FeePolicy;
use crate::nonce::NonceLocks;

/// Builds, signs and submits transactions against one chain client.
pub struct TxEngine<C: ?Sized> {
    client: Arc<C>,
    policy: FeePolicy,
    expected_chain_id: Option<u64>,
    multicall: Address,
    nonce_locks: NonceLocks,
}

impl<C> TxEngine<C>
where
    C: ChainClient + ?Sized,
{
    pub fn new(client: Arc<C>) -> Self {
        Self {
            client,
            policy: FeePolicy::default(),
            expected_chain_id: None,
            multicall: MULTICALL3_ADDRESS,
            nonce_locks: NonceLocks::new(),
        }
    }

    pub fn from_config(client: Arc<C>, config: &EngineConfig) -> Result<Self, TxError> {
        config.validate()?;
        Ok(Self {
            client,
            policy: config.fee_policy(),
            expected_chain_id: config.expected_chain_id,
            multicall: config.multicall()?,
            nonce_locks: NonceLocks::new(),
        })
    }

    pub fn with_fee_policy(mut self, policy: FeePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Requires the node to report `chain_id` before anything is signed.
    pub fn with_expected_chain_id(mut self, chain_id: u64) -> Self {
        self.expected_chain_id = Some(chain_id);
        self
    }

    pub fn client(&self) -> &Arc<C> {
        &self.client
    }

    pub fn fee_policy(&self) -> &FeePolicy {
        &self.policy
    }

    pub fn multicall_address(&self) -> Address {
        self.multicall
    }

    /// Queries the node's chain id and checks it against the expected one.
    pub async fn verify_chain(&self) -> Result<u64, TxError> {
        let chain_id = builder::fetch_chain_id(self.client.as_ref()).await?;
        self.check_chain_id(chain_id)?;
        Ok(chain_id)
    }

    fn check_chain_id(&self, actual: u64) -> Result<(), TxError> {
        match self.expected_chain_id {
            Some(expected) if expected != actual => Err(TxError::Configuration(format!(
                "chain id mismatch: expected {expected}, node reports {actual}"
            ))),
            _ => Ok(()),
        }
    }

    /// Builds and signs `request`. Chain id, nonce, fee caps and gas limit are
    /// read concurrently, right before assembly.
    pub async fn build_and_sign(&self, identity: &Identity, request: &TxRequest) -> Result<SignedTransaction, TxError> {
        let client = self.client.as_ref();
        let (chain_id, nonce, caps, gas_limit) = tokio::try_join!(
            builder::fetch_chain_id(client),
            builder::fetch_nonce(client, identity.address()),
            builder::fetch_fee_caps(client, &self.policy),
            builder::fetch_gas_limit(client, identity.address(), request),
        )?;
        self.check_chain_id(chain_id)?;

        builder::sign(identity, builder::assemble(chain_id, nonce, caps, gas_limit, request))
    }

    /// Submits an already signed transaction.
    pub async fn submit(&self, signed: &SignedTransaction) -> Result<B256, TxError> {
        broadcast::submit(self.client.as_ref(), signed).await
    }

    /// Builds, signs and submits `request`.
    ///
    /// Sends from the same address through this engine are serialized from
    /// the nonce read until the node has accepted the transaction.
    pub async fn send(&self, identity: &Identity, request: &TxRequest) -> Result<B256, TxError> {
        let _guard = self.nonce_locks.acquire(identity.address()).await;
        let signed = self.build_and_sign(identity, request).await?;
        self.submit(&signed).await
    }

    /// [`TxEngine::send`] bounded by `deadline`.
    ///
    /// Expiry before submission is [`TxError::DeadlineExceeded`] and nothing
    /// reached the node. Expiry once the raw bytes are handed over is
    /// [`TxError::SubmitUncertain`]: the transaction may already be pending.
    pub async fn send_before(&self, identity: &Identity, request: &TxRequest, deadline: Instant) -> Result<B256, TxError> {
        let started = Instant::now();
        let _guard = timeout_at(deadline, self.nonce_locks.acquire(identity.address()))
            .await
            .map_err(|_| TxError::DeadlineExceeded)?;
        let signed = self.build_and_sign_before(identity, request, deadline).await?;

        match timeout_at(deadline, self.submit(&signed)).await {
            Ok(result) => result,
            Err(_) => {
                let hash = signed.hash();
                tracing::error!(tx_hash = %hash, "deadline expired during submission; outcome unknown");
                Err(TxError::SubmitUncertain {
                    hash,
                    source: RpcError::Timeout(deadline.saturating_duration_since(started)),
                })
            }
        }
    }

    /// [`TxEngine::build_and_sign`] bounded by `deadline`.
    pub async fn build_and_sign_before(
        &self,
        identity: &Identity,
        request: &TxRequest,
        deadline: Instant,
    ) -> Result<SignedTransaction, TxError> {
        timeout_at(deadline, self.build_and_sign(identity, request))
            .await
            .map_err(|_| TxError::DeadlineExceeded)?
    }

    /// Strict Multicall3 batch through the configured aggregator.
    pub async fn aggregate(&self, calls: &[Call]) -> Result<Vec<Vec<u8>>, TxError> {
        batch::aggregate(self.client.as_ref(), self.multicall, calls).await
    }
}
