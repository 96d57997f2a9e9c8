//! In-memory chain used by the integration tests.
//!
//! Responses are scripted per method; every request is recorded. Submissions
//! are checked against a pending nonce that advances on acceptance, so
//! duplicate or skipped nonces are rejected like a real node would.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_rlp::Decodable;
use async_trait::async_trait;
use eth_core::events::Log;
use eth_core::multicall::{self, MULTICALL3_ADDRESS};
use eth_core::Identity;
use eth_rpc::{CallRequest, ChainClient, ChainState, LogFilter, RpcError};

/// Well-known test private key (DO NOT use on mainnet).
pub const TEST_PRIVKEY: &str = "0x0000000000000000000000000000000000000000000000000000000000000001";

pub fn test_identity() -> Identity {
    Identity::from_hex(TEST_PRIVKEY).unwrap()
}

pub fn reverted() -> RpcError {
    RpcError::Protocol { code: 3, message: "execution reverted".into() }
}

pub struct MockChain {
    pub chain_id: Mutex<Result<u64, RpcError>>,
    pub pending_nonce: Mutex<u64>,
    pub nonce_error: Mutex<Option<RpcError>>,
    pub priority_fee: Mutex<Result<u128, RpcError>>,
    pub base_fee: Mutex<Result<u128, RpcError>>,
    pub gas: Mutex<Result<u64, RpcError>>,
    pub submit_error: Mutex<Option<RpcError>>,
    pub hash_override: Mutex<Option<B256>>,
    pub calls: Mutex<HashMap<(Address, Vec<u8>), Result<Vec<u8>, RpcError>>>,
    pub block_number: Mutex<Result<u64, RpcError>>,
    pub balances: Mutex<HashMap<Address, U256>>,
    pub logs: Mutex<Vec<Log>>,
    pub logs_error: Mutex<Option<RpcError>>,
    /// Delay applied inside every request.
    pub latency: Duration,
    /// Delay between accepting a submission and replying to it.
    pub submit_reply_delay: Duration,

    pub requests: Mutex<Vec<&'static str>>,
    pub estimates: Mutex<Vec<CallRequest>>,
    pub submitted: Mutex<Vec<Vec<u8>>>,
    pub log_filters: Mutex<Vec<LogFilter>>,
}

impl Default for MockChain {
    fn default() -> Self {
        Self {
            chain_id: Mutex::new(Ok(1)),
            pending_nonce: Mutex::new(0),
            nonce_error: Mutex::new(None),
            priority_fee: Mutex::new(Ok(1)),
            base_fee: Mutex::new(Ok(20)),
            gas: Mutex::new(Ok(21_000)),
            submit_error: Mutex::new(None),
            hash_override: Mutex::new(None),
            calls: Mutex::new(HashMap::new()),
            block_number: Mutex::new(Ok(100)),
            balances: Mutex::new(HashMap::new()),
            logs: Mutex::new(Vec::new()),
            logs_error: Mutex::new(None),
            latency: Duration::ZERO,
            submit_reply_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            estimates: Mutex::new(Vec::new()),
            submitted: Mutex::new(Vec::new()),
            log_filters: Mutex::new(Vec::new()),
        }
    }
}

impl MockChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_latency(latency: Duration) -> Self {
        Self { latency, ..Self::default() }
    }

    pub fn set_call(&self, to: Address, data: Vec<u8>, result: Result<Vec<u8>, RpcError>) {
        self.calls.lock().unwrap().insert((to, data), result);
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|m| **m == method).count()
    }

    /// Nonces of accepted submissions, in acceptance order.
    pub fn submitted_nonces(&self) -> Vec<u64> {
        self.submitted.lock().unwrap().iter().map(|raw| raw_nonce(raw)).collect()
    }

    async fn enter(&self, method: &'static str) {
        self.requests.lock().unwrap().push(method);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }

    fn lookup_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        self.calls
            .lock()
            .unwrap()
            .get(&(to, data.to_vec()))
            .cloned()
            .unwrap_or_else(|| Err(reverted()))
    }

    /// Executes a Multicall3 `aggregate`: any failing sub-call reverts all.
    fn aggregate(&self, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let decoded = multicall::aggregate()
            .decode_input(data)
            .map_err(|e| RpcError::Protocol { code: -32602, message: e.to_string() })?;
        let entries = decoded[0].as_array().unwrap_or_default();

        let mut results = Vec::with_capacity(entries.len());
        for entry in entries {
            let fields = entry.as_tuple().unwrap();
            let target = fields[0].as_address().unwrap();
            let call_data = fields[1].as_bytes().unwrap();
            results.push(self.lookup_call(target, call_data)?);
        }

        let block = self.block_number.lock().unwrap().clone().unwrap_or(0);
        Ok(multicall::encode_aggregate_result(U256::from(block), &results).unwrap())
    }
}

/// Reads the nonce out of a signed type-2 transaction.
pub fn raw_nonce(raw: &[u8]) -> u64 {
    let mut body = &raw[1..];
    let header = alloy_rlp::Header::decode(&mut body).unwrap();
    assert!(header.list);
    let _chain_id = u64::decode(&mut body).unwrap();
    u64::decode(&mut body).unwrap()
}

#[async_trait]
impl ChainClient for MockChain {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        self.enter("chain_id").await;
        self.chain_id.lock().unwrap().clone()
    }

    async fn pending_nonce(&self, _address: Address) -> Result<u64, RpcError> {
        self.enter("pending_nonce").await;
        if let Some(err) = self.nonce_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(*self.pending_nonce.lock().unwrap())
    }

    async fn suggested_priority_fee(&self) -> Result<u128, RpcError> {
        self.enter("suggested_priority_fee").await;
        self.priority_fee.lock().unwrap().clone()
    }

    async fn latest_base_fee(&self) -> Result<u128, RpcError> {
        self.enter("latest_base_fee").await;
        self.base_fee.lock().unwrap().clone()
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        self.enter("estimate_gas").await;
        self.estimates.lock().unwrap().push(request.clone());
        self.gas.lock().unwrap().clone()
    }

    async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        self.enter("call").await;
        if to == MULTICALL3_ADDRESS {
            return self.aggregate(data);
        }
        self.lookup_call(to, data)
    }

    async fn submit(&self, raw: &[u8]) -> Result<B256, RpcError> {
        self.enter("submit").await;
        if let Some(err) = self.submit_error.lock().unwrap().clone() {
            return Err(err);
        }

        let nonce = raw_nonce(raw);
        {
            let mut pending = self.pending_nonce.lock().unwrap();
            if nonce < *pending {
                let already = self.submitted.lock().unwrap().iter().any(|r| raw_nonce(r) == nonce);
                let message = if already { "replacement transaction underpriced" } else { "nonce too low" };
                return Err(RpcError::Protocol { code: -32000, message: message.into() });
            }
            if nonce > *pending {
                return Err(RpcError::Protocol { code: -32000, message: "nonce too high".into() });
            }
            *pending += 1;
            self.submitted.lock().unwrap().push(raw.to_vec());
        }

        if !self.submit_reply_delay.is_zero() {
            tokio::time::sleep(self.submit_reply_delay).await;
        }
        Ok(self.hash_override.lock().unwrap().unwrap_or_else(|| keccak256(raw)))
    }
}

#[async_trait]
impl ChainState for MockChain {
    async fn block_number(&self) -> Result<u64, RpcError> {
        self.enter("block_number").await;
        self.block_number.lock().unwrap().clone()
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        self.enter("balance").await;
        Ok(self.balances.lock().unwrap().get(&address).copied().unwrap_or_default())
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError> {
        self.enter("logs").await;
        self.log_filters.lock().unwrap().push(filter.clone());
        if let Some(err) = self.logs_error.lock().unwrap().clone() {
            return Err(err);
        }
        Ok(self.logs.lock().unwrap().iter().filter(|l| filter.matches(l)).cloned().collect())
    }
}
