use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use eth_core::events::Log;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::time::timeout;
use url::Url;

use crate::client::{ChainClient, ChainState};
use crate::error::RpcError;
use crate::types::{self, format_data, CallRequest, LogFilter, RpcLog};

/// JSON-RPC 2.0 over HTTP.
pub struct HttpChainClient {
    http: reqwest::Client,
    url: Url,
    timeout: Duration,
    next_id: AtomicU64,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorObject>,
}

#[derive(Deserialize)]
struct RpcErrorObject {
    code: i64,
    message: String,
}

impl HttpChainClient {
    /// Creates a client for `rpc_url`; every request is bounded by `request_timeout`.
    pub fn new(rpc_url: &str, request_timeout: Duration) -> Result<Self, RpcError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|e| RpcError::InvalidRequest(format!("invalid RPC URL '{rpc_url}': {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(RpcError::InvalidRequest(format!(
                "unsupported RPC URL scheme '{}'",
                url.scheme()
            )));
        }
        Ok(Self {
            http: reqwest::Client::new(),
            url,
            timeout: request_timeout,
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn request_timeout(&self) -> Duration {
        self.timeout
    }

    /// Sends one request and deserializes its `result`.
    async fn request<T: DeserializeOwned>(&self, method: &'static str, params: Value) -> Result<T, RpcError> {
        let value = self.request_value(method, params).await?;
        serde_json::from_value(value)
            .map_err(|e| RpcError::InvalidResponse(format!("{method} result has unexpected shape: {e}")))
    }

    async fn request_value(&self, method: &'static str, params: Value) -> Result<Value, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        let started = Instant::now();

        let exchange = async {
            let response = self
                .http
                .post(self.url.clone())
                .json(&body)
                .send()
                .await
                .map_err(|e| self.transport_error(e))?;

            let status = response.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(RpcError::Transient(format!("HTTP {status}")));
            }
            if !status.is_success() {
                return Err(RpcError::Protocol {
                    code: i64::from(status.as_u16()),
                    message: format!("HTTP {status}"),
                });
            }

            response
                .json::<RpcResponse>()
                .await
                .map_err(|e| RpcError::InvalidResponse(format!("malformed JSON-RPC reply: {e}")))
        };

        let outcome = match timeout(self.timeout, exchange).await {
            Ok(result) => result,
            Err(_) => Err(RpcError::Timeout(self.timeout)),
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let reply = match outcome {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!(method, elapsed_ms, error = %e, "RPC request failed");
                return Err(e);
            }
        };

        if let Some(err) = reply.error {
            tracing::debug!(method, elapsed_ms, code = err.code, message = %err.message, "RPC error reply");
            return Err(RpcError::Protocol { code: err.code, message: err.message });
        }

        tracing::debug!(method, elapsed_ms, "RPC request completed");
        reply
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} reply has neither result nor error")))
    }

    fn transport_error(&self, err: reqwest::Error) -> RpcError {
        if err.is_timeout() {
            RpcError::Timeout(self.timeout)
        } else if err.is_decode() {
            RpcError::InvalidResponse(err.to_string())
        } else {
            RpcError::Transient(err.to_string())
        }
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn chain_id(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_chainId", json!([])).await?;
        types::parse_u64(&raw, "eth_chainId")
    }

    async fn pending_nonce(&self, address: Address) -> Result<u64, RpcError> {
        let raw: String = self
            .request("eth_getTransactionCount", json!([format!("{address:#x}"), "pending"]))
            .await?;
        types::parse_u64(&raw, "eth_getTransactionCount")
    }

    async fn suggested_priority_fee(&self) -> Result<u128, RpcError> {
        let raw: String = self.request("eth_maxPriorityFeePerGas", json!([])).await?;
        types::parse_u128(&raw, "eth_maxPriorityFeePerGas")
    }

    async fn latest_base_fee(&self) -> Result<u128, RpcError> {
        let block: Option<Value> = self.request("eth_getBlockByNumber", json!(["latest", false])).await?;
        let block = block.ok_or_else(|| RpcError::InvalidResponse("latest block is null".into()))?;
        let raw = block.get("baseFeePerGas").and_then(Value::as_str).ok_or_else(|| RpcError::Protocol {
            code: 0,
            message: "latest block has no baseFeePerGas; chain has no EIP-1559 fee market".into(),
        })?;
        types::parse_u128(raw, "baseFeePerGas")
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_estimateGas", json!([request.to_json()])).await?;
        types::parse_u64(&raw, "eth_estimateGas")
    }

    async fn call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let request = CallRequest::new(to, data.to_vec());
        let raw: String = self.request("eth_call", json!([request.to_json(), "latest"])).await?;
        types::parse_data(&raw, "eth_call")
    }

    async fn submit(&self, raw: &[u8]) -> Result<B256, RpcError> {
        let hash: String = self.request("eth_sendRawTransaction", json!([format_data(raw)])).await?;
        types::parse_b256(&hash, "eth_sendRawTransaction")
    }
}

#[async_trait]
impl ChainState for HttpChainClient {
    async fn block_number(&self) -> Result<u64, RpcError> {
        let raw: String = self.request("eth_blockNumber", json!([])).await?;
        types::parse_u64(&raw, "eth_blockNumber")
    }

    async fn balance(&self, address: Address) -> Result<U256, RpcError> {
        let raw: String = self
            .request("eth_getBalance", json!([format!("{address:#x}"), "latest"]))
            .await?;
        types::parse_u256(&raw, "eth_getBalance")
    }

    async fn logs(&self, filter: &LogFilter) -> Result<Vec<Log>, RpcError> {
        let raw: Vec<RpcLog> = self.request("eth_getLogs", json!([filter.to_json()])).await?;
        raw.into_iter().map(Log::try_from).collect()
    }
}
