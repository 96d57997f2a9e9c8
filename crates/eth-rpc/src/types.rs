//! Request/response shapes and hex-quantity helpers for the JSON-RPC wire format.

use alloy_primitives::{Address, B256, U256};
use eth_core::events::Log;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::RpcError;

/// Parameters of `eth_call` / `eth_estimateGas`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallRequest {
    pub from: Option<Address>,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: Option<U256>,
    pub data: Vec<u8>,
}

impl CallRequest {
    pub fn new(to: Address, data: Vec<u8>) -> Self {
        Self { to: Some(to), data, ..Default::default() }
    }

    pub fn from(mut self, from: Address) -> Self {
        self.from = Some(from);
        self
    }

    pub fn value(mut self, value: U256) -> Self {
        self.value = Some(value);
        self
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut obj = Map::new();
        if let Some(from) = self.from {
            obj.insert("from".into(), json!(format!("{from:#x}")));
        }
        if let Some(to) = self.to {
            obj.insert("to".into(), json!(format!("{to:#x}")));
        }
        if let Some(value) = self.value {
            obj.insert("value".into(), json!(format!("{value:#x}")));
        }
        if !self.data.is_empty() {
            obj.insert("data".into(), json!(format_data(&self.data)));
        }
        Value::Object(obj)
    }
}

/// Parameters of `eth_getLogs` over an inclusive block range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    pub address: Option<Address>,
    /// Positional topic filters; `None` matches anything.
    pub topics: Vec<Option<B256>>,
    pub from_block: u64,
    pub to_block: u64,
}

impl LogFilter {
    pub fn new(from_block: u64, to_block: u64) -> Self {
        Self { address: None, topics: Vec::new(), from_block, to_block }
    }

    pub fn address(mut self, address: Address) -> Self {
        self.address = Some(address);
        self
    }

    pub fn topics(mut self, topics: Vec<Option<B256>>) -> Self {
        self.topics = topics;
        self
    }

    /// Whether `log` satisfies this filter. Block range is checked only when
    /// the log carries a block number.
    pub fn matches(&self, log: &Log) -> bool {
        if self.address.is_some_and(|a| a != log.address) {
            return false;
        }
        if let Some(n) = log.block_number {
            if n < self.from_block || n > self.to_block {
                return false;
            }
        }
        self.topics.iter().enumerate().all(|(i, wanted)| match wanted {
            None => true,
            Some(topic) => log.topics.get(i) == Some(topic),
        })
    }

    pub(crate) fn to_json(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("fromBlock".into(), json!(format_quantity(self.from_block)));
        obj.insert("toBlock".into(), json!(format_quantity(self.to_block)));
        if let Some(address) = self.address {
            obj.insert("address".into(), json!(format!("{address:#x}")));
        }
        if !self.topics.is_empty() {
            let topics: Vec<Value> = self
                .topics
                .iter()
                .map(|t| t.map_or(Value::Null, |t| json!(format!("{t:#x}"))))
                .collect();
            obj.insert("topics".into(), Value::Array(topics));
        }
        Value::Object(obj)
    }
}

/// Log entry as returned by `eth_getLogs`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RpcLog {
    address: String,
    #[serde(default)]
    topics: Vec<String>,
    data: String,
    block_number: Option<String>,
    transaction_hash: Option<String>,
    log_index: Option<String>,
}

impl TryFrom<RpcLog> for Log {
    type Error = RpcError;

    fn try_from(raw: RpcLog) -> Result<Self, Self::Error> {
        Ok(Log {
            address: parse_address(&raw.address, "log address")?,
            topics: raw
                .topics
                .iter()
                .map(|t| parse_b256(t, "log topic"))
                .collect::<Result<_, _>>()?,
            data: parse_data(&raw.data, "log data")?,
            block_number: raw.block_number.as_deref().map(|n| parse_u64(n, "blockNumber")).transpose()?,
            transaction_hash: raw
                .transaction_hash
                .as_deref()
                .map(|h| parse_b256(h, "transactionHash"))
                .transpose()?,
            log_index: raw.log_index.as_deref().map(|n| parse_u64(n, "logIndex")).transpose()?,
        })
    }
}

pub fn format_quantity(value: u64) -> String {
    format!("0x{value:x}")
}

pub fn format_data(data: &[u8]) -> String {
    format!("0x{}", hex::encode(data))
}

fn strip_0x<'a>(raw: &'a str, field: &str) -> Result<&'a str, RpcError> {
    let value = raw.trim();
    value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| RpcError::InvalidResponse(format!("{field} must be 0x-prefixed hex, got {raw:?}")))
}

pub fn parse_u64(raw: &str, field: &str) -> Result<u64, RpcError> {
    let digits = strip_0x(raw, field)?;
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("failed to parse {field} as u64: {e}")))
}

pub fn parse_u128(raw: &str, field: &str) -> Result<u128, RpcError> {
    let digits = strip_0x(raw, field)?;
    u128::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("failed to parse {field} as u128: {e}")))
}

pub fn parse_u256(raw: &str, field: &str) -> Result<U256, RpcError> {
    let digits = strip_0x(raw, field)?;
    U256::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("failed to parse {field} as u256: {e}")))
}

pub fn parse_data(raw: &str, field: &str) -> Result<Vec<u8>, RpcError> {
    let digits = strip_0x(raw, field)?;
    hex::decode(digits).map_err(|e| RpcError::InvalidResponse(format!("{field} is not valid hex: {e}")))
}

pub fn parse_b256(raw: &str, field: &str) -> Result<B256, RpcError> {
    let bytes = parse_data(raw, field)?;
    if bytes.len() != 32 {
        return Err(RpcError::InvalidResponse(format!("{field} must be 32 bytes, got {}", bytes.len())));
    }
    Ok(B256::from_slice(&bytes))
}

pub fn parse_address(raw: &str, field: &str) -> Result<Address, RpcError> {
    let bytes = parse_data(raw, field)?;
    if bytes.len() != 20 {
        return Err(RpcError::InvalidResponse(format!("{field} must be 20 bytes, got {}", bytes.len())));
    }
    Ok(Address::from_slice(&bytes))
}
