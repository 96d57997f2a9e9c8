//! Engine configuration: TOML file, then environment overrides, then validation.
//!
//! The signing key is deliberately absent; it is loaded by the binary.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use alloy_primitives::Address;
use eth_core::address::parse_address;
use eth_core::multicall::MULTICALL3_ADDRESS;
use eth_core::units::GWEI;
use serde::Deserialize;

use crate::fee::FeePolicy;

pub const ENV_RPC_URL: &str = "RPC_URL";
pub const ENV_RPC_TIMEOUT_SECS: &str = "RPC_TIMEOUT_SECS";
pub const ENV_CHAIN_ID: &str = "CHAIN_ID";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// JSON-RPC endpoint.
    pub rpc_url: String,
    pub request_timeout_secs: u64,
    /// When set, the node's chain id must match.
    pub expected_chain_id: Option<u64>,
    pub multicall_address: String,
    pub fee: FeeConfig,
    pub watch: WatchConfig,
    pub history: HistoryConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FeeConfig {
    pub base_fee_multiplier: u128,
    pub fallback_priority_fee_wei: u128,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WatchConfig {
    pub poll_interval_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HistoryConfig {
    pub lookback_blocks: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:8545".into(),
            request_timeout_secs: 10,
            expected_chain_id: None,
            multicall_address: format!("{MULTICALL3_ADDRESS:#x}"),
            fee: FeeConfig::default(),
            watch: WatchConfig::default(),
            history: HistoryConfig::default(),
        }
    }
}

impl Default for FeeConfig {
    fn default() -> Self {
        Self { base_fee_multiplier: 2, fallback_priority_fee_wei: GWEI }
    }
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { poll_interval_ms: 2_000 }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { lookback_blocks: 1_000 }
    }
}

/// A single semantic problem with a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid environment variable {name}: {message}")]
    Env { name: &'static str, message: String },

    #[error("validation failed: {}", join_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn join_errors(errors: &[ValidationError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl EngineConfig {
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    /// Loads `path` (or defaults when `None`), applies process environment
    /// overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_toml_str(&std::fs::read_to_string(path)?)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `RPC_URL`, `RPC_TIMEOUT_SECS` and `CHAIN_ID` from `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(raw) = lookup(ENV_RPC_TIMEOUT_SECS) {
            self.request_timeout_secs = raw.trim().parse().map_err(|e| ConfigError::Env {
                name: ENV_RPC_TIMEOUT_SECS,
                message: format!("{e}"),
            })?;
        }
        if let Some(raw) = lookup(ENV_CHAIN_ID) {
            let id = raw.trim().parse().map_err(|e| ConfigError::Env {
                name: ENV_CHAIN_ID,
                message: format!("{e}"),
            })?;
            self.expected_chain_id = Some(id);
        }
        Ok(())
    }

    /// Collects every semantic problem rather than stopping at the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        let mut fail = |field, message: &str| errors.push(ValidationError { field, message: message.into() });

        if self.rpc_url.trim().is_empty() {
            fail("rpc_url", "must not be empty");
        }
        if self.request_timeout_secs == 0 {
            fail("request_timeout_secs", "must be greater than zero");
        }
        if self.fee.base_fee_multiplier == 0 {
            fail("fee.base_fee_multiplier", "must be greater than zero");
        }
        if self.watch.poll_interval_ms == 0 {
            fail("watch.poll_interval_ms", "must be greater than zero");
        }
        if parse_address(&self.multicall_address).is_err() {
            fail("multicall_address", "must be a valid 0x-prefixed address");
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.watch.poll_interval_ms)
    }

    pub fn multicall(&self) -> Result<Address, ConfigError> {
        parse_address(&self.multicall_address).map_err(|e| {
            ConfigError::Validation(vec![ValidationError { field: "multicall_address", message: e.to_string() }])
        })
    }

    pub fn fee_policy(&self) -> FeePolicy {
        FeePolicy {
            base_fee_multiplier: self.fee.base_fee_multiplier,
            fallback_priority_fee: self.fee.fallback_priority_fee_wei,
        }
    }
}
