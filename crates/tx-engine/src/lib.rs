//! Transaction construction, signing and submission over a [`ChainClient`].
//!
//! This crate provides:
//! - Fee caps from the node's base and priority fee ([`fee`])
//! - Concurrent nonce/fee/gas gathering, assembly and signing ([`builder`])
//! - Submission with typed rejection handling ([`broadcast`])
//! - Per-address nonce serialization and deadlines ([`engine`], [`nonce`])
//! - Strict Multicall3 read batches ([`batch`]) and ERC-20 reads ([`token`])
//! - Transfer event history and live watching ([`events`])
//! - File and environment configuration ([`config`])
//!
//! [`ChainClient`]: eth_rpc::ChainClient

pub mod batch;
pub mod broadcast;
pub mod builder;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod fee;
pub mod nonce;
pub mod token;

pub use builder::TxRequest;
pub use config::EngineConfig;
pub use engine::TxEngine;
pub use error::{ErrorKind, TxError};
pub use fee::{FeeCaps, FeePolicy};
pub use token::TokenReader;
