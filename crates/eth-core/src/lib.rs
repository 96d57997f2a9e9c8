//! Pure Ethereum/EVM building blocks for the transaction pipeline.
//!
//! This crate provides:
//! - Address syntax validation and EIP-55 checksums
//! - Exact conversions between human decimal amounts and integer base units
//! - A declared-type ABI codec (calls, results, round trips)
//! - ERC-20 and Multicall3 payload helpers
//! - Signing identities and EIP-191 message signatures
//! - EIP-1559 transaction encoding, signing and signer recovery
//! - ERC-20 `Transfer` log decoding
//! - Known EVM network definitions
//!
//! Nothing in here performs I/O.

pub mod abi;
pub mod address;
pub mod chains;
pub mod erc20;
pub mod error;
pub mod events;
pub mod identity;
pub mod multicall;
pub mod transaction;
pub mod units;

pub use alloy_primitives::{Address, B256, I256, U256};
pub use error::EthError;
pub use identity::Identity;
pub use transaction::{SignedTransaction, TxKind, UnsignedTransaction};
pub use units::{BaseAmount, HumanAmount};
