//! ERC-20 `Transfer` log decoding.

use alloy_primitives::{b256, Address, B256, U256};
use serde::{Deserialize, Serialize};

use crate::error::EthError;

/// `keccak256("Transfer(address,address,uint256)")`.
pub const TRANSFER_TOPIC: B256 =
    b256!("ddf252ad1be2c89b69c2b068fc378daa952ba7f163c4a11628f55a4df523b3ef");

/// A raw event log as returned by a node.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Log {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Vec<u8>,
    pub block_number: Option<u64>,
    pub transaction_hash: Option<B256>,
    pub log_index: Option<u64>,
}

/// A decoded ERC-20 transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEvent {
    pub token: Address,
    pub from: Address,
    pub to: Address,
    pub value: U256,
    pub block_number: Option<u64>,
    pub tx_hash: Option<B256>,
    pub log_index: Option<u64>,
}

impl TransferEvent {
    /// Decodes a `Transfer` log: three topics (signature, from, to) and a
    /// single 32-byte value word.
    pub fn from_log(log: &Log) -> Result<Self, EthError> {
        if log.topics.len() != 3 {
            return Err(EthError::DecodingError(format!(
                "transfer log has {} topics, expected 3",
                log.topics.len()
            )));
        }
        if log.topics[0] != TRANSFER_TOPIC {
            return Err(EthError::DecodingError(format!(
                "topic {} is not Transfer",
                log.topics[0]
            )));
        }
        if log.data.len() != 32 {
            return Err(EthError::DecodingError(format!(
                "transfer value is {} bytes, expected 32",
                log.data.len()
            )));
        }

        Ok(Self {
            token: log.address,
            from: topic_address(&log.topics[1])?,
            to: topic_address(&log.topics[2])?,
            value: U256::from_be_slice(&log.data),
            block_number: log.block_number,
            tx_hash: log.transaction_hash,
            log_index: log.log_index,
        })
    }
}

/// Left-pads an address into an indexed topic.
pub fn address_topic(address: Address) -> B256 {
    address.into_word()
}

fn topic_address(topic: &B256) -> Result<Address, EthError> {
    if topic[..12].iter().any(|b| *b != 0) {
        return Err(EthError::DecodingError(format!("topic {topic} is not an address")));
    }
    Ok(Address::from_slice(&topic[12..]))
}
