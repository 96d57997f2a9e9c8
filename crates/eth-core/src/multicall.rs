//! Multicall3 `aggregate` payloads.
//!
//! Many read-only calls are packed into one `aggregate((address,bytes)[])`
//! call against the Multicall3 contract, which is deployed at the same
//! address on every major EVM network.

use alloy_primitives::{address, Address, U256};

use crate::abi::{AbiType, AbiValue, Function};
use crate::error::EthError;

/// Canonical Multicall3 deployment address.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");

/// One sub-call in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub target: Address,
    pub call_data: Vec<u8>,
}

impl Call {
    pub fn new(target: Address, call_data: Vec<u8>) -> Self {
        Self { target, call_data }
    }
}

/// Result of an `aggregate` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregated {
    pub block_number: U256,
    pub return_data: Vec<Vec<u8>>,
}

/// `aggregate((address,bytes)[]) returns (uint256,bytes[])`
pub fn aggregate() -> Function {
    let call = AbiType::Tuple(vec![AbiType::Address, AbiType::Bytes]);
    Function::new(
        "aggregate",
        vec![AbiType::Array(Box::new(call))],
        vec![AbiType::Uint(256), AbiType::Array(Box::new(AbiType::Bytes))],
    )
}

pub fn encode_aggregate(calls: &[Call]) -> Result<Vec<u8>, EthError> {
    let calls = calls
        .iter()
        .map(|c| AbiValue::Tuple(vec![AbiValue::Address(c.target), AbiValue::Bytes(c.call_data.clone())]))
        .collect();
    aggregate().encode_input(&[AbiValue::Array(calls)])
}

/// Decodes the `aggregate` return value, requiring exactly `expected` entries.
pub fn decode_aggregate(data: &[u8], expected: usize) -> Result<Aggregated, EthError> {
    let values = aggregate().decode_output(data)?;

    let block_number = values
        .first()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| EthError::DecodingError("missing aggregate block number".into()))?;
    let entries = values
        .get(1)
        .and_then(AbiValue::as_array)
        .ok_or_else(|| EthError::DecodingError("missing aggregate return data".into()))?;

    if entries.len() != expected {
        return Err(EthError::DecodingError(format!(
            "aggregate returned {} results for {expected} calls",
            entries.len()
        )));
    }

    let return_data = entries
        .iter()
        .map(|entry| {
            entry
                .as_bytes()
                .map(<[u8]>::to_vec)
                .ok_or_else(|| EthError::DecodingError("aggregate entry is not bytes".into()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Aggregated { block_number, return_data })
}

/// Encodes an `aggregate` return value. Used by tests and local simulators.
pub fn encode_aggregate_result(block_number: U256, return_data: &[Vec<u8>]) -> Result<Vec<u8>, EthError> {
    let entries = return_data.iter().map(|d| AbiValue::Bytes(d.clone())).collect();
    aggregate().encode_output(&[AbiValue::Uint(block_number), AbiValue::Array(entries)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erc20;

    #[test]
    fn aggregate_selector() {
        assert_eq!(hex::encode(aggregate().selector()), "252dba42");
    }

    #[test]
    fn encode_then_decode_input_preserves_calls() {
        let token = Address::from([0x11; 20]);
        let calls = vec![
            Call::new(token, erc20::encode_balance_of(Address::from([1; 20])).unwrap()),
            Call::new(token, erc20::encode_decimals().unwrap()),
        ];

        let data = encode_aggregate(&calls).unwrap();
        let decoded = aggregate().decode_input(&data).unwrap();
        let items = decoded[0].as_array().unwrap();

        assert_eq!(items.len(), 2);
        let first = items[0].as_tuple().unwrap();
        assert_eq!(first[0].as_address(), Some(token));
        assert_eq!(first[1].as_bytes(), Some(calls[0].call_data.as_slice()));
    }

    #[test]
    fn decode_result_in_order() {
        let encoded = encode_aggregate_result(U256::from(99u8), &[vec![1], vec![], vec![2, 3]]).unwrap();
        let result = decode_aggregate(&encoded, 3).unwrap();
        assert_eq!(result.block_number, U256::from(99u8));
        assert_eq!(result.return_data, vec![vec![1], vec![], vec![2, 3]]);
    }

    #[test]
    fn decode_result_count_mismatch_rejected() {
        let encoded = encode_aggregate_result(U256::from(1u8), &[vec![1]]).unwrap();
        let err = decode_aggregate(&encoded, 2).unwrap_err();
        assert!(matches!(err, EthError::DecodingError(_)));
    }

    #[test]
    fn empty_batch_encodes() {
        let data = encode_aggregate(&[]).unwrap();
        // selector + offset + zero length
        assert_eq!(data.len(), 4 + 64);
    }
}
