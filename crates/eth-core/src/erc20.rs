use alloy_primitives::{Address, U256};

use crate::abi::{AbiType, AbiValue, Function};
use crate::error::EthError;

/// Function selector for `transfer(address,uint256)`: `0xa9059cbb`.
pub const TRANSFER_SELECTOR: [u8; 4] = [0xa9, 0x05, 0x9c, 0xbb];

/// Function selector for `balanceOf(address)`: `0x70a08231`.
pub const BALANCE_OF_SELECTOR: [u8; 4] = [0x70, 0xa0, 0x82, 0x31];

/// Function selector for `approve(address,uint256)`: `0x095ea7b3`.
pub const APPROVE_SELECTOR: [u8; 4] = [0x09, 0x5e, 0xa7, 0xb3];

pub fn transfer() -> Function {
    Function::new("transfer", vec![AbiType::Address, AbiType::Uint(256)], vec![AbiType::Bool])
}

pub fn approve() -> Function {
    Function::new("approve", vec![AbiType::Address, AbiType::Uint(256)], vec![AbiType::Bool])
}

pub fn balance_of() -> Function {
    Function::new("balanceOf", vec![AbiType::Address], vec![AbiType::Uint(256)])
}

pub fn total_supply() -> Function {
    Function::new("totalSupply", vec![], vec![AbiType::Uint(256)])
}

pub fn decimals() -> Function {
    Function::new("decimals", vec![], vec![AbiType::Uint(8)])
}

pub fn symbol() -> Function {
    Function::new("symbol", vec![], vec![AbiType::String])
}

/// Encodes an ERC-20 `transfer(address,uint256)` call.
///
/// Returns the complete calldata: 4-byte selector + 64 bytes of params.
pub fn encode_transfer(to: Address, amount: U256) -> Result<Vec<u8>, EthError> {
    transfer().encode_input(&[AbiValue::Address(to), AbiValue::Uint(amount)])
}

/// Encodes an ERC-20 `approve(address,uint256)` call.
pub fn encode_approve(spender: Address, amount: U256) -> Result<Vec<u8>, EthError> {
    approve().encode_input(&[AbiValue::Address(spender), AbiValue::Uint(amount)])
}

/// Encodes an ERC-20 `balanceOf(address)` call.
pub fn encode_balance_of(owner: Address) -> Result<Vec<u8>, EthError> {
    balance_of().encode_input(&[AbiValue::Address(owner)])
}

pub fn encode_total_supply() -> Result<Vec<u8>, EthError> {
    total_supply().encode_input(&[])
}

pub fn encode_decimals() -> Result<Vec<u8>, EthError> {
    decimals().encode_input(&[])
}

pub fn encode_symbol() -> Result<Vec<u8>, EthError> {
    symbol().encode_input(&[])
}

/// Decodes a single uint256 return value (`balanceOf`, `totalSupply`).
///
/// The data must be exactly one 32-byte word.
pub fn decode_uint256(data: &[u8]) -> Result<U256, EthError> {
    let values = balance_of().decode_output(data)?;
    values
        .first()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| EthError::DecodingError("expected a uint256 result".into()))
}

/// Decodes the return value of `decimals()`.
pub fn decode_decimals(data: &[u8]) -> Result<u8, EthError> {
    let values = decimals().decode_output(data)?;
    let value = values
        .first()
        .and_then(AbiValue::as_uint)
        .ok_or_else(|| EthError::DecodingError("expected a uint8 result".into()))?;
    u8::try_from(value).map_err(|_| EthError::DecodingError(format!("decimals {value} exceeds uint8")))
}

/// Decodes the return value of `symbol()`.
pub fn decode_symbol(data: &[u8]) -> Result<String, EthError> {
    let values = symbol().decode_output(data)?;
    values
        .first()
        .and_then(AbiValue::as_str)
        .map(str::to_string)
        .ok_or_else(|| EthError::DecodingError("expected a string result".into()))
}

/// Decodes the optional `bool` returned by `transfer`/`approve`.
///
/// Non-standard tokens return nothing, which counts as success.
pub fn decode_success(data: &[u8]) -> Result<bool, EthError> {
    if data.is_empty() {
        return Ok(true);
    }
    let values = transfer().decode_output(data)?;
    values
        .first()
        .and_then(AbiValue::as_bool)
        .ok_or_else(|| EthError::DecodingError("expected a bool result".into()))
}
