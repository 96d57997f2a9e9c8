use alloy_primitives::Address;
use k256::ecdsa::VerifyingKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use sha3::{Digest, Keccak256};

use crate::error::EthError;

/// Derives the Ethereum address of a secp256k1 verifying key.
///
/// The address is the last 20 bytes of the Keccak-256 hash of the 64-byte
/// uncompressed public key (without the 0x04 prefix).
pub fn pubkey_to_address(key: &VerifyingKey) -> Address {
    let uncompressed = key.to_encoded_point(false);
    let hash = Keccak256::digest(&uncompressed.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Returns `true` if `address` is `0x` followed by exactly 40 hex digits.
///
/// Only the syntax is checked; use [`parse_address`] to also verify a mixed-case
/// checksum.
pub fn is_valid_address(address: &str) -> bool {
    strip_hex_prefix(address)
        .map(|hex_part| hex_part.len() == 40 && hex_part.chars().all(|c| c.is_ascii_hexdigit()))
        .unwrap_or(false)
}

/// Parses a 0x-prefixed hex address.
///
/// All-lowercase and all-uppercase inputs are accepted as-is. Mixed-case
/// inputs must carry a valid EIP-55 checksum.
pub fn parse_address(address: &str) -> Result<Address, EthError> {
    let hex_part = syntax_check(address)?;

    let bytes = hex::decode(hex_part)
        .map_err(|e| EthError::InvalidAddress(format!("invalid hex: {e}")))?;
    let parsed = Address::from_slice(&bytes);

    if is_mixed_case(hex_part) && checksum_address(&parsed)[2..] != *hex_part {
        return Err(EthError::InvalidAddress(format!(
            "checksum mismatch for {address}"
        )));
    }

    Ok(parsed)
}

/// Validates an Ethereum address string.
///
/// Returns `Err` on malformed syntax, `Ok(false)` for a mixed-case address
/// whose EIP-55 checksum does not match, and `Ok(true)` otherwise.
pub fn validate_address(address: &str) -> Result<bool, EthError> {
    match parse_address(address) {
        Ok(_) => Ok(true),
        Err(EthError::InvalidAddress(msg)) if msg.starts_with("checksum mismatch") => Ok(false),
        Err(e) => Err(e),
    }
}

/// Renders an address with EIP-55 mixed-case checksum encoding.
pub fn checksum_address(address: &Address) -> String {
    let hex_part = hex::encode(address.as_slice());

    // EIP-55: hash the lowercase hex address (without 0x).
    let hash = Keccak256::digest(hex_part.as_bytes());

    let mut checksummed = String::with_capacity(42);
    checksummed.push_str("0x");

    for (i, c) in hex_part.chars().enumerate() {
        let hash_byte = hash[i / 2];
        let hash_nibble = if i % 2 == 0 { hash_byte >> 4 } else { hash_byte & 0x0f };
        if c.is_ascii_alphabetic() && hash_nibble >= 8 {
            checksummed.push(c.to_ascii_uppercase());
        } else {
            checksummed.push(c);
        }
    }

    checksummed
}

fn strip_hex_prefix(s: &str) -> Option<&str> {
    s.strip_prefix("0x").or_else(|| s.strip_prefix("0X"))
}

fn syntax_check(address: &str) -> Result<&str, EthError> {
    let hex_part = strip_hex_prefix(address)
        .ok_or_else(|| EthError::InvalidAddress("address must start with 0x".into()))?;

    if hex_part.len() != 40 {
        return Err(EthError::InvalidAddress(format!(
            "expected 40 hex characters, got {}",
            hex_part.len()
        )));
    }

    if !hex_part.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(EthError::InvalidAddress(
            "address contains non-hex characters".into(),
        ));
    }

    Ok(hex_part)
}

fn is_mixed_case(hex_part: &str) -> bool {
    hex_part.chars().any(|c| c.is_ascii_uppercase())
        && hex_part.chars().any(|c| c.is_ascii_lowercase())
}
