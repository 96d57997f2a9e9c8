//! Human-readable decimal amounts and integer base units.
//!
//! [`BaseAmount`] is the authoritative on-chain integer. [`HumanAmount`] is a
//! validated decimal string used only for input and display. The two are
//! converted exactly by [`parse_units`] and [`format_units`]; no floating point
//! is involved anywhere.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

use crate::error::EthError;

/// Decimals of the native ether unit.
pub const ETHER_DECIMALS: u8 = 18;

/// One gwei in wei.
pub const GWEI: u128 = 1_000_000_000;

/// Largest supported decimals value (10^77 is the largest power of ten below 2^256).
pub const MAX_DECIMALS: u8 = 77;

/// An integer amount in a token's smallest indivisible unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct BaseAmount(pub U256);

impl BaseAmount {
    pub const ZERO: Self = Self(U256::ZERO);

    pub fn value(&self) -> U256 {
        self.0
    }
}

impl From<U256> for BaseAmount {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<u128> for BaseAmount {
    fn from(value: u128) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for BaseAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A non-negative decimal amount such as `"10.5"`, for display and input only.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HumanAmount {
    integer: String,
    fraction: String,
}

impl HumanAmount {
    /// Digits before the decimal point (no leading zeros except a single `0`).
    pub fn integer_part(&self) -> &str {
        &self.integer
    }

    /// Digits after the decimal point (no trailing zeros; may be empty).
    pub fn fraction_part(&self) -> &str {
        &self.fraction
    }
}

impl FromStr for HumanAmount {
    type Err = EthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (integer, fraction) = match s.split_once('.') {
            Some((i, f)) => (i, f),
            None => (s, ""),
        };

        if integer.is_empty() {
            return Err(EthError::InvalidAmount(format!("missing integer part in {s:?}")));
        }
        if s.contains('.') && fraction.is_empty() {
            return Err(EthError::InvalidAmount(format!("missing fraction digits in {s:?}")));
        }
        if !integer.chars().all(|c| c.is_ascii_digit()) || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(EthError::InvalidAmount(format!("not a decimal number: {s:?}")));
        }

        let integer = integer.trim_start_matches('0');
        let fraction = fraction.trim_end_matches('0');
        Ok(Self {
            integer: if integer.is_empty() { "0".into() } else { integer.into() },
            fraction: fraction.into(),
        })
    }
}

impl TryFrom<String> for HumanAmount {
    type Error = EthError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HumanAmount> for String {
    fn from(value: HumanAmount) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HumanAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.fraction.is_empty() {
            write!(f, "{}", self.integer)
        } else {
            write!(f, "{}.{}", self.integer, self.fraction)
        }
    }
}

/// Converts a human amount into base units: `human × 10^decimals`.
///
/// Fails rather than rounds when `human` has more fractional digits than
/// `decimals`, and fails on overflow of 256 bits.
pub fn parse_units(human: &HumanAmount, decimals: u8) -> Result<BaseAmount, EthError> {
    if decimals > MAX_DECIMALS {
        return Err(EthError::InvalidAmount(format!(
            "decimals {decimals} exceeds maximum {MAX_DECIMALS}"
        )));
    }
    if human.fraction.len() > decimals as usize {
        return Err(EthError::InvalidAmount(format!(
            "{human} has more than {decimals} decimal places"
        )));
    }

    let overflow = || EthError::InvalidAmount(format!("{human} overflows 256 bits"));

    let integer = U256::from_str_radix(&human.integer, 10).map_err(|_| overflow())?;
    let scale = U256::from(10u8).pow(U256::from(decimals));

    let mut fraction_digits = human.fraction.clone();
    fraction_digits.extend(std::iter::repeat('0').take(decimals as usize - human.fraction.len()));
    let fraction = if fraction_digits.is_empty() {
        U256::ZERO
    } else {
        U256::from_str_radix(&fraction_digits, 10).map_err(|_| overflow())?
    };

    integer
        .checked_mul(scale)
        .and_then(|v| v.checked_add(fraction))
        .map(BaseAmount)
        .ok_or_else(overflow)
}

/// Converts base units into a human amount: `base / 10^decimals`, exact.
pub fn format_units(amount: BaseAmount, decimals: u8) -> HumanAmount {
    let digits = amount.0.to_string();
    let decimals = decimals as usize;

    if decimals == 0 {
        return HumanAmount { integer: digits, fraction: String::new() };
    }

    let padded = if digits.len() <= decimals {
        format!("{}{}", "0".repeat(decimals + 1 - digits.len()), digits)
    } else {
        digits
    };
    let split = padded.len() - decimals;

    HumanAmount {
        integer: padded[..split].to_string(),
        fraction: padded[split..].trim_end_matches('0').to_string(),
    }
}

/// Parses an ether amount (`"0.05"`) into wei.
pub fn parse_ether(ether: &str) -> Result<BaseAmount, EthError> {
    parse_units(&ether.parse()?, ETHER_DECIMALS)
}

/// Formats a wei amount as ether.
pub fn format_ether(wei: BaseAmount) -> HumanAmount {
    format_units(wei, ETHER_DECIMALS)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn human(s: &str) -> HumanAmount {
        s.parse().unwrap()
    }

    #[test]
    fn parse_ten_units_of_six_decimal_token() {
        let base = parse_units(&human("10"), 6).unwrap();
        assert_eq!(base.value(), U256::from(10_000_000u64));
    }

    #[test]
    fn parse_fractional_ether() {
        let wei = parse_ether("0.05").unwrap();
        assert_eq!(wei.value(), U256::from(50_000_000_000_000_000u64));
    }

    #[test]
    fn parse_rejects_excess_precision() {
        let err = parse_units(&human("1.0000001"), 6).unwrap_err();
        assert!(matches!(err, EthError::InvalidAmount(_)));
    }

    #[test]
    fn trailing_zeros_do_not_count_as_precision() {
        let base = parse_units(&human("1.500000000"), 6).unwrap();
        assert_eq!(base.value(), U256::from(1_500_000u64));
    }

    #[test]
    fn parse_rejects_overflow() {
        let huge = format!("{}", U256::MAX);
        let err = parse_units(&human(&huge), 1).unwrap_err();
        assert!(matches!(err, EthError::InvalidAmount(_)));
    }

    #[test]
    fn parse_max_value_with_zero_decimals() {
        let huge = format!("{}", U256::MAX);
        assert_eq!(parse_units(&human(&huge), 0).unwrap().value(), U256::MAX);
    }

    #[test]
    fn human_amount_rejects_garbage() {
        for bad in ["", "-1", "1e18", "1.2.3", ".5", "5.", "abc", "0x10"] {
            assert!(bad.parse::<HumanAmount>().is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn human_amount_normalizes() {
        assert_eq!(human("007.2500").to_string(), "7.25");
        assert_eq!(human("0.0").to_string(), "0");
        assert_eq!(human("000").to_string(), "0");
    }

    #[test]
    fn format_wei_as_ether() {
        let wei = BaseAmount(U256::from_str_radix("12345600000000000000", 10).unwrap());
        assert_eq!(format_ether(wei).to_string(), "12.3456");
    }

    #[test]
    fn format_small_amounts_pad_with_zeros() {
        assert_eq!(format_units(BaseAmount::from(5u128), 6).to_string(), "0.000005");
        assert_eq!(format_units(BaseAmount::ZERO, 6).to_string(), "0");
        assert_eq!(format_units(BaseAmount::from(42u128), 0).to_string(), "42");
    }

    #[test]
    fn format_then_parse_is_exact() {
        let original = BaseAmount::from(123_456_789_012_345_678u128);
        let shown = format_units(original, 9);
        assert_eq!(shown.to_string(), "123456789.012345678");
        assert_eq!(parse_units(&shown, 9).unwrap(), original);
    }

    #[test]
    fn decimals_above_maximum_rejected() {
        assert!(parse_units(&human("1"), 78).is_err());
    }
}
