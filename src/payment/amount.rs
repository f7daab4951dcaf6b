//! Token amounts
//!
//! Prices and balances travel as decimal strings ("0.50") and are compared in
//! the token's smallest unit so no floating point is involved.

use crate::types::{AppError, AppResult};
use ethers::types::U256;
use ethers::utils::{format_units, parse_units};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// USDC uses 6 decimals on every supported network
pub const USDC_DECIMALS: u32 = 6;

/// An unsigned USDC amount in base units
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TokenAmount(U256);

impl TokenAmount {
    pub fn zero() -> Self {
        Self(U256::zero())
    }

    pub fn from_base_units(raw: U256) -> Self {
        Self(raw)
    }

    pub fn base_units(&self) -> U256 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Parse a decimal string such as "0.50" or "12"
    pub fn parse(input: &str) -> AppResult<Self> {
        let trimmed = input.trim();
        validate_decimal(trimmed)?;

        let parsed = parse_units(trimmed, USDC_DECIMALS)
            .map_err(|e| AppError::InvalidAmount(format!("{:?}: {}", input, e)))?;
        Ok(Self(parsed.into()))
    }

    /// How much is missing to cover `required`, zero when already covered
    pub fn shortfall(&self, required: &TokenAmount) -> TokenAmount {
        Self(required.0.saturating_sub(self.0))
    }

    pub fn saturating_sub(&self, other: &TokenAmount) -> TokenAmount {
        Self(self.0.saturating_sub(other.0))
    }
}

fn validate_decimal(input: &str) -> AppResult<()> {
    let invalid = |reason: &str| AppError::InvalidAmount(format!("{:?}: {}", input, reason));

    if input.is_empty() {
        return Err(invalid("empty amount"));
    }

    let mut parts = input.splitn(2, '.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next();

    if whole.is_empty() || !whole.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid("expected an unsigned decimal number"));
    }
    if let Some(fraction) = fraction {
        if fraction.is_empty() || !fraction.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("expected digits after the decimal point"));
        }
        if fraction.len() > USDC_DECIMALS as usize {
            return Err(invalid("more than 6 decimal places"));
        }
    }

    Ok(())
}

impl fmt::Display for TokenAmount {
    /// Formats with at least two decimals and no trailing zeros beyond that
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = format_units(self.0, USDC_DECIMALS).map_err(|_| fmt::Error)?;
        let (whole, fraction) = match formatted.split_once('.') {
            Some((whole, fraction)) => (whole.to_string(), fraction.to_string()),
            None => (formatted, String::new()),
        };

        let mut fraction = fraction.trim_end_matches('0').to_string();
        while fraction.len() < 2 {
            fraction.push('0');
        }

        write!(f, "{}.{}", whole, fraction)
    }
}

impl FromStr for TokenAmount {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for TokenAmount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TokenAmount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_to_base_units() {
        assert_eq!(
            TokenAmount::parse("0.50").unwrap().base_units(),
            U256::from(500_000u64)
        );
        assert_eq!(
            TokenAmount::parse("12").unwrap().base_units(),
            U256::from(12_000_000u64)
        );
        assert_eq!(
            TokenAmount::parse(" 0.000001 ").unwrap().base_units(),
            U256::one()
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        for input in ["", "-1", "abc", "1.2.3", ".", ".5", "5.", "0.0000001", "1e5"] {
            assert!(
                matches!(TokenAmount::parse(input), Err(AppError::InvalidAmount(_))),
                "expected {:?} to be rejected",
                input
            );
        }
    }

    #[test]
    fn test_display() {
        assert_eq!(TokenAmount::parse("0.5").unwrap().to_string(), "0.50");
        assert_eq!(TokenAmount::parse("10").unwrap().to_string(), "10.00");
        assert_eq!(TokenAmount::parse("1.234500").unwrap().to_string(), "1.2345");
        assert_eq!(TokenAmount::zero().to_string(), "0.00");
    }

    #[test]
    fn test_shortfall() {
        let balance = TokenAmount::parse("0.20").unwrap();
        let price = TokenAmount::parse("0.50").unwrap();
        assert_eq!(balance.shortfall(&price).to_string(), "0.30");
        assert!(price.shortfall(&balance).is_zero());
        assert_eq!(TokenAmount::zero().shortfall(&price), price);
    }

    #[test]
    fn test_ordering() {
        let a = TokenAmount::parse("1.00").unwrap();
        let b = TokenAmount::parse("0.99").unwrap();
        assert!(a > b);
        assert_eq!(a.saturating_sub(&b).to_string(), "0.01");
        assert!(b.saturating_sub(&a).is_zero());
    }

    #[test]
    fn test_serde_as_decimal_string() {
        let amount = TokenAmount::parse("0.25").unwrap();
        let json = serde_json::to_string(&amount).unwrap();
        assert_eq!(json, "\"0.25\"");

        let parsed: TokenAmount = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, amount);
        assert!(serde_json::from_str::<TokenAmount>("\"-3\"").is_err());
    }
}
