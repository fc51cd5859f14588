//! Exact decimal numeric type backed by rust_decimal.
//!
//! Provides canonical parsing from strings, formatting without exponent notation,
//! and the two rounding modes the trading formulas need: truncation toward zero for
//! anything that ends up on chain, half-up for display figures.

use rust_decimal::{Decimal as RustDecimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Largest power of ten representable without overflowing the 96-bit mantissa.
const MAX_POW10: u32 = 28;

/// Exact decimal numeric type for financial calculations.
///
/// Backed by rust_decimal to avoid floating-point drift.
/// Serializes to a JSON string so no precision is lost on the wire.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Decimal(#[serde(with = "rust_decimal::serde::str")] RustDecimal);

impl Decimal {
    /// Parse a Decimal from a string losslessly.
    ///
    /// # Errors
    /// Returns an error if the string is not a valid decimal number.
    pub fn from_str_canonical(s: &str) -> Result<Self, rust_decimal::Error> {
        RustDecimal::from_str(s.trim()).map(Decimal)
    }

    /// Parse user input, treating blank or malformed text as "no value".
    pub fn parse_input(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Self::from_str_canonical(s).ok()
    }

    /// Build an integral Decimal from a raw on-chain integer.
    ///
    /// Returns `None` when the value does not fit into 96 bits.
    pub fn from_u128(value: u128) -> Option<Self> {
        let signed = i128::try_from(value).ok()?;
        RustDecimal::try_from_i128_with_scale(signed, 0)
            .ok()
            .map(Decimal)
    }

    /// `num * 10^-scale`, for literal protocol constants. `scale` must be at most 28.
    pub fn from_scaled(num: i64, scale: u32) -> Self {
        Decimal(RustDecimal::new(num, scale))
    }

    /// Build a Decimal from a small integer.
    pub fn from_i64(value: i64) -> Self {
        Decimal(RustDecimal::from(value))
    }

    /// `10^exp`, or `None` beyond the representable range.
    pub fn pow10(exp: u32) -> Option<Self> {
        if exp > MAX_POW10 {
            return None;
        }
        RustDecimal::try_from_i128_with_scale(10_i128.pow(exp), 0)
            .ok()
            .map(Decimal)
    }

    /// Format the Decimal as a canonical string (no exponent notation).
    pub fn to_canonical_string(&self) -> String {
        // Use normalize() to remove trailing zeros, then format without exponent
        let normalized = self.0.normalize();
        format!("{}", normalized)
    }

    /// Format with exactly `dp` fractional digits, rounding half-up.
    pub fn to_fixed(&self, dp: u32) -> String {
        let rounded = self.round_dp(dp);
        format!("{:.*}", dp as usize, rounded.0)
    }

    /// The additive identity (0).
    pub fn zero() -> Self {
        Decimal(RustDecimal::ZERO)
    }

    /// The multiplicative identity (1).
    pub fn one() -> Self {
        Decimal(RustDecimal::ONE)
    }

    /// Returns true if the value is exactly zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Returns true if the value is > 0.
    pub fn is_positive(&self) -> bool {
        !self.is_zero() && self.0.is_sign_positive()
    }

    /// Returns true if the value is < 0.
    pub fn is_negative(&self) -> bool {
        !self.is_zero() && self.0.is_sign_negative()
    }

    /// Returns true if the value has no fractional part.
    pub fn is_integer(&self) -> bool {
        self.0.fract().is_zero()
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Decimal(self.0.abs())
    }

    /// Returns the value 100.
    pub fn hundred() -> Self {
        Decimal(RustDecimal::ONE_HUNDRED)
    }

    /// Truncate toward zero at `dp` fractional digits.
    pub fn round_down(&self, dp: u32) -> Self {
        Decimal(self.0.round_dp_with_strategy(dp, RoundingStrategy::ToZero))
    }

    /// Round half away from zero at `dp` fractional digits.
    pub fn round_dp(&self, dp: u32) -> Self {
        Decimal(
            self.0
                .round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero),
        )
    }

    /// Largest integer not greater than the value.
    pub fn floor(&self) -> Self {
        Decimal(self.0.floor())
    }

    pub fn checked_add(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_add(rhs.0).map(Decimal)
    }

    pub fn checked_sub(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_sub(rhs.0).map(Decimal)
    }

    pub fn checked_mul(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_mul(rhs.0).map(Decimal)
    }

    /// Division yielding `None` for a zero divisor or an overflowing result.
    pub fn checked_div(self, rhs: Decimal) -> Option<Decimal> {
        self.0.checked_div(rhs.0).map(Decimal)
    }

    /// Integral value as `u128`; `None` for negative or fractional values.
    pub fn to_u128(&self) -> Option<u128> {
        if self.is_negative() || !self.is_integer() {
            return None;
        }
        u128::try_from(self.0.mantissa()).ok().map(|m| {
            // mantissa carries the scale; an integral value may still have scale > 0
            m / 10_u128.pow(self.0.scale())
        })
    }
}

impl fmt::Display for Decimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for Decimal {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl std::ops::Neg for Decimal {
    type Output = Decimal;

    fn neg(self) -> Decimal {
        Decimal(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_decimal_parse_roundtrip() {
        let test_cases = vec![
            "123.456",
            "0.0001",
            "1000000",
            "-123.456",
            "0",
            "999999999.999999999",
        ];

        for s in test_cases {
            let decimal = d(s);
            let formatted = decimal.to_canonical_string();
            let reparsed = Decimal::from_str_canonical(&formatted).expect("reparse failed");
            assert_eq!(decimal, reparsed, "roundtrip failed for {}", s);
        }
    }

    #[test]
    fn test_parse_input_blank_is_none() {
        assert_eq!(Decimal::parse_input(""), None);
        assert_eq!(Decimal::parse_input("   "), None);
        assert_eq!(Decimal::parse_input("abc"), None);
        assert_eq!(Decimal::parse_input(" 12.5 "), Some(d("12.5")));
    }

    #[test]
    fn test_round_down_truncates_toward_zero() {
        assert_eq!(d("1.999999999").round_down(8), d("1.99999999"));
        assert_eq!(d("-1.999999999").round_down(8), d("-1.99999999"));
        assert_eq!(d("30015.123456789").round_down(8), d("30015.12345678"));
    }

    #[test]
    fn test_round_dp_half_up() {
        assert_eq!(d("0.125").round_dp(2), d("0.13"));
        assert_eq!(d("-0.125").round_dp(2), d("-0.13"));
        assert_eq!(d("0.135").round_dp(2), d("0.14"));
    }

    #[test]
    fn test_to_fixed_pads_zeros() {
        assert_eq!(d("99").to_fixed(2), "99.00");
        assert_eq!(d("1.005").to_fixed(2), "1.01");
        assert_eq!(d("12345.6").to_fixed(0), "12346");
    }

    #[test]
    fn test_checked_div_by_zero_is_none() {
        assert_eq!(d("10").checked_div(Decimal::zero()), None);
        assert_eq!(d("10").checked_div(d("4")), Some(d("2.5")));
    }

    #[test]
    fn test_pow10_bounds() {
        assert_eq!(Decimal::pow10(0), Some(Decimal::one()));
        assert_eq!(Decimal::pow10(8), Some(d("100000000")));
        assert!(Decimal::pow10(28).is_some());
        assert_eq!(Decimal::pow10(29), None);
    }

    #[test]
    fn test_to_u128() {
        assert_eq!(d("30000000000").to_u128(), Some(30_000_000_000));
        assert_eq!(d("5.000").to_u128(), Some(5));
        assert_eq!(d("5.5").to_u128(), None);
        assert_eq!(d("-5").to_u128(), None);
    }

    #[test]
    fn test_from_u128() {
        assert_eq!(Decimal::from_u128(42), Some(d("42")));
        assert_eq!(Decimal::from_u128(u128::MAX), None);
    }

    #[test]
    fn test_decimal_json_serialization() {
        let decimal = d("123.456");
        let json = serde_json::to_value(decimal).unwrap();
        // Serialized as a string to keep full precision
        assert!(json.is_string());
        assert_eq!(json, serde_json::json!("123.456"));
    }

    #[test]
    fn test_decimal_ordering() {
        let a = d("10");
        let b = d("20");
        assert!(a < b);
        assert_eq!(a.max(b), b);
        assert_eq!(a.min(b), a);
    }
}
