//! Conversions between human decimals and the contract's fixed-point integers.

use crate::domain::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Decimal width of collateral, position and size amounts.
pub const COLLATERAL_DECIMALS: u32 = 6;
/// Decimal width of prices.
pub const PRICE_DECIMALS: u32 = 8;
/// Decimal width of leverage (1x = 1_000_000).
pub const LEVERAGE_DECIMALS: u32 = 6;
/// Decimal width of percent values (100% = 10^12).
pub const PERCENT_DECIMALS: u32 = 10;
/// Scale of the max-PnL rate (1.0 = 10^12).
pub const MAX_PNL_RATE_DECIMALS: u32 = 12;

/// Non-negative fixed-point integer as the contract stores it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NormalizedAmount(Decimal);

impl NormalizedAmount {
    /// Wrap a raw on-chain integer.
    pub fn from_raw(raw: u128) -> Option<Self> {
        Decimal::from_u128(raw).map(NormalizedAmount)
    }

    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    pub fn to_u128(&self) -> Option<u128> {
        self.0.to_u128()
    }
}

impl fmt::Display for NormalizedAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// `floor(value * 10^decimals)`.
///
/// Returns `None` for negative input or when the scaled value overflows.
pub fn normalize_amount(value: Decimal, decimals: u32) -> Option<NormalizedAmount> {
    if value.is_negative() {
        return None;
    }
    let scaled = value.checked_mul(Decimal::pow10(decimals)?)?;
    Some(NormalizedAmount(scaled.floor()))
}

/// `value / 10^(decimals + extra_decimals)`.
pub fn denormalize_amount(value: Decimal, decimals: u32, extra_decimals: u32) -> Option<Decimal> {
    value.checked_div(Decimal::pow10(decimals + extra_decimals)?)
}

pub fn normalize_leverage(leverage: Decimal) -> Option<NormalizedAmount> {
    normalize_amount(leverage, LEVERAGE_DECIMALS)
}

pub fn decimal_leverage(raw: Decimal) -> Option<Decimal> {
    denormalize_amount(raw, LEVERAGE_DECIMALS, 0)
}

pub fn normalize_percent(percent: Decimal) -> Option<NormalizedAmount> {
    normalize_amount(percent, PERCENT_DECIMALS)
}

pub fn decimal_percent(raw: Decimal) -> Option<Decimal> {
    denormalize_amount(raw, PERCENT_DECIMALS, 0)
}
