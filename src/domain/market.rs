//! Market parameters as read from the vault and as used by the formulas.

use crate::domain::normalize::{decimal_leverage, decimal_percent};
use crate::domain::Decimal;
use serde::{Deserialize, Serialize};

/// Market record exactly as the vault returns it (fixed-point integers).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMarket {
    pub base_spread_rate: u128,
    pub max_leverage: u128,
    pub max_total_longs: u128,
    pub max_total_shorts: u128,
    pub open_fee_rate: u128,
    pub total_longs: u128,
    pub total_shorts: u128,
}

/// Read-only view of one market's parameters, rates in percent (0-100 scale).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub open_fee_rate_percent: Decimal,
    pub base_spread_rate_percent: Decimal,
    pub max_leverage: Decimal,
    pub total_longs: Decimal,
    pub total_shorts: Decimal,
    pub max_total_longs_usd: Decimal,
    pub max_total_shorts_usd: Decimal,
    pub depth: Decimal,
}

impl MarketSnapshot {
    /// Scale a raw vault record. `depth` is supplied by configuration.
    ///
    /// Returns `None` if any raw integer is out of decimal range.
    pub fn from_raw(raw: &RawMarket, depth: Decimal) -> Option<Self> {
        Some(Self {
            open_fee_rate_percent: decimal_percent(Decimal::from_u128(raw.open_fee_rate)?)?,
            base_spread_rate_percent: decimal_percent(Decimal::from_u128(raw.base_spread_rate)?)?,
            max_leverage: decimal_leverage(Decimal::from_u128(raw.max_leverage)?)?,
            total_longs: Decimal::from_u128(raw.total_longs)?,
            total_shorts: Decimal::from_u128(raw.total_shorts)?,
            max_total_longs_usd: Decimal::from_u128(raw.max_total_longs)?,
            max_total_shorts_usd: Decimal::from_u128(raw.max_total_shorts)?,
            depth,
        })
    }
}
