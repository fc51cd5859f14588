//! On-chain position records and their materialized client view.

use crate::domain::normalize::{denormalize_amount, PRICE_DECIMALS};
use crate::domain::{Address, Decimal, MarketIdx, PositionType};
use serde::{Deserialize, Serialize};

/// Position record as stored by the vault (fixed-point integers).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRecord {
    pub id: u64,
    pub market_idx: MarketIdx,
    pub pos_type: PositionType,
    pub initial_collateral: u128,
    pub open_fee: u128,
    pub open_price: u128,
    pub mark_price: u128,
    pub leverage: u128,
    pub liquidation_threshold_rate: u128,
    pub owner: Address,
    pub secret_hash: String,
    pub secret: Option<String>,
}

/// Slot of the vault's position query: absent slots carry no record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaybePosition {
    pub is_some: bool,
    pub value: PositionRecord,
}

/// Result of the vault's read-only valuation call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PnlAndLiq {
    /// Unsigned PnL magnitude.
    pub pnl: u128,
    pub positive: bool,
    pub liq_price: u128,
    pub mark_price: u128,
}

/// Arguments shared by `construct_position` and `open_position`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionRequest {
    pub id: u64,
    pub collateral: u128,
    pub market_idx: MarketIdx,
    pub open_price: u128,
    pub pos_type: PositionType,
    pub leverage: u128,
    pub owner: Address,
    pub secret_hash: String,
}

/// An open position merged with its latest valuation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenPosition {
    pub id: u64,
    pub market_idx: MarketIdx,
    pub pos_type: PositionType,
    pub initial_collateral: Decimal,
    pub open_fee: Decimal,
    pub open_price: Decimal,
    pub mark_price: Decimal,
    pub leverage: Decimal,
    pub liquidation_threshold_rate: Decimal,
    pub liq_price: Decimal,
    pub owner: Address,
    /// Signed PnL, four decimal places.
    pub pnl: Decimal,
    pub secret_hash: String,
    pub secret: Option<String>,
}

impl OpenPosition {
    /// Merge a record with its valuation. `None` if an integer is out of decimal range.
    pub fn from_chain(record: &PositionRecord, valuation: &PnlAndLiq) -> Option<Self> {
        let magnitude = Decimal::from_u128(valuation.pnl)?;
        let signed = if valuation.positive {
            magnitude
        } else {
            -magnitude
        };
        Some(Self {
            id: record.id,
            market_idx: record.market_idx,
            pos_type: record.pos_type,
            initial_collateral: Decimal::from_u128(record.initial_collateral)?,
            open_fee: Decimal::from_u128(record.open_fee)?,
            open_price: Decimal::from_u128(record.open_price)?,
            mark_price: Decimal::from_u128(valuation.mark_price)?,
            leverage: Decimal::from_u128(record.leverage)?,
            liquidation_threshold_rate: Decimal::from_u128(record.liquidation_threshold_rate)?,
            liq_price: Decimal::from_u128(valuation.liq_price)?,
            owner: record.owner.clone(),
            pnl: signed.round_dp(4),
            secret_hash: record.secret_hash.clone(),
            secret: record.secret.clone(),
        })
    }

    pub fn open_price_display(&self) -> Option<Decimal> {
        denormalize_amount(self.open_price, PRICE_DECIMALS, 0)
    }

    pub fn mark_price_display(&self) -> Option<Decimal> {
        denormalize_amount(self.mark_price, PRICE_DECIMALS, 0)
    }

    /// The vault reports liquidation prices with one extra digit of precision.
    pub fn liq_price_display(&self) -> Option<Decimal> {
        denormalize_amount(self.liq_price, PRICE_DECIMALS, 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> PositionRecord {
        PositionRecord {
            id: 7,
            market_idx: MarketIdx(1),
            pos_type: PositionType::Short,
            initial_collateral: 1_000_000_000,
            open_fee: 10_000_000,
            open_price: 3_000_000_000_000,
            mark_price: 0,
            leverage: 10_000_000,
            liquidation_threshold_rate: 0,
            owner: Address::from_field(1),
            secret_hash: "ab".to_string(),
            secret: None,
        }
    }

    #[test]
    fn test_from_chain_signs_pnl() {
        let valuation = PnlAndLiq {
            pnl: 25_000_000,
            positive: false,
            liq_price: 32_700_000_000_000,
            mark_price: 3_010_000_000_000,
        };
        let pos = OpenPosition::from_chain(&record(), &valuation).unwrap();
        assert_eq!(pos.pnl, Decimal::from_i64(-25_000_000));
        assert_eq!(pos.mark_price, Decimal::from_i64(3_010_000_000_000));
        assert_eq!(pos.liq_price_display(), Some(Decimal::from_i64(32_700)));
        assert_eq!(pos.open_price_display(), Some(Decimal::from_i64(30_000)));
    }
}
