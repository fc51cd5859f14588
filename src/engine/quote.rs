//! Deposit draft and its quote: the explicit recompute graph from user inputs,
//! market snapshot and live price to everything the order form shows and submits.

use crate::domain::normalize::{
    normalize_amount, normalize_leverage, normalize_percent, COLLATERAL_DECIMALS, PRICE_DECIMALS,
};
use crate::domain::{map2, map3, Decimal, MarketSnapshot, NormalizedAmount, PositionType};
use crate::engine::pricing;
use crate::engine::sizing::{self, LiquidationParams};
use serde::Serialize;

/// Order form inputs. Collateral and position are kept consistent with each other:
/// whichever was set last drives the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepositDraft {
    pub deposit_type: PositionType,
    pub leverage: Option<Decimal>,
    pub collateral: Option<Decimal>,
    pub position: Option<Decimal>,
    pub slippage: Option<Decimal>,
}

impl Default for DepositDraft {
    fn default() -> Self {
        Self {
            deposit_type: PositionType::Long,
            leverage: Some(Decimal::one()),
            collateral: None,
            position: None,
            slippage: Some(Decimal::one()),
        }
    }
}

impl DepositDraft {
    pub fn set_type(&mut self, deposit_type: PositionType) {
        self.deposit_type = deposit_type;
    }

    pub fn set_collateral(&mut self, value: Option<Decimal>, fee_rate: Option<Decimal>) {
        self.collateral = value;
        self.recalc_position(fee_rate);
    }

    pub fn set_position(&mut self, value: Option<Decimal>, fee_rate: Option<Decimal>) {
        self.position = value;
        self.recalc_collateral(fee_rate);
    }

    pub fn set_leverage(&mut self, value: Option<Decimal>, fee_rate: Option<Decimal>) {
        self.leverage = value;
        self.recalc_position(fee_rate);
    }

    pub fn set_slippage(&mut self, value: Option<Decimal>) {
        self.slippage = value;
    }

    /// State after a confirmed submission.
    pub fn clear_after_submit(&mut self) {
        self.collateral = None;
        self.position = None;
        self.leverage = Some(Decimal::one());
    }

    pub fn open_fee(&self, fee_rate: Option<Decimal>) -> Option<Decimal> {
        map3(self.collateral, self.leverage, fee_rate, sizing::open_fee)
    }

    fn recalc_position(&mut self, fee_rate: Option<Decimal>) {
        let fee = self.open_fee(fee_rate);
        self.position = map3(self.collateral, fee, self.leverage, sizing::position_from_collateral);
    }

    fn recalc_collateral(&mut self, fee_rate: Option<Decimal>) {
        self.collateral = map3(self.position, self.leverage, fee_rate, sizing::collateral_from_position);
    }
}

/// Every derived figure of a draft for one (market snapshot, live price) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepositQuote {
    pub deposit_type: PositionType,
    pub leverage: Option<Decimal>,
    pub collateral: Option<Decimal>,
    pub position: Option<Decimal>,
    pub slippage: Option<Decimal>,
    pub price: Option<Decimal>,
    pub open_fee: Option<Decimal>,
    pub dynamic_spread: Option<Decimal>,
    pub spread: Option<Decimal>,
    pub open_price: Option<Decimal>,
    pub liquidation_price: Option<Decimal>,
    pub max_leverage: Option<Decimal>,
    pub collateral_normalized: Option<NormalizedAmount>,
    pub position_normalized: Option<NormalizedAmount>,
    pub leverage_normalized: Option<NormalizedAmount>,
    pub slippage_normalized: Option<NormalizedAmount>,
    pub open_price_normalized: Option<NormalizedAmount>,
    pub is_spread_valid: Option<bool>,
    pub is_leverage_valid: Option<bool>,
    pub is_enabled: bool,
}

impl DepositQuote {
    pub fn compute(draft: &DepositDraft, market: Option<&MarketSnapshot>, price: Option<Decimal>) -> Self {
        let pos_type = draft.deposit_type;
        let fee_rate = market.map(|m| m.open_fee_rate_percent);
        let base_spread = market.map(|m| m.base_spread_rate_percent);

        let open_fee = draft.open_fee(fee_rate);
        let position_normalized = draft
            .position
            .and_then(|p| normalize_amount(p, COLLATERAL_DECIMALS));
        let price_normalized = price.and_then(|p| normalize_amount(p, PRICE_DECIMALS));

        let dynamic_spread = map3(market, position_normalized, price_normalized, |m, pos, px| {
            pricing::dynamic_spread(m, pos.as_decimal(), px.as_decimal(), pos_type)
        });
        let spread = map2(base_spread, dynamic_spread, pricing::total_spread);
        let open_price = map2(price, spread, |p, s| pricing::open_price(p, s, pos_type));

        let liquidation_price = map3(draft.collateral, open_fee, open_price, |collateral, fee, op| {
            sizing::liquidation_price(&LiquidationParams {
                collateral,
                open_fee: fee,
                open_price: op,
                leverage: draft.leverage?,
                base_spread_percent: base_spread?,
                pos_type,
            })
        });

        let is_spread_valid = map2(price, liquidation_price, |p, liq| {
            Some(sizing::is_spread_valid(p, liq, pos_type))
        });
        let max_leverage = market.map(|m| m.max_leverage);
        let is_leverage_valid = map2(draft.leverage, max_leverage, |l, max| {
            Some(sizing::is_leverage_valid(l, max))
        });

        Self {
            deposit_type: pos_type,
            leverage: draft.leverage,
            collateral: draft.collateral,
            position: draft.position,
            slippage: draft.slippage,
            price,
            open_fee,
            dynamic_spread,
            spread,
            open_price,
            liquidation_price,
            max_leverage,
            collateral_normalized: draft
                .collateral
                .and_then(|c| normalize_amount(c, COLLATERAL_DECIMALS)),
            position_normalized,
            leverage_normalized: draft.leverage.and_then(normalize_leverage),
            slippage_normalized: draft.slippage.and_then(normalize_percent),
            open_price_normalized: open_price.and_then(|p| normalize_amount(p, PRICE_DECIMALS)),
            is_spread_valid,
            is_leverage_valid,
            is_enabled: is_spread_valid == Some(true) && is_leverage_valid != Some(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            open_fee_rate_percent: d("0.1"),
            base_spread_rate_percent: d("0.05"),
            max_leverage: d("100"),
            total_longs: Decimal::zero(),
            total_shorts: Decimal::zero(),
            max_total_longs_usd: d("1000000"),
            max_total_shorts_usd: d("1000000"),
            depth: d("1"),
        }
    }

    #[test]
    fn test_setting_collateral_drives_position() {
        let mut draft = DepositDraft::default();
        let fee = Some(d("0.1"));
        draft.set_leverage(Some(d("10")), fee);
        draft.set_collateral(Some(d("1000")), fee);
        assert_eq!(draft.position, Some(d("9900")));

        draft.set_position(Some(d("4950")), fee);
        assert_eq!(draft.collateral, Some(d("500")));
    }

    #[test]
    fn test_missing_fee_rate_clears_derived_side() {
        let mut draft = DepositDraft::default();
        draft.set_collateral(Some(d("1000")), None);
        assert_eq!(draft.position, None);
    }

    #[test]
    fn test_clear_after_submit() {
        let mut draft = DepositDraft::default();
        draft.set_leverage(Some(d("5")), Some(d("0.1")));
        draft.set_collateral(Some(d("100")), Some(d("0.1")));
        draft.set_type(PositionType::Short);
        draft.clear_after_submit();
        assert_eq!(draft.collateral, None);
        assert_eq!(draft.position, None);
        assert_eq!(draft.leverage, Some(d("1")));
        assert_eq!(draft.deposit_type, PositionType::Short);
    }

    #[test]
    fn test_quote_without_price_is_disabled() {
        let mut draft = DepositDraft::default();
        draft.set_leverage(Some(d("10")), Some(d("0.1")));
        draft.set_collateral(Some(d("1000")), Some(d("0.1")));
        let quote = DepositQuote::compute(&draft, Some(&market()), None);
        assert_eq!(quote.open_fee, Some(d("10")));
        assert_eq!(quote.open_price, None);
        assert_eq!(quote.liquidation_price, None);
        assert_eq!(quote.is_spread_valid, None);
        assert!(!quote.is_enabled);
    }

    #[test]
    fn test_quote_balanced_book() {
        let mut draft = DepositDraft::default();
        draft.set_leverage(Some(d("10")), Some(d("0.1")));
        draft.set_collateral(Some(d("1000")), Some(d("0.1")));
        let quote = DepositQuote::compute(&draft, Some(&market()), Some(d("30000")));

        // sizeInBase = 9900e6 * 1e6 / 3e12 = 3300; dynamic = 1650 * 0.1
        assert_eq!(quote.dynamic_spread, Some(d("165")));
        assert_eq!(quote.spread, Some(d("165.05")));
        assert!(quote.open_price_normalized.is_some());
        assert_eq!(quote.leverage_normalized.map(|l| l.to_string()), Some("10000000".to_string()));
        assert_eq!(quote.collateral_normalized.map(|c| c.to_string()), Some("1000000000".to_string()));
    }
}
