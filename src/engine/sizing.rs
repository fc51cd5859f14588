//! Position sizing: collateral and position size in both directions, open fee,
//! liquidation price and the pre-submission validity checks.

use crate::domain::normalize::{COLLATERAL_DECIMALS, PRICE_DECIMALS};
use crate::domain::{Decimal, PositionType};

/// Share of net collateral that may be lost before liquidation (0.9).
fn maintenance_share() -> Decimal {
    Decimal::from_scaled(9, 1)
}

/// `collateral * leverage * fee_rate_percent / 100`.
pub fn open_fee(collateral: Decimal, leverage: Decimal, fee_rate_percent: Decimal) -> Option<Decimal> {
    collateral
        .checked_mul(leverage)?
        .checked_mul(fee_rate_percent)?
        .checked_div(Decimal::hundred())
}

/// Position size bought by `collateral` once the open fee is paid.
pub fn position_from_collateral(
    collateral: Decimal,
    open_fee: Decimal,
    leverage: Decimal,
) -> Option<Decimal> {
    Some(
        collateral
            .checked_sub(open_fee)?
            .checked_mul(leverage)?
            .round_dp(COLLATERAL_DECIMALS),
    )
}

/// Collateral needed for `position`, the inverse of [`position_from_collateral`].
pub fn collateral_from_position(
    position: Decimal,
    leverage: Decimal,
    fee_rate_percent: Decimal,
) -> Option<Decimal> {
    let fee_share = leverage
        .checked_mul(fee_rate_percent)?
        .checked_div(Decimal::hundred())?;
    let divisor = Decimal::one().checked_sub(fee_share)?.checked_mul(leverage)?;
    Some(position.checked_div(divisor)?.round_dp(COLLATERAL_DECIMALS))
}

/// Inputs of [`liquidation_price`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationParams {
    pub collateral: Decimal,
    pub open_fee: Decimal,
    pub open_price: Decimal,
    pub leverage: Decimal,
    pub base_spread_percent: Decimal,
    pub pos_type: PositionType,
}

/// Price at which 90% of the net collateral is gone, truncated to 8 decimals.
///
/// Undefined for non-positive collateral.
pub fn liquidation_price(params: &LiquidationParams) -> Option<Decimal> {
    if !params.collateral.is_positive() {
        return None;
    }

    let net_collateral = params.collateral.checked_sub(params.open_fee)?;
    let distance = params
        .open_price
        .checked_mul(net_collateral)?
        .checked_mul(maintenance_share())?
        .checked_div(params.collateral)?
        .checked_div(params.leverage)?;
    let spread_share = params
        .base_spread_percent
        .checked_div(Decimal::hundred())?;

    let (price, divisor) = match params.pos_type {
        PositionType::Long => (
            params.open_price.checked_sub(distance)?,
            Decimal::one().checked_sub(spread_share)?,
        ),
        PositionType::Short => (
            params.open_price.checked_add(distance)?,
            Decimal::one().checked_add(spread_share)?,
        ),
    };

    Some(price.checked_div(divisor)?.round_down(PRICE_DECIMALS))
}

/// True while the live price is on the safe side of the liquidation price.
pub fn is_spread_valid(price: Decimal, liquidation_price: Decimal, pos_type: PositionType) -> bool {
    match pos_type {
        PositionType::Long => price > liquidation_price,
        PositionType::Short => price < liquidation_price,
    }
}

/// Leverage must be at least 1x and within the market's maximum.
pub fn is_leverage_valid(leverage: Decimal, max_leverage: Decimal) -> bool {
    leverage >= Decimal::one() && leverage <= max_leverage
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_reference_scenario() {
        let fee = open_fee(d("1000"), d("10"), d("0.1")).unwrap();
        assert_eq!(fee, d("10"));
        let position = position_from_collateral(d("1000"), fee, d("10")).unwrap();
        assert_eq!(position, d("9900"));
        let collateral = collateral_from_position(position, d("10"), d("0.1")).unwrap();
        assert_eq!(collateral, d("1000"));
    }

    #[test]
    fn test_position_rounds_to_six_places() {
        let position = position_from_collateral(d("1.2345678"), Decimal::zero(), d("1")).unwrap();
        assert_eq!(position, d("1.234568"));
    }

    #[test]
    fn test_collateral_from_position_degenerate_divisor() {
        // leverage * fee = 100% leaves nothing to collateralize
        assert_eq!(collateral_from_position(d("100"), d("10"), d("10")), None);
        assert_eq!(collateral_from_position(d("100"), Decimal::zero(), d("0.1")), None);
    }

    #[test]
    fn test_liquidation_price_long_and_short() {
        let mut params = LiquidationParams {
            collateral: d("1000"),
            open_fee: d("10"),
            open_price: d("30000"),
            leverage: d("10"),
            base_spread_percent: Decimal::zero(),
            pos_type: PositionType::Long,
        };
        // distance = 30000 * 990 * 0.9 / 1000 / 10 = 2673
        assert_eq!(liquidation_price(&params), Some(d("27327")));

        params.pos_type = PositionType::Short;
        assert_eq!(liquidation_price(&params), Some(d("32673")));
    }

    #[test]
    fn test_liquidation_price_spread_adjustment() {
        let params = LiquidationParams {
            collateral: d("1000"),
            open_fee: d("10"),
            open_price: d("30000"),
            leverage: d("10"),
            base_spread_percent: d("0.05"),
            pos_type: PositionType::Long,
        };
        // 27327 / 0.9995 = 27340.67033516758...
        assert_eq!(liquidation_price(&params), Some(d("27340.67033516")));
    }

    #[test]
    fn test_liquidation_price_requires_positive_collateral() {
        let params = LiquidationParams {
            collateral: Decimal::zero(),
            open_fee: Decimal::zero(),
            open_price: d("30000"),
            leverage: d("10"),
            base_spread_percent: d("0.05"),
            pos_type: PositionType::Long,
        };
        assert_eq!(liquidation_price(&params), None);
    }

    #[test]
    fn test_spread_validity() {
        assert!(is_spread_valid(d("30000"), d("27000"), PositionType::Long));
        assert!(!is_spread_valid(d("27000"), d("27000"), PositionType::Long));
        assert!(is_spread_valid(d("30000"), d("33000"), PositionType::Short));
        assert!(!is_spread_valid(d("34000"), d("33000"), PositionType::Short));
    }

    #[test]
    fn test_leverage_validity() {
        assert!(is_leverage_valid(d("1"), d("100")));
        assert!(is_leverage_valid(d("100"), d("100")));
        assert!(!is_leverage_valid(d("0.5"), d("100")));
        assert!(!is_leverage_valid(d("101"), d("100")));
    }
}
