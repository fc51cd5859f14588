//! Entry pricing: imbalance-driven dynamic spread and the resulting open price.

use crate::domain::normalize::PRICE_DECIMALS;
use crate::domain::{Decimal, MarketSnapshot, PositionType};

/// Fraction of the imbalance/depth ratio added to the spread (0.1).
fn dynamic_spread_factor() -> Decimal {
    Decimal::from_scaled(1, 1)
}

/// Share of the new position counted toward its own side's open interest (0.5).
fn self_impact_share() -> Decimal {
    Decimal::from_scaled(5, 1)
}

/// Dynamic spread in percent for a candidate position.
///
/// `position_normalized` is the position size at 6 decimals and `price_normalized` the
/// live price at 8 decimals. Never negative: a position that reduces the imbalance gets
/// no dynamic component.
pub fn dynamic_spread(
    market: &MarketSnapshot,
    position_normalized: Decimal,
    price_normalized: Decimal,
    pos_type: PositionType,
) -> Option<Decimal> {
    let (side_total, opposite_total) = match pos_type {
        PositionType::Long => (market.total_longs, market.total_shorts),
        PositionType::Short => (market.total_shorts, market.total_longs),
    };

    let size_in_base = position_normalized
        .checked_mul(Decimal::pow10(6)?)?
        .checked_div(price_normalized)?;
    let imbalance = side_total
        .checked_add(size_in_base.checked_mul(self_impact_share())?)?
        .checked_sub(opposite_total)?;
    let spread = imbalance
        .checked_div(market.depth)?
        .checked_mul(dynamic_spread_factor())?;

    Some(spread.max(Decimal::zero()))
}

/// Base spread plus dynamic spread, in percent.
pub fn total_spread(base_spread_percent: Decimal, dynamic: Decimal) -> Option<Decimal> {
    base_spread_percent.checked_add(dynamic)
}

/// Entry price with the spread applied against the trader, truncated to 8 decimals.
pub fn open_price(price: Decimal, spread_percent: Decimal, pos_type: PositionType) -> Option<Decimal> {
    let markup = price
        .checked_mul(spread_percent)?
        .checked_div(Decimal::hundred())?;
    let adjusted = match pos_type {
        PositionType::Long => price.checked_add(markup)?,
        PositionType::Short => price.checked_sub(markup)?,
    };
    Some(adjusted.round_down(PRICE_DECIMALS))
}

/// Open interest of one side in USD, whole dollars.
pub fn open_interest_usd(total: Decimal, price: Decimal) -> Option<Decimal> {
    Some(
        total
            .checked_mul(price)?
            .checked_div(Decimal::pow10(6)?)?
            .round_dp(0),
    )
}
