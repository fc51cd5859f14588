//! Valuation of an open position: capped PnL, net value, PnL after fees and the
//! percentage figures shown next to them.
//!
//! All amounts are in the vault's 6-decimal fixed-point units; leverage is raw (x10^6).

use crate::domain::normalize::{decimal_leverage, MAX_PNL_RATE_DECIMALS};
use crate::domain::{Decimal, OpenPosition};
use crate::engine::memo::MemoCache;
use serde::Serialize;

/// Display precision of percentages and USD sizes.
const DISPLAY_DECIMALS: u32 = 2;

pub fn collateral_after_fee(initial_collateral: Decimal, open_fee: Decimal) -> Option<Decimal> {
    initial_collateral.checked_sub(open_fee)
}

/// PnL capped at `max_pnl_rate / 10^12` times the net collateral, sign preserved.
///
/// Without a rate the raw PnL is returned.
pub fn limited_pnl(
    initial_collateral: Decimal,
    open_fee: Decimal,
    pnl: Decimal,
    max_pnl_rate: Option<Decimal>,
) -> Option<Decimal> {
    let Some(rate) = max_pnl_rate else {
        return Some(pnl);
    };
    let cap = collateral_after_fee(initial_collateral, open_fee)?
        .checked_mul(rate)?
        .checked_div(Decimal::pow10(MAX_PNL_RATE_DECIMALS)?)?;
    let capped = pnl.abs().min(cap);
    Some(if pnl.is_negative() { -capped } else { capped })
}

/// `max(0, initial_collateral - open_fee + limited_pnl)`.
pub fn net_value(initial_collateral: Decimal, open_fee: Decimal, limited_pnl: Decimal) -> Option<Decimal> {
    let value = collateral_after_fee(initial_collateral, open_fee)?.checked_add(limited_pnl)?;
    Some(value.max(Decimal::zero()))
}

/// PnL net of open and close fees. A loss never exceeds the initial collateral.
pub fn pnl_after_fees(
    limited_pnl: Decimal,
    open_fee: Decimal,
    initial_collateral: Decimal,
    close_fee: Decimal,
) -> Option<Decimal> {
    let result = limited_pnl.checked_sub(open_fee)?.checked_sub(close_fee)?;
    if result.is_negative() {
        return Some(-initial_collateral.min(result.abs()));
    }
    Some(result)
}

pub fn receive_value(initial_collateral: Decimal, limited_pnl: Decimal, fees: Decimal) -> Option<Decimal> {
    initial_collateral.checked_add(limited_pnl)?.checked_sub(fees)
}

/// `value * 100 / base`, two decimals.
pub fn percent_of(value: Decimal, base: Decimal) -> Option<Decimal> {
    Some(
        value
            .checked_mul(Decimal::hundred())?
            .checked_div(base)?
            .round_dp(DISPLAY_DECIMALS),
    )
}

/// Notional size in USD for a 6-decimal collateral and raw leverage.
pub fn size_usd(collateral: Decimal, leverage_raw: Decimal) -> Option<Decimal> {
    Some(
        collateral
            .checked_mul(decimal_leverage(leverage_raw)?)?
            .checked_div(Decimal::pow10(6)?)?
            .round_dp(DISPLAY_DECIMALS),
    )
}

/// Every figure derived from one open position. Recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedValuation {
    pub collateral_after_fee: Option<Decimal>,
    pub fees: Option<Decimal>,
    pub limited_pnl: Option<Decimal>,
    pub limited_pnl_percent: Option<Decimal>,
    pub net_value: Option<Decimal>,
    pub net_value_percent: Option<Decimal>,
    pub net_value_change: Option<Decimal>,
    pub net_value_change_percent: Option<Decimal>,
    pub pnl_after_fees: Option<Decimal>,
    pub pnl_after_fees_percent: Option<Decimal>,
    pub receive_value: Option<Decimal>,
    pub receive_value_percent: Option<Decimal>,
    pub fees_percent: Option<Decimal>,
    pub size_usd: Option<Decimal>,
}

/// Argument tuple of a valuation; the memoization key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValuationInputs {
    pub initial_collateral: Decimal,
    pub open_fee: Decimal,
    pub close_fee: Decimal,
    pub pnl: Decimal,
    pub leverage: Decimal,
    pub max_pnl_rate: Option<Decimal>,
}

impl ValuationInputs {
    pub fn from_position(position: &OpenPosition, max_pnl_rate: Option<Decimal>) -> Self {
        Self {
            initial_collateral: position.initial_collateral,
            open_fee: position.open_fee,
            close_fee: Decimal::zero(),
            pnl: position.pnl,
            leverage: position.leverage,
            max_pnl_rate,
        }
    }
}

impl DerivedValuation {
    pub fn compute(inputs: &ValuationInputs) -> Self {
        let ic = inputs.initial_collateral;
        let collateral = collateral_after_fee(ic, inputs.open_fee);
        let limited = limited_pnl(ic, inputs.open_fee, inputs.pnl, inputs.max_pnl_rate);
        let fees = inputs.open_fee.checked_add(inputs.close_fee);
        let net = limited.and_then(|l| net_value(ic, inputs.open_fee, l));
        let after_fees =
            limited.and_then(|l| pnl_after_fees(l, inputs.open_fee, ic, inputs.close_fee));
        let receive = limited.zip(fees).and_then(|(l, f)| receive_value(ic, l, f));

        Self {
            collateral_after_fee: collateral,
            fees,
            limited_pnl: limited,
            limited_pnl_percent: limited.and_then(|l| percent_of(l, ic)),
            net_value: net,
            net_value_percent: net.and_then(|n| percent_of(n, ic)),
            net_value_change: limited,
            net_value_change_percent: limited.zip(collateral).and_then(|(l, c)| percent_of(l, c)),
            pnl_after_fees: after_fees,
            pnl_after_fees_percent: after_fees.and_then(|p| percent_of(p, ic)),
            receive_value: receive,
            receive_value_percent: receive
                .and_then(|r| r.checked_sub(ic))
                .and_then(|gain| percent_of(gain, ic)),
            fees_percent: fees.and_then(|f| percent_of(f, ic)),
            size_usd: collateral.and_then(|c| size_usd(c, inputs.leverage)),
        }
    }
}

/// Memoizing front of [`DerivedValuation::compute`].
pub struct Valuator {
    cache: MemoCache<ValuationInputs, DerivedValuation>,
}

impl Valuator {
    pub fn new(capacity: usize) -> Self {
        Self {
            cache: MemoCache::new(capacity),
        }
    }

    pub fn value(&self, position: &OpenPosition, max_pnl_rate: Option<Decimal>) -> DerivedValuation {
        let inputs = ValuationInputs::from_position(position, max_pnl_rate);
        self.cache.get_or_compute(inputs, DerivedValuation::compute)
    }

    pub fn cached(&self) -> usize {
        self.cache.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_limited_pnl_caps_both_signs() {
        // cap = 990 * 5e11 / 1e12 = 495
        let rate = Some(d("500000000000"));
        assert_eq!(limited_pnl(d("1000"), d("10"), d("700"), rate), Some(d("495")));
        assert_eq!(limited_pnl(d("1000"), d("10"), d("-700"), rate), Some(d("-495")));
        assert_eq!(limited_pnl(d("1000"), d("10"), d("100"), rate), Some(d("100")));
        assert_eq!(limited_pnl(d("1000"), d("10"), d("700"), None), Some(d("700")));
    }

    #[test]
    fn test_net_value_floor_at_zero() {
        assert_eq!(net_value(d("1000"), d("10"), d("-2000")), Some(Decimal::zero()));
        assert_eq!(net_value(d("1000"), d("10"), d("50")), Some(d("1040")));
    }

    #[test]
    fn test_pnl_after_fees_loss_cap() {
        assert_eq!(pnl_after_fees(d("-5000"), d("10"), d("1000"), Decimal::zero()), Some(d("-1000")));
        assert_eq!(pnl_after_fees(d("-100"), d("10"), d("1000"), d("5")), Some(d("-115")));
        assert_eq!(pnl_after_fees(d("100"), d("10"), d("1000"), Decimal::zero()), Some(d("90")));
    }

    #[test]
    fn test_size_usd() {
        // 990_000_000 * 10 / 1e6 = 9900.00
        assert_eq!(size_usd(d("990000000"), d("10000000")), Some(d("9900")));
    }

    #[test]
    fn test_compute_full_valuation() {
        let inputs = ValuationInputs {
            initial_collateral: d("1000000000"),
            open_fee: d("10000000"),
            close_fee: Decimal::zero(),
            pnl: d("50000000"),
            leverage: d("10000000"),
            max_pnl_rate: None,
        };
        let v = DerivedValuation::compute(&inputs);
        assert_eq!(v.collateral_after_fee, Some(d("990000000")));
        assert_eq!(v.limited_pnl, Some(d("50000000")));
        assert_eq!(v.net_value, Some(d("1040000000")));
        assert_eq!(v.net_value_change_percent, Some(d("5.05")));
        assert_eq!(v.pnl_after_fees, Some(d("40000000")));
        assert_eq!(v.pnl_after_fees_percent, Some(d("4")));
        assert_eq!(v.receive_value, Some(d("1040000000")));
        assert_eq!(v.receive_value_percent, Some(d("4")));
        assert_eq!(v.limited_pnl_percent, Some(d("5")));
        assert_eq!(v.net_value_percent, Some(d("104")));
        assert_eq!(v.fees_percent, Some(d("1")));
        assert_eq!(v.size_usd, Some(d("9900")));
    }

    #[test]
    fn test_zero_collateral_percentages_undefined() {
        let inputs = ValuationInputs {
            initial_collateral: Decimal::zero(),
            open_fee: Decimal::zero(),
            close_fee: Decimal::zero(),
            pnl: Decimal::zero(),
            leverage: d("1000000"),
            max_pnl_rate: None,
        };
        let v = DerivedValuation::compute(&inputs);
        assert_eq!(v.net_value, Some(Decimal::zero()));
        assert_eq!(v.pnl_after_fees_percent, None);
        assert_eq!(v.net_value_change_percent, None);
    }
}
