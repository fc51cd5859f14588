use perpdesk::domain::normalize::{denormalize_amount, normalize_amount};
use perpdesk::domain::{Decimal, MarketSnapshot, PositionType};
use perpdesk::engine::sizing::{self, LiquidationParams};
use perpdesk::engine::{pricing, valuation};
use proptest::prelude::*;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

fn snapshot(total_longs: i64, total_shorts: i64, depth: i64) -> MarketSnapshot {
    MarketSnapshot {
        open_fee_rate_percent: d("0.1"),
        base_spread_rate_percent: d("0.05"),
        max_leverage: d("100"),
        total_longs: Decimal::from_i64(total_longs),
        total_shorts: Decimal::from_i64(total_shorts),
        max_total_longs_usd: d("1000000000"),
        max_total_shorts_usd: d("1000000000"),
        depth: Decimal::from_i64(depth),
    }
}

#[test]
fn reference_scenario() {
    let fee = sizing::open_fee(d("1000"), d("10"), d("0.1")).unwrap();
    assert_eq!(fee, d("10"));
    let position = sizing::position_from_collateral(d("1000"), fee, d("10")).unwrap();
    assert_eq!(position, d("9900"));
    let collateral = sizing::collateral_from_position(position, d("10"), d("0.1")).unwrap();
    assert_eq!(collateral, d("1000"));

    let liq = sizing::liquidation_price(&LiquidationParams {
        collateral: d("1000"),
        open_fee: fee,
        open_price: d("30000"),
        leverage: d("10"),
        base_spread_percent: d("0.05"),
        pos_type: PositionType::Long,
    })
    .unwrap();
    assert!(liq < d("30000"));
    assert!(sizing::is_spread_valid(d("30000"), liq, PositionType::Long));
}

#[test]
fn round_trip_at_default_leverage() {
    let collateral = d("0.000001");
    let fee = sizing::open_fee(collateral, Decimal::one(), d("0.1")).unwrap();
    let position = sizing::position_from_collateral(collateral, fee, Decimal::one()).unwrap();
    let back = sizing::collateral_from_position(position, Decimal::one(), d("0.1")).unwrap();
    assert!(back.checked_sub(collateral).unwrap().abs() <= d("0.000001"));
}

#[test]
fn undefined_price_propagates() {
    let market = snapshot(0, 0, 1);
    assert_eq!(pricing::dynamic_spread(&market, d("9900000000"), Decimal::zero(), PositionType::Long), None);
}

proptest! {
    #[test]
    fn sizing_round_trip_within_one_micro(
        collateral_micros in 1i64..100_000_000_000,
        leverage_hundredths in 100i64..=10_000,
        fee_bps in 0i64..=10,
    ) {
        let collateral = Decimal::from_scaled(collateral_micros, 6);
        let leverage = Decimal::from_scaled(leverage_hundredths, 2);
        let fee_rate = Decimal::from_scaled(fee_bps, 2);

        let fee = sizing::open_fee(collateral, leverage, fee_rate).unwrap();
        let position = sizing::position_from_collateral(collateral, fee, leverage).unwrap();
        let back = sizing::collateral_from_position(position, leverage, fee_rate).unwrap();

        let error = back.checked_sub(collateral).unwrap().abs();
        prop_assert!(error <= d("0.000001"), "{} -> {} -> {}", collateral, position, back);
    }

    #[test]
    fn normalize_inverts_denormalize(raw in 0u64..1_000_000_000_000_000_000, decimals in 0u32..=8) {
        let value = Decimal::from_u128(raw as u128).unwrap();
        let denormalized = denormalize_amount(value, decimals, 0).unwrap();
        let normalized = normalize_amount(denormalized, decimals).unwrap();
        prop_assert_eq!(normalized.to_u128(), Some(raw as u128));
    }

    #[test]
    fn dynamic_spread_non_decreasing_in_imbalance(
        side in 0i64..1_000_000,
        extra in 0i64..1_000_000,
        opposite in 0i64..1_000_000,
        depth in 1i64..1_000,
        position in 1i64..1_000_000_000_000,
    ) {
        let price = d("3000000000000");
        let position = Decimal::from_i64(position);
        let lower = pricing::dynamic_spread(&snapshot(side, opposite, depth), position, price, PositionType::Long).unwrap();
        let higher = pricing::dynamic_spread(&snapshot(side + extra, opposite, depth), position, price, PositionType::Long).unwrap();
        prop_assert!(lower >= Decimal::zero());
        prop_assert!(higher >= lower);
    }

    #[test]
    fn net_value_never_negative(
        collateral in 1i64..1_000_000_000_000,
        fee_share in 0i64..=100,
        pnl in -10_000_000_000_000i64..10_000_000_000_000,
        rate in proptest::option::of(0i64..10_000_000_000_000),
    ) {
        let ic = Decimal::from_i64(collateral);
        let fee = Decimal::from_i64(collateral * fee_share / 1000);
        let rate = rate.map(Decimal::from_i64);
        let limited = valuation::limited_pnl(ic, fee, Decimal::from_i64(pnl), rate).unwrap();
        let net = valuation::net_value(ic, fee, limited).unwrap();
        prop_assert!(net >= Decimal::zero());
    }

    #[test]
    fn loss_after_fees_bounded_by_collateral(
        collateral in 1i64..1_000_000_000_000,
        fee in 0i64..1_000_000_000,
        close_fee in 0i64..1_000_000_000,
        pnl in -10_000_000_000_000i64..10_000_000_000_000,
    ) {
        let ic = Decimal::from_i64(collateral);
        let result = valuation::pnl_after_fees(
            Decimal::from_i64(pnl),
            Decimal::from_i64(fee),
            ic,
            Decimal::from_i64(close_fee),
        )
        .unwrap();
        if result.is_negative() {
            prop_assert!(result.abs() <= ic);
        }
    }

    #[test]
    fn liquidation_on_losing_side(
        collateral_cents in 100i64..100_000_000,
        leverage in 1i64..=100,
        fee_bps in 0i64..=10,
        spread_bps in 0i64..=10,
        price in 1i64..100_000,
        short in any::<bool>(),
    ) {
        let collateral = Decimal::from_scaled(collateral_cents, 2);
        let leverage = Decimal::from_i64(leverage);
        let open_price = Decimal::from_i64(price);
        let pos_type = if short { PositionType::Short } else { PositionType::Long };
        let fee = sizing::open_fee(collateral, leverage, Decimal::from_scaled(fee_bps, 2)).unwrap();

        let liq = sizing::liquidation_price(&LiquidationParams {
            collateral,
            open_fee: fee,
            open_price,
            leverage,
            base_spread_percent: Decimal::from_scaled(spread_bps, 2),
            pos_type,
        })
        .unwrap();

        if short {
            prop_assert!(liq > open_price);
        } else {
            prop_assert!(liq < open_price);
        }
    }
}
