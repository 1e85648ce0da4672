//! Liquidation and deleveraging scenarios
//!
//! Carl holds a liquidatable BTC position; Dave's subaccounts provide the
//! resting orders and the offsetting positions. Every scenario runs a single
//! liquidation pass at block 2 and checks the resulting balances.

mod common;

use common::*;
use perpliq::clob::HaltReason;
use perpliq::common::*;
use perpliq::engine::*;

fn assert_account(state: &ExchangeState, id: &SubaccountId, quote: i128, btc_quantums: i128) {
    let s = get(state, id);
    assert_eq!(s.quote_balance(), quote, "quote balance of {}", id);
    assert_eq!(s.position_quantums(BTC_PERPETUAL_ID), btc_quantums, "BTC position of {}", id);
}

// ============================================================================
// MATCHING
// ============================================================================

#[test]
fn test_full_fill_pays_capped_fee() {
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .orders(vec![order(dave(), Side::Sell, 100_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 100_000_000);
    assert_eq!(p.halted, None);
    assert!(p.deleveraging.is_none());
    assert_eq!(p.residual_quantums, 0);
    assert_eq!(p.residual_reason, None);
    // Surplus of $499 over bankruptcy; fee capped at 0.5% of $50,000
    assert_eq!(p.fees(), 250_000_000);

    assert_account(&state, &carl(), 249_000_000, 0);
    assert_account(&state, &dave(), 100_000_000_000, 0);
    assert_eq!(state.insurance.balance, 250_000_000);
    assert_eq!(state.book.order_count(), 0);
}

#[test]
fn test_non_linear_margin_makes_long_liquidatable() {
    let carl_long = subaccount(carl(), -40_001_000_000, ONE_BTC);
    let (state, report) = Scenario::new(vec![carl_long, dave_1btc_long_50000()])
        .tiers(vec![non_linear_tier()])
        .orders(vec![order(dave(), Side::Buy, 100_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let l = liquidation(&report, &carl());
    // $50,000 notional is 4x the base notional: margin fractions double
    assert_eq!(l.risk_before.maintenance_margin, 10_000_000_000);
    assert_eq!(l.risk_before.net_collateral, 9_999_000_000);

    let p = &l.positions[0];
    let order = p.order.as_ref().expect("liquidation order");
    assert_eq!(order.side, Side::Sell);
    assert_eq!(order.subticks, subticks(49_999));
    assert_eq!(p.filled_quantums, 100_000_000);

    assert_account(&state, &carl(), -40_001_000_000 + 50_000_000_000 - 250_000_000, 0);
    assert_account(&state, &dave(), 0, 2 * ONE_BTC);
}

#[test]
fn test_collateral_at_maintenance_is_not_liquidated() {
    let carl_long = subaccount(carl(), -40_000_000_000, ONE_BTC);
    let (state, report) = Scenario::new(vec![carl_long.clone(), dave_1btc_long_50000()])
        .tiers(vec![non_linear_tier()])
        .orders(vec![order(dave(), Side::Buy, 100_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    assert_eq!(
        report.outcome(&carl()),
        Some(&AccountOutcome::Skipped(SkipReason::NotLiquidatable))
    );
    assert_eq!(get(&state, &carl()), carl_long);
    assert_account(&state, &dave(), 50_000_000_000, ONE_BTC);
    assert_eq!(state.book.order_count(), 1);
}

#[test]
fn test_partial_fill_stops_at_fillable_price() {
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .orders(vec![
            order(dave(), Side::Sell, 25_000_000, 50_000, 10),
            order(dave(), Side::Sell, 100_000_000, 60_000, 10),
        ])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 25_000_000);
    assert_eq!(p.fees(), 62_500_000);
    assert!(p.deleveraging.is_none());
    assert_eq!(p.residual_quantums, 75_000_000);
    assert_eq!(p.residual_reason, Some(PerpliqError::InsufficientLiquidity));

    assert_account(&state, &carl(), 50_499_000_000 - 12_500_000_000 - 62_500_000, -75_000_000);
    assert_account(&state, &dave(), 62_500_000_000, 75_000_000);
    // The $60,000 ask is out of reach and keeps resting
    assert_eq!(state.book.order_count(), 1);
}

// ============================================================================
// INSURANCE FUND
// ============================================================================

#[test]
fn test_empty_fund_hands_position_to_deleveraging() {
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .oracle(50_500)
        .orders(vec![order(dave(), Side::Sell, 25_000_000, 50_500, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 0);
    assert_eq!(p.halted, Some(HaltReason::InsuranceFundInsufficient));

    let d = p.deleveraging.as_ref().expect("deleveraged");
    assert_eq!(d.deleveraged_quantums, 100_000_000);
    assert_eq!(d.fills.len(), 1);
    assert_eq!(d.fills[0].offsetting, dave());
    assert_eq!(p.residual_quantums, 0);
    assert_eq!(p.residual_reason, None);

    assert!(get(&state, &carl()).is_empty());
    assert_account(&state, &dave(), 100_499_000_000, 0);
    assert_eq!(state.insurance.balance, 0);
}

#[test]
fn test_funded_shortfall_above_threshold_waits_for_next_block() {
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .oracle(50_500)
        .orders(vec![
            order(dave(), Side::Sell, 25_000_000, 50_498, 10),
            order(dave(), Side::Sell, 100_000_000, 50_500, 11),
        ])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.fills.len(), 1);
    assert_eq!(p.fees(), 250_000);
    assert_eq!(p.halted, Some(HaltReason::InsuranceFundInsufficient));
    // The fee lifted the fund above zero, so the position is not deleveraged
    assert!(p.deleveraging.is_none());
    assert_eq!(p.residual_quantums, 75_000_000);
    assert_eq!(
        p.residual_reason,
        Some(PerpliqError::InsuranceFundInsufficient {
            required: 750_000,
            available: 250_000,
        })
    );

    assert_account(&state, &carl(), 50_499_000_000 - 12_624_500_000 - 250_000, -75_000_000);
    assert_account(&state, &dave(), 50_000_000_000 + 12_624_500_000, 75_000_000);
    assert_eq!(state.insurance.balance, 250_000);
}

#[test]
fn test_insurance_loss_limit_does_not_block_deleveraging() {
    let mut config = max_smmr_config();
    config.subaccount_block_limits = SubaccountBlockLimits {
        max_notional_liquidated: u64::MAX,
        max_quantums_insurance_lost: 1,
    };
    let (state, report) = Scenario::new(vec![carl_1btc_short_49999(), dave_1btc_long_50000()])
        .config(config)
        .insurance(10_000_000_000)
        .orders(vec![order(dave(), Side::Sell, 25_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    // The fund could pay the $0.25 loss, the per-block budget cannot
    assert_eq!(p.halted, Some(HaltReason::InsuranceLossLimit));
    assert_eq!(p.filled_quantums, 0);
    assert_eq!(p.deleveraged_quantums(), 100_000_000);
    assert_eq!(p.residual_quantums, 0);
    assert_eq!(p.residual_reason, None);

    assert!(get(&state, &carl()).is_empty());
    assert_account(&state, &dave(), 99_999_000_000, 0);
    assert_eq!(state.insurance.balance, 10_000_000_000);
}

// ============================================================================
// BLOCK LIMITS
// ============================================================================

#[test]
fn test_position_portion_limit_leaves_solvent_remainder() {
    let mut config = max_smmr_config();
    config.position_block_limits.max_position_portion_liquidated_ppm = 100_000;
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .config(config)
        .orders(vec![order(dave(), Side::Sell, 100_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 10_000_000);
    assert_eq!(p.halted, None);
    // Carl is still solvent, so the rest waits for a later block
    assert!(p.deleveraging.is_none());
    assert_eq!(p.residual_quantums, 90_000_000);
    assert_eq!(p.residual_reason, Some(PerpliqError::InsufficientLiquidity));
    // $49.90 surplus, fee capped at 0.5% of $5,000
    assert_eq!(p.fees(), 25_000_000);

    assert_account(&state, &carl(), 45_474_000_000, -90_000_000);
    assert_account(&state, &dave(), 55_000_000_000, 90_000_000);
    assert_eq!(state.insurance.balance, 25_000_000);
    assert_eq!(state.book.order_count(), 1);
}

#[test]
fn test_subaccount_notional_limit_hands_remainder_to_deleveraging() {
    let mut config = max_smmr_config();
    config.subaccount_block_limits.max_notional_liquidated = 12_500_000_000;
    let (state, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .config(config)
        .orders(vec![order(dave(), Side::Sell, 100_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    let o = p.order.as_ref().expect("liquidation order");
    assert_eq!(o.quantums, 25_000_000);
    assert_eq!(p.filled_quantums, 25_000_000);
    assert_eq!(p.halted, None);
    assert_eq!(p.fees(), 62_500_000);

    // $37,500 of notional is closed although the block budget is spent
    let d = p.deleveraging.as_ref().expect("deleveraged");
    assert_eq!(d.deleveraged_quantums, 75_000_000);
    assert_eq!(d.fills.len(), 1);
    assert_eq!(d.fills[0].offsetting, dave());
    assert_eq!(p.residual_quantums, 0);
    assert_eq!(p.residual_reason, None);

    assert!(get(&state, &carl()).is_empty());
    assert_account(&state, &dave(), 100_436_500_000, 0);
    assert_eq!(state.insurance.balance, 62_500_000);
    // The unfilled part of Dave's ask keeps resting
    assert_eq!(state.book.order_count(), 1);
}

// ============================================================================
// DELEVERAGING
// ============================================================================

#[test]
fn test_deleveraging_without_overlapping_counterparty() {
    let (state, report) = Scenario::new(vec![carl_1btc_short_49999(), dave_1btc_long_50000_short()])
        .orders(vec![order(dave(), Side::Sell, 25_000_000, 50_000, 10)])
        .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 0);
    let d = p.deleveraging.as_ref().expect("deleveraging attempted");
    assert_eq!(d.deleveraged_quantums, 0);
    assert_eq!(d.skipped, vec![dave()]);
    assert_eq!(p.residual_quantums, 100_000_000);
    assert_eq!(p.residual_reason, Some(PerpliqError::NoDeleveragingCounterparty));

    assert_account(&state, &carl(), 49_999_000_000, -ONE_BTC);
    assert_account(&state, &dave(), -50_000_000_000, ONE_BTC);
}

#[test]
fn test_zero_fee_fill_then_no_counterparty() {
    let (state, report) = Scenario::new(vec![
        carl_1btc_short_49999(),
        dave_1btc_long_50000_short(),
        dave_1_long(25_000_000),
    ])
    .orders(vec![
        order(dave(), Side::Sell, 25_000_000, 50_000, 10),
        order(dave_1(), Side::Sell, 25_000_000, 49_999, 10),
    ])
    .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    assert_eq!(p.filled_quantums, 25_000_000);
    assert_eq!(p.fees(), 0);
    assert_eq!(p.fills[0].fill.maker, dave_1());
    assert_eq!(p.halted, Some(HaltReason::InsuranceFundInsufficient));
    assert_eq!(p.residual_quantums, 75_000_000);
    assert_eq!(p.residual_reason, Some(PerpliqError::NoDeleveragingCounterparty));

    assert_account(&state, &carl(), 49_999_000_000 - 12_499_750_000, -75_000_000);
    assert_account(&state, &dave(), -50_000_000_000, ONE_BTC);
    assert_account(&state, &dave_1(), 62_499_750_000, 0);
}

#[test]
fn test_deleveraging_skips_to_next_counterparty() {
    let (state, report) = Scenario::new(vec![
        carl_1btc_short_49999(),
        dave_1btc_long_50000_short(),
        dave_1_long(50_000_000),
    ])
    .orders(vec![order(dave(), Side::Sell, 25_000_000, 50_000, 10)])
    .liquidate(&[carl()]);

    let p = btc_liquidation(&report, &carl());
    let d = p.deleveraging.as_ref().expect("deleveraged");
    assert_eq!(d.skipped, vec![dave()]);
    assert_eq!(d.fills.len(), 1);
    assert_eq!(d.fills[0].offsetting, dave_1());
    assert_eq!(d.deleveraged_quantums, 50_000_000);
    assert_eq!(p.residual_quantums, 50_000_000);

    assert_account(&state, &carl(), 49_999_000_000 - 24_999_500_000, -50_000_000);
    assert_account(&state, &dave(), -50_000_000_000, ONE_BTC);
    assert_account(&state, &dave_1(), 74_999_500_000, 0);
}

// ============================================================================
// BATCHES
// ============================================================================

#[test]
fn test_batch_reports_every_candidate_once() {
    let ghost = SubaccountId::new("eve", 0);
    let (_, report) = Scenario::new(vec![carl_1btc_short_50499(), dave_1btc_long_50000()])
        .orders(vec![order(dave(), Side::Sell, 100_000_000, 50_000, 10)])
        .liquidate(&[ghost.clone(), dave(), carl(), carl()]);

    let ids: Vec<&SubaccountId> = report.outcomes.iter().map(|(id, _)| id).collect();
    assert_eq!(ids, vec![&carl(), &dave(), &ghost]);
    assert_eq!(report.liquidated_count(), 1);
    assert_eq!(report.block_height, 2);
    assert_eq!(report.fees_collected, 250_000_000);
    assert_eq!(
        report.outcome(&ghost),
        Some(&AccountOutcome::Skipped(SkipReason::NotFound))
    );
}

#[test]
fn test_liquidatable_subaccounts_scan() {
    let state = Scenario::new(vec![
        carl_1btc_short_49999(),
        dave_1btc_long_50000(),
        dave_1_long(25_000_000),
    ])
    .build();

    assert_eq!(liquidatable_subaccounts(&state).unwrap(), vec![carl()]);
}
