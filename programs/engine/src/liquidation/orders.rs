//! Liquidation order generation
//!
//! Sizes a synthetic order for one position under the per-position and
//! per-subaccount block limits, priced at the position's fillable price.

use log::debug;
use perpliq_clob::LiquidationOrder;
use perpliq_common::*;

use crate::risk::{fillable_price_subticks, margin_requirements, position_risk};
use crate::state::ExchangeState;

/// What the generator decided for one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionPlan {
    pub perpetual_id: u32,
    pub clob_pair_id: u32,
    /// Order to match, if any size may be liquidated this block
    pub order: Option<LiquidationOrder>,
    /// The subaccount's per-block notional budget kept part or all of the
    /// position out of the order
    pub clipped_by_subaccount_notional: bool,
    /// Clob pair is not active; the position is left alone
    pub inactive: bool,
}

/// Notional (quote quantums) that may be liquidated from a position this block
///
/// Returns `None` when the subaccount's remaining block budget is below the
/// position's minimum liquidation notional.
pub fn liquidatable_notional(
    config: &LiquidationsConfig,
    position_notional: u128,
    remaining_subaccount_notional: u128,
) -> Result<Option<u128>> {
    let limits = &config.position_block_limits;
    let min_notional = (limits.min_position_notional_liquidated as u128).min(position_notional);
    let max_notional = mul_ppm_floor(position_notional, limits.max_position_portion_liquidated_ppm as u64)?
        .max(min_notional);

    let notional = max_notional.min(remaining_subaccount_notional);
    if notional < min_notional {
        return Ok(None);
    }
    Ok(Some(notional))
}

/// Plan the liquidation of a subaccount's position in one perpetual
pub fn plan_position_liquidation(
    state: &ExchangeState,
    subaccount: &Subaccount,
    perpetual_id: u32,
) -> Result<PositionPlan> {
    let clob_pair_id = state.markets.clob_pair_id_for(perpetual_id)?;
    let clob_pair = state
        .book
        .clob_pair(clob_pair_id)
        .ok_or(PerpliqError::ClobPairNotFound(clob_pair_id))?;

    let mut plan = PositionPlan {
        perpetual_id,
        clob_pair_id,
        order: None,
        clipped_by_subaccount_notional: false,
        inactive: false,
    };

    let quantums = subaccount.position_quantums(perpetual_id);
    let position = position_risk(&state.markets, &state.oracle, perpetual_id, quantums)?;
    if !clob_pair.is_active() {
        debug!(
            "liquidation: clob pair {} is {}, skipping {} perpetual {}",
            clob_pair_id, clob_pair.status, subaccount.id, perpetual_id
        );
        plan.inactive = true;
        return Ok(plan);
    }
    if quantums == 0 {
        return Ok(plan);
    }

    let abs_quantums = u64::try_from(quantums.unsigned_abs()).map_err(|_| PerpliqError::Overflow)?;
    let abs_notional = position.net_notional.unsigned_abs();
    let remaining = state
        .block
        .remaining_notional(&subaccount.id, &state.config.subaccount_block_limits);

    let size = if abs_notional == 0 {
        abs_quantums
    } else {
        match liquidatable_notional(&state.config, abs_notional, remaining)? {
            Some(notional) => {
                let by_notional = notional
                    .checked_mul(abs_quantums as u128)
                    .ok_or(PerpliqError::Overflow)?
                    / abs_notional;
                (by_notional.min(abs_quantums as u128)) as u64
            }
            None => 0,
        }
    };
    let size = round_to_step(size, clob_pair.step_base_quantums);
    if size < abs_quantums && abs_notional > 0 {
        // Only the subaccount budget counts here; the position portion limit
        // spreads a liquidation over blocks.
        let unbudgeted = liquidatable_notional(&state.config, abs_notional, u128::MAX)?;
        plan.clipped_by_subaccount_notional = unbudgeted.is_some_and(|notional| remaining < notional);
    }

    if size == 0 {
        debug!(
            "liquidation: block limits leave nothing to liquidate for {} perpetual {}",
            subaccount.id, perpetual_id
        );
        return Ok(plan);
    }

    let risk = margin_requirements(&state.markets, &state.oracle, subaccount)?;
    let subticks = fillable_price_subticks(
        &state.config.fillable_price_config,
        clob_pair,
        &position,
        &risk,
    )?;

    plan.order = Some(LiquidationOrder {
        subaccount_id: subaccount.id.clone(),
        clob_pair_id,
        perpetual_id,
        side: Side::closing(quantums),
        quantums: size,
        subticks,
    });
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min: u64, portion_ppm: u32) -> LiquidationsConfig {
        let mut cfg = LiquidationsConfig::standard();
        cfg.position_block_limits = PositionBlockLimits {
            min_position_notional_liquidated: min,
            max_position_portion_liquidated_ppm: portion_ppm,
        };
        cfg
    }

    #[test]
    fn test_full_position_under_default_limits() {
        let cfg = config(1_000, 1_000_000);
        assert_eq!(
            liquidatable_notional(&cfg, 50_000_000_000, u128::MAX).unwrap(),
            Some(50_000_000_000)
        );
    }

    #[test]
    fn test_portion_limit_with_minimum_floor() {
        let cfg = config(10_000_000_000, 100_000);
        // 10% of 50,000 is 5,000, raised to the 10,000 minimum
        assert_eq!(
            liquidatable_notional(&cfg, 50_000_000_000, u128::MAX).unwrap(),
            Some(10_000_000_000)
        );
        // Small positions are liquidated whole
        assert_eq!(
            liquidatable_notional(&cfg, 3_000_000_000, u128::MAX).unwrap(),
            Some(3_000_000_000)
        );
    }

    #[test]
    fn test_subaccount_budget_clips_or_skips() {
        let cfg = config(1_000_000_000, 1_000_000);
        assert_eq!(
            liquidatable_notional(&cfg, 50_000_000_000, 20_000_000_000).unwrap(),
            Some(20_000_000_000)
        );
        assert_eq!(liquidatable_notional(&cfg, 50_000_000_000, 999_999_999).unwrap(), None);
    }
}
