//! Liquidate subaccounts - runs one liquidation pass over a batch
//!
//! For each subaccount still below maintenance margin, positions are liquidated
//! in perpetual id order: a sized order is matched against the book, and any
//! leftover is handed to deleveraging when the subaccount's notional budget held
//! part of the position back, or when the account needs insurance the fund can
//! no longer give.

use std::collections::BTreeSet;

use log::{debug, error, info, warn};
use perpliq_clob::{match_liquidation_order, HaltReason, LiquidationOrder};
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::liquidation::{
    deleverage, plan_position_liquidation, DeleveragingResult, LiquidationFillProcessor, SettledFill,
};
use crate::risk::{margin_requirements, Risk};
use crate::state::{ExchangeState, SubaccountStore};

/// Why a subaccount was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SkipReason {
    NotLiquidatable,
    NotFound,
    /// Liquidatable, but no position could be worked this block
    NothingToLiquidate,
}

/// Result of liquidating one position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionLiquidation {
    pub perpetual_id: u32,
    pub clob_pair_id: u32,
    pub order: Option<LiquidationOrder>,
    pub fills: Vec<SettledFill>,
    pub filled_quantums: u64,
    pub halted: Option<HaltReason>,
    pub deleveraging: Option<DeleveragingResult>,
    /// Position size left after matching and deleveraging
    pub residual_quantums: u64,
    /// Why a residual remains, if it does
    pub residual_reason: Option<PerpliqError>,
}

impl PositionLiquidation {
    pub fn fees(&self) -> u128 {
        self.fills.iter().map(|f| f.fee).sum()
    }

    pub fn insurance_paid(&self) -> u128 {
        self.fills.iter().map(|f| f.insurance_paid).sum()
    }

    pub fn deleveraged_quantums(&self) -> u64 {
        self.deleveraging
            .as_ref()
            .map(|d| d.deleveraged_quantums)
            .unwrap_or(0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountLiquidation {
    pub risk_before: Risk,
    pub risk_after: Risk,
    pub positions: Vec<PositionLiquidation>,
}

/// Per-subaccount outcome of a pass
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountOutcome {
    Skipped(SkipReason),
    Liquidated(AccountLiquidation),
    /// Recoverable error; the batch continued
    Failed(PerpliqError),
}

/// Result of [`process_liquidate_subaccounts`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationReport {
    pub block_height: u32,
    /// Outcomes in subaccount id order
    pub outcomes: Vec<(SubaccountId, AccountOutcome)>,
    pub fees_collected: u128,
    pub insurance_paid: u128,
}

impl LiquidationReport {
    pub fn outcome(&self, id: &SubaccountId) -> Option<&AccountOutcome> {
        self.outcomes.iter().find(|(i, _)| i == id).map(|(_, o)| o)
    }

    pub fn liquidated_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| matches!(o, AccountOutcome::Liquidated(_)))
            .count()
    }
}

/// Subaccounts currently below maintenance margin, in id order
pub fn liquidatable_subaccounts(state: &ExchangeState) -> Result<Vec<SubaccountId>> {
    let mut ids = Vec::new();
    for subaccount in state.ledger.iter() {
        let risk = margin_requirements(&state.markets, &state.oracle, subaccount)?;
        if risk.is_liquidatable() {
            ids.push(subaccount.id.clone());
        }
    }
    Ok(ids)
}

/// Process a batch of liquidation candidates
///
/// # Arguments
/// * `state` - Exchange state for the current block
/// * `ids` - Candidate subaccounts; duplicates are ignored and order does not matter
///
/// # Returns
/// * `LiquidationReport` with one outcome per distinct candidate. `Err` only for
///   fatal errors, which abort the pass.
pub fn process_liquidate_subaccounts(
    state: &mut ExchangeState,
    ids: &[SubaccountId],
) -> Result<LiquidationReport> {
    let candidates: BTreeSet<&SubaccountId> = ids.iter().collect();
    let mut report = LiquidationReport {
        block_height: state.block_height(),
        ..Default::default()
    };

    for id in candidates {
        let outcome = match liquidate_subaccount(state, id) {
            Ok(outcome) => outcome,
            Err(e) if e.is_fatal() => {
                error!("Error: fatal error liquidating {}: {}", id, e);
                return Err(e);
            }
            Err(e) => {
                warn!("liquidation of {} failed: {}", id, e);
                AccountOutcome::Failed(e)
            }
        };

        if let AccountOutcome::Liquidated(liquidation) = &outcome {
            for p in &liquidation.positions {
                report.fees_collected += p.fees();
                report.insurance_paid += p.insurance_paid();
            }
        }
        report.outcomes.push((id.clone(), outcome));
    }

    info!(
        "Liquidation pass complete at height {}: {} of {} liquidated",
        report.block_height,
        report.liquidated_count(),
        report.outcomes.len()
    );
    Ok(report)
}

fn current_subaccount(state: &ExchangeState, id: &SubaccountId) -> Result<Subaccount> {
    state
        .ledger
        .get(id)
        .cloned()
        .ok_or_else(|| PerpliqError::LedgerInvariant(format!("subaccount {} vanished", id)))
}

/// Liquidate a single subaccount
fn liquidate_subaccount(state: &mut ExchangeState, id: &SubaccountId) -> Result<AccountOutcome> {
    let subaccount = match state.ledger.get(id) {
        Some(s) => s.clone(),
        None => {
            debug!("liquidation: {} not found", id);
            return Ok(AccountOutcome::Skipped(SkipReason::NotFound));
        }
    };

    let risk_before = margin_requirements(&state.markets, &state.oracle, &subaccount)?;
    if !risk_before.is_liquidatable() {
        debug!("liquidation: {} is not liquidatable", id);
        return Ok(AccountOutcome::Skipped(SkipReason::NotLiquidatable));
    }
    info!(
        "liquidation: {} TNC {} below MMR {}",
        id, risk_before.net_collateral, risk_before.maintenance_margin
    );

    let perpetual_ids: Vec<u32> = subaccount.perpetual_positions.keys().copied().collect();
    let mut positions = Vec::new();

    for perpetual_id in perpetual_ids {
        let current = current_subaccount(state, id)?;
        let risk = margin_requirements(&state.markets, &state.oracle, &current)?;
        if !risk.is_liquidatable() {
            break;
        }
        if current.position_quantums(perpetual_id) == 0 {
            continue;
        }
        if let Some(p) = liquidate_position(state, &current, perpetual_id)? {
            positions.push(p);
        }
    }

    if positions.is_empty() {
        return Ok(AccountOutcome::Skipped(SkipReason::NothingToLiquidate));
    }

    let risk_after = state.risk(id)?;
    Ok(AccountOutcome::Liquidated(AccountLiquidation {
        risk_before,
        risk_after,
        positions,
    }))
}

/// Match, then deleverage if needed. `None` when the position was left alone.
fn liquidate_position(
    state: &mut ExchangeState,
    subaccount: &Subaccount,
    perpetual_id: u32,
) -> Result<Option<PositionLiquidation>> {
    let id = &subaccount.id;
    let plan = plan_position_liquidation(state, subaccount, perpetual_id)?;
    if plan.inactive {
        return Ok(None);
    }

    let mut result = PositionLiquidation {
        perpetual_id,
        clob_pair_id: plan.clob_pair_id,
        order: plan.order.clone(),
        fills: Vec::new(),
        filled_quantums: 0,
        halted: None,
        deleveraging: None,
        residual_quantums: 0,
        residual_reason: None,
    };

    let mut uncovered_shortfall = None;
    if let Some(order) = &plan.order {
        let height = state.block_height();
        let ExchangeState {
            book,
            markets,
            oracle,
            ledger,
            insurance,
            block,
            config,
            ..
        } = state;
        let mut processor = LiquidationFillProcessor {
            ledger,
            insurance,
            block,
            markets: &*markets,
            oracle: &*oracle,
            config: &*config,
            settled: Vec::new(),
            uncovered_shortfall: None,
        };
        let matched = match_liquidation_order(book, order, height, &mut processor)?;
        result.filled_quantums = matched.filled_quantums;
        result.halted = matched.halted;
        result.fills = processor.settled;
        uncovered_shortfall = processor.uncovered_shortfall;
    }

    let current = current_subaccount(state, id)?;
    let risk = margin_requirements(&state.markets, &state.oracle, &current)?;
    let remaining = u64::try_from(current.position_quantums(perpetual_id).unsigned_abs())
        .map_err(|_| PerpliqError::Overflow)?;

    // A shortfall the fund could not cover only goes to deleveraging once the
    // fund is drawn down to the configured floor.
    let fund_drained =
        state.insurance.balance <= state.config.max_insurance_fund_quantums_for_deleveraging as u128;
    let should_deleverage = remaining > 0
        && risk.is_liquidatable()
        && match result.halted {
            Some(HaltReason::InsuranceLossLimit) => true,
            Some(HaltReason::InsuranceFundInsufficient) => fund_drained,
            _ => plan.clipped_by_subaccount_notional || (risk.is_bankrupt() && fund_drained),
        };

    if should_deleverage {
        let deleveraging = deleverage(
            &mut state.ledger,
            &state.markets,
            &state.oracle,
            id,
            perpetual_id,
            remaining,
        )?;
        result.residual_quantums = deleveraging.residual_quantums;
        if deleveraging.residual_quantums > 0 {
            warn!(
                "deleverage: {} quantums of perpetual {} remain on {}",
                deleveraging.residual_quantums, perpetual_id, id
            );
            result.residual_reason = Some(PerpliqError::NoDeleveragingCounterparty);
        }
        result.deleveraging = Some(deleveraging);
    } else {
        result.residual_quantums = remaining;
        if remaining > 0 && risk.is_liquidatable() {
            debug!(
                "liquidation: {} quantums of perpetual {} left on {} for a later block",
                remaining, perpetual_id, id
            );
            result.residual_reason = Some(residual_reason(result.halted, uncovered_shortfall, state));
        }
    }

    if result.order.is_none() && result.deleveraging.is_none() {
        return Ok(None);
    }
    Ok(Some(result))
}

/// Why matching left size on a position that was not deleveraged
fn residual_reason(halted: Option<HaltReason>, shortfall: Option<u128>, state: &ExchangeState) -> PerpliqError {
    match (halted, shortfall) {
        (Some(HaltReason::InsuranceFundInsufficient), Some(required)) => {
            PerpliqError::InsuranceFundInsufficient {
                required,
                available: state.insurance.balance,
            }
        }
        (Some(HaltReason::InsuranceLossLimit), _) => PerpliqError::InsuranceLossLimitReached,
        _ => PerpliqError::InsufficientLiquidity,
    }
}
