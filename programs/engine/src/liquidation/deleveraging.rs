//! Deleveraging
//!
//! Closes a residual position directly against subaccounts holding the opposite
//! side, at the liquidated subaccount's bankruptcy price. Counterparties are
//! visited in subaccount id order. A counterparty is only used when both
//! bankruptcy prices overlap, so the transfer never needs the insurance fund
//! and never charges a fee.

use log::{debug, info};
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::oracle::PriceOracle;
use crate::risk::bankruptcy_quote_quantums;
use crate::state::{MarketRegistry, SubaccountLedger, SubaccountStore, SubaccountUpdate};

/// One transfer between the liquidated subaccount and a counterparty
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleverageFill {
    pub offsetting: SubaccountId,
    pub quantums: u64,
    /// Quote quantums received by the liquidated subaccount
    pub quote_quantums: i128,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleveragingResult {
    pub fills: Vec<DeleverageFill>,
    pub deleveraged_quantums: u64,
    /// Size left on the liquidated subaccount
    pub residual_quantums: u64,
    /// Counterparties whose bankruptcy price did not overlap
    pub skipped: Vec<SubaccountId>,
}

/// Deleverage up to `residual` base quantums of a position
pub fn deleverage(
    ledger: &mut SubaccountLedger,
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    liquidated: &SubaccountId,
    perpetual_id: u32,
    residual: u64,
) -> Result<DeleveragingResult> {
    let mut result = DeleveragingResult {
        residual_quantums: residual,
        ..Default::default()
    };

    let position = ledger
        .get(liquidated)
        .map(|s| s.position_quantums(perpetual_id))
        .unwrap_or(0);
    if position == 0 || residual == 0 {
        result.residual_quantums = 0;
        return Ok(result);
    }
    let abs_position = u64::try_from(position.unsigned_abs()).map_err(|_| PerpliqError::Overflow)?;
    result.residual_quantums = residual.min(abs_position);

    let funding_index = markets.perpetual(perpetual_id)?.funding_index;
    let closing_side = Side::closing(position);

    // Offsetting positions have the opposite sign to the liquidated one.
    let candidates: Vec<SubaccountId> = ledger
        .holders(perpetual_id, position < 0)
        .filter(|s| &s.id != liquidated)
        .map(|s| s.id.clone())
        .collect();

    for candidate_id in candidates {
        if result.residual_quantums == 0 {
            break;
        }

        let (liquidated_sub, candidate) = match (ledger.get(liquidated), ledger.get(&candidate_id)) {
            (Some(l), Some(c)) => (l, c),
            _ => continue,
        };

        let candidate_size = u64::try_from(candidate.position_quantums(perpetual_id).unsigned_abs())
            .map_err(|_| PerpliqError::Overflow)?;
        let size = result.residual_quantums.min(candidate_size);
        if size == 0 {
            continue;
        }
        let delta = closing_side.signed(size);

        let bq_liquidated = bankruptcy_quote_quantums(markets, oracle, liquidated_sub, perpetual_id, delta)?;
        let bq_offsetting = bankruptcy_quote_quantums(markets, oracle, candidate, perpetual_id, -delta)?;

        let overlap = bq_liquidated
            .checked_add(bq_offsetting)
            .ok_or(PerpliqError::Overflow)?
            <= 0;
        if !overlap {
            debug!(
                "deleverage: {} does not overlap {} ({} + {} > 0)",
                candidate_id, liquidated, bq_liquidated, bq_offsetting
            );
            result.skipped.push(candidate_id);
            continue;
        }

        ledger.apply(&[
            SubaccountUpdate::quote(liquidated.clone(), bq_liquidated)
                .with_position(perpetual_id, delta, funding_index),
            SubaccountUpdate::quote(candidate_id.clone(), -bq_liquidated)
                .with_position(perpetual_id, -delta, funding_index),
        ])?;

        info!(
            "deleverage: {} {} {} to {} for {} quote",
            liquidated, closing_side, size, candidate_id, bq_liquidated
        );

        result.residual_quantums -= size;
        result.deleveraged_quantums += size;
        result.fills.push(DeleverageFill {
            offsetting: candidate_id,
            quantums: size,
            quote_quantums: bq_liquidated,
        });
    }

    Ok(result)
}
