//! Matching of synthetic liquidation orders against the resting book
//!
//! Liquidation orders are immediate-or-cancel and reduce-only. They walk the
//! opposite side from the best price, take the maker's price, and never rest.
//! Every candidate fill is handed to a [`FillProcessor`], which owns collateral
//! checks and settlement; the book only learns whether to keep going.

use log::{debug, warn};
use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::state::OrderBook;

/// Synthetic order closing (part of) a liquidated position
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidationOrder {
    pub subaccount_id: SubaccountId,
    pub clob_pair_id: u32,
    pub perpetual_id: u32,
    /// Opposite the position being closed
    pub side: Side,
    pub quantums: u64,
    /// Worst acceptable price (fillable price bound)
    pub subticks: u64,
}

/// A single match between the liquidation order and a maker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fill {
    pub maker_order_id: u64,
    pub maker: SubaccountId,
    pub taker: SubaccountId,
    pub clob_pair_id: u32,
    pub perpetual_id: u32,
    /// Side of the liquidated (taker) subaccount
    pub taker_side: Side,
    pub quantums: u64,
    /// Maker price
    pub subticks: u64,
    pub is_liquidation: bool,
}

/// Why matching stopped before the order was exhausted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HaltReason {
    /// Insurance fund balance cannot cover the loss
    InsuranceFundInsufficient,
    /// Per-block insurance loss budget for the subaccount is spent
    InsuranceLossLimit,
    /// Per-block notional budget for the subaccount is spent
    NotionalLimit,
}

/// Verdict of the fill processor on one candidate fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillOutcome {
    /// Settled; the maker order is reduced
    Accepted,
    /// Maker would end up undercollateralized; cancel it and continue
    MakerRejected,
    /// Stop matching; the remainder is returned unfilled
    Halt(HaltReason),
}

/// Settles fills on behalf of the matching loop
pub trait FillProcessor {
    fn process_fill(&mut self, fill: &Fill, clob_pair: &ClobPair) -> Result<FillOutcome>;
}

/// Result of matching one liquidation order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchResult {
    pub fills: Vec<Fill>,
    pub filled_quantums: u64,
    pub remaining_quantums: u64,
    pub halted: Option<HaltReason>,
    /// Maker orders removed for self-trade, expiry or rejection
    pub cancelled_orders: Vec<u64>,
}

impl MatchResult {
    pub fn is_fully_filled(&self) -> bool {
        self.remaining_quantums == 0
    }
}

/// Match a liquidation order against the opposite side of the book
pub fn match_liquidation_order<P: FillProcessor>(
    book: &mut OrderBook,
    order: &LiquidationOrder,
    block_height: u32,
    processor: &mut P,
) -> Result<MatchResult> {
    let clob_pair = book
        .clob_pair(order.clob_pair_id)
        .cloned()
        .ok_or(PerpliqError::ClobPairNotFound(order.clob_pair_id))?;

    let mut result = MatchResult {
        remaining_quantums: order.quantums,
        ..Default::default()
    };

    let maker_side = order.side.opposite();

    while result.remaining_quantums > 0 {
        let maker = match book
            .orders_on_side(order.clob_pair_id, maker_side)?
            .next()
            .cloned()
        {
            Some(m) => m,
            None => break,
        };

        if !maker.crosses(order.side, order.subticks) {
            break;
        }

        if maker.is_expired(block_height) {
            debug!("matching: removing expired order {}", maker.order_id);
            book.cancel_order(maker.order_id)?;
            result.cancelled_orders.push(maker.order_id);
            continue;
        }

        if maker.subaccount_id == order.subaccount_id {
            debug!("matching: self-trade, cancelling order {}", maker.order_id);
            book.cancel_order(maker.order_id)?;
            result.cancelled_orders.push(maker.order_id);
            continue;
        }

        let fill = Fill {
            maker_order_id: maker.order_id,
            maker: maker.subaccount_id.clone(),
            taker: order.subaccount_id.clone(),
            clob_pair_id: order.clob_pair_id,
            perpetual_id: order.perpetual_id,
            taker_side: order.side,
            quantums: result.remaining_quantums.min(maker.quantums),
            subticks: maker.subticks,
            is_liquidation: true,
        };

        match processor.process_fill(&fill, &clob_pair)? {
            FillOutcome::Accepted => {
                book.remove_or_cancel(fill.maker_order_id, fill.quantums)?;
                result.remaining_quantums -= fill.quantums;
                result.filled_quantums += fill.quantums;
                book.record_fill(fill.clone());
                result.fills.push(fill);
            }
            FillOutcome::MakerRejected => {
                debug!(
                    "matching: maker {} rejected, cancelling order {}",
                    fill.maker, fill.maker_order_id
                );
                book.cancel_order(fill.maker_order_id)?;
                result.cancelled_orders.push(fill.maker_order_id);
            }
            FillOutcome::Halt(reason) => {
                warn!(
                    "matching: halted liquidation of {} with {} quantums left: {:?}",
                    order.subaccount_id, result.remaining_quantums, reason
                );
                result.halted = Some(reason);
                break;
            }
        }
    }

    Ok(result)
}
