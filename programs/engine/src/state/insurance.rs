//! Insurance Fund
//!
//! Absorbs liquidation shortfalls and collects liquidation fees. The balance
//! never goes negative; a payout the fund cannot cover in full is refused.

use std::collections::VecDeque;

use log::info;
use perpliq_common::*;
use serde::{Deserialize, Serialize};

// ============================================================================
// CONSTANTS
// ============================================================================

/// Maximum number of insurance events to track in history
pub const INSURANCE_HISTORY_SIZE: usize = 100;

// ============================================================================
// TYPES
// ============================================================================

/// Insurance event type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsuranceEventType {
    /// Contribution from liquidation fee
    LiquidationFee,
    /// Payout for liquidation shortfall
    ShortfallPayout,
    /// Direct deposit (genesis or operator)
    Deposit,
}

/// Single insurance event record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceEvent {
    pub event_type: InsuranceEventType,
    pub block_height: u32,
    /// Amount involved (positive for contribution, negative for payout)
    pub amount: i128,
    /// Balance after event
    pub balance_after: u128,
    /// Liquidated subaccount, if any
    pub subaccount: Option<SubaccountId>,
    pub perpetual_id: Option<u32>,
}

/// Insurance fund statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsuranceStats {
    /// Total contributions received
    pub total_contributions: u128,
    /// Total payouts made
    pub total_payouts: u128,
    /// Total shortfall events
    pub shortfall_events: u64,
    /// Largest single payout
    pub max_single_payout: u128,
    /// Block height of the last contribution
    pub last_contribution_height: u32,
    /// Block height of the last payout
    pub last_payout_height: u32,
}

/// Insurance fund state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InsuranceFund {
    /// Current balance in quote quantums
    pub balance: u128,
    pub stats: InsuranceStats,
    /// Event history (ring buffer)
    events: VecDeque<InsuranceEvent>,
}

impl InsuranceFund {
    pub fn new(balance: u128) -> Self {
        Self {
            balance,
            ..Default::default()
        }
    }

    /// Whether the fund can pay `amount` in full
    pub fn can_cover(&self, amount: u128) -> bool {
        amount <= self.balance
    }

    /// Add contribution to the fund
    pub fn contribute(
        &mut self,
        amount: u128,
        event_type: InsuranceEventType,
        subaccount: Option<&SubaccountId>,
        perpetual_id: Option<u32>,
        block_height: u32,
    ) -> Result<()> {
        self.balance = self.balance.checked_add(amount).ok_or(PerpliqError::Overflow)?;
        self.stats.total_contributions = self.stats.total_contributions.saturating_add(amount);
        self.stats.last_contribution_height = block_height;

        self.record_event(InsuranceEvent {
            event_type,
            block_height,
            amount: amount as i128,
            balance_after: self.balance,
            subaccount: subaccount.cloned(),
            perpetual_id,
        });
        Ok(())
    }

    /// Pay out a shortfall in full
    pub fn payout(
        &mut self,
        amount: u128,
        subaccount: &SubaccountId,
        perpetual_id: u32,
        block_height: u32,
    ) -> Result<u128> {
        if !self.can_cover(amount) {
            return Err(PerpliqError::InsuranceFundInsufficient {
                required: amount,
                available: self.balance,
            });
        }

        self.balance -= amount;
        self.stats.total_payouts = self.stats.total_payouts.saturating_add(amount);
        self.stats.last_payout_height = block_height;
        self.stats.shortfall_events += 1;
        if amount > self.stats.max_single_payout {
            self.stats.max_single_payout = amount;
        }

        info!(
            "insurance: paid {} for {} on perpetual {}, balance {}",
            amount, subaccount, perpetual_id, self.balance
        );

        self.record_event(InsuranceEvent {
            event_type: InsuranceEventType::ShortfallPayout,
            block_height,
            amount: -(amount as i128),
            balance_after: self.balance,
            subaccount: Some(subaccount.clone()),
            perpetual_id: Some(perpetual_id),
        });

        Ok(amount)
    }

    /// Record event in ring buffer
    fn record_event(&mut self, event: InsuranceEvent) {
        if self.events.len() == INSURANCE_HISTORY_SIZE {
            self.events.pop_front();
        }
        self.events.push_back(event);
    }

    /// Get recent events (most recent first)
    pub fn recent_events(&self, count: usize) -> impl Iterator<Item = &InsuranceEvent> {
        self.events.iter().rev().take(count)
    }
}
