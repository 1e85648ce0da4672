//! Per-block liquidation accounting

use std::collections::BTreeMap;

use perpliq_common::*;

/// Notional liquidated and insurance lost per subaccount in the current block
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockState {
    pub height: u32,
    notional_liquidated: BTreeMap<SubaccountId, u128>,
    insurance_lost: BTreeMap<SubaccountId, u128>,
}

impl BlockState {
    pub fn new(height: u32) -> Self {
        Self {
            height,
            ..Default::default()
        }
    }

    /// Start a new block, clearing all per-subaccount tracking
    pub fn begin(&mut self, height: u32) {
        self.height = height;
        self.notional_liquidated.clear();
        self.insurance_lost.clear();
    }

    pub fn notional_liquidated(&self, id: &SubaccountId) -> u128 {
        self.notional_liquidated.get(id).copied().unwrap_or(0)
    }

    pub fn insurance_lost(&self, id: &SubaccountId) -> u128 {
        self.insurance_lost.get(id).copied().unwrap_or(0)
    }

    pub fn add_notional_liquidated(&mut self, id: &SubaccountId, notional: u128) {
        let entry = self.notional_liquidated.entry(id.clone()).or_insert(0);
        *entry = entry.saturating_add(notional);
    }

    /// Charge an insurance loss against the subaccount's block budget
    pub fn add_insurance_lost(
        &mut self,
        id: &SubaccountId,
        quantums: u128,
        limits: &SubaccountBlockLimits,
    ) -> Result<()> {
        if !self.can_lose_insurance(id, quantums, limits) {
            return Err(PerpliqError::InsuranceLossLimitReached);
        }
        let entry = self.insurance_lost.entry(id.clone()).or_insert(0);
        *entry = entry.saturating_add(quantums);
        Ok(())
    }

    /// Notional still available to a subaccount under the block limit
    pub fn remaining_notional(&self, id: &SubaccountId, limits: &SubaccountBlockLimits) -> u128 {
        (limits.max_notional_liquidated as u128).saturating_sub(self.notional_liquidated(id))
    }

    /// Whether the fund may lose `quantums` more on behalf of a subaccount
    pub fn can_lose_insurance(
        &self,
        id: &SubaccountId,
        quantums: u128,
        limits: &SubaccountBlockLimits,
    ) -> bool {
        self.insurance_lost(id).saturating_add(quantums) <= limits.max_quantums_insurance_lost as u128
    }
}
