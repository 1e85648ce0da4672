//! Market configuration: perpetuals, liquidity tiers and their clob pairs

use std::collections::BTreeMap;

use log::error;
use perpliq_common::*;

/// Perpetuals, liquidity tiers and the perpetual -> clob pair map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarketRegistry {
    perpetuals: BTreeMap<u32, Perpetual>,
    liquidity_tiers: BTreeMap<u32, LiquidityTier>,
    perpetual_clob_pairs: BTreeMap<u32, u32>,
}

impl MarketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_liquidity_tier(&mut self, tier: LiquidityTier) -> Result<()> {
        tier.validate()?;
        if self.liquidity_tiers.contains_key(&tier.id) {
            return Err(PerpliqError::InvalidConfig(format!(
                "duplicate liquidity tier id {}",
                tier.id
            )));
        }
        self.liquidity_tiers.insert(tier.id, tier);
        Ok(())
    }

    pub fn add_perpetual(&mut self, perpetual: Perpetual) -> Result<()> {
        if !self.liquidity_tiers.contains_key(&perpetual.liquidity_tier) {
            return Err(PerpliqError::LiquidityTierNotFound(perpetual.liquidity_tier));
        }
        if self.perpetuals.contains_key(&perpetual.id) {
            return Err(PerpliqError::InvalidConfig(format!(
                "duplicate perpetual id {}",
                perpetual.id
            )));
        }
        self.perpetuals.insert(perpetual.id, perpetual);
        Ok(())
    }

    /// Record that `clob_pair_id` trades `perpetual_id`
    pub fn register_clob_pair(&mut self, perpetual_id: u32, clob_pair_id: u32) -> Result<()> {
        if !self.perpetuals.contains_key(&perpetual_id) {
            return Err(PerpliqError::PerpetualNotFound(perpetual_id));
        }
        if let Some(existing) = self.perpetual_clob_pairs.get(&perpetual_id) {
            return Err(PerpliqError::InvalidConfig(format!(
                "perpetual {} already traded by clob pair {}",
                perpetual_id, existing
            )));
        }
        self.perpetual_clob_pairs.insert(perpetual_id, clob_pair_id);
        Ok(())
    }

    pub fn perpetual(&self, id: u32) -> Result<&Perpetual> {
        self.perpetuals.get(&id).ok_or_else(|| {
            error!("markets: perpetual {} not found", id);
            PerpliqError::PerpetualNotFound(id)
        })
    }

    pub fn liquidity_tier(&self, id: u32) -> Result<&LiquidityTier> {
        self.liquidity_tiers.get(&id).ok_or_else(|| {
            error!("markets: liquidity tier {} not found", id);
            PerpliqError::LiquidityTierNotFound(id)
        })
    }

    /// Liquidity tier of a perpetual
    pub fn tier_for(&self, perpetual_id: u32) -> Result<&LiquidityTier> {
        let perpetual = self.perpetual(perpetual_id)?;
        self.liquidity_tier(perpetual.liquidity_tier)
    }

    pub fn clob_pair_id_for(&self, perpetual_id: u32) -> Result<u32> {
        self.perpetual_clob_pairs
            .get(&perpetual_id)
            .copied()
            .ok_or_else(|| {
                error!("markets: no clob pair for perpetual {}", perpetual_id);
                PerpliqError::PerpetualHasNoClobPair(perpetual_id)
            })
    }

    /// Move the global funding index of a perpetual
    pub fn set_funding_index(&mut self, perpetual_id: u32, funding_index: i128) -> Result<()> {
        let perpetual = self
            .perpetuals
            .get_mut(&perpetual_id)
            .ok_or(PerpliqError::PerpetualNotFound(perpetual_id))?;
        perpetual.funding_index = funding_index;
        Ok(())
    }

    pub fn perpetuals(&self) -> impl Iterator<Item = &Perpetual> {
        self.perpetuals.values()
    }

    pub fn liquidity_tiers(&self) -> impl Iterator<Item = &LiquidityTier> {
        self.liquidity_tiers.values()
    }
}
