//! Liquidation parameters

use serde::{Deserialize, Serialize};

use crate::error::{PerpliqError, Result};
use crate::math::ONE_MILLION;

/// Bounds on the price a liquidation order may execute at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillablePriceConfig {
    /// Scales how far past the oracle price the order may reach (ppm)
    pub bankruptcy_adjustment_ppm: u32,
    /// Maximum spread as a fraction of position maintenance margin (ppm)
    pub spread_to_maintenance_margin_ratio_ppm: u32,
}

impl Default for FillablePriceConfig {
    fn default() -> Self {
        Self {
            bankruptcy_adjustment_ppm: ONE_MILLION as u32,
            spread_to_maintenance_margin_ratio_ppm: 100_000,
        }
    }
}

/// How much of a single position may be liquidated per block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionBlockLimits {
    /// Positions below this notional (quote quantums) are liquidated whole
    pub min_position_notional_liquidated: u64,
    /// Largest portion of a position liquidated per block (ppm)
    pub max_position_portion_liquidated_ppm: u32,
}

impl Default for PositionBlockLimits {
    fn default() -> Self {
        Self {
            min_position_notional_liquidated: 1_000,
            max_position_portion_liquidated_ppm: ONE_MILLION as u32,
        }
    }
}

/// Per-subaccount limits accumulated within one block
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubaccountBlockLimits {
    /// Notional (quote quantums) that may be liquidated per block
    pub max_notional_liquidated: u64,
    /// Insurance fund quantums that may be lost per block
    pub max_quantums_insurance_lost: u64,
}

impl Default for SubaccountBlockLimits {
    fn default() -> Self {
        Self {
            max_notional_liquidated: 100_000_000_000_000,
            max_quantums_insurance_lost: 100_000_000_000_000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiquidationsConfig {
    /// Fee ceiling as a fraction of fill notional (ppm)
    pub max_liquidation_fee_ppm: u32,
    #[serde(default)]
    pub fillable_price_config: FillablePriceConfig,
    #[serde(default)]
    pub position_block_limits: PositionBlockLimits,
    #[serde(default)]
    pub subaccount_block_limits: SubaccountBlockLimits,
    /// Fund balance at or below which an uncovered shortfall hands the
    /// position to deleveraging
    #[serde(default)]
    pub max_insurance_fund_quantums_for_deleveraging: u64,
}

impl LiquidationsConfig {
    /// Production defaults: 0.5% fee, full bankruptcy adjustment, 10% spread
    pub fn standard() -> Self {
        Self {
            max_liquidation_fee_ppm: 5_000,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_liquidation_fee_ppm as u64 > ONE_MILLION {
            return Err(PerpliqError::InvalidConfig(format!(
                "max liquidation fee ppm {} exceeds 1000000",
                self.max_liquidation_fee_ppm
            )));
        }
        if self.fillable_price_config.bankruptcy_adjustment_ppm < ONE_MILLION as u32 {
            return Err(PerpliqError::InvalidConfig(format!(
                "bankruptcy adjustment ppm {} is below 1000000",
                self.fillable_price_config.bankruptcy_adjustment_ppm
            )));
        }
        let spread = self.fillable_price_config.spread_to_maintenance_margin_ratio_ppm;
        if spread == 0 || spread as u64 > ONE_MILLION {
            return Err(PerpliqError::InvalidConfig(format!(
                "spread to maintenance margin ratio ppm {} is outside (0, 1000000]",
                spread
            )));
        }
        let portion = self.position_block_limits.max_position_portion_liquidated_ppm;
        if portion == 0 || portion as u64 > ONE_MILLION {
            return Err(PerpliqError::InvalidConfig(format!(
                "max position portion liquidated ppm {} is outside (0, 1000000]",
                portion
            )));
        }
        if self.subaccount_block_limits.max_notional_liquidated == 0 {
            return Err(PerpliqError::InvalidConfig(
                "max notional liquidated must be positive".to_string(),
            ));
        }
        if self.subaccount_block_limits.max_quantums_insurance_lost == 0 {
            return Err(PerpliqError::InvalidConfig(
                "max quantums insurance lost must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
