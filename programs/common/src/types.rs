//! Common types shared between the book and the engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::{PerpliqError, Result};
use crate::math::ONE_MILLION;

/// Asset id of the quote asset (USDC)
pub const QUOTE_ASSET_ID: u32 = 0;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    #[default]
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    /// Side that closes a position of the given sign
    pub fn closing(position_quantums: i128) -> Side {
        if position_quantums > 0 {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Signed base delta for `quantums` traded on this side
    pub fn signed(self, quantums: u64) -> i128 {
        match self {
            Side::Buy => quantums as i128,
            Side::Sell => -(quantums as i128),
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeInForce {
    /// Rests until filled, cancelled or expired by `good_til_block`
    #[default]
    GoodTilBlock,
    /// Immediate or cancel; never rests
    ImmediateOrCancel,
}

/// Subaccount identifier. Ordered by owner, then number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SubaccountId {
    pub owner: String,
    pub number: u32,
}

impl SubaccountId {
    pub fn new(owner: impl Into<String>, number: u32) -> Self {
        Self {
            owner: owner.into(),
            number,
        }
    }
}

impl fmt::Display for SubaccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.number)
    }
}

impl std::str::FromStr for SubaccountId {
    type Err = PerpliqError;

    fn from_str(s: &str) -> Result<Self> {
        let (owner, number) = s
            .rsplit_once('/')
            .ok_or_else(|| PerpliqError::InvalidConfig(format!("malformed subaccount id '{}'", s)))?;
        let number = number
            .parse::<u32>()
            .map_err(|_| PerpliqError::InvalidConfig(format!("malformed subaccount number '{}'", s)))?;
        if owner.is_empty() {
            return Err(PerpliqError::InvalidConfig(format!("empty owner in '{}'", s)));
        }
        Ok(SubaccountId::new(owner, number))
    }
}

/// Open perpetual position. Size and funding index always change together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PerpetualPosition {
    /// Signed base quantums (positive = long)
    pub quantums: i128,
    /// Global funding index at last settlement
    #[serde(default)]
    pub funding_index: i128,
}

/// Subaccount state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subaccount {
    pub id: SubaccountId,
    /// Asset balances in quantums, keyed by asset id
    #[serde(default)]
    pub asset_positions: BTreeMap<u32, i128>,
    /// Open positions keyed by perpetual id
    #[serde(default)]
    pub perpetual_positions: BTreeMap<u32, PerpetualPosition>,
}

impl Subaccount {
    pub fn new(id: SubaccountId) -> Self {
        Self {
            id,
            asset_positions: BTreeMap::new(),
            perpetual_positions: BTreeMap::new(),
        }
    }

    /// Quote (USDC) balance in quantums
    pub fn quote_balance(&self) -> i128 {
        self.asset_positions
            .get(&QUOTE_ASSET_ID)
            .copied()
            .unwrap_or(0)
    }

    /// Signed size of the position in a perpetual, zero when absent
    pub fn position_quantums(&self, perpetual_id: u32) -> i128 {
        self.perpetual_positions
            .get(&perpetual_id)
            .map(|p| p.quantums)
            .unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.asset_positions.is_empty() && self.perpetual_positions.is_empty()
    }
}

/// Perpetual market definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Perpetual {
    pub id: u32,
    pub ticker: String,
    /// Oracle market id
    pub market_id: u32,
    /// Base quantum exponent (e.g. -8 for BTC)
    pub atomic_resolution: i32,
    pub liquidity_tier: u32,
    /// Prevailing global funding index
    #[serde(default)]
    pub funding_index: i128,
}

/// Oracle price: `price * 10^exponent` USD per whole base unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub id: u32,
    pub price: u64,
    pub exponent: i32,
}

/// Margin parameters shared by a group of perpetuals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityTier {
    pub id: u32,
    pub name: String,
    /// Initial margin fraction (ppm)
    pub initial_margin_ppm: u32,
    /// Maintenance margin as a fraction of initial margin (ppm)
    pub maintenance_fraction_ppm: u32,
    /// Notional (quote quantums) above which margin scales non-linearly
    pub base_position_notional: u64,
    /// Notional (quote quantums) used for impact price sampling
    pub impact_notional: u64,
}

impl LiquidityTier {
    pub fn validate(&self) -> Result<()> {
        if self.initial_margin_ppm as u64 > ONE_MILLION {
            return Err(PerpliqError::InvalidConfig(format!(
                "liquidity tier {}: initial margin ppm {} exceeds 1000000",
                self.id, self.initial_margin_ppm
            )));
        }
        if self.maintenance_fraction_ppm as u64 > ONE_MILLION {
            return Err(PerpliqError::InvalidConfig(format!(
                "liquidity tier {}: maintenance fraction ppm {} exceeds 1000000",
                self.id, self.maintenance_fraction_ppm
            )));
        }
        if self.base_position_notional == 0 {
            return Err(PerpliqError::InvalidConfig(format!(
                "liquidity tier {}: base position notional must be positive",
                self.id
            )));
        }
        if self.impact_notional == 0 {
            return Err(PerpliqError::InvalidConfig(format!(
                "liquidity tier {}: impact notional must be positive",
                self.id
            )));
        }
        Ok(())
    }
}

/// Trading status of a clob pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClobPairStatus {
    #[default]
    Unspecified,
    Active,
    Paused,
    CancelOnly,
    PostOnly,
    Initializing,
}

impl fmt::Display for ClobPairStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClobPairStatus::Unspecified => "unspecified",
            ClobPairStatus::Active => "active",
            ClobPairStatus::Paused => "paused",
            ClobPairStatus::CancelOnly => "cancel_only",
            ClobPairStatus::PostOnly => "post_only",
            ClobPairStatus::Initializing => "initializing",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ClobPairStatus {
    type Err = PerpliqError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "unspecified" => Ok(ClobPairStatus::Unspecified),
            "active" => Ok(ClobPairStatus::Active),
            "paused" => Ok(ClobPairStatus::Paused),
            "cancel_only" => Ok(ClobPairStatus::CancelOnly),
            "post_only" => Ok(ClobPairStatus::PostOnly),
            "initializing" => Ok(ClobPairStatus::Initializing),
            other => Err(PerpliqError::InvalidConfig(format!("unknown clob pair status '{}'", other))),
        }
    }
}

/// Order book instrument trading one perpetual
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClobPair {
    pub id: u32,
    pub perpetual_id: u32,
    /// Minimum base quantum increment
    pub step_base_quantums: u64,
    pub subticks_per_tick: u64,
    /// Exponent relating subticks to quote quantums per base quantum
    pub quantum_conversion_exponent: i32,
    #[serde(default)]
    pub status: ClobPairStatus,
}

impl ClobPair {
    pub fn validate(&self) -> Result<()> {
        if self.step_base_quantums == 0 {
            return Err(PerpliqError::InvalidConfig(format!(
                "clob pair {}: step base quantums must be positive",
                self.id
            )));
        }
        if self.subticks_per_tick == 0 {
            return Err(PerpliqError::InvalidConfig(format!(
                "clob pair {}: subticks per tick must be positive",
                self.id
            )));
        }
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        self.status == ClobPairStatus::Active
    }
}

/// Resting or synthetic order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Monotonic sequence; lower ids have time priority
    #[serde(default)]
    pub order_id: u64,
    pub subaccount_id: SubaccountId,
    pub clob_pair_id: u32,
    pub side: Side,
    /// Remaining base quantums
    pub quantums: u64,
    /// Limit price in subticks
    pub subticks: u64,
    /// Last block height at which the order may match
    #[serde(default = "default_good_til_block")]
    pub good_til_block: u32,
    #[serde(default)]
    pub time_in_force: TimeInForce,
}

fn default_good_til_block() -> u32 {
    u32::MAX
}

impl Order {
    pub fn is_expired(&self, block_height: u32) -> bool {
        self.good_til_block < block_height
    }

    /// Whether this order would trade against a taker limit on the opposite side
    pub fn crosses(&self, taker_side: Side, taker_subticks: u64) -> bool {
        match taker_side {
            Side::Buy => self.subticks <= taker_subticks,
            Side::Sell => self.subticks >= taker_subticks,
        }
    }
}
