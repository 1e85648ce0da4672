//! Margin calculation
//!
//! Net collateral is the quote balance plus the oracle value of every position
//! plus funding not yet settled. Margin fractions grow with the square root of
//! position size once a position exceeds its tier's base notional.

use perpliq_common::*;
use serde::{Deserialize, Serialize};

use crate::oracle::PriceOracle;
use crate::state::MarketRegistry;

const PPM: u128 = ONE_MILLION as u128;
const PPM_SQUARED: u128 = PPM * PPM;

/// Collateral and margin requirements of a subaccount
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Risk {
    /// Total net collateral (TNC)
    pub net_collateral: i128,
    /// Initial margin requirement (IMR)
    pub initial_margin: u128,
    /// Maintenance margin requirement (MMR)
    pub maintenance_margin: u128,
}

impl Risk {
    /// TNC < MMR. Equality is not liquidatable.
    pub fn is_liquidatable(&self) -> bool {
        self.net_collateral < self.maintenance_margin as i128
    }

    pub fn is_initially_collateralized(&self) -> bool {
        self.net_collateral >= self.initial_margin as i128
    }

    pub fn is_bankrupt(&self) -> bool {
        self.net_collateral < 0
    }
}

/// Oracle value and margin of a single position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionRisk {
    pub perpetual_id: u32,
    pub quantums: i128,
    /// Position net notional value (PNNV)
    pub net_notional: i128,
    pub initial_margin: u128,
    /// Position maintenance margin (PMMR)
    pub maintenance_margin: u128,
}

/// Margin multiplier (ppm) for a position of `notional` quote quantums.
///
/// 1_000_000 up to `base_notional`; `isqrt(notional * 10^12 / base_notional)`
/// above it, never more than `max_multiplier_ppm`.
pub fn scale(notional: u128, base_notional: u64, max_multiplier_ppm: u128) -> u128 {
    if base_notional == 0 || notional <= base_notional as u128 {
        return PPM;
    }
    let ratio = match notional.checked_mul(PPM_SQUARED) {
        Some(n) => n / base_notional as u128,
        None => return max_multiplier_ppm.max(PPM),
    };
    isqrt(ratio).min(max_multiplier_ppm.max(PPM))
}

/// Multiplier at which the scaled initial fraction reaches 100%
pub fn max_multiplier_ppm(tier: &LiquidityTier) -> u128 {
    if tier.initial_margin_ppm == 0 {
        return u128::MAX;
    }
    PPM_SQUARED / tier.initial_margin_ppm as u128
}

/// Initial and maintenance margin for a position of absolute notional `notional`
pub fn margin_for_notional(tier: &LiquidityTier, notional: u128) -> Result<(u128, u128)> {
    if notional == 0 || tier.initial_margin_ppm == 0 {
        return Ok((0, 0));
    }
    let multiplier = scale(notional, tier.base_position_notional, max_multiplier_ppm(tier));

    let cap = notional.checked_mul(PPM_SQUARED).ok_or(PerpliqError::Overflow)?;
    let im_num = notional
        .checked_mul(tier.initial_margin_ppm as u128)
        .and_then(|v| v.checked_mul(multiplier))
        .ok_or(PerpliqError::Overflow)?
        .min(cap);

    let initial = div_ceil_u128(im_num, PPM_SQUARED);
    let maintenance = im_num
        .checked_mul(tier.maintenance_fraction_ppm as u128)
        .map(|v| div_ceil_u128(v, PPM_SQUARED * PPM))
        .ok_or(PerpliqError::Overflow)?;
    Ok((initial, maintenance))
}

/// Signed oracle value of `quantums` base quantums of a perpetual
pub fn net_notional(
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    perpetual_id: u32,
    quantums: i128,
) -> Result<i128> {
    let perpetual = markets.perpetual(perpetual_id)?;
    let price = oracle.get_price(perpetual.market_id)?;
    base_to_quote_quantums(quantums, perpetual.atomic_resolution, price.price, price.exponent)
}

/// Oracle value and margin of a position of `quantums` in a perpetual
pub fn position_risk(
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    perpetual_id: u32,
    quantums: i128,
) -> Result<PositionRisk> {
    let tier = markets.tier_for(perpetual_id)?;
    let net_notional = net_notional(markets, oracle, perpetual_id, quantums)?;
    let (initial_margin, maintenance_margin) = margin_for_notional(tier, net_notional.unsigned_abs())?;
    Ok(PositionRisk {
        perpetual_id,
        quantums,
        net_notional,
        initial_margin,
        maintenance_margin,
    })
}

/// Funding owed to (positive) or by (negative) a position that is not yet settled
pub fn unsettled_funding(
    markets: &MarketRegistry,
    perpetual_id: u32,
    position: &PerpetualPosition,
) -> Result<i128> {
    let perpetual = markets.perpetual(perpetual_id)?;
    funding_settlement(position.quantums, position.funding_index, perpetual.funding_index)
}

/// Net collateral and margin requirements of a subaccount
pub fn margin_requirements(
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    subaccount: &Subaccount,
) -> Result<Risk> {
    margin_requirements_after(markets, oracle, subaccount, None, 0)
}

/// Margin requirements as they would be after trading `position_delta`
/// (perpetual id, signed quantums) and receiving `quote_delta`.
pub fn margin_requirements_after(
    markets: &MarketRegistry,
    oracle: &dyn PriceOracle,
    subaccount: &Subaccount,
    position_delta: Option<(u32, i128)>,
    quote_delta: i128,
) -> Result<Risk> {
    let mut risk = Risk {
        net_collateral: subaccount
            .quote_balance()
            .checked_add(quote_delta)
            .ok_or(PerpliqError::Overflow)?,
        ..Default::default()
    };

    let mut positions: Vec<(u32, i128)> = subaccount
        .perpetual_positions
        .iter()
        .map(|(id, p)| (*id, p.quantums))
        .collect();

    for (perpetual_id, position) in &subaccount.perpetual_positions {
        let funding = unsettled_funding(markets, *perpetual_id, position)?;
        risk.net_collateral = risk
            .net_collateral
            .checked_add(funding)
            .ok_or(PerpliqError::Overflow)?;
    }

    if let Some((perpetual_id, delta)) = position_delta {
        match positions.iter_mut().find(|(id, _)| *id == perpetual_id) {
            Some((_, q)) => *q = q.checked_add(delta).ok_or(PerpliqError::Overflow)?,
            None => positions.push((perpetual_id, delta)),
        }
    }

    for (perpetual_id, quantums) in positions {
        if quantums == 0 {
            continue;
        }
        let p = position_risk(markets, oracle, perpetual_id, quantums)?;
        risk.net_collateral = risk
            .net_collateral
            .checked_add(p.net_notional)
            .ok_or(PerpliqError::Overflow)?;
        risk.initial_margin = risk
            .initial_margin
            .checked_add(p.initial_margin)
            .ok_or(PerpliqError::Overflow)?;
        risk.maintenance_margin = risk
            .maintenance_margin
            .checked_add(p.maintenance_margin)
            .ok_or(PerpliqError::Overflow)?;
    }

    Ok(risk)
}
