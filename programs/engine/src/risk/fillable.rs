//! Fillable price: the worst price a liquidation order may accept

use perpliq_common::*;

use super::margin::{PositionRisk, Risk};

const PPM: u128 = ONE_MILLION as u128;

/// Adjusted bankruptcy rating (ppm), clamped to [0, 1_000_000].
///
/// Grows as collateral falls from the maintenance requirement toward zero.
pub fn adjusted_bankruptcy_rating_ppm(config: &FillablePriceConfig, risk: &Risk) -> u128 {
    let tmmr = risk.maintenance_margin as i128;
    let tnc = risk.net_collateral;
    if tmmr == 0 {
        return if tnc < 0 { PPM } else { 0 };
    }
    let shortfall = match tmmr.checked_sub(tnc) {
        Some(s) if s > 0 => s,
        Some(_) => return 0,
        None => return PPM,
    };
    match shortfall.checked_mul(config.bankruptcy_adjustment_ppm as i128) {
        Some(num) => ((num / tmmr) as u128).min(PPM),
        None => PPM,
    }
}

/// Fillable price of a position, in subticks of `clob_pair`.
///
/// `(PNNV - ABR * SMMR * PMMR) / PS`; sells round up to a tick, buys round down.
pub fn fillable_price_subticks(
    config: &FillablePriceConfig,
    clob_pair: &ClobPair,
    position: &PositionRisk,
    risk: &Risk,
) -> Result<u64> {
    if position.quantums == 0 {
        return Err(PerpliqError::LedgerInvariant(format!(
            "fillable price requested for empty position in perpetual {}",
            position.perpetual_id
        )));
    }
    let is_sell = position.quantums > 0;
    let tick = clob_pair.subticks_per_tick;
    let max_subticks = round_down_to_tick(u64::MAX, tick);

    let abr = adjusted_bankruptcy_rating_ppm(config, risk);
    let adjustment = position
        .maintenance_margin
        .checked_mul(abr)
        .and_then(|v| v.checked_mul(config.spread_to_maintenance_margin_ratio_ppm as u128))
        .ok_or(PerpliqError::Overflow)?;
    let adjustment = i128::try_from(adjustment).map_err(|_| PerpliqError::Overflow)?;

    let scale = (PPM * PPM) as i128;
    let mut numerator = position
        .net_notional
        .checked_mul(scale)
        .and_then(|v| v.checked_sub(adjustment))
        .ok_or(PerpliqError::Overflow)?;
    let mut denominator = position
        .quantums
        .checked_mul(scale)
        .ok_or(PerpliqError::Overflow)?;

    let exp = subticks_exponent(clob_pair.quantum_conversion_exponent);
    if exp >= 0 {
        numerator = numerator
            .checked_mul(pow10(exp as u32)? as i128)
            .ok_or(PerpliqError::Overflow)?;
    } else {
        denominator = denominator
            .checked_mul(pow10(exp.unsigned_abs())? as i128)
            .ok_or(PerpliqError::Overflow)?;
    }

    let raw = if is_sell {
        div_ceil_i128(numerator, denominator)
    } else {
        div_floor_i128(numerator, denominator)
    };

    if raw <= 0 {
        return Ok(tick);
    }
    if raw >= max_subticks as i128 {
        return Ok(max_subticks);
    }
    let subticks = raw as u64;
    let rounded = if is_sell {
        round_up_to_tick(subticks, tick)
    } else {
        round_down_to_tick(subticks, tick)
    };
    Ok(rounded.clamp(tick, max_subticks))
}
