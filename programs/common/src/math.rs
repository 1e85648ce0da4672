//! Fixed-point math utilities
//!
//! All financial values are integer quantums. Prices carry a decimal exponent and
//! are converted into quote quantums through powers of ten; fractions are parts
//! per million (ppm).

use crate::error::{PerpliqError, Result};

/// Parts-per-million denominator
pub const ONE_MILLION: u64 = 1_000_000;

/// Atomic resolution of the quote asset (1 USDC = 10^6 quantums)
pub const QUOTE_ATOMIC_RESOLUTION: i32 = -6;

/// Multiply two u64 values and return u128
#[inline]
pub fn mul_u64(a: u64, b: u64) -> u128 {
    (a as u128) * (b as u128)
}

/// Divide u128 by u128, rounding up
#[inline]
pub fn div_ceil_u128(numerator: u128, denominator: u128) -> u128 {
    if numerator == 0 {
        return 0;
    }
    (numerator - 1) / denominator + 1
}

/// Signed division rounding toward negative infinity
#[inline]
pub fn div_floor_i128(numerator: i128, denominator: i128) -> i128 {
    let q = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) != (denominator < 0)) {
        q - 1
    } else {
        q
    }
}

/// Signed division rounding toward positive infinity
#[inline]
pub fn div_ceil_i128(numerator: i128, denominator: i128) -> i128 {
    let q = numerator / denominator;
    if (numerator % denominator != 0) && ((numerator < 0) == (denominator < 0)) {
        q + 1
    } else {
        q
    }
}

/// 10^exp as u128
pub fn pow10(exp: u32) -> Result<u128> {
    10u128.checked_pow(exp).ok_or(PerpliqError::Overflow)
}

/// Floor integer square root
pub fn isqrt(n: u128) -> u128 {
    if n < 2 {
        return n;
    }
    // Newton iteration from an upper bound; strictly decreasing until it settles.
    let mut x = 1u128 << ((128 - n.leading_zeros() + 1) / 2);
    loop {
        let y = (x + n / x) / 2;
        if y >= x {
            return x;
        }
        x = y;
    }
}

/// Apply a power of ten to a signed value, flooring on division
pub fn mul_pow10_floor(value: i128, exp: i32) -> Result<i128> {
    if exp >= 0 {
        let factor = pow10(exp as u32)? as i128;
        value.checked_mul(factor).ok_or(PerpliqError::Overflow)
    } else {
        let factor = pow10(exp.unsigned_abs())?;
        if factor > i128::MAX as u128 {
            return Ok(if value < 0 { -1 } else { 0 });
        }
        Ok(div_floor_i128(value, factor as i128))
    }
}

/// Multiply by a ppm fraction, rounding down
#[inline]
pub fn mul_ppm_floor(value: u128, ppm: u64) -> Result<u128> {
    value
        .checked_mul(ppm as u128)
        .map(|v| v / ONE_MILLION as u128)
        .ok_or(PerpliqError::Overflow)
}

/// Convert base quantums into quote quantums at an oracle price.
///
/// `quote = base * price * 10^(exponent + atomic_resolution - QUOTE_ATOMIC_RESOLUTION)`
pub fn base_to_quote_quantums(
    base_quantums: i128,
    atomic_resolution: i32,
    price: u64,
    exponent: i32,
) -> Result<i128> {
    let raw = base_quantums
        .checked_mul(price as i128)
        .ok_or(PerpliqError::Overflow)?;
    mul_pow10_floor(raw, exponent + atomic_resolution - QUOTE_ATOMIC_RESOLUTION)
}

/// Quote quantums exchanged for `base_quantums` at an order price in subticks.
///
/// `quote = base * subticks * 10^quantum_conversion_exponent`, rounded toward zero
/// so neither side is paid a fractional quantum it did not trade.
pub fn fill_quote_quantums(
    base_quantums: u64,
    subticks: u64,
    quantum_conversion_exponent: i32,
) -> Result<u128> {
    let raw = mul_u64(base_quantums, subticks);
    if quantum_conversion_exponent >= 0 {
        raw.checked_mul(pow10(quantum_conversion_exponent as u32)?)
            .ok_or(PerpliqError::Overflow)
    } else {
        Ok(raw / pow10(quantum_conversion_exponent.unsigned_abs())?)
    }
}

/// Exponent that turns a quote-per-base ratio into subticks
#[inline]
pub fn subticks_exponent(quantum_conversion_exponent: i32) -> i32 {
    -quantum_conversion_exponent
}

/// Round subticks down to a tick multiple
#[inline]
pub fn round_down_to_tick(subticks: u64, subticks_per_tick: u64) -> u64 {
    (subticks / subticks_per_tick) * subticks_per_tick
}

/// Round subticks up to a tick multiple, saturating at the largest tick
#[inline]
pub fn round_up_to_tick(subticks: u64, subticks_per_tick: u64) -> u64 {
    let down = round_down_to_tick(subticks, subticks_per_tick);
    if down == subticks {
        down
    } else {
        down.checked_add(subticks_per_tick)
            .unwrap_or(round_down_to_tick(u64::MAX, subticks_per_tick))
    }
}

/// Round quantums down to a step multiple
#[inline]
pub fn round_to_step(quantums: u64, step: u64) -> u64 {
    (quantums / step) * step
}

/// Check if quantity is aligned with the step size
#[inline]
pub fn is_step_aligned(quantums: u64, step: u64) -> bool {
    quantums % step == 0
}

/// Funding owed by a position since its last settlement.
///
/// The funding index is denominated in quote quantums per base quantum, scaled by
/// 10^6. A rising index debits longs and credits shorts.
pub fn funding_settlement(quantums: i128, position_index: i128, global_index: i128) -> Result<i128> {
    let delta = global_index
        .checked_sub(position_index)
        .ok_or(PerpliqError::Overflow)?;
    let owed = delta.checked_mul(quantums).ok_or(PerpliqError::Overflow)?;
    Ok(div_floor_i128(-owed, ONE_MILLION as i128))
}
