//! Integer fixed-point logarithm and exponent.
//!
//! `f64::ln` and `f64::powf` go through the platform libm and are not
//! bit-identical across targets. Anything that feeds a replicated decision
//! uses these Q32 routines instead; only IEEE-exact float operations remain.

/// Fractional bits of every Q32 value in this module.
pub const FRAC_BITS: u32 = 32;
pub const ONE: u128 = 1 << FRAC_BITS;
/// ln(2) in Q32.
const LN_2: u128 = 2_977_044_472;
const EXP_SERIES_TERMS: u128 = 24;

/// `log2(value / scale)` in Q32. Zero when `value <= scale` or `scale == 0`.
pub fn log2_ratio(value: u64, scale: u64) -> u128 {
    if scale == 0 || value <= scale {
        return 0;
    }
    let (value, scale) = (u128::from(value), u128::from(scale));
    let mut whole: u32 = 0;
    while value >= scale << (whole + 1) {
        whole += 1;
    }
    // Mantissa in [1, 2), refined one bit per squaring.
    let mut y = (value << FRAC_BITS) / (scale << whole);
    let mut frac: u128 = 0;
    for bit in (0..FRAC_BITS).rev() {
        y = (y * y) >> FRAC_BITS;
        if y >= 2 * ONE {
            y >>= 1;
            frac |= 1 << bit;
        }
    }
    (u128::from(whole) << FRAC_BITS) | frac
}

/// `ln(value / scale)` in Q32.
pub fn ln_ratio(value: u64, scale: u64) -> u128 {
    (log2_ratio(value, scale) * LN_2) >> FRAC_BITS
}

/// `2^x` for a Q32 exponent, in Q32.
pub fn exp2(x: u128) -> u128 {
    let whole = x >> FRAC_BITS;
    let frac = x & (ONE - 1);
    // e^(frac * ln 2) by Taylor series; the argument stays below ln 2.
    let y = (frac * LN_2) >> FRAC_BITS;
    let mut term = ONE;
    let mut sum = ONE;
    for k in 1..=EXP_SERIES_TERMS {
        term = ((term * y) >> FRAC_BITS) / k;
        if term == 0 {
            break;
        }
        sum += term;
    }
    sum << whole
}

/// `value^(numerator / denominator)` truncated to an integer.
pub fn pow_ratio(value: u64, numerator: u32, denominator: u32) -> u64 {
    if value == 0 || denominator == 0 {
        return 0;
    }
    let exponent = log2_ratio(value, 1) * u128::from(numerator) / u128::from(denominator);
    (exp2(exponent) >> FRAC_BITS) as u64
}
