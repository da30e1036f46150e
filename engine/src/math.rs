//! Checked Fixed-Point Math
//!
//! All in-memory computation uses full-width native integers with explicit
//! range checks before any narrowing. Products that need more than 128 bits
//! go through a 256-bit widening multiply; nothing here truncates silently.

use crate::constants::{precision::WAD, rates, ticks};
use crate::errors::{EngineError, EngineResult};

const MASK_64: u128 = (1 << 64) - 1;

/// sqrt(1.0001) in X64 fixed point, the per-tick sqrt-price multiplier.
/// Accuracy is verified against an f64 reference in tests.
const SQRT_1_0001_X64: u128 = 18_447_666_387_855_959_851;

/// Full 256-bit product of two u128 values, returned as (hi, lo)
fn wide_mul(a: u128, b: u128) -> (u128, u128) {
    let (a_hi, a_lo) = (a >> 64, a & MASK_64);
    let (b_hi, b_lo) = (b >> 64, b & MASK_64);

    let ll = a_lo * b_lo;
    let lh = a_lo * b_hi;
    let hl = a_hi * b_lo;
    let hh = a_hi * b_hi;

    let mid = (ll >> 64) + (lh & MASK_64) + (hl & MASK_64);
    let lo = (mid << 64) | (ll & MASK_64);
    let hi = hh + (lh >> 64) + (hl >> 64) + (mid >> 64);
    (hi, lo)
}

/// Long division of a 256-bit value (hi, lo) by `d`.
/// Requires `hi < d` so the quotient fits in 128 bits.
fn div_256_by_128(hi: u128, lo: u128, d: u128) -> u128 {
    let mut rem = hi;
    let mut quot = 0u128;
    for i in (0..128).rev() {
        let carry = rem >> 127;
        rem = (rem << 1) | ((lo >> i) & 1);
        // carry means the true remainder is rem + 2^128, which always
        // exceeds d; wrapping_sub folds the 2^128 back in
        if carry == 1 || rem >= d {
            rem = rem.wrapping_sub(d);
            quot |= 1 << i;
        }
    }
    quot
}

/// floor(a * b / d) with a 256-bit intermediate; rejects overflow and
/// division by zero rather than wrapping
pub fn mul_div(a: u128, b: u128, d: u128) -> EngineResult<u128> {
    if d == 0 {
        return Err(EngineError::DivisionByZero);
    }
    let (hi, lo) = wide_mul(a, b);
    if hi >= d {
        return Err(EngineError::AmountOverflow);
    }
    if hi == 0 {
        return Ok(lo / d);
    }
    Ok(div_256_by_128(hi, lo, d))
}

/// floor(a * b / 2^64)
pub fn mul_shift_64(a: u128, b: u128) -> EngineResult<u128> {
    mul_div(a, b, 1 << 64)
}

/// WAD-scaled multiply: floor(a * b / 1e18)
pub fn wad_mul(a: u128, b: u128) -> EngineResult<u128> {
    mul_div(a, b, WAD)
}

/// WAD-scaled divide: floor(a * 1e18 / b)
pub fn wad_div(a: u128, b: u128) -> EngineResult<u128> {
    mul_div(a, WAD, b)
}

/// e^x - 1 via a bounded-order Taylor expansion, WAD in, WAD out.
///
/// The order is `rates::TAYLOR_ORDER`; inputs above
/// `rates::TAYLOR_INPUT_CAP_WAD` are rejected because the truncation error
/// would exceed the documented 1% tolerance. Callers bound rate*dt below
/// the cap structurally (rate ceiling x elapsed-time clamp).
pub fn expm1_taylor(x_wad: u128) -> EngineResult<u128> {
    if x_wad > rates::TAYLOR_INPUT_CAP_WAD {
        return Err(EngineError::CompoundingOutOfBounds {
            rate_dt_wad: x_wad,
            max_wad: rates::TAYLOR_INPUT_CAP_WAD,
        });
    }
    let mut term = x_wad;
    let mut sum = x_wad;
    for k in 2..=rates::TAYLOR_ORDER as u128 {
        term = mul_div(term, x_wad, WAD * k)?;
        sum = sum.checked_add(term).ok_or(EngineError::AmountOverflow)?;
    }
    Ok(sum)
}

/// sqrt(1.0001^tick) in X64 fixed point, by exponentiation by squaring.
///
/// Ticks outside [`ticks::MIN_TICK`, `ticks::MAX_TICK`] are rejected; the
/// bounds keep every intermediate product inside u128.
///
/// The result is exact to one X64 ulp. Deeply negative ticks produce
/// ratios of only a few ulps, so their relative resolution is coarse;
/// token0 amounts therefore work on the negated ticks (see
/// [`crate::collateral::amount0_for_liquidity`]) instead of dividing by
/// these small values.
pub fn sqrt_ratio_x64(tick: i32) -> EngineResult<u128> {
    if !(ticks::MIN_TICK..=ticks::MAX_TICK).contains(&tick) {
        return Err(EngineError::TickOutOfBounds { tick });
    }
    let mut e = tick.unsigned_abs();
    let mut result: u128 = 1 << 64;
    let mut base = SQRT_1_0001_X64;
    while e > 0 {
        if e & 1 == 1 {
            result = mul_shift_64(result, base)?;
        }
        e >>= 1;
        if e > 0 {
            base = mul_shift_64(base, base)?;
        }
    }
    if tick < 0 {
        // X64 reciprocal: 2^128 / result, off by at most one ulp
        result = u128::MAX / result;
    }
    Ok(result)
}

// ============ Checked narrowing ============

pub fn to_u64(value: u128) -> EngineResult<u64> {
    u64::try_from(value).map_err(|_| EngineError::CastingError {
        value,
        target_bits: 64,
    })
}

pub fn to_u32(value: u128) -> EngineResult<u32> {
    u32::try_from(value).map_err(|_| EngineError::CastingError {
        value,
        target_bits: 32,
    })
}

pub fn to_u16(value: u128) -> EngineResult<u16> {
    u16::try_from(value).map_err(|_| EngineError::CastingError {
        value,
        target_bits: 16,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::precision::X64;

    #[test]
    fn test_wide_mul_known_values() {
        assert_eq!(wide_mul(0, u128::MAX), (0, 0));
        assert_eq!(wide_mul(1, u128::MAX), (0, u128::MAX));
        // (2^127)^2 = 2^254 -> hi = 2^126, lo = 0
        assert_eq!(wide_mul(1 << 127, 1 << 127), (1 << 126, 0));
        assert_eq!(wide_mul(u128::MAX, 2), (1, u128::MAX - 1));
    }

    #[test]
    fn test_mul_div_basic() {
        assert_eq!(mul_div(6, 7, 2).unwrap(), 21);
        assert_eq!(mul_div(u128::MAX, u128::MAX, u128::MAX).unwrap(), u128::MAX);
        assert_eq!(mul_div(WAD, WAD, WAD).unwrap(), WAD);
    }

    #[test]
    fn test_mul_div_rejects_overflow_and_zero() {
        assert_eq!(mul_div(1, 1, 0), Err(EngineError::DivisionByZero));
        assert_eq!(
            mul_div(u128::MAX, u128::MAX, 1),
            Err(EngineError::AmountOverflow)
        );
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(EngineError::AmountOverflow));
    }

    #[test]
    fn test_mul_div_large_intermediate() {
        // a*b needs 256 bits but the quotient fits
        let a = u128::MAX / 3;
        let r = mul_div(a, 9, 3).unwrap();
        assert_eq!(r, a * 3);
    }

    #[test]
    fn test_expm1_small_input_linear() {
        // For tiny x, e^x - 1 ~ x
        let x = WAD / 1_000_000; // 1e-6
        let r = expm1_taylor(x).unwrap();
        assert!(r >= x && r < x + x / 100_000);
    }

    #[test]
    fn test_expm1_at_one() {
        // e - 1 = 1.718281828...; order-6 gives 1.7180555...
        let r = expm1_taylor(WAD).unwrap();
        let exact = 1_718_281_828_459_045_235u128;
        let diff = exact - r;
        assert!(diff * 1000 < exact, "error must be < 0.1% at x=1: {r}");
    }

    #[test]
    fn test_expm1_at_cap_within_tolerance() {
        // Regression for the compounding tolerance: at x = 2.0 the
        // truncation must stay within 1% of e^2 - 1 = 6.389056...
        let r = expm1_taylor(2 * WAD).unwrap();
        let exact = 6_389_056_098_930_650_227u128;
        let diff = exact - r;
        assert!(diff * 100 < exact, "error must be < 1% at x=2: {r}");
        // but the 3-term value (~5.333) would fail by a wide margin
        assert!(r > 6_300_000_000_000_000_000);
    }

    #[test]
    fn test_expm1_rejects_above_cap() {
        assert!(matches!(
            expm1_taylor(2 * WAD + 1),
            Err(EngineError::CompoundingOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_sqrt_ratio_identity() {
        assert_eq!(sqrt_ratio_x64(0).unwrap(), X64);
    }

    #[test]
    fn test_sqrt_ratio_single_tick() {
        assert_eq!(sqrt_ratio_x64(1).unwrap(), SQRT_1_0001_X64);
    }

    #[test]
    fn test_sqrt_ratio_matches_float_reference() {
        for &tick in &[-800_000, -100_000, -695, -1, 1, 60, 10_000, 443_636, 870_000] {
            let got = sqrt_ratio_x64(tick).unwrap() as f64 / X64 as f64;
            let want = 1.0001f64.powf(tick as f64 / 2.0);
            // one X64 ulp of absolute slack: at tick -800_000 the exact
            // ratio is only ~78 ulps, so a relative bound alone cannot hold
            let tol = (want * 1e-9).max(2.0 / X64 as f64);
            assert!(
                (got - want).abs() < tol,
                "tick {tick}: got {got}, want {want}"
            );
        }
    }

    #[test]
    fn test_sqrt_ratio_reciprocal_pairs() {
        for &tick in &[1, 60, 887, 10_000, 500_000] {
            let up = sqrt_ratio_x64(tick).unwrap();
            let down = sqrt_ratio_x64(-tick).unwrap();
            let product = mul_shift_64(up, down).unwrap();
            // up * down ~ 1.0 in X64; the reciprocal floors, so allow a
            // relative error of 1e-7
            assert!(
                product.abs_diff(X64) < X64 / 10_000_000,
                "tick {tick}: {product}"
            );
        }
    }

    #[test]
    fn test_sqrt_ratio_rejects_out_of_bounds() {
        assert!(sqrt_ratio_x64(ticks::MAX_TICK + 1).is_err());
        assert!(sqrt_ratio_x64(ticks::MIN_TICK - 1).is_err());
    }

    #[test]
    fn test_narrowing_rejects_loss() {
        assert_eq!(to_u64(u64::MAX as u128).unwrap(), u64::MAX);
        assert!(matches!(
            to_u64(u64::MAX as u128 + 1),
            Err(EngineError::CastingError { target_bits: 64, .. })
        ));
        assert!(to_u16(65_536).is_err());
    }
}
