//! Collateral / Margin Calculator
//!
//! Pure functions from position legs, current tick, and live pool
//! utilization to collateral requirements. Notional amounts derive from
//! liquidity x sqrt-price range in X64; every product is range-checked and
//! oversized inputs are rejected rather than narrowed.
//!
//! Requirements per leg:
//! - short, out of the money: notional x sell ratio (tightened linearly
//!   above target utilization, up to full notional at saturation)
//! - short, in range: interpolated between the out-of-range requirement
//!   and full notional by how far the price has moved through the range
//! - long: notional x buy ratio
//!
//! A spread pays `min(split, calendar + max_loss)`; surplus collateral in
//! one asset can offset a deficit in the other, scaled by **current**
//! utilization; mint-time snapshots are never consulted here.

use crate::constants::{
    collateral::{
        BUY_RATIO_BPS, CALENDAR_SCALE_K, CROSS_BUFFER_BPS, SATURATED_UTILIZATION_BPS,
        SELL_RATIO_BPS, TARGET_UTILIZATION_BPS,
    },
    precision::BPS_DENOMINATOR,
};
use crate::errors::{EngineError, EngineResult};
use crate::math::{mul_div, mul_shift_64, sqrt_ratio_x64};
use crate::types::{Leg, SafeModeLevel, TickRange, TokenSide};

/// Margin calculation parameters, a value object passed into every call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginConfig {
    pub sell_ratio_bps: u32,
    pub buy_ratio_bps: u32,
    pub target_utilization_bps: u32,
    pub saturated_utilization_bps: u32,
    pub cross_buffer_bps: u32,
}

impl Default for MarginConfig {
    fn default() -> Self {
        Self {
            sell_ratio_bps: SELL_RATIO_BPS,
            buy_ratio_bps: BUY_RATIO_BPS,
            target_utilization_bps: TARGET_UTILIZATION_BPS,
            saturated_utilization_bps: SATURATED_UTILIZATION_BPS,
            cross_buffer_bps: CROSS_BUFFER_BPS,
        }
    }
}

impl MarginConfig {
    /// Conservative override under oracle stress. Caution withdraws
    /// cross-collateral credit; Restricted additionally charges full
    /// notional on every short leg.
    pub fn for_safe_mode(mut self, level: SafeModeLevel) -> Self {
        match level {
            SafeModeLevel::Normal => {}
            SafeModeLevel::Caution => {
                self.cross_buffer_bps = 0;
            }
            SafeModeLevel::Restricted => {
                self.cross_buffer_bps = 0;
                self.sell_ratio_bps = BPS_DENOMINATOR;
            }
        }
        self
    }
}

// ============ Liquidity -> amounts ============

/// token0 owed by `liquidity` over `range`:
/// L * (1/sqrtL - 1/sqrtU), computed as L * (invL - invU) / 2^64 with
/// inv(t) = sqrt(1.0001^-t). Working on the negated ticks keeps full X64
/// resolution for ranges deep below tick zero, where the direct sqrt
/// ratios quantize to a handful of ulps.
pub fn amount0_for_liquidity(liquidity: u128, range: TickRange) -> EngineResult<u128> {
    if range.lower >= range.upper {
        return Err(EngineError::InvalidTickRange {
            lower: range.lower,
            upper: range.upper,
        });
    }
    let inv_l = sqrt_ratio_x64(-range.lower)?;
    let inv_u = sqrt_ratio_x64(-range.upper)?;
    mul_shift_64(liquidity, inv_l - inv_u)
}

/// token1 owed by `liquidity` over `range`: L * (sqrtU - sqrtL) / 2^64
pub fn amount1_for_liquidity(liquidity: u128, range: TickRange) -> EngineResult<u128> {
    if range.lower >= range.upper {
        return Err(EngineError::InvalidTickRange {
            lower: range.lower,
            upper: range.upper,
        });
    }
    let sqrt_l = sqrt_ratio_x64(range.lower)?;
    let sqrt_u = sqrt_ratio_x64(range.upper)?;
    mul_shift_64(liquidity, sqrt_u - sqrt_l)
}

/// Notional a leg is exposed to, in its own token
pub fn leg_notional(liquidity: u128, range: TickRange, side: TokenSide) -> EngineResult<u128> {
    match side {
        TokenSide::Token0 => amount0_for_liquidity(liquidity, range),
        TokenSide::Token1 => amount1_for_liquidity(liquidity, range),
    }
}

/// How much of a leg's notional has been converted out of its token at the
/// current tick: zero fully out of the money, the full notional once the
/// price has crossed the whole range
pub fn moved_notional(leg: &Leg, liquidity: u128, current_tick: i32) -> EngineResult<u128> {
    let range = leg.tick_range()?;
    let clamped = current_tick.clamp(range.lower, range.upper);
    match leg.token_side {
        // token0 converts as the price rises through the range
        TokenSide::Token0 => amount0_for_liquidity(
            liquidity,
            TickRange {
                lower: range.lower,
                upper: clamped.max(range.lower + 1).min(range.upper),
            },
        )
        .map(|a| if clamped == range.lower { 0 } else { a }),
        // token1 converts as the price falls through the range
        TokenSide::Token1 => amount1_for_liquidity(
            liquidity,
            TickRange {
                lower: clamped.min(range.upper - 1).max(range.lower),
                upper: range.upper,
            },
        )
        .map(|a| if clamped == range.upper { 0 } else { a }),
    }
}

// ============ Requirements ============

/// Sell-side collateral ratio after utilization tightening: the base ratio
/// at or below target utilization, full notional at saturation, linear in
/// between
pub fn scaled_sell_ratio_bps(config: &MarginConfig, util_bps: u32) -> u32 {
    if util_bps <= config.target_utilization_bps {
        return config.sell_ratio_bps;
    }
    if util_bps >= config.saturated_utilization_bps {
        return BPS_DENOMINATOR;
    }
    let span = config.saturated_utilization_bps - config.target_utilization_bps;
    let progress = util_bps - config.target_utilization_bps;
    config.sell_ratio_bps + (BPS_DENOMINATOR - config.sell_ratio_bps) * progress / span
}

/// Collateral requirement for one unpaired leg, in the leg's token
pub fn single_leg_requirement(
    leg: &Leg,
    liquidity: u128,
    current_tick: i32,
    util_bps: u32,
    config: &MarginConfig,
) -> EngineResult<u128> {
    let range = leg.tick_range()?;
    let notional = leg_notional(liquidity, range, leg.token_side)?;
    if notional == 0 {
        return Ok(0);
    }
    if leg.long {
        return mul_div(
            notional,
            config.buy_ratio_bps as u128,
            BPS_DENOMINATOR as u128,
        );
    }
    let ratio = scaled_sell_ratio_bps(config, util_bps);
    let base = mul_div(notional, ratio as u128, BPS_DENOMINATOR as u128)?;
    // interpolate toward full notional by how far the price has moved
    // through the range; fully crossed legs post their whole notional
    let moved = moved_notional(leg, liquidity, current_tick)?;
    let extra = mul_div(notional - base, moved.min(notional), notional)?;
    base.checked_add(extra).ok_or(EngineError::AmountOverflow)
}

/// Exposure bounded by the distance between the two legs' strikes (or
/// range edges for a calendar spread). The fallback for a spread whose
/// legs are both fully out of range on the same side; strictly positive
/// whenever the legs differ.
fn strike_gap_exposure(a: &Leg, b: &Leg, liquidity: u128) -> EngineResult<u128> {
    let (mut lo, mut hi) = if a.strike_tick == b.strike_tick {
        // calendar spread: strikes match, widths differ; gap between the
        // range edges carries the exposure
        (a.tick_range()?.upper, b.tick_range()?.upper)
    } else {
        (a.strike_tick, b.strike_tick)
    };
    if lo == hi {
        return Ok(1);
    }
    if lo > hi {
        core::mem::swap(&mut lo, &mut hi);
    }
    let gap = TickRange { lower: lo, upper: hi };
    let exposure = leg_notional(liquidity, gap, a.token_side)?;
    Ok(exposure.max(1))
}

/// Time-value adjustment for legs of different widths:
/// notional * delta(width * spacing) / K, the first-order expansion of the
/// closed-form range-factor difference
fn calendar_adjustment(
    a: &Leg,
    b: &Leg,
    notional: u128,
) -> EngineResult<u128> {
    let span_a = a.width as u128 * a.tick_spacing as u128;
    let span_b = b.width as u128 * b.tick_spacing as u128;
    if span_a == span_b {
        return Ok(0);
    }
    mul_div(notional, span_a.abs_diff(span_b), CALENDAR_SCALE_K)
}

/// Collateral requirement for a paired spread (one long, one short leg on
/// the same underlying token):
/// `min(split, calendar + max_loss)`
pub fn spread_requirement(
    long_leg: &Leg,
    short_leg: &Leg,
    liquidity: u128,
    current_tick: i32,
    util_bps: u32,
    config: &MarginConfig,
) -> EngineResult<u128> {
    if !long_leg.long || short_leg.long {
        return Err(EngineError::InvalidParameter {
            param: "spread",
            reason: "expected one long and one short leg",
        });
    }
    if long_leg.token_side != short_leg.token_side
        || long_leg.tick_spacing != short_leg.tick_spacing
    {
        return Err(EngineError::InvalidParameter {
            param: "spread",
            reason: "legs must share token side and tick spacing",
        });
    }

    let split = single_leg_requirement(long_leg, liquidity, current_tick, util_bps, config)?
        .checked_add(single_leg_requirement(
            short_leg,
            liquidity,
            current_tick,
            util_bps,
            config,
        )?)
        .ok_or(EngineError::AmountOverflow)?;

    let moved_long = moved_notional(long_leg, liquidity, current_tick)?;
    let moved_short = moved_notional(short_leg, liquidity, current_tick)?;
    let max_loss = if moved_long == 0 && moved_short == 0 {
        // both legs fully out of range on the same side: the imbalance
        // formula degenerates to 0/0, which must never read as "safe";
        // fall back to the full strike-gap-bounded exposure
        strike_gap_exposure(long_leg, short_leg, liquidity)?
    } else {
        moved_long.abs_diff(moved_short)
    };

    let notional_short = leg_notional(liquidity, short_leg.tick_range()?, short_leg.token_side)?;
    let notional_long = leg_notional(liquidity, long_leg.tick_range()?, long_leg.token_side)?;
    let calendar = calendar_adjustment(long_leg, short_leg, notional_short.max(notional_long))?;

    let paired = calendar
        .checked_add(max_loss)
        .ok_or(EngineError::AmountOverflow)?;
    Ok(split.min(paired))
}

// ============ Cross-asset buffering ============

/// Fraction of surplus collateral in one asset creditable against the
/// other asset's deficit, given the deficit side's **current** utilization
pub fn cross_buffer_ratio_bps(config: &MarginConfig, current_util_bps: u32) -> u32 {
    if current_util_bps <= config.target_utilization_bps {
        return config.cross_buffer_bps;
    }
    if current_util_bps >= config.saturated_utilization_bps {
        return 0;
    }
    let span = config.saturated_utilization_bps - config.target_utilization_bps;
    let left = config.saturated_utilization_bps - current_util_bps;
    config.cross_buffer_bps * left / span
}

/// Per-token deficits after cross-asset offsetting. A position is solvent
/// iff both remaining deficits are zero.
///
/// `current_util_bps` must come from live vault state at the moment of the
/// check; feeding a utilization captured earlier in a position's life
/// defeats the tightening of cross-collateral credit under stress.
pub fn effective_deficits(
    required: [u128; 2],
    balance: [u128; 2],
    current_util_bps: [u32; 2],
    config: &MarginConfig,
) -> EngineResult<[u128; 2]> {
    let mut deficits = [0u128; 2];
    for i in 0..2 {
        let j = 1 - i;
        let deficit = required[i].saturating_sub(balance[i]);
        if deficit == 0 {
            continue;
        }
        let surplus = balance[j].saturating_sub(required[j]);
        let ratio = cross_buffer_ratio_bps(config, current_util_bps[i]);
        let credit = mul_div(surplus, ratio as u128, BPS_DENOMINATOR as u128)?;
        deficits[i] = deficit.saturating_sub(credit);
    }
    Ok(deficits)
}

/// Gate for minting against or withdrawing from an account: every token
/// side must be fully collateralized after cross-buffering
pub fn ensure_collateralized(
    required: [u128; 2],
    balance: [u128; 2],
    current_util_bps: [u32; 2],
    config: &MarginConfig,
) -> EngineResult<()> {
    let deficits = effective_deficits(required, balance, current_util_bps, config)?;
    for i in 0..2 {
        if deficits[i] > 0 {
            return Err(EngineError::InsufficientCollateral {
                required: required[i],
                available: balance[i],
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn short_leg(strike: i32, width: u16, side: TokenSide) -> Leg {
        Leg {
            strike_tick: strike,
            width,
            tick_spacing: 60,
            long: false,
            token_side: side,
        }
    }

    fn long_leg(strike: i32, width: u16, side: TokenSide) -> Leg {
        Leg {
            long: true,
            ..short_leg(strike, width, side)
        }
    }

    const L: u128 = 1_000_000_000_000; // 1e12 liquidity units

    #[test]
    fn test_amount1_matches_float_reference() {
        let range = TickRange { lower: -600, upper: 600 };
        let got = amount1_for_liquidity(L, range).unwrap() as f64;
        let exact = L as f64 * (1.0001f64.powf(300.0) - 1.0001f64.powf(-300.0));
        let rel = (got - exact).abs() / exact;
        assert!(rel < 1e-6, "got {got}, want {exact}");
    }

    #[test]
    fn test_amount0_amount1_symmetry_around_zero() {
        // a range symmetric around tick 0 holds near-equal token amounts
        let range = TickRange { lower: -600, upper: 600 };
        let a0 = amount0_for_liquidity(L, range).unwrap();
        let a1 = amount1_for_liquidity(L, range).unwrap();
        assert!(a0.abs_diff(a1) * 10 < a1, "a0 {a0} vs a1 {a1}");
    }

    #[test]
    fn test_amount0_precise_at_deep_negative_ticks() {
        // sqrt ratios this far below zero quantize to a few X64 ulps; the
        // reciprocal-tick form must still track the closed form
        let range = TickRange { lower: -800_000, upper: -799_000 };
        let got = amount0_for_liquidity(L, range).unwrap() as f64;
        let exact = L as f64 * (1.0001f64.powf(400_000.0) - 1.0001f64.powf(399_500.0));
        let rel = (got - exact).abs() / exact;
        assert!(rel < 1e-6, "got {got}, want {exact}");
    }

    #[test]
    fn test_inverted_range_rejected_not_panicking() {
        let inverted = TickRange { lower: 600, upper: -600 };
        assert_eq!(
            amount0_for_liquidity(L, inverted),
            Err(EngineError::InvalidTickRange { lower: 600, upper: -600 })
        );
        assert_eq!(
            amount1_for_liquidity(L, inverted),
            Err(EngineError::InvalidTickRange { lower: 600, upper: -600 })
        );
        // empty ranges are malformed too
        let empty = TickRange { lower: 0, upper: 0 };
        assert!(amount0_for_liquidity(L, empty).is_err());
        assert!(amount1_for_liquidity(L, empty).is_err());
    }

    #[test]
    fn test_oversized_range_rejected_not_truncated() {
        let range = TickRange { lower: -860_000, upper: 860_000 };
        assert_eq!(
            amount0_for_liquidity(u128::MAX / 2, range),
            Err(EngineError::AmountOverflow)
        );
    }

    #[test]
    fn test_sell_ratio_tightens_with_utilization() {
        let cfg = MarginConfig::default();
        assert_eq!(scaled_sell_ratio_bps(&cfg, 0), SELL_RATIO_BPS);
        assert_eq!(scaled_sell_ratio_bps(&cfg, 5_000), SELL_RATIO_BPS);
        assert_eq!(scaled_sell_ratio_bps(&cfg, 7_000), 6_000);
        assert_eq!(scaled_sell_ratio_bps(&cfg, 9_000), 10_000);
        assert_eq!(scaled_sell_ratio_bps(&cfg, 10_000), 10_000);
    }

    #[test]
    fn test_short_leg_otm_in_itm_ordering() {
        let cfg = MarginConfig::default();
        let leg = short_leg(0, 10, TokenSide::Token0); // range [-300, 300)
        let notional = leg_notional(L, leg.tick_range().unwrap(), TokenSide::Token0).unwrap();

        let otm = single_leg_requirement(&leg, L, -1_000, 0, &cfg).unwrap();
        let atm = single_leg_requirement(&leg, L, 0, 0, &cfg).unwrap();
        let itm = single_leg_requirement(&leg, L, 1_000, 0, &cfg).unwrap();

        assert!(otm < atm && atm < itm);
        assert_eq!(otm, notional * SELL_RATIO_BPS as u128 / 10_000);
        assert_eq!(itm, notional);
    }

    #[test]
    fn test_long_leg_cheaper_than_short() {
        let cfg = MarginConfig::default();
        let short = short_leg(0, 10, TokenSide::Token1);
        let long = long_leg(0, 10, TokenSide::Token1);
        let s = single_leg_requirement(&short, L, -1_000, 0, &cfg).unwrap();
        let l = single_leg_requirement(&long, L, -1_000, 0, &cfg).unwrap();
        assert!(l < s);
    }

    #[test]
    fn test_spread_cheaper_than_split() {
        let cfg = MarginConfig::default();
        // vertical spread, both legs near the money
        let long = long_leg(0, 10, TokenSide::Token0);
        let short = short_leg(1_200, 10, TokenSide::Token0);
        let spread = spread_requirement(&long, &short, L, 0, 0, &cfg).unwrap();
        let split = single_leg_requirement(&long, L, 0, 0, &cfg).unwrap()
            + single_leg_requirement(&short, L, 0, 0, &cfg).unwrap();
        assert!(spread <= split);
        assert!(spread > 0);
    }

    #[test]
    fn test_spread_degeneracy_both_legs_out_of_range() {
        // both token0 ranges sit above the current tick, so neither leg
        // has begun converting: both moved notionals are zero and the
        // requirement must still be strictly positive, bounded by the
        // strike-gap exposure
        let cfg = MarginConfig::default();
        let long = long_leg(17_000, 10, TokenSide::Token0);
        let short = short_leg(20_000, 10, TokenSide::Token0);
        assert_eq!(moved_notional(&long, L, 0).unwrap(), 0);
        assert_eq!(moved_notional(&short, L, 0).unwrap(), 0);

        let req = spread_requirement(&long, &short, L, 0, 0, &cfg).unwrap();
        assert!(req > 0, "degenerate spread must never be free");

        let cap = leg_notional(
            L,
            TickRange { lower: 17_000, upper: 20_000 },
            TokenSide::Token0,
        )
        .unwrap();
        assert!(req <= cap, "req {req} must be bounded by the gap cap {cap}");

        // adjacent strikes: the gap exposure undercuts the split and is
        // the binding requirement
        let near_long = long_leg(19_940, 10, TokenSide::Token0);
        let near_short = short_leg(20_000, 10, TokenSide::Token0);
        assert_eq!(moved_notional(&near_long, L, 0).unwrap(), 0);
        let near_req = spread_requirement(&near_long, &near_short, L, 0, 0, &cfg).unwrap();
        let gap = leg_notional(
            L,
            TickRange { lower: 19_940, upper: 20_000 },
            TokenSide::Token0,
        )
        .unwrap();
        assert_eq!(near_req, gap.max(1));
    }

    #[test]
    fn test_calendar_scale_matches_closed_form() {
        // K approximates the closed-form range-factor difference to first
        // order; an error here mis-scales every calendar spread
        let notional: u128 = 1_000_000_000_000;
        let spans: [(f64, f64); 3] = [(600.0, 1_200.0), (60.0, 600.0), (1_200.0, 4_800.0)];
        for (s_a, s_b) in spans {
            let f = |h: f64| 1.0001f64.powf(h / 4.0) - 1.0001f64.powf(-h / 4.0);
            let closed = notional as f64 * (f(s_b) - f(s_a));
            let approx = mul_div(notional, (s_b - s_a) as u128, CALENDAR_SCALE_K).unwrap() as f64;
            let rel = (approx - closed).abs() / closed;
            assert!(rel < 0.02, "spans {s_a}/{s_b}: approx {approx} closed {closed}");
        }
    }

    #[test]
    fn test_calendar_spread_charges_width_gap() {
        let cfg = MarginConfig::default();
        // same strike, different widths, both ranges above the current
        // tick: unmoved on both sides, so the range-edge gap carries the
        // exposure
        let long = long_leg(20_000, 4, TokenSide::Token0);
        let short = short_leg(20_000, 20, TokenSide::Token0);
        assert_eq!(moved_notional(&long, L, 0).unwrap(), 0);
        let req = spread_requirement(&long, &short, L, 0, 0, &cfg).unwrap();
        assert!(req > 0);
    }

    #[test]
    fn test_cross_buffer_ratio_decay() {
        let cfg = MarginConfig::default();
        assert_eq!(cross_buffer_ratio_bps(&cfg, 3_000), CROSS_BUFFER_BPS);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 5_000), CROSS_BUFFER_BPS);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 7_000), CROSS_BUFFER_BPS / 2);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 8_500), 1_125);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 9_000), 0);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 9_999), 0);
    }

    #[test]
    fn test_cross_buffer_uses_current_not_minted_utilization() {
        // minted at 30% utilization, checked when the pool is at 85%: the
        // buffer must reflect the stressed 85%, not the mint snapshot
        let cfg = MarginConfig::default();
        let required = [1_000u128, 0];
        let balance = [200u128, 2_000];

        let minted_util = 3_000u32;
        let current_util = 8_500u32;

        let at_mint = effective_deficits(required, balance, [minted_util; 2], &cfg).unwrap();
        // full buffer: 2000 surplus * 90% = 1800 credit, deficit covered
        assert_eq!(at_mint, [0, 0]);

        let now = effective_deficits(required, balance, [current_util; 2], &cfg).unwrap();
        // decayed buffer: 2000 * 11.25% = 225 credit against an 800 deficit
        assert_eq!(now, [575, 0]);
    }

    #[test]
    fn test_safe_mode_never_relaxes_requirements() {
        let base = MarginConfig::default();
        let leg = short_leg(0, 10, TokenSide::Token0);

        let normal = single_leg_requirement(&leg, L, -5_000, 0, &base).unwrap();
        let caution =
            single_leg_requirement(&leg, L, -5_000, 0, &base.for_safe_mode(SafeModeLevel::Caution))
                .unwrap();
        let restricted = single_leg_requirement(
            &leg,
            L,
            -5_000,
            0,
            &base.for_safe_mode(SafeModeLevel::Restricted),
        )
        .unwrap();
        assert!(normal <= caution && caution < restricted);

        // caution drops cross-collateral credit entirely
        let cfg = base.for_safe_mode(SafeModeLevel::Caution);
        assert_eq!(cross_buffer_ratio_bps(&cfg, 0), 0);
    }

    #[test]
    fn test_ensure_collateralized_gate() {
        let cfg = MarginConfig::default();
        assert!(ensure_collateralized([100, 0], [100, 0], [0, 0], &cfg).is_ok());
        assert_eq!(
            ensure_collateralized([100, 0], [40, 0], [9_000, 9_000], &cfg),
            Err(EngineError::InsufficientCollateral { required: 100, available: 40 })
        );
    }

    #[test]
    fn test_effective_deficits_bidirectional() {
        let cfg = MarginConfig::default();
        // deficits on both sides: no surplus anywhere, nothing offsets
        let d = effective_deficits([100, 100], [50, 50], [0, 0], &cfg).unwrap();
        assert_eq!(d, [50, 50]);
        // fully collateralized
        let d = effective_deficits([100, 100], [100, 100], [9_999, 9_999], &cfg).unwrap();
        assert_eq!(d, [0, 0]);
    }
}
