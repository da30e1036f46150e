//! Protocol Constants
//!
//! All magic numbers and configuration defaults for the Strike engine.
//! Rates and ratios are expressed either in WAD fixed point (1e18) or in
//! basis points out of 10,000; sqrt prices and premium accumulators use
//! X64 fixed point (2^64).

/// Fixed-point scales
pub mod precision {
    /// WAD fixed-point scale (1e18), used for rates and indices
    pub const WAD: u128 = 1_000_000_000_000_000_000;

    /// X64 fixed-point scale (2^64), used for sqrt prices and premia
    pub const X64: u128 = 1 << 64;

    /// Basis points denominator
    pub const BPS_DENOMINATOR: u32 = 10_000;
}

/// Interest rate model bounds
pub mod rates {
    use super::precision::WAD;

    pub const SECONDS_PER_YEAR: u64 = 31_536_000;

    /// Minimum instantaneous rate: 0.1% annualized, per-second WAD
    /// (1e15 / 31_536_000)
    pub const MIN_RATE_WAD: u128 = 31_709_791;

    /// Maximum instantaneous rate: 800% annualized, per-second WAD
    /// (8e18 / 31_536_000)
    pub const MAX_RATE_WAD: u128 = 253_678_335_870;

    /// Default rate at target utilization: 4% annualized, per-second WAD
    pub const DEFAULT_RATE_AT_TARGET_WAD: u128 = 1_268_391_679;

    /// Maximum elapsed time credited in a single accrual step (90 days).
    /// Together with MAX_RATE_WAD this bounds rate*dt below
    /// TAYLOR_INPUT_CAP_WAD, keeping the expansion inside its tolerance.
    pub const MAX_ACCRUAL_SECS: u32 = 7_776_000;

    /// Order of the Taylor expansion of e^x - 1 used for compounding
    pub const TAYLOR_ORDER: u32 = 6;

    /// Largest rate*dt product accepted by the compounding function.
    /// At x = 2.0 the order-6 truncation underestimates e^x - 1 by ~0.53%,
    /// within the documented 1% tolerance. MAX_RATE_WAD * MAX_ACCRUAL_SECS
    /// = 1.9726e18 stays below this cap.
    pub const TAYLOR_INPUT_CAP_WAD: u128 = 2 * WAD;

    /// Multiplier applied to rate_at_target at 100% utilization
    pub const CURVE_STEEPNESS: u128 = 4;

    /// Speed at which rate_at_target drifts toward equilibrium, per-second
    /// WAD (50 per year, Morpho-style half-life of ~5 days at full error)
    pub const ADJUSTMENT_SPEED_WAD: u128 = 1_585_489_599_188;
}

/// Collateral requirement parameters
pub mod collateral {
    /// Maintenance ratio for short (sold) legs, bps of notional
    pub const SELL_RATIO_BPS: u32 = 2_000;

    /// Maintenance ratio for long (bought) legs, bps of notional
    pub const BUY_RATIO_BPS: u32 = 1_000;

    /// Pool utilization at which collateral ratios begin to tighten
    pub const TARGET_UTILIZATION_BPS: u32 = 5_000;

    /// Pool utilization at which sell legs require full notional and the
    /// cross-asset buffer reaches zero
    pub const SATURATED_UTILIZATION_BPS: u32 = 9_000;

    /// Fraction of surplus collateral in one asset creditable against a
    /// deficit in the other, at or below target utilization
    pub const CROSS_BUFFER_BPS: u32 = 9_000;

    /// Scale constant for the calendar-spread adjustment:
    /// time value of a width-w range ~ notional * w * spacing / K, the
    /// first-order expansion of 1.0001^{x/2} - 1.0001^{-x/2} with
    /// K = 2 / ln(1.0001). Verified against the closed form in tests.
    pub const CALENDAR_SCALE_K: u128 = 20_001;
}

/// Premium accumulation parameters
pub mod premium {
    /// Default vegoid decay exponent: removed liquidity contributes
    /// removed >> VEGOID to the owed-premium multiplier
    pub const DEFAULT_VEGOID: u8 = 1;

    /// Maximum removed-to-net liquidity ratio for any chunk. Bounding this
    /// keeps the capped X64 accumulators unreachable through ordinary
    /// opens, closes, and partial closes.
    pub const MAX_SPREAD_RATIO: u8 = 9;
}

/// Liquidation and forced-exercise parameters
pub mod liquidation {
    /// Liquidator bonus, bps of the liquidatee's required collateral
    pub const LIQUIDATION_BONUS_BPS: u32 = 500;

    /// Forced-exercise fee for a just-out-of-range long leg, bps of
    /// notional; halves per range-width of distance from the money
    pub const FORCE_EXERCISE_BASE_BPS: u32 = 128;

    /// Floor for the decayed forced-exercise fee
    pub const FORCE_EXERCISE_MIN_BPS: u32 = 4;

    /// Full fee charged when the exercised long leg is still in range
    pub const FORCE_EXERCISE_IN_RANGE_BPS: u32 = 1_024;
}

/// Tick domain accepted by the engine
pub mod ticks {
    /// Lowest strike/price tick. Bounds are chosen so that
    /// sqrt(1.0001^MAX_TICK) in X64 fits a u128 with headroom.
    pub const MIN_TICK: i32 = -870_000;

    /// Highest strike/price tick
    pub const MAX_TICK: i32 = 870_000;

    /// Largest supported tick spacing
    pub const MAX_TICK_SPACING: u16 = 1_000;

    /// Largest leg width, in tick-spacing units
    pub const MAX_WIDTH: u16 = 4_096;
}
