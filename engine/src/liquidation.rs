//! Liquidation and Forced Exercise
//!
//! Solvency checks run against cross-buffered margin from
//! [`crate::collateral`]; a liquidation can only proceed once the oracle
//! window check has passed and the account still shows a deficit.
//!
//! When seized collateral cannot cover everything owed, premium
//! entitlements of the liquidated account are haircut proportionally,
//! long and short legs alike. Forced exercise of idle long positions
//! charges a fee that halves for each full range-width the price sits
//! beyond the leg's range.

use crate::collateral::{effective_deficits, MarginConfig};
use crate::constants::{
    liquidation::{
        FORCE_EXERCISE_BASE_BPS, FORCE_EXERCISE_IN_RANGE_BPS, FORCE_EXERCISE_MIN_BPS,
        LIQUIDATION_BONUS_BPS,
    },
    precision::BPS_DENOMINATOR,
};
use crate::errors::{EngineError, EngineResult};
use crate::math::mul_div;
use crate::oracle::{check_freshness, check_liquidation_window, OracleConfig};
use crate::types::{Leg, OracleQuote};

/// Result of a solvency check: remaining per-token deficits after
/// cross-asset offsetting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolvencyStatus {
    pub deficits: [u128; 2],
}

impl SolvencyStatus {
    pub fn is_solvent(&self) -> bool {
        self.deficits == [0, 0]
    }
}

/// What a completed liquidation settles to, per token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationOutcome {
    /// Collateral transferred to the liquidator
    pub seized: [u128; 2],
    /// Incentive paid out of the seized collateral
    pub bonus: [u128; 2],
    /// Shortfall the protocol absorbs after collateral is exhausted
    pub protocol_loss: [u128; 2],
}

/// Cross-buffered solvency of an account at current utilization
pub fn check_solvency(
    required: [u128; 2],
    balance: [u128; 2],
    current_util_bps: [u32; 2],
    margin_config: &MarginConfig,
) -> EngineResult<SolvencyStatus> {
    let deficits = effective_deficits(required, balance, current_util_bps, margin_config)?;
    Ok(SolvencyStatus { deficits })
}

/// Liquidate an insolvent account.
///
/// Fails with [`EngineError::NotLiquidatable`] if the account is solvent
/// and with [`EngineError::OracleDivergence`] if spot and TWAP disagree
/// beyond the configured tolerance, so a single manipulated observation
/// cannot trigger a seizure.
pub fn liquidate(
    required: [u128; 2],
    balance: [u128; 2],
    current_util_bps: [u32; 2],
    quote: &OracleQuote,
    liquidation_tick_tolerance: u16,
    margin_config: &MarginConfig,
    oracle_config: &OracleConfig,
) -> EngineResult<LiquidationOutcome> {
    check_freshness(quote, oracle_config)?;
    check_liquidation_window(quote, liquidation_tick_tolerance)?;
    let status = check_solvency(required, balance, current_util_bps, margin_config)?;
    if status.is_solvent() {
        let surplus = balance[0]
            .saturating_sub(required[0])
            .saturating_add(balance[1].saturating_sub(required[1]));
        return Err(EngineError::NotLiquidatable { surplus });
    }

    let mut outcome = LiquidationOutcome {
        seized: balance,
        bonus: [0; 2],
        protocol_loss: [0; 2],
    };
    for i in 0..2 {
        let full_bonus = mul_div(
            required[i],
            LIQUIDATION_BONUS_BPS as u128,
            BPS_DENOMINATOR as u128,
        )?;
        // the bonus is paid from what was actually seized
        outcome.bonus[i] = full_bonus.min(balance[i]);
        outcome.protocol_loss[i] = required[i].saturating_sub(balance[i]);
    }
    Ok(outcome)
}

/// Scale premium entitlements down to what `available` can cover.
///
/// Every entry is reduced by the same ratio, regardless of whether it
/// belongs to a long or a short leg; rounding dust stays unpaid. Returns
/// the total actually paid out.
pub fn apply_premium_haircut(entitlements: &mut [u128], available: u128) -> EngineResult<u128> {
    let mut total: u128 = 0;
    for e in entitlements.iter() {
        total = total.checked_add(*e).ok_or(EngineError::AmountOverflow)?;
    }
    if total <= available {
        return Ok(total);
    }
    let mut paid: u128 = 0;
    for e in entitlements.iter_mut() {
        *e = mul_div(*e, available, total)?;
        paid += *e;
    }
    Ok(paid)
}

/// Fee in bps for force-exercising one long leg at the current tick.
///
/// In range the full fee applies; out of range it halves per full
/// range-width of distance from the nearer edge, floored at the minimum.
pub fn force_exercise_fee_bps(leg: &Leg, current_tick: i32) -> EngineResult<u32> {
    if !leg.long {
        return Err(EngineError::NotExercisable { reason: "leg is not long" });
    }
    let range = leg.tick_range()?;
    if !leg.is_out_of_range(current_tick)? {
        return Ok(FORCE_EXERCISE_IN_RANGE_BPS);
    }
    let width_ticks = (range.upper - range.lower) as u32;
    let distance = if current_tick < range.lower {
        (range.lower - current_tick) as u32
    } else {
        (current_tick - range.upper) as u32
    };
    let ranges_away = (distance / width_ticks).min(31);
    Ok((FORCE_EXERCISE_BASE_BPS >> ranges_away).max(FORCE_EXERCISE_MIN_BPS))
}

/// Total cost of force-exercising a position: the per-leg fee applied to
/// each long leg's notional. A position with no long leg cannot be
/// force-exercised.
pub fn force_exercise_cost(
    legs: &[Leg],
    liquidity: u128,
    current_tick: i32,
) -> EngineResult<u128> {
    let mut cost: u128 = 0;
    let mut any_long = false;
    for leg in legs.iter().filter(|l| l.long) {
        any_long = true;
        let fee_bps = force_exercise_fee_bps(leg, current_tick)?;
        let notional =
            crate::collateral::leg_notional(liquidity, leg.tick_range()?, leg.token_side)?;
        let fee = mul_div(notional, fee_bps as u128, BPS_DENOMINATOR as u128)?;
        cost = cost.checked_add(fee).ok_or(EngineError::AmountOverflow)?;
    }
    if !any_long {
        return Err(EngineError::NotExercisable { reason: "position has no long leg" });
    }
    Ok(cost)
}
