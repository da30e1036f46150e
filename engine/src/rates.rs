//! Adaptive Interest Rate Model
//!
//! A utilization-driven, piecewise-linear curve around a stored
//! `rate_at_target`, with time-bounded compounding. The instantaneous rate
//! is `rate_at_target` scaled down to 1/steepness at zero utilization and
//! up to steepness at full utilization, clamped to the protocol's
//! [0.1%, 800%] annualized band. `rate_at_target` itself drifts toward the
//! utilization error at a bounded speed, so the curve adapts to sustained
//! pressure without jumping on a single observation.
//!
//! Compounding uses the bounded-order Taylor expansion in
//! [`crate::math::expm1_taylor`]; the elapsed-time clamp keeps every
//! `rate * dt` product inside the expansion's documented tolerance.

use crate::constants::{
    collateral::TARGET_UTILIZATION_BPS,
    precision::{BPS_DENOMINATOR, WAD},
    rates::{
        ADJUSTMENT_SPEED_WAD, CURVE_STEEPNESS, MAX_ACCRUAL_SECS, MAX_RATE_WAD, MIN_RATE_WAD,
    },
};
use crate::errors::{EngineError, EngineResult};
use crate::math::{expm1_taylor, mul_div, to_u64, wad_mul};
use crate::types::{InterestAccumulator, UserInterestState};

/// What a single accrual step did, for event reporting and tests
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccrualOutcome {
    /// Seconds credited (after the clamp)
    pub elapsed_secs: u32,
    /// Instantaneous per-second rate used, WAD
    pub rate_wad: u128,
    /// Compounded growth factor minus one, WAD
    pub growth_wad: u128,
    /// Interest accrued on borrowed notional, token units
    pub interest_accrued: u128,
}

/// Normalized utilization error vs target, WAD magnitude plus sign
fn utilization_error(util_bps: u32) -> (u128, bool) {
    let util = util_bps.min(BPS_DENOMINATOR) as u128;
    let target = TARGET_UTILIZATION_BPS as u128;
    if util >= target {
        let span = BPS_DENOMINATOR as u128 - target;
        (WAD * (util - target) / span, true)
    } else {
        (WAD * (target - util) / target, false)
    }
}

/// Instantaneous per-second rate, WAD, from the stored rate-at-target and
/// current utilization
pub fn instantaneous_rate_wad(rate_at_target: i64, util_bps: u32) -> EngineResult<u128> {
    let base = (rate_at_target.max(0) as u128).clamp(MIN_RATE_WAD, MAX_RATE_WAD);
    let (err, above) = utilization_error(util_bps);
    let rate = if above {
        // up to steepness x at full utilization
        let bump = wad_mul(base * (CURVE_STEEPNESS - 1), err)?;
        base + bump
    } else {
        // down to 1/steepness at zero utilization
        let cut = wad_mul(base * (CURVE_STEEPNESS - 1) / CURVE_STEEPNESS, err)?;
        base - cut
    };
    Ok(rate.clamp(MIN_RATE_WAD, MAX_RATE_WAD))
}

/// Drift rate_at_target toward the utilization error at a bounded speed
fn adapt_rate_at_target(rate_at_target: i64, util_bps: u32, elapsed: u32) -> EngineResult<i64> {
    let base = (rate_at_target.max(0) as u128).clamp(MIN_RATE_WAD, MAX_RATE_WAD);
    let (err, above) = utilization_error(util_bps);
    let speed_dt = ADJUSTMENT_SPEED_WAD
        .checked_mul(elapsed as u128)
        .ok_or(EngineError::AmountOverflow)?;
    let pressure = wad_mul(speed_dt, err)?;
    let delta = wad_mul(base, pressure)?;
    let adjusted = if above {
        base.saturating_add(delta)
    } else {
        base.saturating_sub(delta)
    };
    Ok(adjusted.clamp(MIN_RATE_WAD, MAX_RATE_WAD) as i64)
}

/// Accrue compounding interest on `borrowed` notional up to `now_epoch`.
///
/// Elapsed time is clamped to `MAX_ACCRUAL_SECS` per step to bound
/// single-update drift. A stored epoch ahead of `now_epoch` is a
/// corruption signal and fails loudly: a negative duration must never
/// reach the compounding function.
pub fn accrue(
    acc: &mut InterestAccumulator,
    borrowed: u128,
    util_bps: u32,
    now_epoch: u32,
) -> EngineResult<AccrualOutcome> {
    if now_epoch < acc.last_update_epoch {
        return Err(EngineError::ClockRegression {
            stored_epoch: acc.last_update_epoch,
            current_epoch: now_epoch,
        });
    }
    let elapsed = (now_epoch - acc.last_update_epoch).min(MAX_ACCRUAL_SECS);
    if elapsed == 0 {
        return Ok(AccrualOutcome {
            elapsed_secs: 0,
            rate_wad: instantaneous_rate_wad(acc.rate_at_target, util_bps)?,
            growth_wad: 0,
            interest_accrued: 0,
        });
    }

    let rate = instantaneous_rate_wad(acc.rate_at_target, util_bps)?;
    let rate_dt = rate
        .checked_mul(elapsed as u128)
        .ok_or(EngineError::AmountOverflow)?;
    let growth = expm1_taylor(rate_dt)?;

    // growth >= 0, so the index can only move up
    let index_gain = wad_mul(acc.borrow_index, growth)?;
    let borrow_index = acc
        .borrow_index
        .checked_add(index_gain)
        .ok_or(EngineError::AmountOverflow)?;

    let interest = wad_mul(borrowed, growth)?;
    let unrealized = (acc.unrealized_interest as u128)
        .checked_add(interest)
        .ok_or(EngineError::AmountOverflow)?;
    let unrealized = to_u64(unrealized)?;
    let rate_at_target = adapt_rate_at_target(acc.rate_at_target, util_bps, elapsed)?;

    // no fallible step remains; commit the whole update together so an
    // error can never leave the index advanced without the epoch
    acc.borrow_index = borrow_index;
    acc.unrealized_interest = unrealized;
    acc.rate_at_target = rate_at_target;
    acc.last_update_epoch = now_epoch;

    Ok(AccrualOutcome {
        elapsed_secs: elapsed,
        rate_wad: rate,
        growth_wad: growth,
        interest_accrued: interest,
    })
}

/// Interest owed by a user since their last settlement:
/// `net_borrows * (index - user_index) / user_index`, defined only while
/// `net_borrows > 0`
pub fn interest_owed(user: &UserInterestState, acc: &InterestAccumulator) -> EngineResult<u128> {
    if user.net_borrows <= 0 {
        return Ok(0);
    }
    if user.user_borrow_index == 0 {
        return Err(EngineError::DivisionDegenerate {
            context: "user borrow index is zero",
        });
    }
    let delta = acc
        .borrow_index
        .checked_sub(user.user_borrow_index)
        .ok_or(EngineError::InvalidParameter {
            param: "user_borrow_index",
            reason: "snapshot ahead of the market index",
        })?;
    mul_div(user.net_borrows as u128, delta, user.user_borrow_index)
}

/// Settle a user's accrued interest and refresh their index snapshot
pub fn settle_user(
    user: &mut UserInterestState,
    acc: &InterestAccumulator,
) -> EngineResult<u128> {
    let owed = interest_owed(user, acc)?;
    user.user_borrow_index = acc.borrow_index;
    Ok(owed)
}
