//! Premium Accumulator
//!
//! Translates raw fees collected by the AMM for a liquidity chunk into
//! owed premium (paid to option buyers) and gross premium (retained by
//! sellers), per unit of liquidity in X64 fixed point.
//!
//! With net liquidity N, removed (borrowed) liquidity R, T = N + R and
//! decay constant vegoid:
//!
//! ```text
//! base   = collected * 2^64 / N
//! owedΔ  = base * (N + R/2^vegoid) / N
//! grossΔ = base * (T^2 - T*R + R^2/2^vegoid) / T^2
//! ```
//!
//! Each delta is computed and applied atomically with the liquidity
//! snapshot the fees were collected under; a zero fee delta never advances
//! the internal baseline to a different snapshot. Running totals use
//! capped addition: on overflow they pin at `u128::MAX` and the chunk
//! freezes permanently (fail-closed). Callers keep the cap unreachable by
//! bounding R/N via [`check_spread_ratio`] on every open and (partial)
//! close.

use crate::constants::precision::X64;
use crate::errors::{EngineError, EngineResult};
use crate::math::{mul_div, mul_shift_64};
use crate::types::ChunkPremium;

/// What one accumulation step did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PremiumDeltas {
    /// Owed-premium delta per token, X64 per unit of liquidity
    pub owed_x64: [u128; 2],
    /// Gross-premium delta per token, X64 per unit of liquidity
    pub gross_x64: [u128; 2],
    /// True when this call (or an earlier one) froze the chunk
    pub frozen: bool,
}

impl PremiumDeltas {
    const NONE: PremiumDeltas = PremiumDeltas {
        owed_x64: [0; 2],
        gross_x64: [0; 2],
        frozen: false,
    };
}

/// Reject a removed-to-net liquidity ratio beyond the configured bound.
/// Position opens and partial closes must pass this for every touched
/// chunk; it is what keeps the capped accumulators unreachable in
/// practice.
pub fn check_spread_ratio(net: u128, removed: u128, max_ratio: u8) -> EngineResult<()> {
    if removed == 0 {
        return Ok(());
    }
    if net == 0 {
        return Err(EngineError::SpreadTooWide {
            removed,
            net,
            max_ratio: max_ratio as u32,
        });
    }
    let cap = net
        .checked_mul(max_ratio as u128)
        .ok_or(EngineError::AmountOverflow)?;
    if removed > cap {
        return Err(EngineError::SpreadTooWide {
            removed,
            net,
            max_ratio: max_ratio as u32,
        });
    }
    Ok(())
}

fn add_capped(total: u128, delta: u128) -> (u128, bool) {
    match total.checked_add(delta) {
        Some(sum) => (sum, false),
        None => (u128::MAX, true),
    }
}

/// Fold newly collected fees into a chunk's running totals.
///
/// `fees_total` is the AMM's cumulative collected-fee counter for this
/// chunk; the difference from the stored baseline is the amount collected
/// under the current `(net, removed)` snapshot.
pub fn accumulate(
    chunk: &mut ChunkPremium,
    fees_total: [u128; 2],
    net: u128,
    removed: u128,
    vegoid: u8,
) -> EngineResult<PremiumDeltas> {
    if chunk.frozen {
        return Ok(PremiumDeltas {
            frozen: true,
            ..PremiumDeltas::NONE
        });
    }

    let mut collected = [0u128; 2];
    for i in 0..2 {
        collected[i] =
            fees_total[i]
                .checked_sub(chunk.fees_base[i])
                .ok_or(EngineError::InvalidParameter {
                    param: "fees_total",
                    reason: "cumulative fee counter went backwards",
                })?;
    }
    if collected == [0, 0] {
        // nothing collected under this snapshot; the baseline must not
        // move, or later fees would be attributed to the wrong liquidity
        return Ok(PremiumDeltas::NONE);
    }
    if net == 0 {
        return Err(EngineError::DivisionDegenerate {
            context: "premium accumulation with zero net liquidity",
        });
    }

    let total = net.checked_add(removed).ok_or(EngineError::AmountOverflow)?;
    // R/T and its square in X64, for the gross multiplier
    let ratio_x64 = mul_div(removed, X64, total)?;
    let ratio_sq_x64 = mul_shift_64(ratio_x64, ratio_x64)?;
    let gross_factor_x64 = X64 - ratio_x64 + (ratio_sq_x64 >> vegoid);
    let owed_numerator = net
        .checked_add(removed >> vegoid)
        .ok_or(EngineError::AmountOverflow)?;

    let mut deltas = PremiumDeltas::NONE;
    let mut frozen = false;
    let mut owed = chunk.owed_x64;
    let mut gross = chunk.gross_x64;
    for i in 0..2 {
        if collected[i] == 0 {
            continue;
        }
        let base = mul_div(collected[i], X64, net)?;
        deltas.owed_x64[i] = mul_div(base, owed_numerator, net)?;
        deltas.gross_x64[i] = mul_shift_64(base, gross_factor_x64)?;

        let (o, of) = add_capped(owed[i], deltas.owed_x64[i]);
        let (g, gf) = add_capped(gross[i], deltas.gross_x64[i]);
        owed[i] = o;
        gross[i] = g;
        frozen = frozen || of || gf;
    }

    // one atomic state transition: totals, baseline, and the snapshot they
    // were computed under
    chunk.owed_x64 = owed;
    chunk.gross_x64 = gross;
    chunk.fees_base = fees_total;
    chunk.frozen = frozen;
    deltas.frozen = frozen;
    Ok(deltas)
}
