//! Oracle Gate and Safe Mode
//!
//! The engine never reads a price feed itself: it receives one
//! [`OracleQuote`] per call and validates it here before any
//! safety-critical math runs. Risk parameters are recomputed fresh from
//! the quote plus static configuration on every evaluation; nothing in
//! this module caches across calls.

use crate::errors::{EngineError, EngineResult};
use crate::types::{OracleQuote, RiskConfig, RiskParameters, SafeModeLevel};

/// Static oracle acceptance bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OracleConfig {
    /// Maximum quote age accepted for safety-critical checks, seconds
    pub max_age_secs: u32,
    /// Spot-vs-TWAP tick delta that triggers Caution (~5% price move)
    pub caution_tick_delta: u32,
    /// Spot-vs-TWAP tick delta that triggers Restricted (~10% price move)
    pub restricted_tick_delta: u32,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            max_age_secs: 600,
            caution_tick_delta: 477,
            restricted_tick_delta: 953,
        }
    }
}

/// Reject a quote that is older than the configured bound
pub fn check_freshness(quote: &OracleQuote, config: &OracleConfig) -> EngineResult<()> {
    if quote.age_secs > config.max_age_secs {
        return Err(EngineError::StaleOracle {
            age_secs: quote.age_secs,
            max_age_secs: config.max_age_secs,
        });
    }
    Ok(())
}

fn tick_delta(quote: &OracleQuote) -> u32 {
    quote.current_tick.abs_diff(quote.twap_tick)
}

/// Protocol risk posture implied by the spot-vs-TWAP divergence
pub fn safe_mode_level(quote: &OracleQuote, config: &OracleConfig) -> SafeModeLevel {
    let delta = tick_delta(quote);
    if delta >= config.restricted_tick_delta {
        SafeModeLevel::Restricted
    } else if delta >= config.caution_tick_delta {
        SafeModeLevel::Caution
    } else {
        SafeModeLevel::Normal
    }
}

/// Liquidation-grade divergence check against the per-protocol tolerance
pub fn check_liquidation_window(quote: &OracleQuote, tolerance: u16) -> EngineResult<()> {
    let delta = tick_delta(quote);
    if delta > tolerance as u32 {
        return Err(EngineError::OracleDivergence {
            spot_tick: quote.current_tick,
            twap_tick: quote.twap_tick,
            max_delta: tolerance as u32,
        });
    }
    Ok(())
}

/// Build the per-call risk parameter value object. Fails on a stale quote;
/// the result must not outlive the call it was built for.
pub fn risk_parameters(
    quote: &OracleQuote,
    risk_config: &RiskConfig,
    oracle_config: &OracleConfig,
) -> EngineResult<RiskParameters> {
    check_freshness(quote, oracle_config)?;
    Ok(RiskParameters {
        safe_mode: safe_mode_level(quote, oracle_config),
        config: *risk_config,
    })
}
