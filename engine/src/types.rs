//! Core Types for the Strike Engine
//!
//! Value structs for interest, risk, position, and premium state. All
//! in-memory computation happens on these full-width types; the packed
//! 256-bit storage encoding lives in [`crate::codec`].

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::constants::{precision::BPS_DENOMINATOR, ticks};
use crate::errors::{EngineError, EngineResult};

/// 20-byte account address
pub type AccountId = [u8; 20];

/// 20-byte fee recipient address (matches the 160-bit packed field exactly)
pub type FeeRecipient = AccountId;

/// Stable identifier for a liquidity chunk (tick range x side)
pub type ChunkKey = [u8; 32];

/// Which of the pool's two assets a leg or vault refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum TokenSide {
    Token0,
    Token1,
}

impl TokenSide {
    pub fn index(self) -> usize {
        match self {
            TokenSide::Token0 => 0,
            TokenSide::Token1 => 1,
        }
    }
}

/// Protocol-wide risk posture derived from oracle divergence
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum SafeModeLevel {
    /// Oracle healthy; standard collateral rules
    #[default]
    Normal,
    /// Mild divergence; new risk-increasing positions restricted
    Caution,
    /// Severe divergence; conservative collateral rules, liquidations only
    /// with refreshed oracle state
    Restricted,
}

// ============ Interest State ============

/// Per-market-side interest accumulator.
///
/// `borrow_index` is a WAD ratio, starts at 1.0 and never decreases.
/// All four fields are range-validated against their packed bit widths
/// before encoding; see [`crate::codec`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct InterestAccumulator {
    /// Compounded borrow index, WAD (>= 1e18, monotone non-decreasing)
    pub borrow_index: u128,
    /// Coarse timestamp of the last accrual, seconds
    pub last_update_epoch: u32,
    /// Adaptive per-second rate at target utilization, WAD (signed in the
    /// packed layout; always positive in practice due to the rate floor)
    pub rate_at_target: i64,
    /// Interest accrued but not yet distributed to depositors
    pub unrealized_interest: u64,
}

impl InterestAccumulator {
    pub fn new(epoch: u32) -> Self {
        Self {
            borrow_index: crate::constants::precision::WAD,
            last_update_epoch: epoch,
            rate_at_target: crate::constants::rates::DEFAULT_RATE_AT_TARGET_WAD as i64,
            unrealized_interest: 0,
        }
    }
}

/// Per-user, per-side interest state. Owned exclusively by the collateral
/// vault for that user; mutated on every position open/close and
/// settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct UserInterestState {
    /// Net borrowed notional, short minus long; interest accrues only
    /// while positive
    pub net_borrows: i128,
    /// Borrow-index snapshot taken at the last settlement
    pub user_borrow_index: u128,
}

impl UserInterestState {
    pub fn new(current_index: u128) -> Self {
        Self {
            net_borrows: 0,
            user_borrow_index: current_index,
        }
    }
}

// ============ Risk Parameters ============

/// Static risk configuration, persisted as a single 256-bit word (see
/// [`crate::codec`]). Every field width in the packed layout matches the
/// declared type exactly; the 20-byte recipient occupies a 160-bit field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RiskConfig {
    /// Fee on traded notional, bps
    pub notional_fee_bps: u16,
    /// Fee on settled premium, bps
    pub premium_fee_bps: u16,
    /// Protocol's share of commissions, bps
    pub protocol_split_bps: u16,
    /// Affiliate ("builder") share of commissions, bps
    pub builder_split_bps: u16,
    /// Max spot-vs-TWAP tick delta tolerated for liquidation
    pub liquidation_tick_tolerance: u16,
    /// Max removed-to-net liquidity ratio for any chunk
    pub max_spread_ratio: u8,
    /// Max open legs per position
    pub max_open_legs: u8,
    pub fee_recipient: FeeRecipient,
}

impl RiskConfig {
    /// Reject positions with more legs than the configured maximum
    pub fn check_leg_count(&self, count: usize) -> EngineResult<()> {
        if count > self.max_open_legs as usize {
            return Err(EngineError::TooManyLegs {
                count: count as u32,
                max: self.max_open_legs as u32,
            });
        }
        Ok(())
    }
}

/// Protocol-wide risk parameters, recomputed fresh per call from the
/// current oracle quote and static configuration. This is a value object:
/// it must never be cached across calls with stale inputs, which is why
/// the derived safe-mode level is not part of the persisted word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct RiskParameters {
    pub safe_mode: SafeModeLevel,
    pub config: RiskConfig,
}

// ============ Position Types ============

/// A single option leg: a liquidity range around a strike tick
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Leg {
    /// Center tick of the range
    pub strike_tick: i32,
    /// Range half-width in tick-spacing units (full range spans
    /// width * tick_spacing ticks)
    pub width: u16,
    pub tick_spacing: u16,
    /// Long (bought) vs short (sold/borrowed from the pool)
    pub long: bool,
    pub token_side: TokenSide,
}

/// Inclusive-lower, exclusive-upper tick range of a leg
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct TickRange {
    pub lower: i32,
    pub upper: i32,
}

impl Leg {
    /// The leg's tick range, validated against the engine's tick domain
    pub fn tick_range(&self) -> EngineResult<TickRange> {
        if self.width == 0
            || self.width > ticks::MAX_WIDTH
            || self.tick_spacing == 0
            || self.tick_spacing > ticks::MAX_TICK_SPACING
        {
            return Err(EngineError::InvalidParameter {
                param: "leg",
                reason: "width or tick_spacing out of bounds",
            });
        }
        let half = (self.width as i32 * self.tick_spacing as i32) / 2;
        let lower = self.strike_tick - half;
        let upper = self.strike_tick + half;
        if lower >= upper {
            return Err(EngineError::InvalidTickRange { lower, upper });
        }
        if lower < ticks::MIN_TICK || upper > ticks::MAX_TICK {
            return Err(EngineError::InvalidTickRange { lower, upper });
        }
        Ok(TickRange { lower, upper })
    }

    /// True when the current tick sits strictly outside the leg's range
    pub fn is_out_of_range(&self, current_tick: i32) -> EngineResult<bool> {
        let range = self.tick_range()?;
        Ok(current_tick < range.lower || current_tick >= range.upper)
    }
}

/// Per-user, per-position balance with the pool-utilization snapshot
/// captured at mint time. The snapshot is historical data only: solvency
/// and cross-buffer checks always use live utilization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct PositionBalance {
    /// Position size (liquidity units)
    pub size: u128,
    /// Pool utilization per side at mint, bps
    pub utilization_bps: [u16; 2],
    /// Pool tick at mint
    pub mint_tick: i32,
    /// Epoch at mint, seconds
    pub mint_epoch: u32,
}

// ============ Premium State ============

/// Per-chunk premium running totals, X64 per unit of liquidity.
///
/// Once either total caps at `u128::MAX` the chunk freezes permanently:
/// accumulation is disabled and `frozen` stays set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct ChunkPremium {
    /// Premium owed to option buyers, per token, X64
    pub owed_x64: [u128; 2],
    /// Premium retained by option sellers, per token, X64
    pub gross_x64: [u128; 2],
    /// Cumulative collected-fee baseline last folded into the totals.
    /// Advanced only together with an accumulation under the same
    /// liquidity snapshot.
    pub fees_base: [u128; 2],
    pub frozen: bool,
}

impl ChunkPremium {
    pub fn new() -> Self {
        Self {
            owed_x64: [0; 2],
            gross_x64: [0; 2],
            fees_base: [0; 2],
            frozen: false,
        }
    }
}

impl Default for ChunkPremium {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable chunk key: hash of range, side, and token dimension
pub fn chunk_key(range: TickRange, long: bool) -> ChunkKey {
    let mut hasher = Sha256::new();
    hasher.update(b"strike.chunk.v1");
    hasher.update(range.lower.to_le_bytes());
    hasher.update(range.upper.to_le_bytes());
    hasher.update([long as u8]);
    hasher.finalize().into()
}

// ============ Vault State ============

/// Per-asset-side collateral vault totals.
///
/// The conservation invariant
/// `total_assets == deposited_assets + assets_in_amm + unrealized_interest`
/// must hold after every operation; `total_assets()` is the only way the
/// rest of the engine reads the total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct CollateralVault {
    pub deposited_assets: u128,
    pub assets_in_amm: u128,
    pub unrealized_interest: u128,
}

impl CollateralVault {
    pub fn total_assets(&self) -> EngineResult<u128> {
        self.deposited_assets
            .checked_add(self.assets_in_amm)
            .and_then(|t| t.checked_add(self.unrealized_interest))
            .ok_or(EngineError::AmountOverflow)
    }

    /// Current utilization in bps: assets committed to the AMM over total
    pub fn utilization_bps(&self) -> EngineResult<u32> {
        let total = self.total_assets()?;
        if total == 0 {
            return Ok(0);
        }
        let bps = crate::math::mul_div(self.assets_in_amm, BPS_DENOMINATOR as u128, total)?;
        crate::math::to_u32(bps)
    }
}

// ============ Oracle ============

/// A single oracle observation, treated as an external, single-valued
/// input for the duration of one engine call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct OracleQuote {
    pub current_tick: i32,
    pub twap_tick: i32,
    /// Age of the observation in seconds
    pub age_secs: u32,
}
