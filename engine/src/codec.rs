//! Packed-State Codec
//!
//! Encodes engine state into single 256-bit storage words and back. The
//! codec is the single choke point for every persisted write: each field is
//! range-checked against its declared bit width before masking and
//! combining, and any out-of-width value fails with `FieldOverflow` rather
//! than truncating. There is no unchecked fast path.
//!
//! Bit layouts (LSB-first offsets) are a storage contract; changing a
//! width is a breaking change requiring an explicit migration.
//!
//! ```text
//! InterestAccumulator   borrow_index:96 | epoch:32 | rate_at_target:64(i) | unrealized:64
//! RiskConfig            fee_recipient:160 | notional:16 | premium:16 |
//!                       protocol_split:16 | builder_split:16 | liq_tol:16 |
//!                       spread_ratio:8 | max_legs:8
//! PositionBalance       size:128 | util0:16 | util1:16 | mint_tick:32(i) |
//!                       mint_epoch:32 | reserved:32 (must be zero)
//! ```

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::errors::{EngineError, EngineResult};
use crate::types::{FeeRecipient, InterestAccumulator, PositionBalance, RiskConfig};

/// A 256-bit storage word, the unit persisted externally
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub struct Word256 {
    pub lo: u128,
    pub hi: u128,
}

impl Word256 {
    pub const ZERO: Word256 = Word256 { lo: 0, hi: 0 };

    pub fn to_le_bytes(self) -> [u8; 32] {
        let mut out = [0u8; 32];
        out[..16].copy_from_slice(&self.lo.to_le_bytes());
        out[16..].copy_from_slice(&self.hi.to_le_bytes());
        out
    }

    pub fn from_le_bytes(bytes: [u8; 32]) -> Self {
        let mut lo = [0u8; 16];
        let mut hi = [0u8; 16];
        lo.copy_from_slice(&bytes[..16]);
        hi.copy_from_slice(&bytes[16..]);
        Word256 {
            lo: u128::from_le_bytes(lo),
            hi: u128::from_le_bytes(hi),
        }
    }

    /// OR `value` (already width-checked) into the bits at
    /// `[offset, offset + width)`
    fn set_bits(&mut self, offset: u32, width: u32, value: u128) {
        debug_assert!(width >= 1 && width <= 128);
        debug_assert!(offset + width <= 256);
        if offset < 128 {
            self.lo |= value << offset;
            if offset + width > 128 {
                self.hi |= value >> (128 - offset);
            }
        } else {
            self.hi |= value << (offset - 128);
        }
    }

    fn get_bits(&self, offset: u32, width: u32) -> u128 {
        debug_assert!(width >= 1 && width <= 128);
        debug_assert!(offset + width <= 256);
        let raw = if offset < 128 {
            let mut v = self.lo >> offset;
            if offset + width > 128 {
                v |= self.hi << (128 - offset);
            }
            v
        } else {
            self.hi >> (offset - 128)
        };
        raw & mask(width)
    }
}

fn mask(width: u32) -> u128 {
    if width == 128 {
        u128::MAX
    } else {
        (1u128 << width) - 1
    }
}

/// Validate an unsigned field against its declared width
fn check_field(field: &'static str, value: u128, width: u32) -> EngineResult<u128> {
    if value > mask(width) {
        return Err(EngineError::FieldOverflow { field, value, width });
    }
    Ok(value)
}

/// Validate a signed field against its two's-complement range and return
/// the masked representation
fn check_field_signed(field: &'static str, value: i128, width: u32) -> EngineResult<u128> {
    let min = -(1i128 << (width - 1));
    let max = (1i128 << (width - 1)) - 1;
    if value < min || value > max {
        return Err(EngineError::SignedFieldOverflow { field, value, width });
    }
    Ok((value as u128) & mask(width))
}

fn sign_extend(raw: u128, width: u32) -> i128 {
    if raw >> (width - 1) & 1 == 1 {
        (raw | !mask(width)) as i128
    } else {
        raw as i128
    }
}

// ============ InterestAccumulator ============

const IDX_OFF: u32 = 0;
const IDX_W: u32 = 96;
const EPOCH_OFF: u32 = 96;
const EPOCH_W: u32 = 32;
const RATE_OFF: u32 = 128;
const RATE_W: u32 = 64;
const UNREALIZED_OFF: u32 = 192;
const UNREALIZED_W: u32 = 64;

pub fn encode_interest_accumulator(acc: &InterestAccumulator) -> EngineResult<Word256> {
    let mut word = Word256::ZERO;
    word.set_bits(
        IDX_OFF,
        IDX_W,
        check_field("borrow_index", acc.borrow_index, IDX_W)?,
    );
    word.set_bits(
        EPOCH_OFF,
        EPOCH_W,
        check_field("last_update_epoch", acc.last_update_epoch as u128, EPOCH_W)?,
    );
    word.set_bits(
        RATE_OFF,
        RATE_W,
        check_field_signed("rate_at_target", acc.rate_at_target as i128, RATE_W)?,
    );
    word.set_bits(
        UNREALIZED_OFF,
        UNREALIZED_W,
        check_field(
            "unrealized_interest",
            acc.unrealized_interest as u128,
            UNREALIZED_W,
        )?,
    );
    Ok(word)
}

pub fn decode_interest_accumulator(word: Word256) -> EngineResult<InterestAccumulator> {
    Ok(InterestAccumulator {
        borrow_index: word.get_bits(IDX_OFF, IDX_W),
        last_update_epoch: word.get_bits(EPOCH_OFF, EPOCH_W) as u32,
        rate_at_target: sign_extend(word.get_bits(RATE_OFF, RATE_W), RATE_W) as i64,
        unrealized_interest: word.get_bits(UNREALIZED_OFF, UNREALIZED_W) as u64,
    })
}

// ============ RiskConfig ============

const RECIPIENT_OFF: u32 = 0;
const RECIPIENT_W: u32 = 160;
const NOTIONAL_FEE_OFF: u32 = 160;
const PREMIUM_FEE_OFF: u32 = 176;
const PROTOCOL_SPLIT_OFF: u32 = 192;
const BUILDER_SPLIT_OFF: u32 = 208;
const LIQ_TOL_OFF: u32 = 224;
const BPS_W: u32 = 16;
const SPREAD_RATIO_OFF: u32 = 240;
const MAX_LEGS_OFF: u32 = 248;
const BYTE_W: u32 = 8;

fn recipient_halves(recipient: &FeeRecipient) -> (u128, u128) {
    // 20 bytes little-endian: low 16 bytes, then the high 4
    let mut lo = [0u8; 16];
    lo.copy_from_slice(&recipient[..16]);
    let mut hi = [0u8; 4];
    hi.copy_from_slice(&recipient[16..]);
    (u128::from_le_bytes(lo), u32::from_le_bytes(hi) as u128)
}

pub fn encode_risk_config(config: &RiskConfig) -> EngineResult<Word256> {
    let mut word = Word256::ZERO;
    // The recipient is exactly 160 bits by construction; the two halves
    // still route through check_field so the choke point is uniform
    let (lo, hi) = recipient_halves(&config.fee_recipient);
    word.set_bits(RECIPIENT_OFF, 128, check_field("fee_recipient_lo", lo, 128)?);
    word.set_bits(
        RECIPIENT_OFF + 128,
        RECIPIENT_W - 128,
        check_field("fee_recipient_hi", hi, RECIPIENT_W - 128)?,
    );
    word.set_bits(
        NOTIONAL_FEE_OFF,
        BPS_W,
        check_field("notional_fee_bps", config.notional_fee_bps as u128, BPS_W)?,
    );
    word.set_bits(
        PREMIUM_FEE_OFF,
        BPS_W,
        check_field("premium_fee_bps", config.premium_fee_bps as u128, BPS_W)?,
    );
    word.set_bits(
        PROTOCOL_SPLIT_OFF,
        BPS_W,
        check_field(
            "protocol_split_bps",
            config.protocol_split_bps as u128,
            BPS_W,
        )?,
    );
    word.set_bits(
        BUILDER_SPLIT_OFF,
        BPS_W,
        check_field("builder_split_bps", config.builder_split_bps as u128, BPS_W)?,
    );
    word.set_bits(
        LIQ_TOL_OFF,
        BPS_W,
        check_field(
            "liquidation_tick_tolerance",
            config.liquidation_tick_tolerance as u128,
            BPS_W,
        )?,
    );
    word.set_bits(
        SPREAD_RATIO_OFF,
        BYTE_W,
        check_field("max_spread_ratio", config.max_spread_ratio as u128, BYTE_W)?,
    );
    word.set_bits(
        MAX_LEGS_OFF,
        BYTE_W,
        check_field("max_open_legs", config.max_open_legs as u128, BYTE_W)?,
    );
    Ok(word)
}

pub fn decode_risk_config(word: Word256) -> EngineResult<RiskConfig> {
    let lo = word.get_bits(RECIPIENT_OFF, 128);
    let hi = word.get_bits(RECIPIENT_OFF + 128, RECIPIENT_W - 128) as u32;
    let mut recipient = [0u8; 20];
    recipient[..16].copy_from_slice(&lo.to_le_bytes());
    recipient[16..].copy_from_slice(&hi.to_le_bytes());
    Ok(RiskConfig {
        notional_fee_bps: word.get_bits(NOTIONAL_FEE_OFF, BPS_W) as u16,
        premium_fee_bps: word.get_bits(PREMIUM_FEE_OFF, BPS_W) as u16,
        protocol_split_bps: word.get_bits(PROTOCOL_SPLIT_OFF, BPS_W) as u16,
        builder_split_bps: word.get_bits(BUILDER_SPLIT_OFF, BPS_W) as u16,
        liquidation_tick_tolerance: word.get_bits(LIQ_TOL_OFF, BPS_W) as u16,
        max_spread_ratio: word.get_bits(SPREAD_RATIO_OFF, BYTE_W) as u8,
        max_open_legs: word.get_bits(MAX_LEGS_OFF, BYTE_W) as u8,
        fee_recipient: recipient,
    })
}

// ============ PositionBalance ============

const SIZE_OFF: u32 = 0;
const SIZE_W: u32 = 128;
const UTIL0_OFF: u32 = 128;
const UTIL1_OFF: u32 = 144;
const UTIL_W: u32 = 16;
const MINT_TICK_OFF: u32 = 160;
const MINT_TICK_W: u32 = 32;
const MINT_EPOCH_OFF: u32 = 192;
const MINT_EPOCH_W: u32 = 32;
const RESERVED_OFF: u32 = 224;
const RESERVED_W: u32 = 32;

pub fn encode_position_balance(balance: &PositionBalance) -> EngineResult<Word256> {
    let mut word = Word256::ZERO;
    word.set_bits(SIZE_OFF, SIZE_W, check_field("size", balance.size, SIZE_W)?);
    word.set_bits(
        UTIL0_OFF,
        UTIL_W,
        check_field("utilization0", balance.utilization_bps[0] as u128, UTIL_W)?,
    );
    word.set_bits(
        UTIL1_OFF,
        UTIL_W,
        check_field("utilization1", balance.utilization_bps[1] as u128, UTIL_W)?,
    );
    word.set_bits(
        MINT_TICK_OFF,
        MINT_TICK_W,
        check_field_signed("mint_tick", balance.mint_tick as i128, MINT_TICK_W)?,
    );
    word.set_bits(
        MINT_EPOCH_OFF,
        MINT_EPOCH_W,
        check_field("mint_epoch", balance.mint_epoch as u128, MINT_EPOCH_W)?,
    );
    Ok(word)
}

pub fn decode_position_balance(word: Word256) -> EngineResult<PositionBalance> {
    if word.get_bits(RESERVED_OFF, RESERVED_W) != 0 {
        return Err(EngineError::ReservedBitsSet {
            word_kind: "position_balance",
        });
    }
    Ok(PositionBalance {
        size: word.get_bits(SIZE_OFF, SIZE_W),
        utilization_bps: [
            word.get_bits(UTIL0_OFF, UTIL_W) as u16,
            word.get_bits(UTIL1_OFF, UTIL_W) as u16,
        ],
        mint_tick: sign_extend(word.get_bits(MINT_TICK_OFF, MINT_TICK_W), MINT_TICK_W) as i32,
        mint_epoch: word.get_bits(MINT_EPOCH_OFF, MINT_EPOCH_W) as u32,
    })
}
