//! Engine Events
//!
//! Emitted by callers after successful state transitions and indexed
//! off-chain for accounting, analytics, and alerting.

use borsh::{BorshDeserialize, BorshSerialize};
use serde::{Deserialize, Serialize};

use crate::types::{AccountId, ChunkKey, SafeModeLevel};

/// Event types for indexing and filtering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
#[borsh(use_discriminant = true)]
#[repr(u8)]
pub enum EventType {
    // Vault Events (0x01 - 0x1F)
    CollateralDeposited = 0x01,
    CollateralWithdrawn = 0x02,
    AssetsCommitted = 0x03,
    AssetsReturned = 0x04,

    // Interest Events (0x20 - 0x3F)
    InterestAccrued = 0x20,
    InterestSettled = 0x21,

    // Premium Events (0x40 - 0x5F)
    PremiumAccumulated = 0x40,
    ChunkFrozen = 0x41,

    // Risk Events (0x60 - 0x7F)
    Liquidated = 0x60,
    ForceExercised = 0x61,
    SafeModeChanged = 0x62,

    // Fee Events (0x80 - 0x9F)
    CommissionSplit = 0x80,
}

/// All events the engine's operations can produce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, BorshSerialize, BorshDeserialize)]
pub enum EngineEvent {
    // ============ Vault Events ============
    CollateralDeposited {
        account: AccountId,
        token_index: u8,
        assets: u128,
        shares: u128,
    },

    CollateralWithdrawn {
        account: AccountId,
        token_index: u8,
        assets: u128,
        shares: u128,
    },

    AssetsCommitted {
        token_index: u8,
        amount: u128,
        utilization_bps: u32,
    },

    AssetsReturned {
        token_index: u8,
        amount: u128,
        utilization_bps: u32,
    },

    // ============ Interest Events ============
    InterestAccrued {
        token_index: u8,
        elapsed_secs: u32,
        rate_wad: u128,
        interest: u128,
        borrow_index: u128,
    },

    InterestSettled {
        account: AccountId,
        token_index: u8,
        amount: u128,
    },

    // ============ Premium Events ============
    PremiumAccumulated {
        chunk: ChunkKey,
        owed_delta_x64: [u128; 2],
        gross_delta_x64: [u128; 2],
    },

    /// A premium accumulator saturated and was permanently frozen
    ChunkFrozen {
        chunk: ChunkKey,
    },

    // ============ Risk Events ============
    Liquidated {
        account: AccountId,
        liquidator: AccountId,
        seized: [u128; 2],
        bonus: [u128; 2],
        protocol_loss: [u128; 2],
    },

    ForceExercised {
        account: AccountId,
        exercisor: AccountId,
        fee: u128,
    },

    SafeModeChanged {
        previous: SafeModeLevel,
        current: SafeModeLevel,
    },

    // ============ Fee Events ============
    CommissionSplit {
        protocol: u128,
        builder: u128,
        pool: u128,
    },
}

impl EngineEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            EngineEvent::CollateralDeposited { .. } => EventType::CollateralDeposited,
            EngineEvent::CollateralWithdrawn { .. } => EventType::CollateralWithdrawn,
            EngineEvent::AssetsCommitted { .. } => EventType::AssetsCommitted,
            EngineEvent::AssetsReturned { .. } => EventType::AssetsReturned,
            EngineEvent::InterestAccrued { .. } => EventType::InterestAccrued,
            EngineEvent::InterestSettled { .. } => EventType::InterestSettled,
            EngineEvent::PremiumAccumulated { .. } => EventType::PremiumAccumulated,
            EngineEvent::ChunkFrozen { .. } => EventType::ChunkFrozen,
            EngineEvent::Liquidated { .. } => EventType::Liquidated,
            EngineEvent::ForceExercised { .. } => EventType::ForceExercised,
            EngineEvent::SafeModeChanged { .. } => EventType::SafeModeChanged,
            EngineEvent::CommissionSplit { .. } => EventType::CommissionSplit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_mapping() {
        let event = EngineEvent::ChunkFrozen { chunk: [7u8; 32] };
        assert_eq!(event.event_type(), EventType::ChunkFrozen);
    }

    #[test]
    fn test_event_borsh_round_trip() {
        let event = EngineEvent::Liquidated {
            account: [1u8; 20],
            liquidator: [2u8; 20],
            seized: [100, 0],
            bonus: [5, 0],
            protocol_loss: [0, 0],
        };
        let bytes = borsh::to_vec(&event).unwrap();
        let back: EngineEvent = borsh::from_slice(&bytes).unwrap();
        assert_eq!(back, event);
    }
}
