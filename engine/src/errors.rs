//! Error Types for the Strike Engine
//!
//! Every failure mode in the accounting engine maps to a typed error so
//! callers can distinguish "transient, retry with fresh oracle data" from
//! "structural, the position or encoded state is invalid". All errors are
//! fail-closed: they abort the enclosing operation and never produce an
//! under- or over-collateralized result.

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Main error enum for all engine failures
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    // ============ Packed-State Errors ============
    /// A field value exceeds its declared bit-width; encoding rejects
    /// rather than truncating
    FieldOverflow {
        field: &'static str,
        value: u128,
        width: u32,
    },

    /// A signed field value is outside its two's-complement range
    SignedFieldOverflow {
        field: &'static str,
        value: i128,
        width: u32,
    },

    /// Reserved bits in a stored word are non-zero (layout mismatch or
    /// corruption)
    ReservedBitsSet { word_kind: &'static str },

    // ============ Arithmetic Errors ============
    /// A product or sum exceeds the widest supported integer
    AmountOverflow,

    /// Division by zero in a context where zero is unreachable by
    /// construction
    DivisionByZero,

    /// A formula's denominator is zero under a legitimate, reachable input
    /// state; the caller must apply the documented fallback instead
    DivisionDegenerate { context: &'static str },

    /// A narrowing conversion would lose information
    CastingError { value: u128, target_bits: u32 },

    /// Compounding input exceeds the bound under which the Taylor
    /// truncation tolerance is documented
    CompoundingOutOfBounds { rate_dt_wad: u128, max_wad: u128 },

    // ============ Clock / Oracle Errors ============
    /// A decoded epoch is ahead of the current time; a negative elapsed
    /// duration must never reach the compounding function
    ClockRegression { stored_epoch: u32, current_epoch: u32 },

    /// Oracle data is older than the configured bound
    StaleOracle { age_secs: u32, max_age_secs: u32 },

    /// Spot tick deviates from the time-weighted tick beyond the bound
    /// accepted for safety-critical checks
    OracleDivergence {
        spot_tick: i32,
        twap_tick: i32,
        max_delta: u32,
    },

    // ============ Collateral Errors ============
    /// Solvency check failed
    InsufficientCollateral { required: u128, available: u128 },

    /// Account is solvent; liquidation rejected
    NotLiquidatable { surplus: u128 },

    /// No long leg exists, or the claimed leg cannot be force-exercised
    NotExercisable { reason: &'static str },

    // ============ Position Errors ============
    /// Tick range is malformed (inverted, misaligned, or out of bounds)
    InvalidTickRange { lower: i32, upper: i32 },

    /// Tick outside the engine's supported price range
    TickOutOfBounds { tick: i32 },

    /// Removed-to-net liquidity ratio exceeds the configured maximum;
    /// bounding this keeps the premium accumulator cap unreachable
    SpreadTooWide {
        removed: u128,
        net: u128,
        max_ratio: u32,
    },

    /// Position would exceed the maximum number of open legs
    TooManyLegs { count: u32, max: u32 },

    // ============ Vault / Ledger Errors ============
    /// Share or asset balance insufficient for the requested operation
    InsufficientBalance { available: u128, requested: u128 },

    /// Zero amount where a non-zero amount is required
    ZeroAmount,

    /// The external ledger rejected a mint/burn/transfer
    LedgerRejected { reason: &'static str },

    // ============ Configuration Errors ============
    /// Commission split percentages do not sum to exactly 10,000 bps
    InvalidSplitConfig { total_bps: u32 },

    /// Invalid configuration parameter
    InvalidParameter {
        param: &'static str,
        reason: &'static str,
    },
}

impl EngineError {
    /// Returns a stable error code for logging and off-chain tooling
    pub fn code(&self) -> &'static str {
        match self {
            Self::FieldOverflow { .. } => "E001_FIELD_OVERFLOW",
            Self::SignedFieldOverflow { .. } => "E002_SIGNED_FIELD_OVERFLOW",
            Self::ReservedBitsSet { .. } => "E003_RESERVED_BITS",
            Self::AmountOverflow => "E010_AMOUNT_OVERFLOW",
            Self::DivisionByZero => "E011_DIV_ZERO",
            Self::DivisionDegenerate { .. } => "E012_DIV_DEGENERATE",
            Self::CastingError { .. } => "E013_CASTING",
            Self::CompoundingOutOfBounds { .. } => "E014_COMPOUNDING_BOUND",
            Self::ClockRegression { .. } => "E020_CLOCK_REGRESSION",
            Self::StaleOracle { .. } => "E021_ORACLE_STALE",
            Self::OracleDivergence { .. } => "E022_ORACLE_DIVERGENCE",
            Self::InsufficientCollateral { .. } => "E030_INSUFFICIENT_COLLATERAL",
            Self::NotLiquidatable { .. } => "E031_NOT_LIQUIDATABLE",
            Self::NotExercisable { .. } => "E032_NOT_EXERCISABLE",
            Self::InvalidTickRange { .. } => "E040_INVALID_TICK_RANGE",
            Self::TickOutOfBounds { .. } => "E041_TICK_OUT_OF_BOUNDS",
            Self::SpreadTooWide { .. } => "E042_SPREAD_TOO_WIDE",
            Self::TooManyLegs { .. } => "E043_TOO_MANY_LEGS",
            Self::InsufficientBalance { .. } => "E050_INSUFFICIENT_BALANCE",
            Self::ZeroAmount => "E051_ZERO_AMOUNT",
            Self::LedgerRejected { .. } => "E052_LEDGER_REJECTED",
            Self::InvalidSplitConfig { .. } => "E060_INVALID_SPLIT",
            Self::InvalidParameter { .. } => "E061_INVALID_PARAMETER",
        }
    }

    /// Returns true if the caller can retry after refreshing external state
    /// (as opposed to a structural defect in the position or stored word)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::StaleOracle { .. }
                | Self::OracleDivergence { .. }
                | Self::InsufficientBalance { .. }
                | Self::InsufficientCollateral { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn test_error_codes_unique() {
        let errors = [
            EngineError::FieldOverflow {
                field: "borrow_index",
                value: 1 << 100,
                width: 96,
            },
            EngineError::AmountOverflow,
            EngineError::ClockRegression {
                stored_epoch: 10,
                current_epoch: 5,
            },
            EngineError::StaleOracle {
                age_secs: 120,
                max_age_secs: 60,
            },
            EngineError::InsufficientCollateral {
                required: 100,
                available: 50,
            },
            EngineError::InvalidSplitConfig { total_bps: 9_000 },
        ];

        let codes: Vec<_> = errors.iter().map(|e| e.code()).collect();
        let unique: BTreeSet<_> = codes.iter().collect();
        assert_eq!(codes.len(), unique.len(), "error codes must be unique");
    }

    #[test]
    fn test_transient_classification() {
        assert!(EngineError::StaleOracle {
            age_secs: 120,
            max_age_secs: 60
        }
        .is_transient());
        assert!(!EngineError::FieldOverflow {
            field: "epoch",
            value: u128::MAX,
            width: 32
        }
        .is_transient());
    }
}
