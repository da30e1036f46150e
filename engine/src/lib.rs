//! Strike Engine
//!
//! Deterministic accounting core for an options AMM: collateral vaults
//! with share-based ownership, per-second compounding borrow interest on
//! an adaptive rate curve, streaming option premia, margin requirements,
//! liquidation, and forced exercise. Everything is integer arithmetic on
//! explicit fixed-point scales; no operation touches a clock, an RNG, or
//! any I/O.
//!
//! ## Fixed-point conventions
//!
//! - rates, growth factors, and borrow indices: WAD (1e18)
//! - sqrt prices and premium accumulators: X64 (2^64)
//! - ratios and fees: basis points over 10_000
//!
//! ## Design rules
//!
//! - **Fail closed**: arithmetic that cannot complete exactly returns an
//!   error; narrowing never truncates; saturated premium accumulators
//!   freeze rather than wrap.
//! - **Storage packing**: persisted records pack into 256-bit words in
//!   [`codec`], with range checks at encode time and reserved bits
//!   enforced zero at decode time.
//! - **External effects via traits**: asset movement goes through
//!   [`ledger::Ledger`]; the engine computes, the caller settles.
//!
//! This crate is `no_std` compatible when built without the `std`
//! feature.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(not(feature = "std"))]
extern crate alloc;

pub mod codec;
pub mod collateral;
pub mod constants;
pub mod errors;
pub mod events;
pub mod fees;
pub mod ledger;
pub mod liquidation;
pub mod math;
pub mod oracle;
pub mod premium;
pub mod rates;
pub mod types;
pub mod vault;


pub use errors::{EngineError, EngineResult};
pub use types::{
    AccountId, ChunkKey, ChunkPremium, CollateralVault, FeeRecipient, InterestAccumulator, Leg,
    OracleQuote, PositionBalance, RiskConfig, RiskParameters, SafeModeLevel, TickRange, TokenSide,
    UserInterestState,
};
