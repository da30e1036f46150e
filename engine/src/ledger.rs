//! Share Ledger Abstraction
//!
//! The engine never moves underlying assets itself; it computes amounts
//! and drives an external ledger through this trait. Implementations own
//! the actual balance bookkeeping (a chain runtime, a database, or the
//! in-memory test ledger below) and must reject rather than clamp any
//! transfer that exceeds a balance.

use crate::errors::{EngineError, EngineResult};
use crate::types::{AccountId, ChunkKey};

/// Balance bookkeeping for one fungible share or asset class.
///
/// All operations are atomic: on error the ledger state is unchanged.
pub trait Ledger {
    fn balance_of(&self, account: &AccountId) -> u128;

    fn total_supply(&self) -> u128;

    /// Create `amount` units for `account`; implementations map their own
    /// refusals (supply caps, frozen accounts) to
    /// [`EngineError::LedgerRejected`]
    fn mint(&mut self, account: &AccountId, amount: u128) -> EngineResult<()>;

    /// Destroy `amount` units held by `account`; fails with
    /// [`EngineError::InsufficientBalance`] if the account holds less
    fn burn(&mut self, account: &AccountId, amount: u128) -> EngineResult<()>;

    /// Move `amount` units between accounts; fails rather than
    /// overdrafting the sender
    fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> EngineResult<()>;
}

/// A chunk's liquidity as the AMM reports it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LiquiditySnapshot {
    /// Liquidity actually owned by sellers
    pub net: u128,
    /// Liquidity borrowed out to back short positions
    pub removed: u128,
}

/// The external AMM pool. The engine consumes liquidity snapshots and
/// cumulative collected-fee counters; it never computes either itself,
/// and a snapshot is only valid together with the fee counter read in
/// the same call.
pub trait AmmPool {
    fn liquidity_of(&self, chunk: &ChunkKey) -> LiquiditySnapshot;

    /// Cumulative fees collected for the chunk since inception, per token
    fn collected_fees(&self, chunk: &ChunkKey) -> EngineResult<[u128; 2]>;
}

/// In-memory ledger and pool for tests and simulation
#[cfg(any(test, feature = "test-utils"))]
pub mod memory {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Default, Clone)]
    pub struct MemoryLedger {
        balances: HashMap<AccountId, u128>,
        supply: u128,
    }

    impl MemoryLedger {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl Ledger for MemoryLedger {
        fn balance_of(&self, account: &AccountId) -> u128 {
            self.balances.get(account).copied().unwrap_or(0)
        }

        fn total_supply(&self) -> u128 {
            self.supply
        }

        fn mint(&mut self, account: &AccountId, amount: u128) -> EngineResult<()> {
            let new_supply = self
                .supply
                .checked_add(amount)
                .ok_or(EngineError::LedgerRejected {
                    reason: "mint would overflow total supply",
                })?;
            // balance <= supply, so the balance add cannot fail once the
            // supply add has passed
            let new_balance = self.balance_of(account) + amount;
            self.balances.insert(*account, new_balance);
            self.supply = new_supply;
            Ok(())
        }

        fn burn(&mut self, account: &AccountId, amount: u128) -> EngineResult<()> {
            let balance = self.balance_of(account);
            if balance < amount {
                return Err(EngineError::InsufficientBalance {
                    available: balance,
                    requested: amount,
                });
            }
            self.balances.insert(*account, balance - amount);
            self.supply -= amount;
            Ok(())
        }

        fn transfer(&mut self, from: &AccountId, to: &AccountId, amount: u128) -> EngineResult<()> {
            let from_balance = self.balance_of(from);
            if from_balance < amount {
                return Err(EngineError::InsufficientBalance {
                    available: from_balance,
                    requested: amount,
                });
            }
            if from == to {
                return Ok(());
            }
            let to_balance = self
                .balance_of(to)
                .checked_add(amount)
                .ok_or(EngineError::AmountOverflow)?;
            self.balances.insert(*from, from_balance - amount);
            self.balances.insert(*to, to_balance);
            Ok(())
        }
    }

    /// Scripted AMM pool: tests set liquidity and fee counters per chunk
    #[derive(Debug, Default, Clone)]
    pub struct MemoryPool {
        liquidity: HashMap<ChunkKey, LiquiditySnapshot>,
        fees: HashMap<ChunkKey, [u128; 2]>,
    }

    impl MemoryPool {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_liquidity(&mut self, chunk: ChunkKey, snapshot: LiquiditySnapshot) {
            self.liquidity.insert(chunk, snapshot);
        }

        /// Advance the cumulative fee counter for a chunk
        pub fn collect(&mut self, chunk: ChunkKey, amounts: [u128; 2]) {
            let entry = self.fees.entry(chunk).or_default();
            entry[0] += amounts[0];
            entry[1] += amounts[1];
        }
    }

    impl AmmPool for MemoryPool {
        fn liquidity_of(&self, chunk: &ChunkKey) -> LiquiditySnapshot {
            self.liquidity.get(chunk).copied().unwrap_or_default()
        }

        fn collected_fees(&self, chunk: &ChunkKey) -> EngineResult<[u128; 2]> {
            Ok(self.fees.get(chunk).copied().unwrap_or_default())
        }
    }
}
