//! Commission / Fee Splitter
//!
//! Deterministic split of trade commissions among the protocol, the
//! affiliate ("builder"), and the liquidity pool. The configured bps
//! shares must sum to exactly 10,000; integer-division dust is assigned to
//! the pool so the paid shares always sum to the commission exactly; a
//! shortfall left with the payer would be an uncollected-fee leak.

use crate::constants::precision::BPS_DENOMINATOR;
use crate::errors::{EngineError, EngineResult};
use crate::math::mul_div;
use crate::types::RiskConfig;

/// A validated three-way commission split, bps out of 10,000
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionSplit {
    pub protocol_bps: u16,
    pub builder_bps: u16,
    pub pool_bps: u16,
}

/// Absolute shares of one commission amount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommissionShares {
    pub protocol: u128,
    pub builder: u128,
    pub pool: u128,
}

impl CommissionShares {
    pub fn total(&self) -> u128 {
        // disjoint shares of one u128 amount cannot overflow their sum
        self.protocol + self.builder + self.pool
    }
}

impl CommissionSplit {
    /// Build a split, rejecting any configuration that does not sum to
    /// exactly 10,000 bps
    pub fn new(protocol_bps: u16, builder_bps: u16, pool_bps: u16) -> EngineResult<Self> {
        let total = protocol_bps as u32 + builder_bps as u32 + pool_bps as u32;
        if total != BPS_DENOMINATOR {
            return Err(EngineError::InvalidSplitConfig { total_bps: total });
        }
        Ok(Self {
            protocol_bps,
            builder_bps,
            pool_bps,
        })
    }

    /// Derive the split from risk configuration: the pool takes whatever
    /// the protocol and builder shares leave
    pub fn from_risk_config(config: &RiskConfig) -> EngineResult<Self> {
        let taken = config.protocol_split_bps as u32 + config.builder_split_bps as u32;
        if taken > BPS_DENOMINATOR {
            return Err(EngineError::InvalidSplitConfig { total_bps: taken });
        }
        Self::new(
            config.protocol_split_bps,
            config.builder_split_bps,
            (BPS_DENOMINATOR - taken) as u16,
        )
    }

    /// Split a commission amount. The remainder of the two rounded-down
    /// shares goes to the pool, so `protocol + builder + pool == amount`
    /// exactly for every input.
    pub fn split(&self, amount: u128) -> EngineResult<CommissionShares> {
        let protocol = mul_div(amount, self.protocol_bps as u128, BPS_DENOMINATOR as u128)?;
        let builder = mul_div(amount, self.builder_bps as u128, BPS_DENOMINATOR as u128)?;
        // protocol + builder <= amount because the bps shares sum to at
        // most the denominator
        let pool = amount - protocol - builder;
        Ok(CommissionShares {
            protocol,
            builder,
            pool,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_split_must_sum_to_whole() {
        assert!(CommissionSplit::new(2_500, 2_500, 5_000).is_ok());
        // the audited defect class: shares summing to 9,000 silently leak
        assert_eq!(
            CommissionSplit::new(2_500, 2_500, 4_000),
            Err(EngineError::InvalidSplitConfig { total_bps: 9_000 })
        );
        assert_eq!(
            CommissionSplit::new(6_000, 6_000, 6_000),
            Err(EngineError::InvalidSplitConfig { total_bps: 18_000 })
        );
    }

    #[test]
    fn test_split_exact_thirds_dust_to_pool() {
        let split = CommissionSplit::new(3_333, 3_333, 3_334).unwrap();
        let shares = split.split(100).unwrap();
        assert_eq!(shares.protocol, 33);
        assert_eq!(shares.builder, 33);
        assert_eq!(shares.pool, 34);
        assert_eq!(shares.total(), 100);
    }

    #[test]
    fn test_from_risk_config_assigns_remainder() {
        let mut config = RiskConfig {
            notional_fee_bps: 10,
            premium_fee_bps: 100,
            protocol_split_bps: 1_000,
            builder_split_bps: 500,
            liquidation_tick_tolerance: 953,
            max_spread_ratio: 9,
            max_open_legs: 4,
            fee_recipient: [0u8; 20],
        };
        let split = CommissionSplit::from_risk_config(&config).unwrap();
        assert_eq!(split.pool_bps, 8_500);

        config.protocol_split_bps = 9_000;
        config.builder_split_bps = 2_000;
        assert!(CommissionSplit::from_risk_config(&config).is_err());
    }

    proptest! {
        #[test]
        fn prop_split_completeness(
            amount in any::<u128>(),
            protocol in 0u16..=10_000,
            builder in 0u16..=10_000,
        ) {
            prop_assume!(protocol as u32 + builder as u32 <= 10_000);
            let pool = 10_000 - protocol - builder;
            let split = CommissionSplit::new(protocol, builder, pool).unwrap();
            let shares = split.split(amount).unwrap();
            // no uncollected remainder, ever
            prop_assert_eq!(shares.total(), amount);
        }
    }
}
