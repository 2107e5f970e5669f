//! # Supply Schedule
//!
//! Piecewise-linear issuance: a fixed early reward per block up to the fork
//! height, a smaller fixed reward after it.
//!
//! Two views of it are served. The per-day supply snapshot integrates the
//! rewards up to a height. The headline total supply is the fixed supply
//! at the fork plus the late reward for every block since.

use crate::domain::{Amount, Height};
use serde::{Deserialize, Serialize};

/// Height at which the block reward drops.
pub const DEFAULT_FORK_HEIGHT: Height = 5_000;

/// Coins per block up to the fork.
pub const DEFAULT_EARLY_REWARD_COINS: u64 = 5_000;

/// Coins per block after the fork.
pub const DEFAULT_LATE_REWARD_COINS: u64 = 4;

/// Supply at the fork height used for the headline total.
pub const DEFAULT_BASE_SUPPLY_COINS: u64 = 100_000_000;

fn default_base_supply() -> Amount {
    Amount::from_coins(DEFAULT_BASE_SUPPLY_COINS)
}

/// Issuance parameters.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupplySchedule {
    /// Reward switch height.
    pub fork_height: Height,
    /// Reward per block at or below the fork height.
    pub early_reward: Amount,
    /// Reward per block above the fork height.
    pub late_reward: Amount,
    /// Total supply at the fork height.
    #[serde(default = "default_base_supply")]
    pub base_supply: Amount,
}

impl Default for SupplySchedule {
    fn default() -> Self {
        Self {
            fork_height: DEFAULT_FORK_HEIGHT,
            early_reward: Amount::from_coins(DEFAULT_EARLY_REWARD_COINS),
            late_reward: Amount::from_coins(DEFAULT_LATE_REWARD_COINS),
            base_supply: default_base_supply(),
        }
    }
}

impl SupplySchedule {
    /// Total issued through `height`:
    /// `min(h, fork) * early + max(h - fork, 0) * late`.
    pub fn supply_at(&self, height: Height) -> Amount {
        let early_blocks = u128::from(height.min(self.fork_height));
        let late_blocks = u128::from(height.saturating_sub(self.fork_height));

        let early = early_blocks.saturating_mul(self.early_reward.base_units());
        let late = late_blocks.saturating_mul(self.late_reward.base_units());
        Amount::from_base_units(early.saturating_add(late))
    }

    /// Headline total supply with the chain tip at `tip`:
    /// `base_supply + (tip - fork) * late`, floored at zero below the fork.
    pub fn total_supply(&self, tip: Height) -> Amount {
        let base = self.base_supply.base_units();
        let rate = self.late_reward.base_units();
        let units = if tip >= self.fork_height {
            let late_blocks = u128::from(tip - self.fork_height);
            base.saturating_add(late_blocks.saturating_mul(rate))
        } else {
            let missing_blocks = u128::from(self.fork_height - tip);
            base.saturating_sub(missing_blocks.saturating_mul(rate))
        };
        Amount::from_base_units(units)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_before_fork() {
        let schedule = SupplySchedule::default();
        assert_eq!(schedule.supply_at(0), Amount::ZERO);
        assert_eq!(schedule.supply_at(1), Amount::from_coins(5_000));
        assert_eq!(schedule.supply_at(100), Amount::from_coins(500_000));
    }

    #[test]
    fn test_at_and_after_fork() {
        let schedule = SupplySchedule::default();
        assert_eq!(schedule.supply_at(5_000), Amount::from_coins(25_000_000));
        assert_eq!(schedule.supply_at(5_001), Amount::from_coins(25_000_004));
        assert_eq!(schedule.supply_at(6_000), Amount::from_coins(25_004_000));
    }

    #[test]
    fn test_total_supply_from_tip() {
        let schedule = SupplySchedule::default();
        assert_eq!(schedule.total_supply(5_000), Amount::from_coins(100_000_000));
        assert_eq!(schedule.total_supply(5_001), Amount::from_coins(100_000_004));
        assert_eq!(schedule.total_supply(4_000), Amount::from_coins(99_996_000));
        assert_eq!(schedule.total_supply(0), Amount::from_coins(99_980_000));
    }

    #[test]
    fn test_base_supply_defaults_when_missing() {
        let json = r#"{"fork_height":10,"early_reward":"100","late_reward":"1"}"#;
        let schedule: SupplySchedule = serde_json::from_str(json).unwrap();
        assert_eq!(schedule.base_supply, Amount::from_coins(100_000_000));
        assert_eq!(
            schedule.total_supply(12),
            Amount::from_coins(100_000_000) + Amount::from_base_units(2)
        );
    }

    #[test]
    fn test_custom_schedule() {
        let schedule = SupplySchedule {
            fork_height: 10,
            early_reward: Amount::from_coins(50),
            late_reward: Amount::from_base_units(25),
            ..SupplySchedule::default()
        };
        assert_eq!(
            schedule.supply_at(12),
            Amount::from_base_units(500 * 100_000_000 + 50)
        );
    }
}
