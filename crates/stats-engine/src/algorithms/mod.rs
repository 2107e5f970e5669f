//! # Algorithms Module
//!
//! Pure derivation rules: block fees, difficulty reconciliation and the
//! supply schedule.

pub mod fees;
pub mod mode;
pub mod supply;

pub use fees::{output_volume, pos_fee, pow_fee, stake_reward, StakeReward};
pub use mode::{difficulty_mode, difficulty_mode_or_zero};
pub use supply::SupplySchedule;
