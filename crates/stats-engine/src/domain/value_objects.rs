//! # Value Objects
//!
//! Cache entries, query results and catch-up bookkeeping.

use super::amount::{Amount, ShareRatio};
use super::entities::{BlockFacts, DayKey, Height, Timestamp};
use serde::{Deserialize, Serialize};

/// One block's facts in the live cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Derived facts.
    pub facts: BlockFacts,
    /// `facts.timestamp + live_window_secs`.
    pub expires_at: Timestamp,
}

impl CacheEntry {
    /// Entry for `facts` with the given window.
    pub fn new(facts: BlockFacts, live_window_secs: u64) -> Self {
        let expires_at = facts.timestamp.saturating_add(live_window_secs);
        Self { facts, expires_at }
    }

    /// True once `now` has passed the expiry.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        now > self.expires_at
    }
}

/// Aggregate over the contiguous run of cached blocks ending at the head.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RollingTotal {
    /// Blocks that contributed.
    pub n_blocks_mined: u64,
    /// Mean seconds between consecutive contributing blocks.
    pub time_between_blocks: f64,
    /// Proof-of-stake subsidy minted.
    pub mined_currency_amount: Amount,
    /// Fees.
    pub transaction_fees: Amount,
    /// Transactions.
    pub number_of_transactions: u64,
    /// Output volume.
    pub outputs_volume: Amount,
    /// Mode of the difficulty samples; None when no block contributed.
    pub difficulty: Option<f64>,
}

/// Difficulty of one day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DifficultyPoint {
    /// Day.
    pub date: DayKey,
    /// Mode of the day's samples, 0 for an empty day.
    pub difficulty: f64,
}

/// Supply at the end of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SupplyPoint {
    /// Day.
    pub date: DayKey,
    /// Coins, trailing zeros trimmed.
    pub supply: String,
}

/// Output volume of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputsPoint {
    /// Day.
    pub date: DayKey,
    /// Base units, as a decimal string.
    pub output_volume: String,
}

/// Transaction and block counts of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransactionsPoint {
    /// Day.
    pub date: DayKey,
    /// Transactions.
    pub transaction_count: u64,
    /// Blocks.
    pub block_count: u64,
}

/// Average fee of one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeePoint {
    /// Day.
    pub date: DayKey,
    /// Coins, eight decimals.
    pub fee: String,
}

/// Share of all stake reward issued on one day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StakePoint {
    /// Day.
    pub date: DayKey,
    /// `stake_sum / stake_total`.
    pub share: ShareRatio,
}

/// Catch-up phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TipPhase {
    /// No pass in flight.
    Idle,
    /// A pass is folding heights.
    CatchingUp,
}

/// Process-local tip bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TipState {
    /// Highest tip ever notified.
    pub last_known_tip: Height,
    /// Current phase.
    pub phase: TipPhase,
}

impl TipState {
    /// Idle state at `tip`.
    pub fn new(tip: Height) -> Self {
        Self {
            last_known_tip: tip,
            phase: TipPhase::Idle,
        }
    }

    /// Record a notification. Returns true when the tip moved forward.
    pub fn observe(&mut self, height: Height) -> bool {
        if height > self.last_known_tip {
            self.last_known_tip = height;
            true
        } else {
            false
        }
    }
}

/// How a catch-up pass ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum PassOutcome {
    /// Every height up to the tip snapshot was folded.
    Completed,
    /// The node did not have the next height yet.
    Exhausted,
    /// A fetch or store failure stopped the pass.
    Aborted(String),
}

/// Published after every catch-up pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatchUpReport {
    /// First height attempted.
    pub from_height: Height,
    /// Tip snapshot the pass aimed for.
    pub target_height: Height,
    /// Watermark after the pass.
    pub watermark: Height,
    /// Heights folded during the pass.
    pub folded: u64,
    /// Outcome.
    pub outcome: PassOutcome,
}
