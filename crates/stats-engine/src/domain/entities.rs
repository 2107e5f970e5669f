//! # Domain Entities
//!
//! Raw chain data as delivered by the node, the facts derived from one block,
//! and the durable per-day aggregate they fold into.

use crate::domain::amount::Amount;
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Unix timestamp in seconds.
pub type Timestamp = u64;

/// Block height.
pub type Height = u64;

/// Watermark kind used by the statistics catch-up.
pub const STATISTIC_WATERMARK: &str = "STATISTIC";

// =============================================================================
// Calendar day
// =============================================================================

/// UTC calendar day, rendered `YYYY-MM-DD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DayKey(NaiveDate);

impl DayKey {
    /// Wrap a date.
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Build from year/month/day; None for an impossible date.
    pub fn from_ymd(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(Self)
    }

    /// The UTC day a unix timestamp falls in.
    pub fn from_timestamp(ts: Timestamp) -> Self {
        let secs = i64::try_from(ts).unwrap_or(i64::MAX);
        let datetime: DateTime<Utc> = DateTime::from_timestamp(secs, 0).unwrap_or_default();
        Self(datetime.date_naive())
    }

    /// The day `days` before this one (saturating at the earliest date).
    pub fn minus_days(self, days: u32) -> Self {
        Self(
            self.0
                .checked_sub_days(Days::new(u64::from(days)))
                .unwrap_or(NaiveDate::MIN),
        )
    }

    /// Underlying date.
    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DayKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").map(Self)
    }
}

impl TryFrom<String> for DayKey {
    type Error = chrono::ParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DayKey> for String {
    fn from(day: DayKey) -> Self {
        day.to_string()
    }
}

// =============================================================================
// Raw chain data (node collaborator)
// =============================================================================

/// Block production mode, from the block's proof flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Coinbase carries subsidy plus fees.
    ProofOfWork,
    /// Transaction 1 is the stake reward transaction.
    ProofOfStake,
}

impl BlockKind {
    /// True for proof-of-stake blocks.
    pub fn is_stake(self) -> bool {
        matches!(self, BlockKind::ProofOfStake)
    }
}

/// Output script classification, as far as fee derivation cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScriptKind {
    /// Plain pay-to-pubkey-hash.
    PubKeyHash,
    /// Pay-to-pubkey (typical stake output).
    PubKey,
    /// Empty script (coinstake marker output).
    Empty,
    /// Anything else.
    Other,
}

/// Reference to a previous transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutPoint {
    /// Previous transaction id (hex).
    pub txid: String,
    /// Output index in that transaction.
    pub vout: u32,
}

/// Transaction input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxInput {
    /// Spent output; None for a coinbase input.
    pub prev_out: Option<OutPoint>,
}

/// Transaction output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    /// Output value.
    pub value: Amount,
    /// Script classification.
    pub script: ScriptKind,
}

/// Transaction as returned by the node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTransaction {
    /// Transaction id (hex).
    pub txid: String,
    /// Inputs.
    pub inputs: Vec<TxInput>,
    /// Outputs.
    pub outputs: Vec<TxOutput>,
}

/// Full block with transactions (`getBlock`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawBlock {
    /// Height.
    pub height: Height,
    /// Transactions in block order.
    pub transactions: Vec<RawTransaction>,
}

/// Block header summary (`getJsonBlock`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockInfo {
    /// Height.
    pub height: Height,
    /// Block hash (hex).
    pub hash: String,
    /// Block time.
    pub time: Timestamp,
    /// Proof flag.
    pub kind: BlockKind,
    /// Difficulty.
    pub difficulty: f64,
}

// =============================================================================
// Derived facts
// =============================================================================

/// Everything the engine needs from one block. Immutable once derived.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlockFacts {
    /// Height.
    pub height: Height,
    /// Block time.
    pub timestamp: Timestamp,
    /// Proof flag.
    pub kind: BlockKind,
    /// Fee; None when it could not be determined.
    pub fee: Option<Amount>,
    /// Sum of non-reward outputs.
    pub output_volume: Amount,
    /// Subsidy as reported by the node.
    pub subsidy: Option<Amount>,
    /// Block difficulty.
    pub difficulty: f64,
    /// Transactions in the block.
    pub transaction_count: u64,
}

impl BlockFacts {
    /// The UTC day this block belongs to.
    pub fn day(&self) -> DayKey {
        DayKey::from_timestamp(self.timestamp)
    }

    /// Subsidy that counts as stake reward (PoS blocks only).
    pub fn stake_reward(&self) -> Option<Amount> {
        if self.kind.is_stake() {
            self.subsidy
        } else {
            None
        }
    }
}

// =============================================================================
// Day bucket
// =============================================================================

/// Exact sum with a sample count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SumCount {
    /// Running sum.
    pub sum: Amount,
    /// Number of samples.
    pub count: u64,
}

/// Durable per-day aggregate.
///
/// Invariant: `block_count == difficulty_samples.len() == total_fees.count`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyBucket {
    /// Day key.
    pub date: DayKey,
    /// Fee sum and the number of blocks contributing.
    pub total_fees: SumCount,
    /// Transactions across all blocks.
    pub transaction_count: u64,
    /// Output volume across all blocks.
    pub output_volume: Amount,
    /// Blocks folded.
    pub block_count: u64,
    /// One difficulty per block, reconciled by mode on read.
    pub difficulty_samples: Vec<f64>,
    /// Subsidy of proof-of-stake blocks.
    pub stake_sum: Amount,
    /// Point-in-time supply at the latest folded block.
    pub supply_snapshot: Option<Amount>,
    /// Highest height folded into this bucket.
    #[serde(default)]
    pub last_folded_height: Option<Height>,
}

impl DailyBucket {
    /// Zeroed bucket for a day.
    pub fn empty(date: DayKey) -> Self {
        Self {
            date,
            total_fees: SumCount::default(),
            transaction_count: 0,
            output_volume: Amount::ZERO,
            block_count: 0,
            difficulty_samples: Vec::new(),
            stake_sum: Amount::ZERO,
            supply_snapshot: None,
            last_folded_height: None,
        }
    }

    /// True when `height` is already reflected in this bucket.
    pub fn has_folded(&self, height: Height) -> bool {
        self.last_folded_height.is_some_and(|last| height <= last)
    }
}

/// Running total of proof-of-stake subsidy ever folded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeTotal {
    /// Total stake subsidy.
    pub amount: Amount,
    /// Highest height included.
    pub through_height: Height,
}
