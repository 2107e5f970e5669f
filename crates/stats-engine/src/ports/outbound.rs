//! # Outbound Ports
//!
//! Traits for the engine's collaborators: the blockchain node, the durable
//! stores and the clock.

use crate::domain::{
    Amount, BlockInfo, DailyBucket, DayKey, Height, NodeError, RawBlock, RawTransaction,
    StakeTotal, StoreError, Timestamp,
};
use async_trait::async_trait;
use std::time::{SystemTime, UNIX_EPOCH};

/// Blockchain node - outbound port.
///
/// Implementations report a height beyond the tip as
/// [`NodeError::HeightNotFound`] and bound their own request timeouts.
#[async_trait]
pub trait NodeClient: Send + Sync {
    /// Full block with transactions.
    async fn get_block(&self, height: Height) -> Result<RawBlock, NodeError>;

    /// Header summary: time, proof flag, difficulty.
    async fn get_block_info(&self, height: Height) -> Result<BlockInfo, NodeError>;

    /// Block subsidy at a height.
    async fn get_subsidy(&self, height: Height) -> Result<Amount, NodeError>;

    /// Transaction by id.
    async fn get_transaction(&self, txid: &str) -> Result<RawTransaction, NodeError>;

    /// Current chain tip height.
    async fn tip_height(&self) -> Result<Height, NodeError>;
}

/// Day bucket store - outbound port.
#[async_trait]
pub trait DayStore: Send + Sync {
    /// Bucket for a day, if any block was folded into it.
    async fn get_day(&self, date: DayKey) -> Result<Option<DailyBucket>, StoreError>;

    /// Insert or replace the bucket keyed by its date.
    async fn upsert_day(&self, bucket: &DailyBucket) -> Result<(), StoreError>;

    /// Buckets with `from_exclusive < date <= to_inclusive`, newest first.
    async fn query_range(
        &self,
        from_exclusive: DayKey,
        to_inclusive: DayKey,
    ) -> Result<Vec<DailyBucket>, StoreError>;
}

/// Progress watermark store - outbound port.
#[async_trait]
pub trait WatermarkStore: Send + Sync {
    /// Last processed height for a kind.
    async fn get_watermark(&self, kind: &str) -> Result<Option<Height>, StoreError>;

    /// Persist the last processed height for a kind.
    async fn set_watermark(&self, kind: &str, height: Height) -> Result<(), StoreError>;

    /// Create the watermark at `floor` when missing, raise it when lower.
    /// Returns the resulting value.
    async fn ensure_watermark(&self, kind: &str, floor: Height) -> Result<Height, StoreError> {
        match self.get_watermark(kind).await? {
            Some(current) if current >= floor => Ok(current),
            _ => {
                self.set_watermark(kind, floor).await?;
                Ok(floor)
            }
        }
    }
}

/// Running stake total store - outbound port.
#[async_trait]
pub trait StakeTotalStore: Send + Sync {
    /// Current total; zero when nothing was recorded yet.
    async fn get_stake_total(&self) -> Result<StakeTotal, StoreError>;

    /// Replace the total.
    async fn set_stake_total(&self, total: &StakeTotal) -> Result<(), StoreError>;
}

/// Clock - outbound port.
pub trait TimeSource: Send + Sync {
    /// Current unix time in seconds.
    fn now(&self) -> Timestamp;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now(&self) -> Timestamp {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}
