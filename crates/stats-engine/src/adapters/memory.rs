//! # In-Memory Store
//!
//! Day buckets, watermarks and the stake total kept behind locks in memory.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::domain::{DailyBucket, DayKey, Height, StakeTotal, StoreError};
use crate::ports::{DayStore, StakeTotalStore, WatermarkStore};

/// In-memory day, watermark and stake-total store.
///
/// Used by tests and by embedders that do not need durability.
/// Production uses the RocksDB store in the runtime crate.
#[derive(Default)]
pub struct InMemoryStatsStore {
    days: RwLock<BTreeMap<DayKey, DailyBucket>>,
    watermarks: RwLock<HashMap<String, Height>>,
    stake_total: RwLock<StakeTotal>,
}

impl InMemoryStatsStore {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored day buckets.
    pub fn day_count(&self) -> usize {
        self.days.read().len()
    }
}

#[async_trait]
impl DayStore for InMemoryStatsStore {
    async fn get_day(&self, date: DayKey) -> Result<Option<DailyBucket>, StoreError> {
        Ok(self.days.read().get(&date).cloned())
    }

    async fn upsert_day(&self, bucket: &DailyBucket) -> Result<(), StoreError> {
        self.days.write().insert(bucket.date, bucket.clone());
        Ok(())
    }

    async fn query_range(
        &self,
        from_exclusive: DayKey,
        to_inclusive: DayKey,
    ) -> Result<Vec<DailyBucket>, StoreError> {
        if from_exclusive >= to_inclusive {
            return Ok(Vec::new());
        }
        Ok(self
            .days
            .read()
            .range((Bound::Excluded(from_exclusive), Bound::Included(to_inclusive)))
            .rev()
            .map(|(_, bucket)| bucket.clone())
            .collect())
    }
}

#[async_trait]
impl WatermarkStore for InMemoryStatsStore {
    async fn get_watermark(&self, kind: &str) -> Result<Option<Height>, StoreError> {
        Ok(self.watermarks.read().get(kind).copied())
    }

    async fn set_watermark(&self, kind: &str, height: Height) -> Result<(), StoreError> {
        self.watermarks.write().insert(kind.to_string(), height);
        Ok(())
    }
}

#[async_trait]
impl StakeTotalStore for InMemoryStatsStore {
    async fn get_stake_total(&self) -> Result<StakeTotal, StoreError> {
        Ok(*self.stake_total.read())
    }

    async fn set_stake_total(&self, total: &StakeTotal) -> Result<(), StoreError> {
        *self.stake_total.write() = *total;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Amount;

    fn day(d: u32) -> DayKey {
        DayKey::from_ymd(2024, 1, d).unwrap()
    }

    #[tokio::test]
    async fn test_query_range_bounds_and_order() {
        let store = InMemoryStatsStore::new();
        for d in 1..=5 {
            store.upsert_day(&DailyBucket::empty(day(d))).await.unwrap();
        }

        let range = store.query_range(day(2), day(4)).await.unwrap();
        let dates: Vec<_> = range.iter().map(|b| b.date).collect();
        assert_eq!(dates, vec![day(4), day(3)]);

        assert!(store.query_range(day(4), day(4)).await.unwrap().is_empty());
        assert!(store.query_range(day(5), day(1)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = InMemoryStatsStore::new();
        let mut bucket = DailyBucket::empty(day(1));
        store.upsert_day(&bucket).await.unwrap();
        bucket.block_count = 9;
        store.upsert_day(&bucket).await.unwrap();

        assert_eq!(store.day_count(), 1);
        assert_eq!(store.get_day(day(1)).await.unwrap().unwrap().block_count, 9);
    }

    #[tokio::test]
    async fn test_stake_total_defaults_to_zero() {
        let store = InMemoryStatsStore::new();
        assert_eq!(store.get_stake_total().await.unwrap(), StakeTotal::default());

        let total = StakeTotal {
            amount: Amount::from_coins(8),
            through_height: 3,
        };
        store.set_stake_total(&total).await.unwrap();
        assert_eq!(store.get_stake_total().await.unwrap(), total);
    }

    #[tokio::test]
    async fn test_watermarks_by_kind() {
        let store = InMemoryStatsStore::new();
        assert_eq!(store.get_watermark("STATISTIC").await.unwrap(), None);
        store.set_watermark("STATISTIC", 12).await.unwrap();
        store.set_watermark("OTHER", 1).await.unwrap();
        assert_eq!(store.get_watermark("STATISTIC").await.unwrap(), Some(12));
    }
}
