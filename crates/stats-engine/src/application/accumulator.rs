//! # Day Accumulator
//!
//! Folds block facts into the durable per-day buckets and keeps the running
//! proof-of-stake total current.
//!
//! Both writes are gated on height: a bucket remembers the last height it
//! absorbed and the stake total remembers the height it is current through,
//! so replaying a height after a crash changes nothing.

use std::sync::Arc;

use crate::algorithms::SupplySchedule;
use crate::domain::{
    invariant_bucket_counts, BlockFacts, DailyBucket, DayKey, StakeTotal, StatsError,
};
use crate::ports::{DayStore, StakeTotalStore};

/// Read-modify-write folding of block facts into day buckets.
#[derive(Clone)]
pub struct DayAccumulator {
    days: Arc<dyn DayStore>,
    totals: Arc<dyn StakeTotalStore>,
    supply: SupplySchedule,
}

impl DayAccumulator {
    /// Create an accumulator over the given stores.
    pub fn new(
        days: Arc<dyn DayStore>,
        totals: Arc<dyn StakeTotalStore>,
        supply: SupplySchedule,
    ) -> Self {
        Self {
            days,
            totals,
            supply,
        }
    }

    /// Fold one block into the bucket for `date` and persist it.
    ///
    /// Returns the bucket as stored. A height the bucket already absorbed
    /// is a no-op.
    pub async fn fold(&self, date: DayKey, facts: &BlockFacts) -> Result<DailyBucket, StatsError> {
        let mut bucket = match self.days.get_day(date).await? {
            Some(bucket) => {
                invariant_bucket_counts(&bucket)?;
                bucket
            }
            None => DailyBucket::empty(date),
        };

        if bucket.has_folded(facts.height) {
            tracing::debug!(
                "[stats] block {} already folded into {}, skipping",
                facts.height,
                date
            );
            return Ok(bucket);
        }

        if let Some(fee) = facts.fee {
            bucket.total_fees.sum += fee;
        }
        bucket.total_fees.count += 1;
        bucket.block_count += 1;
        bucket.transaction_count += facts.transaction_count;
        bucket.output_volume += facts.output_volume;
        bucket.difficulty_samples.push(facts.difficulty);

        if facts.subsidy.is_some() {
            if let Some(reward) = facts.stake_reward() {
                bucket.stake_sum += reward;
            }
            bucket.supply_snapshot = Some(self.supply.supply_at(facts.height));
        }

        bucket.last_folded_height = Some(facts.height);
        self.days.upsert_day(&bucket).await?;
        Ok(bucket)
    }

    /// Add a proof-of-stake block's subsidy to the running stake total.
    pub async fn record_stake(&self, facts: &BlockFacts) -> Result<StakeTotal, StatsError> {
        let mut total = self.totals.get_stake_total().await?;

        let reward = match facts.stake_reward() {
            Some(reward) if facts.height > total.through_height => reward,
            _ => return Ok(total),
        };

        total.amount += reward;
        total.through_height = facts.height;
        self.totals.set_stake_total(&total).await?;
        Ok(total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::InMemoryStatsStore;
    use crate::domain::{Amount, BlockKind};

    const DAY_START: u64 = 1_700_006_400; // 2023-11-15T00:00:00Z

    fn accumulator() -> (DayAccumulator, Arc<InMemoryStatsStore>) {
        let store = Arc::new(InMemoryStatsStore::new());
        let acc = DayAccumulator::new(store.clone(), store.clone(), SupplySchedule::default());
        (acc, store)
    }

    fn facts(height: u64, kind: BlockKind) -> BlockFacts {
        BlockFacts {
            height,
            timestamp: DAY_START + height * 60,
            kind,
            fee: Some(Amount::from_base_units(10)),
            output_volume: Amount::from_coins(2),
            subsidy: Some(Amount::from_coins(4)),
            difficulty: 1.5,
            transaction_count: 2,
        }
    }

    #[tokio::test]
    async fn test_fold_creates_and_updates_bucket() {
        let (acc, store) = accumulator();
        let date = DayKey::from_timestamp(DAY_START);

        acc.fold(date, &facts(1, BlockKind::ProofOfWork)).await.unwrap();
        let bucket = acc.fold(date, &facts(2, BlockKind::ProofOfStake)).await.unwrap();

        assert_eq!(bucket.block_count, 2);
        assert_eq!(bucket.total_fees.count, 2);
        assert_eq!(bucket.total_fees.sum, Amount::from_base_units(20));
        assert_eq!(bucket.transaction_count, 4);
        assert_eq!(bucket.output_volume, Amount::from_coins(4));
        assert_eq!(bucket.difficulty_samples, vec![1.5, 1.5]);
        assert_eq!(bucket.stake_sum, Amount::from_coins(4));
        assert_eq!(bucket.supply_snapshot, Some(Amount::from_coins(10_000)));
        assert_eq!(store.get_day(date).await.unwrap(), Some(bucket));
    }

    #[tokio::test]
    async fn test_unset_fee_still_counts_block() {
        let (acc, _) = accumulator();
        let date = DayKey::from_timestamp(DAY_START);
        let mut f = facts(1, BlockKind::ProofOfWork);
        f.fee = None;
        f.subsidy = None;

        let bucket = acc.fold(date, &f).await.unwrap();
        assert_eq!(bucket.total_fees.count, 1);
        assert_eq!(bucket.total_fees.sum, Amount::ZERO);
        assert_eq!(bucket.supply_snapshot, None);
    }

    #[tokio::test]
    async fn test_replayed_fold_is_noop() {
        let (acc, _) = accumulator();
        let date = DayKey::from_timestamp(DAY_START);
        let f = facts(1, BlockKind::ProofOfStake);

        let first = acc.fold(date, &f).await.unwrap();
        let second = acc.fold(date, &f).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(second.block_count, 1);
    }

    #[tokio::test]
    async fn test_corrupt_bucket_is_rejected() {
        let (acc, store) = accumulator();
        let date = DayKey::from_timestamp(DAY_START);
        let mut broken = DailyBucket::empty(date);
        broken.block_count = 3;
        store.upsert_day(&broken).await.unwrap();

        let err = acc.fold(date, &facts(1, BlockKind::ProofOfWork)).await.unwrap_err();
        assert!(matches!(err, StatsError::CorruptBucket { .. }));
    }

    #[tokio::test]
    async fn test_record_stake_is_gated_by_height() {
        let (acc, store) = accumulator();
        let pos = facts(5, BlockKind::ProofOfStake);

        acc.record_stake(&pos).await.unwrap();
        acc.record_stake(&pos).await.unwrap();
        acc.record_stake(&facts(6, BlockKind::ProofOfWork)).await.unwrap();

        let total = store.get_stake_total().await.unwrap();
        assert_eq!(total.amount, Amount::from_coins(4));
        assert_eq!(total.through_height, 5);
    }

    #[tokio::test]
    async fn test_ten_thousand_folds_are_exact() {
        let (acc, _) = accumulator();
        let date = DayKey::from_timestamp(DAY_START);
        let fee = Amount::from_coin_str("0.00000001").unwrap();

        let mut bucket = None;
        for height in 1..=10_000u64 {
            let mut f = facts(height, BlockKind::ProofOfWork);
            f.timestamp = DAY_START;
            f.fee = Some(fee);
            bucket = Some(acc.fold(date, &f).await.unwrap());
        }

        let bucket = bucket.unwrap();
        assert_eq!(bucket.total_fees.sum, Amount::from_coin_str("0.0001").unwrap());
        assert_eq!(bucket.total_fees.count, 10_000);
        assert_eq!(bucket.block_count, 10_000);
    }
}
