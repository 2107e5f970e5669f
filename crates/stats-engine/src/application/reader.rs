//! # Stats Reader
//!
//! Serves the read API from the day store, the stake total and the live
//! cache. Never writes.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;

use super::live_cache::LiveCache;
use crate::algorithms::{difficulty_mode_or_zero, SupplySchedule};
use crate::config::TimeSpan;
use crate::domain::{
    Amount, DailyBucket, DayKey, DifficultyPoint, FeePoint, Height, OutputsPoint, RollingTotal,
    ShareRatio, StakePoint, StatsError, SupplyPoint, TransactionsPoint,
};
use crate::ports::{DayStore, StakeTotalStore, StatsApi, TimeSource};

/// Read side of the engine.
#[derive(Clone)]
pub struct StatsReader {
    days: Arc<dyn DayStore>,
    totals: Arc<dyn StakeTotalStore>,
    cache: Arc<LiveCache>,
    clock: Arc<dyn TimeSource>,
    tip: watch::Receiver<Height>,
    supply: SupplySchedule,
}

impl StatsReader {
    /// Create a reader. `tip` is the engine's tip slot; the reader only
    /// looks at it.
    pub fn new(
        days: Arc<dyn DayStore>,
        totals: Arc<dyn StakeTotalStore>,
        cache: Arc<LiveCache>,
        clock: Arc<dyn TimeSource>,
        tip: watch::Receiver<Height>,
        supply: SupplySchedule,
    ) -> Self {
        Self {
            days,
            totals,
            cache,
            clock,
            tip,
            supply,
        }
    }

    /// Buckets for `today - span < date <= today`, newest first.
    async fn buckets(&self, span: TimeSpan) -> Result<Vec<DailyBucket>, StatsError> {
        let today = DayKey::from_timestamp(self.clock.now());
        let from = today.minus_days(span.as_days());
        Ok(self.days.query_range(from, today).await?)
    }
}

/// Average fee, eight decimals, `0.00000000` for a day without fee samples.
fn average_fee(bucket: &DailyBucket) -> String {
    bucket
        .total_fees
        .sum
        .div_round(bucket.total_fees.count)
        .unwrap_or(Amount::ZERO)
        .to_coin_string()
}

#[async_trait]
impl StatsApi for StatsReader {
    async fn get_difficulty(&self, span: TimeSpan) -> Result<Vec<DifficultyPoint>, StatsError> {
        Ok(self
            .buckets(span)
            .await?
            .into_iter()
            .map(|b| DifficultyPoint {
                date: b.date,
                difficulty: difficulty_mode_or_zero(&b.difficulty_samples),
            })
            .collect())
    }

    async fn get_supply(&self, span: TimeSpan) -> Result<Vec<SupplyPoint>, StatsError> {
        Ok(self
            .buckets(span)
            .await?
            .into_iter()
            .map(|b| SupplyPoint {
                date: b.date,
                supply: b
                    .supply_snapshot
                    .map(Amount::to_trimmed_coin_string)
                    .unwrap_or_else(|| "0".to_string()),
            })
            .collect())
    }

    async fn get_outputs(&self, span: TimeSpan) -> Result<Vec<OutputsPoint>, StatsError> {
        Ok(self
            .buckets(span)
            .await?
            .into_iter()
            .map(|b| OutputsPoint {
                date: b.date,
                output_volume: b.output_volume.base_units().to_string(),
            })
            .collect())
    }

    async fn get_transactions(
        &self,
        span: TimeSpan,
    ) -> Result<Vec<TransactionsPoint>, StatsError> {
        Ok(self
            .buckets(span)
            .await?
            .into_iter()
            .map(|b| TransactionsPoint {
                date: b.date,
                transaction_count: b.transaction_count,
                block_count: b.block_count,
            })
            .collect())
    }

    async fn get_fees(&self, span: TimeSpan) -> Result<Vec<FeePoint>, StatsError> {
        Ok(self
            .buckets(span)
            .await?
            .iter()
            .map(|b| FeePoint {
                date: b.date,
                fee: average_fee(b),
            })
            .collect())
    }

    async fn get_stakes(&self, span: TimeSpan) -> Result<Vec<StakePoint>, StatsError> {
        let total = self.totals.get_stake_total().await?;
        Ok(self
            .buckets(span)
            .await?
            .into_iter()
            .map(|b| StakePoint {
                date: b.date,
                share: ShareRatio::new(b.stake_sum, total.amount).unwrap_or_else(ShareRatio::zero),
            })
            .collect())
    }

    fn get_rolling_total(&self) -> RollingTotal {
        self.cache.rolling_total()
    }

    async fn get_total_supply(&self) -> Result<Amount, StatsError> {
        let tip = *self.tip.borrow();
        Ok(self.supply.total_supply(tip))
    }
}
