//! # Inbound Ports
//!
//! Read API served to the query layer.

use crate::config::TimeSpan;
use crate::domain::{
    Amount, DifficultyPoint, FeePoint, OutputsPoint, RollingTotal, StakePoint, StatsError,
    SupplyPoint, TransactionsPoint,
};
use async_trait::async_trait;

/// Statistics API - inbound port.
///
/// Day series cover `today - span < date <= today` and come back newest
/// first.
#[async_trait]
pub trait StatsApi: Send + Sync {
    /// Difficulty per day (mode of the day's samples).
    async fn get_difficulty(&self, span: TimeSpan) -> Result<Vec<DifficultyPoint>, StatsError>;

    /// Supply snapshot per day.
    async fn get_supply(&self, span: TimeSpan) -> Result<Vec<SupplyPoint>, StatsError>;

    /// Output volume per day, in base units.
    async fn get_outputs(&self, span: TimeSpan) -> Result<Vec<OutputsPoint>, StatsError>;

    /// Transaction and block counts per day.
    async fn get_transactions(
        &self,
        span: TimeSpan,
    ) -> Result<Vec<TransactionsPoint>, StatsError>;

    /// Average fee per day.
    async fn get_fees(&self, span: TimeSpan) -> Result<Vec<FeePoint>, StatsError>;

    /// Share of all stake reward issued per day.
    async fn get_stakes(&self, span: TimeSpan) -> Result<Vec<StakePoint>, StatsError>;

    /// Aggregate over the live window.
    fn get_rolling_total(&self) -> RollingTotal;

    /// Total supply at the last known chain tip.
    async fn get_total_supply(&self) -> Result<Amount, StatsError>;
}
