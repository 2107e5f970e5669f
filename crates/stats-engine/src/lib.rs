//! # Stats Engine
//!
//! Incremental chain statistics: fees, output volume, difficulty, supply,
//! proof-of-stake rewards and block cadence.
//!
//! **Architecture:** Hexagonal (DDD + Ports/Adapters)
//!
//! ## Purpose
//!
//! Follow a growing chain and keep two views of it:
//! - a live cache of per-block facts for the trailing 24 hours,
//! - durable per-day buckets with exact sums, queried by date range.
//!
//! ## Write Path
//!
//! | Step | Component |
//! |------|-----------|
//! | Tip notifications collapse into one pending slot | `TipCoalescer` |
//! | Each height becomes `BlockFacts` (PoW/PoS fee rules) | `BlockDeriver` |
//! | Facts enter the 24h cache | `LiveCache` |
//! | Facts fold into the day bucket and stake total | `DayAccumulator` |
//! | Watermark advances after the fold | `WatermarkStore` |
//!
//! ## Module Structure
//!
//! ```text
//! stats-engine/
//! ├── domain/          # Amount, BlockFacts, DailyBucket, errors, invariants
//! ├── algorithms/      # Fee rules, difficulty mode, supply schedule
//! ├── ports/           # StatsApi (inbound) + node/store/clock traits (outbound)
//! ├── application/     # Deriver, cache, accumulator, coalescer, reader, service
//! ├── adapters/        # In-memory stores
//! └── config.rs        # StatsConfig, TimeSpan
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod algorithms;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-exports
pub use adapters::InMemoryStatsStore;
pub use algorithms::{difficulty_mode, SupplySchedule};
pub use application::{
    BlockDeriver, DayAccumulator, LiveCache, StatsHandle, StatsReader, StatsService,
    StatsStores, TipCoalescer, TipHandle,
};
pub use config::{StatsConfig, TimeSpan};
pub use domain::{
    Amount, BlockFacts, BlockInfo, BlockKind, CatchUpReport, DailyBucket, DayKey, Height,
    NodeError, OutPoint, PassOutcome, RawBlock, RawTransaction, RollingTotal, ScriptKind,
    ShareRatio, StakeTotal, StatsError, StoreError, TipPhase, TipState, TxInput, TxOutput,
    STATISTIC_WATERMARK,
};
pub use ports::{
    DayStore, NodeClient, StakeTotalStore, StatsApi, SystemTimeSource, TimeSource,
    WatermarkStore,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    #[test]
    fn test_version() {
        assert!(!super::VERSION.is_empty());
    }
}
