//! # Domain Invariants
//!
//! Rules a stored day bucket and the progress watermark must always satisfy.

use super::entities::{DailyBucket, Height};
use super::errors::StatsError;

/// Seconds a block stays in the live cache after its timestamp.
pub const DEFAULT_LIVE_WINDOW_SECS: u64 = 86_400;

/// Days served when the caller gives no span.
pub const DEFAULT_SPAN_DAYS: u32 = 365;

/// Largest span served.
pub const MAX_SPAN_DAYS: u32 = 730;

/// Invariant: one fee sample and one difficulty sample per folded block.
pub fn invariant_bucket_counts(bucket: &DailyBucket) -> Result<(), StatsError> {
    let samples = bucket.difficulty_samples.len() as u64;
    if bucket.block_count != samples {
        return Err(StatsError::CorruptBucket {
            date: bucket.date,
            reason: format!(
                "block_count {} != difficulty samples {}",
                bucket.block_count, samples
            ),
        });
    }
    if bucket.block_count != bucket.total_fees.count {
        return Err(StatsError::CorruptBucket {
            date: bucket.date,
            reason: format!(
                "block_count {} != fee count {}",
                bucket.block_count, bucket.total_fees.count
            ),
        });
    }
    Ok(())
}

/// Invariant: the watermark never moves backwards.
pub fn invariant_watermark_advance(current: Height, next: Height) -> bool {
    next >= current
}
