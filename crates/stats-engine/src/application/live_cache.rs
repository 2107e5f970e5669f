//! # Live Cache
//!
//! Per-block facts for the trailing live window, keyed by height.
//!
//! Entries expire `live_window_secs` after their block timestamp. Expiry is
//! lazy: reads skip expired entries, writes purge them. The rolling total
//! walks down from the highest admitted height and stops at the first gap,
//! so it always covers one contiguous run of blocks.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;

use crate::algorithms::difficulty_mode;
use crate::domain::{BlockFacts, CacheEntry, Height, RollingTotal};
use crate::ports::TimeSource;

#[derive(Default)]
struct CacheInner {
    entries: HashMap<Height, CacheEntry>,
    head: Option<Height>,
}

/// Time-expiring cache of recent block facts.
pub struct LiveCache {
    inner: RwLock<CacheInner>,
    live_window_secs: u64,
    clock: Arc<dyn TimeSource>,
}

impl LiveCache {
    /// Create an empty cache.
    pub fn new(live_window_secs: u64, clock: Arc<dyn TimeSource>) -> Self {
        Self {
            inner: RwLock::new(CacheInner::default()),
            live_window_secs,
            clock,
        }
    }

    /// Admit `facts` unless they are already past the window.
    ///
    /// Returns whether the entry was stored.
    pub fn put(&self, facts: BlockFacts) -> bool {
        let now = self.clock.now();
        let entry = CacheEntry::new(facts, self.live_window_secs);
        if entry.is_expired(now) {
            return false;
        }

        let height = entry.facts.height;
        let mut inner = self.inner.write();
        inner.entries.retain(|_, e| !e.is_expired(now));
        inner.entries.insert(height, entry);
        inner.head = Some(inner.head.map_or(height, |head| head.max(height)));
        true
    }

    /// Facts at `height`, if cached and not expired.
    pub fn get(&self, height: Height) -> Option<BlockFacts> {
        let now = self.clock.now();
        self.inner
            .read()
            .entries
            .get(&height)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.facts.clone())
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|_, e| !e.is_expired(now));
        before - inner.entries.len()
    }

    /// Highest height ever admitted.
    pub fn head(&self) -> Option<Height> {
        self.inner.read().head
    }

    /// Live (non-expired) entries.
    pub fn len(&self) -> usize {
        let now = self.clock.now();
        self.inner
            .read()
            .entries
            .values()
            .filter(|e| !e.is_expired(now))
            .count()
    }

    /// True when nothing live is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rolling total over every block in the run ending at the head.
    pub fn rolling_total(&self) -> RollingTotal {
        self.rolling_total_where(|_| true)
    }

    /// Rolling total over the blocks of the head run that match `include`.
    ///
    /// The predicate picks contributors; it never extends the walk past a
    /// missing height.
    pub fn rolling_total_where<F>(&self, include: F) -> RollingTotal
    where
        F: Fn(&BlockFacts) -> bool,
    {
        let now = self.clock.now();
        let inner = self.inner.read();
        let live = |height: Height| {
            inner
                .entries
                .get(&height)
                .filter(|e| !e.is_expired(now))
                .map(|e| &e.facts)
        };

        let mut total = RollingTotal::default();
        let mut difficulties = Vec::new();
        let mut time_sum = 0i64;
        let mut time_count = 0u64;

        let mut height = match inner.head {
            Some(head) => head,
            None => return total,
        };

        while height > 0 {
            let facts = match live(height) {
                Some(facts) => facts,
                None => break,
            };

            if include(facts) {
                if let Some(next) = live(height + 1) {
                    time_sum += next.timestamp as i64 - facts.timestamp as i64;
                    time_count += 1;
                }

                total.n_blocks_mined += 1;
                total.number_of_transactions += facts.transaction_count;
                total.outputs_volume += facts.output_volume;
                if let Some(fee) = facts.fee {
                    total.transaction_fees += fee;
                }
                if let Some(reward) = facts.stake_reward() {
                    total.mined_currency_amount += reward;
                }
                difficulties.push(facts.difficulty);
            }

            height -= 1;
        }

        if time_count > 0 {
            total.time_between_blocks = time_sum as f64 / time_count as f64;
        }
        total.difficulty = difficulty_mode(&difficulties);
        total
    }
}
