//! # Tip Coalescer
//!
//! Single writer of the statistics state. Tip notifications land in a
//! `watch` slot that only ever holds the highest height seen; a dedicated
//! task drains it with catch-up passes, so any number of notifications that
//! arrive during a pass collapse into one follow-up pass.
//!
//! ```text
//!   notify(h) ──► watch slot (max) ──► Idle ──► CatchingUp ──► Idle
//!                                        ▲                       │
//!                                        └── tip moved? ◄────────┘
//! ```

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use super::accumulator::DayAccumulator;
use super::deriver::BlockDeriver;
use super::live_cache::LiveCache;
use crate::domain::{
    invariant_watermark_advance, CatchUpReport, Height, PassOutcome, StatsError, TipPhase,
    TipState,
};
use crate::ports::{NodeClient, WatermarkStore};

/// Sending side of the tip slot.
#[derive(Clone)]
pub struct TipHandle {
    tx: Arc<watch::Sender<Height>>,
    progress: Arc<AtomicU64>,
    state: Arc<RwLock<TipState>>,
}

impl TipHandle {
    /// Announce a chain tip.
    ///
    /// A height above the last known tip raises the slot. A height that is
    /// not higher still wakes the task while it is above the watermark, so
    /// a pass that stopped short is retried on the next notification.
    /// Returns false when the notification schedules no work.
    pub fn notify(&self, height: Height) -> bool {
        let watermark = self.progress.load(Ordering::SeqCst);
        self.tx.send_if_modified(|tip| {
            if height > *tip {
                *tip = height;
                true
            } else {
                height > watermark
            }
        })
    }

    /// Highest tip notified so far.
    pub fn last_known_tip(&self) -> Height {
        *self.tx.borrow()
    }

    /// Last height folded and persisted.
    pub fn watermark(&self) -> Height {
        self.progress.load(Ordering::SeqCst)
    }

    /// Phase and tip as seen by the catch-up task.
    pub fn state(&self) -> TipState {
        *self.state.read()
    }
}

/// Create a tip slot starting at the current watermark in `progress`.
pub fn tip_channel(progress: Arc<AtomicU64>) -> (TipHandle, watch::Receiver<Height>) {
    let initial = progress.load(Ordering::SeqCst);
    let (tx, rx) = watch::channel(initial);
    let handle = TipHandle {
        tx: Arc::new(tx),
        progress,
        state: Arc::new(RwLock::new(TipState::new(initial))),
    };
    (handle, rx)
}

/// Catch-up task state.
pub struct TipCoalescer<N: NodeClient> {
    deriver: BlockDeriver<N>,
    cache: Arc<LiveCache>,
    accumulator: DayAccumulator,
    watermarks: Arc<dyn WatermarkStore>,
    watermark_kind: String,
    watermark: Height,
    progress: Arc<AtomicU64>,
    state: Arc<RwLock<TipState>>,
    tip_rx: watch::Receiver<Height>,
    reports: broadcast::Sender<CatchUpReport>,
}

impl<N: NodeClient + 'static> TipCoalescer<N> {
    /// Create a coalescer resuming after `watermark`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        deriver: BlockDeriver<N>,
        cache: Arc<LiveCache>,
        accumulator: DayAccumulator,
        watermarks: Arc<dyn WatermarkStore>,
        watermark_kind: String,
        tip: &TipHandle,
        tip_rx: watch::Receiver<Height>,
        reports: broadcast::Sender<CatchUpReport>,
    ) -> Self {
        let progress = tip.progress.clone();
        let watermark = progress.load(Ordering::SeqCst);
        Self {
            deriver,
            cache,
            accumulator,
            watermarks,
            watermark_kind,
            watermark,
            progress,
            state: tip.state.clone(),
            tip_rx,
            reports,
        }
    }

    /// Run on the tokio runtime until every [`TipHandle`] is dropped.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain tip notifications until the slot closes.
    pub async fn run(mut self) {
        loop {
            let tip = *self.tip_rx.borrow_and_update();
            self.state.write().observe(tip);

            if tip > self.watermark {
                self.run_pass().await;
            }

            // Returns immediately when the tip moved during the pass.
            if self.tip_rx.changed().await.is_err() {
                tracing::info!("[stats] tip channel closed, coalescer stopping");
                break;
            }
        }
    }

    /// One pass over `watermark + 1 ..= last_known_tip`.
    pub async fn run_pass(&mut self) -> CatchUpReport {
        let target_height = {
            let mut state = self.state.write();
            state.phase = TipPhase::CatchingUp;
            state.last_known_tip
        };
        let from_height = self.watermark + 1;
        let mut folded = 0u64;
        let mut outcome = PassOutcome::Completed;

        tracing::info!(
            "[stats] catching up blocks {}..={}",
            from_height,
            target_height
        );

        for height in from_height..=target_height {
            match self.process_height(height).await {
                Ok(()) => folded += 1,
                Err(e) if e.is_not_found() => {
                    tracing::debug!("[stats] block {} not available yet", height);
                    outcome = PassOutcome::Exhausted;
                    break;
                }
                Err(e) => {
                    tracing::error!(
                        "[stats] catch-up aborted at block {} (watermark {}): {}",
                        height,
                        self.watermark,
                        e
                    );
                    outcome = PassOutcome::Aborted(e.to_string());
                    break;
                }
            }
        }

        self.state.write().phase = TipPhase::Idle;

        let report = CatchUpReport {
            from_height,
            target_height,
            watermark: self.watermark,
            folded,
            outcome,
        };
        tracing::info!(
            "[stats] pass finished: {} blocks folded, watermark {}",
            folded,
            self.watermark
        );
        // No subscribers is fine.
        let _ = self.reports.send(report.clone());
        report
    }

    async fn process_height(&mut self, height: Height) -> Result<(), StatsError> {
        let facts = self.deriver.derive(height).await?;
        self.cache.put(facts.clone());
        self.accumulator.fold(facts.day(), &facts).await?;
        self.accumulator.record_stake(&facts).await?;

        debug_assert!(invariant_watermark_advance(self.watermark, height));
        self.watermarks
            .set_watermark(&self.watermark_kind, height)
            .await?;
        self.watermark = height;
        self.progress.store(height, Ordering::SeqCst);

        tracing::debug!("[stats] folded block {} into {}", height, facts.day());
        Ok(())
    }
}
