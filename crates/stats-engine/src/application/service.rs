//! # Stats Service
//!
//! Wires the deriver, live cache, accumulator, coalescer and reader
//! together and runs the startup sequence:
//!
//! 1. make sure the watermark exists (created at 0),
//! 2. ask the node for its tip,
//! 3. warm the live cache with the blocks still inside the live window,
//! 4. start the coalescer and hand it the tip.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::accumulator::DayAccumulator;
use super::coalescer::{tip_channel, TipCoalescer, TipHandle};
use super::deriver::BlockDeriver;
use super::live_cache::LiveCache;
use super::reader::StatsReader;
use crate::config::StatsConfig;
use crate::domain::{CatchUpReport, Height, StatsError, TipState};
use crate::ports::{DayStore, NodeClient, StakeTotalStore, TimeSource, WatermarkStore};

/// The durable stores the engine writes to.
#[derive(Clone)]
pub struct StatsStores {
    /// Day buckets.
    pub days: Arc<dyn DayStore>,
    /// Progress watermarks.
    pub watermarks: Arc<dyn WatermarkStore>,
    /// Stake total.
    pub totals: Arc<dyn StakeTotalStore>,
}

impl StatsStores {
    /// Use one backend for all three stores.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: DayStore + WatermarkStore + StakeTotalStore + 'static,
    {
        Self {
            days: store.clone(),
            watermarks: store.clone(),
            totals: store,
        }
    }
}

/// Running engine.
pub struct StatsHandle {
    reader: StatsReader,
    tip: TipHandle,
    reports: broadcast::Sender<CatchUpReport>,
    startup_reports: Option<broadcast::Receiver<CatchUpReport>>,
    task: JoinHandle<()>,
}

impl StatsHandle {
    /// Read API.
    pub fn reader(&self) -> &StatsReader {
        &self.reader
    }

    /// Tip notification handle.
    pub fn tip_handle(&self) -> TipHandle {
        self.tip.clone()
    }

    /// Announce a tip; see [`TipHandle::notify`].
    pub fn notify(&self, height: Height) -> bool {
        self.tip.notify(height)
    }

    /// Catch-up phase and last known tip.
    pub fn tip_state(&self) -> TipState {
        self.tip.state()
    }

    /// Subscribe to catch-up reports.
    ///
    /// The first call also sees the reports of passes started during
    /// startup.
    pub fn subscribe(&mut self) -> broadcast::Receiver<CatchUpReport> {
        self.startup_reports
            .take()
            .unwrap_or_else(|| self.reports.subscribe())
    }

    /// Stop the catch-up task.
    pub async fn shutdown(self) {
        self.task.abort();
        let _ = self.task.await;
        tracing::info!("[stats] engine stopped");
    }
}

/// Entry point of the engine.
pub struct StatsService;

impl StatsService {
    /// Run the startup sequence and spawn the catch-up task.
    pub async fn start<N>(
        config: StatsConfig,
        node: Arc<N>,
        stores: StatsStores,
        clock: Arc<dyn TimeSource>,
    ) -> Result<StatsHandle, StatsError>
    where
        N: NodeClient + 'static,
    {
        let watermark = stores
            .watermarks
            .ensure_watermark(&config.watermark_kind, 0)
            .await?;
        let tip = node.tip_height().await?;

        tracing::info!(
            "[stats] starting: watermark {}, node tip {}",
            watermark,
            tip
        );

        let deriver = BlockDeriver::new(node);
        let cache = Arc::new(LiveCache::new(config.live_window_secs, clock.clone()));
        warm_cache(&deriver, &cache, watermark.min(tip)).await;

        let progress = Arc::new(AtomicU64::new(watermark));
        let (tip_handle, tip_rx) = tip_channel(progress.clone());
        let (reports, startup_reports) =
            broadcast::channel(config.report_channel_capacity.max(1));

        let accumulator =
            DayAccumulator::new(stores.days.clone(), stores.totals.clone(), config.supply);
        let reader = StatsReader::new(
            stores.days.clone(),
            stores.totals.clone(),
            cache.clone(),
            clock,
            tip_rx.clone(),
            config.supply,
        );

        let coalescer = TipCoalescer::new(
            deriver,
            cache,
            accumulator,
            stores.watermarks.clone(),
            config.watermark_kind.clone(),
            &tip_handle,
            tip_rx,
            reports.clone(),
        );
        let task = coalescer.spawn();
        tip_handle.notify(tip);

        Ok(StatsHandle {
            reader,
            tip: tip_handle,
            reports,
            startup_reports: Some(startup_reports),
            task,
        })
    }
}

/// Fill the cache downward from `start` until a block falls outside the
/// live window. Failures only shorten the warm-up.
async fn warm_cache<N: NodeClient>(deriver: &BlockDeriver<N>, cache: &LiveCache, start: Height) {
    let mut height = start;
    let mut warmed = 0u64;

    while height > 0 {
        match deriver.derive(height).await {
            Ok(facts) => {
                if !cache.put(facts) {
                    break;
                }
                warmed += 1;
            }
            Err(e) => {
                tracing::warn!("[stats] cache warm-up stopped at block {}: {}", height, e);
                break;
            }
        }
        height -= 1;
    }

    tracing::info!("[stats] live cache warmed with {} blocks", warmed);
}
