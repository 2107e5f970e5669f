//! Runtime wiring: stores, node, engine and poller under one handle.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use stats_engine::{
    CatchUpReport, NodeClient, StatsConfig, StatsHandle, StatsReader, StatsService, StatsStores,
    SystemTimeSource, TimeSource,
};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::info;

use crate::adapters::{JsonRpcNodeClient, RocksDbConfig, RocksStatsStore, TipPoller};
use crate::config::RuntimeConfig;

/// Running engine plus its tip poller.
pub struct StatsRuntime {
    engine: StatsHandle,
    poller: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
}

impl StatsRuntime {
    /// Open RocksDB, connect to the node and start everything.
    pub async fn start(config: RuntimeConfig) -> Result<Self> {
        info!("===========================================");
        info!("  Stats Runtime v{}", env!("CARGO_PKG_VERSION"));
        info!("===========================================");
        info!("Node RPC: {}", config.rpc.url);
        info!("Data Dir: {:?}", config.data_dir);

        let store = RocksStatsStore::open(RocksDbConfig {
            path: config.data_dir.clone(),
            ..Default::default()
        })
        .context("opening statistics database")?;
        let node = JsonRpcNodeClient::new(config.rpc.clone()).context("building node client")?;

        Self::start_with(
            config.stats,
            config.poll_interval,
            Arc::new(node),
            StatsStores::shared(Arc::new(store)),
            Arc::new(SystemTimeSource),
        )
        .await
    }

    /// Start over any node and stores.
    pub async fn start_with<N>(
        stats: StatsConfig,
        poll_interval: Duration,
        node: Arc<N>,
        stores: StatsStores,
        clock: Arc<dyn TimeSource>,
    ) -> Result<Self>
    where
        N: NodeClient + 'static,
    {
        let engine = StatsService::start(stats, node.clone(), stores, clock)
            .await
            .context("starting statistics engine")?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let poller = TipPoller::new(node, engine.tip_handle(), poll_interval).spawn(shutdown_rx);

        info!("Tip poller running every {:?}", poll_interval);
        Ok(Self {
            engine,
            poller,
            shutdown_tx,
        })
    }

    /// Read API.
    pub fn reader(&self) -> &StatsReader {
        self.engine.reader()
    }

    /// Catch-up reports; the first call includes the startup pass.
    pub fn subscribe(&mut self) -> broadcast::Receiver<CatchUpReport> {
        self.engine.subscribe()
    }

    /// Stop polling, then stop the engine.
    pub async fn shutdown(self) {
        info!("Shutting down stats runtime...");
        let _ = self.shutdown_tx.send(true);
        let _ = self.poller.await;
        self.engine.shutdown().await;
        info!("Stats runtime stopped");
    }
}
