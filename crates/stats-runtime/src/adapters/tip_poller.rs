//! # Tip Poller
//!
//! Asks the node for its tip on a fixed interval and forwards it to the
//! engine's tip slot. The slot drops a repeated tip once the engine has
//! caught up to it; while it has not, every poll retries the catch-up.

use std::sync::Arc;
use std::time::Duration;

use stats_engine::{Height, NodeClient, TipHandle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Periodic tip source.
pub struct TipPoller<N: NodeClient> {
    node: Arc<N>,
    tip: TipHandle,
    interval: Duration,
}

impl<N: NodeClient + 'static> TipPoller<N> {
    /// Create a poller.
    pub fn new(node: Arc<N>, tip: TipHandle, interval: Duration) -> Self {
        Self {
            node,
            tip,
            interval,
        }
    }

    /// Poll once. Returns the tip when the node answered.
    pub async fn poll_once(&self) -> Option<Height> {
        match self.node.tip_height().await {
            Ok(height) => {
                if self.tip.notify(height) {
                    debug!("[stats] tip {} scheduled", height);
                }
                Some(height)
            }
            Err(e) => {
                warn!("[stats] tip poll failed: {}", e);
                None
            }
        }
    }

    /// Run until `shutdown` flips to true or its sender is dropped.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        self.poll_once().await;
                    }
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            debug!("[stats] tip poller stopping");
                            break;
                        }
                    }
                }
            }
        })
    }
}
