//! # Stats Runtime
//!
//! Runs the statistics engine against a live node.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from the environment
//! 2. Open the RocksDB stores
//! 3. Connect the JSON-RPC node client
//! 4. Start the engine (watermark, cache warm-up, first catch-up pass)
//! 5. Start the tip poller
//!
//! Shutdown stops the poller first, then the engine.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adapters;
pub mod config;
pub mod runtime;
pub mod telemetry;

pub use config::{ConfigError, LogConfig, RpcConfig, RuntimeConfig};
pub use runtime::StatsRuntime;
