//! Production adapters for the engine's outbound ports.

pub mod json_rpc_node;
pub mod rocksdb_store;
pub mod tip_poller;

pub use json_rpc_node::JsonRpcNodeClient;
pub use rocksdb_store::{RocksDbConfig, RocksStatsStore};
pub use tip_poller::TipPoller;
