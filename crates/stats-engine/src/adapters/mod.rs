//! # Adapters Module
//!
//! In-process implementations of the store ports.

pub mod memory;

pub use memory::InMemoryStatsStore;
