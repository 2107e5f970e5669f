//! # Application Module
//!
//! Services orchestrating the domain rules and the outbound ports.

pub mod accumulator;
pub mod coalescer;
pub mod deriver;
pub mod live_cache;
pub mod reader;
pub mod service;

pub use accumulator::DayAccumulator;
pub use coalescer::{tip_channel, TipCoalescer, TipHandle};
pub use deriver::BlockDeriver;
pub use live_cache::LiveCache;
pub use reader::StatsReader;
pub use service::{StatsHandle, StatsService, StatsStores};
