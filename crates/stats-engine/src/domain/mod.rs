//! # Domain Module
//!
//! Core types for the statistics engine: exact amounts, chain data, day
//! buckets and the error taxonomy.

pub mod amount;
pub mod entities;
pub mod errors;
pub mod invariants;
pub mod value_objects;

pub use amount::*;
pub use entities::*;
pub use errors::*;
pub use invariants::*;
pub use value_objects::*;
