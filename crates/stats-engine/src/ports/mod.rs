//! # Ports Module
//!
//! Hexagonal architecture ports (inbound read API, outbound node, stores
//! and clock).

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
