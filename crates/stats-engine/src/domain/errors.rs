//! # Domain Errors
//!
//! Error taxonomy for the statistics engine.
//!
//! | Error | Raised by | Effect on a catch-up pass |
//! |-------|-----------|---------------------------|
//! | `NotFound` | node: height beyond tip | ends the pass quietly |
//! | `TransientFetch` | node unreachable / malformed | aborts, watermark kept |
//! | `Persistence` | store write/read failed | aborts, watermark kept |
//! | `CorruptBucket` | stored bucket breaks its invariant | aborts, watermark kept |

use crate::domain::entities::DayKey;
use thiserror::Error;

/// Errors surfaced by the engine and its query API.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StatsError {
    /// The height is not on the chain yet.
    #[error("block at height {height} not found")]
    NotFound {
        /// Requested height
        height: u64,
    },

    /// Node unreachable or returned something unusable.
    #[error("transient fetch error: {0}")]
    TransientFetch(String),

    /// Durable store failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// A stored day bucket violates `block_count == samples == fee count`.
    #[error("corrupt bucket for {date}: {reason}")]
    CorruptBucket {
        /// Day of the bucket
        date: DayKey,
        /// Which counter disagrees
        reason: String,
    },
}

impl StatsError {
    /// True for the error that means "no more blocks yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, StatsError::NotFound { .. })
    }
}

/// Errors reported by the node collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Height exceeds the node's current tip.
    #[error("height {0} not found")]
    HeightNotFound(u64),

    /// Transaction id unknown to the node.
    #[error("transaction {0} not found")]
    TransactionNotFound(String),

    /// Connection, timeout or RPC-level failure.
    #[error("node unavailable: {0}")]
    Unavailable(String),

    /// Response did not have the expected shape.
    #[error("malformed node response: {0}")]
    Malformed(String),
}

impl From<NodeError> for StatsError {
    fn from(err: NodeError) -> Self {
        match err {
            NodeError::HeightNotFound(height) => StatsError::NotFound { height },
            other => StatsError::TransientFetch(other.to_string()),
        }
    }
}

/// Errors reported by the day-bucket, watermark and stake-total stores.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Backend read/write failure.
    #[error("store I/O error: {0}")]
    Io(String),

    /// Stored value could not be encoded or decoded.
    #[error("store codec error: {0}")]
    Codec(String),
}

impl From<StoreError> for StatsError {
    fn from(err: StoreError) -> Self {
        StatsError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Codec(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_height_not_found_maps_to_not_found() {
        let err: StatsError = NodeError::HeightNotFound(7).into();
        assert_eq!(err, StatsError::NotFound { height: 7 });
        assert!(err.is_not_found());
    }

    #[test]
    fn test_other_node_errors_are_transient() {
        let err: StatsError = NodeError::Unavailable("connection refused".into()).into();
        assert!(matches!(err, StatsError::TransientFetch(ref m) if m.contains("refused")));

        let err: StatsError = NodeError::TransactionNotFound("ab".into()).into();
        assert!(matches!(err, StatsError::TransientFetch(_)));
    }

    #[test]
    fn test_store_error_maps_to_persistence() {
        let err: StatsError = StoreError::Io("disk failure".into()).into();
        match err {
            StatsError::Persistence(message) => assert!(message.contains("disk failure")),
            other => panic!("expected Persistence, got {other:?}"),
        }
    }
}
