//! # Block Deriver
//!
//! Turns one height into [`BlockFacts`] by asking the node for the header
//! summary, the full block and the subsidy, then applying the fee rules.

use std::sync::Arc;

use crate::algorithms::{output_volume, pos_fee, pow_fee, stake_reward};
use crate::domain::{
    Amount, BlockFacts, BlockKind, Height, NodeError, OutPoint, StatsError,
};
use crate::ports::NodeClient;

/// Derives per-block facts from node data.
pub struct BlockDeriver<N: NodeClient> {
    node: Arc<N>,
}

impl<N: NodeClient> Clone for BlockDeriver<N> {
    fn clone(&self) -> Self {
        Self {
            node: Arc::clone(&self.node),
        }
    }
}

impl<N: NodeClient> BlockDeriver<N> {
    /// Create a deriver over a node.
    pub fn new(node: Arc<N>) -> Self {
        Self { node }
    }

    /// Derive the facts for `height`.
    ///
    /// A height beyond the tip is [`StatsError::NotFound`]; any other node
    /// failure is [`StatsError::TransientFetch`]. A failed subsidy lookup
    /// only leaves the subsidy unset.
    pub async fn derive(&self, height: Height) -> Result<BlockFacts, StatsError> {
        let info = self.node.get_block_info(height).await?;
        let block = self.node.get_block(height).await?;

        let subsidy = match self.node.get_subsidy(height).await {
            Ok(subsidy) => Some(subsidy),
            Err(e) => {
                tracing::warn!("[stats] subsidy unavailable for block {}: {}", height, e);
                None
            }
        };

        let fee = match info.kind {
            BlockKind::ProofOfWork => pow_fee(&block, subsidy),
            BlockKind::ProofOfStake => {
                let stake = stake_reward(&block)?;
                let spent = match stake.spent_from {
                    Some(ref out_point) => self.spent_value(height, out_point).await?,
                    None => None,
                };
                pos_fee(stake.reward, spent)
            }
        };

        if fee.is_none() {
            tracing::debug!("[stats] fee for block {} could not be determined", height);
        }

        Ok(BlockFacts {
            height,
            timestamp: info.time,
            kind: info.kind,
            fee,
            output_volume: output_volume(&block, info.kind),
            subsidy,
            difficulty: info.difficulty,
            transaction_count: block.transactions.len() as u64,
        })
    }

    /// Value of the output a coinstake spends; None when it cannot be
    /// resolved.
    async fn spent_value(
        &self,
        height: Height,
        out_point: &OutPoint,
    ) -> Result<Option<Amount>, StatsError> {
        match self.node.get_transaction(&out_point.txid).await {
            Ok(prev) => {
                let value = prev
                    .outputs
                    .get(out_point.vout as usize)
                    .map(|output| output.value);
                if value.is_none() {
                    tracing::warn!(
                        "[stats] block {}: stake input {}:{} has no such output",
                        height,
                        out_point.txid,
                        out_point.vout
                    );
                }
                Ok(value)
            }
            Err(NodeError::TransactionNotFound(txid)) => {
                tracing::warn!(
                    "[stats] block {}: stake input transaction {} not found",
                    height,
                    txid
                );
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{MockNode, TestBlock};

    const DAY: u64 = 1_700_000_000;

    #[tokio::test]
    async fn test_derive_pow_block() {
        let node = MockNode::new()
            .with_block(TestBlock::pow(1, DAY).coinbase("5000.00000010").difficulty(2.5))
            .with_subsidy(1, Amount::from_coins(5000));
        let deriver = BlockDeriver::new(Arc::new(node));

        let facts = deriver.derive(1).await.unwrap();
        assert_eq!(facts.kind, BlockKind::ProofOfWork);
        assert_eq!(facts.fee, Some(Amount::from_base_units(10)));
        assert_eq!(facts.subsidy, Some(Amount::from_coins(5000)));
        assert_eq!(facts.difficulty, 2.5);
        assert_eq!(facts.timestamp, DAY);
        assert_eq!(facts.transaction_count, 1);
    }

    #[tokio::test]
    async fn test_missing_subsidy_is_not_fatal() {
        let node = MockNode::new().with_block(TestBlock::pow(1, DAY).coinbase("10"));
        let deriver = BlockDeriver::new(Arc::new(node));

        let facts = deriver.derive(1).await.unwrap();
        assert_eq!(facts.subsidy, None);
        assert_eq!(facts.fee, None);
    }

    #[tokio::test]
    async fn test_derive_pos_block_resolves_spent_output() {
        let node = MockNode::new()
            .with_transaction("prev", &["100"])
            .with_block(
                TestBlock::pos(7, DAY)
                    .stake_from("prev", 0, &["104"])
                    .transfer(&["1.5", "2.5"]),
            )
            .with_subsidy(7, Amount::from_coins(4));
        let deriver = BlockDeriver::new(Arc::new(node));

        let facts = deriver.derive(7).await.unwrap();
        assert_eq!(facts.kind, BlockKind::ProofOfStake);
        assert_eq!(facts.fee, Some(Amount::from_coins(4)));
        assert_eq!(facts.output_volume, Amount::from_coins(4));
        assert_eq!(facts.transaction_count, 3);
    }

    #[tokio::test]
    async fn test_pos_unresolvable_input_leaves_fee_unset() {
        let node = MockNode::new()
            .with_block(TestBlock::pos(7, DAY).stake_from("missing", 0, &["104"]))
            .with_subsidy(7, Amount::from_coins(4));
        let deriver = BlockDeriver::new(Arc::new(node));

        let facts = deriver.derive(7).await.unwrap();
        assert_eq!(facts.fee, None);
        assert_eq!(facts.subsidy, Some(Amount::from_coins(4)));
    }

    #[tokio::test]
    async fn test_pos_out_of_range_vout_leaves_fee_unset() {
        let node = MockNode::new()
            .with_transaction("prev", &["100"])
            .with_block(TestBlock::pos(7, DAY).stake_from("prev", 3, &["104"]));
        let deriver = BlockDeriver::new(Arc::new(node));

        assert_eq!(deriver.derive(7).await.unwrap().fee, None);
    }

    #[tokio::test]
    async fn test_height_beyond_tip_is_not_found() {
        let deriver = BlockDeriver::new(Arc::new(MockNode::new()));
        let err = deriver.derive(3).await.unwrap_err();
        assert_eq!(err, StatsError::NotFound { height: 3 });
    }

    #[tokio::test]
    async fn test_unavailable_node_is_transient() {
        let node = MockNode::new().with_block(TestBlock::pow(1, DAY).coinbase("1"));
        node.fail_next("connection reset");
        let deriver = BlockDeriver::new(Arc::new(node));

        let err = deriver.derive(1).await.unwrap_err();
        assert!(matches!(err, StatsError::TransientFetch(_)));
    }
}
