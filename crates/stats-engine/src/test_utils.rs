//! Test utilities: a scriptable node, a controllable clock and a store that
//! can be told to fail.
//!
//! ```rust,ignore
//! use stats_engine::test_utils::{MockNode, TestBlock};
//!
//! let node = MockNode::new()
//!     .with_block(TestBlock::pow(1, 1_700_000_000).coinbase("5000.5").subsidy("5000"));
//! assert_eq!(node.block_heights(), vec![1]);
//! ```

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

use crate::adapters::InMemoryStatsStore;
use crate::domain::{
    Amount, BlockInfo, BlockKind, DailyBucket, DayKey, Height, NodeError, OutPoint, RawBlock,
    RawTransaction, ScriptKind, StoreError, Timestamp, TxInput, TxOutput,
};
use crate::ports::{DayStore, NodeClient, TimeSource};

fn amount(value: &str) -> Amount {
    Amount::from_coin_str(value).expect("valid test amount")
}

fn outputs(values: &[&str], script: ScriptKind) -> Vec<TxOutput> {
    values
        .iter()
        .map(|v| TxOutput {
            value: amount(v),
            script,
        })
        .collect()
}

// =============================================================================
// Clock
// =============================================================================

/// A clock that only moves when told to.
#[derive(Debug, Default)]
pub struct FixedTimeSource {
    timestamp: AtomicU64,
}

impl FixedTimeSource {
    /// Clock frozen at `timestamp` (seconds).
    pub fn new(timestamp: Timestamp) -> Self {
        Self {
            timestamp: AtomicU64::new(timestamp),
        }
    }

    /// Jump to `timestamp`.
    pub fn set(&self, timestamp: Timestamp) {
        self.timestamp.store(timestamp, Ordering::SeqCst);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: u64) {
        self.timestamp.fetch_add(secs, Ordering::SeqCst);
    }
}

impl TimeSource for FixedTimeSource {
    fn now(&self) -> Timestamp {
        self.timestamp.load(Ordering::SeqCst)
    }
}

// =============================================================================
// Block builder
// =============================================================================

/// Builder for a block the mock node serves.
#[derive(Debug, Clone)]
pub struct TestBlock {
    height: Height,
    time: Timestamp,
    kind: BlockKind,
    difficulty: f64,
    transactions: Vec<RawTransaction>,
    subsidy: Option<Amount>,
}

impl TestBlock {
    fn base(height: Height, time: Timestamp, kind: BlockKind, coinbase: Vec<TxOutput>) -> Self {
        Self {
            height,
            time,
            kind,
            difficulty: 1.0,
            transactions: vec![RawTransaction {
                txid: format!("coinbase-{height}"),
                inputs: vec![TxInput { prev_out: None }],
                outputs: coinbase,
            }],
            subsidy: None,
        }
    }

    /// Proof-of-work block with an empty coinbase.
    pub fn pow(height: Height, time: Timestamp) -> Self {
        Self::base(height, time, BlockKind::ProofOfWork, Vec::new())
    }

    /// Proof-of-stake block with a zero-value coinbase and no coinstake yet.
    pub fn pos(height: Height, time: Timestamp) -> Self {
        Self::base(
            height,
            time,
            BlockKind::ProofOfStake,
            outputs(&["0"], ScriptKind::Empty),
        )
    }

    /// Set the coinbase to a single pay-to-pubkey-hash output.
    pub fn coinbase(mut self, value: &str) -> Self {
        self.transactions[0].outputs = outputs(&[value], ScriptKind::PubKeyHash);
        self
    }

    /// Add the coinstake spending `txid:vout` and paying `rewards` to
    /// pubkey outputs (after the empty marker output).
    pub fn stake_from(mut self, txid: &str, vout: u32, rewards: &[&str]) -> Self {
        let mut coinstake_outputs = outputs(&["0"], ScriptKind::Empty);
        coinstake_outputs.extend(outputs(rewards, ScriptKind::PubKey));
        let coinstake = RawTransaction {
            txid: format!("coinstake-{}", self.height),
            inputs: vec![TxInput {
                prev_out: Some(OutPoint {
                    txid: txid.to_string(),
                    vout,
                }),
            }],
            outputs: coinstake_outputs,
        };
        self.transactions.insert(1, coinstake);
        self
    }

    /// Append an ordinary transfer.
    pub fn transfer(mut self, values: &[&str]) -> Self {
        let index = self.transactions.len();
        self.transactions.push(RawTransaction {
            txid: format!("tx-{}-{}", self.height, index),
            inputs: vec![TxInput {
                prev_out: Some(OutPoint {
                    txid: format!("funding-{}-{}", self.height, index),
                    vout: 0,
                }),
            }],
            outputs: outputs(values, ScriptKind::PubKeyHash),
        });
        self
    }

    /// Set the difficulty.
    pub fn difficulty(mut self, difficulty: f64) -> Self {
        self.difficulty = difficulty;
        self
    }

    /// Set the subsidy the node reports for this height.
    pub fn subsidy(mut self, value: &str) -> Self {
        self.subsidy = Some(amount(value));
        self
    }

    fn into_parts(self) -> (BlockInfo, RawBlock, Option<Amount>) {
        let info = BlockInfo {
            height: self.height,
            hash: format!("{:064x}", self.height),
            time: self.time,
            kind: self.kind,
            difficulty: self.difficulty,
        };
        let block = RawBlock {
            height: self.height,
            transactions: self.transactions,
        };
        (info, block, self.subsidy)
    }
}

// =============================================================================
// Mock node
// =============================================================================

#[derive(Default)]
struct MockChain {
    blocks: BTreeMap<Height, (BlockInfo, RawBlock)>,
    subsidies: HashMap<Height, Amount>,
    transactions: HashMap<String, RawTransaction>,
    tip: Option<Height>,
}

/// Holds one header request until the test lets it through.
#[derive(Debug, Default)]
pub struct NodeGate {
    entered: Notify,
    release: Notify,
}

impl NodeGate {
    /// Wait until the gated request has arrived.
    pub async fn entered(&self) {
        self.entered.notified().await;
    }

    /// Let the gated request continue.
    pub fn release(&self) {
        self.release.notify_one();
    }
}

/// Scriptable node: serves registered blocks, reports anything else as
/// beyond the tip, and can be told to fail its next calls.
#[derive(Default)]
pub struct MockNode {
    chain: RwLock<MockChain>,
    failures: Mutex<VecDeque<String>>,
    info_requests: Mutex<Vec<Height>>,
    gate: Mutex<Option<(Height, Arc<NodeGate>)>>,
}

impl MockNode {
    /// Node with an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: register a block.
    pub fn with_block(self, block: TestBlock) -> Self {
        self.push_block(block);
        self
    }

    /// Builder: set the subsidy for a height.
    pub fn with_subsidy(self, height: Height, subsidy: Amount) -> Self {
        self.chain.write().subsidies.insert(height, subsidy);
        self
    }

    /// Builder: register a standalone transaction paying `values`.
    pub fn with_transaction(self, txid: &str, values: &[&str]) -> Self {
        self.chain.write().transactions.insert(
            txid.to_string(),
            RawTransaction {
                txid: txid.to_string(),
                inputs: vec![TxInput { prev_out: None }],
                outputs: outputs(values, ScriptKind::PubKey),
            },
        );
        self
    }

    /// Builder: report a fixed tip instead of the highest block.
    pub fn with_tip(self, tip: Height) -> Self {
        self.set_tip(tip);
        self
    }

    /// Register a block on a shared node.
    pub fn push_block(&self, block: TestBlock) {
        let (info, raw, subsidy) = block.into_parts();
        let mut chain = self.chain.write();
        for tx in &raw.transactions {
            chain.transactions.insert(tx.txid.clone(), tx.clone());
        }
        if let Some(subsidy) = subsidy {
            chain.subsidies.insert(info.height, subsidy);
        }
        chain.blocks.insert(info.height, (info, raw));
    }

    /// Report a fixed tip.
    pub fn set_tip(&self, tip: Height) {
        self.chain.write().tip = Some(tip);
    }

    /// Fail the next call with [`NodeError::Unavailable`].
    pub fn fail_next(&self, message: &str) {
        self.failures.lock().push_back(message.to_string());
    }

    /// Registered heights, ascending.
    pub fn block_heights(&self) -> Vec<Height> {
        self.chain.read().blocks.keys().copied().collect()
    }

    /// Hold the next header request for `height` until the returned gate
    /// is released.
    pub fn gate_at(&self, height: Height) -> Arc<NodeGate> {
        let gate = Arc::new(NodeGate::default());
        *self.gate.lock() = Some((height, gate.clone()));
        gate
    }

    fn take_gate(&self, height: Height) -> Option<Arc<NodeGate>> {
        let mut slot = self.gate.lock();
        if matches!(slot.as_ref(), Some((gated, _)) if *gated == height) {
            slot.take().map(|(_, gate)| gate)
        } else {
            None
        }
    }

    /// Heights whose header summary was requested, in request order.
    pub fn info_requests(&self) -> Vec<Height> {
        self.info_requests.lock().clone()
    }

    fn check_failure(&self) -> Result<(), NodeError> {
        match self.failures.lock().pop_front() {
            Some(message) => Err(NodeError::Unavailable(message)),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl NodeClient for MockNode {
    async fn get_block(&self, height: Height) -> Result<RawBlock, NodeError> {
        self.check_failure()?;
        self.chain
            .read()
            .blocks
            .get(&height)
            .map(|(_, block)| block.clone())
            .ok_or(NodeError::HeightNotFound(height))
    }

    async fn get_block_info(&self, height: Height) -> Result<BlockInfo, NodeError> {
        self.info_requests.lock().push(height);
        if let Some(gate) = self.take_gate(height) {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        self.check_failure()?;
        self.chain
            .read()
            .blocks
            .get(&height)
            .map(|(info, _)| info.clone())
            .ok_or(NodeError::HeightNotFound(height))
    }

    async fn get_subsidy(&self, height: Height) -> Result<Amount, NodeError> {
        self.check_failure()?;
        self.chain
            .read()
            .subsidies
            .get(&height)
            .copied()
            .ok_or_else(|| NodeError::Unavailable(format!("no subsidy for {height}")))
    }

    async fn get_transaction(&self, txid: &str) -> Result<RawTransaction, NodeError> {
        self.check_failure()?;
        self.chain
            .read()
            .transactions
            .get(txid)
            .cloned()
            .ok_or_else(|| NodeError::TransactionNotFound(txid.to_string()))
    }

    async fn tip_height(&self) -> Result<Height, NodeError> {
        self.check_failure()?;
        let chain = self.chain.read();
        Ok(chain
            .tip
            .or_else(|| chain.blocks.keys().next_back().copied())
            .unwrap_or(0))
    }
}

// =============================================================================
// Faulty store
// =============================================================================

/// Day store whose writes can be switched to fail.
pub struct FlakyDayStore {
    inner: Arc<InMemoryStatsStore>,
    fail_writes: AtomicBool,
}

impl FlakyDayStore {
    /// Wrap an in-memory store.
    pub fn new(inner: Arc<InMemoryStatsStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
        }
    }

    /// Make every following upsert fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl DayStore for FlakyDayStore {
    async fn get_day(&self, date: DayKey) -> Result<Option<DailyBucket>, StoreError> {
        self.inner.get_day(date).await
    }

    async fn upsert_day(&self, bucket: &DailyBucket) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Io("injected write failure".to_string()));
        }
        self.inner.upsert_day(bucket).await
    }

    async fn query_range(
        &self,
        from_exclusive: DayKey,
        to_inclusive: DayKey,
    ) -> Result<Vec<DailyBucket>, StoreError> {
        self.inner.query_range(from_exclusive, to_inclusive).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixed_time_source() {
        let clock = FixedTimeSource::new(1_000);
        assert_eq!(clock.now(), 1_000);
        clock.advance(5);
        assert_eq!(clock.now(), 1_005);
        clock.set(7);
        assert_eq!(clock.now(), 7);
    }

    #[tokio::test]
    async fn test_mock_node_tip_and_failures() {
        let node = MockNode::new()
            .with_block(TestBlock::pow(1, 0))
            .with_block(TestBlock::pow(2, 0));
        assert_eq!(node.tip_height().await.unwrap(), 2);

        node.fail_next("down");
        assert!(matches!(
            node.tip_height().await,
            Err(NodeError::Unavailable(_))
        ));
        assert_eq!(node.tip_height().await.unwrap(), 2);

        node.set_tip(9);
        assert_eq!(node.tip_height().await.unwrap(), 9);
        assert_eq!(
            node.get_block(3).await.unwrap_err(),
            NodeError::HeightNotFound(3)
        );
    }

    #[test]
    fn test_pos_builder_layout() {
        let (_, block, _) = TestBlock::pos(4, 0)
            .transfer(&["1"])
            .stake_from("prev", 1, &["10", "10"])
            .into_parts();
        assert_eq!(block.transactions.len(), 3);
        assert_eq!(block.transactions[1].txid, "coinstake-4");
        assert_eq!(block.transactions[1].outputs.len(), 3);
        assert_eq!(block.transactions[2].outputs[0].value, Amount::from_coins(1));
    }
}
