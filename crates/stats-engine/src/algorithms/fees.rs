//! # Fee Derivation
//!
//! Pure fee and output-volume rules for proof-of-work and proof-of-stake
//! blocks. Resolving the coin a stake spends needs the node and lives in
//! the deriver; everything here works on a fetched block.
//!
//! ## Rules
//!
//! | Kind | Fee |
//! |------|-----|
//! | PoW | coinbase output 0 − subsidy, floored at 0 |
//! | PoS | stake reward − value of the spent stake output, floored at 0 |
//!
//! The stake reward is output 1 of transaction 1, plus output 2 when that
//! output does not pay to a pubkey hash (split stake). This mirrors how the
//! chain's coinstake lays out its outputs.

use crate::domain::{Amount, BlockKind, NodeError, OutPoint, RawBlock, ScriptKind};

/// Reward side of a coinstake and the output it spends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StakeReward {
    /// Output 1 (+ output 2 for split stakes).
    pub reward: Amount,
    /// Previous output referenced by the coinstake's first input.
    pub spent_from: Option<OutPoint>,
}

/// Proof-of-work fee.
///
/// Missing coinbase output yields 0; unknown subsidy yields None.
pub fn pow_fee(block: &RawBlock, subsidy: Option<Amount>) -> Option<Amount> {
    let coinbase_value = match block
        .transactions
        .first()
        .and_then(|tx| tx.outputs.first())
    {
        Some(output) => output.value,
        None => return Some(Amount::ZERO),
    };

    subsidy.map(|subsidy| coinbase_value.saturating_sub(subsidy))
}

/// Reward side of a proof-of-stake block.
///
/// A block without a coinstake transaction or without its reward output is
/// malformed.
pub fn stake_reward(block: &RawBlock) -> Result<StakeReward, NodeError> {
    let coinstake = block.transactions.get(1).ok_or_else(|| {
        NodeError::Malformed(format!(
            "proof-of-stake block {} has no coinstake transaction",
            block.height
        ))
    })?;

    let first_reward = coinstake.outputs.get(1).ok_or_else(|| {
        NodeError::Malformed(format!(
            "coinstake {} in block {} has no reward output",
            coinstake.txid, block.height
        ))
    })?;

    let mut reward = first_reward.value;
    if let Some(split) = coinstake.outputs.get(2) {
        if split.script != ScriptKind::PubKeyHash {
            reward += split.value;
        }
    }

    let spent_from = coinstake
        .inputs
        .first()
        .and_then(|input| input.prev_out.clone());

    Ok(StakeReward { reward, spent_from })
}

/// Proof-of-stake fee from the reward and the spent output's value.
pub fn pos_fee(reward: Amount, spent: Option<Amount>) -> Option<Amount> {
    spent.map(|spent| reward.saturating_sub(spent))
}

/// Sum of every output except the reward transactions
/// (transaction 0 for PoW, transactions 0 and 1 for PoS).
pub fn output_volume(block: &RawBlock, kind: BlockKind) -> Amount {
    let skip = match kind {
        BlockKind::ProofOfWork => 1,
        BlockKind::ProofOfStake => 2,
    };

    block
        .transactions
        .iter()
        .skip(skip)
        .flat_map(|tx| tx.outputs.iter())
        .map(|output| output.value)
        .sum()
}
