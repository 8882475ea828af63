//! Reward recipient extraction.
//!
//! The first transaction of every block must be the reward distribution.
//! Anything else means the node handed back data this tool can't reason
//! about, so the error is fatal to the run.

use crate::block::Block;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("block at height {height} has no transactions")]
    NoTransactions { height: u64 },

    #[error("block at height {height} has {found} first transaction, expected BLOCK_REWARD")]
    NotBlockReward { height: u64, found: String },

    #[error("block at height {height} has an empty back-link")]
    MissingBackLink { height: u64 },
}

impl ValidationError {
    pub fn height(&self) -> u64 {
        match self {
            ValidationError::NoTransactions { height }
            | ValidationError::NotBlockReward { height, .. }
            | ValidationError::MissingBackLink { height } => *height,
        }
    }
}

/// Recipients of the block's reward transaction, in output order.
///
/// Duplicates are kept; a block may pay the same key twice and the caller
/// decides how that counts.
pub fn extract_recipients(block: &Block) -> Result<Vec<String>, ValidationError> {
    let height = block.header.height;
    let reward_txn = block
        .transactions
        .first()
        .ok_or(ValidationError::NoTransactions { height })?;

    if !reward_txn.is_block_reward() {
        return Err(ValidationError::NotBlockReward {
            height,
            found: reward_txn.transaction_type.clone(),
        });
    }

    Ok(reward_txn
        .outputs
        .iter()
        .map(|output| output.public_key.clone())
        .collect())
}
