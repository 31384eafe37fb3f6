//! Deterministic fixtures for exercising the pipeline without a node.

mod macros;
mod mock_chain;

pub use mock_chain::MockChain;

use alloy::primitives::B256;

use crate::types::{LightBlock, SyncBlock};

/// Deterministic block hash: the block number in the low bytes, the fork tag
/// in the first byte.
#[must_use]
pub fn block_hash(number: u64, fork: u8) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0] = fork;
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    B256::new(bytes)
}

/// A canonical (fork 0) block extending `parent_hash`.
#[must_use]
pub fn block_at(number: u64, parent_hash: B256) -> SyncBlock {
    fork_block_at(number, parent_hash, 0)
}

/// A block on the given fork extending `parent_hash`.
#[must_use]
pub fn fork_block_at(number: u64, parent_hash: B256, fork: u8) -> SyncBlock {
    SyncBlock {
        number,
        hash: block_hash(number, fork),
        parent_hash,
        timestamp: number * 12,
        logs_bloom: Default::default(),
        transactions: Vec::new(),
    }
}

/// The light record of the canonical block at `number`, chained to the
/// canonical block below it.
#[must_use]
pub fn light_at(number: u64) -> LightBlock {
    LightBlock {
        number,
        hash: block_hash(number, 0),
        parent_hash: block_hash(number - 1, 0),
        timestamp: number * 12,
    }
}

/// Builds the canonical chain `from..=to` (parent-linked via
/// [`block_hash`]) and returns the blocks in order.
#[must_use]
pub fn canonical_chain(from: u64, to: u64) -> Vec<SyncBlock> {
    (from..=to).map(|number| block_at(number, block_hash(number - 1, 0))).collect()
}
