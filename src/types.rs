use std::time::Duration;

use alloy::primitives::{Address, B256, Bloom, Bytes, U256};

/// The minimal record retained for every block between the finalized block
/// and the chain head.
///
/// Parent links are by hash, so the unfinalized chain can be verified and
/// rewound without holding on to full block bodies.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LightBlock {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
}

/// A raw head block as returned by the RPC collaborator, including its full
/// transaction list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SyncBlock {
    pub number: u64,
    pub hash: B256,
    pub parent_hash: B256,
    pub timestamp: u64,
    pub logs_bloom: Bloom,
    pub transactions: Vec<TransactionData>,
}

impl SyncBlock {
    /// The light record retained once the block has been ingested.
    #[must_use]
    pub fn light(&self) -> LightBlock {
        LightBlock {
            number: self.number,
            hash: self.hash,
            parent_hash: self.parent_hash,
            timestamp: self.timestamp,
        }
    }
}

impl From<&SyncBlock> for LightBlock {
    fn from(block: &SyncBlock) -> Self {
        block.light()
    }
}

/// A transaction as carried inside a [`SyncBlock`].
///
/// `to` is `None` for contract creations.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionData {
    pub hash: B256,
    pub transaction_index: u64,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: U256,
}

/// A log emitted by a transaction, with its block and transaction coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogEntry {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub block_hash: B256,
    pub block_number: u64,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub log_index: u64,
}

impl LogEntry {
    #[must_use]
    pub fn topic0(&self) -> Option<&B256> {
        self.topics.first()
    }
}

/// The call frame kind reported by the tracing RPC.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallType {
    Call,
    StaticCall,
    DelegateCall,
    CallCode,
    Create,
    Create2,
}

/// A flattened call frame from `debug_traceBlockByHash`.
///
/// `trace_index` is the deterministic ordinal of the frame within the block's
/// trace tree, as produced by the tracing RPC.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallTrace {
    pub call_type: CallType,
    pub from: Address,
    pub to: Option<Address>,
    pub input: Bytes,
    pub value: Option<U256>,
    pub transaction_hash: B256,
    pub transaction_index: u64,
    pub trace_index: u64,
}

/// The slice of a transaction receipt the pipeline cares about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReceiptRecord {
    pub transaction_hash: B256,
    /// `true` if the transaction succeeded.
    pub status: bool,
}

/// Per-chain configuration for one sync pipeline.
#[derive(Clone, Debug)]
pub struct Network {
    pub name: String,
    pub chain_id: u64,
    /// Depth beyond which reorgs are assumed impossible on this chain.
    pub finality_block_count: u64,
    /// How often the poller asks the RPC for the latest head.
    pub polling_interval: Duration,
}
