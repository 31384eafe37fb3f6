use std::{
    collections::{BTreeMap, HashMap},
    sync::{Arc, Mutex},
};

use alloy::{
    eips::{BlockId, BlockNumberOrTag},
    primitives::B256,
};

use crate::{
    error::SyncError,
    request_queue::RequestQueue,
    types::{CallTrace, LogEntry, ReceiptRecord, SyncBlock},
};

#[derive(Default)]
struct ChainState {
    blocks_by_hash: HashMap<B256, SyncBlock>,
    canonical: BTreeMap<u64, B256>,
    logs: HashMap<B256, Vec<LogEntry>>,
    traces: HashMap<B256, Vec<CallTrace>>,
    receipts: HashMap<B256, ReceiptRecord>,
    calls: HashMap<&'static str, u64>,
}

/// A programmable in-memory chain implementing [`RequestQueue`].
///
/// Blocks inserted with [`insert_block`](Self::insert_block) become the
/// canonical chain served by `get_block_by_number`; fork blocks inserted with
/// [`insert_fork_block`](Self::insert_fork_block) are only reachable by hash.
/// RPC calls are counted per method for assertions.
#[derive(Clone, Default)]
pub struct MockChain {
    state: Arc<Mutex<ChainState>>,
}

impl MockChain {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a block and makes it canonical at its height.
    pub fn insert_block(&self, block: SyncBlock) {
        let mut state = self.state.lock().unwrap();
        state.canonical.insert(block.number, block.hash);
        state.blocks_by_hash.insert(block.hash, block);
    }

    /// Inserts a block reachable only via `get_block_by_hash`.
    pub fn insert_fork_block(&self, block: SyncBlock) {
        self.state.lock().unwrap().blocks_by_hash.insert(block.hash, block);
    }

    /// Replaces the canonical chain from `blocks[0].number` upward, dropping
    /// any canonical entries above the new tip.
    pub fn reorg_to(&self, blocks: Vec<SyncBlock>) {
        let Some(first) = blocks.first() else { return };
        let mut state = self.state.lock().unwrap();
        let stale: Vec<u64> =
            state.canonical.range(first.number..).map(|(number, _)| *number).collect();
        for number in stale {
            state.canonical.remove(&number);
        }
        for block in blocks {
            state.canonical.insert(block.number, block.hash);
            state.blocks_by_hash.insert(block.hash, block);
        }
    }

    pub fn set_logs(&self, block_hash: B256, logs: Vec<LogEntry>) {
        self.state.lock().unwrap().logs.insert(block_hash, logs);
    }

    pub fn set_traces(&self, block_hash: B256, traces: Vec<CallTrace>) {
        self.state.lock().unwrap().traces.insert(block_hash, traces);
    }

    pub fn set_receipt(&self, receipt: ReceiptRecord) {
        self.state.lock().unwrap().receipts.insert(receipt.transaction_hash, receipt);
    }

    /// How many times `method` was called.
    #[must_use]
    pub fn calls(&self, method: &str) -> u64 {
        self.state.lock().unwrap().calls.get(method).copied().unwrap_or(0)
    }

    fn record(&self, method: &'static str) {
        *self.state.lock().unwrap().calls.entry(method).or_insert(0) += 1;
    }
}

impl RequestQueue for MockChain {
    async fn get_block_by_number(&self, number: BlockNumberOrTag) -> Result<SyncBlock, SyncError> {
        self.record("get_block_by_number");
        let state = self.state.lock().unwrap();
        let hash = match number {
            BlockNumberOrTag::Latest => state.canonical.values().next_back().copied(),
            BlockNumberOrTag::Number(number) => state.canonical.get(&number).copied(),
            _ => None,
        };
        hash.and_then(|hash| state.blocks_by_hash.get(&hash).cloned())
            .ok_or(SyncError::BlockNotFound(BlockId::Number(number)))
    }

    async fn get_block_by_hash(&self, hash: B256) -> Result<SyncBlock, SyncError> {
        self.record("get_block_by_hash");
        self.state
            .lock()
            .unwrap()
            .blocks_by_hash
            .get(&hash)
            .cloned()
            .ok_or(SyncError::BlockNotFound(BlockId::Hash(hash.into())))
    }

    async fn get_logs(&self, block_hash: B256) -> Result<Vec<LogEntry>, SyncError> {
        self.record("get_logs");
        Ok(self.state.lock().unwrap().logs.get(&block_hash).cloned().unwrap_or_default())
    }

    async fn trace_block(&self, block_hash: B256) -> Result<Vec<CallTrace>, SyncError> {
        self.record("trace_block");
        Ok(self.state.lock().unwrap().traces.get(&block_hash).cloned().unwrap_or_default())
    }

    async fn get_transaction_receipt(
        &self,
        transaction_hash: B256,
    ) -> Result<ReceiptRecord, SyncError> {
        self.record("get_transaction_receipt");
        Ok(self
            .state
            .lock()
            .unwrap()
            .receipts
            .get(&transaction_hash)
            .cloned()
            .unwrap_or(ReceiptRecord { transaction_hash, status: true }))
    }
}
