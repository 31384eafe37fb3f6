use std::collections::BTreeSet;

use crate::{
    checkpoint::Checkpoint,
    error::SyncError,
    types::{CallTrace, LightBlock, LogEntry, ReceiptRecord, SyncBlock, TransactionData},
};

/// Everything the pipeline fetched for one head block, filtered down to what
/// downstream requires.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BlockWithEventData {
    pub block: SyncBlock,
    /// Logs surviving the weak pre-filter.
    pub logs: Vec<LogEntry>,
    /// Logs announcing factory children, indexed later by block hash.
    pub factory_logs: Vec<LogEntry>,
    pub traces: Vec<CallTrace>,
    /// Transactions required by matched records or transaction filters.
    pub transactions: Vec<TransactionData>,
    pub receipts: Vec<ReceiptRecord>,
}

/// The record a [`RawEvent`] was built from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EventData {
    Block(LightBlock),
    Log(LogEntry),
    Transaction(TransactionData),
    Trace(CallTrace),
    Transfer(CallTrace),
}

/// One matched record, ready for downstream consumption.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawEvent {
    pub chain_id: u64,
    /// Position of the satisfied filter in the user's source list.
    pub source_index: usize,
    pub checkpoint: Checkpoint,
    pub data: EventData,
}

/// Payload of a `block` event: the ingested block with its matched sources
/// and all event records, sorted by checkpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockEvent {
    pub block: LightBlock,
    pub matched_sources: BTreeSet<usize>,
    pub events: Vec<RawEvent>,
    /// Receipts fetched for transaction filters with
    /// `include_reverted == false`. Consumers must tolerate a receipt being
    /// absent for any given transaction.
    pub receipts: Vec<ReceiptRecord>,
}

/// Payload of a `reorg` event: the surviving common ancestor and the evicted
/// blocks, ascending by number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReorgEvent {
    pub common_ancestor: LightBlock,
    pub reorged_blocks: Vec<LightBlock>,
}

/// An event emitted downstream, in strict pipeline order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SyncEvent {
    /// A new head block was ingested.
    Block(BlockEvent),
    /// The contained block (and everything below it) became final.
    Finalize(LightBlock),
    /// A chain reorganization evicted the contained blocks.
    Reorg(ReorgEvent),
}

/// Items of the downstream event stream.
pub type SyncResult = Result<SyncEvent, SyncError>;

impl From<SyncEvent> for SyncResult {
    fn from(event: SyncEvent) -> Self {
        Ok(event)
    }
}

impl PartialEq<SyncEvent> for SyncResult {
    fn eq(&self, other: &SyncEvent) -> bool {
        matches!(self, Ok(event) if event == other)
    }
}
