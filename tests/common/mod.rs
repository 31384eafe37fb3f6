#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, B256, Bytes};
use headsync::{
    LightBlock, LogEntry, Network, Sources, SyncEngine, SyncResult,
    test_utils::MockChain,
};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

pub fn network(finality_block_count: u64) -> Network {
    Network {
        name: "testnet".into(),
        chain_id: 1,
        finality_block_count,
        polling_interval: Duration::from_millis(50),
    }
}

/// An engine wired to `mock` with a buffered event stream, seeded at
/// `finalized`.
pub fn setup_engine(
    mock: &MockChain,
    sources: Sources,
    finality_block_count: u64,
    finalized: LightBlock,
) -> (SyncEngine<MockChain>, ReceiverStream<SyncResult>) {
    let (events_tx, events_rx) = mpsc::channel(256);
    let engine = SyncEngine::new(
        network(finality_block_count),
        sources,
        Arc::new(mock.clone()),
        finalized,
        events_tx,
    );
    (engine, ReceiverStream::new(events_rx))
}

/// A log emitted by `address` in the given block, carrying the block's
/// coordinates.
pub fn log_in_block(
    block: &headsync::SyncBlock,
    address: Address,
    topics: Vec<B256>,
    log_index: u64,
) -> LogEntry {
    LogEntry {
        address,
        topics,
        data: Bytes::new(),
        block_hash: block.hash,
        block_number: block.number,
        transaction_hash: B256::repeat_byte(0x77),
        transaction_index: 0,
        log_index,
    }
}
