//! Reorg-safe real-time chain synchronization for EVM indexers.
//!
//! `headsync` ingests newly mined head blocks from an RPC collaborator,
//! matches them against a user-declared set of filters (logs, transactions,
//! traces, transfers, blocks, and factory-discovered child contracts),
//! maintains the unfinalized chain in memory, reconciles reorgs, promotes
//! blocks to finalized state, and emits a strictly ordered downstream event
//! stream.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//!
//! use headsync::{
//!     ChainSync, Filter, LogFilter, Network, Sources, SyncEvent,
//!     request_queue::Retrying,
//! };
//! use tokio_stream::StreamExt;
//! use tracing::{error, info};
//!
//! # async fn example(rpc: impl headsync::request_queue::RequestQueue) -> anyhow::Result<()> {
//! let network = Network {
//!     name: "mainnet".into(),
//!     chain_id: 1,
//!     finality_block_count: 64,
//!     polling_interval: Duration::from_secs(2),
//! };
//! let sources = Sources::new(vec![Filter::Log(LogFilter::new(1))]);
//!
//! let (handle, mut events) =
//!     ChainSync::new().connect(network, sources, Retrying::new(rpc))?.run();
//!
//! while let Some(event) = events.next().await {
//!     match event {
//!         Ok(SyncEvent::Block(block)) => info!(
//!             block_number = block.block.number,
//!             events = block.events.len(),
//!             "new block"
//!         ),
//!         Ok(SyncEvent::Finalize(block)) => info!(block_number = block.number, "finalized"),
//!         Ok(SyncEvent::Reorg(reorg)) => info!(
//!             common_ancestor = reorg.common_ancestor.number,
//!             depth = reorg.reorged_blocks.len(),
//!             "reorg"
//!         ),
//!         Err(err) => {
//!             error!(error = %err, "fatal sync error");
//!             break;
//!         }
//!     }
//! }
//!
//! handle.kill().await;
//! # Ok(())
//! # }
//! ```

pub mod filter;
pub mod request_queue;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

mod checkpoint;
mod child_addresses;
mod engine;
mod error;
mod event;
mod event_builder;
mod fetcher;
mod poller;
mod service;
mod types;

pub use checkpoint::{Checkpoint, EventKind, TRANSACTION_INDEX_MAX};
pub use child_addresses::ChildAddressTracker;
pub use engine::{MAX_QUEUED_BLOCKS, SyncEngine};
pub use error::SyncError;
pub use event::{
    BlockEvent, BlockWithEventData, EventData, RawEvent, ReorgEvent, SyncEvent, SyncResult,
};
pub use filter::{
    AddressSpec, BlockFilter, ChildExtraction, Factory, Filter, LogFilter, Sources, TopicSpec,
    TraceFilter, TransactionFilter, TransferFilter,
};
pub use service::{ChainSync, ConnectedChainSync, DEFAULT_EVENT_BUFFER_CAPACITY, SyncHandle};
pub use types::{
    CallTrace, CallType, LightBlock, LogEntry, Network, ReceiptRecord, SyncBlock, TransactionData,
};
