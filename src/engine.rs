//! The reorg-safe ingestion state machine.
//!
//! [`SyncEngine`] owns everything between the last finalized block and the
//! chain head: the unfinalized block list, the factory child-address sets,
//! and the pending work queue. It is driven one block at a time by the
//! service task (or directly by tests) and upholds the core invariant that
//! `unfinalized_blocks` is a contiguous parent-linked chain rooted at
//! `finalized_block`.
//!
//! Dispatch on an incoming head block compares `(number, parent_hash)`
//! against the current head:
//!
//! * same hash: duplicate, dropped
//! * `number <= head`: reorg reconciliation
//! * `number > head + 1`: gap fill
//! * `number == head + 1` with a matching parent: happy-path ingest
//! * `number == head + 1` with a diverging parent: reorg reconciliation

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use alloy::primitives::Address;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    child_addresses::ChildAddressTracker,
    error::SyncError,
    event::{BlockEvent, ReorgEvent, SyncEvent, SyncResult},
    event_builder::build_block_events,
    fetcher::fetch_block_event_data,
    filter::{Factory, Sources},
    request_queue::RequestQueue,
    types::{LightBlock, Network, SyncBlock},
};

/// Upper bound on blocks fetched by one gap fill. Anything further behind is
/// left for the next poll to re-bootstrap.
pub const MAX_QUEUED_BLOCKS: u64 = 25;

pub struct SyncEngine<Q> {
    network: Network,
    sources: Sources,
    queue: Arc<Q>,
    events: mpsc::Sender<SyncResult>,
    finalized_block: LightBlock,
    unfinalized_blocks: Vec<LightBlock>,
    children: ChildAddressTracker,
    pending: VecDeque<SyncBlock>,
    max_queued_blocks: u64,
}

impl<Q: RequestQueue> SyncEngine<Q> {
    pub fn new(
        network: Network,
        sources: Sources,
        queue: Arc<Q>,
        finalized_block: LightBlock,
        events: mpsc::Sender<SyncResult>,
    ) -> Self {
        Self {
            network,
            sources,
            queue,
            events,
            finalized_block,
            unfinalized_blocks: Vec::new(),
            children: ChildAddressTracker::default(),
            pending: VecDeque::new(),
            max_queued_blocks: MAX_QUEUED_BLOCKS,
        }
    }

    /// The deepest block that can no longer reorg.
    #[must_use]
    pub fn finalized_block(&self) -> &LightBlock {
        &self.finalized_block
    }

    /// The contiguous unfinalized chain, ascending by number, parent-linked
    /// to the finalized block.
    #[must_use]
    pub fn unfinalized_blocks(&self) -> &[LightBlock] {
        &self.unfinalized_blocks
    }

    /// Children of `factory` discovered in finalized blocks.
    #[must_use]
    pub fn finalized_children(&self, factory: &Factory) -> Option<&HashSet<Address>> {
        self.children.finalized_children(factory)
    }

    /// Children of `factory` discovered in currently unfinalized blocks.
    #[must_use]
    pub fn unfinalized_children(&self, factory: &Factory) -> Option<&HashSet<Address>> {
        self.children.unfinalized_children(factory)
    }

    /// The current chain head: the last unfinalized block, or the finalized
    /// block when nothing unfinalized is held.
    #[must_use]
    pub fn head(&self) -> LightBlock {
        self.unfinalized_blocks.last().cloned().unwrap_or_else(|| self.finalized_block.clone())
    }

    /// Adds a head block to the pending work queue.
    pub fn enqueue(&mut self, block: SyncBlock) {
        self.pending.push_back(block);
    }

    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// Pops the next pending block, if any.
    pub fn next_pending(&mut self) -> Option<SyncBlock> {
        self.pending.pop_front()
    }

    /// Drops all pending work. Called by the supervisor after an error so a
    /// poison-pill block cannot loop, and by reorg reconciliation so stale
    /// successors do not race the rewound chain.
    pub fn clear_pending(&mut self) {
        self.pending.clear();
    }

    /// Processes every pending block in order. Convenience driver for tests;
    /// the service task pops blocks one at a time instead.
    pub async fn drive(&mut self) -> Result<(), SyncError> {
        while let Some(block) = self.next_pending() {
            self.process(block).await?;
        }
        Ok(())
    }

    /// Runs one incoming head block through the state machine.
    pub async fn process(&mut self, incoming: SyncBlock) -> Result<(), SyncError> {
        let head = self.head();

        if incoming.hash == head.hash {
            debug!(block_number = incoming.number, "duplicate head block, skipping");
            return Ok(());
        }

        if incoming.number <= head.number {
            return self.reconcile_reorg(incoming).await;
        }

        if incoming.number > head.number + 1 {
            return self.fill_gap(incoming, &head).await;
        }

        if incoming.parent_hash == head.hash {
            self.ingest(incoming).await
        } else {
            self.reconcile_reorg(incoming).await
        }
    }

    /// Happy path: the incoming block extends the current head.
    async fn ingest(&mut self, block: SyncBlock) -> Result<(), SyncError> {
        let mut data = fetch_block_event_data(self.queue.as_ref(), &self.sources, block).await?;

        let factory_logs = std::mem::take(&mut data.factory_logs);
        self.children.ingest_block(data.block.hash, factory_logs, self.sources.factories());

        let (matched_sources, events) =
            build_block_events(self.network.chain_id, &data, &self.sources, &self.children);

        let light = data.block.light();
        let receipts = std::mem::take(&mut data.receipts);
        self.unfinalized_blocks.push(light.clone());

        info!(
            block_number = light.number,
            block_hash = %light.hash,
            matched = matched_sources.len(),
            events = events.len(),
            "ingested head block"
        );

        // `data` (and with it the heavy transaction bodies) is dropped here;
        // only the light record and the matched events survive
        drop(data);

        self.emit(SyncEvent::Block(BlockEvent { block: light, matched_sources, events, receipts }))
            .await?;

        self.try_finalize().await
    }

    /// Promotes the block `finality_block_count` behind the head once the
    /// head has pulled `2 * finality_block_count` ahead of the last
    /// finalized block.
    async fn try_finalize(&mut self) -> Result<(), SyncError> {
        let Some(head) = self.unfinalized_blocks.last() else {
            return Ok(());
        };
        let depth = self.network.finality_block_count;
        if head.number < self.finalized_block.number + 2 * depth {
            return Ok(());
        }

        let target = head.number - depth;
        let Some(position) =
            self.unfinalized_blocks.iter().position(|block| block.number == target)
        else {
            return Ok(());
        };

        let remaining = self.unfinalized_blocks.split_off(position + 1);
        let promoted = std::mem::replace(&mut self.unfinalized_blocks, remaining);
        let new_finalized =
            promoted.last().expect("promoted prefix contains the target block").clone();

        self.children.finalize(&promoted, &self.unfinalized_blocks, self.sources.factories());
        self.finalized_block = new_finalized.clone();

        info!(
            block_number = new_finalized.number,
            block_hash = %new_finalized.hash,
            promoted = promoted.len(),
            "finalized block range"
        );

        self.emit(SyncEvent::Finalize(new_finalized)).await
    }

    /// The incoming block is more than one ahead of the head: fetch the
    /// missing range (bounded by `max_queued_blocks`), queue it in order,
    /// and re-queue the incoming block behind it.
    async fn fill_gap(&mut self, incoming: SyncBlock, head: &LightBlock) -> Result<(), SyncError> {
        let from = head.number + 1;
        let to = (incoming.number - 1).min(head.number + self.max_queued_blocks);

        debug!(
            from,
            to,
            incoming = incoming.number,
            "gap between head and incoming block, fetching missing range"
        );

        self.pending.clear();
        for number in from..=to {
            let block = self.queue.get_block_by_number(number.into()).await?;
            self.pending.push_back(block);
        }
        self.pending.push_back(incoming);

        Ok(())
    }

    /// The incoming block branches off somewhere below the head: walk its
    /// ancestry back until it reconnects with the local chain, evict
    /// everything above the common ancestor, and rebuild the unfinalized
    /// child-address sets from the survivors.
    async fn reconcile_reorg(&mut self, incoming: SyncBlock) -> Result<(), SyncError> {
        warn!(
            block_number = incoming.number,
            block_hash = %incoming.hash,
            head = self.head().number,
            "reorg detected, walking back to the common ancestor"
        );

        let mut reorged: Vec<LightBlock> = Vec::new();
        while self.unfinalized_blocks.last().is_some_and(|b| b.number >= incoming.number) {
            reorged.push(self.unfinalized_blocks.pop().expect("just checked non-empty"));
        }

        let mut branch = incoming.light();
        let common_ancestor = loop {
            let head_hash =
                self.unfinalized_blocks.last().map_or(self.finalized_block.hash, |b| b.hash);
            if head_hash == branch.parent_hash {
                break self
                    .unfinalized_blocks
                    .last()
                    .cloned()
                    .unwrap_or_else(|| self.finalized_block.clone());
            }
            if self.unfinalized_blocks.is_empty() {
                error!(
                    finalized = self.finalized_block.number,
                    "reorg walk-back exhausted the unfinalized chain"
                );
                return Err(SyncError::UnrecoverableReorg {
                    finalized: self.finalized_block.number,
                });
            }
            let parent = self.queue.get_block_by_hash(branch.parent_hash).await?;
            branch = parent.light();
            reorged.push(self.unfinalized_blocks.pop().expect("just checked non-empty"));
        };

        reorged.sort_by_key(|block| block.number);

        self.children.rewind(&reorged, &self.unfinalized_blocks, self.sources.factories());

        // stale successors of the evicted blocks must not race the rewind
        self.pending.clear();

        warn!(
            common_ancestor = common_ancestor.number,
            depth = reorged.len(),
            "reorg reconciled"
        );

        self.emit(SyncEvent::Reorg(ReorgEvent { common_ancestor, reorged_blocks: reorged })).await
    }

    async fn emit(&self, event: SyncEvent) -> Result<(), SyncError> {
        self.events.send(Ok(event)).await.map_err(|_| SyncError::ServiceShutdown)
    }
}
