//! Turns a matched block into an ordered sequence of typed event records.
//!
//! Matching here is the strict pass: factory references resolve against the
//! real child-address sets. One [`RawEvent`] is produced per matched
//! `(source, record)` pair, and the block's events are sorted ascending by
//! `(checkpoint, source_index)`: checkpoints over distinct records are
//! strictly increasing, and the source index breaks the tie when one record
//! satisfies several sources.

use std::collections::BTreeSet;

use crate::{
    checkpoint::{Checkpoint, EventKind, TRANSACTION_INDEX_MAX},
    child_addresses::ChildAddressTracker,
    event::{BlockWithEventData, EventData, RawEvent},
    filter::{
        Filter, Sources, block_matches, log_matches, trace_matches, transaction_matches,
        transfer_matches,
    },
};

/// Builds the final matched-source set and event list for one ingested block.
pub(crate) fn build_block_events(
    chain_id: u64,
    data: &BlockWithEventData,
    sources: &Sources,
    children: &ChildAddressTracker,
) -> (BTreeSet<usize>, Vec<RawEvent>) {
    let block = &data.block;
    let checkpoint = |transaction_index: u64, event_kind: EventKind, event_index: u64| Checkpoint {
        block_timestamp: block.timestamp,
        chain_id,
        block_number: block.number,
        transaction_index,
        event_kind,
        event_index,
    };

    let mut events: Vec<RawEvent> = Vec::new();

    for (source_index, filter) in sources.filters().iter().enumerate() {
        match filter {
            Filter::Log(f) => {
                for log in data.logs.iter().filter(|log| log_matches(f, log, Some(children))) {
                    events.push(RawEvent {
                        chain_id,
                        source_index,
                        checkpoint: checkpoint(
                            log.transaction_index,
                            EventKind::Log,
                            log.log_index,
                        ),
                        data: EventData::Log(log.clone()),
                    });
                }
            }
            Filter::Transaction(f) => {
                for tx in data
                    .transactions
                    .iter()
                    .filter(|tx| transaction_matches(f, tx, block.number, Some(children)))
                {
                    events.push(RawEvent {
                        chain_id,
                        source_index,
                        checkpoint: checkpoint(tx.transaction_index, EventKind::Transaction, 0),
                        data: EventData::Transaction(tx.clone()),
                    });
                }
            }
            Filter::Trace(f) => {
                for trace in data
                    .traces
                    .iter()
                    .filter(|t| trace_matches(f, t, block.number, Some(children)))
                {
                    events.push(RawEvent {
                        chain_id,
                        source_index,
                        checkpoint: checkpoint(
                            trace.transaction_index,
                            EventKind::Trace,
                            trace.trace_index,
                        ),
                        data: EventData::Trace(trace.clone()),
                    });
                }
            }
            Filter::Transfer(f) => {
                for trace in data
                    .traces
                    .iter()
                    .filter(|t| transfer_matches(f, t, block.number, Some(children)))
                {
                    events.push(RawEvent {
                        chain_id,
                        source_index,
                        checkpoint: checkpoint(
                            trace.transaction_index,
                            EventKind::Transfer,
                            trace.trace_index,
                        ),
                        data: EventData::Transfer(trace.clone()),
                    });
                }
            }
            Filter::Block(f) => {
                if block_matches(f, block.number) {
                    events.push(RawEvent {
                        chain_id,
                        source_index,
                        checkpoint: checkpoint(TRANSACTION_INDEX_MAX, EventKind::Block, 0),
                        data: EventData::Block(block.light()),
                    });
                }
            }
        }
    }

    events.sort_by(|a, b| {
        a.checkpoint.cmp(&b.checkpoint).then(a.source_index.cmp(&b.source_index))
    });

    let matched: BTreeSet<usize> = events.iter().map(|event| event.source_index).collect();
    (matched, events)
}
