//! Per-block event-data retrieval.
//!
//! Given a head block with its transaction bodies, fetches the logs, traces,
//! and receipts that the configured sources could need, pre-filtered with
//! factory references treated as wildcards. Every RPC response is validated
//! against the requested block; a mismatch surfaces as the retryable
//! [`SyncError::InconsistentResponse`], which usually indicates an RPC node
//! lagging near the chain tip.

use std::collections::HashSet;

use alloy::primitives::B256;
use tracing::trace;

use crate::{
    error::SyncError,
    event::BlockWithEventData,
    filter::{
        Filter, Sources, bloom::requires_log_fetch, log_matches, trace_matches,
        transaction_matches, transfer_matches,
    },
    request_queue::RequestQueue,
    types::{CallTrace, LogEntry, ReceiptRecord, SyncBlock, TransactionData},
};

/// Fetches and pre-filters everything downstream requires for `block`.
pub(crate) async fn fetch_block_event_data<Q: RequestQueue>(
    queue: &Q,
    sources: &Sources,
    block: SyncBlock,
) -> Result<BlockWithEventData, SyncError> {
    let logs = fetch_logs(queue, sources, &block).await?;
    let traces = fetch_traces(queue, sources, &block).await?;

    // factory announcements are retained regardless of log-filter interest
    let factory_logs: Vec<LogEntry> = logs
        .iter()
        .filter(|log| sources.factories().iter().any(|factory| factory.matches_log(log)))
        .cloned()
        .collect();

    // weak pre-filter: factory references match as wildcards, producing a
    // superset of the records the strict pass will keep
    let logs: Vec<LogEntry> = logs
        .into_iter()
        .filter(|log| sources.log_filters().any(|filter| log_matches(filter, log, None)))
        .collect();

    let traces: Vec<CallTrace> = traces
        .into_iter()
        .filter(|t| {
            sources.filters().iter().any(|filter| match filter {
                Filter::Trace(f) => trace_matches(f, t, block.number, None),
                Filter::Transfer(f) => transfer_matches(f, t, block.number, None),
                _ => false,
            })
        })
        .collect();

    let mut required_hashes: HashSet<B256> = HashSet::new();
    required_hashes.extend(logs.iter().map(|log| log.transaction_hash));
    required_hashes.extend(factory_logs.iter().map(|log| log.transaction_hash));
    required_hashes.extend(traces.iter().map(|t| t.transaction_hash));

    let transactions: Vec<TransactionData> = block
        .transactions
        .iter()
        .filter(|tx| {
            required_hashes.contains(&tx.hash)
                || sources.filters().iter().any(|filter| match filter {
                    Filter::Transaction(f) => transaction_matches(f, tx, block.number, None),
                    _ => false,
                })
        })
        .cloned()
        .collect();

    let receipts = fetch_receipts(queue, sources, &block, &transactions).await?;

    trace!(
        block_number = block.number,
        logs = logs.len(),
        factory_logs = factory_logs.len(),
        traces = traces.len(),
        transactions = transactions.len(),
        receipts = receipts.len(),
        "fetched block event data"
    );

    Ok(BlockWithEventData { block, logs, factory_logs, traces, transactions, receipts })
}

async fn fetch_logs<Q: RequestQueue>(
    queue: &Q,
    sources: &Sources,
    block: &SyncBlock,
) -> Result<Vec<LogEntry>, SyncError> {
    if !requires_log_fetch(&block.logs_bloom, sources) {
        return Ok(vec![]);
    }

    let logs = queue.get_logs(block.hash).await?;

    // a non-zero bloom implies at least one log
    if !block.logs_bloom.is_zero() && logs.is_empty() {
        return Err(SyncError::InconsistentResponse(format!(
            "block {} has a non-zero logs bloom but eth_getLogs returned no logs",
            block.number
        )));
    }
    for log in &logs {
        if log.block_hash != block.hash {
            return Err(SyncError::InconsistentResponse(format!(
                "log {} of block {} carries block hash {}, expected {}",
                log.log_index, block.number, log.block_hash, block.hash
            )));
        }
    }

    Ok(logs)
}

async fn fetch_traces<Q: RequestQueue>(
    queue: &Q,
    sources: &Sources,
    block: &SyncBlock,
) -> Result<Vec<CallTrace>, SyncError> {
    if !sources.requires_traces() {
        return Ok(vec![]);
    }

    let traces = queue.trace_block(block.hash).await?;

    if !block.transactions.is_empty() && traces.is_empty() {
        return Err(SyncError::InconsistentResponse(format!(
            "block {} has {} transactions but the tracing RPC returned no frames",
            block.number,
            block.transactions.len()
        )));
    }
    let known: HashSet<B256> = block.transactions.iter().map(|tx| tx.hash).collect();
    for t in &traces {
        if !known.contains(&t.transaction_hash) {
            return Err(SyncError::InconsistentResponse(format!(
                "trace references transaction {} not present in block {}",
                t.transaction_hash, block.number
            )));
        }
    }

    Ok(traces)
}

/// Receipts are only needed where an `include_reverted == false` transaction
/// filter matched: the receipt status is what lets downstream drop reverted
/// transactions.
async fn fetch_receipts<Q: RequestQueue>(
    queue: &Q,
    sources: &Sources,
    block: &SyncBlock,
    transactions: &[TransactionData],
) -> Result<Vec<ReceiptRecord>, SyncError> {
    let strict_filters: Vec<_> = sources
        .filters()
        .iter()
        .filter_map(|filter| match filter {
            Filter::Transaction(f) if !f.include_reverted => Some(f),
            _ => None,
        })
        .collect();
    if strict_filters.is_empty() {
        return Ok(vec![]);
    }

    let mut receipts = Vec::new();
    for tx in transactions {
        let required = strict_filters
            .iter()
            .any(|filter| transaction_matches(filter, tx, block.number, None));
        if !required {
            continue;
        }
        let receipt = queue.get_transaction_receipt(tx.hash).await?;
        if receipt.transaction_hash != tx.hash {
            return Err(SyncError::InconsistentResponse(format!(
                "receipt carries transaction hash {}, expected {}",
                receipt.transaction_hash, tx.hash
            )));
        }
        receipts.push(receipt);
    }
    Ok(receipts)
}
