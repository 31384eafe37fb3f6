//! RPC-response validation and bloom-gated fetching.

mod common;

use common::{log_in_block, setup_engine};
use headsync::{
    AddressSpec, Filter, LogFilter, Sources, SyncError, TraceFilter, TransactionFilter,
    test_utils::{MockChain, block_at, block_hash, light_at},
};
use headsync::{CallTrace, CallType, ReceiptRecord, TransactionData};

use alloy::primitives::{Address, B256, BloomInput, Bytes, U256};

fn transaction(hash: B256, from: Address) -> TransactionData {
    TransactionData {
        hash,
        transaction_index: 0,
        from,
        to: Some(Address::repeat_byte(0x22)),
        input: Bytes::new(),
        value: U256::ZERO,
    }
}

#[tokio::test]
async fn log_with_foreign_block_hash_is_inconsistent() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let sources = Sources::new(vec![Filter::Log(LogFilter::new(1))]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    let block = block_at(101, block_hash(100, 0));
    let mut log = log_in_block(&block, Address::repeat_byte(0xaa), vec![], 0);
    log.block_hash = B256::repeat_byte(0xee);
    mock.insert_block(block.clone());
    mock.set_logs(block.hash, vec![log]);

    let result = engine.process(block).await;
    assert!(matches!(result, Err(SyncError::InconsistentResponse(_))));

    Ok(())
}

#[tokio::test]
async fn nonzero_bloom_with_empty_logs_is_inconsistent() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let watched = Address::repeat_byte(0xaa);
    let sources = Sources::new(vec![Filter::Log(LogFilter {
        address: AddressSpec::Single(watched),
        ..LogFilter::new(1)
    })]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    let mut block = block_at(101, block_hash(100, 0));
    block.logs_bloom.accrue(BloomInput::Raw(watched.as_slice()));
    mock.insert_block(block.clone());
    // no logs registered for the block

    let result = engine.process(block).await;
    assert!(matches!(result, Err(SyncError::InconsistentResponse(_))));

    Ok(())
}

#[tokio::test]
async fn bloom_miss_skips_the_log_fetch() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let watched = Address::repeat_byte(0xaa);
    let sources = Sources::new(vec![Filter::Log(LogFilter {
        address: AddressSpec::Single(watched),
        ..LogFilter::new(1)
    })]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    // the bloom is non-zero but does not contain the watched address
    let mut block = block_at(101, block_hash(100, 0));
    block.logs_bloom.accrue(BloomInput::Raw(Address::repeat_byte(0xbb).as_slice()));
    mock.insert_block(block.clone());

    engine.process(block).await?;
    assert_eq!(mock.calls("get_logs"), 0);

    Ok(())
}

#[tokio::test]
async fn traces_missing_for_nonempty_block_is_inconsistent() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let sources = Sources::new(vec![Filter::Trace(TraceFilter::new(1))]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    let mut block = block_at(101, block_hash(100, 0));
    block.transactions.push(transaction(B256::repeat_byte(0x31), Address::repeat_byte(0x11)));
    mock.insert_block(block.clone());
    // no traces registered for the block

    let result = engine.process(block).await;
    assert!(matches!(result, Err(SyncError::InconsistentResponse(_))));

    Ok(())
}

#[tokio::test]
async fn trace_referencing_unknown_transaction_is_inconsistent() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let sources = Sources::new(vec![Filter::Trace(TraceFilter::new(1))]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    let mut block = block_at(101, block_hash(100, 0));
    block.transactions.push(transaction(B256::repeat_byte(0x31), Address::repeat_byte(0x11)));
    mock.insert_block(block.clone());
    mock.set_traces(
        block.hash,
        vec![CallTrace {
            call_type: CallType::Call,
            from: Address::repeat_byte(0x11),
            to: None,
            input: Bytes::new(),
            value: None,
            // not a transaction of this block
            transaction_hash: B256::repeat_byte(0x99),
            transaction_index: 0,
            trace_index: 0,
        }],
    );

    let result = engine.process(block).await;
    assert!(matches!(result, Err(SyncError::InconsistentResponse(_))));

    Ok(())
}

#[tokio::test]
async fn receipts_are_fetched_for_strict_transaction_filters() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let sender = Address::repeat_byte(0x11);
    let sources = Sources::new(vec![Filter::Transaction(TransactionFilter {
        from_address: AddressSpec::Single(sender),
        include_reverted: false,
        ..TransactionFilter::new(1)
    })]);
    let (mut engine, mut events) = setup_engine(&mock, sources, 5, light_at(100));

    let tx_hash = B256::repeat_byte(0x31);
    let mut block = block_at(101, block_hash(100, 0));
    block.transactions.push(transaction(tx_hash, sender));
    // an unrelated transaction needs no receipt
    block.transactions.push(transaction(B256::repeat_byte(0x32), Address::repeat_byte(0x99)));
    mock.insert_block(block.clone());
    mock.set_receipt(ReceiptRecord { transaction_hash: tx_hash, status: false });

    engine.process(block).await?;

    assert_eq!(mock.calls("get_transaction_receipt"), 1);
    headsync::assert_next_matches!(
        events,
        Ok(headsync::SyncEvent::Block(event)) if event.receipts
            == vec![ReceiptRecord { transaction_hash: tx_hash, status: false }]
    );

    Ok(())
}

#[tokio::test]
async fn receipts_are_skipped_when_reverted_are_included() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let sender = Address::repeat_byte(0x11);
    let sources = Sources::new(vec![Filter::Transaction(TransactionFilter {
        from_address: AddressSpec::Single(sender),
        include_reverted: true,
        ..TransactionFilter::new(1)
    })]);
    let (mut engine, _events) = setup_engine(&mock, sources, 5, light_at(100));

    let mut block = block_at(101, block_hash(100, 0));
    block.transactions.push(transaction(B256::repeat_byte(0x31), sender));
    mock.insert_block(block.clone());

    engine.process(block).await?;
    assert_eq!(mock.calls("get_transaction_receipt"), 0);

    Ok(())
}
