//! Factory discovery: child addresses feeding filters, surviving reorgs,
//! and migrating across finalization.

mod common;

use common::{log_in_block, setup_engine};
use headsync::{
    AddressSpec, ChildExtraction, EventData, Factory, Filter, LogFilter, Sources, SyncEvent,
    test_utils::{MockChain, block_at, block_hash, fork_block_at, light_at},
};
use headsync::assert_next_matches;

use alloy::primitives::{Address, B256};

const FACTORY_ADDRESS: Address = Address::repeat_byte(0xfa);
const CHILD: Address = Address::repeat_byte(0xc1);

fn factory() -> Factory {
    Factory {
        addresses: vec![FACTORY_ADDRESS],
        event_selector: B256::repeat_byte(0xab),
        child: ChildExtraction::Topic(1),
    }
}

fn child_log_sources() -> Sources {
    Sources::new(vec![Filter::Log(LogFilter {
        address: AddressSpec::Factory(factory()),
        ..LogFilter::new(1)
    })])
}

#[tokio::test]
async fn discovered_child_satisfies_log_filter() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let (mut engine, mut events) = setup_engine(&mock, child_log_sources(), 5, light_at(100));

    // block 101 announces the child
    let block_101 = block_at(101, block_hash(100, 0));
    let announcement = log_in_block(
        &block_101,
        FACTORY_ADDRESS,
        vec![B256::repeat_byte(0xab), CHILD.into_word()],
        0,
    );
    mock.insert_block(block_101.clone());
    mock.set_logs(block_101.hash, vec![announcement]);
    engine.process(block_101).await?;

    // the announcement itself is not a child log
    assert_next_matches!(
        events,
        Ok(SyncEvent::Block(event)) if event.events.is_empty()
    );
    assert!(engine.unfinalized_children(&factory()).unwrap().contains(&CHILD));

    // block 102 carries a log emitted by the child
    let block_102 = block_at(102, block_hash(101, 0));
    let child_log = log_in_block(&block_102, CHILD, vec![], 0);
    mock.insert_block(block_102.clone());
    mock.set_logs(block_102.hash, vec![child_log.clone()]);
    engine.process(block_102).await?;

    assert_next_matches!(
        events,
        Ok(SyncEvent::Block(event)) if event.events.len() == 1
            && matches!(&event.events[0].data, EventData::Log(log) if log == &child_log)
            && event.matched_sources.contains(&0)
    );

    Ok(())
}

#[tokio::test]
async fn finalization_promotes_child_addresses() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let (mut engine, _events) = setup_engine(&mock, child_log_sources(), 1, light_at(100));

    let block_101 = block_at(101, block_hash(100, 0));
    let announcement = log_in_block(
        &block_101,
        FACTORY_ADDRESS,
        vec![B256::repeat_byte(0xab), CHILD.into_word()],
        0,
    );
    mock.insert_block(block_101.clone());
    mock.set_logs(block_101.hash, vec![announcement]);
    engine.process(block_101).await?;

    for number in 102..=103 {
        let block = block_at(number, block_hash(number - 1, 0));
        mock.insert_block(block.clone());
        engine.process(block).await?;
    }

    // with finality depth 1 the announcing block is long finalized by 103
    assert!(engine.finalized_children(&factory()).unwrap().contains(&CHILD));
    let unfinalized = engine.unfinalized_children(&factory());
    assert!(unfinalized.is_none_or(|children| !children.contains(&CHILD)));

    // membership still satisfies the filter through the finalized tier
    let block_104 = block_at(104, block_hash(103, 0));
    let child_log = log_in_block(&block_104, CHILD, vec![], 0);
    mock.insert_block(block_104.clone());
    mock.set_logs(block_104.hash, vec![child_log]);
    engine.process(block_104).await?;

    Ok(())
}

#[tokio::test]
async fn reorg_evicts_child_discovered_in_reorged_block() -> anyhow::Result<()> {
    let mock = MockChain::new();
    let (mut engine, _events) = setup_engine(&mock, child_log_sources(), 5, light_at(100));

    let block_101 = block_at(101, block_hash(100, 0));
    let announcement = log_in_block(
        &block_101,
        FACTORY_ADDRESS,
        vec![B256::repeat_byte(0xab), CHILD.into_word()],
        0,
    );
    mock.insert_block(block_101.clone());
    mock.set_logs(block_101.hash, vec![announcement]);
    engine.process(block_101).await?;
    assert!(engine.unfinalized_children(&factory()).unwrap().contains(&CHILD));

    // the announcing block reorgs away; the replacement has no announcement
    let block_101b = fork_block_at(101, block_hash(100, 0), 1);
    mock.reorg_to(vec![block_101b.clone()]);
    engine.process(block_101b.clone()).await?;
    engine.process(block_101b).await?;

    let children = engine.unfinalized_children(&factory());
    assert!(children.is_none_or(|children| !children.contains(&CHILD)));

    Ok(())
}
