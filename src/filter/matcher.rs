//! Pure per-record filter predicates.
//!
//! Every function here is side-effect free. Factory-referenced address
//! constraints are resolved through an optional [`ChildAddressTracker`]:
//! passing `None` treats factory references as wildcards (the fetcher's weak
//! pre-filter), passing `Some` checks real child-set membership.

use alloy::primitives::{Address, B256};

use crate::{
    child_addresses::ChildAddressTracker,
    filter::{
        AddressSpec, BlockFilter, LogFilter, TopicSpec, TraceFilter, TransactionFilter,
        TransferFilter,
    },
    types::{CallTrace, LogEntry, TransactionData},
};

/// Inclusive at both ends; an absent bound defaults to 0 / +inf.
fn in_range(from_block: Option<u64>, to_block: Option<u64>, number: u64) -> bool {
    from_block.is_none_or(|from| number >= from) && to_block.is_none_or(|to| number <= to)
}

/// A missing candidate never matches a non-`Any` constraint. An empty `Many`
/// list matches nothing.
fn address_matches(
    spec: &AddressSpec,
    candidate: Option<Address>,
    children: Option<&ChildAddressTracker>,
) -> bool {
    match spec {
        AddressSpec::Any => true,
        AddressSpec::Single(address) => candidate == Some(*address),
        AddressSpec::Many(addresses) => {
            candidate.is_some_and(|address| addresses.contains(&address))
        }
        AddressSpec::Factory(factory) => match children {
            // weak pre-filter: factory references match as wildcards
            None => true,
            Some(tracker) => {
                candidate.is_some_and(|address| tracker.contains(factory, &address))
            }
        },
    }
}

fn topic_matches(spec: &TopicSpec, topic: Option<&B256>) -> bool {
    match spec {
        TopicSpec::Any => true,
        TopicSpec::Single(expected) => topic == Some(expected),
        TopicSpec::Many(expected) => topic.is_some_and(|t| expected.contains(t)),
    }
}

/// Whether `log` satisfies `filter`.
#[must_use]
pub fn log_matches(
    filter: &LogFilter,
    log: &LogEntry,
    children: Option<&ChildAddressTracker>,
) -> bool {
    in_range(filter.from_block, filter.to_block, log.block_number)
        && address_matches(&filter.address, Some(log.address), children)
        && filter
            .topics
            .iter()
            .enumerate()
            .all(|(i, spec)| topic_matches(spec, log.topics.get(i)))
}

/// Whether `transaction` satisfies `filter`.
///
/// A contract creation (`to == None`) fails any non-`Any` `to_address`
/// constraint.
#[must_use]
pub fn transaction_matches(
    filter: &TransactionFilter,
    transaction: &TransactionData,
    block_number: u64,
    children: Option<&ChildAddressTracker>,
) -> bool {
    in_range(filter.from_block, filter.to_block, block_number)
        && address_matches(&filter.from_address, Some(transaction.from), children)
        && address_matches(&filter.to_address, transaction.to, children)
}

/// Whether `trace` satisfies `filter`.
#[must_use]
pub fn trace_matches(
    filter: &TraceFilter,
    trace: &CallTrace,
    block_number: u64,
    children: Option<&ChildAddressTracker>,
) -> bool {
    in_range(filter.from_block, filter.to_block, block_number)
        && address_matches(&filter.from_address, Some(trace.from), children)
        && address_matches(&filter.to_address, trace.to, children)
        && filter.call_type.is_none_or(|call_type| call_type == trace.call_type)
        && filter.function_selector.is_none_or(|selector| {
            trace.input.len() >= 4 && trace.input[..4] == selector[..]
        })
}

/// Whether `trace` satisfies `filter` as a value transfer: the frame must
/// carry a present, non-zero value.
#[must_use]
pub fn transfer_matches(
    filter: &TransferFilter,
    trace: &CallTrace,
    block_number: u64,
    children: Option<&ChildAddressTracker>,
) -> bool {
    in_range(filter.from_block, filter.to_block, block_number)
        && trace.value.is_some_and(|value| !value.is_zero())
        && address_matches(&filter.from_address, Some(trace.from), children)
        && address_matches(&filter.to_address, trace.to, children)
}

/// Whether the block at `number` satisfies `filter`.
#[must_use]
pub fn block_matches(filter: &BlockFilter, number: u64) -> bool {
    in_range(filter.from_block, filter.to_block, number)
        && number
            .checked_sub(filter.offset)
            .is_some_and(|delta| filter.interval > 0 && delta % filter.interval == 0)
}
