//! Conservative logs-bloom probes.
//!
//! Used only to skip `eth_getLogs` calls for blocks that cannot contain a
//! matching log. False positives are fine, false negatives are forbidden:
//! every probe errs on the side of "may contain".

use alloy::primitives::{Bloom, BloomInput};

use crate::filter::{AddressSpec, Factory, LogFilter, Sources, TopicSpec};

/// Whether a block with this bloom could contain a log matching `filter`.
///
/// Probes every fully specified dimension (addresses and topics) with the
/// yellow-paper three-bit scheme; a single dimension with no hit rules the
/// block out. Factory-referenced addresses are not probed, as the child set
/// is dynamic.
#[must_use]
pub fn log_filter_in_bloom(bloom: &Bloom, filter: &LogFilter) -> bool {
    let address_hit = match &filter.address {
        AddressSpec::Any | AddressSpec::Factory(_) => true,
        AddressSpec::Single(address) => bloom.contains_input(BloomInput::Raw(address.as_slice())),
        AddressSpec::Many(addresses) => addresses
            .iter()
            .any(|address| bloom.contains_input(BloomInput::Raw(address.as_slice()))),
    };
    if !address_hit {
        return false;
    }

    filter.topics.iter().all(|spec| match spec {
        TopicSpec::Any => true,
        TopicSpec::Single(topic) => bloom.contains_input(BloomInput::Raw(topic.as_slice())),
        TopicSpec::Many(topics) => topics
            .iter()
            .any(|topic| bloom.contains_input(BloomInput::Raw(topic.as_slice()))),
    })
}

/// Whether a block with this bloom could contain an announcement log of
/// `factory`.
#[must_use]
pub fn factory_in_bloom(bloom: &Bloom, factory: &Factory) -> bool {
    factory
        .addresses
        .iter()
        .any(|address| bloom.contains_input(BloomInput::Raw(address.as_slice())))
        && bloom.contains_input(BloomInput::Raw(factory.event_selector.as_slice()))
}

/// Whether the fetcher must issue `eth_getLogs` for a block with this bloom.
///
/// An all-zero bloom forces the fetch: some chains report a zero bloom for
/// empty-or-unknown, so the probe result cannot be trusted.
#[must_use]
pub(crate) fn requires_log_fetch(bloom: &Bloom, sources: &Sources) -> bool {
    if !sources.requires_logs() {
        return false;
    }
    if bloom.is_zero() {
        return true;
    }
    sources.log_filters().any(|filter| log_filter_in_bloom(bloom, filter))
        || sources.factories().iter().any(|factory| factory_in_bloom(bloom, factory))
}
