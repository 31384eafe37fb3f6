//! User-declared event filters.
//!
//! Filters are disjoint tagged variants dispatched by tag, never by virtual
//! call; the matching functions in [`matcher`] are pure and take the filter
//! and the candidate record by reference. Factory references turn a filter's
//! address constraint into a dynamic set of discovered child contracts,
//! resolved against the [`ChildAddressTracker`](crate::ChildAddressTracker).

use alloy::primitives::{Address, B256, Selector};

use crate::types::{CallType, LogEntry};

pub(crate) mod bloom;
pub(crate) mod matcher;

pub use bloom::{factory_in_bloom, log_filter_in_bloom};
pub use matcher::{
    block_matches, log_matches, trace_matches, transaction_matches, transfer_matches,
};

/// An address constraint on a filter.
///
/// `Any` matches every address. An empty `Many` list matches nothing.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum AddressSpec {
    #[default]
    Any,
    Single(Address),
    Many(Vec<Address>),
    /// Match any child contract discovered from the referenced factory.
    Factory(Factory),
}

impl AddressSpec {
    /// The referenced factory, if this constraint is a factory reference.
    #[must_use]
    pub fn factory(&self) -> Option<&Factory> {
        match self {
            AddressSpec::Factory(factory) => Some(factory),
            _ => None,
        }
    }
}

/// A topic constraint on a log filter.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub enum TopicSpec {
    #[default]
    Any,
    Single(B256),
    Many(Vec<B256>),
}

/// How to decode a child contract address out of a factory log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChildExtraction {
    /// The child address is the last 20 bytes of the indexed topic at this
    /// position (1..=3; topic 0 is the event selector).
    Topic(usize),
    /// The child address is the last 20 bytes of the 32-byte word starting at
    /// this byte offset within the log data.
    DataOffset(usize),
}

/// A contract (or set of contracts) whose logs announce newly created child
/// contracts.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Factory {
    pub addresses: Vec<Address>,
    /// `topic0` of the announcement event.
    pub event_selector: B256,
    pub child: ChildExtraction,
}

impl Factory {
    /// Whether `log` is an announcement log of this factory: emitted by one
    /// of the factory addresses with the factory's event selector.
    #[must_use]
    pub fn matches_log(&self, log: &LogEntry) -> bool {
        self.addresses.contains(&log.address) && log.topic0() == Some(&self.event_selector)
    }

    /// Decodes the child address announced by `log`, if the log is well
    /// formed for this factory's extraction rule.
    #[must_use]
    pub fn extract_child(&self, log: &LogEntry) -> Option<Address> {
        match self.child {
            ChildExtraction::Topic(index) => {
                let topic = log.topics.get(index)?;
                Some(Address::from_slice(&topic[12..]))
            }
            ChildExtraction::DataOffset(offset) => {
                let word = log.data.get(offset..offset + 32)?;
                Some(Address::from_slice(&word[12..]))
            }
        }
    }
}

/// Matches logs by address and up to four topics.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogFilter {
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub address: AddressSpec,
    pub topics: [TopicSpec; 4],
}

impl LogFilter {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            from_block: None,
            to_block: None,
            address: AddressSpec::Any,
            topics: [const { TopicSpec::Any }; 4],
        }
    }
}

/// Matches transactions by sender and recipient.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionFilter {
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub from_address: AddressSpec,
    pub to_address: AddressSpec,
    /// When `false`, the fetcher retrieves receipts for matched transactions
    /// so downstream consumers can drop reverted ones. Ignored by the
    /// matching layer itself.
    pub include_reverted: bool,
}

impl TransactionFilter {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            from_block: None,
            to_block: None,
            from_address: AddressSpec::Any,
            to_address: AddressSpec::Any,
            include_reverted: true,
        }
    }
}

/// Matches call frames by participants, call type, and function selector.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TraceFilter {
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub from_address: AddressSpec,
    pub to_address: AddressSpec,
    /// `None` matches any call type.
    pub call_type: Option<CallType>,
    /// First four bytes of the call input.
    pub function_selector: Option<Selector>,
}

impl TraceFilter {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            from_block: None,
            to_block: None,
            from_address: AddressSpec::Any,
            to_address: AddressSpec::Any,
            call_type: None,
            function_selector: None,
        }
    }
}

/// Matches call frames that moved a non-zero value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransferFilter {
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    pub from_address: AddressSpec,
    pub to_address: AddressSpec,
}

impl TransferFilter {
    #[must_use]
    pub fn new(chain_id: u64) -> Self {
        Self {
            chain_id,
            from_block: None,
            to_block: None,
            from_address: AddressSpec::Any,
            to_address: AddressSpec::Any,
        }
    }
}

/// Matches every block where `(number - offset) % interval == 0`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BlockFilter {
    pub chain_id: u64,
    pub from_block: Option<u64>,
    pub to_block: Option<u64>,
    /// Positive block interval.
    pub interval: u64,
    /// Non-negative offset, less than `interval`.
    pub offset: u64,
}

impl BlockFilter {
    #[must_use]
    pub fn new(chain_id: u64, interval: u64) -> Self {
        Self { chain_id, from_block: None, to_block: None, interval, offset: 0 }
    }
}

/// A user-declared filter, one of five disjoint variants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Filter {
    Log(LogFilter),
    Transaction(TransactionFilter),
    Trace(TraceFilter),
    Transfer(TransferFilter),
    Block(BlockFilter),
}

impl Filter {
    #[must_use]
    pub fn chain_id(&self) -> u64 {
        match self {
            Filter::Log(f) => f.chain_id,
            Filter::Transaction(f) => f.chain_id,
            Filter::Trace(f) => f.chain_id,
            Filter::Transfer(f) => f.chain_id,
            Filter::Block(f) => f.chain_id,
        }
    }

    /// All factory references carried by this filter's address constraints.
    fn factories(&self) -> impl Iterator<Item = &Factory> {
        let (a, b) = match self {
            Filter::Log(f) => (f.address.factory(), None),
            Filter::Transaction(f) => (f.from_address.factory(), f.to_address.factory()),
            Filter::Trace(f) => (f.from_address.factory(), f.to_address.factory()),
            Filter::Transfer(f) => (f.from_address.factory(), f.to_address.factory()),
            Filter::Block(_) => (None, None),
        };
        a.into_iter().chain(b)
    }
}

/// The user's ordered filter list for one chain, with the factory references
/// collected up front.
///
/// The position of a filter in the list is its `source_index`, carried on
/// every emitted event.
#[derive(Clone, Debug, Default)]
pub struct Sources {
    filters: Vec<Filter>,
    factories: Vec<Factory>,
}

impl Sources {
    #[must_use]
    pub fn new(filters: Vec<Filter>) -> Self {
        let mut factories: Vec<Factory> = Vec::new();
        for filter in &filters {
            for factory in filter.factories() {
                if !factories.contains(factory) {
                    factories.push(factory.clone());
                }
            }
        }
        Self { filters, factories }
    }

    #[must_use]
    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    /// Deduplicated factory references across all filters.
    #[must_use]
    pub fn factories(&self) -> &[Factory] {
        &self.factories
    }

    /// Whether any filter requires the tracing RPC.
    #[must_use]
    pub fn requires_traces(&self) -> bool {
        self.filters.iter().any(|f| matches!(f, Filter::Trace(_) | Filter::Transfer(_)))
    }

    /// Whether any filter or factory is interested in logs at all.
    #[must_use]
    pub fn requires_logs(&self) -> bool {
        !self.factories.is_empty() || self.filters.iter().any(|f| matches!(f, Filter::Log(_)))
    }

    pub(crate) fn log_filters(&self) -> impl Iterator<Item = &LogFilter> {
        self.filters.iter().filter_map(|f| match f {
            Filter::Log(log) => Some(log),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Bytes, b256};

    fn factory(selector_byte: u8) -> Factory {
        Factory {
            addresses: vec![Address::repeat_byte(0xfa)],
            event_selector: B256::repeat_byte(selector_byte),
            child: ChildExtraction::Topic(1),
        }
    }

    fn factory_log(address: Address, topics: Vec<B256>, data: Bytes) -> LogEntry {
        LogEntry {
            address,
            topics,
            data,
            block_hash: B256::repeat_byte(0x01),
            block_number: 1,
            transaction_hash: B256::repeat_byte(0x02),
            transaction_index: 0,
            log_index: 0,
        }
    }

    #[test]
    fn factory_matches_own_announcement() {
        let f = factory(0xab);
        let child = Address::repeat_byte(0xc1);
        let log = factory_log(
            Address::repeat_byte(0xfa),
            vec![B256::repeat_byte(0xab), child.into_word()],
            Bytes::new(),
        );

        assert!(f.matches_log(&log));
        assert_eq!(f.extract_child(&log), Some(child));
    }

    #[test]
    fn factory_rejects_foreign_address_and_selector() {
        let f = factory(0xab);
        let log = factory_log(
            Address::repeat_byte(0x99),
            vec![B256::repeat_byte(0xab)],
            Bytes::new(),
        );
        assert!(!f.matches_log(&log));

        let log = factory_log(
            Address::repeat_byte(0xfa),
            vec![B256::repeat_byte(0xcd)],
            Bytes::new(),
        );
        assert!(!f.matches_log(&log));
    }

    #[test]
    fn extract_child_from_data_offset() {
        let child = Address::repeat_byte(0xc1);
        let f = Factory {
            addresses: vec![Address::repeat_byte(0xfa)],
            event_selector: b256!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"),
            child: ChildExtraction::DataOffset(32),
        };

        let mut data = vec![0u8; 64];
        data[32 + 12..].copy_from_slice(child.as_slice());
        let log = factory_log(Address::repeat_byte(0xfa), vec![f.event_selector], data.into());

        assert_eq!(f.extract_child(&log), Some(child));
    }

    #[test]
    fn extract_child_out_of_bounds_is_none() {
        let f = Factory {
            addresses: vec![Address::repeat_byte(0xfa)],
            event_selector: B256::repeat_byte(0xab),
            child: ChildExtraction::DataOffset(32),
        };
        let log = factory_log(
            Address::repeat_byte(0xfa),
            vec![B256::repeat_byte(0xab)],
            vec![0u8; 16].into(),
        );
        assert_eq!(f.extract_child(&log), None);

        let f = Factory { child: ChildExtraction::Topic(2), ..f };
        assert_eq!(f.extract_child(&log), None);
    }

    #[test]
    fn sources_collect_factories_without_duplicates() {
        let shared = factory(0xab);
        let log_filter = LogFilter {
            address: AddressSpec::Factory(shared.clone()),
            ..LogFilter::new(1)
        };
        let tx_filter = TransactionFilter {
            from_address: AddressSpec::Factory(shared.clone()),
            to_address: AddressSpec::Factory(factory(0xcd)),
            ..TransactionFilter::new(1)
        };

        let sources =
            Sources::new(vec![Filter::Log(log_filter), Filter::Transaction(tx_filter)]);

        assert_eq!(sources.factories().len(), 2);
        assert!(sources.requires_logs());
        assert!(!sources.requires_traces());
    }
}
