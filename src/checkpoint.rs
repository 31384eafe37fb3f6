//! Total-order checkpoint keys for emitted events.
//!
//! A checkpoint orders every event across all chains by
//! `(block_timestamp, chain_id, block_number, transaction_index, event_kind,
//! event_index)`, in decreasing significance. The derived `Ord` on the struct
//! follows field order, and [`Checkpoint::encode`] produces a fixed-width
//! zero-padded decimal string with the same ordering, so encoded checkpoints
//! sort lexicographically.

use std::fmt;

/// Sentinel `transaction_index` used by block-level events so they sort after
/// every transaction-scoped event of the same block.
///
/// Sixteen decimal nines, the largest value the encoded field can carry.
pub const TRANSACTION_INDEX_MAX: u64 = 9_999_999_999_999_999;

/// The kind of record an event was built from.
///
/// The discriminant doubles as the ordering rank within one transaction:
/// `block < transaction < log < trace < transfer`. Transfers get their own
/// rank so a call frame matched by both a trace filter and a transfer filter
/// still yields two distinct checkpoints.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum EventKind {
    Block = 0,
    Transaction = 1,
    Log = 2,
    Trace = 3,
    Transfer = 4,
}

impl EventKind {
    #[must_use]
    pub const fn rank(self) -> u8 {
        self as u8
    }
}

/// A total-order key over all events emitted by a pipeline.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Checkpoint {
    pub block_timestamp: u64,
    pub chain_id: u64,
    pub block_number: u64,
    pub transaction_index: u64,
    pub event_kind: EventKind,
    pub event_index: u64,
}

impl Checkpoint {
    /// Encodes the checkpoint to a 75-character, lexicographically sortable
    /// string: 10 digits of timestamp, then 16 digits each for chain id,
    /// block number and transaction index, one digit of event-kind rank, and
    /// 16 digits of event index.
    #[must_use]
    pub fn encode(&self) -> String {
        format!(
            "{:010}{:016}{:016}{:016}{}{:016}",
            self.block_timestamp,
            self.chain_id,
            self.block_number,
            self.transaction_index,
            self.event_kind.rank(),
            self.event_index,
        )
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encode())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checkpoint(
        timestamp: u64,
        block_number: u64,
        transaction_index: u64,
        event_kind: EventKind,
        event_index: u64,
    ) -> Checkpoint {
        Checkpoint {
            block_timestamp: timestamp,
            chain_id: 1,
            block_number,
            transaction_index,
            event_kind,
            event_index,
        }
    }

    #[test]
    fn encoded_length_is_fixed() {
        let cp = checkpoint(1_700_000_000, 19_000_000, 42, EventKind::Log, 7);
        assert_eq!(cp.encode().len(), 75);
    }

    #[test]
    fn struct_order_matches_encoded_order() {
        let cases = [
            checkpoint(100, 1, 0, EventKind::Block, 0),
            checkpoint(100, 1, 0, EventKind::Transaction, 0),
            checkpoint(100, 1, 0, EventKind::Log, 0),
            checkpoint(100, 1, 0, EventKind::Log, 1),
            checkpoint(100, 1, 0, EventKind::Trace, 0),
            checkpoint(100, 1, 0, EventKind::Transfer, 0),
            checkpoint(100, 1, 1, EventKind::Log, 0),
            checkpoint(100, 1, TRANSACTION_INDEX_MAX, EventKind::Block, 0),
            checkpoint(100, 2, 0, EventKind::Block, 0),
            checkpoint(101, 1, 0, EventKind::Block, 0),
        ];

        for pair in cases.windows(2) {
            assert!(pair[0] < pair[1], "{:?} should sort before {:?}", pair[0], pair[1]);
            assert!(
                pair[0].encode() < pair[1].encode(),
                "encoded {} should sort before {}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn chain_id_outranks_block_number() {
        let a = Checkpoint {
            block_timestamp: 100,
            chain_id: 1,
            block_number: 9_999_999,
            transaction_index: 0,
            event_kind: EventKind::Log,
            event_index: 0,
        };
        let b = Checkpoint { chain_id: 2, block_number: 1, ..a };
        assert!(a < b);
        assert!(a.encode() < b.encode());
    }

    #[test]
    fn block_sentinel_sorts_after_transactions() {
        let log = checkpoint(100, 5, 3, EventKind::Log, 12);
        let block = checkpoint(100, 5, TRANSACTION_INDEX_MAX, EventKind::Block, 0);
        assert!(log < block);
    }
}
