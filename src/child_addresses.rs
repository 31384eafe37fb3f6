//! Two-tier tracking of factory-discovered child contract addresses.
//!
//! Children decoded from factory logs in unfinalized blocks live in the
//! `unfinalized` tier and are recomputed wholesale whenever the unfinalized
//! block list changes shape (reorg rewind, finalization promotion). Child
//! derivation is block-local and cheap, so full recomputation replaces the
//! incremental reverse-deltas that would otherwise have to handle a child
//! appearing in two sibling blocks.

use std::collections::{HashMap, HashSet};

use alloy::primitives::{Address, B256};
use tracing::debug;

use crate::{
    filter::Factory,
    types::{LightBlock, LogEntry},
};

/// Finalized and unfinalized child-address sets per factory, plus the cached
/// factory logs of every unfinalized block.
#[derive(Clone, Debug, Default)]
pub struct ChildAddressTracker {
    /// Grows monotonically within a run; cleared only by [`reset`](Self::reset).
    finalized: HashMap<Factory, HashSet<Address>>,
    /// Exactly the children derivable from factory logs of blocks currently
    /// in the unfinalized list.
    unfinalized: HashMap<Factory, HashSet<Address>>,
    /// Factory logs per unfinalized block hash, kept so the unfinalized tier
    /// can be recomputed after rewinds and promotions.
    factory_logs: HashMap<B256, Vec<LogEntry>>,
}

impl ChildAddressTracker {
    /// Records the factory logs of a freshly ingested block and folds its
    /// children into the unfinalized tier.
    pub fn ingest_block(&mut self, block_hash: B256, logs: Vec<LogEntry>, factories: &[Factory]) {
        for factory in factories {
            let children = self.unfinalized.entry(factory.clone()).or_default();
            collect_children(factory, &logs, children);
        }
        self.factory_logs.insert(block_hash, logs);
    }

    /// Promotes the children of `promoted` blocks into the finalized tier,
    /// drops their cached logs, and recomputes the unfinalized tier from the
    /// blocks that remain unfinalized.
    pub fn finalize(
        &mut self,
        promoted: &[LightBlock],
        remaining: &[LightBlock],
        factories: &[Factory],
    ) {
        for block in promoted {
            let Some(logs) = self.factory_logs.remove(&block.hash) else {
                continue;
            };
            for factory in factories {
                let children = self.finalized.entry(factory.clone()).or_default();
                collect_children(factory, &logs, children);
            }
        }
        self.recompute_unfinalized(remaining, factories);
    }

    /// Drops the cached logs of reorged blocks and recomputes the unfinalized
    /// tier from the surviving blocks.
    pub fn rewind(
        &mut self,
        removed: &[LightBlock],
        remaining: &[LightBlock],
        factories: &[Factory],
    ) {
        for block in removed {
            self.factory_logs.remove(&block.hash);
        }
        self.recompute_unfinalized(remaining, factories);
    }

    /// Whether `address` is a known child of `factory`, in either tier.
    #[must_use]
    pub fn contains(&self, factory: &Factory, address: &Address) -> bool {
        self.finalized.get(factory).is_some_and(|set| set.contains(address))
            || self.unfinalized.get(factory).is_some_and(|set| set.contains(address))
    }

    #[must_use]
    pub fn finalized_children(&self, factory: &Factory) -> Option<&HashSet<Address>> {
        self.finalized.get(factory)
    }

    #[must_use]
    pub fn unfinalized_children(&self, factory: &Factory) -> Option<&HashSet<Address>> {
        self.unfinalized.get(factory)
    }

    /// Drops all state, both tiers included.
    pub fn reset(&mut self) {
        self.finalized.clear();
        self.unfinalized.clear();
        self.factory_logs.clear();
    }

    fn recompute_unfinalized(&mut self, remaining: &[LightBlock], factories: &[Factory]) {
        self.unfinalized.clear();
        for factory in factories {
            let children = self.unfinalized.entry(factory.clone()).or_default();
            for block in remaining {
                if let Some(logs) = self.factory_logs.get(&block.hash) {
                    collect_children(factory, logs, children);
                }
            }
        }
    }
}

fn collect_children(factory: &Factory, logs: &[LogEntry], children: &mut HashSet<Address>) {
    for log in logs.iter().filter(|log| factory.matches_log(log)) {
        match factory.extract_child(log) {
            Some(child) => {
                children.insert(child);
            }
            None => {
                // malformed announcement, expected occasionally on factory
                // selectors shared with unrelated events
                debug!(
                    block_number = log.block_number,
                    log_index = log.log_index,
                    "failed to decode child address from factory log, skipping"
                );
            }
        }
    }
}
