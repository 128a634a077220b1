//! Copying specialized nodes into a new tree.
//!
//! A copy replays the source's chain: same rules in the same order, with the
//! cached values deep-copied so the two trees share no mutable state. Slots of
//! a shared group are the exception and keep pointing at the same value, since
//! the copy joins the source's shared groups.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::ReentrantMutex;

use crate::chain::{CacheEntry, Chain, EntryKind};
use crate::node::SpecializedNode;
use crate::value::Value;

impl SpecializedNode {
    /// Copy this node and its subtree. The copy has no root until adopted.
    pub fn deep_copy(&self) -> SpecializedNode {
        let current = self.chain.load_full();
        let entries = current
            .entries
            .iter()
            .map(|entry| Arc::new(self.copy_entry(entry)))
            .collect();
        let chain = Chain {
            entries,
            inline: current
                .inline
                .iter()
                .map(|value| value.as_ref().map(Value::deep_copy))
                .collect(),
            excluded: current.excluded.clone(),
            superseded: current.superseded.clone(),
            collapsed: current.collapsed,
            cost: current.cost,
        };

        tracing::debug!(
            target: crate::LOG_TARGET,
            node = %self.kind.name,
            activations = chain.entries.len(),
            "copied node"
        );

        SpecializedNode {
            kind: Arc::clone(&self.kind),
            mode: self.mode,
            children: self.children.iter().map(|child| child.deep_copy()).collect(),
            chain: ArcSwap::from_pointee(chain),
            lock: ReentrantMutex::new(()),
            shared: Arc::clone(&self.shared),
            parent: ArcSwapOption::empty(),
        }
    }

    fn copy_entry(&self, entry: &CacheEntry) -> CacheEntry {
        match &entry.kind {
            EntryKind::Generic => CacheEntry::generic(),
            EntryKind::Activation { rule, values } => {
                let slots = &self.kind.rule(*rule).slots;
                let values = values
                    .iter()
                    .zip(slots)
                    .map(|(value, slot)| match slot.shared {
                        Some(_) => value.clone(),
                        None => value.deep_copy(),
                    })
                    .collect();
                CacheEntry::activation(*rule, values)
            }
        }
    }
}
