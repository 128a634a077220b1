//! The inline cache of one node: an ordered list of activations.
//!
//! A [`Chain`] is an immutable snapshot. The specializer builds a modified copy
//! under the node's lock and publishes it in one atomic store, so a reader sees
//! either the previous chain or the complete new one.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;

use crate::cost::NodeCost;
use crate::error::Result;
use crate::value::{Shape, Value};

/// One concrete activation, or the generic fallback installed on collapse.
pub(crate) struct CacheEntry {
    pub kind: EntryKind,
    hits: AtomicU64,
}

pub(crate) enum EntryKind {
    Activation {
        rule: usize,
        /// Slot values by slot index; inline slots hold `Null` here.
        values: Box<[Value]>,
    },
    Generic,
}

impl CacheEntry {
    pub fn activation(rule: usize, values: Vec<Value>) -> Self {
        Self {
            kind: EntryKind::Activation {
                rule,
                values: values.into_boxed_slice(),
            },
            hits: AtomicU64::new(0),
        }
    }

    pub fn generic() -> Self {
        Self {
            kind: EntryKind::Generic,
            hits: AtomicU64::new(0),
        }
    }

    pub fn rule(&self) -> Option<usize> {
        match &self.kind {
            EntryKind::Activation { rule, .. } => Some(*rule),
            EntryKind::Generic => None,
        }
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }
}

#[derive(Clone, Default)]
pub(crate) struct Chain {
    pub entries: Vec<Arc<CacheEntry>>,
    /// Values of slots declared `inline`, indexed by inline slot.
    pub inline: Vec<Option<Value>>,
    /// Rules that may not be activated again for one argument shape, after an
    /// activation raised a condition on it. Installed siblings are unaffected.
    pub excluded: HashSet<(usize, Shape)>,
    /// Rules removed for good by a replacing activation.
    pub superseded: HashSet<usize>,
    pub collapsed: bool,
    pub cost: NodeCost,
}

impl Chain {
    pub fn empty(inline_slots: usize) -> Self {
        Self {
            inline: vec![None; inline_slots],
            ..Self::default()
        }
    }

    pub fn instances_of(&self, rule: usize) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.rule() == Some(rule))
            .count()
    }

    /// Whether the specializer may not create a new activation of `rule` for `shape`.
    pub fn is_excluded(&self, rule: usize, shape: &Shape) -> bool {
        self.superseded.contains(&rule) || self.excluded.contains(&(rule, shape.clone()))
    }

    /// Insert after every entry of a rule declared no later than `entry`'s.
    pub fn insert_ordered(&mut self, entry: Arc<CacheEntry>) {
        let rule = entry.rule().unwrap_or(usize::MAX);
        let position = self
            .entries
            .iter()
            .position(|existing| existing.rule().unwrap_or(usize::MAX) > rule)
            .unwrap_or(self.entries.len());
        self.entries.insert(position, entry);
    }

    /// Drop every entry of the given rules and keep them from coming back.
    /// Returns how many entries were removed.
    pub fn supersede(&mut self, rules: &[usize]) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|entry| entry.rule().map_or(true, |rule| !rules.contains(&rule)));
        self.superseded.extend(rules.iter().copied());
        before - self.entries.len()
    }

    /// Replace everything with a single generic entry. Permanent.
    pub fn collapse(&mut self) -> Arc<CacheEntry> {
        let generic = Arc::new(CacheEntry::generic());
        self.entries = vec![Arc::clone(&generic)];
        self.inline.iter_mut().for_each(|slot| *slot = None);
        self.collapsed = true;
        generic
    }

    /// Recompute the cost after a mutation, relative to `previous`.
    pub fn settle_cost(&mut self, previous: NodeCost) {
        self.cost = NodeCost::advance(previous, self.entries.len(), self.collapsed);
    }
}

/// Cells backing cached slots declared `shared`, by group name.
///
/// One `SharedGroups` is owned jointly by a node, its clones and any sibling
/// created to share with it; each group is initialized at most once.
#[derive(Default)]
pub struct SharedGroups {
    cells: DashMap<String, Arc<OnceCell<Value>>>,
}

impl SharedGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn get_or_init(
        &self,
        group: &str,
        init: impl FnOnce() -> Result<Value>,
    ) -> Result<Value> {
        let cell = Arc::clone(
            self.cells
                .entry(group.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .value(),
        );
        cell.get_or_try_init(init).cloned()
    }

    pub fn get(&self, group: &str) -> Option<Value> {
        self.cells
            .get(group)
            .and_then(|cell| cell.value().get().cloned())
    }

    pub fn is_initialized(&self, group: &str) -> bool {
        self.get(group).is_some()
    }
}
