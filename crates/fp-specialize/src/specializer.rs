//! The slow path: create, replace and collapse activations.
//!
//! All chain mutation happens here, under the node's lock. A modified copy of
//! the chain is built and then published in one store; rule bodies always run
//! after the lock is released.

use std::sync::Arc;

use crate::chain::{CacheEntry, Chain};
use crate::cost::NodeCost;
use crate::dispatch::{self, Hit};
use crate::error::{Condition, Error, Result};
use crate::guard::CachedView;
use crate::node::SpecializedNode;
use crate::rule::{CallSite, CompiledRule, EntryOutcome, SlotLocation};
use crate::value::{Shape, Value};

/// Find or create the activation for `args` and run it, retrying after every
/// exclusion raised by a body.
pub(crate) fn specialize(node: &SpecializedNode, site: CallSite<'_>, args: &[Value]) -> Result<Value> {
    loop {
        let (chain, hit) = {
            let _guard = node.lock.lock();
            let current = node.chain.load_full();
            // Another thread may have installed a matching entry while we waited.
            match dispatch::find_entry(&node.kind, &current, site, args)? {
                Some(hit) => (current, hit),
                None => install(node, &current, site, args)?,
            }
        };

        match dispatch::run_entry(&node.kind, &chain, &hit, site, args) {
            EntryOutcome::Returned(value) => return Ok(value),
            EntryOutcome::Failed(err) => return Err(err),
            EntryOutcome::Excluded(condition) => exclude(node, &hit.entry, &condition, args),
        }
    }
}

/// Select the first applicable rule, create its activation and publish the
/// new chain. Must be called with the node's lock held.
fn install(
    node: &SpecializedNode,
    current: &Arc<Chain>,
    site: CallSite<'_>,
    args: &[Value],
) -> Result<(Arc<Chain>, Hit)> {
    let kind = &node.kind;
    let shape = Shape::of(args);

    for rule in &kind.rules {
        if current.is_excluded(rule.id, &shape) {
            continue;
        }
        if rule.fallback && kind.other_rule_applies(site, args)? {
            continue;
        }
        let Some(converted) = rule.accepts_uncached(&kind.types, site, args)? else {
            continue;
        };

        if current.instances_of(rule.id) >= rule.limit {
            return collapse(node, current, &shape, &rule.qualified, converted);
        }
        let remaining = current
            .entries
            .iter()
            .filter(|entry| entry.rule().map_or(true, |id| !rule.replaces.contains(&id)))
            .count();
        if remaining + 1 > kind.limit {
            return collapse(node, current, &shape, &rule.qualified, converted);
        }

        let values = rule.initialize_slots(site, &converted, Some(&node.shared))?;
        if !rule.check_guards(site, &converted, CachedView::detached(&values), |reads| reads.cached)? {
            continue;
        }

        let mut next = Chain::clone(current);
        let entry = Arc::new(place_values(rule, values, &mut next));
        if !rule.replaces.is_empty() {
            let removed = next.supersede(&rule.replaces);
            tracing::debug!(
                target: crate::LOG_TARGET,
                rule = %rule.qualified,
                removed,
                superseded = ?rule.replaces.iter().map(|id| kind.rule(*id).name.as_str()).collect::<Vec<_>>(),
                "superseded rules"
            );
        }
        next.insert_ordered(Arc::clone(&entry));
        next.settle_cost(current.cost);
        tracing::debug!(
            target: crate::LOG_TARGET,
            rule = %rule.qualified,
            shape = %shape,
            activations = next.entries.len(),
            cost = %next.cost,
            "installed activation"
        );
        log_cost_change(&kind.name, current.cost, next.cost);

        let next = Arc::new(next);
        node.chain.store(Arc::clone(&next));
        return Ok((
            next,
            Hit {
                entry,
                args: converted,
            },
        ));
    }

    Err(Error::UnsupportedSpecialization {
        node: kind.name.clone(),
        shape,
    })
}

/// Move inline slot values into the chain's inline storage; the entry keeps
/// `Null` in their place.
fn place_values(rule: &CompiledRule, mut values: Vec<Value>, chain: &mut Chain) -> CacheEntry {
    for (value, location) in values.iter_mut().zip(&rule.locations) {
        if let SlotLocation::Inline(index) = location {
            chain.inline[*index] = Some(std::mem::replace(value, Value::Null));
        }
    }
    CacheEntry::activation(rule.id, values)
}

fn collapse(
    node: &SpecializedNode,
    current: &Arc<Chain>,
    shape: &Shape,
    trigger: &str,
    args: Vec<Value>,
) -> Result<(Arc<Chain>, Hit)> {
    let mut next = Chain::clone(current);
    let discarded = next.entries.len();
    let entry = next.collapse();
    next.settle_cost(current.cost);
    tracing::debug!(
        target: crate::LOG_TARGET,
        node = %node.kind.name,
        rule = %trigger,
        shape = %shape,
        discarded,
        "activation limit exceeded, collapsing to generic dispatch"
    );
    log_cost_change(&node.kind.name, current.cost, next.cost);

    let next = Arc::new(next);
    node.chain.store(Arc::clone(&next));
    Ok((next, Hit { entry, args }))
}

/// Remove the raising `entry` and keep its rule from being activated again
/// for the shape of `args`. Other activations of the rule stay installed.
pub(crate) fn exclude(
    node: &SpecializedNode,
    entry: &Arc<CacheEntry>,
    condition: &Condition,
    args: &[Value],
) {
    let Some(id) = entry.rule() else {
        return;
    };
    let _guard = node.lock.lock();
    let current = node.chain.load_full();
    let mut next = Chain::clone(&current);
    next.entries.retain(|existing| !Arc::ptr_eq(existing, entry));

    let rule = node.kind.rule(id);
    if next.instances_of(id) == 0 {
        for location in &rule.locations {
            if let SlotLocation::Inline(index) = location {
                next.inline[*index] = None;
            }
        }
    }
    let shape = Shape::of(args);
    next.excluded.insert((id, shape.clone()));
    next.settle_cost(current.cost);
    tracing::debug!(
        target: crate::LOG_TARGET,
        rule = %rule.qualified,
        shape = %shape,
        condition = %condition,
        "excluded activation"
    );
    node.chain.store(Arc::new(next));
}

fn log_cost_change(node: &str, previous: NodeCost, current: NodeCost) {
    if previous != current {
        tracing::debug!(
            target: crate::LOG_TARGET,
            node = %node,
            from = %previous,
            to = %current,
            "node cost changed"
        );
    }
}
