//! The fast path: walk the published chain without taking the node's lock.

use std::sync::Arc;

use crate::chain::{CacheEntry, Chain, EntryKind};
use crate::error::Result;
use crate::guard::CachedView;
use crate::node::SpecializedNode;
use crate::registry::NodeKind;
use crate::rule::{CallSite, EntryOutcome, Invocation};
use crate::tree::Frame;
use crate::value::Value;
use crate::{specializer, uncached};

/// A chain entry accepting the current arguments.
pub(crate) struct Hit {
    pub entry: Arc<CacheEntry>,
    /// Arguments converted to the rule's parameter types.
    pub args: Vec<Value>,
}

pub(crate) fn execute_cached(node: &SpecializedNode, frame: &Frame, args: &[Value]) -> Result<Value> {
    let root = node.root();
    let site = CallSite {
        frame,
        root: root.as_deref(),
        node: &node.kind.name,
    };

    let chain = node.chain.load_full();
    if let Some(hit) = find_entry(&node.kind, &chain, site, args)? {
        if node.kind.trace {
            tracing::trace!(
                target: crate::LOG_TARGET,
                node = %node.kind.name,
                rule = hit.entry.rule().map(|id| node.kind.rule(id).name.as_str()).unwrap_or("<generic>"),
                "cache hit"
            );
        }
        match run_entry(&node.kind, &chain, &hit, site, args) {
            EntryOutcome::Returned(value) => return Ok(value),
            EntryOutcome::Failed(err) => return Err(err),
            EntryOutcome::Excluded(condition) => {
                specializer::exclude(node, &hit.entry, &condition, args);
            }
        }
    }
    specializer::specialize(node, site, args)
}

/// First entry, in chain order, whose rule accepts `args` under the guards
/// that must be re-checked on every call.
pub(crate) fn find_entry(
    kind: &NodeKind,
    chain: &Chain,
    site: CallSite<'_>,
    args: &[Value],
) -> Result<Option<Hit>> {
    for entry in &chain.entries {
        let (id, values) = match &entry.kind {
            EntryKind::Generic => {
                return Ok(Some(Hit {
                    entry: Arc::clone(entry),
                    args: args.to_vec(),
                }))
            }
            EntryKind::Activation { rule, values } => (*rule, values),
        };
        let rule = kind.rule(id);
        let Some(converted) = rule.coerce(&kind.types, args)? else {
            continue;
        };
        // Exclusion removes the raising entry; sibling activations stay eligible.
        let cached = CachedView::installed(values, &chain.inline, &rule.locations);
        if !rule.check_guards(site, &converted, cached, |reads| reads.dynamic)? {
            continue;
        }
        if rule.fallback && kind.other_rule_applies(site, args)? {
            continue;
        }
        return Ok(Some(Hit {
            entry: Arc::clone(entry),
            args: converted,
        }));
    }
    Ok(None)
}

/// Run the entry of `hit`. `chain` must be the snapshot the entry was found in.
pub(crate) fn run_entry(
    kind: &NodeKind,
    chain: &Chain,
    hit: &Hit,
    site: CallSite<'_>,
    args: &[Value],
) -> EntryOutcome {
    hit.entry.record_hit();
    match &hit.entry.kind {
        EntryKind::Generic => {
            match uncached::execute_uncached(kind, site, args, Some(&chain.superseded)) {
                Ok(value) => EntryOutcome::Returned(value),
                Err(err) => EntryOutcome::Failed(err),
            }
        }
        EntryKind::Activation { rule, values } => {
            let rule = kind.rule(*rule);
            let invocation = Invocation {
                frame: site.frame,
                args: &hit.args,
                cached: CachedView::installed(values, &chain.inline, &rule.locations),
                slots: &rule.slots,
                root: site.root,
                node: site.node,
            };
            rule.run(&invocation)
        }
    }
}
