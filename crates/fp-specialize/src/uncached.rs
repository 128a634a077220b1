//! Stateless dispatch, shared by the uncached node variant and by collapsed
//! nodes: every call re-evaluates every guard and every initializer.

use std::collections::HashSet;

use crate::error::{Error, Result};
use crate::guard::CachedView;
use crate::registry::NodeKind;
use crate::rule::{CallSite, EntryOutcome, Invocation};
use crate::value::{Shape, Value};

/// Match and run the first applicable rule. A collapsed node passes the rules
/// its chain superseded; they never run again on that node.
pub(crate) fn execute_uncached(
    kind: &NodeKind,
    site: CallSite<'_>,
    args: &[Value],
    superseded: Option<&HashSet<usize>>,
) -> Result<Value> {
    for rule in &kind.rules {
        if superseded.is_some_and(|retired| retired.contains(&rule.id)) {
            continue;
        }
        if rule.fallback && kind.other_rule_applies(site, args)? {
            continue;
        }
        let Some(converted) = rule.accepts_uncached(&kind.types, site, args)? else {
            continue;
        };
        let values = if rule.needs_cache() {
            rule.initialize_slots(site, &converted, None)?
        } else {
            Vec::new()
        };
        let cached = CachedView::detached(&values);
        if !rule.check_guards(site, &converted, cached, |reads| reads.cached)? {
            continue;
        }

        let invocation = Invocation {
            frame: site.frame,
            args: &converted,
            cached,
            slots: &rule.slots,
            root: site.root,
            node: site.node,
        };
        match rule.run(&invocation) {
            EntryOutcome::Returned(value) => return Ok(value),
            EntryOutcome::Failed(err) => return Err(err),
            EntryOutcome::Excluded(condition) => {
                tracing::debug!(
                    target: crate::LOG_TARGET,
                    rule = %rule.qualified,
                    condition = %condition,
                    "uncached call skipped excluded rule"
                );
            }
        }
    }

    Err(Error::UnsupportedSpecialization {
        node: kind.name.clone(),
        shape: Shape::of(args),
    })
}
