//! Specialization rules: one declared case of an operation, gated by
//! parameter types and guards, optionally carrying cached state.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::chain::SharedGroups;
use crate::error::{BodyResult, Condition, Error, Raised, Result};
use crate::guard::{CachedView, CompiledGuard, Guard, GuardEnv, GuardReads};
use crate::tree::{Frame, RootContext};
use crate::types::TypeSystem;
use crate::value::{Value, ValueType};

static NULL: Value = Value::Null;

pub type RuleBody = Arc<dyn Fn(&Invocation<'_>) -> BodyResult + Send + Sync>;

type InitFn = Arc<dyn Fn(&InitContext<'_>) -> Result<Value> + Send + Sync>;

/// Computes the value of a cached slot when an activation is created.
///
/// The expression text identifies the initializer; slots sharing a group must
/// agree on it.
#[derive(Clone)]
pub struct Initializer {
    expression: String,
    func: InitFn,
}

impl Initializer {
    pub fn new(
        expression: impl Into<String>,
        func: impl Fn(&InitContext<'_>) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            expression: expression.into(),
            func: Arc::new(func),
        }
    }

    /// Initializer that caches argument `index` as-is.
    pub fn arg(index: usize) -> Self {
        Self::new(format!("arg{}", index), move |ctx| Ok(ctx.arg(index).clone()))
    }

    pub fn expression(&self) -> &str {
        &self.expression
    }

    pub(crate) fn evaluate(&self, ctx: &InitContext<'_>) -> Result<Value> {
        (self.func)(ctx)
    }
}

impl Debug for Initializer {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Initializer")
            .field(&self.expression)
            .finish()
    }
}

/// Declaration of one cached slot of a rule.
#[derive(Debug, Clone)]
pub struct CachedSlot {
    pub name: String,
    pub ty: ValueType,
    pub init: Initializer,
    pub shared: Option<String>,
    pub exclusive: bool,
    pub inline: bool,
}

impl CachedSlot {
    pub fn new(name: impl Into<String>, ty: ValueType, init: Initializer) -> Self {
        Self {
            name: name.into(),
            ty,
            init,
            shared: None,
            exclusive: false,
            inline: false,
        }
    }

    /// Share this slot's value with every slot of the same group.
    pub fn shared(mut self, group: impl Into<String>) -> Self {
        self.shared = Some(group.into());
        self
    }

    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    /// Store the value in the node's own storage instead of the activation.
    pub fn inline(mut self) -> Self {
        self.inline = true;
        self
    }
}

#[derive(Clone)]
pub struct SpecializationRule {
    pub(crate) name: String,
    pub(crate) params: Vec<ValueType>,
    pub(crate) guards: Vec<Guard>,
    pub(crate) cached: Vec<CachedSlot>,
    pub(crate) rewrite_on: Vec<String>,
    pub(crate) replaces: Vec<String>,
    pub(crate) limit: Option<usize>,
    pub(crate) fallback: bool,
    pub(crate) body: RuleBody,
}

impl SpecializationRule {
    pub fn new(
        name: impl Into<String>,
        params: impl Into<Vec<ValueType>>,
        body: impl Fn(&Invocation<'_>) -> BodyResult + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
            guards: Vec::new(),
            cached: Vec::new(),
            rewrite_on: Vec::new(),
            replaces: Vec::new(),
            limit: None,
            fallback: false,
            body: Arc::new(body),
        }
    }

    /// A rule taking `arity` untyped parameters that applies only when no
    /// other rule of the node accepts the arguments.
    pub fn fallback(
        name: impl Into<String>,
        arity: usize,
        body: impl Fn(&Invocation<'_>) -> BodyResult + Send + Sync + 'static,
    ) -> Self {
        let mut rule = Self::new(name, vec![ValueType::Object; arity], body);
        rule.fallback = true;
        rule
    }

    pub fn guard(mut self, guard: Guard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn cached(mut self, slot: CachedSlot) -> Self {
        self.cached.push(slot);
        self
    }

    /// Exclude this rule for the current shape when its body raises `kind`.
    pub fn rewrite_on(mut self, kind: impl Into<String>) -> Self {
        self.rewrite_on.push(kind.into());
        self
    }

    /// Activating this rule removes the named, earlier rule for good.
    pub fn replaces(mut self, rule: impl Into<String>) -> Self {
        self.replaces.push(rule.into());
        self
    }

    /// Allow up to `limit` activations, keyed by distinct cached values.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ValueType] {
        &self.params
    }

    pub fn is_fallback(&self) -> bool {
        self.fallback
    }
}

impl Debug for SpecializationRule {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpecializationRule")
            .field("name", &self.name)
            .field("params", &self.params)
            .field("guards", &self.guards.len())
            .field("cached", &self.cached)
            .field("rewrite_on", &self.rewrite_on)
            .field("replaces", &self.replaces)
            .field("limit", &self.limit)
            .field("fallback", &self.fallback)
            .finish()
    }
}

// ===== EXECUTION CONTEXTS =====

/// What a rule body sees when it runs.
pub struct Invocation<'a> {
    pub frame: &'a Frame,
    /// Arguments after implicit casts to the rule's parameter types.
    pub args: &'a [Value],
    pub(crate) cached: CachedView<'a>,
    pub(crate) slots: &'a [CompiledSlot],
    pub(crate) root: Option<&'a RootContext>,
    pub(crate) node: &'a str,
}

impl<'a> Invocation<'a> {
    pub fn arg(&self, index: usize) -> &'a Value {
        self.args.get(index).unwrap_or(&NULL)
    }

    pub fn cached(&self, name: &str) -> Option<&'a Value> {
        let index = self.slots.iter().position(|slot| slot.name == name)?;
        self.cached.get(index)
    }

    pub fn root(&self) -> Result<&'a RootContext> {
        self.root.ok_or_else(|| Error::NotAdopted {
            node: self.node.to_string(),
        })
    }

    pub fn node_name(&self) -> &'a str {
        self.node
    }
}

/// What a cached initializer sees. Only slots declared before the one being
/// initialized are visible.
pub struct InitContext<'a> {
    pub frame: &'a Frame,
    pub args: &'a [Value],
    earlier: &'a [Value],
    slots: &'a [CompiledSlot],
    root: Option<&'a RootContext>,
    node: &'a str,
}

impl<'a> InitContext<'a> {
    pub fn arg(&self, index: usize) -> &'a Value {
        self.args.get(index).unwrap_or(&NULL)
    }

    pub fn cached(&self, name: &str) -> Option<&'a Value> {
        let index = self.slots.iter().position(|slot| slot.name == name)?;
        self.earlier.get(index)
    }

    pub fn root(&self) -> Result<&'a RootContext> {
        self.root.ok_or_else(|| Error::NotAdopted {
            node: self.node.to_string(),
        })
    }

    pub fn node_name(&self) -> &'a str {
        self.node
    }
}

// ===== COMPILED FORM =====

/// Where an installed activation keeps a slot's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotLocation {
    Entry,
    /// Index into the node's inline storage.
    Inline(usize),
}

#[derive(Debug, Clone)]
pub(crate) struct CompiledSlot {
    pub name: String,
    pub ty: ValueType,
    pub init: Initializer,
    pub shared: Option<String>,
    pub location: SlotLocation,
}

/// Tagged result of running one activation.
pub(crate) enum EntryOutcome {
    Returned(Value),
    /// The body raised a condition from the rule's exclusion set.
    Excluded(Condition),
    Failed(Error),
}

pub(crate) struct CompiledRule {
    pub id: usize,
    pub name: String,
    /// `Node::rule`, used in logs and diagnostics.
    pub qualified: String,
    pub params: Vec<ValueType>,
    pub guards: Vec<(CompiledGuard, GuardReads)>,
    pub slots: Vec<CompiledSlot>,
    pub locations: Vec<SlotLocation>,
    pub rewrite_on: Vec<String>,
    pub replaces: Vec<usize>,
    pub limit: usize,
    pub fallback: bool,
    pub body: RuleBody,
}

/// Borrowed inputs shared by every evaluation step of one call.
#[derive(Clone, Copy)]
pub(crate) struct CallSite<'a> {
    pub frame: &'a Frame,
    pub root: Option<&'a RootContext>,
    pub node: &'a str,
}

impl CompiledRule {
    pub fn needs_cache(&self) -> bool {
        !self.slots.is_empty()
    }

    pub fn coerce(&self, types: &TypeSystem, args: &[Value]) -> Result<Option<Vec<Value>>> {
        types.coerce_all(&self.params, args)
    }

    /// Evaluate, in declaration order, the guards selected by `select`.
    pub fn check_guards(
        &self,
        site: CallSite<'_>,
        args: &[Value],
        cached: CachedView<'_>,
        select: impl Fn(GuardReads) -> bool,
    ) -> Result<bool> {
        let env = GuardEnv {
            args,
            cached,
            root: site.root,
            node: site.node,
        };
        for (guard, reads) in &self.guards {
            if select(*reads) && !guard.evaluate(&env)? {
                tracing::trace!(
                    target: crate::LOG_TARGET,
                    rule = %self.qualified,
                    guard = %guard.describe(),
                    "guard rejected"
                );
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Types and every guard that does not read cached state.
    pub fn accepts_uncached(
        &self,
        types: &TypeSystem,
        site: CallSite<'_>,
        args: &[Value],
    ) -> Result<Option<Vec<Value>>> {
        let Some(converted) = self.coerce(types, args)? else {
            return Ok(None);
        };
        if !self.check_guards(site, &converted, CachedView::empty(), |reads| !reads.cached)? {
            return Ok(None);
        }
        Ok(Some(converted))
    }

    /// Evaluate every initializer once, in declaration order. Shared slots go
    /// through `shared` when given; without it every slot is computed afresh.
    pub fn initialize_slots(
        &self,
        site: CallSite<'_>,
        args: &[Value],
        shared: Option<&SharedGroups>,
    ) -> Result<Vec<Value>> {
        let mut values: Vec<Value> = Vec::with_capacity(self.slots.len());
        for slot in &self.slots {
            let ctx = InitContext {
                frame: site.frame,
                args,
                earlier: &values,
                slots: &self.slots,
                root: site.root,
                node: site.node,
            };
            let value = match (&slot.shared, shared) {
                (Some(group), Some(shared)) => shared.get_or_init(group, || {
                    tracing::debug!(
                        target: crate::LOG_TARGET,
                        rule = %self.qualified,
                        group = %group,
                        "initializing shared cache group"
                    );
                    slot.init.evaluate(&ctx)
                })?,
                _ => slot.init.evaluate(&ctx)?,
            };
            values.push(value);
        }
        Ok(values)
    }

    pub fn run(&self, invocation: &Invocation<'_>) -> EntryOutcome {
        match (self.body)(invocation) {
            Ok(value) => EntryOutcome::Returned(value),
            Err(Raised::Condition(condition)) => {
                if self.rewrite_on.iter().any(|kind| *kind == condition.kind) {
                    EntryOutcome::Excluded(condition)
                } else {
                    EntryOutcome::Failed(Error::Raised(condition))
                }
            }
            Err(Raised::Error(err)) => EntryOutcome::Failed(err),
        }
    }
}
