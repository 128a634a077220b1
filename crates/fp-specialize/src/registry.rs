//! Declaration and validation of node kinds.
//!
//! A [`NodeSpec`] lists the rules of one node kind in declaration order. Building
//! it checks the whole declaration, reporting every problem at once, and yields
//! the immutable [`NodeKind`] table the specializer runs against.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use itertools::Itertools;

use crate::config::SpecializeOptions;
use crate::cost::NodeCost;
use crate::diagnostics::{DeclarationErrors, Diagnostic};
use crate::error::{Error, Result};
use crate::guard::{compile_guard, GuardScope};
use crate::node::SpecializedNode;
use crate::rule::{CallSite, CompiledRule, CompiledSlot, SlotLocation, SpecializationRule};
use crate::tree::Frame;
use crate::types::TypeSystem;
use crate::value::{Shape, Value, ValueType};

const CODE_NO_RULES: &str = "specialize::decl::no_rules";
const CODE_ARITY: &str = "specialize::decl::arity";
const CODE_DUPLICATE: &str = "specialize::decl::duplicate";
const CODE_REPLACES: &str = "specialize::decl::replaces";
const CODE_LIMIT: &str = "specialize::decl::limit";
const CODE_FALLBACK: &str = "specialize::decl::fallback";
const CODE_SHARED: &str = "specialize::decl::shared";
const CODE_INLINE: &str = "specialize::decl::inline";
const CODE_UNREACHABLE: &str = "specialize::decl::unreachable";
const CODE_SIGNATURE: &str = "specialize::decl::signature";
const CODE_UNIMPLEMENTED: &str = "specialize::decl::unimplemented";
const CODE_UNKNOWN_METHOD: &str = "specialize::decl::unknown_method";

pub type HostMethod =
    Arc<dyn Fn(&SpecializedNode, &Frame, &[Value]) -> Result<Value> + Send + Sync>;

/// A named set of abstract methods a node kind promises to provide.
#[derive(Debug, Clone)]
pub struct Interface {
    pub name: String,
    pub methods: Vec<String>,
}

impl Interface {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            methods: Vec::new(),
        }
    }

    pub fn method(mut self, name: impl Into<String>) -> Self {
        self.methods.push(name.into());
        self
    }
}

pub struct NodeSpec {
    name: String,
    arity: usize,
    types: TypeSystem,
    rules: Vec<SpecializationRule>,
    limit: Option<usize>,
    cost_override: Option<NodeCost>,
    uncached: bool,
    interfaces: Vec<Interface>,
    methods: Vec<(String, HostMethod)>,
    required: Vec<Vec<ValueType>>,
    options: SpecializeOptions,
}

impl NodeSpec {
    pub fn new(name: impl Into<String>, arity: usize) -> Self {
        Self {
            name: name.into(),
            arity,
            types: TypeSystem::new(),
            rules: Vec::new(),
            limit: None,
            cost_override: None,
            uncached: false,
            interfaces: Vec::new(),
            methods: Vec::new(),
            required: Vec::new(),
            options: SpecializeOptions::default(),
        }
    }

    pub fn types(mut self, types: TypeSystem) -> Self {
        self.types = types;
        self
    }

    pub fn rule(mut self, rule: SpecializationRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Activations a node may hold before it collapses to generic dispatch.
    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Report `cost` verbatim instead of the computed classification.
    pub fn cost_override(mut self, cost: NodeCost) -> Self {
        self.cost_override = Some(cost);
        self
    }

    pub fn generate_uncached(mut self) -> Self {
        self.uncached = true;
        self
    }

    pub fn implements(mut self, interface: Interface) -> Self {
        self.interfaces.push(interface);
        self
    }

    pub fn method(
        mut self,
        name: impl Into<String>,
        method: impl Fn(&SpecializedNode, &Frame, &[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.methods.push((name.into(), Arc::new(method)));
        self
    }

    /// Require that some rule accepts arguments of exactly these static types.
    pub fn require_signature(mut self, types: impl Into<Vec<ValueType>>) -> Self {
        self.required.push(types.into());
        self
    }

    pub fn options(mut self, options: SpecializeOptions) -> Self {
        self.options = options;
        self
    }

    /// Validate the declaration. Every problem found is reported in the
    /// returned [`Error::Declaration`].
    pub fn build(self) -> Result<Arc<NodeKind>> {
        let mut errors = DeclarationErrors::new(self.name.clone());
        let kind = self.validate(&mut errors);

        if errors.has_errors() {
            tracing::warn!(
                target: crate::LOG_TARGET,
                node = %errors.node,
                errors = errors.errors().count(),
                "rejected node declaration"
            );
            return Err(Error::Declaration(errors));
        }
        tracing::debug!(
            target: crate::LOG_TARGET,
            node = %kind.name,
            rules = kind.rules.len(),
            limit = kind.limit,
            "declared node kind"
        );
        Ok(Arc::new(kind))
    }

    fn validate(self, errors: &mut DeclarationErrors) -> NodeKind {
        let node = self.name.as_str();
        self.types.validate(node, errors);

        if self.rules.is_empty() {
            errors.push(
                Diagnostic::error(format!("no specialization rules declared for `{}`", node))
                    .with_source_context(node)
                    .with_code(CODE_NO_RULES),
            );
        }

        let limit = match self.limit {
            Some(0) => {
                declare_error!(errors, node, CODE_LIMIT, "node activation limit must be at least 1");
                1
            }
            Some(limit) => limit,
            None => self.options.polymorphic_limit.max(1),
        };

        let ids: HashMap<&str, usize> = self
            .rules
            .iter()
            .enumerate()
            .map(|(id, rule)| (rule.name.as_str(), id))
            .collect();

        let mut seen = HashSet::new();
        let mut shared_groups: HashMap<String, (ValueType, String, String)> = HashMap::new();
        let mut inline_slots = 0;
        let mut compiled = Vec::with_capacity(self.rules.len());

        for (id, rule) in self.rules.iter().enumerate() {
            let context = format!("{}::{}", node, rule.name);
            if !seen.insert(rule.name.as_str()) {
                declare_error!(errors, context, CODE_DUPLICATE, "rule `{}` is declared more than once", rule.name);
            }
            if rule.params.len() != self.arity {
                declare_error!(
                    errors,
                    context,
                    CODE_ARITY,
                    "rule takes {} parameter(s) but `{}` is executed with {}",
                    rule.params.len(),
                    node,
                    self.arity
                );
            }
            if rule.limit == Some(0) {
                declare_error!(errors, context, CODE_LIMIT, "activation limit must be at least 1");
            }
            if rule.fallback {
                if id + 1 != self.rules.len() {
                    declare_error!(errors, context, CODE_FALLBACK, "fallback rule must be declared last");
                }
                if !rule.guards.is_empty() {
                    declare_error!(errors, context, CODE_FALLBACK, "fallback rule cannot declare guards");
                }
            }

            let mut replaces = Vec::new();
            for target in &rule.replaces {
                match ids.get(target.as_str()) {
                    None => declare_error!(errors, context, CODE_REPLACES, "replaces unknown rule `{}`", target),
                    Some(&target_id) if target_id >= id => declare_error!(
                        errors,
                        context,
                        CODE_REPLACES,
                        "replaces `{}`, which is not declared before it",
                        target
                    ),
                    Some(&target_id) => replaces.push(target_id),
                }
            }

            let multi_instance = rule.limit.unwrap_or(1) > 1;
            let mut slot_names = HashSet::new();
            let mut slots = Vec::with_capacity(rule.cached.len());
            for slot in &rule.cached {
                let slot_context = format!("{}::{}", context, slot.name);
                if !slot_names.insert(slot.name.as_str()) {
                    declare_error!(errors, slot_context, CODE_DUPLICATE, "cached slot `{}` is declared more than once", slot.name);
                }
                if slot.shared.is_some() && slot.exclusive {
                    declare_error!(errors, slot_context, CODE_SHARED, "cached slot `{}` cannot be both shared and exclusive", slot.name);
                }
                if slot.inline && multi_instance {
                    declare_error!(
                        errors,
                        slot_context,
                        CODE_INLINE,
                        "inline cached slot `{}` requires a single-instance rule, but the rule allows {} activations",
                        slot.name,
                        rule.limit.unwrap_or(1)
                    );
                }
                if slot.inline && slot.shared.is_some() {
                    declare_error!(errors, slot_context, CODE_INLINE, "inline cached slot `{}` cannot be shared", slot.name);
                }
                if let Some(group) = &slot.shared {
                    match shared_groups.entry(group.clone()) {
                        Entry::Vacant(vacant) => {
                            vacant.insert((
                                slot.ty,
                                slot.init.expression().to_string(),
                                slot_context.clone(),
                            ));
                        }
                        Entry::Occupied(occupied) => {
                            let (ty, expression, owner) = occupied.get();
                            if *ty != slot.ty || expression != slot.init.expression() {
                                errors.push(
                                    Diagnostic::error(format!(
                                        "shared group `{}` declared as `{}` = `{}` here but as `{}` = `{}` in `{}`",
                                        group,
                                        slot.ty,
                                        slot.init.expression(),
                                        ty,
                                        expression,
                                        owner
                                    ))
                                    .with_source_context(slot_context.clone())
                                    .with_code(CODE_SHARED)
                                    .with_suggestion("every slot of a shared group must agree on type and initializer"),
                                );
                            }
                        }
                    }
                }
                let location = if slot.inline && !multi_instance && slot.shared.is_none() {
                    inline_slots += 1;
                    SlotLocation::Inline(inline_slots - 1)
                } else {
                    SlotLocation::Entry
                };
                slots.push(CompiledSlot {
                    name: slot.name.clone(),
                    ty: slot.ty,
                    init: slot.init.clone(),
                    shared: slot.shared.clone(),
                    location,
                });
            }

            let slot_types: Vec<(String, ValueType)> =
                slots.iter().map(|slot| (slot.name.clone(), slot.ty)).collect();
            let scope = GuardScope {
                params: &rule.params,
                slots: &slot_types,
                context: &context,
            };
            let guards = rule
                .guards
                .iter()
                .filter_map(|guard| compile_guard(guard, &scope, errors))
                .collect();

            compiled.push(CompiledRule {
                id,
                name: rule.name.clone(),
                qualified: context,
                params: rule.params.clone(),
                guards,
                locations: slots.iter().map(|slot| slot.location).collect(),
                slots,
                rewrite_on: rule.rewrite_on.clone(),
                replaces,
                limit: rule.limit.unwrap_or(1).max(1),
                fallback: rule.fallback,
                body: Arc::clone(&rule.body),
            });
        }

        self.check_reachability(errors);
        self.check_signatures(errors);
        let methods = self.check_methods(errors);

        NodeKind {
            name: self.name,
            arity: self.arity,
            types: self.types,
            rules: compiled,
            limit,
            cost_override: self.cost_override,
            uncached: self.uncached,
            methods,
            inline_slots,
            trace: self.options.trace_fast_path,
        }
    }

    fn unconditional(rule: &SpecializationRule) -> bool {
        !rule.fallback && rule.guards.is_empty() && rule.rewrite_on.is_empty()
    }

    /// A rule is unreachable when an earlier rule always matches everything it accepts.
    fn check_reachability(&self, errors: &mut DeclarationErrors) {
        for (index, later) in self.rules.iter().enumerate() {
            let shadowing = self.rules[..index].iter().find(|earlier| {
                Self::unconditional(earlier)
                    && earlier.params.len() == later.params.len()
                    && earlier.params.iter().zip(&later.params).all(|(e, l)| {
                        *e == ValueType::Object
                            || (*l != ValueType::Object && self.types.accepts_static(*e, *l))
                    })
            });
            if let Some(earlier) = shadowing {
                errors.push(
                    Diagnostic::error(format!(
                        "rule `{}` is unreachable: `{}` is declared before it and always matches",
                        later.name, earlier.name
                    ))
                    .with_source_context(format!("{}::{}", self.name, later.name))
                    .with_code(CODE_UNREACHABLE)
                    .with_suggestion(format!("declare `{}` before `{}`", later.name, earlier.name)),
                );
            }
        }
    }

    fn check_signatures(&self, errors: &mut DeclarationErrors) {
        for signature in &self.required {
            let covered = self.rules.iter().any(|rule| {
                rule.fallback
                    || (rule.params.len() == signature.len()
                        && rule
                            .params
                            .iter()
                            .zip(signature)
                            .all(|(declared, actual)| self.types.accepts_static(*declared, *actual)))
            });
            if !covered {
                let shape = Shape::new(signature.clone());
                errors.push(
                    Diagnostic::error(format!("no rule accepts the required signature {}", shape))
                        .with_source_context(format!("{}{}", self.name, shape))
                        .with_code(CODE_SIGNATURE)
                        .with_suggestion("add a rule for these parameter types or a fallback rule"),
                );
            }
        }
    }

    fn check_methods(&self, errors: &mut DeclarationErrors) -> HashMap<String, HostMethod> {
        let required: Vec<(&str, &str)> = self
            .interfaces
            .iter()
            .flat_map(|interface| {
                interface
                    .methods
                    .iter()
                    .map(move |method| (method.as_str(), interface.name.as_str()))
            })
            .unique_by(|(method, _)| *method)
            .collect();

        let mut methods = HashMap::new();
        for (name, method) in &self.methods {
            let context = format!("{}::{}", self.name, name);
            if !required.iter().any(|(required, _)| required == name) {
                declare_error!(
                    errors,
                    context,
                    CODE_UNKNOWN_METHOD,
                    "method `{}` is not declared by any implemented interface",
                    name
                );
            }
            if methods.insert(name.clone(), Arc::clone(method)).is_some() {
                declare_error!(errors, context, CODE_DUPLICATE, "method `{}` is provided more than once", name);
            }
        }

        for (method, interface) in required {
            if !methods.contains_key(method) {
                errors.push(
                    Diagnostic::error(format!(
                        "abstract method `{}` inherited from `{}` is not implemented",
                        method, interface
                    ))
                    .with_source_context(format!("{}::{}", self.name, method))
                    .with_code(CODE_UNIMPLEMENTED),
                );
            }
        }
        methods
    }
}

/// A validated node kind: the ordered, immutable rule table.
pub struct NodeKind {
    pub(crate) name: String,
    pub(crate) arity: usize,
    pub(crate) types: TypeSystem,
    pub(crate) rules: Vec<CompiledRule>,
    pub(crate) limit: usize,
    pub(crate) cost_override: Option<NodeCost>,
    pub(crate) uncached: bool,
    pub(crate) methods: HashMap<String, HostMethod>,
    pub(crate) inline_slots: usize,
    /// Emit a `trace` event for every fast-path hit.
    pub(crate) trace: bool,
}

impl NodeKind {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn supports_uncached(&self) -> bool {
        self.uncached
    }

    pub fn cost_override(&self) -> Option<NodeCost> {
        self.cost_override
    }

    pub fn rule_names(&self) -> impl Iterator<Item = &str> {
        self.rules.iter().map(|rule| rule.name.as_str())
    }

    pub(crate) fn rule(&self, id: usize) -> &CompiledRule {
        &self.rules[id]
    }

    /// Whether a fallback rule should step aside: some other rule accepts the
    /// arguments by type and by every guard not reading cached state.
    pub(crate) fn other_rule_applies(&self, site: CallSite<'_>, args: &[Value]) -> Result<bool> {
        for rule in self.rules.iter().filter(|rule| !rule.fallback) {
            if rule.accepts_uncached(&self.types, site, args)?.is_some() {
                return Ok(true);
            }
        }
        Ok(false)
    }
}

impl Debug for NodeKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeKind")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .field("rules", &self.rules.iter().map(|rule| &rule.name).collect::<Vec<_>>())
            .field("limit", &self.limit)
            .field("cost_override", &self.cost_override)
            .field("uncached", &self.uncached)
            .finish()
    }
}
