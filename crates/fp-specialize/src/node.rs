//! Runtime node instances.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use parking_lot::ReentrantMutex;

use crate::chain::{Chain, SharedGroups};
use crate::cost::NodeCost;
use crate::error::{Error, Result};
use crate::registry::NodeKind;
use crate::rule::CallSite;
use crate::tree::{ChildNode, Frame, RootContext};
use crate::value::{Value, ValueType};
use crate::{dispatch, uncached};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Learns activations in its inline cache.
    Cached,
    /// Re-evaluates every rule on each call and keeps no state.
    Uncached,
}

/// One node of a tree, specializing itself on the arguments it observes.
pub struct SpecializedNode {
    pub(crate) kind: Arc<NodeKind>,
    pub(crate) mode: DispatchMode,
    pub(crate) children: Vec<Arc<dyn ChildNode>>,
    pub(crate) chain: ArcSwap<Chain>,
    /// Serializes chain mutation; the fast path never takes it.
    pub(crate) lock: ReentrantMutex<()>,
    pub(crate) shared: Arc<SharedGroups>,
    pub(crate) parent: ArcSwapOption<RootContext>,
}

impl SpecializedNode {
    pub(crate) fn new(
        kind: Arc<NodeKind>,
        mode: DispatchMode,
        children: Vec<Arc<dyn ChildNode>>,
        shared: Arc<SharedGroups>,
    ) -> Self {
        let chain = Chain::empty(kind.inline_slots);
        Self {
            kind,
            mode,
            children,
            chain: ArcSwap::from_pointee(chain),
            lock: ReentrantMutex::new(()),
            shared,
            parent: ArcSwapOption::empty(),
        }
    }

    pub fn name(&self) -> &str {
        self.kind.name()
    }

    pub fn kind(&self) -> &Arc<NodeKind> {
        &self.kind
    }

    pub fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub fn children(&self) -> &[Arc<dyn ChildNode>] {
        &self.children
    }

    pub fn shared_groups(&self) -> &Arc<SharedGroups> {
        &self.shared
    }

    /// The root this node was adopted into, if any.
    pub fn root(&self) -> Option<Arc<RootContext>> {
        self.parent.load_full()
    }

    pub fn is_adopted(&self) -> bool {
        self.parent.load().is_some()
    }

    /// Bind this node and its children to `root`. Re-adoption replaces the
    /// back-link and leaves the inline cache as it is.
    pub fn adopt(&self, root: &Arc<RootContext>) {
        self.parent.store(Some(Arc::clone(root)));
        for child in &self.children {
            child.adopt(root);
        }
        tracing::debug!(
            target: crate::LOG_TARGET,
            node = %self.name(),
            root = %root.name(),
            "adopted node"
        );
    }

    /// Reported cost: the declared override, else the computed classification.
    pub fn cost(&self) -> NodeCost {
        match self.kind.cost_override {
            Some(cost) => cost,
            None => self.chain.load().cost,
        }
    }

    /// Number of activations currently installed.
    pub fn activations(&self) -> usize {
        self.chain.load().entries.len()
    }

    pub fn is_collapsed(&self) -> bool {
        self.chain.load().collapsed
    }

    // ===== EXECUTION =====

    /// Evaluate the children against `frame` and execute on their values.
    pub fn execute(&self, frame: &Frame) -> Result<Value> {
        let args = self.evaluate_children(frame)?;
        self.execute_with(frame, &args)
    }

    /// Execute on explicit argument values.
    pub fn execute_with(&self, frame: &Frame, args: &[Value]) -> Result<Value> {
        if args.len() != self.kind.arity {
            return Err(Error::Arity {
                node: self.kind.name.clone(),
                expected: self.kind.arity,
                actual: args.len(),
            });
        }
        match self.mode {
            DispatchMode::Cached => dispatch::execute_cached(self, frame, args),
            DispatchMode::Uncached => {
                let root = self.root();
                let site = CallSite {
                    frame,
                    root: root.as_deref(),
                    node: &self.kind.name,
                };
                uncached::execute_uncached(&self.kind, site, args, None)
            }
        }
    }

    pub fn execute_int(&self, frame: &Frame) -> Result<i32> {
        expect(ValueType::Int, self.execute(frame)?, Value::as_int)
    }

    pub fn execute_int_with(&self, frame: &Frame, args: &[Value]) -> Result<i32> {
        expect(ValueType::Int, self.execute_with(frame, args)?, Value::as_int)
    }

    pub fn execute_long(&self, frame: &Frame) -> Result<i64> {
        expect(ValueType::Long, self.execute(frame)?, Value::as_long)
    }

    pub fn execute_long_with(&self, frame: &Frame, args: &[Value]) -> Result<i64> {
        expect(ValueType::Long, self.execute_with(frame, args)?, Value::as_long)
    }

    pub fn execute_double(&self, frame: &Frame) -> Result<f64> {
        expect(ValueType::Double, self.execute(frame)?, Value::as_double)
    }

    pub fn execute_double_with(&self, frame: &Frame, args: &[Value]) -> Result<f64> {
        expect(ValueType::Double, self.execute_with(frame, args)?, Value::as_double)
    }

    pub fn execute_bool(&self, frame: &Frame) -> Result<bool> {
        expect(ValueType::Bool, self.execute(frame)?, Value::as_bool)
    }

    pub fn execute_bool_with(&self, frame: &Frame, args: &[Value]) -> Result<bool> {
        expect(ValueType::Bool, self.execute_with(frame, args)?, Value::as_bool)
    }

    /// Invoke a host method provided by this node's kind.
    pub fn call_method(&self, name: &str, frame: &Frame, args: &[Value]) -> Result<Value> {
        let method = self
            .kind
            .methods
            .get(name)
            .ok_or_else(|| Error::UnknownMethod {
                node: self.kind.name.clone(),
                method: name.to_string(),
            })?;
        method(self, frame, args)
    }

    fn evaluate_children(&self, frame: &Frame) -> Result<Vec<Value>> {
        self.children
            .iter()
            .map(|child| child.execute(frame))
            .collect()
    }
}

fn expect<T>(expected: ValueType, value: Value, extract: fn(&Value) -> Option<T>) -> Result<T> {
    match extract(&value) {
        Some(v) => Ok(v),
        None => Err(Error::UnexpectedResult { expected, value }),
    }
}

impl ChildNode for SpecializedNode {
    fn execute(&self, frame: &Frame) -> Result<Value> {
        SpecializedNode::execute(self, frame)
    }

    fn adopt(&self, root: &Arc<RootContext>) {
        SpecializedNode::adopt(self, root)
    }

    fn deep_copy(&self) -> Arc<dyn ChildNode> {
        Arc::new(SpecializedNode::deep_copy(self))
    }
}

impl Debug for SpecializedNode {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let chain = self.chain.load();
        f.debug_struct("SpecializedNode")
            .field("kind", &self.kind.name)
            .field("mode", &self.mode)
            .field("children", &self.children.len())
            .field("activations", &chain.entries.len())
            .field("collapsed", &chain.collapsed)
            .field("cost", &chain.cost)
            .field("adopted", &self.is_adopted())
            .finish()
    }
}
