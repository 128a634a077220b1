use std::sync::Arc;

use once_cell::sync::OnceCell;

use crate::chain::SharedGroups;
use crate::error::{Error, Result};
use crate::node::{DispatchMode, SpecializedNode};
use crate::registry::{NodeKind, NodeSpec};
use crate::tree::ChildNode;

/// Creates nodes of one kind, and hands out its uncached singleton.
pub struct NodeFactory {
    kind: Arc<NodeKind>,
    uncached: OnceCell<SpecializedNode>,
}

impl NodeFactory {
    pub fn new(kind: Arc<NodeKind>) -> Self {
        Self {
            kind,
            uncached: OnceCell::new(),
        }
    }

    pub fn from_spec(spec: NodeSpec) -> Result<Self> {
        Ok(Self::new(spec.build()?))
    }

    pub fn kind(&self) -> &Arc<NodeKind> {
        &self.kind
    }

    /// A fresh, uninitialized node over `children`.
    pub fn create(&self, children: Vec<Arc<dyn ChildNode>>) -> Result<Arc<SpecializedNode>> {
        self.create_with(children, Arc::new(SharedGroups::new()))
    }

    /// A fresh node whose shared cache groups are those of `sibling`.
    pub fn create_sharing(
        &self,
        sibling: &SpecializedNode,
        children: Vec<Arc<dyn ChildNode>>,
    ) -> Result<Arc<SpecializedNode>> {
        if !Arc::ptr_eq(&self.kind, &sibling.kind) {
            bail!(
                "cannot share cache groups between `{}` and `{}`",
                self.kind.name,
                sibling.kind.name
            );
        }
        self.create_with(children, Arc::clone(&sibling.shared))
    }

    fn create_with(
        &self,
        children: Vec<Arc<dyn ChildNode>>,
        shared: Arc<SharedGroups>,
    ) -> Result<Arc<SpecializedNode>> {
        if children.len() != self.kind.arity {
            return Err(Error::Arity {
                node: self.kind.name.clone(),
                expected: self.kind.arity,
                actual: children.len(),
            });
        }
        Ok(Arc::new(SpecializedNode::new(
            Arc::clone(&self.kind),
            DispatchMode::Cached,
            children,
            shared,
        )))
    }

    /// The process-wide uncached node of this kind, created on first use.
    /// Call it through [`SpecializedNode::execute_with`].
    pub fn uncached(&self) -> Result<&SpecializedNode> {
        if !self.kind.uncached {
            return Err(Error::UncachedUnsupported {
                node: self.kind.name.clone(),
            });
        }
        Ok(self.uncached.get_or_init(|| {
            tracing::debug!(
                target: crate::LOG_TARGET,
                node = %self.kind.name,
                "created uncached node"
            );
            SpecializedNode::new(
                Arc::clone(&self.kind),
                DispatchMode::Uncached,
                Vec::new(),
                Arc::new(SharedGroups::new()),
            )
        }))
    }
}
