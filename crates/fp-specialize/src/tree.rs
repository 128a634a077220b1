//! The slice of the interpreter tree a specialized node needs: frames, the
//! root context it is adopted into, and child operand nodes.

use std::any::Any;
use std::collections::HashMap;
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::value::Value;

/// Activation record of the running function, forwarded untouched to guards
/// and rule bodies.
#[derive(Clone, Default)]
pub struct Frame {
    arguments: Vec<Value>,
    context: Option<Arc<dyn Any + Send + Sync>>,
}

impl Frame {
    pub fn new(arguments: Vec<Value>) -> Self {
        Self {
            arguments,
            context: None,
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_context(mut self, context: Arc<dyn Any + Send + Sync>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn arguments(&self) -> &[Value] {
        &self.arguments
    }

    pub fn argument(&self, index: usize) -> Option<&Value> {
        self.arguments.get(index)
    }

    /// Host data attached to the frame, if it has type `T`.
    pub fn context<T: Any>(&self) -> Option<&T> {
        self.context.as_deref()?.downcast_ref::<T>()
    }
}

impl Debug for Frame {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("arguments", &self.arguments)
            .field("context", &self.context.is_some())
            .finish()
    }
}

/// The root a node tree is adopted into. Guards and initializers may read its
/// properties once adoption has happened.
#[derive(Debug, Clone, Default)]
pub struct RootContext {
    name: String,
    properties: HashMap<String, Value>,
}

impl RootContext {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }
}

/// A fixed operand of a node: evaluated to produce one argument.
pub trait ChildNode: Send + Sync {
    fn execute(&self, frame: &Frame) -> Result<Value>;

    /// Bind this subtree to `root`.
    fn adopt(&self, _root: &Arc<RootContext>) {}

    /// Copy of this subtree for a cloned tree.
    fn deep_copy(&self) -> Arc<dyn ChildNode>;
}

/// Child evaluating to a fixed value.
#[derive(Debug, Clone)]
pub struct Constant(pub Value);

impl Constant {
    pub fn new(value: impl Into<Value>) -> Arc<dyn ChildNode> {
        Arc::new(Constant(value.into()))
    }
}

impl ChildNode for Constant {
    fn execute(&self, _frame: &Frame) -> Result<Value> {
        Ok(self.0.clone())
    }

    fn deep_copy(&self) -> Arc<dyn ChildNode> {
        Arc::new(Constant(self.0.deep_copy()))
    }
}

/// Child reading a frame argument.
#[derive(Debug, Clone, Copy)]
pub struct ReadArgument(pub usize);

impl ReadArgument {
    pub fn new(index: usize) -> Arc<dyn ChildNode> {
        Arc::new(ReadArgument(index))
    }
}

impl ChildNode for ReadArgument {
    fn execute(&self, frame: &Frame) -> Result<Value> {
        frame.argument(self.0).cloned().ok_or_else(|| {
            Error::Generic(format!(
                "frame has {} argument(s), cannot read argument {}",
                frame.arguments().len(),
                self.0
            ))
        })
    }

    fn deep_copy(&self) -> Arc<dyn ChildNode> {
        Arc::new(*self)
    }
}
