//! FerroPhase node specialization
//!
//! This crate provides the runtime half of self-specializing AST nodes: a
//! per-node polymorphic inline cache that learns, from the argument shapes it
//! observes, which declared specialization rule applies, caches that decision
//! and collapses to a generic dispatch when too many shapes show up.
//!
//! Node kinds are declared with [`NodeSpec`], validated into an immutable
//! [`NodeKind`] and instantiated through a [`NodeFactory`].

#[macro_use]
pub mod macros;

pub mod chain;
pub mod clone;
pub mod config;
pub mod cost;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod factory;
pub mod guard;
pub mod introspection;
pub mod node;
pub mod registry;
pub mod rule;
pub mod specializer;
pub mod tree;
pub mod types;
pub mod uncached;
pub mod value;

// Re-export commonly used items for convenience
pub use tracing;

pub use config::SpecializeOptions;
pub use cost::NodeCost;
pub use error::{BodyResult, Condition, Raised};
pub use factory::NodeFactory;
pub use guard::{CompareOp, Guard, Literal, Operand, Predicate};
pub use introspection::{CachedValueInfo, NodeIntrospection, SpecializationInfo};
pub use node::{DispatchMode, SpecializedNode};
pub use registry::{HostMethod, Interface, NodeKind, NodeSpec};
pub use rule::{CachedSlot, InitContext, Initializer, Invocation, SpecializationRule};
pub use tree::{ChildNode, Constant, Frame, ReadArgument, RootContext};
pub use types::{ImplicitCast, TypeSystem};
pub use value::{Shape, Value, ValueCell, ValueType};

/// Target used by every tracing event emitted by this crate.
pub const LOG_TARGET: &str = "specializer";

// Alias for error types
pub type Error = crate::error::Error;
pub type Result<T> = crate::error::Result<T>;
