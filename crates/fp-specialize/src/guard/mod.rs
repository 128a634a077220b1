//! Guard expressions gating specialization rules.
//!
//! Guards are pure predicates over the (converted) arguments, the cached slots
//! of an activation and the properties of the tree a node is adopted into.
//! A guard that reads an argument is re-checked on every fast-path call; a
//! guard that reads only cached slots, literals or tree properties is checked
//! once, when the activation is created.

mod eval;
pub mod literal;

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use derive_more::Display;

use crate::error::Result;
use crate::value::Value;

pub(crate) use eval::{
    compile_guard, CachedView, CompiledGuard, GuardEnv, GuardReads, GuardScope,
};
pub use literal::parse_int_literal;

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    /// Integer source text, in any supported notation.
    Int(String),
    Bool(bool),
    Double(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// Positional argument of the rule.
    Arg(usize),
    /// Cached slot of the rule, by name.
    Cached(String),
    Literal(Literal),
    Null,
    /// Property of the root context the node is adopted into.
    Root(String),
}

impl Operand {
    pub fn arg(index: usize) -> Self {
        Operand::Arg(index)
    }

    pub fn cached(name: impl Into<String>) -> Self {
        Operand::Cached(name.into())
    }

    pub fn int(text: impl Into<String>) -> Self {
        Operand::Literal(Literal::Int(text.into()))
    }

    pub fn bool(value: bool) -> Self {
        Operand::Literal(Literal::Bool(value))
    }

    pub fn double(value: f64) -> Self {
        Operand::Literal(Literal::Double(value))
    }

    pub fn string(value: impl Into<String>) -> Self {
        Operand::Literal(Literal::Str(value.into()))
    }

    pub fn root(key: impl Into<String>) -> Self {
        Operand::Root(key.into())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum CompareOp {
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
}

impl CompareOp {
    pub fn is_equality(self) -> bool {
        matches!(self, CompareOp::Eq | CompareOp::Ne)
    }
}

type PredicateFn = Arc<dyn Fn(&[Value]) -> Result<bool> + Send + Sync>;

/// A host-evaluated predicate over resolved operands.
#[derive(Clone)]
pub struct Predicate {
    pub name: String,
    pub operands: Vec<Operand>,
    func: PredicateFn,
}

impl Predicate {
    pub fn new(
        name: impl Into<String>,
        operands: Vec<Operand>,
        func: impl Fn(&[Value]) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            operands,
            func: Arc::new(func),
        }
    }

    pub(crate) fn func(&self) -> PredicateFn {
        Arc::clone(&self.func)
    }
}

impl Debug for Predicate {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predicate")
            .field("name", &self.name)
            .field("operands", &self.operands)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum Guard {
    Compare {
        lhs: Operand,
        op: CompareOp,
        rhs: Operand,
    },
    Not(Box<Guard>),
    All(Vec<Guard>),
    Any(Vec<Guard>),
    Predicate(Predicate),
}

impl Guard {
    pub fn compare(lhs: Operand, op: CompareOp, rhs: Operand) -> Self {
        Guard::Compare { lhs, op, rhs }
    }

    pub fn eq(lhs: Operand, rhs: Operand) -> Self {
        Guard::compare(lhs, CompareOp::Eq, rhs)
    }

    pub fn ne(lhs: Operand, rhs: Operand) -> Self {
        Guard::compare(lhs, CompareOp::Ne, rhs)
    }

    pub fn is_null(operand: Operand) -> Self {
        Guard::eq(operand, Operand::Null)
    }

    pub fn not(guard: Guard) -> Self {
        Guard::Not(Box::new(guard))
    }

    pub fn predicate(
        name: impl Into<String>,
        operands: Vec<Operand>,
        func: impl Fn(&[Value]) -> Result<bool> + Send + Sync + 'static,
    ) -> Self {
        Guard::Predicate(Predicate::new(name, operands, func))
    }
}

impl std::fmt::Display for Operand {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Operand::Arg(index) => write!(f, "arg{}", index),
            Operand::Cached(name) => write!(f, "{}", name),
            Operand::Literal(Literal::Int(text)) => write!(f, "{}", text),
            Operand::Literal(Literal::Bool(v)) => write!(f, "{}", v),
            Operand::Literal(Literal::Double(v)) => write!(f, "{:?}", v),
            Operand::Literal(Literal::Str(v)) => write!(f, "{:?}", v),
            Operand::Null => write!(f, "null"),
            Operand::Root(key) => write!(f, "root.{}", key),
        }
    }
}
