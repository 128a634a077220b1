use std::fmt::{Display, Formatter};
use std::result;

use miette::Diagnostic;
use thiserror::Error;

use crate::diagnostics::DeclarationErrors;
use crate::value::{Shape, Value, ValueType};

#[derive(Error, Debug, Diagnostic)]
pub enum Error {
    #[error("{0}")]
    #[diagnostic(code(specialize::declaration))]
    Declaration(DeclarationErrors),

    #[error("unsupported specialization in `{node}` for argument shape {shape}")]
    #[diagnostic(
        code(specialize::unsupported),
        help("declare a rule accepting this shape, or a fallback rule")
    )]
    UnsupportedSpecialization { node: String, shape: Shape },

    #[error("expected a `{expected}` result but the node produced {value}")]
    #[diagnostic(
        code(specialize::unexpected_result),
        help("retry through the generic `execute` entry point")
    )]
    UnexpectedResult { expected: ValueType, value: Value },

    #[error("uncaught condition {0}")]
    #[diagnostic(code(specialize::raised))]
    Raised(Condition),

    #[error("node `{node}` read its tree context before it was adopted")]
    #[diagnostic(
        code(specialize::not_adopted),
        help("adopt the node into a tree before executing guards that read root properties")
    )]
    NotAdopted { node: String },

    #[error("node kind `{node}` does not declare uncached support")]
    #[diagnostic(code(specialize::uncached_unsupported))]
    UncachedUnsupported { node: String },

    #[error("node kind `{node}` has no method `{method}`")]
    #[diagnostic(code(specialize::unknown_method))]
    UnknownMethod { node: String, method: String },

    #[error("node `{node}` expects {expected} argument(s), got {actual}")]
    #[diagnostic(code(specialize::arity))]
    Arity {
        node: String,
        expected: usize,
        actual: usize,
    },

    #[error("Generic error: {0}")]
    #[diagnostic(code(specialize::generic))]
    Generic(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    /// The value carried by an [`Error::UnexpectedResult`], if this is one.
    pub fn into_unexpected_value(self) -> result::Result<Value, Error> {
        match self {
            Error::UnexpectedResult { value, .. } => Ok(value),
            other => Err(other),
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Generic(err.to_string())
    }
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Generic(s)
    }
}

/// A named, exception-like condition a rule body can raise.
///
/// Rules list the condition kinds they are excluded on; a raised condition
/// whose kind is not in that list escapes as [`Error::Raised`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub kind: String,
    pub message: String,
}

impl Condition {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }
}

impl Display for Condition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "`{}`", self.kind)
        } else {
            write!(f, "`{}`: {}", self.kind, self.message)
        }
    }
}

/// Abnormal completion of a rule body.
#[derive(Debug)]
pub enum Raised {
    Condition(Condition),
    Error(Error),
}

impl From<Error> for Raised {
    fn from(err: Error) -> Self {
        Raised::Error(err)
    }
}

impl From<Condition> for Raised {
    fn from(condition: Condition) -> Self {
        Raised::Condition(condition)
    }
}

impl From<eyre::Report> for Raised {
    fn from(err: eyre::Report) -> Self {
        Raised::Error(err.into())
    }
}

/// Result type of rule bodies.
pub type BodyResult = result::Result<Value, Raised>;
