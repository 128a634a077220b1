//! Implicit casts between value types.
//!
//! A rule whose parameter is declared as `T` also accepts arguments of any type
//! `S` for which a cast `S -> T` is declared. The argument is converted before
//! guards and the rule body see it.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::diagnostics::DeclarationErrors;
use crate::error::Result;
use crate::value::{Value, ValueType};

pub(crate) const CODE_AMBIGUOUS_CAST: &str = "specialize::decl::ambiguous_cast";

type CastFn = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

#[derive(Clone)]
pub struct ImplicitCast {
    pub from: ValueType,
    pub to: ValueType,
    pub name: String,
    convert: CastFn,
}

impl ImplicitCast {
    pub fn new(
        from: ValueType,
        to: ValueType,
        name: impl Into<String>,
        convert: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            from,
            to,
            name: name.into(),
            convert: Arc::new(convert),
        }
    }

    pub fn apply(&self, value: &Value) -> Result<Value> {
        (self.convert)(value)
    }
}

impl Debug for ImplicitCast {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImplicitCast")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("name", &self.name)
            .finish()
    }
}

/// The set of implicit casts available to the rules of one node kind.
#[derive(Debug, Clone, Default)]
pub struct TypeSystem {
    casts: Vec<ImplicitCast>,
}

impl TypeSystem {
    /// No casts at all.
    pub fn new() -> Self {
        Self::default()
    }

    /// Widening numeric casts: `int -> long`, `int -> double`, `long -> double`.
    pub fn numeric() -> Self {
        Self::new()
            .implicit_cast(ValueType::Int, ValueType::Long, "intToLong", |value| {
                match value {
                    Value::Int(v) => Ok(Value::Long(*v as i64)),
                    other => bail!("intToLong applied to {}", other),
                }
            })
            .implicit_cast(ValueType::Int, ValueType::Double, "intToDouble", |value| {
                match value {
                    Value::Int(v) => Ok(Value::Double(*v as f64)),
                    other => bail!("intToDouble applied to {}", other),
                }
            })
            .implicit_cast(ValueType::Long, ValueType::Double, "longToDouble", |value| {
                match value {
                    Value::Long(v) => Ok(Value::Double(*v as f64)),
                    other => bail!("longToDouble applied to {}", other),
                }
            })
    }

    pub fn implicit_cast(
        mut self,
        from: ValueType,
        to: ValueType,
        name: impl Into<String>,
        convert: impl Fn(&Value) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        self.casts.push(ImplicitCast::new(from, to, name, convert));
        self
    }

    pub fn casts(&self) -> &[ImplicitCast] {
        &self.casts
    }

    pub fn find_cast(&self, from: ValueType, to: ValueType) -> Option<&ImplicitCast> {
        self.casts
            .iter()
            .find(|cast| cast.from == from && cast.to == to)
    }

    /// Whether a `declared` parameter can receive a value statically typed `actual`.
    pub fn accepts_static(&self, declared: ValueType, actual: ValueType) -> bool {
        declared.accepts(actual) || self.find_cast(actual, declared).is_some()
    }

    /// Convert `value` for a parameter declared as `declared`.
    ///
    /// `Ok(None)` means the value is not acceptable for that parameter.
    pub fn coerce(&self, declared: ValueType, value: &Value) -> Result<Option<Value>> {
        let actual = value.value_type();
        if declared.accepts(actual) {
            return Ok(Some(value.clone()));
        }
        match self.find_cast(actual, declared) {
            Some(cast) => cast.apply(value).map(Some),
            None => Ok(None),
        }
    }

    /// Convert a whole argument list against declared parameter types.
    pub fn coerce_all(&self, params: &[ValueType], args: &[Value]) -> Result<Option<Vec<Value>>> {
        if params.len() != args.len() {
            return Ok(None);
        }
        let mut converted = Vec::with_capacity(args.len());
        for (declared, value) in params.iter().zip(args) {
            match self.coerce(*declared, value)? {
                Some(value) => converted.push(value),
                None => return Ok(None),
            }
        }
        Ok(Some(converted))
    }

    pub(crate) fn validate(&self, node: &str, errors: &mut DeclarationErrors) {
        for (index, cast) in self.casts.iter().enumerate() {
            let context = format!("{}::{}", node, cast.name);
            if cast.from == cast.to {
                declare_error!(
                    errors,
                    context,
                    CODE_AMBIGUOUS_CAST,
                    "implicit cast `{}` converts `{}` to itself",
                    cast.name,
                    cast.from
                );
                continue;
            }
            if cast.to.accepts(cast.from) {
                declare_error!(
                    errors,
                    context,
                    CODE_AMBIGUOUS_CAST,
                    "implicit cast `{}` targets `{}`, which already accepts `{}`",
                    cast.name,
                    cast.to,
                    cast.from
                );
                continue;
            }
            if let Some(earlier) = self.casts[..index]
                .iter()
                .find(|earlier| earlier.from == cast.from && earlier.to == cast.to)
            {
                errors.push(
                    crate::diagnostics::Diagnostic::error(format!(
                        "implicit casts `{}` and `{}` both convert `{}` to `{}`",
                        earlier.name, cast.name, cast.from, cast.to
                    ))
                    .with_source_context(context)
                    .with_code(CODE_AMBIGUOUS_CAST)
                    .with_suggestion("remove one of the conversions"),
                );
            }
        }
    }
}
