use std::cmp::Ordering;
use std::sync::Arc;

use crate::diagnostics::{DeclarationErrors, Diagnostic};
use crate::error::{Error, Result};
use crate::guard::literal::parse_int_literal;
use crate::guard::{CompareOp, Guard, Literal, Operand};
use crate::rule::SlotLocation;
use crate::tree::RootContext;
use crate::value::{Value, ValueType};

pub(crate) const CODE_GUARD_OPERAND: &str = "specialize::decl::guard_operand";
pub(crate) const CODE_GUARD_TYPES: &str = "specialize::decl::guard_types";
pub(crate) const CODE_NULL_PRIMITIVE: &str = "specialize::decl::null_primitive";
pub(crate) const CODE_LITERAL: &str = "specialize::decl::literal";

/// What a guard reads; decides when it has to be evaluated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct GuardReads {
    pub dynamic: bool,
    pub cached: bool,
    pub root: bool,
}

impl GuardReads {
    fn merge(self, other: GuardReads) -> GuardReads {
        GuardReads {
            dynamic: self.dynamic || other.dynamic,
            cached: self.cached || other.cached,
            root: self.root || other.root,
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) enum ResolvedOperand {
    Arg(usize),
    Cached(usize),
    Value(Value),
    Root(String),
}

#[derive(Clone)]
pub(crate) enum CompiledGuard {
    Compare {
        lhs: ResolvedOperand,
        op: CompareOp,
        rhs: ResolvedOperand,
    },
    Not(Box<CompiledGuard>),
    All(Vec<CompiledGuard>),
    Any(Vec<CompiledGuard>),
    Predicate {
        name: String,
        operands: Vec<ResolvedOperand>,
        func: Arc<dyn Fn(&[Value]) -> Result<bool> + Send + Sync>,
    },
}

/// Read-only view of an activation's cached slots.
#[derive(Clone, Copy)]
pub(crate) struct CachedView<'a> {
    values: &'a [Value],
    inline: &'a [Option<Value>],
    locations: Option<&'a [SlotLocation]>,
}

impl<'a> CachedView<'a> {
    pub fn empty() -> Self {
        Self::detached(&[])
    }

    /// Slot values laid out by slot index, with nothing stored inline.
    pub fn detached(values: &'a [Value]) -> Self {
        Self {
            values,
            inline: &[],
            locations: None,
        }
    }

    pub fn installed(
        values: &'a [Value],
        inline: &'a [Option<Value>],
        locations: &'a [SlotLocation],
    ) -> Self {
        Self {
            values,
            inline,
            locations: Some(locations),
        }
    }

    pub fn get(&self, slot: usize) -> Option<&'a Value> {
        match self.locations {
            None => self.values.get(slot),
            Some(locations) => match locations.get(slot)? {
                SlotLocation::Entry => self.values.get(slot),
                SlotLocation::Inline(index) => self.inline.get(*index)?.as_ref(),
            },
        }
    }
}

pub(crate) struct GuardEnv<'a> {
    pub args: &'a [Value],
    pub cached: CachedView<'a>,
    pub root: Option<&'a RootContext>,
    pub node: &'a str,
}

impl CompiledGuard {
    pub fn evaluate(&self, env: &GuardEnv<'_>) -> Result<bool> {
        match self {
            CompiledGuard::Compare { lhs, op, rhs } => {
                let lhs = resolve(lhs, env)?;
                let rhs = resolve(rhs, env)?;
                compare_values(&lhs, *op, &rhs)
            }
            CompiledGuard::Not(inner) => Ok(!inner.evaluate(env)?),
            CompiledGuard::All(guards) => {
                for guard in guards {
                    if !guard.evaluate(env)? {
                        return Ok(false);
                    }
                }
                Ok(true)
            }
            CompiledGuard::Any(guards) => {
                for guard in guards {
                    if guard.evaluate(env)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            CompiledGuard::Predicate { operands, func, .. } => {
                let values = operands
                    .iter()
                    .map(|operand| resolve(operand, env))
                    .collect::<Result<Vec<_>>>()?;
                func(&values)
            }
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CompiledGuard::Compare { op, .. } => format!("comparison `{}`", op),
            CompiledGuard::Not(inner) => format!("!{}", inner.describe()),
            CompiledGuard::All(_) => "all(..)".to_string(),
            CompiledGuard::Any(_) => "any(..)".to_string(),
            CompiledGuard::Predicate { name, .. } => name.clone(),
        }
    }
}

fn resolve(operand: &ResolvedOperand, env: &GuardEnv<'_>) -> Result<Value> {
    match operand {
        ResolvedOperand::Arg(index) => env.args.get(*index).cloned().ok_or_else(|| {
            Error::Generic(format!("guard of `{}` reads missing argument {}", env.node, index))
        }),
        ResolvedOperand::Cached(slot) => env.cached.get(*slot).cloned().ok_or_else(|| {
            Error::Generic(format!("guard of `{}` reads unset cached slot {}", env.node, slot))
        }),
        ResolvedOperand::Value(value) => Ok(value.clone()),
        ResolvedOperand::Root(key) => {
            let root = env.root.ok_or_else(|| Error::NotAdopted {
                node: env.node.to_string(),
            })?;
            Ok(root.property(key).cloned().unwrap_or(Value::Null))
        }
    }
}

pub(crate) fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    if let (Some(l), Some(r)) = (lhs.as_integral(), rhs.as_integral()) {
        return l == r;
    }
    if let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) {
        return l == r;
    }
    lhs == rhs
}

fn order(lhs: &Value, rhs: &Value) -> Result<Option<Ordering>> {
    if let (Some(l), Some(r)) = (lhs.as_integral(), rhs.as_integral()) {
        return Ok(Some(l.cmp(&r)));
    }
    if let (Some(l), Some(r)) = (lhs.as_f64(), rhs.as_f64()) {
        return Ok(l.partial_cmp(&r));
    }
    match (lhs, rhs) {
        (Value::Str(l), Value::Str(r)) => Ok(Some(l.cmp(r))),
        _ => Err(Error::Generic(format!("cannot order {} and {}", lhs, rhs))),
    }
}

fn compare_values(lhs: &Value, op: CompareOp, rhs: &Value) -> Result<bool> {
    match op {
        CompareOp::Eq => Ok(values_equal(lhs, rhs)),
        CompareOp::Ne => Ok(!values_equal(lhs, rhs)),
        _ => {
            let Some(ordering) = order(lhs, rhs)? else {
                return Ok(false);
            };
            Ok(match op {
                CompareOp::Lt => ordering.is_lt(),
                CompareOp::Le => ordering.is_le(),
                CompareOp::Gt => ordering.is_gt(),
                CompareOp::Ge => ordering.is_ge(),
                CompareOp::Eq | CompareOp::Ne => unreachable!(),
            })
        }
    }
}

// ===== DECLARATION-TIME COMPILATION =====

/// Names and types a guard of one rule may refer to.
pub(crate) struct GuardScope<'a> {
    pub params: &'a [ValueType],
    pub slots: &'a [(String, ValueType)],
    /// Element the diagnostics are reported against, e.g. `Add::doInt`.
    pub context: &'a str,
}

struct Typed {
    operand: ResolvedOperand,
    ty: ValueType,
    reads: GuardReads,
}

/// Compile a guard, type-checking every operand. All problems are recorded in
/// `errors`; `None` is returned if any was found.
pub(crate) fn compile_guard(
    guard: &Guard,
    scope: &GuardScope<'_>,
    errors: &mut DeclarationErrors,
) -> Option<(CompiledGuard, GuardReads)> {
    match guard {
        Guard::Compare { lhs, op, rhs } => {
            let left = compile_operand(lhs, scope, errors);
            let right = compile_operand(rhs, scope, errors);
            let (left, right) = (left?, right?);
            if !check_comparison(lhs, &left, *op, rhs, &right, scope, errors) {
                return None;
            }
            let reads = left.reads.merge(right.reads);
            Some((
                CompiledGuard::Compare {
                    lhs: left.operand,
                    op: *op,
                    rhs: right.operand,
                },
                reads,
            ))
        }
        Guard::Not(inner) => {
            let (inner, reads) = compile_guard(inner, scope, errors)?;
            Some((CompiledGuard::Not(Box::new(inner)), reads))
        }
        Guard::All(guards) | Guard::Any(guards) => {
            let mut compiled = Vec::with_capacity(guards.len());
            let mut reads = GuardReads::default();
            let mut ok = true;
            for guard in guards {
                match compile_guard(guard, scope, errors) {
                    Some((guard, guard_reads)) => {
                        reads = reads.merge(guard_reads);
                        compiled.push(guard);
                    }
                    None => ok = false,
                }
            }
            if !ok {
                return None;
            }
            let compiled = match guard {
                Guard::All(_) => CompiledGuard::All(compiled),
                _ => CompiledGuard::Any(compiled),
            };
            Some((compiled, reads))
        }
        Guard::Predicate(predicate) => {
            let mut operands = Vec::with_capacity(predicate.operands.len());
            let mut reads = GuardReads::default();
            let mut ok = true;
            for operand in &predicate.operands {
                match compile_operand(operand, scope, errors) {
                    Some(typed) => {
                        reads = reads.merge(typed.reads);
                        operands.push(typed.operand);
                    }
                    None => ok = false,
                }
            }
            if !ok {
                return None;
            }
            Some((
                CompiledGuard::Predicate {
                    name: predicate.name.clone(),
                    operands,
                    func: predicate.func(),
                },
                reads,
            ))
        }
    }
}

fn compile_operand(
    operand: &Operand,
    scope: &GuardScope<'_>,
    errors: &mut DeclarationErrors,
) -> Option<Typed> {
    match operand {
        Operand::Arg(index) => match scope.params.get(*index) {
            Some(ty) => Some(Typed {
                operand: ResolvedOperand::Arg(*index),
                ty: *ty,
                reads: GuardReads {
                    dynamic: true,
                    ..GuardReads::default()
                },
            }),
            None => {
                declare_error!(
                    errors,
                    scope.context,
                    CODE_GUARD_OPERAND,
                    "guard reads argument {} but the rule takes {} parameter(s)",
                    index,
                    scope.params.len()
                );
                None
            }
        },
        Operand::Cached(name) => {
            match scope.slots.iter().position(|(slot, _)| slot == name) {
                Some(index) => Some(Typed {
                    operand: ResolvedOperand::Cached(index),
                    ty: scope.slots[index].1,
                    reads: GuardReads {
                        cached: true,
                        ..GuardReads::default()
                    },
                }),
                None => {
                    declare_error!(
                        errors,
                        scope.context,
                        CODE_GUARD_OPERAND,
                        "guard reads unknown cached slot `{}`",
                        name
                    );
                    None
                }
            }
        }
        Operand::Literal(literal) => {
            let value = match literal {
                Literal::Int(text) => match parse_int_literal(text) {
                    Ok(value) => value,
                    Err(message) => {
                        declare_error!(errors, scope.context, CODE_LITERAL, "{}", message);
                        return None;
                    }
                },
                Literal::Bool(v) => Value::Bool(*v),
                Literal::Double(v) => Value::Double(*v),
                Literal::Str(v) => Value::string(v),
            };
            Some(Typed {
                ty: value.value_type(),
                operand: ResolvedOperand::Value(value),
                reads: GuardReads::default(),
            })
        }
        Operand::Null => Some(Typed {
            operand: ResolvedOperand::Value(Value::Null),
            ty: ValueType::Null,
            reads: GuardReads::default(),
        }),
        Operand::Root(key) => Some(Typed {
            operand: ResolvedOperand::Root(key.clone()),
            ty: ValueType::Object,
            reads: GuardReads {
                root: true,
                ..GuardReads::default()
            },
        }),
    }
}

fn describe_operand(operand: &Operand, typed: &Typed) -> String {
    format!("`{}` of type `{}`", operand, typed.ty)
}

fn check_comparison(
    lhs: &Operand,
    left: &Typed,
    op: CompareOp,
    rhs: &Operand,
    right: &Typed,
    scope: &GuardScope<'_>,
    errors: &mut DeclarationErrors,
) -> bool {
    let (lt, rt) = (left.ty, right.ty);

    if lt == ValueType::Null || rt == ValueType::Null {
        let (operand, typed) = if lt == ValueType::Null {
            (rhs, right)
        } else {
            (lhs, left)
        };
        if !op.is_equality() {
            declare_error!(
                errors,
                scope.context,
                CODE_GUARD_TYPES,
                "operator `{}` cannot be applied to null",
                op
            );
            return false;
        }
        if !typed.ty.admits_null() {
            errors.push(
                Diagnostic::error(format!(
                    "cannot compare primitive {} to null",
                    describe_operand(operand, typed)
                ))
                .with_source_context(scope.context)
                .with_code(CODE_NULL_PRIMITIVE)
                .with_suggestion("only reference-typed operands can be compared to null"),
            );
            return false;
        }
        return true;
    }

    let compatible = if lt == ValueType::Object || rt == ValueType::Object {
        true
    } else if op.is_equality() {
        lt == rt || (lt.is_numeric() && rt.is_numeric())
    } else {
        (lt.is_numeric() && rt.is_numeric()) || (lt == ValueType::Str && rt == ValueType::Str)
    };

    if !compatible {
        declare_error!(
            errors,
            scope.context,
            CODE_GUARD_TYPES,
            "incompatible operand types in `{} {} {}`: {} and {}",
            lhs,
            op,
            rhs,
            describe_operand(lhs, left),
            describe_operand(rhs, right)
        );
    }
    compatible
}
