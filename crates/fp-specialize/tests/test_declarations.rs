mod support;

use fp_specialize::diagnostics::{DeclarationErrors, DiagnosticTemplate};
use fp_specialize::{
    CachedSlot, Error, Guard, Initializer, Interface, NodeSpec, Operand, SpecializationRule,
    TypeSystem, Value, ValueType,
};
use pretty_assertions::assert_eq;
use support::describe_spec;

fn rejected(spec: NodeSpec) -> DeclarationErrors {
    match spec.build() {
        Err(Error::Declaration(errors)) => errors,
        Err(other) => panic!("expected a declaration error, got {other}"),
        Ok(kind) => panic!("expected `{}` to be rejected", kind.name()),
    }
}

fn codes(errors: &DeclarationErrors) -> Vec<&str> {
    errors
        .errors()
        .filter_map(|diagnostic| diagnostic.code.as_deref())
        .collect()
}

fn ok(_: &fp_specialize::Invocation<'_>) -> fp_specialize::BodyResult {
    Ok(Value::Null)
}

fn constant(expression: &str, value: i32) -> Initializer {
    Initializer::new(expression, move |_| Ok(Value::int(value)))
}

#[test]
fn test_missing_methods_yield_one_error_each() {
    let callable = Interface::new("Callable").method("call").method("arity");
    let errors = rejected(describe_spec(3).implements(callable));

    assert_eq!(codes(&errors), vec!["specialize::decl::unimplemented"; 2]);
    assert_eq!(errors.for_context("Describe::call").count(), 1);
    assert_eq!(errors.for_context("Describe::arity").count(), 1);
}

#[test]
fn test_unknown_and_provided_methods() {
    let callable = Interface::new("Callable").method("call");
    let errors = rejected(
        describe_spec(3)
            .implements(callable)
            .method("call", |_, _, _| Ok(Value::Null))
            .method("invoke", |_, _, _| Ok(Value::Null)),
    );
    assert_eq!(codes(&errors), vec!["specialize::decl::unknown_method"]);
    assert_eq!(errors.for_context("Describe::invoke").count(), 1);
}

#[test]
fn test_every_problem_is_reported_at_once() {
    let spec = NodeSpec::new("Broken", 1)
        .rule(SpecializationRule::new("doPair", [ValueType::Int, ValueType::Int], ok))
        .rule(SpecializationRule::new("doInt", [ValueType::Int], ok).replaces("doMissing"))
        .rule(
            SpecializationRule::new("doString", [ValueType::Str], ok)
                .guard(Guard::eq(Operand::cached("nope"), Operand::string("x")))
                .limit(0),
        )
        .rule(SpecializationRule::new("doString", [ValueType::Str], ok));
    let errors = rejected(spec);

    assert_eq!(
        codes(&errors),
        vec![
            "specialize::decl::arity",
            "specialize::decl::replaces",
            "specialize::decl::limit",
            "specialize::decl::guard_operand",
            "specialize::decl::duplicate",
        ]
    );
    assert_eq!(errors.for_context("Broken::doPair").count(), 1);
}

#[test]
fn test_node_without_rules_or_with_zero_limit() {
    let errors = rejected(NodeSpec::new("Empty", 0).limit(0));
    assert_eq!(
        codes(&errors),
        vec!["specialize::decl::no_rules", "specialize::decl::limit"]
    );
}

#[test]
fn test_replaces_must_name_an_earlier_rule() {
    let spec = NodeSpec::new("Order", 1)
        .rule(SpecializationRule::new("doInt", [ValueType::Int], ok).replaces("doObject"))
        .rule(SpecializationRule::new("doObject", [ValueType::Object], ok));
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::replaces"]);
}

#[test]
fn test_ambiguous_implicit_casts() {
    let types = TypeSystem::numeric()
        .implicit_cast(ValueType::Int, ValueType::Long, "intToLongAgain", |value| {
            Ok(Value::long(value.as_int().unwrap_or_default() as i64))
        })
        .implicit_cast(ValueType::Int, ValueType::Int, "intToInt", |value| Ok(value.clone()));
    let errors = rejected(describe_spec(3).types(types));

    assert_eq!(codes(&errors), vec!["specialize::decl::ambiguous_cast"; 2]);
    assert_eq!(errors.for_context("Describe::intToLongAgain").count(), 1);
    assert_eq!(errors.for_context("Describe::intToInt").count(), 1);
}

#[test]
fn test_shared_and_exclusive_conflict() {
    let spec = NodeSpec::new("Conflict", 1).rule(
        SpecializationRule::new("doInt", [ValueType::Int], ok).cached(
            CachedSlot::new("state", ValueType::Int, constant("0", 0))
                .shared("state")
                .exclusive(),
        ),
    );
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::shared"]);
    assert_eq!(errors.for_context("Conflict::doInt::state").count(), 1);
}

#[test]
fn test_shared_group_members_must_agree() {
    let spec = NodeSpec::new("Groups", 1)
        .rule(
            SpecializationRule::new("doInt", [ValueType::Int], ok)
                .cached(CachedSlot::new("state", ValueType::Int, constant("0", 0)).shared("g")),
        )
        .rule(
            SpecializationRule::new("doBool", [ValueType::Bool], ok)
                .cached(CachedSlot::new("state", ValueType::Int, constant("1", 1)).shared("g")),
        )
        .rule(
            SpecializationRule::new("doString", [ValueType::Str], ok)
                .cached(CachedSlot::new("state", ValueType::Long, constant("0", 0)).shared("g")),
        );
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::shared"; 2]);
    assert_eq!(errors.for_context("Groups::doBool::state").count(), 1);
    assert_eq!(errors.for_context("Groups::doString::state").count(), 1);
}

#[test]
fn test_inline_slot_requires_single_instance_rule() {
    let spec = NodeSpec::new("Inline", 1).rule(
        SpecializationRule::new("doInt", [ValueType::Int], ok)
            .cached(CachedSlot::new("scale", ValueType::Int, constant("2", 2)).inline())
            .limit(3),
    );
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::inline"]);
}

#[test]
fn test_fallback_must_be_last() {
    let spec = NodeSpec::new("Fallback", 1)
        .rule(SpecializationRule::fallback("doOther", 1, ok))
        .rule(SpecializationRule::new("doInt", [ValueType::Int], ok));
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::fallback"]);
}

#[test]
fn test_rule_shadowed_by_earlier_rule_is_unreachable() {
    let spec = NodeSpec::new("Shadow", 1)
        .rule(SpecializationRule::new("doObject", [ValueType::Object], ok))
        .rule(SpecializationRule::new("doInt", [ValueType::Int], ok));
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::unreachable"]);
    assert_eq!(errors.for_context("Shadow::doInt").count(), 1);
}

#[test]
fn test_widened_rule_shadows_narrower_one() {
    let spec = NodeSpec::new("Widen", 1)
        .types(TypeSystem::numeric())
        .rule(SpecializationRule::new("doLong", [ValueType::Long], ok))
        .rule(SpecializationRule::new("doInt", [ValueType::Int], ok));
    let errors = rejected(spec);
    assert_eq!(codes(&errors), vec!["specialize::decl::unreachable"]);
}

#[test]
fn test_required_signature_must_be_covered() {
    let errors = rejected(
        describe_spec(3)
            .require_signature([ValueType::Int])
            .require_signature([ValueType::Long]),
    );
    assert_eq!(codes(&errors), vec!["specialize::decl::signature"]);

    let covered = describe_spec(3)
        .types(TypeSystem::numeric())
        .require_signature([ValueType::Int]);
    assert!(covered.build().is_ok());
}

#[test]
fn test_declaration_errors_render() {
    let errors = rejected(NodeSpec::new("Empty", 1));
    let message = Error::Declaration(errors.clone()).to_string();
    assert!(message.starts_with("node kind `Empty` has 1 declaration error"));

    let plain = errors.render(DiagnosticTemplate::Plain);
    assert!(plain.iter().any(|line| line.contains("no specialization rules")));
}
