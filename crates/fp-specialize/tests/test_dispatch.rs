mod support;

use std::sync::Arc;

use fp_specialize::{
    CachedSlot, ChildNode, Constant, Error, Frame, Initializer, Interface, NodeCost, NodeFactory,
    NodeSpec, ReadArgument, Result, RootContext, Shape, SpecializationRule, TypeSystem, Value,
    ValueType,
};
use pretty_assertions::assert_eq;
use support::{add_spec, describe_factory, frame};

#[test]
fn test_unmatched_shape_is_unsupported() -> Result<()> {
    let factory = describe_factory(3)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    let err = node.execute_with(&frame(), &[Value::Null]).unwrap_err();
    match err {
        Error::UnsupportedSpecialization { node, shape } => {
            assert_eq!(node, "Describe");
            assert_eq!(shape, Shape::new([ValueType::Null]));
            assert_eq!(shape.to_string(), "(null)");
        }
        other => panic!("unexpected error {other}"),
    }
    assert_eq!(node.cost(), NodeCost::Uninitialized);
    Ok(())
}

#[test]
fn test_earliest_declared_rule_wins_between_casts() -> Result<()> {
    let spec = NodeSpec::new("Widen", 1)
        .types(TypeSystem::numeric())
        .rule(SpecializationRule::new("doLong", [ValueType::Long], |inv| {
            Ok(Value::string(format!("long:{}", inv.arg(0))))
        }))
        .rule(SpecializationRule::new("doDouble", [ValueType::Double], |inv| {
            Ok(Value::string(format!("double:{}", inv.arg(0))))
        }));
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;

    assert_eq!(node.execute_with(&frame(), &[Value::int(7)])?, Value::string("long:7L"));
    assert_eq!(node.execute_with(&frame(), &[Value::double(0.5)])?, Value::string("double:0.5"));
    Ok(())
}

#[test]
fn test_typed_entry_points() -> Result<()> {
    let factory = NodeFactory::from_spec(add_spec())?;
    let node = factory.create(vec![ReadArgument::new(0), ReadArgument::new(1)])?;
    let args = [Value::int(1), Value::int(2)];

    assert_eq!(node.execute_int_with(&frame(), &args)?, 3);

    let err = node.execute_long_with(&frame(), &args).unwrap_err();
    assert!(matches!(err, Error::UnexpectedResult { expected: ValueType::Long, .. }));
    // The caller recovers the value and continues generically.
    assert_eq!(err.into_unexpected_value()?, Value::int(3));

    let longs = [Value::long(1), Value::long(2)];
    assert_eq!(node.execute_long_with(&frame(), &longs)?, 3);
    assert!(node.execute_bool_with(&frame(), &longs).is_err());
    Ok(())
}

#[test]
fn test_children_are_evaluated_against_the_frame() -> Result<()> {
    let factory = NodeFactory::from_spec(add_spec())?;
    let inner = factory.create(vec![ReadArgument::new(0), Constant::new(5)])?;
    let outer = factory.create(vec![inner as Arc<dyn ChildNode>, ReadArgument::new(1)])?;

    let frame = Frame::new(vec![Value::int(2), Value::int(10)]);
    assert_eq!(outer.execute(&frame)?, Value::int(17));
    assert_eq!(outer.execute_int(&frame)?, 17);

    let strings = Frame::new(vec![Value::string("a"), Value::string("b")]);
    let concat = factory.create(vec![ReadArgument::new(0), ReadArgument::new(1)])?;
    assert_eq!(concat.execute(&strings)?, Value::string("ab"));
    assert!(concat.execute(&Frame::empty()).is_err());
    Ok(())
}

#[test]
fn test_arity_is_checked() -> Result<()> {
    let factory = NodeFactory::from_spec(add_spec())?;
    let err = factory.create(vec![ReadArgument::new(0)]).unwrap_err();
    assert!(matches!(err, Error::Arity { expected: 2, actual: 1, .. }));

    let node = factory.create(vec![ReadArgument::new(0), ReadArgument::new(1)])?;
    let err = node.execute_with(&frame(), &[Value::int(1)]).unwrap_err();
    assert!(matches!(err, Error::Arity { expected: 2, actual: 1, .. }));
    Ok(())
}

#[test]
fn test_root_properties_require_adoption() -> Result<()> {
    let spec = NodeSpec::new("Scaled", 1).rule(
        SpecializationRule::new("doInt", [ValueType::Int], |inv| {
            let factor = inv.cached("factor").and_then(Value::as_int).unwrap_or(1);
            Ok(Value::int(inv.arg(0).as_int().unwrap_or_default() * factor))
        })
        .cached(CachedSlot::new(
            "factor",
            ValueType::Int,
            Initializer::new("root.factor", |ctx| {
                Ok(ctx.root()?.property("factor").cloned().unwrap_or(Value::int(1)))
            }),
        )),
    );
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;

    let err = node.execute_with(&frame(), &[Value::int(3)]).unwrap_err();
    assert!(matches!(err, Error::NotAdopted { .. }));
    assert_eq!(node.cost(), NodeCost::Uninitialized);

    node.adopt(&Arc::new(RootContext::new("main").with_property("factor", 4)));
    assert_eq!(node.execute_with(&frame(), &[Value::int(3)])?, Value::int(12));
    Ok(())
}

#[test]
fn test_frame_context_reaches_bodies() -> Result<()> {
    let spec = NodeSpec::new("Context", 0).rule(SpecializationRule::new(
        "doRead",
        Vec::<ValueType>::new(),
        |inv| Ok(Value::int(inv.frame.context::<i32>().copied().unwrap_or(-1))),
    ));
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(Vec::new())?;

    assert_eq!(node.execute(&Frame::empty().with_context(Arc::new(42i32)))?, Value::int(42));
    assert_eq!(node.execute(&Frame::empty())?, Value::int(-1));
    Ok(())
}

#[test]
fn test_fallback_applies_only_when_nothing_else_does() -> Result<()> {
    let spec = NodeSpec::new("Fallback", 1)
        .rule(SpecializationRule::new("doInt", [ValueType::Int], |_| Ok(Value::string("int"))))
        .rule(SpecializationRule::fallback("doOther", 1, |inv| {
            Ok(Value::string(format!("other:{}", inv.arg(0))))
        }));
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;

    assert_eq!(node.execute_with(&frame(), &[Value::bool(true)])?, Value::string("other:true"));
    assert_eq!(node.cost(), NodeCost::Monomorphic);
    assert_eq!(node.execute_with(&frame(), &[Value::int(1)])?, Value::string("int"));
    assert_eq!(node.execute_with(&frame(), &[Value::Null])?, Value::string("other:null"));
    assert_eq!(node.activations(), 2);
    assert_eq!(node.introspect().active_names(), vec!["doInt", "doOther"]);
    Ok(())
}

#[test]
fn test_inline_slots_live_in_node_storage() -> Result<()> {
    let spec = NodeSpec::new("Scale", 1).rule(
        SpecializationRule::new("doInt", [ValueType::Int], |inv| {
            let scale = inv.cached("scale").and_then(Value::as_int).unwrap_or_default();
            Ok(Value::int(inv.arg(0).as_int().unwrap_or_default() * scale))
        })
        .cached(
            CachedSlot::new("scale", ValueType::Int, Initializer::new("3", |_| Ok(Value::int(3))))
                .inline(),
        ),
    );
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;

    assert_eq!(node.execute_with(&frame(), &[Value::int(2)])?, Value::int(6));
    let copy = node.deep_copy();
    assert_eq!(copy.execute_with(&frame(), &[Value::int(5)])?, Value::int(15));

    let info = copy.introspect();
    let scale = &info.specialization("doInt").expect("declared").instances[0][0];
    assert_eq!(scale.value, Value::int(3));
    Ok(())
}

#[test]
fn test_host_methods() -> Result<()> {
    let spec = support::describe_spec(3)
        .implements(Interface::new("Named").method("label"))
        .method("label", |node, _frame, args| {
            Ok(Value::string(format!("{}/{}", node.name(), args.len())))
        });
    let factory = NodeFactory::from_spec(spec)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;

    assert_eq!(
        node.call_method("label", &frame(), &[Value::Null])?,
        Value::string("Describe/1")
    );
    let err = node.call_method("missing", &frame(), &[]).unwrap_err();
    assert!(matches!(err, Error::UnknownMethod { .. }));
    Ok(())
}
