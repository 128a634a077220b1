mod support;

use fp_specialize::{NodeCost, ReadArgument, Result, Value};
use pretty_assertions::assert_eq;
use support::{describe_factory, describe_spec, frame, init_tracing};

#[test]
fn test_cost_follows_observed_shapes_in_order() -> Result<()> {
    init_tracing();
    let factory = describe_factory(3)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    let f = frame();

    assert_eq!(node.cost(), NodeCost::Uninitialized);

    assert_eq!(node.execute_with(&f, &[Value::int(21)])?, Value::string("int:21"));
    assert_eq!(node.cost(), NodeCost::Monomorphic);

    assert_eq!(node.execute_with(&f, &[Value::bool(true)])?, Value::string("boolean:true"));
    assert_eq!(node.cost(), NodeCost::Polymorphic);

    assert_eq!(node.execute_with(&f, &[Value::string("s")])?, Value::string("String:s"));
    assert_eq!(node.cost(), NodeCost::Polymorphic);
    assert_eq!(node.activations(), 3);
    assert!(!node.is_collapsed());
    Ok(())
}

#[test]
fn test_fourth_shape_collapses_permanently() -> Result<()> {
    init_tracing();
    let factory = describe_factory(3)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    let f = frame();

    node.execute_with(&f, &[Value::int(21)])?;
    node.execute_with(&f, &[Value::bool(true)])?;
    node.execute_with(&f, &[Value::string("s")])?;
    assert_eq!(node.execute_with(&f, &[Value::double(1.5)])?, Value::string("double:1.5"));

    assert_eq!(node.cost(), NodeCost::Megamorphic);
    assert!(node.is_collapsed());
    assert_eq!(node.activations(), 1);

    // Every shape seen before still resolves through generic dispatch.
    assert_eq!(node.execute_with(&f, &[Value::int(21)])?, Value::string("int:21"));
    assert_eq!(node.execute_with(&f, &[Value::bool(false)])?, Value::string("boolean:false"));
    assert_eq!(node.execute_with(&f, &[Value::string("t")])?, Value::string("String:t"));
    assert_eq!(node.cost(), NodeCost::Megamorphic);
    Ok(())
}

#[test]
fn test_repeated_shape_reuses_its_activation() -> Result<()> {
    let factory = describe_factory(3)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    for value in 0..10 {
        node.execute_with(&frame(), &[Value::int(value)])?;
    }
    assert_eq!(node.activations(), 1);
    assert_eq!(node.cost(), NodeCost::Monomorphic);
    Ok(())
}

#[test]
fn test_limit_of_one_collapses_on_second_shape() -> Result<()> {
    let factory = describe_factory(1)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    node.execute_with(&frame(), &[Value::int(1)])?;
    assert_eq!(node.cost(), NodeCost::Monomorphic);
    assert_eq!(node.execute_with(&frame(), &[Value::bool(true)])?, Value::string("boolean:true"));
    assert_eq!(node.cost(), NodeCost::Megamorphic);
    Ok(())
}

#[test]
fn test_cost_override_is_reported_verbatim() -> Result<()> {
    let kind = describe_spec(3).cost_override(NodeCost::None).build()?;
    let factory = fp_specialize::NodeFactory::new(kind);
    let node = factory.create(vec![ReadArgument::new(0)])?;

    assert_eq!(node.cost(), NodeCost::None);
    node.execute_with(&frame(), &[Value::int(1)])?;
    node.execute_with(&frame(), &[Value::bool(true)])?;
    assert_eq!(node.cost(), NodeCost::None);
    assert_eq!(node.introspect().cost, NodeCost::None);
    Ok(())
}

#[test]
fn test_cost_renders_in_upper_case() {
    assert_eq!(NodeCost::Megamorphic.to_string(), "MEGAMORPHIC");
    assert_eq!(
        serde_json::to_value(NodeCost::Monomorphic).ok(),
        Some(serde_json::json!("MONOMORPHIC"))
    );
}
