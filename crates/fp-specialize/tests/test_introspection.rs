mod support;

use fp_specialize::{NodeFactory, ReadArgument, Result, Value};
use pretty_assertions::assert_eq;
use serde_json::json;
use support::{cached_identity_spec, describe_factory, frame, Counter};

#[test]
fn test_introspection_lists_every_rule() -> Result<()> {
    let factory = describe_factory(3)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    node.execute_with(&frame(), &[Value::bool(true)])?;

    let json = node.introspect().to_json()?;
    assert_eq!(
        json,
        json!({
            "node": "Describe",
            "cost": "MONOMORPHIC",
            "collapsed": false,
            "specializations": [
                { "name": "doInt", "active": false, "excluded": false, "instances": [] },
                { "name": "doBoolean", "active": true, "excluded": false, "instances": [[]] },
                { "name": "doString", "active": false, "excluded": false, "instances": [] },
                { "name": "doDouble", "active": false, "excluded": false, "instances": [] },
            ]
        })
    );
    Ok(())
}

#[test]
fn test_introspection_reports_cached_values() -> Result<()> {
    let counter = Counter::new();
    let factory = NodeFactory::from_spec(cached_identity_spec(&counter))?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    node.execute_with(&frame(), &[Value::string("first")])?;

    let info = node.introspect();
    let rule = info.specialization("doCached").expect("declared");
    assert_eq!(rule.instances.len(), 1);
    assert_eq!(rule.instances[0][0].name, "value");
    assert_eq!(rule.instances[0][0].value, Value::string("first"));

    let json = info.to_json()?;
    assert_eq!(
        json["specializations"][0]["instances"],
        json!([[{ "name": "value", "value": "first" }]])
    );
    Ok(())
}

#[test]
fn test_introspection_after_collapse() -> Result<()> {
    let factory = describe_factory(1)?;
    let node = factory.create(vec![ReadArgument::new(0)])?;
    node.execute_with(&frame(), &[Value::int(1)])?;
    node.execute_with(&frame(), &[Value::bool(true)])?;

    let info = node.introspect();
    assert!(info.collapsed);
    assert!(info.active_names().is_empty());
    assert_eq!(info.to_json()?["cost"], json!("MEGAMORPHIC"));
    Ok(())
}
