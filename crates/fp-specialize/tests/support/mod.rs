//! Shared node declarations for fp-specialize integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Once};

use fp_specialize::{
    CachedSlot, Frame, Initializer, NodeFactory, NodeSpec, Result, SpecializationRule, TypeSystem,
    Value, ValueType,
};

/// Install a test subscriber once; honours `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn frame() -> Frame {
    Frame::empty()
}

#[derive(Clone, Default)]
pub struct Counter(Arc<AtomicUsize>);

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bump(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

/// `Describe(x)`: one rule per primitive-ish shape, each tagging its result.
pub fn describe_spec(limit: usize) -> NodeSpec {
    NodeSpec::new("Describe", 1)
        .limit(limit)
        .rule(SpecializationRule::new("doInt", [ValueType::Int], |inv| {
            Ok(Value::string(format!("int:{}", inv.arg(0))))
        }))
        .rule(SpecializationRule::new("doBoolean", [ValueType::Bool], |inv| {
            Ok(Value::string(format!("boolean:{}", inv.arg(0))))
        }))
        .rule(SpecializationRule::new("doString", [ValueType::Str], |inv| {
            Ok(Value::string(format!(
                "String:{}",
                inv.arg(0).as_str().unwrap_or_default()
            )))
        }))
        .rule(SpecializationRule::new("doDouble", [ValueType::Double], |inv| {
            Ok(Value::string(format!("double:{}", inv.arg(0))))
        }))
}

pub fn describe_factory(limit: usize) -> Result<NodeFactory> {
    NodeFactory::from_spec(describe_spec(limit))
}

/// `Add(a, b)` over ints, longs (with implicit int widening) and strings.
pub fn add_spec() -> NodeSpec {
    NodeSpec::new("Add", 2)
        .types(TypeSystem::numeric())
        .rule(SpecializationRule::new(
            "doInt",
            [ValueType::Int, ValueType::Int],
            |inv| {
                let (a, b) = (inv.arg(0).as_int(), inv.arg(1).as_int());
                match a.zip(b).and_then(|(a, b)| a.checked_add(b)) {
                    Some(sum) => Ok(Value::Int(sum)),
                    None => fp_specialize::raise!("ArithmeticException", "integer overflow"),
                }
            },
        )
        .rewrite_on("ArithmeticException"))
        .rule(SpecializationRule::new(
            "doLong",
            [ValueType::Long, ValueType::Long],
            |inv| {
                let a = inv.arg(0).as_long().unwrap_or_default();
                let b = inv.arg(1).as_long().unwrap_or_default();
                Ok(Value::Long(a.wrapping_add(b)))
            },
        ))
        .rule(SpecializationRule::new(
            "doString",
            [ValueType::Str, ValueType::Str],
            |inv| {
                let a = inv.arg(0).as_str().unwrap_or_default();
                let b = inv.arg(1).as_str().unwrap_or_default();
                Ok(Value::string(format!("{}{}", a, b)))
            },
        ))
}

/// A rule caching one value per call site, counting initializer runs.
pub fn cached_identity_spec(counter: &Counter) -> NodeSpec {
    let counter = counter.clone();
    NodeSpec::new("CachedIdentity", 1).rule(
        SpecializationRule::new("doCached", [ValueType::Object], |inv| {
            Ok(inv.cached("value").cloned().unwrap_or(Value::Null))
        })
        .cached(CachedSlot::new(
            "value",
            ValueType::Object,
            Initializer::new("count(arg0)", move |ctx| {
                counter.bump();
                Ok(ctx.arg(0).clone())
            }),
        )),
    )
}
