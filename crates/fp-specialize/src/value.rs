//! Runtime values and their static types.

use std::fmt::{Display, Formatter};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize, Serializer};

/// Static type of a parameter, cached slot or guard operand.
///
/// `Object` accepts every value. Reference types (`String`, `Cell`, `Object`)
/// admit `null`; primitives never do.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    derive_more::Display,
    Serialize,
    Deserialize,
)]
pub enum ValueType {
    #[display("null")]
    Null,
    #[display("boolean")]
    Bool,
    #[display("int")]
    Int,
    #[display("long")]
    Long,
    #[display("double")]
    Double,
    #[display("String")]
    Str,
    #[display("Cell")]
    Cell,
    #[display("Object")]
    Object,
}

impl ValueType {
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            ValueType::Bool | ValueType::Int | ValueType::Long | ValueType::Double
        )
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Int | ValueType::Long | ValueType::Double)
    }

    pub fn admits_null(self) -> bool {
        !self.is_primitive()
    }

    /// Whether a value whose runtime type is `actual` satisfies this type without a cast.
    pub fn accepts(self, actual: ValueType) -> bool {
        self == ValueType::Object || self == actual
    }
}

/// A mutable reference cell. Clones of a `ValueCell` alias the same storage.
#[derive(Clone)]
pub struct ValueCell(Arc<Mutex<Value>>);

impl ValueCell {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(Mutex::new(value)))
    }

    pub fn get(&self) -> Value {
        self.0.lock().clone()
    }

    pub fn set(&self, value: Value) {
        *self.0.lock() = value;
    }

    pub fn ptr_eq(&self, other: &ValueCell) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// A fresh cell holding a deep copy of the current contents.
    pub fn deep_copy(&self) -> ValueCell {
        ValueCell::new(self.get().deep_copy())
    }
}

impl std::fmt::Debug for ValueCell {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ValueCell").field(&self.get()).finish()
    }
}

#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    Str(Arc<str>),
    Cell(ValueCell),
}

impl Value {
    pub fn int(v: i32) -> Self {
        Value::Int(v)
    }

    pub fn long(v: i64) -> Self {
        Value::Long(v)
    }

    pub fn bool(v: bool) -> Self {
        Value::Bool(v)
    }

    pub fn double(v: f64) -> Self {
        Value::Double(v)
    }

    pub fn string(v: impl AsRef<str>) -> Self {
        Value::Str(Arc::from(v.as_ref()))
    }

    pub fn cell(v: Value) -> Self {
        Value::Cell(ValueCell::new(v))
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Null => ValueType::Null,
            Value::Bool(_) => ValueType::Bool,
            Value::Int(_) => ValueType::Int,
            Value::Long(_) => ValueType::Long,
            Value::Double(_) => ValueType::Double,
            Value::Str(_) => ValueType::Str,
            Value::Cell(_) => ValueType::Cell,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_cell(&self) -> Option<&ValueCell> {
        match self {
            Value::Cell(cell) => Some(cell),
            _ => None,
        }
    }

    /// Integral numbers widened to `i64`.
    pub(crate) fn as_integral(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v as i64),
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    /// Any number widened to `f64`.
    pub(crate) fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(v) => Some(*v as f64),
            Value::Long(v) => Some(*v as f64),
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// Copy that shares no mutable cell with `self`.
    pub fn deep_copy(&self) -> Value {
        match self {
            Value::Cell(cell) => Value::Cell(cell.deep_copy()),
            other => other.clone(),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Long(a), Value::Long(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.total_cmp(b).is_eq(),
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Cell(a), Value::Cell(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Double(v) => write!(f, "{:?}", v),
            Value::Str(v) => write!(f, "{:?}", v),
            Value::Cell(cell) => write!(f, "cell({})", cell.get()),
        }
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_unit(),
            Value::Bool(v) => serializer.serialize_bool(*v),
            Value::Int(v) => serializer.serialize_i32(*v),
            Value::Long(v) => serializer.serialize_i64(*v),
            Value::Double(v) => serializer.serialize_f64(*v),
            Value::Str(v) => serializer.serialize_str(v),
            Value::Cell(cell) => cell.get().serialize(serializer),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::string(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(Arc::from(v))
    }
}

/// The runtime types of an argument list.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Shape(Vec<ValueType>);

impl Shape {
    pub fn of(args: &[Value]) -> Self {
        Shape(args.iter().map(Value::value_type).collect())
    }

    pub fn new(types: impl Into<Vec<ValueType>>) -> Self {
        Shape(types.into())
    }

    pub fn types(&self) -> &[ValueType] {
        &self.0
    }
}

impl Display for Shape {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({})", self.0.iter().join(", "))
    }
}
