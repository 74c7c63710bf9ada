// SPDX-License-Identifier: MIT OR Apache-2.0
//! Values and value types that flow through pins.
//!
//! Numbers are carried by a single closed [`Numeric`] variant so that nodes
//! never special-case pairs of concrete numeric representations. Widening
//! follows `Integer < Float < Double`.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// A number in one of the supported concrete representations.
///
/// Serialized as a bare number. Fractions always read back as `Double`, so a
/// `Float` is written as its exact `f64` widening and keeps its value.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(from = "NumericRepr")]
pub enum Numeric {
    /// Whole number
    Integer(i64),
    /// Single precision fraction
    Float(f32),
    /// Double precision fraction
    Double(f64),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NumericRepr {
    Integer(i64),
    Double(f64),
}

impl From<NumericRepr> for Numeric {
    fn from(repr: NumericRepr) -> Self {
        match repr {
            NumericRepr::Integer(v) => Self::Integer(v),
            NumericRepr::Double(v) => Self::Double(v),
        }
    }
}

impl Serialize for Numeric {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match *self {
            Self::Integer(v) => serializer.serialize_i64(v),
            Self::Float(v) => serializer.serialize_f64(f64::from(v)),
            Self::Double(v) => serializer.serialize_f64(v),
        }
    }
}

impl Numeric {
    /// The additive identity
    pub const ZERO: Numeric = Numeric::Integer(0);
    /// The multiplicative identity
    pub const ONE: Numeric = Numeric::Integer(1);

    fn rank(self) -> u8 {
        match self {
            Self::Integer(_) => 0,
            Self::Float(_) => 1,
            Self::Double(_) => 2,
        }
    }

    /// Widen this value to the given representation rank
    fn widen_to(self, rank: u8) -> Self {
        match (self, rank) {
            (Self::Integer(v), 1) => Self::Float(v as f32),
            (Self::Integer(v), 2) => Self::Double(v as f64),
            (Self::Float(v), 2) => Self::Double(f64::from(v)),
            (value, _) => value,
        }
    }

    /// Bring both operands to their common (widest) representation
    fn unify(self, other: Self) -> (Self, Self) {
        let rank = self.rank().max(other.rank());
        (self.widen_to(rank), other.widen_to(rank))
    }

    /// The value as a double
    pub fn to_f64(self) -> f64 {
        match self {
            Self::Integer(v) => v as f64,
            Self::Float(v) => f64::from(v),
            Self::Double(v) => v,
        }
    }

    /// The value truncated towards zero, saturating at the integer range
    pub fn to_i64(self) -> i64 {
        match self {
            Self::Integer(v) => v,
            Self::Float(v) => v as i64,
            Self::Double(v) => v as i64,
        }
    }

    /// The value type describing this representation
    pub fn value_type(self) -> ValueType {
        match self {
            Self::Integer(_) => ValueType::Integer,
            Self::Float(_) => ValueType::Float,
            Self::Double(_) => ValueType::Double,
        }
    }

    /// Whether this is NaN (only possible for fractional representations)
    pub fn is_nan(self) -> bool {
        match self {
            Self::Integer(_) => false,
            Self::Float(v) => v.is_nan(),
            Self::Double(v) => v.is_nan(),
        }
    }

    /// Parse text as a number, preferring an integer representation
    pub fn parse(text: &str) -> Option<Self> {
        let text = text.trim();
        if let Ok(v) = text.parse::<i64>() {
            return Some(Self::Integer(v));
        }
        text.parse::<f64>().ok().filter(|v| v.is_finite()).map(Self::Double)
    }

    /// Divide, yielding a fractional result; `None` when dividing by zero
    pub fn checked_div(self, rhs: Self) -> Option<Self> {
        if rhs.to_f64() == 0.0 {
            return None;
        }
        match self.unify(rhs) {
            (Self::Float(a), Self::Float(b)) => Some(Self::Float(a / b)),
            (a, b) => Some(Self::Double(a.to_f64() / b.to_f64())),
        }
    }

    /// Clamp between `min` and `max`; an inverted range yields `min`
    pub fn clamp(self, min: Self, max: Self) -> Self {
        if min > max {
            return min;
        }
        if self < min {
            min
        } else if self > max {
            max
        } else {
            self
        }
    }
}

impl Default for Numeric {
    fn default() -> Self {
        Self::ZERO
    }
}

impl PartialEq for Numeric {
    fn eq(&self, other: &Self) -> bool {
        self.partial_cmp(other) == Some(Ordering::Equal)
    }
}

impl PartialOrd for Numeric {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (*self, *other) {
            (Self::Integer(a), Self::Integer(b)) => Some(a.cmp(&b)),
            (a, b) => a.to_f64().partial_cmp(&b.to_f64()),
        }
    }
}

macro_rules! numeric_binop {
    ($trait:ident, $method:ident, $int_op:ident, $op:tt) => {
        impl $trait for Numeric {
            type Output = Numeric;

            fn $method(self, rhs: Numeric) -> Numeric {
                match self.unify(rhs) {
                    (Numeric::Integer(a), Numeric::Integer(b)) => Numeric::Integer(a.$int_op(b)),
                    (Numeric::Float(a), Numeric::Float(b)) => Numeric::Float(a $op b),
                    (a, b) => Numeric::Double(a.to_f64() $op b.to_f64()),
                }
            }
        }
    };
}

numeric_binop!(Add, add, saturating_add, +);
numeric_binop!(Sub, sub, saturating_sub, -);
numeric_binop!(Mul, mul, saturating_mul, *);

impl Neg for Numeric {
    type Output = Numeric;

    fn neg(self) -> Numeric {
        match self {
            Self::Integer(v) => Self::Integer(v.saturating_neg()),
            Self::Float(v) => Self::Float(-v),
            Self::Double(v) => Self::Double(-v),
        }
    }
}

impl std::iter::Sum for Numeric {
    fn sum<I: Iterator<Item = Numeric>>(iter: I) -> Self {
        iter.fold(Numeric::ZERO, |acc, v| acc + v)
    }
}

impl std::iter::Product for Numeric {
    fn product<I: Iterator<Item = Numeric>>(iter: I) -> Self {
        iter.fold(Numeric::ONE, |acc, v| acc * v)
    }
}

impl fmt::Display for Numeric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
        }
    }
}

impl From<i32> for Numeric {
    fn from(v: i32) -> Self {
        Self::Integer(i64::from(v))
    }
}

impl From<i64> for Numeric {
    fn from(v: i64) -> Self {
        Self::Integer(v)
    }
}

impl From<f32> for Numeric {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Numeric {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

/// A named structured type with the capabilities it can stand in for
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordType {
    /// Type name
    pub name: String,
    /// Names of the types this type is assignable to
    #[serde(default)]
    pub bases: Vec<String>,
}

impl RecordType {
    /// Create a record type without bases
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            bases: Vec::new(),
        }
    }

    /// Add a base type this record can be assigned to
    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.bases.push(base.into());
        self
    }

    /// Whether a value of this type can be used where `other` is expected
    pub fn is_assignable_to(&self, other: &RecordType) -> bool {
        self.name == other.name || self.bases.iter().any(|b| *b == other.name)
    }
}

/// Data type a pin declares
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ValueType {
    /// Any value (generic object)
    Any,
    /// Boolean
    Bool,
    /// Whole number
    Integer,
    /// Single precision fraction
    Float,
    /// Double precision fraction
    Double,
    /// Any number, regardless of representation
    Numeric,
    /// Text
    Text,
    /// Structured value
    Record(RecordType),
}

impl ValueType {
    /// Whether this type belongs to the numeric family
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Float | Self::Double | Self::Numeric)
    }

    /// Whether a pin of this type accepts a value of `source` type.
    ///
    /// Identical types, any two numeric types, and record types that are
    /// assignable to this one are accepted. `Any` accepts everything.
    pub fn accepts(&self, source: &ValueType) -> bool {
        match (self, source) {
            (Self::Any, _) => true,
            (dest, src) if dest == src => true,
            (dest, src) if dest.is_numeric() && src.is_numeric() => true,
            (Self::Record(dest), Self::Record(src)) => src.is_assignable_to(dest),
            _ => false,
        }
    }

    /// Whether `value` may be stored in a pin of this type
    pub fn admits(&self, value: &Value) -> bool {
        match value {
            Value::Null => matches!(self, Self::Any | Self::Text | Self::Record(_)),
            value => self.accepts(&value.value_type()),
        }
    }

    /// The value an unconnected, unassigned pin of this type holds
    pub fn default_value(&self) -> Value {
        match self {
            Self::Any | Self::Record(_) => Value::Null,
            Self::Bool => Value::Bool(false),
            Self::Integer | Self::Numeric => Value::Numeric(Numeric::ZERO),
            Self::Float => Value::Numeric(Numeric::Float(0.0)),
            Self::Double => Value::Numeric(Numeric::Double(0.0)),
            Self::Text => Value::Text(String::new()),
        }
    }

    /// Display name of this type
    pub fn name(&self) -> &str {
        match self {
            Self::Any => "Any",
            Self::Bool => "Bool",
            Self::Integer => "Integer",
            Self::Float => "Float",
            Self::Double => "Double",
            Self::Numeric => "Numeric",
            Self::Text => "Text",
            Self::Record(record) => &record.name,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runtime compatibility between a source pin type and a destination pin type.
///
/// An unset destination accepts anything; an unset source only connects to
/// destinations that accept any value.
pub fn is_compatible(source: Option<&ValueType>, destination: Option<&ValueType>) -> bool {
    match (source, destination) {
        (_, None) | (_, Some(ValueType::Any)) => true,
        (None, Some(_)) => false,
        (Some(src), Some(dest)) => dest.accepts(src),
    }
}

/// A structured value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordValue {
    /// Record type
    pub ty: RecordType,
    /// Field values by name
    #[serde(default)]
    pub fields: IndexMap<String, Value>,
}

impl RecordValue {
    /// Create an empty record of the given type
    pub fn new(ty: RecordType) -> Self {
        Self {
            ty,
            fields: IndexMap::new(),
        }
    }

    /// Set a field
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// Value held by a pin
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// No value
    #[default]
    Null,
    /// Boolean
    Bool(bool),
    /// Number
    Numeric(Numeric),
    /// Text
    Text(String),
    /// Structured value
    Record(RecordValue),
}

impl Value {
    /// Runtime type of this value; `Null` reports `Any`
    pub fn value_type(&self) -> ValueType {
        match self {
            Self::Null => ValueType::Any,
            Self::Bool(_) => ValueType::Bool,
            Self::Numeric(n) => n.value_type(),
            Self::Text(_) => ValueType::Text,
            Self::Record(r) => ValueType::Record(r.ty.clone()),
        }
    }

    /// Whether this is `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Boolean content, if any
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Numeric content, if any
    pub fn as_numeric(&self) -> Option<Numeric> {
        match self {
            Self::Numeric(n) => Some(*n),
            _ => None,
        }
    }

    /// Text content, if any
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Order two values.
    ///
    /// Numbers compare by numeric value across representations. Otherwise
    /// only values of the same kind are ordered; anything else is `None`.
    pub fn compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Self::Numeric(a), Self::Numeric(b)) => a.partial_cmp(b),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            (Self::Text(a), Self::Text(b)) => Some(a.cmp(b)),
            (Self::Null, Self::Null) => Some(Ordering::Equal),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => Ok(()),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Numeric(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
            Self::Record(r) => f.write_str(&r.ty.name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<Numeric> for Value {
    fn from(v: Numeric) -> Self {
        Self::Numeric(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Numeric(Numeric::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Numeric(Numeric::Integer(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Numeric(Numeric::Double(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

impl From<RecordValue> for Value {
    fn from(v: RecordValue) -> Self {
        Self::Record(v)
    }
}
