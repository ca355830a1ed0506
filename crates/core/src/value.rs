//! Dynamic value types and their coercion/arithmetic semantics.
//!
//! `Value` is the single runtime representation shared by the parser, the AST
//! evaluator, the bytecode VM and the execution context. Every numeric
//! operator funnels through the arithmetic helpers here so promotion rules
//! (Decimal > Float > Int) are enforced in exactly one place.

use crate::error::CoreError;
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A dynamic value that can hold any attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    #[serde(with = "rust_decimal::serde::str")]
    Decimal(Decimal),
    String(String),
    Array(Vec<Value>),
    /// Insertion-order preserved so round-tripping a rule's computed context
    /// back to JSON does not reshuffle fields.
    Object(IndexMap<String, Value>),
}

/// Which numeric representation an arithmetic result should be promoted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum NumericKind {
    Int,
    Float,
    Decimal,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0,
            Value::Decimal(d) => !d.is_zero(),
            Value::String(s) => !s.is_empty(),
            Value::Array(a) => !a.is_empty(),
            Value::Object(o) => !o.is_empty(),
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) => {
                if f.is_nan() || f.is_infinite() {
                    return None;
                }
                if *f < (i64::MIN as f64) || *f > (i64::MAX as f64) {
                    return None;
                }
                Some(*f as i64)
            }
            Value::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(d) => d.to_string().parse().ok(),
            _ => None,
        }
    }

    /// Best-effort numeric view for callers (mostly tests) that don't care
    /// about the Decimal/Float/Int distinction. Non-numeric values read as 0.
    pub fn to_number(&self) -> f64 {
        self.as_float().unwrap_or(0.0)
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Float(f) => Decimal::try_from(*f).ok(),
            Value::Decimal(d) => Some(*d),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Decimal(_) => "decimal",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
        }
    }

    fn numeric_kind(&self) -> Option<NumericKind> {
        match self {
            Value::Int(_) => Some(NumericKind::Int),
            Value::Float(_) => Some(NumericKind::Float),
            Value::Decimal(_) => Some(NumericKind::Decimal),
            _ => None,
        }
    }

    /// Number-facing operators reject `Null` and non-numeric values outright;
    /// there is no silent zero coercion.
    fn require_numeric(&self) -> Result<NumericKind, CoreError> {
        self.numeric_kind().ok_or_else(|| CoreError::TypeMismatch {
            expected: "number".to_string(),
            actual: self.type_name().to_string(),
        })
    }

    /// The promoted numeric kind across a slice of operands: `Decimal` wins
    /// over `Float`, which wins over `Int`.
    fn promote(kinds: &[NumericKind]) -> NumericKind {
        kinds.iter().copied().max().unwrap_or(NumericKind::Int)
    }

    /// Checked addition with Decimal/Float/Int promotion.
    pub fn checked_add(&self, other: &Value) -> Result<Value, CoreError> {
        self.numeric_binop(other, |a, b| a + b, |a, b| a + b, |a, b| {
            a.checked_add(b).ok_or(CoreError::Internal("decimal overflow".to_string()))
        })
    }

    pub fn checked_sub(&self, other: &Value) -> Result<Value, CoreError> {
        self.numeric_binop(other, |a, b| a - b, |a, b| a - b, |a, b| {
            a.checked_sub(b).ok_or(CoreError::Internal("decimal overflow".to_string()))
        })
    }

    pub fn checked_mul(&self, other: &Value) -> Result<Value, CoreError> {
        self.numeric_binop(other, |a, b| a * b, |a, b| a * b, |a, b| {
            a.checked_mul(b).ok_or(CoreError::Internal("decimal overflow".to_string()))
        })
    }

    pub fn checked_div(&self, other: &Value) -> Result<Value, CoreError> {
        let a_kind = self.require_numeric()?;
        let b_kind = other.require_numeric()?;
        let kind = Self::promote(&[a_kind, b_kind]);
        match kind {
            NumericKind::Int => {
                let (a, b) = (self.as_int().unwrap(), other.as_int().unwrap());
                if b == 0 {
                    return Err(CoreError::DivisionByZero);
                }
                // Division with non-integral result promotes to Float, matching
                // JSON-Logic's usual numeric-tower behavior for `/`.
                if a % b == 0 {
                    Ok(Value::Int(a / b))
                } else {
                    Ok(Value::Float(a as f64 / b as f64))
                }
            }
            NumericKind::Float => {
                let (a, b) = (self.as_float().unwrap(), other.as_float().unwrap());
                if b == 0.0 {
                    return Err(CoreError::DivisionByZero);
                }
                Ok(Value::Float(a / b))
            }
            NumericKind::Decimal => {
                let (a, b) = (self.as_decimal().unwrap(), other.as_decimal().unwrap());
                if b.is_zero() {
                    return Err(CoreError::DivisionByZero);
                }
                Ok(Value::Decimal(a / b))
            }
        }
    }

    pub fn checked_rem(&self, other: &Value) -> Result<Value, CoreError> {
        let a_kind = self.require_numeric()?;
        let b_kind = other.require_numeric()?;
        let kind = Self::promote(&[a_kind, b_kind]);
        match kind {
            NumericKind::Int => {
                let (a, b) = (self.as_int().unwrap(), other.as_int().unwrap());
                if b == 0 {
                    return Err(CoreError::DivisionByZero);
                }
                Ok(Value::Int(a % b))
            }
            NumericKind::Float => {
                let (a, b) = (self.as_float().unwrap(), other.as_float().unwrap());
                if b == 0.0 {
                    return Err(CoreError::DivisionByZero);
                }
                Ok(Value::Float(a % b))
            }
            NumericKind::Decimal => {
                let (a, b) = (self.as_decimal().unwrap(), other.as_decimal().unwrap());
                if b.is_zero() {
                    return Err(CoreError::DivisionByZero);
                }
                Ok(Value::Decimal(a % b))
            }
        }
    }

    pub fn checked_neg(&self) -> Result<Value, CoreError> {
        match self.require_numeric()? {
            NumericKind::Int => Ok(Value::Int(-self.as_int().unwrap())),
            NumericKind::Float => Ok(Value::Float(-self.as_float().unwrap())),
            NumericKind::Decimal => Ok(Value::Decimal(-self.as_decimal().unwrap())),
        }
    }

    fn numeric_binop(
        &self,
        other: &Value,
        int_op: impl Fn(i64, i64) -> i64,
        float_op: impl Fn(f64, f64) -> f64,
        decimal_op: impl Fn(Decimal, Decimal) -> Result<Decimal, CoreError>,
    ) -> Result<Value, CoreError> {
        let a_kind = self.require_numeric()?;
        let b_kind = other.require_numeric()?;
        match Self::promote(&[a_kind, b_kind]) {
            NumericKind::Int => Ok(Value::Int(int_op(self.as_int().unwrap(), other.as_int().unwrap()))),
            NumericKind::Float => Ok(Value::Float(float_op(self.as_float().unwrap(), other.as_float().unwrap()))),
            NumericKind::Decimal => {
                Ok(Value::Decimal(decimal_op(self.as_decimal().unwrap(), other.as_decimal().unwrap())?))
            }
        }
    }

    /// Rejects a `Null` operand the same way the binary numeric ops do; used
    /// by `min`/`max` before comparing operands with `PartialOrd`.
    pub fn check_numeric(&self) -> Result<(), CoreError> {
        self.require_numeric().map(|_| ())
    }

    /// Strict equality: same variant and same value, no coercion.
    pub fn strict_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Float(a), Value::Float(b)) => a == b,
            (Value::Decimal(a), Value::Decimal(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.strict_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.strict_equals(w)))
            }
            _ => false,
        }
    }

    /// Loose (JSON-Logic / JS-flavored) equality: numeric cross-type
    /// coercion, string-as-number parsing, bool-vs-other via truthiness, and
    /// single-element-array unwrapping.
    pub fn loose_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Array(a), _) if a.len() == 1 => a[0].loose_equals(other),
            (_, Value::Array(b)) if b.len() == 1 => self.loose_equals(&b[0]),

            (Value::Null, Value::Null) => true,
            (Value::Null, _) | (_, Value::Null) => false,

            (Value::Bool(_), _) => Value::Bool(self.is_truthy()).strict_bool_eq(other),
            (_, Value::Bool(_)) => Value::Bool(other.is_truthy()).strict_bool_eq(self),

            (Value::String(a), Value::String(b)) => a == b,

            (a, b) if a.numeric_kind().is_some() && b.numeric_kind().is_some() => {
                numbers_equal(a, b)
            }
            (Value::String(s), n) if n.numeric_kind().is_some() => {
                s.parse::<Decimal>().ok().is_some_and(|d| numbers_equal(&Value::Decimal(d), n))
            }
            (n, Value::String(s)) if n.numeric_kind().is_some() => {
                s.parse::<Decimal>().ok().is_some_and(|d| numbers_equal(n, &Value::Decimal(d)))
            }

            (Value::Array(a), Value::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.loose_equals(y))
            }
            (Value::Object(a), Value::Object(b)) => {
                a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).is_some_and(|w| v.loose_equals(w)))
            }
            _ => false,
        }
    }

    fn strict_bool_eq(&self, other: &Value) -> bool {
        matches!(self, Value::Bool(b) if *b == other.is_truthy())
    }

    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::Decimal(d) => d.to_string(),
            Value::String(s) => s.clone(),
            Value::Array(_) => "[array]".to_string(),
            Value::Object(_) => "[object]".to_string(),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Int(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::Decimal(d) => {
                let mut tagged = serde_json::Map::with_capacity(1);
                tagged.insert("$decimal".to_string(), serde_json::Value::String(d.to_string()));
                serde_json::Value::Object(tagged)
            }
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(|v| v.to_json()).collect()),
            Value::Object(o) => {
                serde_json::Value::Object(o.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }

    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else if let Some(f) = n.as_f64() {
                    Value::Float(f)
                } else {
                    Value::Null
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(a) => Value::Array(a.iter().map(Value::from_json).collect()),
            serde_json::Value::Object(o) => {
                if o.len() == 1 {
                    if let Some(serde_json::Value::String(s)) = o.get("$decimal") {
                        if let Ok(d) = s.parse::<Decimal>() {
                            return Value::Decimal(d);
                        }
                    }
                }
                Value::Object(o.iter().map(|(k, v)| (k.clone(), Value::from_json(v))).collect())
            }
        }
    }
}

fn numbers_equal(a: &Value, b: &Value) -> bool {
    match (a.numeric_kind().unwrap(), b.numeric_kind().unwrap()) {
        (NumericKind::Decimal, _) | (_, NumericKind::Decimal) => {
            a.as_decimal() == b.as_decimal()
        }
        _ => a.as_float() == b.as_float(),
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<i32> for Value {
    fn from(i: i32) -> Self {
        Value::Int(i as i64)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

impl From<Decimal> for Value {
    fn from(d: Decimal) -> Self {
        Value::Decimal(d)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::Array(v.into_iter().map(Into::into).collect())
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        Value::from_json(&json)
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        match (self, other) {
            (Value::String(a), Value::String(b)) => a.partial_cmp(b),
            (a, b) if a.numeric_kind().is_some() && b.numeric_kind().is_some() => {
                match (a.numeric_kind().unwrap(), b.numeric_kind().unwrap()) {
                    (NumericKind::Decimal, _) | (_, NumericKind::Decimal) => {
                        a.as_decimal()?.partial_cmp(&b.as_decimal()?)
                    }
                    _ => a.as_float()?.partial_cmp(&b.as_float()?),
                }
            }
            _ => None,
        }
    }
}
