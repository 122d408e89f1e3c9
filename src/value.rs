use std::borrow::Cow;

use num_bigint::BigInt;
use num_traits::Zero;
use serde_json::Value;

/// Result of evaluating a sub-expression.
///
/// Field lookups borrow from the caller's context; computed results are owned.
/// `Absent` marks a path that does not exist, which is distinct from JSON `null`.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand<'a> {
    Absent,
    Json(Cow<'a, Value>),
    /// Exact integer produced by integer literals and the big-integer builtins.
    Int(BigInt),
    /// Array literal `[a, b, ...]`, kept unflattened so absent members survive.
    List(Vec<Operand<'a>>),
}

impl<'a> Operand<'a> {
    pub fn borrowed(value: &'a Value) -> Self {
        Operand::Json(Cow::Borrowed(value))
    }

    pub fn owned(value: Value) -> Self {
        Operand::Json(Cow::Owned(value))
    }

    pub fn from_option(value: Option<&'a Value>) -> Self {
        value.map_or(Operand::Absent, Operand::borrowed)
    }

    pub fn bool(b: bool) -> Self {
        Operand::owned(Value::Bool(b))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Operand::owned(Value::String(s.into()))
    }

    pub fn number(n: f64) -> Self {
        Operand::owned(serde_json::Number::from_f64(n).map_or(Value::Null, Value::Number))
    }

    pub fn count(n: usize) -> Self {
        Operand::owned(Value::from(n))
    }

    pub fn as_json(&self) -> Option<&Value> {
        match self {
            Operand::Json(v) => Some(v.as_ref()),
            _ => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Operand::Absent)
    }

    /// Absent or JSON null.
    pub fn is_nullish(&self) -> bool {
        match self {
            Operand::Absent => true,
            Operand::Json(v) => v.is_null(),
            _ => false,
        }
    }

    pub fn is_truthy(&self) -> bool {
        match self {
            Operand::Absent => false,
            Operand::Int(n) => !n.is_zero(),
            Operand::List(_) => true,
            Operand::Json(v) => match v.as_ref() {
                Value::Null => false,
                Value::Bool(b) => *b,
                Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
                Value::String(s) => !s.is_empty(),
                Value::Array(_) | Value::Object(_) => true,
            },
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Operand::Absent => "undefined",
            Operand::Int(_) => "bigint",
            Operand::List(_) => "array",
            Operand::Json(v) => match v.as_ref() {
                Value::Null => "null",
                Value::Bool(_) => "boolean",
                Value::Number(_) => "number",
                Value::String(_) => "string",
                Value::Array(_) => "array",
                Value::Object(_) => "object",
            },
        }
    }

    /// Elements of an array literal or a JSON array.
    pub fn elements(&self) -> Option<Vec<Operand<'_>>> {
        match self {
            Operand::List(items) => Some(items.iter().map(Operand::reborrow).collect()),
            Operand::Json(v) => v
                .as_array()
                .map(|items| items.iter().map(Operand::borrowed).collect()),
            _ => None,
        }
    }

    fn reborrow(&self) -> Operand<'_> {
        match self {
            Operand::Absent => Operand::Absent,
            Operand::Json(v) => Operand::borrowed(v.as_ref()),
            Operand::Int(n) => Operand::Int(n.clone()),
            Operand::List(items) => Operand::List(items.iter().map(Operand::reborrow).collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn truthiness() {
        assert!(!Operand::Absent.is_truthy());
        assert!(!Operand::owned(json!(null)).is_truthy());
        assert!(!Operand::owned(json!(0)).is_truthy());
        assert!(!Operand::owned(json!("")).is_truthy());
        assert!(Operand::owned(json!([])).is_truthy());
        assert!(Operand::owned(json!({})).is_truthy());
        assert!(!Operand::Int(BigInt::zero()).is_truthy());
        assert!(Operand::Int(BigInt::from(-3)).is_truthy());
    }

    #[test]
    fn elements_of_list_and_array() {
        let arr = json!([1, 2]);
        assert_eq!(Operand::borrowed(&arr).elements().map(|v| v.len()), Some(2));
        let list = Operand::List(vec![Operand::Absent, Operand::Int(BigInt::from(1))]);
        assert_eq!(list.elements().map(|v| v.len()), Some(2));
        assert!(Operand::owned(json!("x")).elements().is_none());
    }
}
