use std::cmp::Ordering;

use num_traits::ToPrimitive;
use serde_json::Value;

use crate::numeric::to_bigint;
use crate::value::Operand;

/// Apply `pred_on_ord` to the ordering of `a` and `b`. Operands without a
/// common ordering (mixed kinds, absent, null, booleans) never satisfy it.
pub fn cmp_operands<F>(a: &Operand<'_>, b: &Operand<'_>, pred_on_ord: F) -> bool
where
    F: Fn(Ordering) -> bool,
{
    compare(a, b).is_some_and(pred_on_ord)
}

pub fn compare(a: &Operand<'_>, b: &Operand<'_>) -> Option<Ordering> {
    match (a, b) {
        (Operand::Int(x), other) => compare_int(x, other),
        (other, Operand::Int(y)) => compare_int(y, other).map(Ordering::reverse),
        (Operand::Json(x), Operand::Json(y)) => match (x.as_ref(), y.as_ref()) {
            (Value::Number(na), Value::Number(nb)) => na.as_f64()?.partial_cmp(&nb.as_f64()?),
            (Value::String(sa), Value::String(sb)) => Some(sa.cmp(sb)),
            _ => None,
        },
        _ => None,
    }
}

// Exact when the other side is integral; decimals fall back to float ordering.
fn compare_int(x: &num_bigint::BigInt, other: &Operand<'_>) -> Option<Ordering> {
    if let Some(y) = to_bigint(other) {
        return Some(x.cmp(&y));
    }
    match other {
        Operand::Json(v) => match v.as_ref() {
            Value::Number(n) => x.to_f64()?.partial_cmp(&n.as_f64()?),
            _ => None,
        },
        _ => None,
    }
}

/// Equality used by `==`, `!=` and `eq`.
pub fn equals(a: &Operand<'_>, b: &Operand<'_>, absent_equals_null: bool) -> bool {
    match (a, b) {
        (Operand::Absent, Operand::Absent) => true,
        (Operand::Absent, other) | (other, Operand::Absent) => {
            absent_equals_null && other.as_json().is_some_and(Value::is_null)
        }
        (Operand::Int(_), _) | (_, Operand::Int(_)) => compare(a, b) == Some(Ordering::Equal),
        (Operand::Json(x), Operand::Json(y)) => json_equals(x, y),
        (Operand::List(_), _) | (_, Operand::List(_)) => match (a.elements(), b.elements()) {
            (Some(xs), Some(ys)) => {
                xs.len() == ys.len()
                    && xs.iter().zip(&ys).all(|(x, y)| equals(x, y, absent_equals_null))
            }
            _ => false,
        },
    }
}

/// Deep JSON equality where `1` and `1.0` are the same number.
pub fn json_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_f64(), y.as_f64()) {
            (Some(fx), Some(fy)) => fx == fy,
            _ => x == y,
        },
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| json_equals(x, y))
        }
        (Value::Object(xs), Value::Object(ys)) => {
            xs.len() == ys.len()
                && xs
                    .iter()
                    .all(|(k, x)| ys.get(k).is_some_and(|y| json_equals(x, y)))
        }
        _ => a == b,
    }
}
