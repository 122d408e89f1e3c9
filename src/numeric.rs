use std::str::FromStr;

use num_bigint::BigInt;
use num_traits::ToPrimitive;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::value::Operand;

// Canonical integers only: no leading zeros, no "+", no "-0".
static INTEGER_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(0|-?[1-9][0-9]*)$").ok());

static DECIMAL_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^-?[0-9]+(\.[0-9]+)?$").ok());

fn matches(pattern: &Lazy<Option<Regex>>, s: &str) -> bool {
    pattern.as_ref().is_some_and(|re| re.is_match(s))
}

/// Parse a canonical integer string of any size.
pub fn parse_bigint(s: &str) -> Option<BigInt> {
    if !matches(&INTEGER_PATTERN, s) {
        return None;
    }
    BigInt::from_str(s).ok()
}

/// Integer strings and integral JSON numbers convert; everything else is malformed.
pub fn json_to_bigint(value: &Value) -> Option<BigInt> {
    match value {
        Value::String(s) => parse_bigint(s),
        Value::Number(n) => n
            .as_i64()
            .map(BigInt::from)
            .or_else(|| n.as_u64().map(BigInt::from)),
        _ => None,
    }
}

pub fn to_bigint(operand: &Operand<'_>) -> Option<BigInt> {
    match operand {
        Operand::Int(n) => Some(n.clone()),
        Operand::Json(v) => json_to_bigint(v),
        _ => None,
    }
}

/// Numeric view used where floating point is acceptable (weights, scores, deltas of decimals).
pub fn to_f64(operand: &Operand<'_>) -> Option<f64> {
    match operand {
        Operand::Int(n) => n.to_f64(),
        Operand::Json(v) => json_to_f64(v),
        _ => None,
    }
}

pub fn json_to_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) if matches(&DECIMAL_PATTERN, s) => s.parse().ok(),
        _ => None,
    }
}

/// Plain JSON numbers only, for fields such as vote weights.
pub fn json_number(value: Option<&Value>) -> Option<f64> {
    value.and_then(Value::as_f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn canonical_integer_strings() {
        assert_eq!(parse_bigint("0"), Some(BigInt::from(0)));
        assert_eq!(parse_bigint("-500"), Some(BigInt::from(-500)));
        assert_eq!(parse_bigint("007"), None);
        assert_eq!(parse_bigint("-0"), None);
        assert_eq!(parse_bigint("+5"), None);
        assert_eq!(parse_bigint("1.50"), None);
        assert_eq!(parse_bigint(""), None);
        assert_eq!(parse_bigint("12abc"), None);
    }

    #[test]
    fn beyond_u64() {
        let big = "123456789012345678901234567890123";
        assert_eq!(parse_bigint(big).map(|n| n.to_string()), Some(big.to_string()));
    }

    #[test]
    fn json_numbers() {
        assert_eq!(json_to_bigint(&json!(42)), Some(BigInt::from(42)));
        assert_eq!(json_to_bigint(&json!(0.5)), None);
        assert_eq!(json_to_bigint(&json!(null)), None);
        assert_eq!(json_to_f64(&json!("1.25")), Some(1.25));
        assert_eq!(json_to_f64(&json!("abc")), None);
    }
}
