use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::expression::{FieldPath, PathSegment};

/// Reserved context key holding the prior snapshot for `changed`/`previous`/`delta`.
pub const PREVIOUS_KEY: &str = "_previous";

/// Evaluation options.
///
/// Both knobs default to the strict behaviour, so `EvalOptions::default()`
/// matches `evaluate_constraint`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvalOptions {
    /// Let `==`, `!=` and `eq` treat a missing field as equal to `null`.
    pub absent_equals_null: bool,
    /// RFC 3339 instant reported by `now()`. Falls back to the system clock when unset or invalid.
    pub evaluation_timestamp: Option<String>,
}

impl EvalOptions {
    pub fn with_absent_equals_null(mut self, enabled: bool) -> Self {
        self.absent_equals_null = enabled;
        self
    }

    pub fn with_evaluation_timestamp(mut self, timestamp: impl Into<String>) -> Self {
        self.evaluation_timestamp = Some(timestamp.into());
        self
    }
}

/// Walk `segments` from `value`. A missing key, out of range index or a
/// step into a scalar yields `None`.
pub fn lookup<'a>(value: &'a Value, segments: &[PathSegment]) -> Option<&'a Value> {
    segments.iter().try_fold(value, |current, seg| match (seg, current) {
        (PathSegment::Key(k), Value::Object(map)) => map.get(k),
        (PathSegment::Index(i), Value::Array(items)) => items.get(*i),
        _ => None,
    })
}

/// Resolve a dotted field name such as `usage.cost_micro` inside a record.
pub fn lookup_dotted<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, key| current.as_object()?.get(key))
}

/// Resolve a field path from the top of the context.
pub fn resolve<'a>(context: &'a Value, path: &FieldPath) -> Option<&'a Value> {
    let start = context.as_object()?.get(path.root())?;
    lookup(start, path.rest())
}

/// The `_previous` snapshot, when the context carries one.
pub fn previous_snapshot(context: &Value) -> Option<&Value> {
    context.as_object()?.get(PREVIOUS_KEY).filter(|v| v.is_object())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn resolves_nested_paths() {
        let ctx = json!({"a": {"b": [{"c": 1}]}});
        let mut path = FieldPath::new("a");
        path.push(PathSegment::Key("b".into()));
        path.push(PathSegment::Index(0));
        path.push(PathSegment::Key("c".into()));
        assert_eq!(resolve(&ctx, &path), Some(&json!(1)));

        path.push(PathSegment::Key("d".into()));
        assert_eq!(resolve(&ctx, &path), None);
    }

    #[test]
    fn dotted_lookup() {
        let rec = json!({"usage": {"cost_micro": "15"}});
        assert_eq!(lookup_dotted(&rec, "usage.cost_micro"), Some(&json!("15")));
        assert_eq!(lookup_dotted(&rec, "usage.missing"), None);
    }

    #[test]
    fn options_from_json() {
        let opts: EvalOptions = serde_json::from_value(json!({"absent_equals_null": true})).unwrap();
        assert!(opts.absent_equals_null);
        assert_eq!(opts.evaluation_timestamp, None);
        assert_eq!(EvalOptions::default(), serde_json::from_str::<EvalOptions>("{}").unwrap());
    }
}
