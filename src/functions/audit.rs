use serde_json::{json, Value};

use super::{fail, Args, Builtin};
use crate::value::Operand;

/// Predecessor hash of the first audit entry (SHA-256 of the empty string).
pub const GENESIS_HASH: &str =
    "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

pub(super) fn builtins() -> Vec<Builtin> {
    vec![Builtin::new("audit_trail_chain_valid", "audit_trail_chain_valid(trail) -> boolean", 1..=1, audit_trail_chain_valid)
        .describe(
            "Entries link by hash: the first previous_hash is the genesis constant and every later \
             previous_hash equals the prior entry_hash. Content hashes are not recomputed.",
        )
        .example(
            "Correctly linked chain",
            json!({"trail": {
                "genesis_hash": GENESIS_HASH,
                "entries": [
                    {"entry_id": "e1", "previous_hash": GENESIS_HASH, "entry_hash": "sha256:aaa"},
                    {"entry_id": "e2", "previous_hash": "sha256:aaa", "entry_hash": "sha256:bbb"}
                ]
            }}),
            "audit_trail_chain_valid(trail)",
            true,
        )
        .example(
            "Broken link",
            json!({"trail": {
                "genesis_hash": GENESIS_HASH,
                "entries": [
                    {"entry_id": "e1", "previous_hash": GENESIS_HASH, "entry_hash": "sha256:aaa"},
                    {"entry_id": "e2", "previous_hash": "sha256:zzz", "entry_hash": "sha256:bbb"}
                ]
            }}),
            "audit_trail_chain_valid(trail)",
            false,
        )
        .example(
            "Empty trail",
            json!({"trail": {"genesis_hash": GENESIS_HASH, "entries": []}}),
            "audit_trail_chain_valid(trail)",
            true,
        )]
}

fn audit_trail_chain_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let trail = args.get(0);
    let entries = match trail.as_json() {
        Some(Value::Array(entries)) => entries,
        Some(Value::Object(trail)) => {
            if trail.get("genesis_hash").and_then(Value::as_str) != Some(GENESIS_HASH) {
                return fail("audit trail genesis_hash missing or unexpected");
            }
            match trail.get("entries") {
                Some(Value::Array(entries)) => entries,
                _ => return fail("audit trail has no entries"),
            }
        }
        _ => return fail("audit trail is not an array or object"),
    };
    Operand::bool(chain_linked(entries))
}

fn chain_linked(entries: &[Value]) -> bool {
    let mut expected = GENESIS_HASH;
    for entry in entries {
        let hash = |key: &str| entry.get(key).and_then(Value::as_str);
        let (Some(previous), Some(own)) = (hash("previous_hash"), hash("entry_hash")) else {
            return false;
        };
        if previous != expected {
            return false;
        }
        expected = own;
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_entry_must_point_at_genesis() {
        let entries = json!([{"previous_hash": "sha256:other", "entry_hash": "sha256:a"}]);
        assert!(!chain_linked(entries.as_array().unwrap()));
    }

    #[test]
    fn missing_hash_fails() {
        let entries = json!([{"previous_hash": GENESIS_HASH}]);
        assert!(!chain_linked(entries.as_array().unwrap()));
    }
}
