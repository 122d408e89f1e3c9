use itertools::Itertools;
use serde_json::{json, Value};

use super::time::parse_timestamp;
use super::{as_array, as_object, fail, Args, Builtin};
use crate::comparison::{equals, json_equals};
use crate::context::lookup_dotted;
use crate::numeric::json_to_bigint;
use crate::value::Operand;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("eq", "eq(a, b) -> boolean", 2..=2, eq)
            .describe("Deep equality with the same rules as ==.")
            .example("Equal strings", json!({"status": "active"}), "eq(status, 'active')", true)
            .example("Different strings", json!({"status": "active"}), "eq(status, 'expired')", false)
            .example("Missing field is not null", json!({}), "eq(missing, null)", false),
        Builtin::new("object_keys_subset", "object_keys_subset(record, allowed) -> boolean", 2..=2, object_keys_subset)
            .describe("True when every key of record appears in allowed. A null record is vacuously true.")
            .example(
                "All keys in allowed list",
                json!({"rec": {"a": 1, "b": 2}, "allowed": ["a", "b", "c"]}),
                "object_keys_subset(rec, allowed)",
                true,
            )
            .example(
                "Key not in allowed list",
                json!({"rec": {"a": 1, "d": 2}, "allowed": ["a", "b", "c"]}),
                "object_keys_subset(rec, allowed)",
                false,
            )
            .example("Allowed keys as literal", json!({"rec": {"a": 1}}), "object_keys_subset(rec, ['a'])", true),
        Builtin::new("len", "len(value) -> number", 1..=1, len)
            .describe("Length of an array, key count of an object or character count of a string; 0 otherwise.")
            .example("Array length", json!({"items": ["a", "b", "c"]}), "len(items) == 3", true)
            .example("Object key count", json!({"rec": {"x": 1, "y": 2}}), "len(rec) == 2", true)
            .example("String length", json!({"name": "hello"}), "len(name) == 5", true)
            .example("Numbers have no length", json!({"n": 12}), "len(n) == 0", true),
        Builtin::new("type_of", "type_of(value) -> string", 1..=1, type_of)
            .describe("Type name: string, number, boolean, array, object, null, undefined or bigint.")
            .example("String", json!({"v": "x"}), "type_of(v) == 'string'", true)
            .example("Missing field", json!({}), "type_of(v) == 'undefined'", true)
            .example("Null", json!({"v": null}), "type_of(v) == 'null'", true),
        Builtin::new("unique_values", "unique_values(array, field) -> boolean", 2..=2, unique_values)
            .describe("True when the named field is pairwise distinct across records. Records without the field are skipped.")
            .example(
                "Distinct identifiers",
                json!({"steps": [{"id": "a"}, {"id": "b"}]}),
                "unique_values(steps, 'id')",
                true,
            )
            .example(
                "Repeated identifier",
                json!({"steps": [{"id": "a"}, {"id": "a"}]}),
                "unique_values(steps, 'id')",
                false,
            ),
        Builtin::new("all_links_subset_authority", "all_links_subset_authority(links) -> boolean", 1..=1, all_links_subset_authority)
            .describe("For i > 0: links[i].authority_scope is a subset of links[i-1].authority_scope.")
            .example(
                "Child has subset of parent authority",
                json!({"links": [{"authority_scope": ["read", "write"]}, {"authority_scope": ["read"]}]}),
                "all_links_subset_authority(links)",
                true,
            )
            .example(
                "Child has authority not in parent",
                json!({"links": [{"authority_scope": ["read"]}, {"authority_scope": ["read", "write"]}]}),
                "all_links_subset_authority(links)",
                false,
            ),
        Builtin::new("delegation_budget_conserved", "delegation_budget_conserved(links) -> boolean", 1..=1, delegation_budget_conserved)
            .describe("Each link's budget_allocated_micro is at most its predecessor's. Null budgets are skipped.")
            .example(
                "Budget decreases down chain",
                json!({"links": [{"budget_allocated_micro": "1000"}, {"budget_allocated_micro": "500"}]}),
                "delegation_budget_conserved(links)",
                true,
            )
            .example(
                "Child exceeds parent budget",
                json!({"links": [{"budget_allocated_micro": "500"}, {"budget_allocated_micro": "1000"}]}),
                "delegation_budget_conserved(links)",
                false,
            ),
        Builtin::new("links_temporally_ordered", "links_temporally_ordered(links) -> boolean", 1..=1, links_temporally_ordered)
            .describe("links[i].timestamp <= links[i+1].timestamp for all adjacent pairs.")
            .example(
                "Timestamps are ordered",
                json!({"links": [{"timestamp": "2026-01-01T00:00:00Z"}, {"timestamp": "2026-01-02T00:00:00Z"}]}),
                "links_temporally_ordered(links)",
                true,
            )
            .example(
                "Timestamps are reversed",
                json!({"links": [{"timestamp": "2026-01-02T00:00:00Z"}, {"timestamp": "2026-01-01T00:00:00Z"}]}),
                "links_temporally_ordered(links)",
                false,
            ),
        Builtin::new("links_form_chain", "links_form_chain(links) -> boolean", 1..=1, links_form_chain)
            .describe("links[i].delegatee == links[i+1].delegator for all adjacent pairs.")
            .example(
                "Chain forms correctly",
                json!({"links": [{"delegatee": "B"}, {"delegator": "B", "delegatee": "C"}]}),
                "links_form_chain(links)",
                true,
            )
            .example(
                "Chain is broken",
                json!({"links": [{"delegatee": "B"}, {"delegator": "X", "delegatee": "C"}]}),
                "links_form_chain(links)",
                false,
            ),
        Builtin::new("no_emergent_in_individual", "no_emergent_in_individual(emergent, individual) -> boolean", 2..=2, no_emergent_in_individual)
            .describe("No emergent capability appears in any array value of individual.")
            .example(
                "Emergent capability not in any individual",
                json!({"emergent": ["consensus"], "individual": {"m1": ["reasoning"], "m2": ["coding"]}}),
                "no_emergent_in_individual(emergent, individual)",
                true,
            )
            .example(
                "Emergent capability found in individual",
                json!({"emergent": ["reasoning"], "individual": {"m1": ["reasoning"], "m2": ["coding"]}}),
                "no_emergent_in_individual(emergent, individual)",
                false,
            ),
        Builtin::new("all_emergent_have_evidence", "all_emergent_have_evidence(emergent, evidence) -> boolean", 2..=2, all_emergent_have_evidence)
            .describe("Every emergent capability has an evidence record with a matching capability.")
            .example(
                "All emergent capabilities have evidence",
                json!({
                    "emergent": ["consensus"],
                    "evidence": [{"capability": "consensus", "test_name": "test-1", "score": 0.9}]
                }),
                "all_emergent_have_evidence(emergent, evidence)",
                true,
            )
            .example(
                "Missing evidence for emergent capability",
                json!({
                    "emergent": ["consensus", "synthesis"],
                    "evidence": [{"capability": "consensus", "test_name": "test-1", "score": 0.9}]
                }),
                "all_emergent_have_evidence(emergent, evidence)",
                false,
            ),
    ]
}

fn eq<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let absent_equals_null = args.options().absent_equals_null;
    Operand::bool(equals(&args.get(0), &args.get(1), absent_equals_null))
}

fn object_keys_subset<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let record = args.get(0);
    if record.is_nullish() {
        return Operand::bool(true);
    }
    let Some(map) = as_object(&record) else {
        return fail("object_keys_subset record is not an object");
    };
    let allowed = args.get(1);
    let Some(allowed) = allowed.elements() else {
        return fail("object_keys_subset allowed keys are not an array");
    };
    let allowed: Vec<&str> = allowed
        .iter()
        .filter_map(|a| a.as_json().and_then(Value::as_str))
        .collect();
    Operand::bool(map.keys().all(|k| allowed.contains(&k.as_str())))
}

fn len<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let n = match args.get(0) {
        Operand::List(items) => items.len(),
        Operand::Json(v) => match v.as_ref() {
            Value::Array(items) => items.len(),
            Value::Object(map) => map.len(),
            Value::String(s) => s.chars().count(),
            _ => 0,
        },
        _ => 0,
    };
    Operand::count(n)
}

fn type_of<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::string(args.get(0).type_name())
}

fn unique_values<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let source = args.get(0);
    let Some(records) = as_array(&source) else {
        return fail("unique_values source is not an array");
    };
    let field = args.get(1);
    let Some(field) = field.as_json().and_then(Value::as_str) else {
        return fail("unique_values field name is not a string");
    };
    let values: Vec<&Value> = records
        .iter()
        .filter_map(|rec| lookup_dotted(rec, field))
        .collect();
    Operand::bool(
        values
            .iter()
            .tuple_combinations()
            .all(|(a, b)| !json_equals(a, b)),
    )
}

/// Scope entries of a link or node; a missing scope is empty. `None` when malformed.
pub(super) fn scope_of(record: &Value, fold_case: bool) -> Option<Vec<String>> {
    match record.get("authority_scope") {
        None | Some(Value::Null) => Some(Vec::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| {
                v.as_str()
                    .map(|s| if fold_case { s.to_lowercase() } else { s.to_string() })
            })
            .collect(),
        Some(_) => None,
    }
}

fn all_links_subset_authority<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let links = args.get(0);
    let Some(links) = as_array(&links) else {
        return fail("links are not an array");
    };
    let subset = links.iter().tuple_windows().all(|(parent, child)| {
        match (scope_of(parent, false), scope_of(child, false)) {
            (Some(parent), Some(child)) => child.iter().all(|s| parent.contains(s)),
            _ => false,
        }
    });
    Operand::bool(subset)
}

fn delegation_budget_conserved<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let links = args.get(0);
    let Some(links) = as_array(&links) else {
        return fail("links are not an array");
    };
    fn budget(link: &Value) -> Option<&Value> {
        link.get("budget_allocated_micro").filter(|v| !v.is_null())
    }
    let conserved = links.iter().tuple_windows().all(|(parent, child)| {
        match (budget(parent), budget(child)) {
            (Some(p), Some(c)) => match (json_to_bigint(p), json_to_bigint(c)) {
                (Some(p), Some(c)) => c <= p,
                _ => false,
            },
            _ => true,
        }
    });
    Operand::bool(conserved)
}

fn links_temporally_ordered<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let links = args.get(0);
    let Some(links) = as_array(&links) else {
        return fail("links are not an array");
    };
    let stamps: Option<Vec<_>> = links
        .iter()
        .map(|link| link.get("timestamp").and_then(parse_timestamp))
        .collect();
    let Some(stamps) = stamps else {
        return fail("link timestamp missing or invalid");
    };
    Operand::bool(stamps.iter().tuple_windows().all(|(a, b)| a <= b))
}

fn links_form_chain<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let links = args.get(0);
    let Some(links) = as_array(&links) else {
        return fail("links are not an array");
    };
    let chained = links.iter().tuple_windows().all(|(prev, next)| {
        match (prev.get("delegatee"), next.get("delegator")) {
            (Some(a), Some(b)) => !a.is_null() && json_equals(a, b),
            _ => false,
        }
    });
    Operand::bool(chained)
}

fn no_emergent_in_individual<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let individual = args.get(1);
    if individual.is_nullish() {
        return Operand::bool(true);
    }
    let Some(individual) = as_object(&individual) else {
        return fail("individual capabilities are not an object");
    };
    let emergent = args.get(0);
    let Some(emergent) = emergent.elements() else {
        return fail("emergent capabilities are not an array");
    };
    let clash = emergent.iter().filter_map(Operand::as_json).any(|cap| {
        individual
            .values()
            .filter_map(Value::as_array)
            .any(|caps| caps.iter().any(|c| json_equals(c, cap)))
    });
    Operand::bool(!clash)
}

fn all_emergent_have_evidence<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let emergent = args.get(0);
    let Some(emergent) = emergent.elements() else {
        return fail("emergent capabilities are not an array");
    };
    let evidence = args.get(1);
    let Some(evidence) = as_array(&evidence) else {
        return fail("evidence is not an array");
    };
    let covered = emergent.iter().all(|cap| {
        cap.as_json().is_some_and(|cap| {
            evidence
                .iter()
                .any(|e| e.get("capability").is_some_and(|c| json_equals(c, cap)))
        })
    });
    Operand::bool(covered)
}
