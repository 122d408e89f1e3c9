use num_bigint::BigInt;
use num_traits::Zero;
use serde_json::{json, Value};
use tracing::debug;

use super::structural::scope_of;
use super::{fail, Args, Builtin};
use crate::numeric::json_to_bigint;
use crate::value::Operand;

/// Deepest node level visited by the tree verifiers; the root is level 0.
pub const MAX_TREE_DEPTH: usize = 10;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("tree_budget_conserved", "tree_budget_conserved(node) -> boolean", 1..=1, tree_budget_conserved)
            .describe(
                "At every level the children's budget_allocated_micro sum does not exceed the parent's. \
                 Leaves pass, a null root is vacuously true, trees deeper than 10 levels fail.",
            )
            .example(
                "Children within parent budget",
                json!({"root": {"budget_allocated_micro": "1000", "children": [
                    {"budget_allocated_micro": "600"},
                    {"budget_allocated_micro": "400"}
                ]}}),
                "tree_budget_conserved(root)",
                true,
            )
            .example(
                "Children overspend",
                json!({"root": {"budget_allocated_micro": "1000", "children": [
                    {"budget_allocated_micro": "600"},
                    {"budget_allocated_micro": "600"}
                ]}}),
                "tree_budget_conserved(root)",
                false,
            )
            .example("Null root", json!({"root": null}), "tree_budget_conserved(root)", true),
        Builtin::new("tree_authority_narrowing", "tree_authority_narrowing(node) -> boolean", 1..=1, tree_authority_narrowing)
            .describe(
                "Each child's authority_scope is a case-insensitive subset of its parent's. \
                 An empty child scope always passes.",
            )
            .example(
                "Valid narrowing",
                json!({"root": {"authority_scope": ["billing", "inference"], "children": [
                    {"authority_scope": ["billing"], "children": []}
                ]}}),
                "tree_authority_narrowing(root)",
                true,
            )
            .example(
                "Widening authority",
                json!({"root": {"authority_scope": ["billing"], "children": [
                    {"authority_scope": ["billing", "delegation"]}
                ]}}),
                "tree_authority_narrowing(root)",
                false,
            )
            .example(
                "Case is ignored",
                json!({"root": {"authority_scope": ["Billing", "INFERENCE"], "children": [
                    {"authority_scope": ["billing", "inference"]}
                ]}}),
                "tree_authority_narrowing(root)",
                true,
            ),
    ]
}

/// `Some(&[])` for leaves, `None` when `children` has the wrong shape.
fn children_of(node: &Value) -> Option<&[Value]> {
    match node.get("children") {
        None | Some(Value::Null) => Some(&[]),
        Some(Value::Array(items)) => Some(items),
        Some(_) => None,
    }
}

fn tree_budget_conserved<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let root = args.get(0);
    if root.is_nullish() {
        return Operand::bool(true);
    }
    match root.as_json() {
        Some(node) => Operand::bool(budget_conserved(node, 0)),
        None => fail("tree root is not an object"),
    }
}

fn budget_conserved(node: &Value, depth: usize) -> bool {
    if depth > MAX_TREE_DEPTH {
        debug!(depth, "tree depth bound exceeded");
        return false;
    }
    if !node.is_object() {
        return false;
    }
    let Some(children) = children_of(node) else {
        return false;
    };
    if children.is_empty() {
        return true;
    }
    let Some(parent) = node.get("budget_allocated_micro").and_then(json_to_bigint) else {
        return false;
    };
    let mut allocated = BigInt::zero();
    for child in children {
        match child.get("budget_allocated_micro").and_then(json_to_bigint) {
            Some(budget) => allocated += budget,
            None => return false,
        }
    }
    allocated <= parent && children.iter().all(|c| budget_conserved(c, depth + 1))
}

fn tree_authority_narrowing<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let root = args.get(0);
    if root.is_nullish() {
        return Operand::bool(true);
    }
    match root.as_json() {
        Some(node) => Operand::bool(authority_narrows(node, 0)),
        None => fail("tree root is not an object"),
    }
}

fn authority_narrows(node: &Value, depth: usize) -> bool {
    if depth > MAX_TREE_DEPTH {
        debug!(depth, "tree depth bound exceeded");
        return false;
    }
    if !node.is_object() {
        return false;
    }
    let (Some(scope), Some(children)) = (scope_of(node, true), children_of(node)) else {
        return false;
    };
    children.iter().all(|child| {
        scope_of(child, true).is_some_and(|child_scope| child_scope.iter().all(|s| scope.contains(s)))
            && authority_narrows(child, depth + 1)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(levels: usize) -> Value {
        let mut node = json!({"budget_allocated_micro": "100", "authority_scope": ["a"]});
        for _ in 0..levels {
            node = json!({
                "budget_allocated_micro": "100",
                "authority_scope": ["a"],
                "children": [node]
            });
        }
        node
    }

    #[test]
    fn depth_bound() {
        assert!(budget_conserved(&chain(MAX_TREE_DEPTH), 0));
        assert!(!budget_conserved(&chain(MAX_TREE_DEPTH + 1), 0));
        assert!(authority_narrows(&chain(MAX_TREE_DEPTH), 0));
        assert!(!authority_narrows(&chain(MAX_TREE_DEPTH + 1), 0));
    }

    #[test]
    fn malformed_budget_fails() {
        let node = json!({"budget_allocated_micro": "1000", "children": [{"budget_allocated_micro": "ten"}]});
        assert!(!budget_conserved(&node, 0));
        let missing = json!({"children": [{"budget_allocated_micro": "1"}]});
        assert!(!budget_conserved(&missing, 0));
    }

    #[test]
    fn empty_child_scope_is_subset() {
        let node = json!({"authority_scope": ["billing"], "children": [{"authority_scope": []}]});
        assert!(authority_narrows(&node, 0));
    }
}
