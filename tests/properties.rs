use constraint_expr as ce;
use num_bigint::BigInt;
use proptest::prelude::*;
use serde_json::{json, Value};

fn digits() -> impl Strategy<Value = String> {
    "[1-9][0-9]{20,40}"
}

fn nested_tree(levels: usize) -> Value {
    let mut node = json!({"budget_allocated_micro": "1", "authority_scope": ["a"]});
    for _ in 0..levels {
        node = json!({"budget_allocated_micro": "1", "authority_scope": ["a"], "children": [node]});
    }
    node
}

proptest! {
    #[test]
    fn bigint_sum_is_exact(xs in prop::collection::vec(digits(), 1..6)) {
        let expected: BigInt = xs.iter().map(|s| s.parse::<BigInt>().unwrap()).sum();
        let items: Vec<Value> = xs.iter().map(|s| json!({"amount": s})).collect();
        let data = json!({"items": items, "total": expected.to_string()});
        prop_assert_eq!(
            ce::evaluate_constraint(&data, "bigint_eq(bigint_sum(items, 'amount'), total)"),
            Ok(true)
        );
    }

    #[test]
    fn bigint_add_then_sub_is_identity(a in digits(), b in digits()) {
        let data = json!({"a": a, "b": b});
        prop_assert_eq!(
            ce::evaluate_constraint(&data, "bigint_eq(bigint_sub(bigint_add(a, b), b), a)"),
            Ok(true)
        );
    }

    #[test]
    fn bigint_ordering_matches_integers(a in any::<i64>(), b in any::<i64>()) {
        let data = json!({"a": a.to_string(), "b": b.to_string()});
        prop_assert_eq!(ce::evaluate_constraint(&data, "bigint_gte(a, b)"), Ok(a >= b));
        prop_assert_eq!(ce::evaluate_constraint(&data, "bigint_gt(a, b)"), Ok(a > b));
        prop_assert_eq!(ce::evaluate_constraint(&data, "bigint_eq(a, b)"), Ok(a == b));
    }

    #[test]
    fn changed_iff_values_differ(now in 0i64..5, before in 0i64..5) {
        let data = json!({"v": now, "_previous": {"v": before}});
        prop_assert_eq!(ce::evaluate_constraint(&data, "changed(v)"), Ok(now != before));
        let expected_delta = (now - before).to_string();
        let data = json!({"v": now, "_previous": {"v": before}, "d": expected_delta});
        prop_assert_eq!(ce::evaluate_constraint(&data, "bigint_eq(delta(v), d)"), Ok(true));
    }

    #[test]
    fn without_previous_nothing_changed(v in any::<i64>()) {
        let data = json!({"v": v});
        prop_assert_eq!(ce::evaluate_constraint(&data, "changed(v)"), Ok(false));
        prop_assert_eq!(ce::evaluate_constraint(&data, "delta(v) == 0"), Ok(true));
    }

    #[test]
    fn keys_subset_of_superset(keys in prop::collection::btree_set("[a-z]{1,6}", 0..6), extra in "[A-Z]{1,4}") {
        let record: serde_json::Map<String, Value> = keys.iter().map(|k| (k.clone(), json!(1))).collect();
        let mut allowed: Vec<String> = keys.iter().cloned().collect();
        allowed.push(extra.clone());
        let data = json!({"rec": record, "allowed": allowed});
        prop_assert_eq!(ce::evaluate_constraint(&data, "object_keys_subset(rec, allowed)"), Ok(true));

        let mut widened = data.clone();
        widened["rec"][extra.to_lowercase() + "_x"] = json!(1);
        widened["allowed"] = json!(keys.iter().cloned().collect::<Vec<_>>());
        prop_assert_eq!(ce::evaluate_constraint(&widened, "object_keys_subset(rec, allowed)"), Ok(false));
    }

    #[test]
    fn tree_depth_bound(levels in 0usize..16) {
        let data = json!({"root": nested_tree(levels)});
        let within = levels <= ce::functions::MAX_TREE_DEPTH;
        prop_assert_eq!(ce::evaluate_constraint(&data, "tree_budget_conserved(root)"), Ok(within));
        prop_assert_eq!(ce::evaluate_constraint(&data, "tree_authority_narrowing(root)"), Ok(within));
    }

    #[test]
    fn whitespace_only_tokenizes_to_nothing(ws in "[ \t\r\n]{0,20}") {
        prop_assert_eq!(ce::tokenizer::tokenize(&ws), Ok(Vec::new()));
    }

    #[test]
    fn token_positions_are_increasing(expr in "[a-z]{1,4}( (==|&&|\\|\\||>=) [a-z0-9]{1,4}){0,4}") {
        let tokens = ce::tokenizer::tokenize(&expr).unwrap();
        prop_assert!(tokens.windows(2).all(|w| w[0].position < w[1].position));
        for tok in &tokens {
            prop_assert!(expr[tok.position..].starts_with(&tok.value));
        }
    }

    #[test]
    fn evaluation_never_errors_after_parse(v in prop_oneof![
        Just(json!(null)), Just(json!("x")), Just(json!([1, 2])), Just(json!({"a": 1})), any::<i32>().prop_map(|n| json!(n))
    ]) {
        let data = json!({"v": v.clone(), "_previous": {"v": v}});
        for name in ce::Registry::global().names() {
            let builtin = ce::Registry::global().get(name).unwrap();
            let args = vec!["v"; *builtin.arity.end()].join(", ");
            let result = ce::evaluate_constraint(&data, &format!("{name}({args})"));
            prop_assert!(result.is_ok(), "{name}");
        }
    }
}
