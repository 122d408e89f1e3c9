use constraint_expr as ce;
use serde_json::json;

#[test]
fn test_implication_is_outermost() {
    let data = json!({"is_stale": true, "discounted": true});
    assert!(ce::evaluate_constraint(&data, "is_stale => discounted == true").unwrap());

    let data = json!({"is_stale": true, "discounted": false});
    assert!(!ce::evaluate_constraint(&data, "is_stale => discounted == true").unwrap());

    let data = json!({"is_stale": false, "discounted": false});
    assert!(ce::evaluate_constraint(&data, "is_stale => discounted == true").unwrap());
}

#[test]
fn test_implication_with_disjunction_on_both_sides() {
    let data = json!({"a": false, "b": true, "c": false, "d": false});
    // (a || b) => (c || d)
    assert!(!ce::evaluate_constraint(&data, "a || b => c || d").unwrap());
    assert!(ce::evaluate_constraint(&data, "a || b => c || !d").unwrap());
}

#[test]
fn test_and_binds_tighter_than_or() {
    let data = json!({"a": true, "b": false, "c": false});
    assert!(ce::evaluate_constraint(&data, "a || b && c").unwrap());
    assert!(!ce::evaluate_constraint(&data, "(a || b) && c").unwrap());
}

#[test]
fn test_not_binds_tighter_than_comparison() {
    let data = json!({"flag": false, "n": 1});
    assert!(ce::evaluate_constraint(&data, "!flag == true").unwrap());
    assert!(ce::evaluate_constraint(&data, "!(n > 2)").unwrap());
}

#[test]
fn test_relational_operators() {
    let data = json!({"score": 7.5, "limit": 10, "name": "beta"});
    assert!(ce::evaluate_constraint(&data, "score < limit").unwrap());
    assert!(ce::evaluate_constraint(&data, "score <= 7.5").unwrap());
    assert!(ce::evaluate_constraint(&data, "limit >= 10").unwrap());
    assert!(ce::evaluate_constraint(&data, "name > 'alpha'").unwrap());
    assert!(!ce::evaluate_constraint(&data, "name > 1").unwrap());
}

#[test]
fn test_nested_paths_and_indexes() {
    let data = json!({
        "departments": [
            {"team": [{"name": "Alice", "info": {"age": 29}}]},
            {"team": [{"name": "Carol", "info": {"age": 41}}]}
        ]
    });
    assert!(ce::evaluate_constraint(&data, "departments[1].team[0].info.age == 41").unwrap());
    assert!(ce::evaluate_constraint(&data, "departments[0]['team'][0].name == 'Alice'").unwrap());
    assert!(!ce::evaluate_constraint(&data, "departments[5].team[0].name == 'Alice'").unwrap());
}

#[test]
fn test_array_literal_arguments() {
    let data = json!({"a": "1", "b": "2", "c": "3"});
    assert!(ce::evaluate_constraint(&data, "bigint_eq(bigint_sum([a, b, c]), 6)").unwrap());
    assert!(ce::evaluate_constraint(&data, "len([a, b]) == 2").unwrap());
    assert!(ce::evaluate_constraint(&data, "bigint_sum([]) == 0").unwrap());
}

#[test]
fn test_every_with_nested_call() {
    let data = json!({
        "accounts": [
            {"balance": "100", "floor": "10"},
            {"balance": "50", "floor": "50"}
        ]
    });
    assert!(ce::evaluate_constraint(&data, "accounts.every(a => bigint_gte(a.balance, a.floor))").unwrap());
    assert!(!ce::evaluate_constraint(&data, "accounts.every(a => bigint_gt(a.balance, a.floor))").unwrap());
    assert!(ce::evaluate_constraint(&json!({"accounts": []}), "accounts.every(a => false)").unwrap());
}

#[test]
fn test_length_postfix() {
    let data = json!({"items": [1, 2, 3], "name": "abc"});
    assert!(ce::evaluate_constraint(&data, "items.length == 3 && name.length == 3").unwrap());
    assert!(ce::evaluate_constraint(&data, "missing.length == 0").unwrap());
}

#[test]
fn test_undefined_guard() {
    let data = json!({"issued_at": "2026-01-01T00:00:00Z"});
    let expr = "expires_at == undefined || is_after(expires_at, issued_at)";
    assert!(ce::evaluate_constraint(&data, expr).unwrap());

    let data = json!({"issued_at": "2026-01-01T00:00:00Z", "expires_at": "2025-01-01T00:00:00Z"});
    assert!(!ce::evaluate_constraint(&data, expr).unwrap());
}
