use num_bigint::BigInt;
use serde_json::{json, Value};

use super::{fail, Args, Builtin};
use crate::comparison::equals;
use crate::context::{previous_snapshot, resolve};
use crate::expression::FieldPath;
use crate::numeric::{json_to_bigint, json_to_f64};
use crate::value::Operand;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("changed", "changed(field) -> boolean", 1..=1, changed)
            .describe("True when the field differs from the same field in _previous. False without _previous.")
            .example(
                "Field changed",
                json!({"status": "active", "_previous": {"status": "pending"}}),
                "changed(status)",
                true,
            )
            .example(
                "Field unchanged",
                json!({"status": "active", "_previous": {"status": "active"}}),
                "changed(status)",
                false,
            )
            .example("No previous snapshot", json!({"status": "active"}), "changed(status)", false),
        Builtin::new("previous", "previous(field) -> any", 1..=1, previous)
            .describe("Value of the field inside _previous, absent when there is none.")
            .example(
                "Get previous value",
                json!({"status": "active", "_previous": {"status": "pending"}}),
                "previous(status) == 'pending'",
                true,
            )
            .example("No previous context", json!({"status": "active"}), "previous(status) != 'active'", true)
            .example("No previous context is undefined", json!({"status": "active"}), "previous(status) == undefined", true),
        Builtin::new("delta", "delta(field) -> bigint | number", 1..=1, delta)
            .describe(
                "Numeric difference current - previous. Exact for integers, floating for decimals. \
                 Zero without _previous, false for non-numeric values.",
            )
            .example(
                "Numeric delta",
                json!({"balance": "1000", "_previous": {"balance": "800"}}),
                "bigint_eq(delta(balance), 200)",
                true,
            )
            .example("No previous returns zero", json!({"balance": "500"}), "bigint_eq(delta(balance), 0)", true)
            .example(
                "Decimal delta",
                json!({"score": 0.75, "_previous": {"score": 0.25}}),
                "delta(score) == 0.5",
                true,
            ),
    ]
}

fn snapshot_value<'a>(args: &Args<'_, 'a>, path: &FieldPath) -> Option<Option<&'a Value>> {
    let snapshot = previous_snapshot(args.evaluator().context())?;
    Some(resolve(snapshot, path))
}

fn changed<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let Some(path) = args.path(0) else {
        return fail("changed() expects a field path");
    };
    let Some(before) = snapshot_value(args, path) else {
        return Operand::bool(false);
    };
    let now = args.evaluator().resolve(path);
    let same = equals(&Operand::from_option(before), &Operand::from_option(now), false);
    Operand::bool(!same)
}

fn previous<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let Some(path) = args.path(0) else {
        return fail("previous() expects a field path");
    };
    Operand::from_option(snapshot_value(args, path).flatten())
}

fn delta<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let Some(path) = args.path(0) else {
        return fail("delta() expects a field path");
    };
    let Some(before) = snapshot_value(args, path) else {
        return Operand::Int(BigInt::from(0));
    };
    let (Some(before), Some(now)) = (before, args.evaluator().resolve(path)) else {
        return fail("delta() field missing");
    };
    if let (Some(b), Some(n)) = (json_to_bigint(before), json_to_bigint(now)) {
        return Operand::Int(n - b);
    }
    match (json_to_f64(before), json_to_f64(now)) {
        (Some(b), Some(n)) => Operand::number(n - b),
        _ => fail("delta() operands are not numeric"),
    }
}
