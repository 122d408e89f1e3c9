use num_bigint::BigInt;
use num_traits::Zero;
use serde_json::{json, Value};

use super::{fail, Args, Builtin};
use crate::context::lookup_dotted;
use crate::numeric::to_bigint;
use crate::value::Operand;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("bigint_sum", "bigint_sum(array, field?) -> bigint", 1..=2, bigint_sum)
            .describe(
                "Exact sum. Form 1: bigint_sum([a, b]). Form 2: bigint_sum(records, 'field') \
                 where the field may be a dotted path. Null and missing values are skipped.",
            )
            .example(
                "Sum array literal fields",
                json!({"a": "100", "b": "200"}),
                "bigint_sum([a, b]) == 300",
                true,
            )
            .example(
                "Sum field from array of objects",
                json!({"items": [{"cost": "10"}, {"cost": "20"}, {"cost": "30"}]}),
                "bigint_sum(items, 'cost') == 60",
                true,
            )
            .example(
                "Dotted field path",
                json!({"candidates": [{"usage": {"cost_micro": "5"}}, {"usage": {"cost_micro": "7"}}]}),
                "bigint_sum(candidates, 'usage.cost_micro') == 12",
                true,
            )
            .example(
                "Thirty digit amounts stay exact",
                json!({"a": "999999999999999999999999999999", "b": "1"}),
                "bigint_eq(bigint_sum([a, b]), '1000000000000000000000000000000')",
                true,
            )
            .example(
                "Malformed amount fails closed",
                json!({"items": [{"cost": "10"}, {"cost": "1.5"}]}),
                "bigint_sum(items, 'cost') == 10",
                false,
            ),
        Builtin::new("bigint_gte", "bigint_gte(a, b) -> boolean", 2..=2, bigint_gte)
            .describe("True when a >= b after exact integer conversion.")
            .example("Greater value passes", json!({"budget": "1000", "cost": "500"}), "bigint_gte(budget, cost)", true)
            .example("Equal values pass", json!({"a": "100", "b": "100"}), "bigint_gte(a, b)", true)
            .example("Lesser value fails", json!({"a": "50", "b": "100"}), "bigint_gte(a, b)", false),
        Builtin::new("bigint_gt", "bigint_gt(a, b) -> boolean", 2..=2, bigint_gt)
            .describe("True when a > b after exact integer conversion.")
            .example("Strictly greater passes", json!({"a": "200", "b": "100"}), "bigint_gt(a, b)", true)
            .example("Equal values fail", json!({"a": "100", "b": "100"}), "bigint_gt(a, b)", false),
        Builtin::new("bigint_eq", "bigint_eq(a, b) -> boolean", 2..=2, bigint_eq)
            .describe("True when a == b after exact integer conversion.")
            .example("Equal numeric strings", json!({"a": "1000000", "b": "1000000"}), "bigint_eq(a, b)", true)
            .example("Different values", json!({"a": "100", "b": "200"}), "bigint_eq(a, b)", false)
            .example("Leading zeros are malformed", json!({"a": "0100", "b": "100"}), "bigint_eq(a, b)", false),
        Builtin::new("bigint_sub", "bigint_sub(a, b) -> bigint", 2..=2, bigint_sub)
            .describe("Exact difference a - b. May be negative.")
            .example(
                "Simple subtraction",
                json!({"total": "1000", "part": "300"}),
                "bigint_eq(bigint_sub(total, part), 700)",
                true,
            )
            .example("Subtraction to zero", json!({"a": "500", "b": "500"}), "bigint_eq(bigint_sub(a, b), 0)", true),
        Builtin::new("bigint_add", "bigint_add(a, b) -> bigint", 2..=2, bigint_add)
            .describe("Exact sum a + b.")
            .example("Simple addition", json!({"a": "100", "b": "200"}), "bigint_eq(bigint_add(a, b), 300)", true)
            .example("Addition with zero", json!({"a": "500", "b": "0"}), "bigint_eq(bigint_add(a, b), 500)", true),
        Builtin::new("is_bigint_coercible", "is_bigint_coercible(value) -> boolean", 1..=1, is_bigint_coercible)
            .describe("True for canonical integer strings and integral numbers.")
            .example("Negative integer string", json!({"v": "-500"}), "is_bigint_coercible(v)", true)
            .example("Integral number", json!({"count": 42}), "is_bigint_coercible(count)", true)
            .example("Decimal string", json!({"v": "1.50"}), "is_bigint_coercible(v)", false)
            .example("Null", json!({"v": null}), "is_bigint_coercible(v)", false),
    ]
}

fn bigint_sum<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let source = args.get(0);
    let Some(items) = source.elements() else {
        return fail("bigint_sum source is not an array");
    };
    let field = match args.get(1) {
        Operand::Absent if args.len() < 2 => None,
        Operand::Json(v) => match v.as_ref() {
            Value::String(s) => Some(s.clone()),
            _ => return fail("bigint_sum field name is not a string"),
        },
        _ => return fail("bigint_sum field name is not a string"),
    };

    let mut total = BigInt::zero();
    for item in &items {
        let selected = match &field {
            Some(path) => Operand::from_option(item.as_json().and_then(|rec| lookup_dotted(rec, path))),
            None => item.clone(),
        };
        if selected.is_nullish() {
            continue;
        }
        match to_bigint(&selected) {
            Some(n) => total += n,
            None => return fail("bigint_sum operand is not an integer"),
        }
    }
    Operand::Int(total)
}

fn operands(args: &Args<'_, '_>) -> Option<(BigInt, BigInt)> {
    let a = to_bigint(&args.get(0));
    let b = to_bigint(&args.get(1));
    if a.is_none() || b.is_none() {
        tracing::debug!("rejected non-integer operand");
    }
    a.zip(b)
}

fn bigint_gte<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(operands(args).is_some_and(|(a, b)| a >= b))
}

fn bigint_gt<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(operands(args).is_some_and(|(a, b)| a > b))
}

fn bigint_eq<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(operands(args).is_some_and(|(a, b)| a == b))
}

fn bigint_sub<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    match operands(args) {
        Some((a, b)) => Operand::Int(a - b),
        None => Operand::bool(false),
    }
}

fn bigint_add<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    match operands(args) {
        Some((a, b)) => Operand::Int(a + b),
        None => Operand::bool(false),
    }
}

fn is_bigint_coercible<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(to_bigint(&args.get(0)).is_some())
}
