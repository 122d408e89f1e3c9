use itertools::Itertools;
use num_bigint::BigInt;
use num_traits::Zero;
use serde_json::{json, Map, Value};

use super::time::parse_timestamp;
use super::{as_object, fail, is_completed, Args, Builtin};
use crate::comparison::json_equals;
use crate::numeric::{json_number, json_to_bigint};
use crate::value::Operand;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("saga_amount_conserved", "saga_amount_conserved(saga) -> boolean", 1..=1, saga_amount_conserved)
            .describe(
                "Completed compensation steps must exactly reverse completed forward steps (sums of amount_micro). \
                 A saga with no completed compensation is vacuously conserved; pending steps are ignored.",
            )
            .example(
                "Compensation restores balance",
                json!({"saga": {
                    "steps": [{"step_id": "s1", "status": "completed", "amount_micro": "1000"}],
                    "compensation_steps": [{"step_id": "c1", "status": "completed", "amount_micro": "1000"}]
                }}),
                "saga_amount_conserved(saga)",
                true,
            )
            .example(
                "Partial compensation",
                json!({"saga": {
                    "steps": [{"step_id": "s1", "status": "completed", "amount_micro": "1000"}],
                    "compensation_steps": [{"step_id": "c1", "status": "completed", "amount_micro": "400"}]
                }}),
                "saga_amount_conserved(saga)",
                false,
            )
            .example(
                "Pending steps are ignored",
                json!({"saga": {
                    "steps": [
                        {"step_id": "s1", "status": "completed", "amount_micro": "1000"},
                        {"step_id": "s2", "status": "pending", "amount_micro": "9999999"}
                    ],
                    "compensation_steps": []
                }}),
                "saga_amount_conserved(saga)",
                true,
            ),
        Builtin::new("saga_steps_sequential", "saga_steps_sequential(saga) -> boolean", 1..=1, saga_steps_sequential)
            .describe("All step_id values across the saga's steps are pairwise distinct.")
            .example(
                "Distinct step ids",
                json!({"saga": {"steps": [{"step_id": "s1"}, {"step_id": "s2"}]}}),
                "saga_steps_sequential(saga)",
                true,
            )
            .example(
                "Duplicate step ids",
                json!({"saga": {"steps": [{"step_id": "s1"}, {"step_id": "s1"}]}}),
                "saga_steps_sequential(saga)",
                false,
            ),
        Builtin::new("saga_timeout_valid", "saga_timeout_valid(saga) -> boolean", 1..=1, saga_timeout_valid)
            .describe(
                "Completed steps ran within timeout.per_step_seconds, and the saga within timeout.total_seconds. \
                 Pending steps are skipped.",
            )
            .example(
                "Step within its timeout",
                json!({"saga": {
                    "timeout": {"total_seconds": 300, "per_step_seconds": 60},
                    "steps": [{"step_id": "s1", "status": "completed",
                               "started_at": "2026-01-01T00:00:00Z", "completed_at": "2026-01-01T00:00:30Z"}]
                }}),
                "saga_timeout_valid(saga)",
                true,
            )
            .example(
                "Step exceeds its timeout",
                json!({"saga": {
                    "timeout": {"total_seconds": 300, "per_step_seconds": 60},
                    "steps": [{"step_id": "s1", "status": "completed",
                               "started_at": "2026-01-01T00:00:00Z", "completed_at": "2026-01-01T00:02:00Z"}]
                }}),
                "saga_timeout_valid(saga)",
                false,
            )
            .example(
                "Missing timeout configuration",
                json!({"saga": {"steps": []}}),
                "saga_timeout_valid(saga)",
                false,
            ),
    ]
}

/// Steps listed under `key`; a missing list is empty, anything but an array is malformed.
fn step_list<'v>(saga: &'v Map<String, Value>, key: &str) -> Option<&'v [Value]> {
    match saga.get(key) {
        None | Some(Value::Null) => Some(&[]),
        Some(Value::Array(items)) => Some(items),
        Some(_) => None,
    }
}

fn completed_total(steps: &[Value]) -> Option<(BigInt, usize)> {
    steps
        .iter()
        .filter(|s| is_completed(s))
        .try_fold((BigInt::zero(), 0), |(sum, n), step| {
            let amount = step.get("amount_micro").and_then(json_to_bigint)?;
            Some((sum + amount, n + 1))
        })
}

fn saga_amount_conserved<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let saga = args.get(0);
    let Some(saga) = as_object(&saga) else {
        return fail("saga is not an object");
    };
    let (Some(forward), Some(compensation)) = (step_list(saga, "steps"), step_list(saga, "compensation_steps")) else {
        return fail("saga steps are not arrays");
    };
    let (Some((forward, _)), Some((compensated, count))) = (completed_total(forward), completed_total(compensation))
    else {
        return fail("saga step amount is not an integer");
    };
    Operand::bool(count == 0 || forward == compensated)
}

fn saga_steps_sequential<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let saga = args.get(0);
    let Some(saga) = as_object(&saga) else {
        return fail("saga is not an object");
    };
    let Some(steps) = step_list(saga, "steps") else {
        return fail("saga steps are not an array");
    };
    let ids: Option<Vec<&Value>> = steps.iter().map(|s| s.get("step_id")).collect();
    let Some(ids) = ids else {
        return fail("saga step without step_id");
    };
    Operand::bool(ids.iter().tuple_combinations().all(|(a, b)| !json_equals(a, b)))
}

fn saga_timeout_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let saga = args.get(0);
    let Some(saga) = as_object(&saga) else {
        return fail("saga is not an object");
    };
    let Some(timeout) = saga.get("timeout").and_then(Value::as_object) else {
        return fail("saga has no timeout");
    };
    let Some(per_step) = json_number(timeout.get("per_step_seconds")) else {
        return fail("saga timeout has no per_step_seconds");
    };
    let total = json_number(timeout.get("total_seconds"));
    let Some(steps) = step_list(saga, "steps") else {
        return fail("saga steps are not an array");
    };

    let mut span = None;
    for step in steps.iter().filter(|s| is_completed(s)) {
        let started = step.get("started_at").and_then(parse_timestamp);
        let finished = step.get("completed_at").and_then(parse_timestamp);
        let (Some(started), Some(finished)) = (started, finished) else {
            return fail("completed saga step lacks valid timestamps");
        };
        if finished < started || seconds(finished - started) > per_step {
            return Operand::bool(false);
        }
        span = Some(match span {
            None => (started, finished),
            Some((first, last)) => (started.min(first), finished.max(last)),
        });
    }
    let within_total = match (total, span) {
        (Some(limit), Some((first, last))) => seconds(last - first) <= limit,
        _ => true,
    };
    Operand::bool(within_total)
}

fn seconds(d: chrono::TimeDelta) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}
