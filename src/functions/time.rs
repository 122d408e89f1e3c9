use chrono::{DateTime, FixedOffset, NaiveDate, SecondsFormat, Utc};
use serde_json::{json, Value};

use super::{fail, Args, Builtin};
use crate::numeric::to_f64;
use crate::value::Operand;

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("is_after", "is_after(a, b) -> boolean", 2..=2, is_after)
            .describe("True when timestamp a is strictly later than b. Invalid timestamps are false.")
            .example(
                "Later timestamp",
                json!({"a": "2026-06-02T00:00:00Z", "b": "2026-06-01T00:00:00Z"}),
                "is_after(a, b)",
                true,
            )
            .example(
                "Equal timestamps",
                json!({"a": "2026-06-01T00:00:00Z", "b": "2026-06-01T00:00:00Z"}),
                "is_after(a, b)",
                false,
            )
            .example(
                "Offsets are honoured",
                json!({"a": "2026-06-01T02:00:00+01:00", "b": "2026-06-01T00:30:00Z"}),
                "is_after(a, b)",
                true,
            )
            .example(
                "Free-form dates are rejected",
                json!({"a": "June 2, 2026", "b": "2026-06-01T00:00:00Z"}),
                "is_after(a, b)",
                false,
            ),
        Builtin::new("is_before", "is_before(a, b) -> boolean", 2..=2, is_before)
            .describe("True when timestamp a is strictly earlier than b.")
            .example(
                "Earlier timestamp",
                json!({"a": "2026-01-01T00:00:00Z", "b": "2026-06-01T00:00:00Z"}),
                "is_before(a, b)",
                true,
            )
            .example(
                "Slash dates are rejected",
                json!({"a": "2026/01/01", "b": "2026-06-01T00:00:00Z"}),
                "is_before(a, b)",
                false,
            ),
        Builtin::new("is_between", "is_between(value, lower, upper) -> boolean", 3..=3, is_between)
            .describe("True when lower <= value <= upper.")
            .example(
                "Inside the range",
                json!({"d": "2026-03-15T00:00:00Z", "lo": "2026-01-01T00:00:00Z", "hi": "2026-12-31T00:00:00Z"}),
                "is_between(d, lo, hi)",
                true,
            )
            .example(
                "Lower boundary is inclusive",
                json!({"d": "2026-01-01T00:00:00Z", "lo": "2026-01-01T00:00:00Z", "hi": "2026-12-31T00:00:00Z"}),
                "is_between(d, lo, hi)",
                true,
            )
            .example(
                "Before the range",
                json!({"d": "2025-12-31T00:00:00Z", "lo": "2026-01-01T00:00:00Z", "hi": "2026-12-31T00:00:00Z"}),
                "is_between(d, lo, hi)",
                false,
            ),
        Builtin::new("is_stale", "is_stale(timestamp, max_age_seconds, reference) -> boolean", 3..=3, is_stale)
            .describe("True when more than max_age_seconds elapsed between timestamp and reference.")
            .example(
                "Two hours old with one hour limit",
                json!({"ts": "2026-01-01T00:00:00Z", "ref": "2026-01-01T02:00:00Z"}),
                "is_stale(ts, 3600, ref)",
                true,
            )
            .example(
                "Exactly at the limit is fresh",
                json!({"ts": "2026-01-01T00:00:00Z", "ref": "2026-01-01T01:00:00Z"}),
                "is_stale(ts, 3600, ref)",
                false,
            )
            .example(
                "Negative max age",
                json!({"ts": "2026-01-01T00:00:00Z", "ref": "2026-01-01T02:00:00Z", "neg": -1}),
                "is_stale(ts, neg, ref)",
                false,
            ),
        Builtin::new("is_within", "is_within(timestamp, max_age_seconds, reference) -> boolean", 3..=3, is_within)
            .describe("True when at most max_age_seconds elapsed between timestamp and reference.")
            .example(
                "Exactly at the limit",
                json!({"ts": "2026-01-01T00:00:00Z", "ref": "2026-01-01T01:00:00Z"}),
                "is_within(ts, 3600, ref)",
                true,
            )
            .example(
                "Too old",
                json!({"ts": "2026-01-01T00:00:00Z", "ref": "2026-01-01T02:00:00Z"}),
                "is_within(ts, 3600, ref)",
                false,
            ),
        Builtin::new("now", "now() -> string", 0..=0, now)
            .describe("Evaluation instant as an RFC 3339 string; the configured evaluation timestamp when set.")
            .example("Now is after a past deadline", json!({"deadline": "2000-01-01T00:00:00Z"}), "is_after(now(), deadline)", true),
    ]
}

/// Strict RFC 3339, or a bare `YYYY-MM-DD` date taken as midnight UTC.
pub(super) fn parse_timestamp(value: &Value) -> Option<DateTime<FixedOffset>> {
    let s = value.as_str()?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts);
    }
    if s.len() != 10 {
        return None;
    }
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc().fixed_offset())
}

fn timestamp(operand: &Operand<'_>) -> Option<DateTime<FixedOffset>> {
    operand.as_json().and_then(parse_timestamp)
}

fn pair(args: &Args<'_, '_>) -> Option<(DateTime<FixedOffset>, DateTime<FixedOffset>)> {
    timestamp(&args.get(0)).zip(timestamp(&args.get(1)))
}

fn is_after<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(pair(args).is_some_and(|(a, b)| a > b))
}

fn is_before<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    Operand::bool(pair(args).is_some_and(|(a, b)| a < b))
}

fn is_between<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let value = timestamp(&args.get(0));
    let lower = timestamp(&args.get(1));
    let upper = timestamp(&args.get(2));
    match (value, lower, upper) {
        (Some(v), Some(lo), Some(hi)) => Operand::bool(lo <= v && v <= hi),
        _ => fail("is_between timestamp invalid"),
    }
}

/// Seconds from `timestamp` to `reference`, with the validated max age.
fn age(args: &Args<'_, '_>) -> Option<(f64, f64)> {
    let ts = timestamp(&args.get(0))?;
    let reference = timestamp(&args.get(2))?;
    let max_age = to_f64(&args.get(1)).filter(|m| *m >= 0.0)?;
    let elapsed = (reference - ts).num_milliseconds() as f64 / 1000.0;
    Some((elapsed, max_age))
}

fn is_stale<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    match age(args) {
        Some((elapsed, max_age)) => Operand::bool(elapsed > max_age),
        None => fail("is_stale arguments invalid"),
    }
}

fn is_within<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    match age(args) {
        Some((elapsed, max_age)) => Operand::bool(elapsed <= max_age),
        None => fail("is_within arguments invalid"),
    }
}

fn now<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let instant = args
        .options()
        .evaluation_timestamp
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|ts| ts.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Operand::string(instant.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_rfc3339_and_plain_dates() {
        assert!(parse_timestamp(&json!("2026-06-01T12:00:00.250Z")).is_some());
        assert!(parse_timestamp(&json!("2026-06-01T12:00:00+02:00")).is_some());
        assert!(parse_timestamp(&json!("2026-06-01")).is_some());
    }

    #[test]
    fn rejects_other_formats() {
        for bad in ["June 1, 2026", "2026/06/01", "2026-13-01", "", "1717200000"] {
            assert!(parse_timestamp(&json!(bad)).is_none(), "{bad}");
        }
        assert!(parse_timestamp(&json!(1717200000)).is_none());
    }
}
