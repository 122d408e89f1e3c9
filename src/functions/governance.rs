use serde_json::{json, Value};

use super::{as_object, fail, Args, Builtin};
use crate::numeric::{json_number, json_to_bigint, to_bigint};
use crate::value::Operand;

/// Allowed distance of a weight sum from 1.0.
pub const WEIGHT_TOLERANCE: f64 = 0.001;

const LIFECYCLE_TRANSITIONS: [(&str, &str); 5] = [
    ("proposed", "under_review"),
    ("proposed", "rejected"),
    ("under_review", "enacted"),
    ("under_review", "rejected"),
    ("enacted", "deprecated"),
];

const QUALIFYING_STATES: [&str; 4] = ["cold", "warming", "established", "authoritative"];

pub(super) fn builtins() -> Vec<Builtin> {
    vec![
        Builtin::new("outcome_consensus_valid", "outcome_consensus_valid(outcome) -> boolean", 1..=1, outcome_consensus_valid)
            .describe(
                "Outcome type agrees with the vote tally: unanimous has no dissent, majority meets \
                 consensus_threshold, deadlock misses it, escalation names escalated_to.",
            )
            .example(
                "Valid unanimous outcome",
                json!({"outcome": {"outcome_type": "unanimous", "votes": [{"vote": "agree"}, {"vote": "agree"}],
                                   "consensus_threshold": 1.0}}),
                "outcome_consensus_valid(outcome)",
                true,
            )
            .example(
                "Unanimous with dissent",
                json!({"outcome": {"outcome_type": "unanimous", "votes": [{"vote": "agree"}, {"vote": "disagree"}],
                                   "consensus_threshold": 1.0}}),
                "outcome_consensus_valid(outcome)",
                false,
            )
            .example(
                "Majority meets threshold",
                json!({"outcome": {"outcome_type": "majority",
                                   "votes": [{"vote": "agree"}, {"vote": "agree"}, {"vote": "disagree"}],
                                   "consensus_threshold": 0.5}}),
                "outcome_consensus_valid(outcome)",
                true,
            )
            .example(
                "Deadlock below threshold",
                json!({"outcome": {"outcome_type": "deadlock", "votes": [{"vote": "agree"}, {"vote": "disagree"}],
                                   "consensus_threshold": 0.75}}),
                "outcome_consensus_valid(outcome)",
                true,
            )
            .example(
                "Escalation without target",
                json!({"outcome": {"outcome_type": "escalation", "votes": [], "consensus_threshold": 0.5}}),
                "outcome_consensus_valid(outcome)",
                false,
            ),
        Builtin::new("monetary_policy_solvent", "monetary_policy_solvent(policy, supply) -> boolean", 2..=2, monetary_policy_solvent)
            .describe("Supply does not exceed policy.conservation_ceiling.")
            .example(
                "Supply under ceiling",
                json!({"policy": {"conservation_ceiling": "1000000"}, "supply": "999999"}),
                "monetary_policy_solvent(policy, supply)",
                true,
            )
            .example(
                "Supply over ceiling",
                json!({"policy": {"conservation_ceiling": "1000000"}, "supply": "1000001"}),
                "monetary_policy_solvent(policy, supply)",
                false,
            ),
        Builtin::new("permission_boundary_active", "permission_boundary_active(boundary) -> boolean", 1..=1, permission_boundary_active)
            .describe("Boundary declares scope, permitted_if, reporting and revocation.")
            .example(
                "Complete boundary",
                json!({"boundary": {
                    "scope": "billing",
                    "permitted_if": "trust_scopes.scopes.billing == 'verified'",
                    "reporting": {"required": true, "report_to": "audit-agent"},
                    "revocation": {"trigger": "manual"}
                }}),
                "permission_boundary_active(boundary)",
                true,
            )
            .example(
                "Missing reporting",
                json!({"boundary": {"scope": "billing", "permitted_if": "true", "revocation": {"trigger": "manual"}}}),
                "permission_boundary_active(boundary)",
                false,
            ),
        Builtin::new("proposal_quorum_met", "proposal_quorum_met(proposal) -> boolean", 1..=1, proposal_quorum_met)
            .describe("Sum of voting.votes_cast[].weight reaches voting.quorum_required.")
            .example(
                "Weighted votes meet quorum",
                json!({"proposal": {"voting": {"quorum_required": 0.5, "votes_cast": [
                    {"voter_id": "a", "vote": "approve", "weight": 0.3},
                    {"voter_id": "b", "vote": "reject", "weight": 0.3}
                ]}}}),
                "proposal_quorum_met(proposal)",
                true,
            )
            .example(
                "No votes cast",
                json!({"proposal": {"voting": {"quorum_required": 0.5, "votes_cast": []}}}),
                "proposal_quorum_met(proposal)",
                false,
            ),
        Builtin::new("proposal_weights_normalized", "proposal_weights_normalized(proposal) -> boolean", 1..=1, proposal_weights_normalized)
            .describe("Vote weights sum to 1.0 within 0.001. No votes is vacuously normalized.")
            .example(
                "Weights sum to one",
                json!({"proposal": {"voting": {"votes_cast": [{"weight": 0.6}, {"weight": 0.4}]}}}),
                "proposal_weights_normalized(proposal)",
                true,
            )
            .example(
                "Weights sum above one",
                json!({"proposal": {"voting": {"votes_cast": [{"weight": 0.6}, {"weight": 0.6}]}}}),
                "proposal_weights_normalized(proposal)",
                false,
            ),
        Builtin::new("proposal_execution_valid", "proposal_execution_valid(execution) -> boolean", 1..=1, proposal_execution_valid)
            .describe("Execution is completed and every applied change succeeded.")
            .example(
                "All changes succeeded",
                json!({"execution": {"status": "completed", "changes_applied": [{"result": "success"}, {"result": "success"}]}}),
                "proposal_execution_valid(execution)",
                true,
            )
            .example(
                "One change failed",
                json!({"execution": {"status": "completed", "changes_applied": [{"result": "success"}, {"result": "failed"}]}}),
                "proposal_execution_valid(execution)",
                false,
            ),
        Builtin::new("constraint_lifecycle_valid", "constraint_lifecycle_valid(event) -> boolean", 1..=1, constraint_lifecycle_valid)
            .describe("from_status -> to_status is a permitted constraint lifecycle transition.")
            .example(
                "Proposed to under review",
                json!({"event": {"from_status": "proposed", "to_status": "under_review"}}),
                "constraint_lifecycle_valid(event)",
                true,
            )
            .example(
                "Proposed straight to enacted",
                json!({"event": {"from_status": "proposed", "to_status": "enacted"}}),
                "constraint_lifecycle_valid(event)",
                false,
            ),
        Builtin::new("model_routing_eligible", "model_routing_eligible(cohort, signal) -> boolean", 2..=2, model_routing_eligible)
            .describe(
                "cohort.personal_score reaches signal.qualifying_score, and when both name a qualifying_state \
                 the cohort's is at least the signal's (cold < warming < established < authoritative).",
            )
            .example(
                "Score above threshold",
                json!({"cohort": {"personal_score": 0.8}, "signal": {"qualifying_score": 0.7}}),
                "model_routing_eligible(cohort, signal)",
                true,
            )
            .example(
                "No personal score",
                json!({"cohort": {"personal_score": null}, "signal": {"qualifying_score": 0.7}}),
                "model_routing_eligible(cohort, signal)",
                false,
            )
            .example(
                "State below requirement",
                json!({"cohort": {"personal_score": 0.9, "qualifying_state": "warming"},
                       "signal": {"qualifying_score": 0.7, "qualifying_state": "established"}}),
                "model_routing_eligible(cohort, signal)",
                false,
            ),
        Builtin::new("basket_weights_normalized", "basket_weights_normalized(basket) -> boolean", 1..=1, basket_weights_normalized)
            .describe("Basket entries are non-empty and their weights sum to 1.0 within 0.001.")
            .example(
                "Normalized weights",
                json!({"this": {"entries": [{"model_id": "a", "weight": 0.6}, {"model_id": "b", "weight": 0.4}]}}),
                "basket_weights_normalized(this)",
                true,
            )
            .example("Empty basket", json!({"this": {"entries": []}}), "basket_weights_normalized(this)", false),
        Builtin::new("execution_checkpoint_valid", "execution_checkpoint_valid(checkpoint) -> boolean", 1..=1, execution_checkpoint_valid)
            .describe("proceed_decision is allowed for health_status: healthy continues, degraded continues or pauses, failing rolls back.")
            .example(
                "Healthy continues",
                json!({"cp": {"health_status": "healthy", "proceed_decision": "continue"}}),
                "execution_checkpoint_valid(cp)",
                true,
            )
            .example(
                "Healthy pauses",
                json!({"cp": {"health_status": "healthy", "proceed_decision": "pause"}}),
                "execution_checkpoint_valid(cp)",
                false,
            )
            .example(
                "Failing rolls back",
                json!({"cp": {"health_status": "failing", "proceed_decision": "rollback"}}),
                "execution_checkpoint_valid(cp)",
                true,
            ),
    ]
}

fn str_field<'v>(record: &'v serde_json::Map<String, Value>, key: &str) -> Option<&'v str> {
    record.get(key).and_then(Value::as_str)
}

fn vote_of(vote: &Value) -> Option<&str> {
    vote.get("vote").and_then(Value::as_str)
}

fn outcome_consensus_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let outcome = args.get(0);
    let Some(outcome) = as_object(&outcome) else {
        return fail("outcome is not an object");
    };
    let votes = match outcome.get("votes") {
        None | Some(Value::Null) => &[][..],
        Some(Value::Array(items)) => items.as_slice(),
        Some(_) => return fail("outcome votes are not an array"),
    };
    let agree = votes.iter().filter(|v| vote_of(v) == Some("agree")).count();
    let dissent = votes.iter().filter(|v| vote_of(v) == Some("disagree")).count();
    let ratio = if votes.is_empty() { 0.0 } else { agree as f64 / votes.len() as f64 };
    let threshold = json_number(outcome.get("consensus_threshold"));

    let valid = match str_field(outcome, "outcome_type") {
        Some("unanimous") => dissent == 0,
        Some("majority") => threshold.is_some_and(|t| ratio >= t),
        Some("deadlock") => threshold.is_some_and(|t| ratio < t),
        Some("escalation") => str_field(outcome, "escalated_to").is_some_and(|t| !t.is_empty()),
        _ => return fail("unknown outcome_type"),
    };
    Operand::bool(valid)
}

fn monetary_policy_solvent<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let policy = args.get(0);
    let ceiling = as_object(&policy)
        .and_then(|p| p.get("conservation_ceiling"))
        .and_then(json_to_bigint);
    match (ceiling, to_bigint(&args.get(1))) {
        (Some(ceiling), Some(supply)) => Operand::bool(supply <= ceiling),
        _ => fail("monetary policy or supply malformed"),
    }
}

fn permission_boundary_active<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let boundary = args.get(0);
    let Some(boundary) = as_object(&boundary) else {
        return fail("permission boundary is not an object");
    };
    let present = |key: &str| boundary.get(key).is_some_and(|v| !v.is_null());
    let active = str_field(boundary, "scope").is_some_and(|s| !s.is_empty())
        && present("permitted_if")
        && present("reporting")
        && present("revocation");
    Operand::bool(active)
}

/// Weights of `proposal.voting.votes_cast`, `None` when the shape or any weight is wrong.
fn vote_weights(proposal: &Operand<'_>) -> Option<Vec<f64>> {
    let voting = as_object(proposal)?.get("voting")?.as_object()?;
    let votes = voting.get("votes_cast")?.as_array()?;
    votes.iter().map(|v| json_number(v.get("weight"))).collect()
}

fn proposal_quorum_met<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let proposal = args.get(0);
    let quorum = as_object(&proposal)
        .and_then(|p| p.get("voting"))
        .and_then(|v| json_number(v.get("quorum_required")));
    match (vote_weights(&proposal), quorum) {
        (Some(weights), Some(quorum)) if !weights.is_empty() => {
            Operand::bool(weights.iter().sum::<f64>() >= quorum)
        }
        (Some(_), Some(_)) => Operand::bool(false),
        _ => fail("proposal voting malformed"),
    }
}

fn normalized(weights: &[f64]) -> bool {
    (weights.iter().sum::<f64>() - 1.0).abs() <= WEIGHT_TOLERANCE
}

fn proposal_weights_normalized<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    match vote_weights(&args.get(0)) {
        Some(weights) => Operand::bool(weights.is_empty() || normalized(&weights)),
        None => fail("proposal voting malformed"),
    }
}

fn proposal_execution_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let execution = args.get(0);
    let Some(execution) = as_object(&execution) else {
        return fail("execution is not an object");
    };
    let changes = execution
        .get("changes_applied")
        .and_then(Value::as_array)
        .filter(|c| !c.is_empty());
    let valid = str_field(execution, "status") == Some("completed")
        && changes.is_some_and(|changes| {
            changes
                .iter()
                .all(|c| c.get("result").and_then(Value::as_str) == Some("success"))
        });
    Operand::bool(valid)
}

fn constraint_lifecycle_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let event = args.get(0);
    let Some(event) = as_object(&event) else {
        return fail("lifecycle event is not an object");
    };
    let (Some(from), Some(to)) = (str_field(event, "from_status"), str_field(event, "to_status")) else {
        return fail("lifecycle event lacks statuses");
    };
    Operand::bool(LIFECYCLE_TRANSITIONS.contains(&(from, to)))
}

fn model_routing_eligible<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let cohort = args.get(0);
    let signal = args.get(1);
    let (Some(cohort), Some(signal)) = (as_object(&cohort), as_object(&signal)) else {
        return fail("routing cohort or signal is not an object");
    };
    let (Some(score), Some(required)) = (
        json_number(cohort.get("personal_score")),
        json_number(signal.get("qualifying_score")),
    ) else {
        return Operand::bool(false);
    };
    let rank = |state: &str| QUALIFYING_STATES.iter().position(|s| *s == state);
    let state_ok = match (str_field(cohort, "qualifying_state"), str_field(signal, "qualifying_state")) {
        (Some(have), Some(need)) => match (rank(have), rank(need)) {
            (Some(have), Some(need)) => have >= need,
            _ => false,
        },
        _ => true,
    };
    Operand::bool(score >= required && state_ok)
}

fn basket_weights_normalized<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let basket = args.get(0);
    let entries = as_object(&basket)
        .and_then(|b| b.get("entries"))
        .and_then(Value::as_array);
    let Some(entries) = entries.filter(|e| !e.is_empty()) else {
        return fail("basket has no entries");
    };
    let weights: Option<Vec<f64>> = entries.iter().map(|e| json_number(e.get("weight"))).collect();
    Operand::bool(weights.is_some_and(|w| normalized(&w)))
}

fn execution_checkpoint_valid<'a>(args: &Args<'_, 'a>) -> Operand<'a> {
    let checkpoint = args.get(0);
    let Some(checkpoint) = as_object(&checkpoint) else {
        return fail("checkpoint is not an object");
    };
    let allowed: &[&str] = match str_field(checkpoint, "health_status") {
        Some("healthy") => &["continue"],
        Some("degraded") => &["continue", "pause"],
        Some("failing") => &["rollback"],
        _ => return fail("unknown checkpoint health_status"),
    };
    let decision = str_field(checkpoint, "proceed_decision");
    Operand::bool(decision.is_some_and(|d| allowed.contains(&d)))
}
