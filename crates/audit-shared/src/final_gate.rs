//! Gates applied after aggregation.
//!
//! Both are narrower than the evidence review: the code gate only checks that
//! the synthesized `FINAL_CODE` exists in the latest evidence, the faithfulness
//! gate only compares a score against a threshold.

use crate::codes;
use crate::evidence_gate::describe_evidence_codes;
use crate::review::{FailureKind, GateOutcome};

/// Default minimum faithfulness score for approval
pub const DEFAULT_FAITHFULNESS_THRESHOLD: f64 = 0.75;

/// Re-check the synthesized answer's `FINAL_CODE` against the latest evidence
pub fn verify_final_code(final_answer: &str, evidence: Option<&str>) -> GateOutcome {
    let Some(code) = codes::final_code(final_answer) else {
        return GateOutcome::revise(
            FailureKind::FormatViolation,
            "Aggregator produced no valid code: the answer has no `FINAL_CODE: DDDD.DD.DD` line.",
        );
    };

    let evidence = evidence.unwrap_or("");
    if codes::national_line_set(evidence).contains(&code) {
        return GateOutcome::approved(format!("Final code {} present in evidence.", code));
    }

    GateOutcome::revise(
        FailureKind::HallucinationDetected,
        format!(
            "Hallucination detected in final answer: {} is not in the latest evidence, which \
             contains {}.",
            code,
            describe_evidence_codes(evidence)
        ),
    )
}

/// Turn a faithfulness score into a decision
pub fn faithfulness_decision(score: f64, reason: &str, threshold: f64) -> GateOutcome {
    if score >= threshold {
        return GateOutcome::approved(format!("Verified accuracy: faithfulness {:.2}.", score));
    }

    let reason = reason.trim();
    let critique = if reason.is_empty() {
        format!(
            "Hallucination detected. Faithfulness score {:.2} is below {:.2}.",
            score, threshold
        )
    } else {
        format!(
            "Hallucination detected. Faithfulness score {:.2} is below {:.2}. {}",
            score, threshold, reason
        )
    };
    GateOutcome::revise(FailureKind::Unfaithful, critique)
}
