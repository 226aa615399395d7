//! Rule-based review of a worker draft against the evidence it was given.
//!
//! Pure pattern matching over two strings: same input, same decision and
//! critique text. No model calls.

use std::collections::BTreeSet;

use crate::codes;
use crate::review::{FailureKind, GateOutcome};

/// Review the latest worker draft against the latest raw evidence.
///
/// Rules, first match wins:
/// 1. no worker result
/// 2. blank evidence
/// 3. evidence without any code-shaped token
/// 4. draft cites an 8-digit line: approve iff it appears in the evidence
/// 5. draft cites only a 6-digit heading: ask for its 8-digit sub-items
/// 6. draft cites nothing
pub fn review_evidence(worker_result: Option<&str>, evidence: Option<&str>) -> GateOutcome {
    let Some(worker_result) = worker_result else {
        return GateOutcome::revise(
            FailureKind::EvidenceGap,
            "No worker results found to review.",
        );
    };

    let evidence = evidence.unwrap_or("");
    if evidence.trim().is_empty() {
        return GateOutcome::revise(
            FailureKind::EvidenceGap,
            "Retrieved evidence was empty. Broaden the search: use a simpler query built \
             around the core product noun.",
        );
    }

    if !codes::has_any_code(evidence) {
        return GateOutcome::revise(
            FailureKind::EvidenceGap,
            "Evidence contains no tariff codes. Use a more tariff-specific query that names \
             the chapter or heading for the product.",
        );
    }

    let draft = codes::findings_body(worker_result);
    let cited: BTreeSet<String> = codes::national_line_set(draft);

    if !cited.is_empty() {
        let in_evidence = codes::national_line_set(evidence);
        let confirmed: Vec<&String> = cited.intersection(&in_evidence).collect();

        if !confirmed.is_empty() {
            let confirmed: Vec<String> = confirmed.into_iter().cloned().collect();
            return GateOutcome::approved(format!(
                "Cited code {} confirmed in evidence.",
                confirmed.join(", ")
            ));
        }

        return GateOutcome::revise(
            FailureKind::HallucinationDetected,
            format!(
                "Hallucination detected: worker cited {} but the evidence only contains {}. \
                 Search again and cite a code that appears verbatim in the evidence.",
                codes::describe_codes(&cited),
                describe_evidence_codes(evidence)
            ),
        );
    }

    let cited_headings: BTreeSet<String> = codes::headings(draft).into_iter().collect();
    if !cited_headings.is_empty() {
        let headings = codes::describe_codes(&cited_headings);
        return GateOutcome::revise(
            FailureKind::EvidenceGap,
            format!(
                "Worker cited heading {} without an 8-digit national tariff line. Search \
                 specifically for the 8-digit sub-items under heading {}.",
                headings, headings
            ),
        );
    }

    GateOutcome::revise(
        FailureKind::EvidenceGap,
        "Worker output cites no tariff code. Broaden the search query.",
    )
}

/// Codes actually present in evidence: national lines, or headings when there are none
pub(crate) fn describe_evidence_codes(evidence: &str) -> String {
    let lines = codes::national_line_set(evidence);
    if !lines.is_empty() {
        return codes::describe_codes(&lines);
    }
    let headings: BTreeSet<String> = codes::headings(evidence).into_iter().collect();
    codes::describe_codes(&headings)
}
