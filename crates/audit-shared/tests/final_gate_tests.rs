//! Tests for the post-aggregation code gate.

use audit_shared::{verify_final_code, FailureKind, Status};

const EVIDENCE: &str = "8518.30.10 -- Headphones\n8518.30.59 -- Other";

#[test]
fn test_missing_final_code_line() {
    let outcome = verify_final_code("The code is probably 8518.30.10.", Some(EVIDENCE));
    assert_eq!(outcome.status, Status::Revise);
    assert_eq!(outcome.failure, Some(FailureKind::FormatViolation));
    assert!(outcome.critique.contains("no valid code"));
}

#[test]
fn test_final_code_present_in_evidence() {
    let answer = "Classification summary\nFINAL_CODE: 8518.30.10\nCONFIDENCE: HIGH";
    let outcome = verify_final_code(answer, Some(EVIDENCE));
    assert_eq!(outcome.status, Status::Approved);
}

#[test]
fn test_final_code_absent_from_evidence() {
    let answer = "FINAL_CODE: 8518.30.90";
    let outcome = verify_final_code(answer, Some(EVIDENCE));
    assert_eq!(outcome.status, Status::Revise);
    assert_eq!(outcome.failure, Some(FailureKind::HallucinationDetected));
    assert!(outcome.critique.contains("8518.30.90"));
    assert!(outcome.critique.contains("8518.30.10, 8518.30.59"));
}

#[test]
fn test_sentinel_answer_is_not_a_code() {
    let outcome = verify_final_code("FINAL_CODE: INSUFFICIENT DATA", Some(EVIDENCE));
    assert_eq!(outcome.status, Status::Revise);
}
