//! Faithfulness audit: the last gate before a run may finish as APPROVED.
//!
//! Only the most recent evidence is scored against; earlier cycles' evidence
//! would dilute the match. A scorer that keeps failing yields 0.0, so an
//! unverifiable answer never passes.

use audit_shared::{faithfulness_decision, FailureKind, GateOutcome, RunState, StateDelta};
use std::sync::Arc;
use tracing::{info, warn};

use crate::backend::FaithfulnessScorer;

pub struct FaithfulnessAuditor {
    scorer: Arc<dyn FaithfulnessScorer>,
    attempts: u32,
    threshold: f64,
}

impl FaithfulnessAuditor {
    pub fn new(scorer: Arc<dyn FaithfulnessScorer>, attempts: u32, threshold: f64) -> Self {
        Self {
            scorer,
            attempts: attempts.max(1),
            threshold,
        }
    }

    /// Score the verification claims and decide
    pub async fn audit(&self, state: &RunState) -> (StateDelta, GateOutcome) {
        let claims = if state.verification_claims().trim().is_empty() {
            state.final_hscode()
        } else {
            state.verification_claims()
        };
        let evidence: Vec<String> = state
            .latest_evidence()
            .map(|e| vec![e.to_string()])
            .unwrap_or_default();

        let mut tokens = 0;
        let mut last_error = None;
        let mut verdict = None;

        for attempt in 1..=self.attempts {
            match self.scorer.score(claims, &evidence).await {
                Ok(v) => {
                    tokens += v.tokens;
                    verdict = Some(v);
                    break;
                }
                Err(e) => {
                    warn!(
                        "Faithfulness scoring attempt {}/{} failed: {}",
                        attempt, self.attempts, e
                    );
                    last_error = Some(e);
                }
            }
        }

        let (score, outcome) = match verdict {
            Some(v) => {
                let score = if (0.0..=1.0).contains(&v.score) {
                    v.score
                } else if !v.score.is_finite() {
                    warn!("Faithfulness score {} out of range, using 0.0", v.score);
                    0.0
                } else {
                    warn!("Faithfulness score {} out of range, clamping", v.score);
                    v.score.clamp(0.0, 1.0)
                };
                info!(score = score, threshold = self.threshold, "faithfulness scored");
                (score, faithfulness_decision(score, &v.reason, self.threshold))
            }
            None => {
                let reason = format!(
                    "Faithfulness scoring failed after {} attempts: {}",
                    self.attempts,
                    last_error.map(|e| e.to_string()).unwrap_or_default()
                );
                warn!("{}; treating the answer as unfaithful", reason);
                let mut outcome = faithfulness_decision(0.0, &reason, self.threshold);
                outcome.failure = Some(FailureKind::TransientBackend);
                (0.0, outcome)
            }
        };

        let mut delta = outcome.to_delta();
        delta.faithfulness_score = Some(score);
        delta.tokens = tokens;
        (delta, outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, FakeScorerBuilder};
    use audit_shared::Status;

    fn audited_state(claims: &str) -> RunState {
        let mut state = RunState::new("wireless headphones");
        state.apply(StateDelta {
            retrieval: Some(("old evidence 8518.30.59".to_string(), "rules".to_string())),
            ..Default::default()
        });
        state.apply(StateDelta {
            retrieval: Some(("8518.30.10 -- Headphones".to_string(), "rules".to_string())),
            final_hscode: Some("FINAL_CODE: 8518.30.10\nCONFIDENCE: HIGH".to_string()),
            verification_claims: Some(claims.to_string()),
            ..Default::default()
        });
        state
    }

    #[tokio::test]
    async fn test_scores_against_latest_evidence_only() {
        let scorer = FakeScorerBuilder::new().score(0.9, "supported").build();
        let handle = scorer.clone();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

        let (delta, outcome) = auditor.audit(&audited_state("8518.30.10 is Headphones")).await;

        assert!(outcome.is_approved());
        assert_eq!(delta.faithfulness_score, Some(0.9));
        let calls = handle.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].claims, "8518.30.10 is Headphones");
        assert_eq!(calls[0].evidence, vec!["8518.30.10 -- Headphones".to_string()]);
    }

    #[tokio::test]
    async fn test_retries_then_succeeds() {
        let scorer = FakeScorerBuilder::new()
            .failure(BackendError::RateLimited)
            .failure(BackendError::InvalidResponse("bad json".to_string()))
            .score(0.8, "ok")
            .build();
        let handle = scorer.clone();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

        let (delta, outcome) = auditor.audit(&audited_state("claims")).await;
        assert!(outcome.is_approved());
        assert_eq!(delta.faithfulness_score, Some(0.8));
        assert_eq!(handle.call_count(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_score_zero() {
        let scorer = FakeScorerBuilder::new()
            .default_failure(BackendError::Timeout(60))
            .build();
        let handle = scorer.clone();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

        let (delta, outcome) = auditor.audit(&audited_state("claims")).await;
        assert_eq!(handle.call_count(), 3);
        assert_eq!(delta.faithfulness_score, Some(0.0));
        assert_eq!(delta.status, Some(Status::Revise));
        assert_eq!(outcome.failure, Some(FailureKind::TransientBackend));
    }

    #[tokio::test]
    async fn test_empty_claims_fall_back_to_answer() {
        let scorer = FakeScorerBuilder::new().build();
        let handle = scorer.clone();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

        auditor.audit(&audited_state("")).await;
        assert!(handle.calls()[0].claims.starts_with("FINAL_CODE: 8518.30.10"));
    }

    #[tokio::test]
    async fn test_non_finite_scores_become_zero() {
        for raw in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let scorer = FakeScorerBuilder::new().score(raw, "odd judge").build();
            let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

            let (delta, _) = auditor.audit(&audited_state("claims")).await;
            assert_eq!(delta.faithfulness_score, Some(0.0), "raw score {}", raw);
        }

        let scorer = FakeScorerBuilder::new().score(f64::NAN, "odd judge").build();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);
        let (_, outcome) = auditor.audit(&audited_state("claims")).await;
        assert!(!outcome.is_approved());
    }

    #[tokio::test]
    async fn test_low_score_revises_with_reason() {
        let scorer = FakeScorerBuilder::new()
            .score(0.5, "claim about wireless is unsupported")
            .build();
        let auditor = FaithfulnessAuditor::new(Arc::new(scorer), 3, 0.75);

        let (delta, outcome) = auditor.audit(&audited_state("claims")).await;
        assert_eq!(outcome.failure, Some(FailureKind::Unfaithful));
        let critique = delta.critique.unwrap();
        assert!(critique.contains("0.50"));
        assert!(critique.contains("wireless is unsupported"));
    }
}
