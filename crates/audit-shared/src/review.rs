//! Review outcome types shared by every verification gate.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::state::{StateDelta, Status};

/// Why a gate asked for another cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Scoring or generation call failed after local retries
    TransientBackend,
    /// Retrieval returned nothing usable, or the draft lacks a citable code
    EvidenceGap,
    /// Generated text cites a code absent from the evidence
    HallucinationDetected,
    /// Required structured marker missing from generated text
    FormatViolation,
    /// Faithfulness score below threshold
    Unfaithful,
    /// Retry ceiling hit while a gate still wanted another cycle
    RetryCeilingReached,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::TransientBackend => "transient_backend",
            FailureKind::EvidenceGap => "evidence_gap",
            FailureKind::HallucinationDetected => "hallucination_detected",
            FailureKind::FormatViolation => "format_violation",
            FailureKind::Unfaithful => "unfaithful",
            FailureKind::RetryCeilingReached => "retry_ceiling_reached",
        };
        write!(f, "{}", s)
    }
}

/// Decision of a single gate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GateOutcome {
    pub status: Status,
    /// Human-readable reason, fed to the planner on REVISE
    pub critique: String,
    /// Failure class when `status` is REVISE
    pub failure: Option<FailureKind>,
}

impl GateOutcome {
    pub fn approved(critique: impl Into<String>) -> Self {
        Self {
            status: Status::Approved,
            critique: critique.into(),
            failure: None,
        }
    }

    pub fn revise(failure: FailureKind, critique: impl Into<String>) -> Self {
        Self {
            status: Status::Revise,
            critique: critique.into(),
            failure: Some(failure),
        }
    }

    pub fn is_approved(&self) -> bool {
        self.status == Status::Approved
    }

    /// State update carrying this decision
    pub fn to_delta(&self) -> StateDelta {
        StateDelta::review(self.status, self.critique.clone())
    }
}
