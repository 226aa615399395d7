//! States of the classification state machine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Orchestrator state.
///
/// `Plan -> RetrieveClassify -> ReviewEvidence -> {Pace | Aggregate}`
/// `Aggregate -> VerifyAggregate -> {Pace | AuditFaithfulness}`
/// `AuditFaithfulness -> {Pace | Done}`, and `Pace -> Plan`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Plan,
    RetrieveClassify,
    ReviewEvidence,
    Pace,
    Aggregate,
    VerifyAggregate,
    AuditFaithfulness,
    Done,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::Plan => "PLAN",
            Stage::RetrieveClassify => "RETRIEVE_CLASSIFY",
            Stage::ReviewEvidence => "REVIEW_EVIDENCE",
            Stage::Pace => "PACE",
            Stage::Aggregate => "AGGREGATE",
            Stage::VerifyAggregate => "VERIFY_AGGREGATE",
            Stage::AuditFaithfulness => "AUDIT_FAITHFULNESS",
            Stage::Done => "DONE",
        };
        write!(f, "{}", s)
    }
}

/// One recorded edge of a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: Stage,
    pub to: Stage,
    /// `step_count` at the moment of the transition
    pub step: u32,
}

/// How a run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    /// Every gate passed
    Approved,
    /// A gate asked for another cycle with no retries left
    CeilingReached,
}
