//! Run state for one classification run.
//!
//! `RunState` is owned by the orchestrator for the lifetime of a run. Stages
//! read it through `&RunState` and hand back a [`StateDelta`]; only
//! [`RunState::apply`] mutates it, which keeps the history fields append-only
//! and the step counter monotonic.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::codes;

/// Review status set by the verification stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Planning,
    Approved,
    Revise,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::Planning => write!(f, "PLANNING"),
            Status::Approved => write!(f, "APPROVED"),
            Status::Revise => write!(f, "REVISE"),
        }
    }
}

/// Confidence label extracted from the synthesized answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Confidence::High => write!(f, "HIGH"),
            Confidence::Medium => write!(f, "MEDIUM"),
            Confidence::Low => write!(f, "LOW"),
        }
    }
}

/// Partial update returned by a stage.
///
/// `None` / zero fields leave the state untouched. History fields are
/// appended, never replaced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub sub_tasks: Option<Vec<String>>,
    pub worker_result: Option<String>,
    /// (raw evidence, rules text), appended as a pair
    pub retrieval: Option<(String, String)>,
    pub step_increment: u32,
    pub status: Option<Status>,
    pub critique: Option<String>,
    pub final_hscode: Option<String>,
    pub final_confidence: Option<Confidence>,
    pub verification_claims: Option<String>,
    pub faithfulness_score: Option<f64>,
    pub tokens: u64,
}

impl StateDelta {
    /// Delta carrying only a review decision
    pub fn review(status: Status, critique: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            critique: Some(critique.into()),
            ..Default::default()
        }
    }
}

/// Mutable record of one classification run
#[derive(Debug, Clone, Serialize)]
pub struct RunState {
    query: String,
    sub_tasks: Vec<String>,
    worker_results: Vec<String>,
    retrieval_context: Vec<String>,
    step_count: u32,
    status: Status,
    critique: String,
    final_hscode: String,
    final_confidence: Option<Confidence>,
    verification_claims: String,
    faithfulness_score: f64,
    total_tokens: u64,
}

impl RunState {
    /// Fresh state for a query: PLANNING, step 0, empty history
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            sub_tasks: Vec::new(),
            worker_results: Vec::new(),
            retrieval_context: Vec::new(),
            step_count: 0,
            status: Status::Planning,
            critique: String::new(),
            final_hscode: String::new(),
            final_confidence: None,
            verification_claims: String::new(),
            faithfulness_score: 0.0,
            total_tokens: 0,
        }
    }

    /// Apply a stage delta
    pub fn apply(&mut self, delta: StateDelta) {
        if let Some(tasks) = delta.sub_tasks {
            self.sub_tasks = tasks;
        }
        if let Some(result) = delta.worker_result {
            self.worker_results.push(result);
        }
        if let Some((evidence, rules)) = delta.retrieval {
            self.retrieval_context.push(evidence);
            self.retrieval_context.push(rules);
        }
        self.step_count = self.step_count.saturating_add(delta.step_increment);
        if let Some(status) = delta.status {
            self.status = status;
        }
        if let Some(critique) = delta.critique {
            self.critique = critique;
        }
        if let Some(answer) = delta.final_hscode {
            self.final_hscode = answer;
        }
        if let Some(confidence) = delta.final_confidence {
            self.final_confidence = Some(confidence);
        }
        if let Some(claims) = delta.verification_claims {
            self.verification_claims = claims;
        }
        if let Some(score) = delta.faithfulness_score {
            self.faithfulness_score = score;
        }
        self.total_tokens = self.total_tokens.saturating_add(delta.tokens);
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn sub_tasks(&self) -> &[String] {
        &self.sub_tasks
    }

    pub fn worker_results(&self) -> &[String] {
        &self.worker_results
    }

    pub fn retrieval_context(&self) -> &[String] {
        &self.retrieval_context
    }

    pub fn step_count(&self) -> u32 {
        self.step_count
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn critique(&self) -> &str {
        &self.critique
    }

    /// Full synthesized answer (carries the `FINAL_CODE:` line)
    pub fn final_hscode(&self) -> &str {
        &self.final_hscode
    }

    pub fn final_confidence(&self) -> Option<Confidence> {
        self.final_confidence
    }

    pub fn verification_claims(&self) -> &str {
        &self.verification_claims
    }

    pub fn faithfulness_score(&self) -> f64 {
        self.faithfulness_score
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens
    }

    /// Most recent worker result
    pub fn latest_worker_result(&self) -> Option<&str> {
        self.worker_results.last().map(String::as_str)
    }

    /// Most recent raw evidence (second-to-last retrieval entry)
    pub fn latest_evidence(&self) -> Option<&str> {
        let len = self.retrieval_context.len();
        if len < 2 {
            return None;
        }
        self.retrieval_context.get(len - 2).map(String::as_str)
    }

    /// Raw evidence entries only (even indices), oldest first
    pub fn evidence_history(&self) -> impl Iterator<Item = &str> {
        self.retrieval_context.iter().step_by(2).map(String::as_str)
    }

    /// Parsed `FINAL_CODE:` value of the synthesized answer
    pub fn final_code(&self) -> Option<String> {
        codes::final_code(&self.final_hscode)
    }

    /// Whether an aggregation has produced an answer yet
    pub fn has_final_answer(&self) -> bool {
        !self.final_hscode.is_empty()
    }
}
