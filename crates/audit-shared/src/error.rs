//! Error types for the auditor.
//!
//! Only failures that abort a run are errors. Evidence gaps, hallucinations,
//! format anomalies and the retry ceiling are resolved into a review status.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Planner contract violated: {0}")]
    PlannerContract(String),

    #[error("Aggregation failed: {0}")]
    Aggregation(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AuditError {
    /// Stage that raised the error, for logs
    pub fn stage(&self) -> &'static str {
        match self {
            AuditError::PlannerContract(_) => "plan",
            AuditError::Aggregation(_) => "aggregate",
            AuditError::Config(_) => "config",
            AuditError::Io(_) | AuditError::Json(_) => "io",
        }
    }
}
