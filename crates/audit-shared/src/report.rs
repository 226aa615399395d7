//! Final run report.
//!
//! Built once per finished run. A run that ended on the retry ceiling is
//! reported as UNVERIFIED with LOW confidence, whatever the answer claimed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::codes;
use crate::stage::Termination;
use crate::state::{Confidence, RunState};

/// Report printed at the end of a successful run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub run_id: String,
    pub query: String,
    pub final_code: String,
    /// Reported confidence (LOW when unverified)
    pub confidence: Confidence,
    /// Confidence stated by the synthesized answer
    pub stated_confidence: Option<Confidence>,
    pub verified: bool,
    pub termination: Termination,
    pub faithfulness_score: f64,
    pub attempts: u32,
    pub elapsed_secs: f64,
    pub total_tokens: u64,
    pub estimated_cost_usd: f64,
    /// Last critique, kept only for unverified runs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critique: Option<String>,
    pub answer: String,
    pub generated_at: DateTime<Utc>,
}

impl Report {
    pub fn from_state(
        run_id: &str,
        state: &RunState,
        termination: Termination,
        elapsed_secs: f64,
        cost_per_1k_tokens: f64,
    ) -> Self {
        let verified = termination == Termination::Approved;
        let stated = state.final_confidence();
        let confidence = if verified {
            stated.unwrap_or(Confidence::Low)
        } else {
            Confidence::Low
        };

        Self {
            run_id: run_id.to_string(),
            query: state.query().to_string(),
            final_code: codes::final_code_label(state.final_hscode())
                .unwrap_or_else(|| crate::consensus::NO_CODE.to_string()),
            confidence,
            stated_confidence: stated,
            verified,
            termination,
            faithfulness_score: state.faithfulness_score(),
            attempts: state.step_count(),
            elapsed_secs,
            total_tokens: state.total_tokens(),
            estimated_cost_usd: estimated_cost(state.total_tokens(), cost_per_1k_tokens),
            critique: (!verified && !state.critique().is_empty())
                .then(|| state.critique().to_string()),
            answer: state.final_hscode().to_string(),
            generated_at: Utc::now(),
        }
    }

    /// Plain-text block for the terminal
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let status = if self.verified {
            "VERIFIED"
        } else {
            "UNVERIFIED (retry ceiling reached)"
        };

        let _ = writeln!(out, "AUDIT REPORT [{}]", self.run_id);
        let _ = writeln!(out, "------------------------------------");
        let _ = writeln!(out, "QUERY:      {}", self.query);
        let _ = writeln!(out, "HS-CODE:    {}", self.final_code);
        let _ = writeln!(out, "CONFIDENCE: {}", self.confidence);
        let _ = writeln!(out, "STATUS:     {}", status);
        let _ = writeln!(out);
        let _ = writeln!(out, "METRICS:");
        let _ = writeln!(out, "- Faithfulness: {:.2}", self.faithfulness_score);
        let _ = writeln!(out, "- Attempts:     {}", self.attempts);
        let _ = writeln!(out, "- Latency:      {:.2}s", self.elapsed_secs);
        let _ = writeln!(
            out,
            "- Tokens:       {} (~${:.6})",
            self.total_tokens, self.estimated_cost_usd
        );
        if let Some(critique) = &self.critique {
            let _ = writeln!(out);
            let _ = writeln!(out, "LAST CRITIQUE: {}", critique);
        }
        let _ = write!(out, "------------------------------------");
        out
    }
}

/// Estimated spend for a token count
pub fn estimated_cost(tokens: u64, cost_per_1k_tokens: f64) -> f64 {
    (tokens as f64 / 1000.0) * cost_per_1k_tokens
}
