//! Aggregator: synthesize every attempt of the run into one final answer.
//!
//! The code is decided by majority vote over the full draft history before the
//! generator is called; the generator is told not to change it and only
//! writes the reasoning, confidence and verification claims around it.

use audit_shared::codes;
use audit_shared::consensus::CodeDepth;
use audit_shared::{consensus_code, AuditError, Confidence, RunState, StateDelta};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{GenerationClient, GenerationRequest};
use crate::prompts::PromptSet;

/// Final code when there is nothing to synthesize
pub const INSUFFICIENT_DATA: &str = "INSUFFICIENT DATA";

pub struct Aggregator {
    generator: Arc<dyn GenerationClient>,
    prompts: Arc<PromptSet>,
}

impl Aggregator {
    pub fn new(generator: Arc<dyn GenerationClient>, prompts: Arc<PromptSet>) -> Self {
        Self { generator, prompts }
    }

    /// Synthesize the final answer from the full history.
    /// A generation failure aborts the run.
    pub async fn aggregate(&self, state: &RunState) -> Result<StateDelta, AuditError> {
        if state.worker_results().is_empty() {
            warn!("No worker results to aggregate, finalizing with {}", INSUFFICIENT_DATA);
            return Ok(insufficient_data());
        }

        let consensus = consensus_code(state.worker_results());
        info!(
            code = %consensus.code,
            votes = consensus.votes,
            drafts = state.worker_results().len(),
            "consensus candidate"
        );

        let prompt = self.prompts.synthesis_prompt(
            state.query(),
            &consensus.code,
            state.latest_worker_result().unwrap_or(""),
            state.latest_evidence().unwrap_or(""),
        );
        debug!(model = self.generator.model(), "synthesis prompt:\n{}", prompt);

        let generation = self
            .generator
            .generate(&GenerationRequest::text(prompt))
            .await
            .map_err(|e| AuditError::Aggregation(format!("synthesis generation failed: {}", e)))?;
        let answer = generation.text;

        match codes::final_code(&answer) {
            Some(code) if consensus.depth == CodeDepth::NationalLine && code != consensus.code => {
                warn!(
                    "Synthesized FINAL_CODE {} differs from mandated consensus {}",
                    code, consensus.code
                );
            }
            None => warn!("Synthesized answer has no FINAL_CODE line"),
            _ => {}
        }

        let claims = codes::verification_claims(&answer);
        if !claims.delimited {
            warn!("Verification claims delimiters missing, auditing the whole answer");
        }

        Ok(StateDelta {
            final_confidence: Some(codes::confidence(&answer)),
            verification_claims: Some(claims.text),
            final_hscode: Some(answer),
            tokens: generation.tokens,
            ..Default::default()
        })
    }

    /// Best available answer when the retry ceiling stops the run before this
    /// cycle's synthesis. Deterministic; no generator call.
    pub fn fallback(state: &RunState) -> StateDelta {
        if state.worker_results().is_empty() {
            return insufficient_data();
        }

        let consensus = consensus_code(state.worker_results());
        let answer = format!(
            "FINAL_CODE: {}\nCONFIDENCE: LOW\nREASONING: Retry ceiling reached before a verified \
             synthesis. Code is the consensus of {} worker draft(s) with {} vote(s).",
            consensus.code,
            state.worker_results().len(),
            consensus.votes
        );

        StateDelta {
            final_confidence: Some(Confidence::Low),
            verification_claims: Some(answer.clone()),
            final_hscode: Some(answer),
            ..Default::default()
        }
    }
}

fn insufficient_data() -> StateDelta {
    let answer = format!("FINAL_CODE: {}\nCONFIDENCE: LOW", INSUFFICIENT_DATA);
    StateDelta {
        final_confidence: Some(Confidence::Low),
        verification_claims: Some(String::new()),
        final_hscode: Some(answer),
        ..Default::default()
    }
}
