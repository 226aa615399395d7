//! Classifier worker: retrieve evidence, then draft a code with its citation.
//!
//! The worker never fails the run. Retrieval and generation errors degrade
//! into an empty evidence entry or a draft with no codes, which the evidence
//! review turns into a REVISE.

use audit_shared::codes::tag_findings;
use audit_shared::evidence::apply_budget;
use audit_shared::{RunState, StateDelta};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backend::{EvidenceClient, GenerationClient, GenerationRequest};
use crate::prompts::{PromptSet, CLASSIFICATION_RULES};

pub struct ClassifierWorker {
    evidence: Arc<dyn EvidenceClient>,
    generator: Arc<dyn GenerationClient>,
    prompts: Arc<PromptSet>,
    char_limit: usize,
}

impl ClassifierWorker {
    pub fn new(
        evidence: Arc<dyn EvidenceClient>,
        generator: Arc<dyn GenerationClient>,
        prompts: Arc<PromptSet>,
        char_limit: usize,
    ) -> Self {
        Self {
            evidence,
            generator,
            prompts,
            char_limit,
        }
    }

    /// Run one retrieval + classification for the planned search query.
    /// Always appends exactly one draft and one (evidence, rules) pair.
    pub async fn classify(&self, state: &RunState) -> StateDelta {
        let search_query = state
            .sub_tasks()
            .first()
            .map(String::as_str)
            .unwrap_or_else(|| state.query());

        let raw = match self.evidence.retrieve(search_query).await {
            Ok(chunks) => {
                info!(chunks = chunks.len(), "retrieved evidence for '{}'", search_query);
                chunks.join("\n\n")
            }
            Err(e) => {
                warn!("Evidence retrieval failed for '{}': {}", search_query, e);
                String::new()
            }
        };

        let budgeted = apply_budget(&raw, self.char_limit);
        if budgeted.truncated {
            warn!(
                "Evidence truncated from {} to {} chars; the correct code may be cut off",
                budgeted.original_chars, self.char_limit
            );
        }

        let prompt = self
            .prompts
            .classification_prompt(search_query, &budgeted.text);
        debug!(model = self.generator.model(), "classification prompt:\n{}", prompt);

        let (body, tokens) = match self.generator.generate(&GenerationRequest::text(prompt)).await
        {
            Ok(generation) => (generation.text, generation.tokens),
            Err(e) => {
                warn!("Classification generation failed: {}", e);
                (format!("Classification unavailable: {}", e), 0)
            }
        };

        StateDelta {
            worker_result: Some(tag_findings(search_query, &body)),
            retrieval: Some((budgeted.text, CLASSIFICATION_RULES.to_string())),
            tokens,
            ..Default::default()
        }
    }
}
