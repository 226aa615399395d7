//! Planner: query (plus last critique) to one focused search query.

use audit_shared::codes::single_line;
use audit_shared::{AuditError, RunState, StateDelta, Status};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info};

use crate::backend::{strip_code_fences, GenerationClient, GenerationRequest};
use crate::prompts::PromptSet;

/// Structured planner reply
#[derive(Debug, Deserialize)]
struct PlannerOutput {
    search_query: String,
}

/// Output contract: a single non-empty `search_query` field
pub fn planner_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "search_query": {"type": "string", "minLength": 1}
        },
        "required": ["search_query"]
    })
}

pub struct Planner {
    generator: Arc<dyn GenerationClient>,
    prompts: Arc<PromptSet>,
}

impl Planner {
    pub fn new(generator: Arc<dyn GenerationClient>, prompts: Arc<PromptSet>) -> Self {
        Self { generator, prompts }
    }

    /// Produce the next search query.
    ///
    /// A generator that fails or breaks the output contract aborts the run;
    /// there is no default query.
    pub async fn plan(&self, state: &RunState) -> Result<StateDelta, AuditError> {
        let critique = (state.status() == Status::Revise).then(|| state.critique());
        let prompt = self.prompts.planner_prompt(state.query(), critique);
        debug!(model = self.generator.model(), "planner prompt:\n{}", prompt);

        let generation = self
            .generator
            .generate(&GenerationRequest::structured(prompt, planner_schema()))
            .await
            .map_err(|e| AuditError::PlannerContract(format!("planner generation failed: {}", e)))?;

        let search_query = parse_search_query(&generation.text)?;
        info!(step = state.step_count(), "planned search query: {}", search_query);

        Ok(StateDelta {
            sub_tasks: Some(vec![search_query]),
            tokens: generation.tokens,
            ..Default::default()
        })
    }
}

fn parse_search_query(reply: &str) -> Result<String, AuditError> {
    let output: PlannerOutput = serde_json::from_str(strip_code_fences(reply)).map_err(|e| {
        AuditError::PlannerContract(format!("reply is not {{\"search_query\": ...}}: {}", e))
    })?;

    let query = single_line(&output.search_query);
    if query.is_empty() {
        return Err(AuditError::PlannerContract(
            "search_query is empty".to_string(),
        ));
    }
    Ok(query)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, FakeGenerationClientBuilder};

    fn planner(fake: crate::backend::FakeGenerationClient) -> Planner {
        Planner::new(Arc::new(fake), Arc::new(PromptSet::default()))
    }

    #[tokio::test]
    async fn test_plan_sets_single_sub_task() {
        let fake = FakeGenerationClientBuilder::new()
            .response_with_tokens("```json\n{\"search_query\": \"headphones 8518.30\"}\n```", 30)
            .build();
        let handle = fake.clone();

        let delta = planner(fake)
            .plan(&RunState::new("wireless headphones"))
            .await
            .unwrap();

        assert_eq!(delta.sub_tasks, Some(vec!["headphones 8518.30".to_string()]));
        assert_eq!(delta.tokens, 30);
        assert!(handle.requests()[0].is_structured());
    }

    #[tokio::test]
    async fn test_critique_reaches_prompt_only_after_revise() {
        let fake = FakeGenerationClientBuilder::new()
            .default_response("{\"search_query\": \"q\"}")
            .build();
        let handle = fake.clone();
        let planner = planner(fake);

        let mut state = RunState::new("wireless headphones");
        planner.plan(&state).await.unwrap();
        assert!(!handle.prompts()[0].contains("more specific"));

        state.apply(StateDelta::review(Status::Revise, "Evidence contains no tariff codes."));
        planner.plan(&state).await.unwrap();
        let prompt = &handle.prompts()[1];
        assert!(prompt.contains("Evidence contains no tariff codes."));
        assert!(prompt.contains("more specific"));
    }

    #[tokio::test]
    async fn test_multiline_search_query_is_folded() {
        let fake = FakeGenerationClientBuilder::new()
            .response("{\"search_query\": \"  headphones\\n8518.30.10\\t wired \"}")
            .build();

        let delta = planner(fake)
            .plan(&RunState::new("wireless headphones"))
            .await
            .unwrap();

        assert_eq!(
            delta.sub_tasks,
            Some(vec!["headphones 8518.30.10 wired".to_string()])
        );
    }

    #[tokio::test]
    async fn test_contract_violations_are_fatal() {
        for reply in ["headphones please", "{\"search_query\": \"   \"}", "{\"query\": \"x\"}"] {
            let fake = FakeGenerationClientBuilder::new().response(reply).build();
            let result = planner(fake).plan(&RunState::new("chairs")).await;
            assert!(
                matches!(result, Err(AuditError::PlannerContract(_))),
                "reply {:?} should violate the contract",
                reply
            );
        }

        let fake = FakeGenerationClientBuilder::new()
            .failure(BackendError::Timeout(120))
            .build();
        let result = planner(fake).plan(&RunState::new("chairs")).await;
        assert!(matches!(result, Err(AuditError::PlannerContract(_))));
    }
}
