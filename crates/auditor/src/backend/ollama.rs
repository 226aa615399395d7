//! Ollama backend for locally hosted models.

use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

use super::{BackendError, Generation, GenerationClient, GenerationRequest};
use crate::config::ProviderConfig;

/// How long Ollama keeps the model loaded after a request
const KEEP_ALIVE: &str = "5m";

/// `/api/generate` client bound to one model
pub struct OllamaClient {
    http_client: reqwest::Client,
    base_url: String,
    model: String,
    timeout_secs: u64,
}

impl OllamaClient {
    pub fn new(provider: &ProviderConfig, model: &str) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            timeout_secs: provider.timeout_secs,
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "prompt": request.prompt,
            "stream": false,
            "keep_alive": KEEP_ALIVE,
            "options": {"temperature": 0},
        });
        if let Some(schema) = &request.schema {
            body["format"] = schema.clone();
        }
        body
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        let url = format!("{}/api/generate", self.base_url);
        debug!(model = %self.model, structured = request.is_structured(), "ollama generate request");

        let response = self
            .http_client
            .post(&url)
            .json(&self.request_body(request))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(format!("Failed to parse response: {}", e)))?;

        parse_generate_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract text and token usage from an `/api/generate` reply
fn parse_generate_response(json: &serde_json::Value) -> Result<Generation, BackendError> {
    let text = json
        .get("response")
        .and_then(|r| r.as_str())
        .ok_or(BackendError::EmptyResponse)?
        .to_string();

    let prompt_tokens = json["prompt_eval_count"].as_u64().unwrap_or(0);
    let completion_tokens = json["eval_count"].as_u64().unwrap_or(0);

    Ok(Generation {
        text,
        tokens: prompt_tokens + completion_tokens,
    })
}
