//! OpenAI-compatible chat completions backend (hosted, rate-limited).

use async_trait::async_trait;
use std::env;
use std::time::Duration;
use tracing::debug;

use super::{BackendError, Generation, GenerationClient, GenerationRequest};
use crate::config::ProviderConfig;

/// Chat-completions client bound to one model
pub struct OpenAiCompatibleClient {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

impl OpenAiCompatibleClient {
    /// Create a client; the API key is read from the configured env var
    pub fn new(provider: &ProviderConfig, model: &str) -> Result<Self, BackendError> {
        let env_var = provider.api_key_env.as_deref().ok_or_else(|| {
            BackendError::Config("api_key_env is required for hosted backends".to_string())
        })?;

        let api_key = match env::var(env_var) {
            Ok(key) if !key.is_empty() => key,
            Ok(_) => {
                return Err(BackendError::Config(format!(
                    "API key env var {} is empty",
                    env_var
                )))
            }
            Err(_) => {
                return Err(BackendError::Config(format!(
                    "API key env var {} not found",
                    env_var
                )))
            }
        };

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(provider.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url: provider.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: model.to_string(),
            timeout_secs: provider.timeout_secs,
        })
    }

    fn request_body(&self, request: &GenerationRequest) -> serde_json::Value {
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "user", "content": request.prompt},
            ],
            "temperature": 0,
        });

        if let Some(schema) = &request.schema {
            body["response_format"] = serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": "structured_output",
                    "schema": schema,
                },
            });
        }

        body
    }
}

#[async_trait]
impl GenerationClient for OpenAiCompatibleClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        let url = format!("{}/chat/completions", self.base_url);
        debug!(model = %self.model, structured = request.is_structured(), "chat completion request");

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(&self.api_key)
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

        parse_chat_response(&json)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract text and token usage from a chat-completions reply
fn parse_chat_response(json: &serde_json::Value) -> Result<Generation, BackendError> {
    let text = json["choices"][0]["message"]["content"]
        .as_str()
        .ok_or(BackendError::EmptyResponse)?
        .to_string();
    let tokens = json["usage"]["total_tokens"].as_u64().unwrap_or(0);
    Ok(Generation { text, tokens })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn provider() -> ProviderConfig {
        std::env::set_var("HS_AUDITOR_OPENAI_TEST_KEY", "sk-test");
        ProviderConfig {
            base_url: "https://api.example.com/v1/".to_string(),
            api_key_env: Some("HS_AUDITOR_OPENAI_TEST_KEY".to_string()),
            planner_model: "m".to_string(),
            worker_model: "m".to_string(),
            aggregator_model: "m".to_string(),
            judge_model: "m".to_string(),
            timeout_secs: 5,
            cost_per_1k_tokens: 0.0,
        }
    }

    #[test]
    fn test_parse_chat_response() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": "FINAL_CODE: 8518.30.10"}}],
            "usage": {"prompt_tokens": 90, "completion_tokens": 10, "total_tokens": 100}
        });
        let generation = parse_chat_response(&json).unwrap();
        assert_eq!(generation.text, "FINAL_CODE: 8518.30.10");
        assert_eq!(generation.tokens, 100);
    }

    #[test]
    fn test_parse_chat_response_without_content() {
        let json = serde_json::json!({"choices": []});
        assert!(matches!(
            parse_chat_response(&json),
            Err(BackendError::EmptyResponse)
        ));
    }

    #[test]
    fn test_structured_request_carries_schema() {
        let client = OpenAiCompatibleClient::new(&provider(), "llama").unwrap();
        let schema = serde_json::json!({"type": "object"});
        let body = client.request_body(&GenerationRequest::structured("plan", schema.clone()));
        assert_eq!(body["response_format"]["json_schema"]["schema"], schema);
        assert_eq!(client.base_url, "https://api.example.com/v1");

        let body = client.request_body(&GenerationRequest::text("free"));
        assert!(body.get("response_format").is_none());
    }

    #[test]
    fn test_missing_key_env_is_config_error() {
        let mut provider = provider();
        provider.api_key_env = Some("HS_AUDITOR_UNSET_KEY_VAR".to_string());
        assert!(matches!(
            OpenAiCompatibleClient::new(&provider, "m"),
            Err(BackendError::Config(_))
        ));
    }
}
