//! Capability interfaces for the external collaborators.
//!
//! The state machine only sees three traits: evidence retrieval, text
//! generation and faithfulness scoring. The deployment mode picks concrete
//! implementations once, in [`Backends::from_config`].

pub mod evidence;
pub mod fake;
pub mod ollama;
pub mod openai;
pub mod scorer;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

use crate::config::{AuditConfig, DeploymentMode};

pub use evidence::HttpEvidenceClient;
pub use fake::{
    FakeEvidenceClient, FakeEvidenceClientBuilder, FakeGenerationClient,
    FakeGenerationClientBuilder, FakeScorer, FakeScorerBuilder,
};
pub use ollama::OllamaClient;
pub use openai::OpenAiCompatibleClient;
pub use scorer::ModelGradedScorer;

/// Backend call errors
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Rate limited by backend")]
    RateLimited,

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Backend returned empty response")]
    EmptyResponse,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl BackendError {
    /// Map a reqwest failure, keeping timeouts distinct
    pub(crate) fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(timeout_secs)
        } else {
            BackendError::Http(err.to_string())
        }
    }

    /// Map a non-success HTTP status
    pub(crate) fn from_status(status: reqwest::StatusCode, body: String) -> Self {
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            BackendError::RateLimited
        } else {
            BackendError::Status {
                status: status.as_u16(),
                body,
            }
        }
    }
}

/// A prompt plus an optional structured-output contract
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub prompt: String,
    /// JSON schema the reply must satisfy; `None` means free text
    pub schema: Option<serde_json::Value>,
}

impl GenerationRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: None,
        }
    }

    pub fn structured(prompt: impl Into<String>, schema: serde_json::Value) -> Self {
        Self {
            prompt: prompt.into(),
            schema: Some(schema),
        }
    }

    pub fn is_structured(&self) -> bool {
        self.schema.is_some()
    }
}

/// Generated text with its token usage
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Generation {
    pub text: String,
    pub tokens: u64,
}

/// Faithfulness score with the grader's explanation
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FaithfulnessVerdict {
    /// Score in [0, 1]
    pub score: f64,
    pub reason: String,
    pub tokens: u64,
}

/// Retrieval over the tariff corpus
#[async_trait]
pub trait EvidenceClient: Send + Sync {
    /// Chunks ordered by similarity rank (possibly empty)
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, BackendError>;
}

/// Text generation backend
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError>;

    /// Model name for logs
    fn model(&self) -> &str;
}

/// Model-graded faithfulness metric
#[async_trait]
pub trait FaithfulnessScorer: Send + Sync {
    async fn score(
        &self,
        claims: &str,
        evidence: &[String],
    ) -> Result<FaithfulnessVerdict, BackendError>;
}

/// Capability set for one orchestrator
#[derive(Clone)]
pub struct Backends {
    pub evidence: Arc<dyn EvidenceClient>,
    pub planner: Arc<dyn GenerationClient>,
    pub worker: Arc<dyn GenerationClient>,
    pub aggregator: Arc<dyn GenerationClient>,
    pub scorer: Arc<dyn FaithfulnessScorer>,
}

impl Backends {
    /// Build the real backends for the configured deployment mode
    pub fn from_config(config: &AuditConfig) -> Result<Self, BackendError> {
        let provider = config.provider();
        let evidence: Arc<dyn EvidenceClient> =
            Arc::new(HttpEvidenceClient::new(&config.evidence)?);

        let backends = match config.run.mode {
            DeploymentMode::Cloud => {
                let client = |model: &str| -> Result<Arc<dyn GenerationClient>, BackendError> {
                    Ok(Arc::new(OpenAiCompatibleClient::new(provider, model)?))
                };
                let judge = client(&provider.judge_model)?;
                Self {
                    evidence,
                    planner: client(&provider.planner_model)?,
                    worker: client(&provider.worker_model)?,
                    aggregator: client(&provider.aggregator_model)?,
                    scorer: Arc::new(ModelGradedScorer::new(judge)),
                }
            }
            DeploymentMode::Local => {
                let client = |model: &str| -> Result<Arc<dyn GenerationClient>, BackendError> {
                    Ok(Arc::new(OllamaClient::new(provider, model)?))
                };
                let judge = client(&provider.judge_model)?;
                Self {
                    evidence,
                    planner: client(&provider.planner_model)?,
                    worker: client(&provider.worker_model)?,
                    aggregator: client(&provider.aggregator_model)?,
                    scorer: Arc::new(ModelGradedScorer::new(judge)),
                }
            }
        };

        Ok(backends)
    }
}

/// Strip markdown code fences around a JSON reply
pub fn strip_code_fences(text: &str) -> &str {
    let t = text.trim();
    let Some(rest) = t.strip_prefix("```") else {
        return t;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
