//! Scripted backends for deterministic testing.
//!
//! Each fake replays a queue of pre-configured replies in call order and falls
//! back to a default once the queue is drained. Clones share the same queue
//! and call log, so a test can keep a handle after passing one to the
//! orchestrator.
//!
//! ```rust,ignore
//! let worker = FakeGenerationClientBuilder::new()
//!     .response("Findings: 8518.30.10 applies")
//!     .failure(BackendError::RateLimited)
//!     .build();
//!
//! let handle = worker.clone();
//! run_with(Arc::new(worker)).await;
//! assert_eq!(handle.call_count(), 2);
//! ```

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use super::{
    BackendError, EvidenceClient, FaithfulnessScorer, FaithfulnessVerdict, Generation,
    GenerationClient, GenerationRequest,
};

// ============================================================================
// Fake Generation Client
// ============================================================================

/// Fake text generator
#[derive(Clone)]
pub struct FakeGenerationClient {
    model: String,
    responses: Arc<Mutex<VecDeque<Result<Generation, BackendError>>>>,
    default_response: Result<Generation, BackendError>,
    /// Every request received, in order
    requests: Arc<Mutex<Vec<GenerationRequest>>>,
}

impl FakeGenerationClient {
    /// Number of generate() calls so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Prompts received, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.prompt.clone())
            .collect()
    }

    /// Full requests received, in order
    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests.lock().unwrap().last().map(|r| r.prompt.clone())
    }
}

#[async_trait]
impl GenerationClient for FakeGenerationClient {
    async fn generate(&self, request: &GenerationRequest) -> Result<Generation, BackendError> {
        self.requests.lock().unwrap().push(request.clone());

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Builder for FakeGenerationClient
pub struct FakeGenerationClientBuilder {
    model: String,
    responses: VecDeque<Result<Generation, BackendError>>,
    default_response: Result<Generation, BackendError>,
}

impl FakeGenerationClientBuilder {
    /// Empty script; unscripted calls fail with `EmptyResponse`
    pub fn new() -> Self {
        Self {
            model: "fake-model".to_string(),
            responses: VecDeque::new(),
            default_response: Err(BackendError::EmptyResponse),
        }
    }

    pub fn model(mut self, model: &str) -> Self {
        self.model = model.to_string();
        self
    }

    /// Queue a reply with zero token usage
    pub fn response(self, text: &str) -> Self {
        self.response_with_tokens(text, 0)
    }

    /// Queue a reply with token usage
    pub fn response_with_tokens(mut self, text: &str, tokens: u64) -> Self {
        self.responses.push_back(Ok(Generation {
            text: text.to_string(),
            tokens,
        }));
        self
    }

    /// Queue a failed call
    pub fn failure(mut self, error: BackendError) -> Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Reply used once the script is drained
    pub fn default_response(mut self, text: &str) -> Self {
        self.default_response = Ok(Generation {
            text: text.to_string(),
            tokens: 0,
        });
        self
    }

    pub fn build(self) -> FakeGenerationClient {
        FakeGenerationClient {
            model: self.model,
            responses: Arc::new(Mutex::new(self.responses)),
            default_response: self.default_response,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for FakeGenerationClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fake Evidence Client
// ============================================================================

/// Fake retrieval service
#[derive(Clone)]
pub struct FakeEvidenceClient {
    responses: Arc<Mutex<VecDeque<Result<Vec<String>, BackendError>>>>,
    default_response: Result<Vec<String>, BackendError>,
    queries: Arc<Mutex<Vec<String>>>,
}

impl FakeEvidenceClient {
    pub fn call_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }

    /// Search queries received, in order
    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EvidenceClient for FakeEvidenceClient {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, BackendError> {
        self.queries.lock().unwrap().push(query.to_string());

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

/// Builder for FakeEvidenceClient
pub struct FakeEvidenceClientBuilder {
    responses: VecDeque<Result<Vec<String>, BackendError>>,
    default_response: Result<Vec<String>, BackendError>,
}

impl FakeEvidenceClientBuilder {
    /// Empty script; unscripted calls return no chunks
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            default_response: Ok(Vec::new()),
        }
    }

    /// Queue a retrieval result
    pub fn chunks(mut self, chunks: &[&str]) -> Self {
        self.responses
            .push_back(Ok(chunks.iter().map(|c| c.to_string()).collect()));
        self
    }

    /// Queue an empty retrieval
    pub fn empty(mut self) -> Self {
        self.responses.push_back(Ok(Vec::new()));
        self
    }

    pub fn failure(mut self, error: BackendError) -> Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Chunks returned once the script is drained
    pub fn default_chunks(mut self, chunks: &[&str]) -> Self {
        self.default_response = Ok(chunks.iter().map(|c| c.to_string()).collect());
        self
    }

    pub fn build(self) -> FakeEvidenceClient {
        FakeEvidenceClient {
            responses: Arc::new(Mutex::new(self.responses)),
            default_response: self.default_response,
            queries: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for FakeEvidenceClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Fake Faithfulness Scorer
// ============================================================================

/// One recorded scorer call
#[derive(Debug, Clone, PartialEq)]
pub struct ScoreCall {
    pub claims: String,
    pub evidence: Vec<String>,
}

/// Fake faithfulness metric
#[derive(Clone)]
pub struct FakeScorer {
    responses: Arc<Mutex<VecDeque<Result<FaithfulnessVerdict, BackendError>>>>,
    default_response: Result<FaithfulnessVerdict, BackendError>,
    calls: Arc<Mutex<Vec<ScoreCall>>>,
}

impl FakeScorer {
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls(&self) -> Vec<ScoreCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl FaithfulnessScorer for FakeScorer {
    async fn score(
        &self,
        claims: &str,
        evidence: &[String],
    ) -> Result<FaithfulnessVerdict, BackendError> {
        self.calls.lock().unwrap().push(ScoreCall {
            claims: claims.to_string(),
            evidence: evidence.to_vec(),
        });

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_response.clone())
    }
}

/// Builder for FakeScorer
pub struct FakeScorerBuilder {
    responses: VecDeque<Result<FaithfulnessVerdict, BackendError>>,
    default_response: Result<FaithfulnessVerdict, BackendError>,
}

impl FakeScorerBuilder {
    /// Empty script; unscripted calls score 1.0
    pub fn new() -> Self {
        Self {
            responses: VecDeque::new(),
            default_response: Ok(verdict(1.0, "All claims are consistent with the evidence.")),
        }
    }

    /// Queue a score
    pub fn score(mut self, score: f64, reason: &str) -> Self {
        self.responses.push_back(Ok(verdict(score, reason)));
        self
    }

    pub fn failure(mut self, error: BackendError) -> Self {
        self.responses.push_back(Err(error));
        self
    }

    /// Score returned once the script is drained
    pub fn default_score(mut self, score: f64) -> Self {
        self.default_response = Ok(verdict(score, "default score"));
        self
    }

    /// Fail every unscripted call
    pub fn default_failure(mut self, error: BackendError) -> Self {
        self.default_response = Err(error);
        self
    }

    pub fn build(self) -> FakeScorer {
        FakeScorer {
            responses: Arc::new(Mutex::new(self.responses)),
            default_response: self.default_response,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Default for FakeScorerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn verdict(score: f64, reason: &str) -> FaithfulnessVerdict {
    FaithfulnessVerdict {
        score,
        reason: reason.to_string(),
        tokens: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generation_script_then_default() {
        let fake = FakeGenerationClientBuilder::new()
            .response_with_tokens("first", 10)
            .failure(BackendError::RateLimited)
            .default_response("fallback")
            .build();
        let handle = fake.clone();

        let first = fake.generate(&GenerationRequest::text("a")).await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.tokens, 10);
        assert!(matches!(
            fake.generate(&GenerationRequest::text("b")).await,
            Err(BackendError::RateLimited)
        ));
        assert_eq!(
            fake.generate(&GenerationRequest::text("c")).await.unwrap().text,
            "fallback"
        );

        assert_eq!(handle.call_count(), 3);
        assert_eq!(handle.prompts(), vec!["a", "b", "c"]);
        assert_eq!(handle.last_prompt().as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_generation_unscripted_fails() {
        let fake = FakeGenerationClientBuilder::new().build();
        assert!(matches!(
            fake.generate(&GenerationRequest::text("x")).await,
            Err(BackendError::EmptyResponse)
        ));
    }

    #[tokio::test]
    async fn test_evidence_records_queries() {
        let fake = FakeEvidenceClientBuilder::new()
            .chunks(&["8518.30.10 -- Headphones"])
            .empty()
            .build();

        assert_eq!(fake.retrieve("headphones").await.unwrap().len(), 1);
        assert!(fake.retrieve("earphones").await.unwrap().is_empty());
        assert!(fake.retrieve("again").await.unwrap().is_empty());
        assert_eq!(fake.queries(), vec!["headphones", "earphones", "again"]);
    }

    #[tokio::test]
    async fn test_scorer_queue_and_calls() {
        let fake = FakeScorerBuilder::new()
            .failure(BackendError::Timeout(5))
            .score(0.4, "weak")
            .build();
        let evidence = vec!["chunk".to_string()];

        assert!(fake.score("claims", &evidence).await.is_err());
        assert_eq!(fake.score("claims", &evidence).await.unwrap().score, 0.4);
        assert_eq!(fake.score("claims", &evidence).await.unwrap().score, 1.0);
        assert_eq!(fake.call_count(), 3);
        assert_eq!(fake.calls()[0].evidence, evidence);
    }
}
