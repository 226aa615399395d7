//! HTTP client for the tariff retrieval service.
//!
//! The service owns indexing and embedding. It answers
//! `POST <url>/retrieve {"query", "top_k"}` with `{"chunks": [...]}` or a bare
//! JSON array of strings, ordered by similarity rank.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{BackendError, EvidenceClient};
use crate::config::EvidenceConfig;

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RetrieveResponse {
    Wrapped { chunks: Vec<String> },
    Bare(Vec<String>),
}

impl RetrieveResponse {
    fn into_chunks(self) -> Vec<String> {
        match self {
            RetrieveResponse::Wrapped { chunks } => chunks,
            RetrieveResponse::Bare(chunks) => chunks,
        }
    }
}

/// Retrieval service client
pub struct HttpEvidenceClient {
    http_client: reqwest::Client,
    url: String,
    top_k: usize,
    timeout_secs: u64,
}

impl HttpEvidenceClient {
    pub fn new(config: &EvidenceConfig) -> Result<Self, BackendError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            url: format!("{}/retrieve", config.url.trim_end_matches('/')),
            top_k: config.top_k,
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl EvidenceClient for HttpEvidenceClient {
    async fn retrieve(&self, query: &str) -> Result<Vec<String>, BackendError> {
        debug!(url = %self.url, top_k = self.top_k, "retrieving evidence");

        let response = self
            .http_client
            .post(&self.url)
            .json(&serde_json::json!({"query": query, "top_k": self.top_k}))
            .send()
            .await
            .map_err(|e| BackendError::from_reqwest(e, self.timeout_secs))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status, body));
        }

        let text = response
            .text()
            .await
            .map_err(|e| BackendError::Http(e.to_string()))?;
        parse_chunks(&text)
    }
}

fn parse_chunks(body: &str) -> Result<Vec<String>, BackendError> {
    serde_json::from_str::<RetrieveResponse>(body)
        .map(RetrieveResponse::into_chunks)
        .map_err(|e| BackendError::InvalidResponse(format!("Bad retrieval payload: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wrapped_chunks() {
        let chunks = parse_chunks(r#"{"chunks": ["8518.30.10 -- Headphones", "8518.30.59 -- Other"]}"#)
            .unwrap();
        assert_eq!(chunks.len(), 2);
    }

    #[test]
    fn test_parse_bare_array() {
        let chunks = parse_chunks(r#"["8518.30.10 -- Headphones"]"#).unwrap();
        assert_eq!(chunks, vec!["8518.30.10 -- Headphones"]);
    }

    #[test]
    fn test_parse_empty_and_invalid() {
        assert!(parse_chunks(r#"{"chunks": []}"#).unwrap().is_empty());
        assert!(matches!(
            parse_chunks(r#"{"results": 3}"#),
            Err(BackendError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_url_normalized() {
        let config = EvidenceConfig {
            url: "http://corpus:8600/".to_string(),
            ..Default::default()
        };
        let client = HttpEvidenceClient::new(&config).unwrap();
        assert_eq!(client.url, "http://corpus:8600/retrieve");
    }
}
