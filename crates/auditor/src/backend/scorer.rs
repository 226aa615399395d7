//! Model-graded faithfulness scorer.
//!
//! A judge model lists the factual claims in the text and marks each one
//! `yes` (supported), `no` (contradicted) or `idk` (not addressed) against the
//! evidence. Score = claims not contradicted / all claims; no claims scores 1.0.

use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use super::{
    strip_code_fences, BackendError, FaithfulnessScorer, FaithfulnessVerdict, GenerationClient,
    GenerationRequest,
};

#[derive(Debug, Deserialize)]
struct JudgeOutput {
    verdicts: Vec<ClaimVerdict>,
}

#[derive(Debug, Deserialize)]
struct ClaimVerdict {
    claim: String,
    verdict: String,
    #[serde(default)]
    reason: Option<String>,
}

/// Faithfulness scorer backed by a judge model
pub struct ModelGradedScorer {
    judge: Arc<dyn GenerationClient>,
}

impl ModelGradedScorer {
    pub fn new(judge: Arc<dyn GenerationClient>) -> Self {
        Self { judge }
    }
}

/// JSON schema for the judge reply
pub fn judge_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "verdicts": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "claim": {"type": "string"},
                        "verdict": {"type": "string", "enum": ["yes", "no", "idk"]},
                        "reason": {"type": "string"}
                    },
                    "required": ["claim", "verdict"]
                }
            }
        },
        "required": ["verdicts"]
    })
}

fn build_judge_prompt(claims: &str, evidence: &[String]) -> String {
    format!(
        r#"You are grading the faithfulness of a tariff classification against its evidence.

List every factual claim made in the TEXT (codes, legal descriptions, classification statements).
For each claim output a verdict:
- "yes": the EVIDENCE supports the claim
- "no": the EVIDENCE contradicts the claim, or the claim cites a code that does not appear in the EVIDENCE
- "idk": the EVIDENCE does not address the claim
Give a short reason for every "no".

Respond with JSON only: {{"verdicts": [{{"claim": "...", "verdict": "yes|no|idk", "reason": "..."}}]}}

=== EVIDENCE ===
{}

=== TEXT ===
{}"#,
        evidence.join("\n\n"),
        claims
    )
}

/// Score a judge reply
fn score_judge_reply(reply: &str) -> Result<(f64, String), BackendError> {
    let output: JudgeOutput = serde_json::from_str(strip_code_fences(reply))
        .map_err(|e| BackendError::InvalidResponse(format!("Judge output is not valid JSON: {}", e)))?;

    if output.verdicts.is_empty() {
        return Ok((1.0, "No factual claims to verify.".to_string()));
    }

    let mut contradicted = Vec::new();
    for v in &output.verdicts {
        match v.verdict.trim().to_lowercase().as_str() {
            "yes" | "idk" => {}
            "no" => contradicted.push(v),
            other => {
                return Err(BackendError::InvalidResponse(format!(
                    "Unknown verdict '{}'",
                    other
                )))
            }
        }
    }

    let total = output.verdicts.len();
    let score = (total - contradicted.len()) as f64 / total as f64;

    let reason = if contradicted.is_empty() {
        format!("All {} claims are consistent with the evidence.", total)
    } else {
        let details: Vec<String> = contradicted
            .iter()
            .map(|v| match v.reason.as_deref() {
                Some(r) if !r.trim().is_empty() => format!("'{}' ({})", v.claim, r.trim()),
                _ => format!("'{}'", v.claim),
            })
            .collect();
        format!(
            "{} of {} claims contradicted: {}",
            contradicted.len(),
            total,
            details.join("; ")
        )
    };

    Ok((score, reason))
}

#[async_trait]
impl FaithfulnessScorer for ModelGradedScorer {
    async fn score(
        &self,
        claims: &str,
        evidence: &[String],
    ) -> Result<FaithfulnessVerdict, BackendError> {
        let request =
            GenerationRequest::structured(build_judge_prompt(claims, evidence), judge_schema());
        let generation = self.judge.generate(&request).await?;
        let (score, reason) = score_judge_reply(&generation.text)?;

        Ok(FaithfulnessVerdict {
            score,
            reason,
            tokens: generation.tokens,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::FakeGenerationClientBuilder;

    #[test]
    fn test_score_counts_only_contradictions() {
        let reply = r#"{"verdicts": [
            {"claim": "8518.30.10 covers headphones", "verdict": "yes"},
            {"claim": "headphones are wireless", "verdict": "idk"},
            {"claim": "8518.30.90 applies", "verdict": "no", "reason": "code not in evidence"},
            {"claim": "duty rate is 0%", "verdict": "yes"}
        ]}"#;
        let (score, reason) = score_judge_reply(reply).unwrap();
        assert_eq!(score, 0.75);
        assert!(reason.contains("8518.30.90 applies"));
        assert!(reason.contains("code not in evidence"));
    }

    #[test]
    fn test_no_claims_scores_one() {
        let (score, _) = score_judge_reply(r#"{"verdicts": []}"#).unwrap();
        assert_eq!(score, 1.0);
    }

    #[test]
    fn test_malformed_reply_is_error() {
        assert!(score_judge_reply("the claims look fine").is_err());
        assert!(score_judge_reply(r#"{"verdicts": [{"claim": "x", "verdict": "maybe"}]}"#).is_err());
    }

    #[tokio::test]
    async fn test_scorer_uses_judge_tokens() {
        let judge = FakeGenerationClientBuilder::new()
            .response_with_tokens(
                "```json\n{\"verdicts\": [{\"claim\": \"a\", \"verdict\": \"yes\"}]}\n```",
                42,
            )
            .build();
        let scorer = ModelGradedScorer::new(Arc::new(judge));

        let verdict = scorer
            .score("8518.30.10 covers headphones", &["8518.30.10 -- Headphones".to_string()])
            .await
            .unwrap();
        assert_eq!(verdict.score, 1.0);
        assert_eq!(verdict.tokens, 42);
    }
}
