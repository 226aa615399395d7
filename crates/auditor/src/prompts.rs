//! Prompt templates for the planner, the classifier worker and the final synthesis.
//!
//! Templates use `{name}` placeholders, all filled in one pass so text
//! substituted for one placeholder is never rescanned for another. The
//! planner strategy and the synthesis template can be overridden from files in
//! `prompts_dir`; the classification rules are fixed.

use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Planner strategy override file
pub const STRATEGY_FILE: &str = "strategy.md";

/// Synthesis override file
pub const SYNTHESIS_FILE: &str = "final_synthesis.md";

/// Built-in planner strategy. Placeholders: `{query}`, `{critique}`
pub const STRATEGY: &str = r#"You are a customs classification search planner.
Turn the product description into ONE focused search query for a tariff schedule index.

Guidelines:
- Lead with the literal product noun, then its material and its function.
- Name the HS chapter or heading if you are confident of it.
- Do not add marketing words, brands or model numbers.

PRODUCT: {query}
{critique}
Respond with JSON only: {"search_query": "..."}"#;

/// Fixed rule set handed to the classifier worker
pub const CLASSIFICATION_RULES: &str = r#"=== CLASSIFICATION RULES (MANDATORY) ===
1. Use ONLY codes that appear verbatim in the evidence above. Never invent a code.
2. Prefer the line whose description names the literal product noun (e.g. "Headphones")
   over generic "Other" lines.
3. Copy the cited description text verbatim from the evidence.
4. Feature modifiers such as "wireless", "portable" or "digital" do not override a
   matching generic line unless the evidence has a more specific line for that feature.
5. Cite the full 8-digit national tariff line (DDDD.DD.DD) whenever the evidence has one.
6. If no line fits, cite the closest heading (DDDD.DD) and say the 8-digit line is missing."#;

/// Classifier prompt. Placeholders: `{search_query}`, `{evidence}`, `{rules}`
const CLASSIFICATION: &str = r#"You are a tariff classification specialist.

=== EVIDENCE (tariff schedule extract) ===
{evidence}

=== REQUEST ===
Classify: {search_query}

{rules}

Answer with the code you cite, the verbatim evidence line, and one sentence of reasoning."#;

/// Built-in synthesis template.
/// Placeholders: `{query}`, `{candidate}`, `{worker_result}`, `{evidence}`
pub const SYNTHESIS: &str = r#"You are a senior customs auditor writing the final classification.

PRODUCT: {query}

MANDATORY HS CODE (do NOT change this): {candidate}

=== LATEST ANALYSIS ===
{worker_result}

=== LATEST EVIDENCE ===
{evidence}

Write the final answer in exactly this format:

FINAL_CODE: <the mandatory code above, DDDD.DD.DD>
CONFIDENCE: <HIGH | MEDIUM | LOW>
REASONING: <two or three sentences grounded in the evidence>
---VERIFICATION_CLAIMS---
<one factual claim per line, each quoting the evidence it relies on>
---END_CLAIMS---"#;

/// Loaded prompt templates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptSet {
    pub strategy: String,
    pub synthesis: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            strategy: STRATEGY.to_string(),
            synthesis: SYNTHESIS.to_string(),
        }
    }
}

impl PromptSet {
    /// Load overrides from `dir`, falling back to the built-in template per file
    pub fn load(dir: Option<&Path>) -> Self {
        let Some(dir) = dir else {
            return Self::default();
        };

        Self {
            strategy: load_template(dir, STRATEGY_FILE, STRATEGY, &["{query}"]),
            synthesis: load_template(dir, SYNTHESIS_FILE, SYNTHESIS, &["{candidate}"]),
        }
    }

    /// Planner prompt. A critique from the previous cycle demands a narrower query.
    pub fn planner_prompt(&self, query: &str, critique: Option<&str>) -> String {
        let critique_block = match critique.map(str::trim).filter(|c| !c.is_empty()) {
            Some(critique) => format!(
                "\nPREVIOUS ATTEMPT FAILED REVIEW: {}\nBe more specific than the previous \
                 attempt: address the feedback above and narrow the query.\n",
                critique
            ),
            None => String::new(),
        };

        fill(
            &self.strategy,
            &[("{query}", query), ("{critique}", critique_block.as_str())],
        )
    }

    /// Classifier prompt over (possibly truncated) evidence
    pub fn classification_prompt(&self, search_query: &str, evidence: &str) -> String {
        fill(
            CLASSIFICATION,
            &[
                ("{evidence}", evidence),
                ("{search_query}", search_query),
                ("{rules}", CLASSIFICATION_RULES),
            ],
        )
    }

    /// Synthesis prompt with the mandated consensus code
    pub fn synthesis_prompt(
        &self,
        query: &str,
        candidate: &str,
        worker_result: &str,
        evidence: &str,
    ) -> String {
        fill(
            &self.synthesis,
            &[
                ("{query}", query),
                ("{candidate}", candidate),
                ("{worker_result}", worker_result),
                ("{evidence}", evidence),
            ],
        )
    }
}

/// Substitute placeholders left to right; unknown `{...}` text is kept as is
fn fill(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match values.iter().find(|(name, _)| tail.starts_with(*name)) {
            Some((name, value)) => {
                out.push_str(value);
                rest = &tail[name.len()..];
            }
            None => {
                out.push('{');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn load_template(dir: &Path, file: &str, builtin: &str, required: &[&str]) -> String {
    let path = dir.join(file);
    match fs::read_to_string(&path) {
        Ok(content) if content.trim().is_empty() => {
            warn!("Prompt file {} is empty, using built-in template", path.display());
            builtin.to_string()
        }
        Ok(content) => {
            if let Some(missing) = required.iter().find(|p| !content.contains(*p)) {
                warn!(
                    "Prompt file {} lacks placeholder {}, using built-in template",
                    path.display(),
                    missing
                );
                return builtin.to_string();
            }
            info!("Loaded prompt override from {}", path.display());
            content
        }
        Err(e) => {
            warn!(
                "Failed to read prompt file {}: {}, using built-in template",
                path.display(),
                e
            );
            builtin.to_string()
        }
    }
}
