//! Tariff code grammar.
//!
//! Every piece of text-pattern policy used by the verification gates lives here,
//! so no other module compiles its own regex.
//!
//! Grammar:
//! - national line (8-digit): `DDDD.DD.DD`
//! - heading (6-digit):       `DDDD.DD`
//! - final answer marker:     `FINAL_CODE: DDDD.DD.DD` (one line, optional markdown bold)
//! - confidence marker:       `CONFIDENCE: HIGH|MEDIUM|LOW`
//! - claims section:          text between [`CLAIMS_BEGIN`] and [`CLAIMS_END`]
//! - worker draft header:     `Findings for <query>:` (never scanned for codes)
//!
//! All tokens are matched on word boundaries. A heading match also fires on the
//! leading `DDDD.DD` of a national line, since the dot after it is a boundary.

use regex::Regex;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::state::Confidence;

/// Opening delimiter of the verification-claims section
pub const CLAIMS_BEGIN: &str = "---VERIFICATION_CLAIMS---";

/// Closing delimiter of the verification-claims section
pub const CLAIMS_END: &str = "---END_CLAIMS---";

/// Header line of every worker draft
pub const FINDINGS_PREFIX: &str = "Findings for ";

static NATIONAL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4}\.\d{2}\.\d{2})\b").unwrap());

static HEADING: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(\d{4}\.\d{2})\b").unwrap());

static ANY_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4}\.\d{2}(?:\.\d{2})?\b").unwrap());

static FINAL_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FINAL_CODE:\s*\**\s*(\d{4}\.\d{2}\.\d{2})\b").unwrap());

static FINAL_CODE_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"FINAL_CODE:([^\n]*)").unwrap());

static CONFIDENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)confidence\W{0,4}\s*(high|medium|low)\b").unwrap());

static CONFIDENCE_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(high|medium|low)\b").unwrap());

/// All 8-digit national lines in order of appearance (duplicates kept)
pub fn national_lines(text: &str) -> Vec<String> {
    NATIONAL_LINE
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .collect()
}

/// All 6-digit headings in order of appearance (duplicates kept)
pub fn headings(text: &str) -> Vec<String> {
    HEADING.captures_iter(text).map(|c| c[1].to_string()).collect()
}

/// Distinct 8-digit national lines, sorted
pub fn national_line_set(text: &str) -> BTreeSet<String> {
    national_lines(text).into_iter().collect()
}

/// Whether the text contains any code-shaped token of either depth
pub fn has_any_code(text: &str) -> bool {
    ANY_CODE.is_match(text)
}

/// Value of the `FINAL_CODE:` line, if present and well-formed
pub fn final_code(text: &str) -> Option<String> {
    FINAL_CODE.captures(text).map(|c| c[1].to_string())
}

/// Display value of the `FINAL_CODE:` line, lenient (used for reports only).
/// Also returns non-code sentinels such as `INSUFFICIENT DATA`.
pub fn final_code_label(text: &str) -> Option<String> {
    if let Some(code) = final_code(text) {
        return Some(code);
    }
    FINAL_CODE_LABEL
        .captures(text)
        .map(|c| c[1].trim_matches(|ch: char| ch == '*' || ch.is_whitespace()).to_string())
        .filter(|label| !label.is_empty())
}

/// Confidence level stated in a synthesized answer.
///
/// An explicit `CONFIDENCE:` label wins; otherwise the first whole-word level
/// token in the text; otherwise LOW. Never defaults to HIGH.
pub fn confidence(text: &str) -> Confidence {
    let level = CONFIDENCE_LINE
        .captures(text)
        .or_else(|| CONFIDENCE_WORD.captures(text))
        .map(|c| c[1].to_ascii_uppercase());

    match level.as_deref() {
        Some("HIGH") => Confidence::High,
        Some("MEDIUM") => Confidence::Medium,
        _ => Confidence::Low,
    }
}

/// Result of pulling the verification claims out of a synthesized answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimsExtraction {
    /// Claims text (whole answer when the section was missing)
    pub text: String,
    /// Whether both delimiters were found
    pub delimited: bool,
}

/// Extract the delimited verification-claims section.
/// Falls back to the entire answer when either delimiter is missing.
pub fn verification_claims(text: &str) -> ClaimsExtraction {
    if let Some(start) = text.find(CLAIMS_BEGIN) {
        let body = &text[start + CLAIMS_BEGIN.len()..];
        if let Some(end) = body.find(CLAIMS_END) {
            return ClaimsExtraction {
                text: body[..end].trim().to_string(),
                delimited: true,
            };
        }
    }

    ClaimsExtraction {
        text: text.trim().to_string(),
        delimited: false,
    }
}

/// Tag a worker draft with the search query that produced it.
/// The query is folded onto the header line so the header stays one line.
pub fn tag_findings(query: &str, body: &str) -> String {
    format!("{}{}:\n{}", FINDINGS_PREFIX, single_line(query), body)
}

/// Collapse every run of whitespace, newlines included, into one space
pub fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Worker draft without its `Findings for <query>:` header.
///
/// The header echoes the search query, which may itself contain a code; it
/// must not count as a citation.
pub fn findings_body(worker_result: &str) -> &str {
    if worker_result.starts_with(FINDINGS_PREFIX) {
        match worker_result.find('\n') {
            Some(idx) => &worker_result[idx + 1..],
            None => "",
        }
    } else {
        worker_result
    }
}

/// Render a code set for a critique line ("none" when empty)
pub fn describe_codes(codes: &BTreeSet<String>) -> String {
    if codes.is_empty() {
        "none".to_string()
    } else {
        codes.iter().cloned().collect::<Vec<_>>().join(", ")
    }
}
