//! Majority vote over every worker draft of a run.

use serde::{Deserialize, Serialize};

use crate::codes;

/// Placeholder when no draft cites any code
pub const NO_CODE: &str = "N/A";

/// Depth of the consensus candidate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CodeDepth {
    NationalLine,
    Heading,
    None,
}

/// Consensus candidate handed to the aggregator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Consensus {
    pub code: String,
    pub depth: CodeDepth,
    /// Occurrences of `code` across all drafts
    pub votes: usize,
}

impl Consensus {
    fn none() -> Self {
        Self {
            code: NO_CODE.to_string(),
            depth: CodeDepth::None,
            votes: 0,
        }
    }
}

/// Most frequent 8-digit line across all drafts, else most frequent heading,
/// else `N/A`. Ties go to the code seen first.
pub fn consensus_code(worker_results: &[String]) -> Consensus {
    let bodies: Vec<&str> = worker_results
        .iter()
        .map(|r| codes::findings_body(r))
        .collect();
    let all = bodies.join("\n");

    if let Some((code, votes)) = most_frequent(codes::national_lines(&all)) {
        return Consensus {
            code,
            depth: CodeDepth::NationalLine,
            votes,
        };
    }

    if let Some((code, votes)) = most_frequent(codes::headings(&all)) {
        return Consensus {
            code,
            depth: CodeDepth::Heading,
            votes,
        };
    }

    Consensus::none()
}

/// Stable frequency count: first-seen order, strict `>` keeps the earliest on ties
fn most_frequent(codes: Vec<String>) -> Option<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for code in codes {
        match counts.iter_mut().find(|(c, _)| *c == code) {
            Some((_, n)) => *n += 1,
            None => counts.push((code, 1)),
        }
    }

    let mut best: Option<(String, usize)> = None;
    for (code, n) in counts {
        match &best {
            Some((_, best_n)) if n <= *best_n => {}
            _ => best = Some((code, n)),
        }
    }
    best
}
