//! Evidence budget.

/// Appended to evidence cut at the character budget
pub const TRUNCATION_MARKER: &str = "\n...[TRUNCATED FOR TOKEN LIMITS]...";

/// Evidence after applying the character budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetedEvidence {
    pub text: String,
    /// Length in chars before truncation
    pub original_chars: usize,
    pub truncated: bool,
}

/// Cut evidence to `limit` chars (on a char boundary) and append the marker.
/// Evidence within budget is returned unchanged.
pub fn apply_budget(evidence: &str, limit: usize) -> BudgetedEvidence {
    let original_chars = evidence.chars().count();
    if original_chars <= limit {
        return BudgetedEvidence {
            text: evidence.to_string(),
            original_chars,
            truncated: false,
        };
    }

    let cut = evidence
        .char_indices()
        .nth(limit)
        .map(|(idx, _)| idx)
        .unwrap_or(evidence.len());

    BudgetedEvidence {
        text: format!("{}{}", &evidence[..cut], TRUNCATION_MARKER),
        original_chars,
        truncated: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cut_respects_multibyte_chars() {
        let evidence = "é".repeat(10);
        let budgeted = apply_budget(&evidence, 4);
        assert!(budgeted.truncated);
        assert!(budgeted.text.starts_with("éééé\n"));
        assert_eq!(budgeted.original_chars, 10);
    }

    #[test]
    fn test_within_budget_is_untouched() {
        let budgeted = apply_budget("8518.30.10 - Headphones", 5000);
        assert!(!budgeted.truncated);
        assert_eq!(budgeted.text, "8518.30.10 - Headphones");
    }
}
