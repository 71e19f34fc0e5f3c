//! Sensitive business terms (기밀, confidential, ...).

use crate::error::{Error, Result};
use regex::{Regex, RegexBuilder};

/// Terms flagged when no settings override them.
pub const DEFAULT_SENSITIVE_TERMS: &[&str] = &[
    "기밀",
    "내부문서",
    "계약서",
    "내부자료",
    "비공개",
    "confidential",
    "internal use only",
];

/// Case-insensitive matcher over a list of terms.
#[derive(Debug, Clone)]
pub struct KeywordMatcher {
    terms: Vec<String>,
    regex: Option<Regex>,
}

impl KeywordMatcher {
    /// Build a matcher; blank terms are ignored.
    pub fn new<S: AsRef<str>>(terms: &[S]) -> Result<Self> {
        let mut kept: Vec<String> = Vec::new();
        for term in terms {
            let term = term.as_ref().trim();
            if !term.is_empty() && !kept.iter().any(|t| t.eq_ignore_ascii_case(term)) {
                kept.push(term.to_string());
            }
        }
        // Longest first so "internal use only" wins over a shorter prefix term.
        let mut ordered: Vec<&String> = kept.iter().collect();
        ordered.sort_by_key(|t| std::cmp::Reverse(t.chars().count()));

        let regex = if ordered.is_empty() {
            None
        } else {
            let alternation = ordered
                .iter()
                .map(|t| regex::escape(t))
                .collect::<Vec<_>>()
                .join("|");
            Some(
                RegexBuilder::new(&alternation)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| Error::Config(format!("sensitive terms: {}", e)))?,
            )
        };
        Ok(Self { terms: kept, regex })
    }

    /// Matcher over [`DEFAULT_SENSITIVE_TERMS`].
    pub fn with_defaults() -> Self {
        Self::new(DEFAULT_SENSITIVE_TERMS).expect("default terms must compile")
    }

    /// Configured terms.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    /// Byte ranges of all term occurrences.
    pub fn find_all(&self, text: &str) -> Vec<(usize, usize)> {
        match &self.regex {
            Some(regex) => regex.find_iter(text).map(|m| (m.start(), m.end())).collect(),
            None => Vec::new(),
        }
    }

    /// Whether any term occurs in the text.
    pub fn is_hit(&self, text: &str) -> bool {
        self.regex.as_ref().is_some_and(|r| r.is_match(text))
    }

    /// Distinct terms found, as configured, in order of first appearance.
    pub fn hits(&self, text: &str) -> Vec<String> {
        let mut found: Vec<String> = Vec::new();
        for (start, end) in self.find_all(text) {
            let matched = &text[start..end];
            let term = self
                .terms
                .iter()
                .find(|t| t.to_lowercase() == matched.to_lowercase())
                .cloned()
                .unwrap_or_else(|| matched.to_string());
            if !found.contains(&term) {
                found.push(term);
            }
        }
        found
    }
}

impl Default for KeywordMatcher {
    fn default() -> Self {
        Self::with_defaults()
    }
}
