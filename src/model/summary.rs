//! Per-category counts and the reports built from them.

use super::entity::EntityLabel;
use crate::detect::DocumentFormat;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Detection count per entity category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryCounts(BTreeMap<EntityLabel, usize>);

impl CategoryCounts {
    /// Create empty counts.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count for a label (zero when absent).
    pub fn get(&self, label: EntityLabel) -> usize {
        self.0.get(&label).copied().unwrap_or(0)
    }

    /// Overwrite the count for a label.
    pub fn set(&mut self, label: EntityLabel, count: usize) {
        if count == 0 {
            self.0.remove(&label);
        } else {
            self.0.insert(label, count);
        }
    }

    /// Add to the count for a label.
    pub fn add(&mut self, label: EntityLabel, count: usize) {
        if count > 0 {
            *self.0.entry(label).or_insert(0) += count;
        }
    }

    /// Increment the count for a label by one.
    pub fn increment(&mut self, label: EntityLabel) {
        self.add(label, 1);
    }

    /// Keep the larger count per label.
    ///
    /// This is how tagger and regex counts are combined for one text.
    pub fn merge_max(&mut self, other: &CategoryCounts) {
        for (label, count) in other.iter() {
            let current = self.get(label);
            self.set(label, current.max(count));
        }
    }

    /// Sum counts per label.
    ///
    /// This is how counts are combined across documents.
    pub fn merge_sum(&mut self, other: &CategoryCounts) {
        for (label, count) in other.iter() {
            self.add(label, count);
        }
    }

    /// Non-zero counts in label order.
    pub fn iter(&self) -> impl Iterator<Item = (EntityLabel, usize)> + '_ {
        self.0.iter().map(|(l, c)| (*l, *c))
    }

    /// Sum over all labels.
    pub fn total(&self) -> usize {
        self.0.values().sum()
    }

    /// Whether any category has a non-zero count.
    pub fn contains_pii(&self) -> bool {
        self.0.values().any(|c| *c > 0)
    }

    /// Whether no category was detected.
    pub fn is_empty(&self) -> bool {
        !self.contains_pii()
    }
}

impl FromIterator<(EntityLabel, usize)> for CategoryCounts {
    fn from_iter<I: IntoIterator<Item = (EntityLabel, usize)>>(iter: I) -> Self {
        let mut counts = CategoryCounts::new();
        for (label, count) in iter {
            counts.add(label, count);
        }
        counts
    }
}

/// How far scanning got for one document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanStatus {
    /// Fully scanned
    #[default]
    Complete,
    /// Format not supported; no entities reported
    Skipped,
    /// Extraction failed or timed out
    Failed,
}

/// Scan result for one document (or one inline text).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    /// Display name
    pub name: String,
    /// Declared format, when recognized
    pub format: Option<DocumentFormat>,
    /// Size in bytes
    pub size: usize,
    /// Declared content type
    pub content_type: String,
    /// Final per-category counts
    pub counts: CategoryCounts,
    /// Matches of user-defined patterns, by pattern name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_counts: BTreeMap<String, usize>,
    /// Sensitive business terms found, in order of first appearance
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyword_hits: Vec<String>,
    /// Problems encountered while scanning
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
    /// Scan status
    pub status: ScanStatus,
    /// Whether the tagger contributed to the counts
    pub tagger_available: bool,
}

impl ScanReport {
    /// Create an empty report for a named document.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Whether any entity category was detected.
    pub fn contains_pii(&self) -> bool {
        self.counts.contains_pii()
    }

    /// Whether anything sensitive was found: PII, custom patterns, or terms.
    pub fn is_sensitive(&self) -> bool {
        self.contains_pii()
            || self.custom_counts.values().any(|c| *c > 0)
            || !self.keyword_hits.is_empty()
    }

    /// Whether the document was processed with warnings.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty() || self.status != ScanStatus::Complete
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Counts accumulated across the documents of one submission.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Per-category totals
    pub counts: CategoryCounts,
    /// Per-pattern totals for user-defined patterns
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_counts: BTreeMap<String, usize>,
    /// Distinct sensitive terms found
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub keyword_hits: BTreeSet<String>,
    /// Number of documents added
    pub documents: usize,
    /// Documents processed with warnings
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub processed_with_warnings: Vec<String>,
}

impl ScanSummary {
    /// Create an empty summary.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one document's report.
    pub fn add(&mut self, report: &ScanReport) {
        self.documents += 1;
        self.counts.merge_sum(&report.counts);
        for (name, count) in &report.custom_counts {
            *self.custom_counts.entry(name.clone()).or_insert(0) += count;
        }
        self.keyword_hits.extend(report.keyword_hits.iter().cloned());
        if report.has_warnings() {
            self.processed_with_warnings.push(report.name.clone());
        }
    }

    /// Fold another summary into this one.
    pub fn merge(&mut self, other: ScanSummary) {
        self.documents += other.documents;
        self.counts.merge_sum(&other.counts);
        for (name, count) in other.custom_counts {
            *self.custom_counts.entry(name).or_insert(0) += count;
        }
        self.keyword_hits.extend(other.keyword_hits);
        self.processed_with_warnings
            .extend(other.processed_with_warnings);
    }

    /// Whether any document contained PII.
    pub fn contains_pii(&self) -> bool {
        self.counts.contains_pii()
    }
}

impl<'a> FromIterator<&'a ScanReport> for ScanSummary {
    fn from_iter<I: IntoIterator<Item = &'a ScanReport>>(iter: I) -> Self {
        let mut summary = ScanSummary::new();
        for report in iter {
            summary.add(report);
        }
        summary
    }
}

/// Masked or redacted content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MaskedPayload {
    /// Masked text (plain text formats)
    Text(String),
    /// Rewritten or redacted binary document
    Binary(Vec<u8>),
}

/// Result of masking one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaskedOutput {
    /// Output name, `masked_` + original name
    pub name: String,
    /// Output format (same as the input's)
    pub format: DocumentFormat,
    /// The masked content
    pub payload: MaskedPayload,
    /// Counts that drove the masking
    pub counts: CategoryCounts,
}

impl MaskedOutput {
    /// Content as bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.payload {
            MaskedPayload::Text(text) => text.as_bytes(),
            MaskedPayload::Binary(data) => data,
        }
    }

    /// Consume into bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        match self.payload {
            MaskedPayload::Text(text) => text.into_bytes(),
            MaskedPayload::Binary(data) => data,
        }
    }

    /// Masked text, for text payloads.
    pub fn text(&self) -> Option<&str> {
        match &self.payload {
            MaskedPayload::Text(text) => Some(text),
            MaskedPayload::Binary(_) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(pairs: &[(EntityLabel, usize)]) -> CategoryCounts {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_merge_max_is_per_label() {
        let mut tagger = counts(&[(EntityLabel::Name, 2), (EntityLabel::Phone, 1)]);
        let regex = counts(&[(EntityLabel::Phone, 3), (EntityLabel::Email, 1)]);
        tagger.merge_max(&regex);

        assert_eq!(tagger.get(EntityLabel::Name), 2);
        assert_eq!(tagger.get(EntityLabel::Phone), 3);
        assert_eq!(tagger.get(EntityLabel::Email), 1);
        assert_eq!(tagger.total(), 6);
    }

    #[test]
    fn test_zero_counts_are_not_pii() {
        let mut c = CategoryCounts::new();
        c.set(EntityLabel::Email, 0);
        assert!(!c.contains_pii());
        assert!(c.is_empty());
        c.increment(EntityLabel::Email);
        assert!(c.contains_pii());
    }

    #[test]
    fn test_summary_sums_documents() {
        let mut a = ScanReport::new("a.txt");
        a.counts = counts(&[(EntityLabel::Phone, 1)]);
        a.keyword_hits.push("기밀".into());
        let mut b = ScanReport::new("b.pdf");
        b.counts = counts(&[(EntityLabel::Phone, 2)]);
        b.status = ScanStatus::Failed;
        b.warn("ocr unavailable");

        let summary: ScanSummary = [&a, &b].into_iter().collect();
        assert_eq!(summary.documents, 2);
        assert_eq!(summary.counts.get(EntityLabel::Phone), 3);
        assert!(summary.contains_pii());
        assert_eq!(summary.processed_with_warnings, vec!["b.pdf".to_string()]);
        assert!(summary.keyword_hits.contains("기밀"));
    }

    #[test]
    fn test_summary_merge() {
        let mut first = ScanSummary::new();
        first.add(&ScanReport::new("empty.txt"));
        let mut second = ScanSummary::new();
        let mut r = ScanReport::new("x.csv");
        r.custom_counts.insert("사번".into(), 2);
        second.add(&r);

        first.merge(second);
        assert_eq!(first.documents, 2);
        assert_eq!(first.custom_counts.get("사번"), Some(&2));
        assert!(!first.contains_pii());
    }

    #[test]
    fn test_counts_serialize_as_map() {
        let c = counts(&[(EntityLabel::NationalId, 1)]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"national_id":1}"#);
    }
}
