//! Masking engine.
//!
//! Combines tagger spans and regex matches for one text. Counts are the
//! per-category maximum of the two detectors; masking replaces every
//! tagger span in place (tracking offsets, so repeated values are all
//! masked) and then runs the regex pass over the result as a safety net.

mod transform;

pub use transform::{mask_entity, MASK};

use crate::keywords::KeywordMatcher;
use crate::model::{CategoryCounts, EntityLabel, EntitySpan};
use crate::ner::{merge_entities, Tagger};
use crate::patterns::{PatternKind, RegexDetector, RegexMatch};
use log::warn;
use once_cell::sync::Lazy;
use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;
use transform::is_masked;

/// Replacement for matches of user-defined patterns.
pub const CUSTOM_MASK: &str = "***";

static DEFAULT_DETECTOR: Lazy<RegexDetector> = Lazy::new(RegexDetector::new);

/// Everything the detectors found in one text.
#[derive(Debug, Clone, Default)]
pub struct Analysis {
    /// Tagger spans, blank and already-masked spans removed
    pub spans: Vec<EntitySpan>,
    /// Byte range of each span, whitespace trimmed
    pub span_ranges: Vec<Range<usize>>,
    /// Non-overlapping regex matches
    pub matches: Vec<RegexMatch>,
    /// Byte ranges of sensitive term occurrences
    pub keyword_ranges: Vec<Range<usize>>,
    /// Per-category tagger counts
    pub tagger_counts: CategoryCounts,
    /// Per-category regex counts
    pub regex_counts: CategoryCounts,
    /// Final counts: per-category max of the two detectors
    pub counts: CategoryCounts,
    /// Per-pattern counts for custom patterns
    pub custom_counts: BTreeMap<String, usize>,
    /// Distinct sensitive terms found
    pub keyword_hits: Vec<String>,
    /// Whether tagger output is included
    pub tagger_used: bool,
    /// Problems met while analyzing
    pub warnings: Vec<String>,
}

impl Analysis {
    /// Byte ranges the masking engine or the spatial redactor would touch.
    pub fn sensitive_ranges(&self, include_keywords: bool) -> Vec<Range<usize>> {
        let mut ranges: Vec<Range<usize>> = self.span_ranges.clone();
        ranges.extend(self.matches.iter().map(|m| m.start..m.end));
        if include_keywords {
            ranges.extend(self.keyword_ranges.iter().cloned());
        }
        ranges.sort_by_key(|r| (r.start, r.end));
        ranges
    }
}

/// Detection and masking over one tagger, one regex table and one term list.
#[derive(Debug, Clone)]
pub struct MaskingEngine {
    tagger: Arc<Tagger>,
    detector: RegexDetector,
    keywords: KeywordMatcher,
}

impl MaskingEngine {
    /// Engine with the built-in patterns and default sensitive terms.
    pub fn new(tagger: Arc<Tagger>) -> Self {
        Self {
            tagger,
            detector: RegexDetector::new(),
            keywords: KeywordMatcher::with_defaults(),
        }
    }

    /// Regex-only engine.
    pub fn regex_only() -> Self {
        Self::new(Arc::new(Tagger::unavailable("regex-only engine")))
    }

    /// Replace the regex detector.
    pub fn with_detector(mut self, detector: RegexDetector) -> Self {
        self.detector = detector;
        self
    }

    /// Replace the sensitive term list.
    pub fn with_keywords(mut self, keywords: KeywordMatcher) -> Self {
        self.keywords = keywords;
        self
    }

    /// The tagger in use.
    pub fn tagger(&self) -> &Tagger {
        &self.tagger
    }

    /// The regex detector in use.
    pub fn detector(&self) -> &RegexDetector {
        &self.detector
    }

    /// The sensitive term matcher in use.
    pub fn keywords(&self) -> &KeywordMatcher {
        &self.keywords
    }

    /// Run both detectors over `text`.
    pub fn analyze(&self, text: &str) -> Analysis {
        let mut analysis = Analysis::default();

        if self.tagger.is_available() && !text.trim().is_empty() {
            match self.tagger.tag(text) {
                Ok(units) => {
                    analysis.tagger_used = true;
                    let offsets = char_offsets(text);
                    for span in merge_entities(&units) {
                        if span.is_blank() || is_masked(&span.text) {
                            continue;
                        }
                        if let Some(range) = trimmed_range(text, &offsets, &span) {
                            analysis.tagger_counts.increment(span.label);
                            analysis.span_ranges.push(range);
                            analysis.spans.push(span);
                        }
                    }
                }
                Err(e) => {
                    warn!("tagging failed, using regex-only detection: {}", e);
                    analysis.warnings.push(format!("tagger: {}", e));
                }
            }
        }

        analysis.matches = self.detector.find_all(text);
        for m in &analysis.matches {
            match &m.kind {
                PatternKind::Entity(label) => analysis.regex_counts.increment(*label),
                PatternKind::Custom(name) => {
                    *analysis.custom_counts.entry(name.to_string()).or_insert(0) += 1
                }
            }
        }

        analysis.counts = analysis.tagger_counts.clone();
        analysis.counts.merge_max(&analysis.regex_counts);

        analysis.keyword_ranges = self
            .keywords
            .find_all(text)
            .into_iter()
            .map(|(s, e)| s..e)
            .collect();
        analysis.keyword_hits = self.keywords.hits(text);
        analysis
    }

    /// Final per-category counts for `text`.
    pub fn count(&self, text: &str) -> CategoryCounts {
        self.analyze(text).counts
    }

    /// Mask `text`.
    pub fn mask_text(&self, text: &str) -> String {
        let analysis = self.analyze(text);
        self.mask_analyzed(text, &analysis)
    }

    /// Mask `text` using an existing analysis of it.
    pub fn mask_analyzed(&self, text: &str, analysis: &Analysis) -> String {
        let spans: Vec<(Range<usize>, EntityLabel)> = analysis
            .span_ranges
            .iter()
            .cloned()
            .zip(analysis.spans.iter().map(|s| s.label))
            .collect();
        let masked = replace_ranges(text, spans.into_iter().map(|(range, label)| {
            let replacement = mask_entity(&text[range.clone()], label);
            (range, replacement)
        }));
        regex_pass(&self.detector, &masked)
    }

    /// Mask `text` and return its analysis alongside.
    pub fn mask_and_analyze(&self, text: &str) -> (String, Analysis) {
        let analysis = self.analyze(text);
        let masked = self.mask_analyzed(text, &analysis);
        (masked, analysis)
    }

    /// Mask a single entity. See [`mask_entity`].
    pub fn mask_entity(text: &str, label: EntityLabel) -> String {
        mask_entity(text, label)
    }

    /// Run only the regex pass with this engine's patterns.
    pub fn regex_pass(&self, text: &str) -> String {
        regex_pass(&self.detector, text)
    }
}

/// Re-apply the category transforms over every built-in regex match.
///
/// Idempotent: masked segments no longer match any pattern.
pub fn apply_regex_pass(text: &str) -> String {
    regex_pass(&DEFAULT_DETECTOR, text)
}

fn regex_pass(detector: &RegexDetector, text: &str) -> String {
    let matches = detector.find_all(text);
    if matches.is_empty() {
        return text.to_string();
    }
    replace_ranges(
        text,
        matches.into_iter().map(|m| {
            let replacement = match &m.kind {
                PatternKind::Entity(label) => mask_entity(&m.text, *label),
                PatternKind::Custom(_) => CUSTOM_MASK.to_string(),
            };
            (m.start..m.end, replacement)
        }),
    )
}

/// Replace byte ranges, scanning forward from the end of the previous
/// replacement. Ranges starting before that point are skipped.
fn replace_ranges<I>(text: &str, replacements: I) -> String
where
    I: IntoIterator<Item = (Range<usize>, String)>,
{
    let mut sorted: Vec<(Range<usize>, String)> = replacements.into_iter().collect();
    sorted.sort_by_key(|(r, _)| r.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (range, replacement) in sorted {
        if range.start < cursor || range.end > text.len() {
            continue;
        }
        out.push_str(&text[cursor..range.start]);
        out.push_str(&replacement);
        cursor = range.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Byte offset of every char, plus the end of the text.
fn char_offsets(text: &str) -> Vec<usize> {
    text.char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect()
}

/// Byte range of a span with surrounding whitespace removed.
///
/// Returns `None` when the span does not sit at its recorded offset.
fn trimmed_range(text: &str, offsets: &[usize], span: &EntitySpan) -> Option<Range<usize>> {
    let start = *offsets.get(span.start)?;
    let end = *offsets.get(span.end())?;
    let slice = text.get(start..end)?;
    if slice != span.text {
        return None;
    }
    let leading = slice.len() - slice.trim_start().len();
    let trailing = slice.len() - slice.trim_end().len();
    Some(start + leading..end - trailing)
}
