//! Regex reinforcement: category patterns run alongside the tagger.
//!
//! The built-in table covers the strictly formatted categories (national
//! ID, phone, email, card and account numbers) and the two common address
//! styles. Matches from different categories never overlap: when two
//! patterns claim the same characters, the higher-priority category wins.

use crate::error::{Error, Result};
use crate::model::{CategoryCounts, EntityLabel};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Administrative division (시/도) followed by a district (구/군/시).
pub(crate) const ADDRESS_PREFIX: &str = r"[가-힣]{2,}(?:시|도)\s?[가-힣]{1,}(?:구|군|시)";

/// One built-in pattern.
struct CategoryPattern {
    label: EntityLabel,
    regex: Regex,
    /// Reject matches glued to neighbouring digits.
    digit_bounded: bool,
}

impl CategoryPattern {
    fn new(label: EntityLabel, pattern: &str, digit_bounded: bool) -> Self {
        Self {
            label,
            regex: Regex::new(pattern).expect("built-in pattern must compile"),
            digit_bounded,
        }
    }
}

static BUILTIN: Lazy<Vec<CategoryPattern>> = Lazy::new(|| {
    let road = format!(
        r"{ADDRESS_PREFIX}(?:\s?[가-힣]+(?:구|읍|면))?\s?[가-힣0-9]+(?:로|길)\s?[0-9]+(?:-[0-9]+)?"
    );
    let lot = format!(
        r"{ADDRESS_PREFIX}(?:\s?[가-힣]+(?:구|읍|면))?\s?[가-힣0-9]+(?:동|리|가)\s?[0-9]+(?:-[0-9]+)?(?:번지)?"
    );
    vec![
        CategoryPattern::new(EntityLabel::NationalId, r"[0-9]{6}-[0-9]{7}", true),
        CategoryPattern::new(
            EntityLabel::CardNumber,
            r"[0-9]{4}[- ]?[0-9]{4}[- ]?[0-9]{4}[- ]?[0-9]{4}",
            true,
        ),
        CategoryPattern::new(EntityLabel::Phone, r"01[016789]-?[0-9]{3,4}-?[0-9]{4}", true),
        CategoryPattern::new(EntityLabel::Phone, r"0[2-6][0-9]?-[0-9]{3,4}-[0-9]{4}", true),
        CategoryPattern::new(EntityLabel::Phone, r"\(0?[0-9]{1,2}\)\s?[0-9]{3,4}-[0-9]{4}", true),
        CategoryPattern::new(
            EntityLabel::Email,
            r"[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}",
            false,
        ),
        CategoryPattern::new(
            EntityLabel::AccountNumber,
            r"[0-9]{2,4}-[0-9]{2,4}-[0-9]{2,6}",
            true,
        ),
        CategoryPattern::new(EntityLabel::AccountNumber, r"[0-9]{10,14}", true),
        CategoryPattern::new(EntityLabel::Address, &road, false),
        CategoryPattern::new(EntityLabel::Address, &lot, false),
    ]
});

/// Overlap priority; lower wins.
fn priority(label: EntityLabel) -> u8 {
    match label {
        EntityLabel::NationalId => 0,
        EntityLabel::CardNumber => 1,
        EntityLabel::Phone => 2,
        EntityLabel::Email => 3,
        EntityLabel::AccountNumber => 4,
        EntityLabel::Address => 5,
        EntityLabel::Name => 6,
    }
}

/// What a match was found by.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternKind {
    /// A built-in entity category
    Entity(EntityLabel),
    /// A user-defined pattern, by name
    Custom(Arc<str>),
}

impl PatternKind {
    /// Entity label, for built-in matches.
    pub fn label(&self) -> Option<EntityLabel> {
        match self {
            PatternKind::Entity(label) => Some(*label),
            PatternKind::Custom(_) => None,
        }
    }

    fn rank(&self) -> u8 {
        match self {
            PatternKind::Entity(label) => priority(*label),
            PatternKind::Custom(_) => u8::MAX,
        }
    }
}

/// A regex hit with byte offsets into the scanned text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegexMatch {
    /// Matching pattern
    pub kind: PatternKind,
    /// Byte offset of the first byte
    pub start: usize,
    /// Byte offset one past the last byte
    pub end: usize,
    /// Matched text
    pub text: String,
}

impl RegexMatch {
    fn overlaps(&self, other: &RegexMatch) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// A user-defined named pattern.
#[derive(Debug, Clone)]
pub struct CustomPattern {
    name: Arc<str>,
    regex: Regex,
}

impl CustomPattern {
    /// Compile a named pattern.
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let regex = Regex::new(pattern)
            .map_err(|e| Error::Config(format!("pattern '{}': {}", name, e)))?;
        if regex.is_match("") {
            return Err(Error::Config(format!(
                "pattern '{}' matches the empty string",
                name
            )));
        }
        Ok(Self {
            name: Arc::from(name),
            regex,
        })
    }

    /// Pattern name.
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Runs the built-in category patterns, plus any custom ones.
#[derive(Debug, Clone, Default)]
pub struct RegexDetector {
    custom: Vec<CustomPattern>,
}

impl RegexDetector {
    /// Detector with the built-in table only.
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector with additional user-defined patterns.
    ///
    /// Custom patterns have the lowest priority: where they overlap a
    /// built-in match, the built-in match is kept.
    pub fn with_custom(custom: Vec<CustomPattern>) -> Self {
        Self { custom }
    }

    /// Custom patterns in use.
    pub fn custom_patterns(&self) -> &[CustomPattern] {
        &self.custom
    }

    /// All non-overlapping matches in text order.
    pub fn find_all(&self, text: &str) -> Vec<RegexMatch> {
        let mut candidates = Vec::new();
        for pattern in BUILTIN.iter() {
            for (start, end) in find_bounded(&pattern.regex, text, pattern.digit_bounded) {
                candidates.push(RegexMatch {
                    kind: PatternKind::Entity(pattern.label),
                    start,
                    end,
                    text: text[start..end].to_string(),
                });
            }
        }
        for pattern in &self.custom {
            for (start, end) in find_bounded(&pattern.regex, text, false) {
                candidates.push(RegexMatch {
                    kind: PatternKind::Custom(pattern.name.clone()),
                    start,
                    end,
                    text: text[start..end].to_string(),
                });
            }
        }

        // Highest priority first, then leftmost, then longest.
        candidates.sort_by(|a, b| {
            a.kind
                .rank()
                .cmp(&b.kind.rank())
                .then(a.start.cmp(&b.start))
                .then(b.end.cmp(&a.end))
        });

        let mut accepted: Vec<RegexMatch> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            if !accepted.iter().any(|m| m.overlaps(&candidate)) {
                accepted.push(candidate);
            }
        }
        accepted.sort_by_key(|m| m.start);
        accepted
    }

    /// Matches of the built-in categories only.
    pub fn find_entities(&self, text: &str) -> Vec<RegexMatch> {
        self.find_all(text)
            .into_iter()
            .filter(|m| m.kind.label().is_some())
            .collect()
    }

    /// Per-category match counts.
    pub fn count(&self, text: &str) -> CategoryCounts {
        self.find_all(text)
            .iter()
            .filter_map(|m| m.kind.label())
            .map(|label| (label, 1))
            .collect()
    }

    /// Per-pattern counts for the custom patterns.
    pub fn custom_counts(&self, text: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for m in self.find_all(text) {
            if let PatternKind::Custom(name) = m.kind {
                *counts.entry(name.to_string()).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Whether any pattern matches anywhere in the text.
    pub fn is_hit(&self, text: &str) -> bool {
        BUILTIN
            .iter()
            .any(|p| !find_bounded(&p.regex, text, p.digit_bounded).is_empty())
            || self.custom.iter().any(|p| p.regex.is_match(text))
    }
}

/// Leftmost matches, skipping any that touch a digit on either side when
/// `digit_bounded` is set. A rejected match is retried one character later
/// so a valid match that starts inside it is still found.
fn find_bounded(regex: &Regex, text: &str, digit_bounded: bool) -> Vec<(usize, usize)> {
    let mut found = Vec::new();
    let mut pos = 0;
    while pos <= text.len() {
        let m = match regex.find_at(text, pos) {
            Some(m) => m,
            None => break,
        };
        if m.start() == m.end() {
            pos = next_boundary(text, m.end());
            continue;
        }
        if !digit_bounded || is_digit_bounded(text, m.start(), m.end()) {
            found.push((m.start(), m.end()));
            pos = m.end();
        } else {
            pos = next_boundary(text, m.start());
        }
    }
    found
}

fn next_boundary(text: &str, pos: usize) -> usize {
    pos + text[pos..].chars().next().map_or(1, char::len_utf8)
}

fn is_digit_bounded(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(text: &str) -> Vec<(EntityLabel, String)> {
        RegexDetector::new()
            .find_all(text)
            .into_iter()
            .filter_map(|m| m.kind.label().map(|l| (l, m.text)))
            .collect()
    }

    #[test]
    fn test_national_id_and_phone() {
        let found = labels("주민번호 900101-1234567 연락처 010-1234-5678");
        assert_eq!(
            found,
            vec![
                (EntityLabel::NationalId, "900101-1234567".to_string()),
                (EntityLabel::Phone, "010-1234-5678".to_string()),
            ]
        );
    }

    #[test]
    fn test_phone_variants() {
        for phone in ["01012345678", "02-123-4567", "031-1234-5678", "(02) 123-4567"] {
            let found = labels(&format!("tel {} end", phone));
            assert_eq!(found, vec![(EntityLabel::Phone, phone.to_string())], "{}", phone);
        }
    }

    #[test]
    fn test_card_beats_account() {
        let found = labels("카드 1234-5678-9012-3456");
        assert_eq!(found, vec![(EntityLabel::CardNumber, "1234-5678-9012-3456".to_string())]);
        let found = labels("카드 1234 5678 9012 3456");
        assert_eq!(found[0].0, EntityLabel::CardNumber);
    }

    #[test]
    fn test_account_numbers() {
        assert_eq!(
            labels("계좌 110-123-456789"),
            vec![(EntityLabel::AccountNumber, "110-123-456789".to_string())]
        );
        assert_eq!(
            labels("계좌 3333012345678"),
            vec![(EntityLabel::AccountNumber, "3333012345678".to_string())]
        );
    }

    #[test]
    fn test_digit_glued_match_rejected() {
        assert!(labels("id 9001011-12345678").is_empty());
    }

    #[test]
    fn test_email() {
        assert_eq!(
            labels("email: test@example.com"),
            vec![(EntityLabel::Email, "test@example.com".to_string())]
        );
    }

    #[test]
    fn test_addresses() {
        let found = labels("주소: 서울시 강남구 테헤란로 123 2층");
        assert_eq!(
            found,
            vec![(EntityLabel::Address, "서울시 강남구 테헤란로 123".to_string())]
        );
        let found = labels("경기도 수원시 영통구 매탄동 123-4번지");
        assert_eq!(found[0].0, EntityLabel::Address);
        assert!(found[0].1.ends_with("123-4번지"));
    }

    #[test]
    fn test_masked_text_does_not_match() {
        let masked = "900101-******* 010-****-5678 t***@example.com 1234-****-****-3456 서울시 강남구 ****";
        assert!(labels(masked).is_empty());
        assert!(!RegexDetector::new().is_hit(masked));
    }

    #[test]
    fn test_count() {
        let counts = RegexDetector::new().count("a@b.com, c@d.org, 010-1111-2222");
        assert_eq!(counts.get(EntityLabel::Email), 2);
        assert_eq!(counts.get(EntityLabel::Phone), 1);
        assert_eq!(counts.get(EntityLabel::AccountNumber), 0);
    }

    #[test]
    fn test_custom_patterns() {
        let custom = CustomPattern::new("사번", r"EMP-[0-9]{5}").unwrap();
        let detector = RegexDetector::with_custom(vec![custom]);
        let counts = detector.custom_counts("EMP-00001 and EMP-00002");
        assert_eq!(counts.get("사번"), Some(&2));
        assert!(detector.is_hit("see EMP-12345"));
        assert!(detector.count("EMP-12345").is_empty());
    }

    #[test]
    fn test_custom_pattern_rejects_invalid() {
        assert!(matches!(CustomPattern::new("bad", "("), Err(Error::Config(_))));
        assert!(matches!(CustomPattern::new("empty", "a*"), Err(Error::Config(_))));
    }
}
