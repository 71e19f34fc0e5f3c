//! Settings file: custom patterns, sensitive terms and policies.
//!
//! ```json
//! {
//!   "patterns": { "사번": "EMP-[0-9]{5}" },
//!   "sensitive_terms": ["기밀", "confidential"],
//!   "policy": { "max_files": 10, "max_total_mb": 5.0 }
//! }
//! ```
//!
//! Every field is optional. Patterns named after a built-in category
//! (`이메일`, `phone`, ...) are covered by the built-in table and ignored.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::keywords::{KeywordMatcher, DEFAULT_SENSITIVE_TERMS};
use crate::mask::MaskingEngine;
use crate::model::{EntityLabel, ScanReport};
use crate::ner::Tagger;
use crate::patterns::{CustomPattern, RegexDetector};

static URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"https?://[^\s)<>"']+"#).expect("url pattern must compile"));

const BYTES_PER_MB: f64 = 1024.0 * 1024.0;

/// User settings loaded from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Custom patterns: display name to regex
    pub patterns: BTreeMap<String, String>,
    /// Sensitive business terms (none = the built-in list)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_terms: Option<Vec<String>>,
    /// Submission policies
    #[serde(alias = "policies")]
    pub policy: Policy,
}

impl Settings {
    /// Read and validate a settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let settings = Self::from_json(&json)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        debug!(
            "settings loaded from {}: {} custom patterns",
            path.display(),
            settings.patterns.len()
        );
        Ok(settings)
    }

    /// Parse and validate settings JSON.
    ///
    /// Invalid regexes are rejected here rather than at first use.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Settings =
            serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))?;
        settings.custom_patterns()?;
        settings.keywords()?;
        Ok(settings)
    }

    /// Serialize to pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Compiled custom patterns, built-in category names skipped.
    pub fn custom_patterns(&self) -> Result<Vec<CustomPattern>> {
        self.patterns
            .iter()
            .filter(|(name, _)| EntityLabel::parse(name).is_none())
            .map(|(name, pattern)| CustomPattern::new(name, pattern))
            .collect()
    }

    /// Regex detector with the custom patterns added.
    pub fn detector(&self) -> Result<RegexDetector> {
        Ok(RegexDetector::with_custom(self.custom_patterns()?))
    }

    /// Sensitive term matcher.
    pub fn keywords(&self) -> Result<KeywordMatcher> {
        match &self.sensitive_terms {
            Some(terms) => KeywordMatcher::new(terms),
            None => KeywordMatcher::new(DEFAULT_SENSITIVE_TERMS),
        }
    }

    /// Masking engine over `tagger` configured by these settings.
    pub fn engine(&self, tagger: Arc<Tagger>) -> Result<MaskingEngine> {
        Ok(MaskingEngine::new(tagger)
            .with_detector(self.detector()?)
            .with_keywords(self.keywords()?))
    }
}

/// Limits and rules applied to one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Most attachments per submission
    pub max_files: usize,
    /// Largest total attachment size in megabytes
    pub max_total_mb: f64,
    /// Block submissions carrying a national ID number
    #[serde(alias = "block_if_rrn")]
    pub block_if_national_id: bool,
    /// Warn when an email address or phone number is present
    pub warn_if_email: bool,
    /// URLs containing any of these are suspicious
    pub url_black_keywords: Vec<String>,
    /// Domains never reported as suspicious
    pub url_white_domains: Vec<String>,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_total_mb: 5.0,
            block_if_national_id: true,
            warn_if_email: true,
            url_black_keywords: ["bit.ly", "tinyurl", "ipfs", "rawgithub"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            url_white_domains: Vec::new(),
        }
    }
}

impl Policy {
    /// Check a submission's scan reports against this policy.
    pub fn evaluate(&self, reports: &[ScanReport]) -> Vec<PolicyViolation> {
        let mut violations = Vec::new();

        if reports.len() > self.max_files {
            violations.push(PolicyViolation::block(
                None,
                format!("{} files exceed the limit of {}", reports.len(), self.max_files),
            ));
        }
        let total: usize = reports.iter().map(|r| r.size).sum();
        let total_mb = total as f64 / BYTES_PER_MB;
        if total_mb > self.max_total_mb {
            violations.push(PolicyViolation::block(
                None,
                format!(
                    "total size {:.1} MB exceeds the limit of {:.1} MB",
                    total_mb, self.max_total_mb
                ),
            ));
        }

        for report in reports {
            if self.block_if_national_id && report.counts.get(EntityLabel::NationalId) > 0 {
                violations.push(PolicyViolation::block(
                    Some(&report.name),
                    "contains a national ID number".to_string(),
                ));
            }
            let contacts =
                report.counts.get(EntityLabel::Email) + report.counts.get(EntityLabel::Phone);
            if self.warn_if_email && contacts > 0 {
                violations.push(PolicyViolation::warn(
                    Some(&report.name),
                    format!("contains {} email addresses or phone numbers", contacts),
                ));
            }
        }
        violations
    }

    /// URLs in `text` that hit a black keyword and are not white-listed.
    pub fn suspicious_urls(&self, text: &str) -> Vec<String> {
        URL.find_iter(text)
            .map(|m| m.as_str())
            .filter(|url| {
                let lower = url.to_lowercase();
                let white = self
                    .url_white_domains
                    .iter()
                    .any(|d| url_host(&lower).is_some_and(|h| host_in_domain(h, &d.to_lowercase())));
                !white
                    && self
                        .url_black_keywords
                        .iter()
                        .any(|k| lower.contains(&k.to_lowercase()))
            })
            .map(str::to_string)
            .collect()
    }
}

fn url_host(url: &str) -> Option<&str> {
    let rest = url.split_once("://")?.1;
    let host = rest.split(['/', '?', '#']).next()?;
    Some(host.split(':').next().unwrap_or(host))
}

fn host_in_domain(host: &str, domain: &str) -> bool {
    host == domain || host.ends_with(&format!(".{}", domain))
}

/// How serious a policy violation is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Allowed, but the sender should review
    Warn,
    /// Not allowed
    Block,
}

/// One broken policy rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyViolation {
    /// Severity
    pub severity: Severity,
    /// Offending document, if the rule is per document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document: Option<String>,
    /// What was violated
    pub message: String,
}

impl PolicyViolation {
    fn block(document: Option<&str>, message: String) -> Self {
        Self {
            severity: Severity::Block,
            document: document.map(str::to_string),
            message,
        }
    }

    fn warn(document: Option<&str>, message: String) -> Self {
        Self {
            severity: Severity::Warn,
            document: document.map(str::to_string),
            message,
        }
    }
}

impl std::fmt::Display for PolicyViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let level = match self.severity {
            Severity::Warn => "warn",
            Severity::Block => "block",
        };
        match &self.document {
            Some(doc) => write!(f, "[{}] {}: {}", level, doc, self.message),
            None => write!(f, "[{}] {}", level, self.message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_settings_from_json() {
        let settings = Settings::from_json(
            r#"{
                "patterns": { "사번": "EMP-[0-9]{5}", "이메일": "[a-z]+@[a-z]+" },
                "sensitive_terms": ["극비"],
                "policies": { "block_if_rrn": false, "max_files": 3 }
            }"#,
        )
        .unwrap();

        assert_eq!(settings.policy.max_files, 3);
        assert!(!settings.policy.block_if_national_id);
        assert!(settings.policy.warn_if_email);

        let custom = settings.custom_patterns().unwrap();
        assert_eq!(custom.len(), 1);
        assert_eq!(custom[0].name(), "사번");

        let keywords = settings.keywords().unwrap();
        assert!(keywords.is_hit("극비 문서"));
        assert!(!keywords.is_hit("기밀"));
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = Settings::from_json(r#"{ "patterns": { "bad": "([0-9" } }"#).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_empty_settings_use_defaults() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings.policy, Policy::default());
        assert!(settings.keywords().unwrap().is_hit("기밀"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "patterns": {{ "사번": "EMP-[0-9]{{5}}" }} }}"#).unwrap();
        let settings = Settings::load(file.path()).unwrap();
        let engine = settings.engine(Arc::new(Tagger::unavailable("test"))).unwrap();
        assert_eq!(engine.mask_text("사번 EMP-12345"), "사번 ***");
    }

    #[test]
    fn test_policy_evaluate() {
        let mut a = ScanReport::new("a.txt");
        a.size = 4 * 1024 * 1024;
        a.counts.add(EntityLabel::NationalId, 1);
        let mut b = ScanReport::new("b.txt");
        b.size = 2 * 1024 * 1024;
        b.counts.add(EntityLabel::Email, 2);

        let violations = Policy::default().evaluate(&[a, b]);
        assert_eq!(violations.len(), 3);
        assert_eq!(violations[0].severity, Severity::Block);
        assert!(violations[0].document.is_none());
        assert_eq!(violations[1].document.as_deref(), Some("a.txt"));
        assert_eq!(violations[2].severity, Severity::Warn);
        assert_eq!(violations[2].to_string(), "[warn] b.txt: contains 2 email addresses or phone numbers");
    }

    #[test]
    fn test_suspicious_urls() {
        let policy = Policy {
            url_white_domains: vec!["company.co.kr".into()],
            url_black_keywords: vec!["bit.ly".into(), "ipfs".into()],
            ..Policy::default()
        };
        let text = "see https://bit.ly/x1 and https://docs.company.co.kr/ipfs/a and http://example.com";
        assert_eq!(policy.suspicious_urls(text), vec!["https://bit.ly/x1".to_string()]);
    }
}
