//! Audit records for processed documents.
//!
//! The pipeline produces one [`AuditRecord`] per document and hands it
//! to an [`AuditSink`]. Storing and querying records is up to the sink.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::model::{CategoryCounts, ScanReport};

/// User recorded when the caller does not say who is acting.
pub const UNKNOWN_USER: &str = "unknown";

/// What was done to one document, by whom, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Display name
    pub name: String,
    /// Size in bytes
    pub size: usize,
    /// Declared content type
    pub content_type: String,
    /// Per-category counts
    pub counts: CategoryCounts,
    /// Per-pattern counts for custom patterns
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub custom_counts: BTreeMap<String, usize>,
    /// Whether any PII category was found
    pub has_pii: bool,
    /// Acting user
    pub user: String,
    /// When the document was processed
    pub timestamp: DateTime<Utc>,
    /// Whether a masked copy was produced
    pub masked: bool,
    /// Problems met while processing
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl AuditRecord {
    /// Record for a scan report, timestamped now.
    pub fn from_report(report: &ScanReport, user: Option<&str>, masked: bool) -> Self {
        Self {
            name: report.name.clone(),
            size: report.size,
            content_type: report.content_type.clone(),
            counts: report.counts.clone(),
            custom_counts: report.custom_counts.clone(),
            has_pii: report.contains_pii(),
            user: user
                .map(str::trim)
                .filter(|u| !u.is_empty())
                .unwrap_or(UNKNOWN_USER)
                .to_string(),
            timestamp: Utc::now(),
            masked,
            warnings: report.warnings.clone(),
        }
    }
}

/// Receives audit records.
pub trait AuditSink: Send + Sync {
    /// Store one record.
    fn record(&self, record: &AuditRecord) -> Result<()>;
}

/// Discards every record.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullAuditSink;

impl AuditSink for NullAuditSink {
    fn record(&self, _record: &AuditRecord) -> Result<()> {
        Ok(())
    }
}

/// Appends records to a file, one JSON object per line.
#[derive(Debug)]
pub struct JsonLinesAuditSink {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonLinesAuditSink {
    /// Sink appending to `path`, created on first write.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// File being written.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read every record back.
    pub fn read_all(&self) -> Result<Vec<AuditRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let text = std::fs::read_to_string(&self.path)?;
        text.lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Error::from))
            .collect()
    }
}

impl AuditSink for JsonLinesAuditSink {
    fn record(&self, record: &AuditRecord) -> Result<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let _guard = self
            .lock
            .lock()
            .map_err(|_| Error::Io(std::io::Error::other("audit log lock poisoned")))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityLabel;

    fn report() -> ScanReport {
        let mut report = ScanReport::new("a.txt");
        report.size = 42;
        report.content_type = "text/plain".into();
        report.counts.add(EntityLabel::Phone, 2);
        report
    }

    #[test]
    fn test_from_report() {
        let record = AuditRecord::from_report(&report(), None, true);
        assert_eq!(record.user, "unknown");
        assert!(record.has_pii);
        assert!(record.masked);
        assert_eq!(record.counts.get(EntityLabel::Phone), 2);

        let record = AuditRecord::from_report(&report(), Some("kim"), false);
        assert_eq!(record.user, "kim");
    }

    #[test]
    fn test_json_lines_sink() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonLinesAuditSink::new(dir.path().join("audit.jsonl"));
        assert!(sink.read_all().unwrap().is_empty());

        sink.record(&AuditRecord::from_report(&report(), Some("kim"), false))
            .unwrap();
        sink.record(&AuditRecord::from_report(&ScanReport::new("b.csv"), None, true))
            .unwrap();

        let records = sink.read_all().unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "a.txt");
        assert!(!records[1].has_pii);

        let text = std::fs::read_to_string(sink.path()).unwrap();
        assert_eq!(text.lines().count(), 2);
        assert!(text.contains(r#""phone":2"#));
    }

    #[test]
    fn test_null_sink() {
        assert!(NullAuditSink.record(&AuditRecord::from_report(&report(), None, false)).is_ok());
    }
}
