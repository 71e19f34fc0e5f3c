//! # unpii
//!
//! PII detection and redaction for Korean business documents.
//!
//! This library finds personal information (names, national ID numbers,
//! phone numbers, emails, card and account numbers, addresses) and
//! sensitive business terms in plain text, csv, xlsx, docx, PDF and
//! image files, counts them per category, and produces masked copies.
//!
//! ## Quick Start
//!
//! ```no_run
//! use unpii::{Document, Pipeline, PipelineOptions};
//!
//! fn main() -> unpii::Result<()> {
//!     let pipeline = Pipeline::new(PipelineOptions::new().with_model_dir("models/ner"))?;
//!
//!     let report = pipeline.scan_text("연락처 010-1234-5678");
//!     println!("phone numbers: {}", report.counts.get(unpii::EntityLabel::Phone));
//!
//!     let doc = Document::open("contract.pdf")?;
//!     let masked = pipeline.mask_document(&doc)?;
//!     std::fs::write(&masked.name, masked.as_bytes())?;
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Ensemble detection**: a character-level sequence tagger (ONNX,
//!   optional) reinforced by category regexes; counts are the
//!   per-category maximum of the two
//! - **Category-aware masking**: `홍**`, `900101-*******`, `010-****-5678`
//! - **Format-preserving output**: csv, xlsx and docx are rewritten in place
//! - **Spatial redaction**: digital PDFs lose the glyphs themselves;
//!   scanned PDFs and images are blacked out over OCR boxes
//! - **Graceful degradation**: no model means regex-only, never a crash
//! - **Parallel batches**: uses Rayon for independent documents

pub mod audit;
pub mod detect;
pub mod error;
pub mod extract;
pub mod keywords;
pub mod mask;
pub mod model;
pub mod ner;
pub mod ocr;
pub mod options;
pub mod patterns;
pub mod pdf;
pub mod pipeline;
pub mod redact;
pub mod settings;

// Re-export commonly used types
pub use audit::{AuditRecord, AuditSink, JsonLinesAuditSink, NullAuditSink};
pub use detect::DocumentFormat;
pub use error::{Error, Result, Stage};
pub use extract::{Extractor, ExtractorRegistry};
pub use keywords::KeywordMatcher;
pub use mask::{apply_regex_pass, mask_entity, Analysis, MaskingEngine};
pub use model::{
    BoundingBox, CategoryCounts, Document, EntityLabel, EntitySpan, ExtractedContent,
    MaskedOutput, MaskedPayload, OcrToken, ScanReport, ScanStatus, ScanSummary, Tag, TaggedUnit,
    TokenPage,
};
pub use ner::{merge_entities, SequenceLabeler, Tagger, TaggerConfig};
pub use ocr::{OcrEngine, TesseractOcr};
pub use options::{FailurePolicy, PipelineOptions};
pub use patterns::{CustomPattern, RegexDetector};
pub use pipeline::{BatchReport, MaskOutcome, MessageScan, Pipeline};
pub use redact::{mask_text_document, PdfKind, SpatialRedactor};
pub use settings::{Policy, PolicyViolation, Settings, Severity};

use std::path::Path;

/// Count PII in a text with the default pipeline.
///
/// Uses the process-wide tagger if one has been loaded, regex-only
/// detection otherwise.
///
/// # Example
///
/// ```no_run
/// let report = unpii::scan_text("email: test@example.com")?;
/// assert!(report.contains_pii());
/// # Ok::<(), unpii::Error>(())
/// ```
pub fn scan_text(text: &str) -> Result<ScanReport> {
    Ok(Pipeline::new(PipelineOptions::default())?.scan_text(text))
}

/// Mask a text with the default pipeline.
///
/// # Example
///
/// ```no_run
/// let masked = unpii::mask_text("email: test@example.com")?;
/// assert_eq!(masked, "email: t***@example.com");
/// # Ok::<(), unpii::Error>(())
/// ```
pub fn mask_text(text: &str) -> Result<String> {
    Ok(Pipeline::new(PipelineOptions::default())?.mask_text(text))
}

/// Scan a file with the default pipeline.
///
/// # Arguments
///
/// * `path` - Path to a txt, csv, xlsx, docx, pdf, png or jpg file
///
/// # Example
///
/// ```no_run
/// let report = unpii::scan_file("customers.xlsx")?;
/// println!("{} entities", report.counts.total());
/// # Ok::<(), unpii::Error>(())
/// ```
pub fn scan_file<P: AsRef<Path>>(path: P) -> Result<ScanReport> {
    let doc = Document::open(path)?;
    Ok(Pipeline::new(PipelineOptions::default())?.scan_document(&doc))
}

/// Mask a file with the default pipeline.
///
/// # Example
///
/// ```no_run
/// let masked = unpii::mask_file("customers.csv")?;
/// std::fs::write(&masked.name, masked.as_bytes())?;
/// # Ok::<(), unpii::Error>(())
/// ```
pub fn mask_file<P: AsRef<Path>>(path: P) -> Result<MaskedOutput> {
    let doc = Document::open(path)?;
    Pipeline::new(PipelineOptions::default())?.mask_document(&doc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mask_text_default_pipeline() {
        let masked = mask_text("주민번호 900101-1234567").unwrap();
        assert_eq!(masked, "주민번호 900101-*******");
    }

    #[test]
    fn test_scan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memo.txt");
        std::fs::write(&path, "카드 1234-5678-9012-3456").unwrap();

        let report = scan_file(&path).unwrap();
        assert_eq!(report.name, "memo.txt");
        assert_eq!(report.counts.get(EntityLabel::CardNumber), 1);
    }

    #[test]
    fn test_scan_file_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.hwp");
        std::fs::write(&path, b"HWP Document File").unwrap();

        assert!(matches!(scan_file(&path), Err(Error::UnsupportedFormat(_))));
    }
}
