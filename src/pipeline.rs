//! The detection-and-redaction pipeline.
//!
//! A [`Pipeline`] owns one masking engine, one extractor registry and one
//! spatial redactor, and runs documents through them:
//!
//! - [`scan_document`](Pipeline::scan_document) extracts and counts,
//!   never failing: problems are reported on the [`ScanReport`];
//! - [`mask_document`](Pipeline::mask_document) produces a masked copy
//!   or an error, unmaskable errors included;
//! - [`process_batch`](Pipeline::process_batch) does both for many
//!   independent documents, in parallel when enabled;
//! - [`scan_message`](Pipeline::scan_message) checks a whole outgoing
//!   message (subject, body and attachments).
//!
//! Every processed document yields an [`AuditRecord`].
//!
//! # Example
//!
//! ```no_run
//! use unpii::{Document, Pipeline, PipelineOptions};
//!
//! fn main() -> unpii::Result<()> {
//!     let pipeline = Pipeline::new(PipelineOptions::new().with_model_dir("models/ner"))?;
//!     let doc = Document::open("customers.xlsx")?;
//!
//!     let report = pipeline.scan_document(&doc);
//!     if report.contains_pii() {
//!         let masked = pipeline.mask_document(&doc)?;
//!         std::fs::write(&masked.name, masked.as_bytes())?;
//!     }
//!     Ok(())
//! }
//! ```

use std::sync::Arc;
use std::thread;

use crossbeam_channel::RecvTimeoutError;
use log::{debug, info, warn};
use rayon::prelude::*;

use crate::audit::{AuditRecord, AuditSink, NullAuditSink};
use crate::error::{Error, Result, Stage};
use crate::extract::{normalize, ExtractorRegistry};
use crate::mask::{Analysis, MaskingEngine};
use crate::model::{Document, MaskedOutput, ScanReport, ScanStatus, ScanSummary};
use crate::ner::Tagger;
use crate::ocr::OcrEngine;
use crate::options::{FailurePolicy, PipelineOptions};
use crate::pdf::{EmbeddedImageRasterizer, PageRasterizer};
use crate::redact::{mask_text_document, SpatialRedactor};
use crate::settings::{Policy, PolicyViolation, Settings};

/// Name used in reports for inline text.
pub const INLINE_TEXT_NAME: &str = "(text)";

/// Name used in reports for a message body.
pub const MESSAGE_BODY_NAME: &str = "(body)";

/// Scanning and masking over shared, read-only components.
///
/// Cloning is cheap; clones share the tagger, OCR engine and audit sink.
#[derive(Clone)]
pub struct Pipeline {
    options: PipelineOptions,
    engine: MaskingEngine,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
    registry: Arc<ExtractorRegistry>,
    redactor: Arc<SpatialRedactor>,
    policy: Policy,
    audit: Arc<dyn AuditSink>,
    user: Option<String>,
}

impl Pipeline {
    /// Pipeline over the process-wide tagger.
    ///
    /// The tagger is loaded on first use; without a model the pipeline
    /// runs regex-only unless `require_model` is set, in which case this
    /// fails with [`Error::ModelUnavailable`].
    pub fn new(options: PipelineOptions) -> Result<Self> {
        let tagger = Tagger::global(&options.tagger_config());
        if options.require_model && !tagger.is_available() {
            return Err(Error::ModelUnavailable(
                tagger
                    .unavailable_reason()
                    .unwrap_or("model not loaded")
                    .to_string(),
            ));
        }
        Ok(Self::with_engine(MaskingEngine::new(tagger), options))
    }

    /// Pipeline over an existing engine.
    pub fn with_engine(engine: MaskingEngine, options: PipelineOptions) -> Self {
        let ocr: Arc<dyn OcrEngine> = Arc::new(options.tesseract_ocr());
        let rasterizer: Arc<dyn PageRasterizer> = Arc::new(EmbeddedImageRasterizer);
        let mut pipeline = Self {
            registry: Arc::new(ExtractorRegistry::new()),
            redactor: Arc::new(SpatialRedactor::new(engine.clone(), ocr.clone())),
            options,
            engine,
            ocr,
            rasterizer,
            policy: Policy::default(),
            audit: Arc::new(NullAuditSink),
            user: None,
        };
        pipeline.rebuild();
        pipeline
    }

    /// Apply custom patterns, sensitive terms and policy from settings.
    pub fn with_settings(mut self, settings: &Settings) -> Result<Self> {
        self.engine = self
            .engine
            .clone()
            .with_detector(settings.detector()?)
            .with_keywords(settings.keywords()?);
        self.policy = settings.policy.clone();
        self.rebuild();
        Ok(self)
    }

    /// Use a different OCR engine.
    pub fn with_ocr(mut self, ocr: Arc<dyn OcrEngine>) -> Self {
        self.ocr = ocr;
        self.rebuild();
        self
    }

    /// Use a different page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self.rebuild();
        self
    }

    /// Send audit records to `sink`.
    pub fn with_audit_sink(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = sink;
        self
    }

    /// Record `user` as the acting user in audit records.
    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    fn rebuild(&mut self) {
        self.registry = Arc::new(ExtractorRegistry::with_rasterizer(
            self.ocr.clone(),
            self.rasterizer.clone(),
            self.options.dpi,
        ));
        self.redactor = Arc::new(
            SpatialRedactor::new(self.engine.clone(), self.ocr.clone())
                .with_rasterizer(self.rasterizer.clone())
                .with_dpi(self.options.dpi)
                .with_text_threshold(self.options.text_threshold),
        );
    }

    /// Options in use.
    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    /// Masking engine in use.
    pub fn engine(&self) -> &MaskingEngine {
        &self.engine
    }

    /// Spatial redactor in use.
    pub fn redactor(&self) -> &SpatialRedactor {
        &self.redactor
    }

    /// Submission policy in use.
    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    /// Scan inline text.
    pub fn scan_text(&self, text: &str) -> ScanReport {
        let text = normalize(text);
        let mut report = ScanReport::new(INLINE_TEXT_NAME);
        report.size = text.len();
        report.content_type = "text/plain".to_string();
        apply_analysis(&mut report, self.engine.analyze(&text));
        report
    }

    /// Mask inline text.
    pub fn mask_text(&self, text: &str) -> String {
        self.engine.mask_text(&normalize(text))
    }

    /// Extract and scan one document.
    ///
    /// Never fails: unsupported formats are [`ScanStatus::Skipped`],
    /// extraction failures and timeouts are [`ScanStatus::Failed`], both
    /// with a warning.
    pub fn scan_document(&self, doc: &Document) -> ScanReport {
        let report = self.scan_unaudited(doc);
        self.record(&report, false);
        report
    }

    fn scan_unaudited(&self, doc: &Document) -> ScanReport {
        let mut report = document_report(doc);
        let this = self.clone();
        let owned = doc.clone();
        let result = self.bounded(Stage::Scan, move || this.analyze_document(&owned));

        match result {
            Ok(analysis) => {
                apply_analysis(&mut report, analysis);
                info!(
                    "{}: {} entities{}",
                    doc.name(),
                    report.counts.total(),
                    if report.tagger_available { "" } else { " (regex only)" }
                );
            }
            Err(e) if e.is_unsupported() => {
                debug!("{}: skipped: {}", doc.name(), e);
                report.status = ScanStatus::Skipped;
                report.warn(e.to_string());
            }
            Err(e) => {
                warn!("{}: scan failed: {}", doc.name(), e);
                report.status = ScanStatus::Failed;
                report.warn(e.to_string());
            }
        }
        report
    }

    fn analyze_document(&self, doc: &Document) -> Result<Analysis> {
        let content = self.registry.extract(doc)?;
        Ok(self.engine.analyze(&content.plain_text()))
    }

    /// Produce the masked copy of one document.
    ///
    /// Spatial formats fail with an unmaskable error (see
    /// [`Error::is_unmaskable`]) when no fully redacted copy could be made;
    /// the caller decides what to do with the original.
    pub fn mask_document(&self, doc: &Document) -> Result<MaskedOutput> {
        let result = self.mask_unaudited(doc);
        let mut report = document_report(doc);
        match &result {
            Ok(output) => report.counts = output.counts.clone(),
            Err(e) => report.warn(e.to_string()),
        }
        self.record(&report, result.is_ok());
        result
    }

    fn mask_unaudited(&self, doc: &Document) -> Result<MaskedOutput> {
        let this = self.clone();
        let owned = doc.clone();
        let result = self.bounded(Stage::Mask, move || this.mask_content(&owned));
        if let Err(e) = &result {
            warn!("{}: masking failed: {}", doc.name(), e);
        }
        result
    }

    fn mask_content(&self, doc: &Document) -> Result<MaskedOutput> {
        if doc.format().is_text_bearing() {
            mask_text_document(doc, &self.engine).map_err(|e| match e {
                Error::Io(_) | Error::UnsupportedFormat(_) | Error::Extraction(_) => e,
                other => Error::Extraction(format!("{}: {}", doc.name(), other)),
            })
        } else {
            self.redactor.redact(doc)
        }
    }

    /// Scan, and optionally mask, independent documents.
    ///
    /// A failing document never stops its siblings. With `mask` set,
    /// every fully scanned document with sensitive content is masked.
    pub fn process_batch(&self, docs: &[Document], mask: bool) -> BatchReport {
        let process = |doc: &Document| {
            let report = self.scan_unaudited(doc);
            let outcome = if mask && report.status == ScanStatus::Complete && report.is_sensitive()
            {
                match self.mask_unaudited(doc) {
                    Ok(output) => MaskOutcome::Masked(output),
                    Err(e) => MaskOutcome::Unmaskable(e.to_string()),
                }
            } else {
                MaskOutcome::NotMasked
            };
            let mut audited = report.clone();
            if let MaskOutcome::Unmaskable(reason) = &outcome {
                audited.warn(reason.clone());
            }
            self.record(&audited, outcome.is_masked());
            DocumentResult { report, outcome }
        };

        let results: Vec<DocumentResult> = if self.options.parallel {
            docs.par_iter().map(process).collect()
        } else {
            docs.iter().map(process).collect()
        };

        let reports: Vec<ScanReport> = results.iter().map(|r| r.report.clone()).collect();
        let summary: ScanSummary = reports.iter().collect();
        let violations = self.policy.evaluate(&reports);
        BatchReport {
            results,
            summary,
            violations,
        }
    }

    /// Check an outgoing message.
    ///
    /// Warnings are raised for sensitive terms in the subject, for PII
    /// masked out of the body, for suspicious links in the body, and for
    /// each attachment carrying PII or sensitive terms. Attachments that
    /// could not be masked follow the configured [`FailurePolicy`].
    pub fn scan_message(&self, subject: &str, body: &str, attachments: &[Document]) -> MessageScan {
        let mut warnings = Vec::new();

        let subject_terms = self.engine.keywords().hits(&normalize(subject));
        if !subject_terms.is_empty() {
            warnings.push(format!(
                "subject contains sensitive terms: {}",
                subject_terms.join(", ")
            ));
        }

        let body_text = normalize(body);
        let (masked_body, analysis) = self.engine.mask_and_analyze(&body_text);
        let mut body_report = ScanReport::new(MESSAGE_BODY_NAME);
        body_report.size = body_text.len();
        body_report.content_type = "text/plain".to_string();
        apply_analysis(&mut body_report, analysis);
        if masked_body != body_text {
            warnings.push(format!(
                "body contains personal information ({} items masked)",
                body_report.counts.total()
            ));
        }
        if !body_report.keyword_hits.is_empty() {
            warnings.push(format!(
                "body contains sensitive terms: {}",
                body_report.keyword_hits.join(", ")
            ));
        }
        for url in self.policy.suspicious_urls(&body_text) {
            warnings.push(format!("suspicious link in body: {}", url));
        }

        let batch = self.process_batch(attachments, true);
        let mut outcomes = Vec::with_capacity(attachments.len());
        for (doc, result) in attachments.iter().zip(batch.results) {
            let report = result.report;
            if report.is_sensitive() {
                warnings.push(format!("{}: {}", report.name, describe(&report)));
            }
            let fallback = match self.options.failure_policy {
                FailurePolicy::KeepOriginal => AttachmentContent::Original,
                FailurePolicy::Withhold => AttachmentContent::Withheld,
            };
            let content = match result.outcome {
                MaskOutcome::Masked(output) => AttachmentContent::Masked(output),
                MaskOutcome::Unmaskable(reason) => {
                    warnings.push(format!("{}: could not be masked: {}", report.name, reason));
                    fallback
                }
                // An attachment that was never fully read is not known to be clean.
                MaskOutcome::NotMasked if report.status != ScanStatus::Complete => {
                    let reason = report
                        .warnings
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "scan incomplete".to_string());
                    warnings.push(format!("{}: could not be scanned: {}", report.name, reason));
                    fallback
                }
                MaskOutcome::NotMasked => AttachmentContent::Original,
            };
            outcomes.push(AttachmentOutcome {
                name: doc.name().to_string(),
                report,
                content,
            });
        }

        MessageScan {
            warnings,
            masked_body,
            body: body_report,
            summary: batch.summary,
            attachments: outcomes,
            violations: batch.violations,
        }
    }

    /// Run `work` within the per-document timeout, if one is set.
    ///
    /// On timeout the worker thread is left to finish on its own; its
    /// result is dropped.
    fn bounded<T, F>(&self, stage: Stage, work: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T> + Send + 'static,
    {
        let Some(limit) = self.options.timeout else {
            return work();
        };

        let (tx, rx) = crossbeam_channel::bounded(1);
        thread::Builder::new()
            .name(format!("unpii-{}", stage))
            .spawn(move || {
                let _ = tx.send(work());
            })?;

        match rx.recv_timeout(limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::Timeout {
                stage,
                after: limit,
            }),
            Err(RecvTimeoutError::Disconnected) => {
                let message = format!("{} worker stopped without a result", stage);
                Err(match stage {
                    Stage::Scan => Error::Extraction(message),
                    Stage::Mask => Error::Redaction(message),
                })
            }
        }
    }

    fn record(&self, report: &ScanReport, masked: bool) {
        let record = AuditRecord::from_report(report, self.user.as_deref(), masked);
        if let Err(e) = self.audit.record(&record) {
            warn!("audit record for {} not written: {}", report.name, e);
        }
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("options", &self.options)
            .field("tagger", self.engine.tagger())
            .field("ocr", &self.ocr.name())
            .field("rasterizer", &self.rasterizer.name())
            .finish()
    }
}

/// What happened to one document's masked copy.
#[derive(Debug, Clone)]
pub enum MaskOutcome {
    /// Not masked: not requested, nothing sensitive, or scan incomplete
    NotMasked,
    /// Masked copy produced
    Masked(MaskedOutput),
    /// No masked copy could be produced
    Unmaskable(String),
}

impl MaskOutcome {
    /// Whether a masked copy was produced.
    pub fn is_masked(&self) -> bool {
        matches!(self, MaskOutcome::Masked(_))
    }
}

/// Scan report and masking outcome for one batch document.
#[derive(Debug, Clone)]
pub struct DocumentResult {
    pub report: ScanReport,
    pub outcome: MaskOutcome,
}

/// Result of [`Pipeline::process_batch`].
#[derive(Debug, Clone)]
pub struct BatchReport {
    /// Per-document results, in input order
    pub results: Vec<DocumentResult>,
    /// Counts summed over the batch
    pub summary: ScanSummary,
    /// Policy rules the batch breaks
    pub violations: Vec<PolicyViolation>,
}

impl BatchReport {
    /// Whether any document contained PII.
    pub fn contains_pii(&self) -> bool {
        self.summary.contains_pii()
    }

    /// Whether any policy rule blocks the submission.
    pub fn is_blocked(&self) -> bool {
        self.violations
            .iter()
            .any(|v| v.severity == crate::settings::Severity::Block)
    }
}

/// What to send in place of an attachment.
#[derive(Debug, Clone)]
pub enum AttachmentContent {
    /// The attachment as submitted
    Original,
    /// The masked copy
    Masked(MaskedOutput),
    /// Nothing; the attachment is withheld
    Withheld,
}

/// One attachment of a scanned message.
#[derive(Debug, Clone)]
pub struct AttachmentOutcome {
    pub name: String,
    pub report: ScanReport,
    pub content: AttachmentContent,
}

/// Result of [`Pipeline::scan_message`].
#[derive(Debug, Clone)]
pub struct MessageScan {
    /// Human-readable warnings, in the order found
    pub warnings: Vec<String>,
    /// Body with PII masked
    pub masked_body: String,
    /// Scan report for the body
    pub body: ScanReport,
    /// Counts over the attachments
    pub summary: ScanSummary,
    /// Per-attachment outcomes, in input order
    pub attachments: Vec<AttachmentOutcome>,
    /// Policy rules the attachments break
    pub violations: Vec<PolicyViolation>,
}

impl MessageScan {
    /// Whether the message can go out as is.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty() && self.violations.is_empty()
    }
}

fn document_report(doc: &Document) -> ScanReport {
    let mut report = ScanReport::new(doc.name());
    report.format = Some(doc.format());
    report.size = doc.size();
    report.content_type = doc.content_type().to_string();
    report
}

fn apply_analysis(report: &mut ScanReport, analysis: Analysis) {
    report.counts = analysis.counts;
    report.custom_counts = analysis.custom_counts;
    report.keyword_hits = analysis.keyword_hits;
    report.tagger_available = analysis.tagger_used;
    report.warnings.extend(analysis.warnings);
}

fn describe(report: &ScanReport) -> String {
    let mut parts: Vec<String> = report
        .counts
        .iter()
        .map(|(label, count)| format!("{} {}", label.display_name(), count))
        .collect();
    parts.extend(
        report
            .custom_counts
            .iter()
            .map(|(name, count)| format!("{} {}", name, count)),
    );
    if !report.keyword_hits.is_empty() {
        parts.push(format!("terms: {}", report.keyword_hits.join(", ")));
    }
    parts.join(", ")
}

/// Report for a file that could not even be read as a document.
pub fn skipped_report(name: &str, size: usize, reason: &Error) -> ScanReport {
    let mut report = ScanReport::new(name);
    report.size = size;
    report.status = if reason.is_unsupported() {
        ScanStatus::Skipped
    } else {
        ScanStatus::Failed
    };
    report.warn(reason.to_string());
    report
}
