//! Pipeline options and configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::ner::TaggerConfig;
use crate::ocr::{TesseractOcr, DEFAULT_LANGUAGE};
use crate::pdf::DEFAULT_DPI;
use crate::redact::DEFAULT_TEXT_THRESHOLD;

/// Options for building a [`Pipeline`](crate::pipeline::Pipeline).
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Directory holding the tagger model (none = regex-only)
    pub model_dir: Option<PathBuf>,

    /// Fail instead of falling back to regex-only detection
    pub require_model: bool,

    /// Tagger maximum sequence length, special tokens included
    pub max_seq_len: usize,

    /// Tag long inputs window by window instead of truncating them
    pub windowing: bool,

    /// OCR language string passed to tesseract
    pub ocr_language: String,

    /// Path of the tesseract binary (none = look it up on `PATH`)
    pub tesseract: Option<PathBuf>,

    /// Rasterization resolution for OCR
    pub dpi: u32,

    /// Character count above which a PDF is digital
    pub text_threshold: usize,

    /// Per-document budget for scanning and for masking (none = unbounded)
    pub timeout: Option<Duration>,

    /// Process batch documents in parallel
    pub parallel: bool,

    /// What to hand back when a message attachment cannot be masked
    pub failure_policy: FailurePolicy,
}

impl PipelineOptions {
    /// Create new options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model directory.
    pub fn with_model_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.model_dir = Some(dir.into());
        self
    }

    /// Require the tagger model to load.
    pub fn require_model(mut self, require: bool) -> Self {
        self.require_model = require;
        self
    }

    /// Set the tagger maximum sequence length.
    pub fn with_max_seq_len(mut self, len: usize) -> Self {
        self.max_seq_len = len;
        self
    }

    /// Enable or disable windowed tagging of long inputs.
    pub fn with_windowing(mut self, windowing: bool) -> Self {
        self.windowing = windowing;
        self
    }

    /// Set the OCR language string.
    pub fn with_ocr_language(mut self, language: impl Into<String>) -> Self {
        self.ocr_language = language.into();
        self
    }

    /// Set the tesseract binary.
    pub fn with_tesseract(mut self, binary: impl Into<PathBuf>) -> Self {
        self.tesseract = Some(binary.into());
        self
    }

    /// Set the rasterization DPI.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Set the digital-PDF text threshold.
    pub fn with_text_threshold(mut self, threshold: usize) -> Self {
        self.text_threshold = threshold;
        self
    }

    /// Bound every document's scan and mask by `timeout`.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Enable or disable parallel batch processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Process batches one document at a time.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the unmaskable-attachment policy.
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    /// Tagger configuration derived from these options.
    pub fn tagger_config(&self) -> TaggerConfig {
        TaggerConfig {
            model_dir: self.model_dir.clone(),
            max_seq_len: self.max_seq_len,
            windowing: self.windowing,
            ..TaggerConfig::default()
        }
    }

    /// OCR engine configured by these options.
    pub fn tesseract_ocr(&self) -> TesseractOcr {
        let ocr = TesseractOcr::new()
            .with_language(self.ocr_language.clone())
            .with_dpi(self.dpi);
        match &self.tesseract {
            Some(binary) => ocr.with_binary(binary.clone()),
            None => ocr,
        }
    }
}

impl Default for PipelineOptions {
    fn default() -> Self {
        let tagger = TaggerConfig::default();
        Self {
            model_dir: None,
            require_model: false,
            max_seq_len: tagger.max_seq_len,
            windowing: tagger.windowing,
            ocr_language: DEFAULT_LANGUAGE.to_string(),
            tesseract: None,
            dpi: DEFAULT_DPI,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
            timeout: None,
            parallel: true,
            failure_policy: FailurePolicy::KeepOriginal,
        }
    }
}

/// What a caller gets back for an attachment that could not be masked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Pass the original attachment through
    #[default]
    KeepOriginal,
    /// Drop the attachment
    Withhold,
}
