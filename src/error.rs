//! Error types for unpii library.

use std::io;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for unpii operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while scanning or masking documents.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error when reading or writing files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The declared format is not one the pipeline handles.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// A format-specific parser failed on this document.
    #[error("Extraction failed: {0}")]
    Extraction(String),

    /// The tagger model could not be located or loaded.
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// Model inference failed on a loaded model.
    #[error("Inference error: {0}")]
    Inference(String),

    /// The spatial redactor could not produce a redacted document.
    #[error("Redaction failed: {0}")]
    Redaction(String),

    /// A slow stage exceeded the per-document budget.
    #[error("{stage} timed out after {after:?}")]
    Timeout {
        /// Pipeline stage that was running
        stage: Stage,
        /// Budget that was exceeded
        after: Duration,
    },

    /// Optical character recognition failed or is not installed.
    #[error("OCR error: {0}")]
    Ocr(String),

    /// Error reading or writing PDF structure.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// Error decoding or encoding a raster image.
    #[error("Image error: {0}")]
    Image(String),

    /// Error reading or writing a zip container (docx, xlsx).
    #[error("Archive error: {0}")]
    Archive(String),

    /// Malformed XML inside an office document.
    #[error("XML error: {0}")]
    Xml(String),

    /// Text could not be decoded with any supported encoding.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Invalid settings or options.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Pipeline stage, used to classify timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Scanning (extraction, tagging, counting)
    Scan,
    /// Masking or spatial redaction
    Mask,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Scan => write!(f, "scan"),
            Stage::Mask => write!(f, "mask"),
        }
    }
}

impl Error {
    /// Whether this error means "no redacted output could be produced".
    ///
    /// Callers treat these as unmaskable and apply their own fallback.
    pub fn is_unmaskable(&self) -> bool {
        matches!(
            self,
            Error::Redaction(_)
                | Error::Ocr(_)
                | Error::Pdf(_)
                | Error::Image(_)
                | Error::Timeout {
                    stage: Stage::Mask,
                    ..
                }
        )
    }

    /// Whether the document was skipped rather than failed.
    pub fn is_unsupported(&self) -> bool {
        matches!(self, Error::UnsupportedFormat(_))
    }
}

impl From<lopdf::Error> for Error {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => Error::Io(e),
            _ => Error::Pdf(err.to_string()),
        }
    }
}

impl From<image::ImageError> for Error {
    fn from(err: image::ImageError) -> Self {
        Error::Image(err.to_string())
    }
}

impl From<zip::result::ZipError> for Error {
    fn from(err: zip::result::ZipError) -> Self {
        Error::Archive(err.to_string())
    }
}

impl From<quick_xml::Error> for Error {
    fn from(err: quick_xml::Error) -> Self {
        Error::Xml(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Extraction(format!("csv: {}", err))
    }
}

impl From<calamine::XlsxError> for Error {
    fn from(err: calamine::XlsxError) -> Self {
        Error::Extraction(format!("xlsx: {}", err))
    }
}

impl From<regex::Error> for Error {
    fn from(err: regex::Error) -> Self {
        Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::UnsupportedFormat("hwp".to_string());
        assert_eq!(err.to_string(), "Unsupported format: hwp");

        let err = Error::Timeout {
            stage: Stage::Mask,
            after: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "mask timed out after 3s");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = io::Error::new(io::ErrorKind::NotFound, "file not found");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_unmaskable_classes() {
        assert!(Error::Redaction("x".into()).is_unmaskable());
        assert!(Error::Ocr("missing".into()).is_unmaskable());
        assert!(Error::Timeout {
            stage: Stage::Mask,
            after: Duration::from_secs(1)
        }
        .is_unmaskable());
        assert!(!Error::Timeout {
            stage: Stage::Scan,
            after: Duration::from_secs(1)
        }
        .is_unmaskable());
        assert!(!Error::UnsupportedFormat("hwp".into()).is_unmaskable());
        assert!(Error::UnsupportedFormat("hwp".into()).is_unsupported());
    }
}
