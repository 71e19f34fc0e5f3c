//! Document format detection.
//!
//! Every supported format is one variant of [`DocumentFormat`]; the
//! extractor and masking registries dispatch on the variant, never on
//! raw file-name suffixes.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Formats the pipeline knows how to scan and mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    /// Plain text (`.txt`)
    Text,
    /// Delimited text (`.csv`)
    Csv,
    /// Spreadsheet (`.xlsx`)
    Xlsx,
    /// Word-processing document (`.docx`)
    Docx,
    /// PDF, digital or scanned
    Pdf,
    /// PNG raster image
    Png,
    /// JPEG raster image
    Jpeg,
}

/// PDF magic bytes: %PDF-
const PDF_MAGIC: &[u8] = b"%PDF-";
const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
const JPEG_MAGIC: &[u8] = b"\xff\xd8\xff";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

impl DocumentFormat {
    /// All supported formats.
    pub const ALL: [DocumentFormat; 7] = [
        DocumentFormat::Text,
        DocumentFormat::Csv,
        DocumentFormat::Xlsx,
        DocumentFormat::Docx,
        DocumentFormat::Pdf,
        DocumentFormat::Png,
        DocumentFormat::Jpeg,
    ];

    /// Map a lowercase-insensitive extension (without the dot) to a format.
    pub fn from_extension(ext: &str) -> Result<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(DocumentFormat::Text),
            "csv" => Ok(DocumentFormat::Csv),
            "xlsx" => Ok(DocumentFormat::Xlsx),
            "docx" => Ok(DocumentFormat::Docx),
            "pdf" => Ok(DocumentFormat::Pdf),
            "png" => Ok(DocumentFormat::Png),
            "jpg" | "jpeg" => Ok(DocumentFormat::Jpeg),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Map a display name such as `report.PDF` to a format.
    pub fn from_name(name: &str) -> Result<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| Error::UnsupportedFormat(format!("{} has no extension", name)))?;
        Self::from_extension(ext)
    }

    /// Map a MIME type to a format.
    pub fn from_mime(mime: &str) -> Result<Self> {
        let essence = mime.split(';').next().unwrap_or("").trim().to_ascii_lowercase();
        match essence.as_str() {
            "text/plain" => Ok(DocumentFormat::Text),
            "text/csv" => Ok(DocumentFormat::Csv),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet" => {
                Ok(DocumentFormat::Xlsx)
            }
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document" => {
                Ok(DocumentFormat::Docx)
            }
            "application/pdf" => Ok(DocumentFormat::Pdf),
            "image/png" => Ok(DocumentFormat::Png),
            "image/jpeg" | "image/jpg" => Ok(DocumentFormat::Jpeg),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }

    /// Guess a format from leading bytes.
    ///
    /// Only binary formats carry magic bytes; zip containers are not
    /// distinguishable here and yield `None`.
    pub fn sniff(data: &[u8]) -> Option<Self> {
        if data.starts_with(PDF_MAGIC) {
            Some(DocumentFormat::Pdf)
        } else if data.starts_with(PNG_MAGIC) {
            Some(DocumentFormat::Png)
        } else if data.starts_with(JPEG_MAGIC) {
            Some(DocumentFormat::Jpeg)
        } else {
            None
        }
    }

    /// Canonical MIME type.
    pub fn mime_type(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "text/plain",
            DocumentFormat::Csv => "text/csv",
            DocumentFormat::Xlsx => {
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
            }
            DocumentFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            DocumentFormat::Pdf => "application/pdf",
            DocumentFormat::Png => "image/png",
            DocumentFormat::Jpeg => "image/jpeg",
        }
    }

    /// Whether the content is recovered as plain text (no geometry).
    pub fn is_text_bearing(&self) -> bool {
        matches!(
            self,
            DocumentFormat::Text | DocumentFormat::Csv | DocumentFormat::Xlsx | DocumentFormat::Docx
        )
    }

    /// Whether the format is a raster image.
    pub fn is_image(&self) -> bool {
        matches!(self, DocumentFormat::Png | DocumentFormat::Jpeg)
    }

    /// Whether the format is a zip container.
    pub fn is_zip(&self) -> bool {
        matches!(self, DocumentFormat::Xlsx | DocumentFormat::Docx)
    }
}

impl std::fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DocumentFormat::Text => "txt",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Xlsx => "xlsx",
            DocumentFormat::Docx => "docx",
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Png => "png",
            DocumentFormat::Jpeg => "jpeg",
        };
        write!(f, "{}", name)
    }
}

/// Check that the bytes agree with the declared format.
///
/// Binary formats must carry their magic bytes; zip-based formats must
/// be zip archives. Text formats are accepted as-is.
pub fn verify_format(format: DocumentFormat, data: &[u8]) -> Result<()> {
    let ok = match format {
        DocumentFormat::Pdf => data.starts_with(PDF_MAGIC),
        DocumentFormat::Png => data.starts_with(PNG_MAGIC),
        DocumentFormat::Jpeg => data.starts_with(JPEG_MAGIC),
        DocumentFormat::Xlsx | DocumentFormat::Docx => data.starts_with(ZIP_MAGIC),
        DocumentFormat::Text | DocumentFormat::Csv => true,
    };
    if ok {
        Ok(())
    } else {
        Err(Error::Extraction(format!(
            "content does not look like {}",
            format
        )))
    }
}
