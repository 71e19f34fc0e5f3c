//! Format extraction.
//!
//! Each supported [`DocumentFormat`] has exactly one registered
//! [`Extractor`]. Text-bearing formats produce flat text; images, and
//! PDFs without a text layer, produce pages of OCR tokens.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use unpii::extract::ExtractorRegistry;
//! use unpii::ocr::TesseractOcr;
//! use unpii::Document;
//!
//! fn main() -> unpii::Result<()> {
//!     let registry = ExtractorRegistry::with_defaults(Arc::new(TesseractOcr::new()), 250);
//!     let doc = Document::open("report.docx")?;
//!     let content = registry.extract(&doc)?;
//!     println!("{}", content.plain_text());
//!     Ok(())
//! }
//! ```

mod ocr_image;
mod office;
pub(crate) mod ooxml;
mod pdf;
mod text;

pub use ocr_image::ImageExtractor;
pub use office::{DocxExtractor, XlsxExtractor};
pub use pdf::PdfExtractor;
pub use text::{decode_text, normalize, read_csv, CsvExtractor, TextExtractor, CELL_SEPARATOR};

pub(crate) use ocr_image::recognize_page;

use crate::detect::{verify_format, DocumentFormat};
use crate::error::{Error, Result};
use crate::model::{Document, ExtractedContent};
use crate::ocr::OcrEngine;
use crate::pdf::{EmbeddedImageRasterizer, PageRasterizer, DEFAULT_DPI};
use std::collections::HashMap;
use std::sync::Arc;

/// Turns one kind of document into [`ExtractedContent`].
///
/// Implement this trait to support a new format.
pub trait Extractor: Send + Sync {
    /// Formats this extractor handles.
    fn formats(&self) -> &[DocumentFormat];

    /// Name of this extractor.
    fn name(&self) -> &str;

    /// Extract the document's content.
    fn extract(&self, doc: &Document) -> Result<ExtractedContent>;

    /// Check if this extractor handles the given format.
    fn supports(&self, format: DocumentFormat) -> bool {
        self.formats().contains(&format)
    }
}

/// Registry of extractors keyed by format.
pub struct ExtractorRegistry {
    by_format: HashMap<DocumentFormat, Arc<dyn Extractor>>,
    by_name: HashMap<String, Arc<dyn Extractor>>,
}

impl ExtractorRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self {
            by_format: HashMap::new(),
            by_name: HashMap::new(),
        }
    }

    /// Registry covering every [`DocumentFormat`].
    ///
    /// PDF pages are rasterized at `dpi` when they carry no text.
    pub fn with_defaults(ocr: Arc<dyn OcrEngine>, dpi: u32) -> Self {
        Self::with_rasterizer(ocr, Arc::new(EmbeddedImageRasterizer), dpi)
    }

    /// Like [`with_defaults`](Self::with_defaults) with a custom rasterizer.
    pub fn with_rasterizer(
        ocr: Arc<dyn OcrEngine>,
        rasterizer: Arc<dyn PageRasterizer>,
        dpi: u32,
    ) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(TextExtractor));
        registry.register(Arc::new(CsvExtractor));
        registry.register(Arc::new(XlsxExtractor));
        registry.register(Arc::new(DocxExtractor));
        registry.register(Arc::new(PdfExtractor::new(ocr.clone(), rasterizer, dpi)));
        registry.register(Arc::new(ImageExtractor::new(ocr)));
        registry
    }

    /// Register an extractor for all its formats, replacing earlier ones.
    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        for format in extractor.formats() {
            self.by_format.insert(*format, extractor.clone());
        }
        self.by_name
            .insert(extractor.name().to_lowercase(), extractor);
    }

    /// Get the extractor for a format.
    pub fn get(&self, format: DocumentFormat) -> Option<Arc<dyn Extractor>> {
        self.by_format.get(&format).cloned()
    }

    /// Get an extractor by name.
    pub fn get_by_name(&self, name: &str) -> Option<Arc<dyn Extractor>> {
        self.by_name.get(&name.to_lowercase()).cloned()
    }

    /// Check if a format is supported.
    pub fn supports(&self, format: DocumentFormat) -> bool {
        self.by_format.contains_key(&format)
    }

    /// Extract a document with the extractor for its declared format.
    pub fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let extractor = self
            .get(doc.format())
            .ok_or_else(|| Error::UnsupportedFormat(doc.format().to_string()))?;
        verify_format(doc.format(), doc.data())?;
        log::debug!("extracting {} with {}", doc.name(), extractor.name());
        extractor.extract(doc).map_err(|e| match e {
            Error::Io(_) | Error::Timeout { .. } | Error::UnsupportedFormat(_) => e,
            Error::Extraction(_) => e,
            other => Error::Extraction(format!("{}: {}", doc.name(), other)),
        })
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults(Arc::new(crate::ocr::TesseractOcr::new()), DEFAULT_DPI)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OcrToken;
    use image::RgbImage;

    struct NoOcr;

    impl OcrEngine for NoOcr {
        fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrToken>> {
            Ok(Vec::new())
        }
    }

    fn registry() -> ExtractorRegistry {
        ExtractorRegistry::with_defaults(Arc::new(NoOcr), 72)
    }

    #[test]
    fn test_every_format_has_one_extractor() {
        let registry = registry();
        for format in DocumentFormat::ALL {
            assert!(registry.supports(format), "{}", format);
        }
        assert_eq!(registry.get(DocumentFormat::Png).unwrap().name(), "image");
        assert_eq!(registry.get(DocumentFormat::Jpeg).unwrap().name(), "image");
        assert!(registry.get_by_name("PDF").is_some());
    }

    #[test]
    fn test_empty_registry_unsupported() {
        let registry = ExtractorRegistry::new();
        let doc = Document::new("a.txt", b"hello".to_vec()).unwrap();
        assert!(matches!(
            registry.extract(&doc),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_text_extraction() {
        let doc = Document::new("a.txt", "연락처 010-1234-5678".as_bytes().to_vec()).unwrap();
        let content = registry().extract(&doc).unwrap();
        assert_eq!(content, ExtractedContent::text("연락처 010-1234-5678"));
    }

    #[test]
    fn test_mismatched_bytes_fail_extraction() {
        let doc = Document::new("a.pdf", b"not a pdf".to_vec()).unwrap();
        assert!(matches!(registry().extract(&doc), Err(Error::Extraction(_))));
    }
}
