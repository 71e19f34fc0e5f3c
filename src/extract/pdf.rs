//! PDF documents: digital text first, OCR when there is none.

use std::sync::Arc;

use log::{debug, info};

use super::ocr_image::recognize_page;
use super::text::normalize;
use super::Extractor;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Document, ExtractedContent, TokenPage};
use crate::ocr::OcrEngine;
use crate::pdf::{page_texts, PageRasterizer, PdfDocument};

/// Extracts PDF text, falling back to rasterize-and-recognize.
pub struct PdfExtractor {
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
    dpi: u32,
}

impl PdfExtractor {
    /// Create an extractor that rasterizes at `dpi` for OCR.
    pub fn new(ocr: Arc<dyn OcrEngine>, rasterizer: Arc<dyn PageRasterizer>, dpi: u32) -> Self {
        Self {
            ocr,
            rasterizer,
            dpi,
        }
    }
}

impl Extractor for PdfExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Pdf]
    }

    fn name(&self) -> &str {
        "pdf"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let pdf = PdfDocument::load_bytes(doc.data())?;
        let texts = page_texts(&pdf)?;
        let joined = texts.join("\n");
        if !joined.trim().is_empty() {
            debug!("{}: {} pages of digital text", doc.name(), texts.len());
            return Ok(ExtractedContent::text(normalize(&joined)));
        }

        info!(
            "{}: no digital text, recognizing {} pages at {} dpi",
            doc.name(),
            pdf.page_count(),
            self.dpi
        );
        let mut pages = Vec::with_capacity(pdf.page_count());
        for (number, page) in pdf.pages() {
            let raster = self.rasterizer.rasterize(&pdf, page, self.dpi)?;
            let tokens = recognize_page(self.ocr.as_ref(), &raster)?;
            pages.push(TokenPage { number, tokens });
        }
        Ok(ExtractedContent::pages(pages))
    }
}
