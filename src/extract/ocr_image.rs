//! Raster images: always OCR.

use std::sync::Arc;

use image::RgbImage;

use super::text::normalize;
use super::Extractor;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Document, ExtractedContent, OcrToken, TokenPage};
use crate::ocr::OcrEngine;

/// Recognizes the words of a PNG or JPEG image.
pub struct ImageExtractor {
    ocr: Arc<dyn OcrEngine>,
}

impl ImageExtractor {
    /// Create an extractor backed by `ocr`.
    pub fn new(ocr: Arc<dyn OcrEngine>) -> Self {
        Self { ocr }
    }
}

impl Extractor for ImageExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Png, DocumentFormat::Jpeg]
    }

    fn name(&self) -> &str {
        "image"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let image = image::load_from_memory(doc.data())?.to_rgb8();
        let tokens = recognize_page(self.ocr.as_ref(), &image)?;
        Ok(ExtractedContent::pages(vec![TokenPage { number: 1, tokens }]))
    }
}

/// Run OCR on one raster and normalize the recognized words.
pub(crate) fn recognize_page(ocr: &dyn OcrEngine, image: &RgbImage) -> Result<Vec<OcrToken>> {
    let mut tokens = ocr.recognize(image)?;
    for token in &mut tokens {
        token.text = normalize(&token.text);
    }
    tokens.retain(|t| !t.text.trim().is_empty());
    Ok(tokens)
}
