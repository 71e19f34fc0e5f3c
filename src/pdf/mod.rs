//! PDF access for extraction and spatial redaction.
//!
//! Built on `lopdf`. The content walker recovers text with glyph
//! geometry; the redactor rewrites content streams to remove text; the
//! rasterizer and writer handle the image-only (scanned) path.

mod backend;
mod content;
mod raster;
mod redaction;
mod writer;

pub use backend::{decode_text_simple, FontMetrics, PageId, PdfDocument};
pub use content::{Glyph, ImagePlacement, Matrix, PageContent, PageText, Rect, TextRun};
pub use raster::{
    decode_image, EmbeddedImageRasterizer, PageRasterizer, DEFAULT_DPI, POINTS_PER_INCH,
};
pub use redaction::{fill_rect, redact_page};
pub use writer::{images_to_pdf, RasterPage};

/// Text of every page, in page order.
pub fn page_texts(pdf: &PdfDocument) -> crate::error::Result<Vec<String>> {
    let mut texts = Vec::with_capacity(pdf.page_count());
    for (number, page) in pdf.pages() {
        let content = PageContent::parse(pdf, page).map_err(|e| {
            log::warn!("page {}: {}", number, e);
            e
        })?;
        texts.push(content.text().text);
    }
    Ok(texts)
}
