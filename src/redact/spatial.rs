//! Redaction of PDFs and images by painting over what was found.
//!
//! Digital PDFs have the sensitive glyphs cut out of their content
//! streams and covered with black boxes, then are re-read to prove the
//! text is gone. Scanned PDFs and images are rasterized, recognized and
//! blacked out token by token; scanned PDFs are reassembled from the
//! redacted rasters at their original page sizes.

use std::collections::BTreeSet;
use std::io::Cursor;
use std::ops::Range;
use std::sync::Arc;

use image::{DynamicImage, ImageFormat, RgbImage};
use log::{debug, info, warn};

use super::draw::black_out;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::extract::recognize_page;
use crate::mask::{Analysis, MaskingEngine};
use crate::model::{CategoryCounts, Document, MaskedOutput, MaskedPayload, OcrToken};
use crate::ocr::OcrEngine;
use crate::pdf::{
    images_to_pdf, redact_page, EmbeddedImageRasterizer, PageContent, PageRasterizer,
    PdfDocument, RasterPage, DEFAULT_DPI,
};

/// A PDF whose extractable text exceeds this many characters is digital.
pub const DEFAULT_TEXT_THRESHOLD: usize = 100;

/// Pixels added around each blacked-out token.
const TOKEN_PADDING: u32 = 2;

/// How a PDF carries its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfKind {
    /// Text is in the content streams
    Digital,
    /// Pages are images; text has to be recognized
    Scanned,
}

impl std::fmt::Display for PdfKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PdfKind::Digital => write!(f, "digital"),
            PdfKind::Scanned => write!(f, "scanned"),
        }
    }
}

/// Redacts PDFs and raster images.
///
/// Every failure is reported as an unmaskable error (see
/// [`Error::is_unmaskable`]); a partially redacted document is never
/// returned.
pub struct SpatialRedactor {
    engine: MaskingEngine,
    ocr: Arc<dyn OcrEngine>,
    rasterizer: Arc<dyn PageRasterizer>,
    dpi: u32,
    text_threshold: usize,
}

impl SpatialRedactor {
    /// Create a redactor with the default rasterizer and settings.
    pub fn new(engine: MaskingEngine, ocr: Arc<dyn OcrEngine>) -> Self {
        Self {
            engine,
            ocr,
            rasterizer: Arc::new(EmbeddedImageRasterizer),
            dpi: DEFAULT_DPI,
            text_threshold: DEFAULT_TEXT_THRESHOLD,
        }
    }

    /// Use a different page rasterizer.
    pub fn with_rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.rasterizer = rasterizer;
        self
    }

    /// Rasterization resolution for scanned pages.
    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.dpi = dpi.max(1);
        self
    }

    /// Character count above which a PDF is treated as digital.
    pub fn with_text_threshold(mut self, threshold: usize) -> Self {
        self.text_threshold = threshold;
        self
    }

    /// Decide whether a PDF is digital or scanned.
    pub fn classify(&self, pdf: &PdfDocument) -> Result<PdfKind> {
        let mut total = 0usize;
        for page in pdf.pages().values() {
            total += PageContent::parse(pdf, *page)?.char_count();
            if total > self.text_threshold {
                return Ok(PdfKind::Digital);
            }
        }
        Ok(PdfKind::Scanned)
    }

    /// Redact a document of any spatial format.
    pub fn redact(&self, doc: &Document) -> Result<MaskedOutput> {
        match doc.format() {
            DocumentFormat::Pdf => self.redact_pdf(doc),
            DocumentFormat::Png | DocumentFormat::Jpeg => self.redact_image(doc),
            other => Err(Error::UnsupportedFormat(format!(
                "{} has no page geometry",
                other
            ))),
        }
    }

    /// Redact a PDF, choosing the digital or scanned path.
    pub fn redact_pdf(&self, doc: &Document) -> Result<MaskedOutput> {
        let run = || -> Result<(Vec<u8>, CategoryCounts)> {
            let pdf = PdfDocument::load_bytes(doc.data())?;
            let kind = self.classify(&pdf)?;
            info!("{}: {} pdf, {} pages", doc.name(), kind, pdf.page_count());
            match kind {
                PdfKind::Digital => self.redact_digital(pdf),
                PdfKind::Scanned => self.redact_scanned(&pdf),
            }
        };
        let (bytes, counts) = run().map_err(unmaskable)?;
        Ok(output(doc, bytes, counts))
    }

    /// Redact a PNG or JPEG, keeping its format.
    pub fn redact_image(&self, doc: &Document) -> Result<MaskedOutput> {
        let run = || -> Result<(Vec<u8>, CategoryCounts)> {
            let format = match doc.format() {
                DocumentFormat::Jpeg => ImageFormat::Jpeg,
                _ => ImageFormat::Png,
            };
            let mut raster = image::load_from_memory(doc.data())?.to_rgb8();
            let (counts, regions) = self.black_out_tokens(&mut raster)?;
            debug!("{}: {} regions blacked out", doc.name(), regions);

            let mut out = Cursor::new(Vec::new());
            DynamicImage::ImageRgb8(raster).write_to(&mut out, format)?;
            Ok((out.into_inner(), counts))
        };
        let (bytes, counts) = run().map_err(unmaskable)?;
        Ok(output(doc, bytes, counts))
    }

    fn redact_digital(&self, mut pdf: PdfDocument) -> Result<(Vec<u8>, CategoryCounts)> {
        let mut counts = CategoryCounts::new();
        let mut painted = 0usize;

        for (number, page) in pdf.pages() {
            let content = PageContent::parse(&pdf, page)?;
            let page_text = content.text();
            let analysis = self.engine.analyze(&page_text.text);
            counts.merge_sum(&analysis.counts);

            let mut ranges = analysis.sensitive_ranges(true);
            for word in word_ranges(&page_text.text) {
                let covered = ranges.iter().any(|r| overlaps(r, &word));
                if !covered && self.isolated_hit(&page_text.text[word.clone()], &mut counts) {
                    ranges.push(word);
                }
            }

            let targets: BTreeSet<(usize, usize)> = ranges
                .iter()
                .flat_map(|range| page_text.glyphs_in(range))
                .collect();
            if targets.is_empty() {
                continue;
            }
            let targets: Vec<(usize, usize)> = targets.into_iter().collect();
            let rects = redact_page(&mut pdf, page, &content, &targets)?;
            debug!("page {}: {} glyphs removed, {} boxes", number, targets.len(), rects);
            painted += rects;
        }

        let bytes = pdf.save_bytes()?;
        self.verify(&bytes)?;
        info!("digital redaction painted {} boxes", painted);
        Ok((bytes, counts))
    }

    /// Re-read a redacted PDF and fail if any page still matches.
    fn verify(&self, bytes: &[u8]) -> Result<()> {
        let pdf = PdfDocument::load_bytes(bytes)?;
        for (number, page) in pdf.pages() {
            let text = PageContent::parse(&pdf, page)?.text().text;
            if self.engine.detector().is_hit(&text) || self.engine.keywords().is_hit(&text) {
                return Err(Error::Redaction(format!(
                    "page {} still contains sensitive text after redaction",
                    number
                )));
            }
        }
        Ok(())
    }

    fn redact_scanned(&self, pdf: &PdfDocument) -> Result<(Vec<u8>, CategoryCounts)> {
        let mut counts = CategoryCounts::new();
        let mut pages = Vec::with_capacity(pdf.page_count());

        for (number, page) in pdf.pages() {
            let (width, height) = pdf.page_size(page);
            let mut raster = self.rasterizer.rasterize(pdf, page, self.dpi)?;
            let (page_counts, regions) = self.black_out_tokens(&mut raster)?;
            debug!("page {}: {} regions blacked out", number, regions);
            counts.merge_sum(&page_counts);
            pages.push(RasterPage {
                image: raster,
                width,
                height,
            });
        }

        Ok((images_to_pdf(&pages)?, counts))
    }

    /// Recognize `raster` and black out every sensitive token on it.
    fn black_out_tokens(&self, raster: &mut RgbImage) -> Result<(CategoryCounts, usize)> {
        let tokens = recognize_page(self.ocr.as_ref(), raster)?;
        let (hits, analysis) = self.token_hits(&tokens);
        let mut regions = 0usize;
        for index in hits {
            if black_out(raster, &tokens[index].bbox, TOKEN_PADDING) {
                regions += 1;
            } else {
                warn!("token {} lies outside the raster", index);
            }
        }
        Ok((analysis.counts, regions))
    }

    /// Indices of tokens that are, or are part of, something sensitive.
    ///
    /// The tokens are analyzed as one line of text so entities split
    /// across tokens are still found, and each token is also checked on
    /// its own, which covers tokens beyond the tagger's input limit.
    fn token_hits(&self, tokens: &[OcrToken]) -> (BTreeSet<usize>, Analysis) {
        let (text, ranges) = join_tokens(tokens);
        let mut analysis = self.engine.analyze(&text);
        let sensitive = analysis.sensitive_ranges(true);

        let mut hits = BTreeSet::new();
        for (index, token_range) in ranges.iter().enumerate() {
            let covered = sensitive.iter().any(|r| overlaps(r, token_range));
            if covered || self.isolated_hit(&tokens[index].text, &mut analysis.counts) {
                hits.insert(index);
            }
        }
        (hits, analysis)
    }

    /// Whether a single word is sensitive on its own: a pattern or term
    /// hit, or a word the masking engine would change. Entities only the
    /// engine finds here are added to `counts`.
    fn isolated_hit(&self, word: &str, counts: &mut CategoryCounts) -> bool {
        if self.engine.detector().is_hit(word) || self.engine.keywords().is_hit(word) {
            return true;
        }
        if self.engine.mask_text(word) != word {
            counts.merge_sum(&self.engine.count(word));
            return true;
        }
        false
    }
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// Byte ranges of the whitespace-separated words of `text`.
fn word_ranges(text: &str) -> Vec<Range<usize>> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                words.push(s..i);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        words.push(s..text.len());
    }
    words
}

/// Tokens joined by single spaces, with each token's byte range.
fn join_tokens(tokens: &[OcrToken]) -> (String, Vec<Range<usize>>) {
    let mut text = String::new();
    let mut ranges = Vec::with_capacity(tokens.len());
    for token in tokens {
        if !text.is_empty() {
            text.push(' ');
        }
        let start = text.len();
        text.push_str(&token.text);
        ranges.push(start..text.len());
    }
    (text, ranges)
}

fn output(doc: &Document, bytes: Vec<u8>, counts: CategoryCounts) -> MaskedOutput {
    MaskedOutput {
        name: doc.masked_name(),
        format: doc.format(),
        payload: MaskedPayload::Binary(bytes),
        counts,
    }
}

fn unmaskable(e: Error) -> Error {
    if e.is_unmaskable() {
        e
    } else {
        Error::Redaction(e.to_string())
    }
}
