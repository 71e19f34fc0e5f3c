//! Thin layer over `lopdf` for the lookups the redactor needs.
//!
//! Keeps attribute inheritance (`Resources`, `MediaBox`), font metrics and
//! text decoding in one place so the content walker and the rasterizer
//! deal with plain values.

use std::collections::BTreeMap;

use lopdf::{Dictionary, Document as LopdfDocument, Encoding, Object, ObjectId};

use crate::error::{Error, Result};

/// Page identifier: (object number, generation number).
pub type PageId = ObjectId;

/// US Letter, used when a page has no usable MediaBox.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// Glyph width (1/1000 em) assumed when a simple font has no metrics.
const DEFAULT_GLYPH_WIDTH: f32 = 500.0;

/// Glyph width (1/1000 em) assumed for composite fonts.
const DEFAULT_CID_WIDTH: f32 = 1000.0;

/// A loaded PDF.
pub struct PdfDocument {
    doc: LopdfDocument,
}

impl PdfDocument {
    /// Load from an in-memory byte slice.
    pub fn load_bytes(data: &[u8]) -> Result<Self> {
        let doc = LopdfDocument::load_mem(data).map_err(|e| match e {
            lopdf::Error::Decryption(_) => Error::Pdf("document is encrypted".to_string()),
            _ => Error::from(e),
        })?;
        Ok(Self { doc })
    }

    /// Wrap an existing document.
    pub fn from_lopdf(doc: LopdfDocument) -> Self {
        Self { doc }
    }

    /// Direct access to the underlying `lopdf::Document`.
    pub fn raw_doc(&self) -> &LopdfDocument {
        &self.doc
    }

    /// Mutable access to the underlying `lopdf::Document`.
    pub fn raw_doc_mut(&mut self) -> &mut LopdfDocument {
        &mut self.doc
    }

    /// All pages as page number (1-indexed) → page id.
    pub fn pages(&self) -> BTreeMap<u32, PageId> {
        self.doc.get_pages()
    }

    /// Number of pages.
    pub fn page_count(&self) -> usize {
        self.doc.get_pages().len()
    }

    /// Decompressed content stream of a page.
    pub fn page_content(&self, page: PageId) -> Result<Vec<u8>> {
        Ok(self.doc.get_page_content(page)?)
    }

    /// Page size in points, from the (possibly inherited) MediaBox.
    pub fn page_size(&self, page: PageId) -> (f32, f32) {
        let media_box = self
            .inherited(page, b"MediaBox")
            .and_then(|o| self.resolve(o).as_array().ok())
            .map(|arr| arr.iter().filter_map(|o| number(self.resolve(o))).collect::<Vec<_>>());
        match media_box.as_deref() {
            Some([x0, y0, x1, y1]) => ((x1 - x0).abs(), (y1 - y0).abs()),
            _ => DEFAULT_PAGE_SIZE,
        }
    }

    /// The page's (possibly inherited) resource dictionary.
    pub fn page_resources(&self, page: PageId) -> Option<&Dictionary> {
        self.inherited(page, b"Resources")
            .and_then(|o| self.resolve(o).as_dict().ok())
    }

    /// Named entries of one resource category (`Font`, `XObject`, ...).
    pub fn resource_entries(&self, page: PageId, category: &[u8]) -> BTreeMap<Vec<u8>, &Object> {
        let mut entries = BTreeMap::new();
        if let Some(dict) = self
            .page_resources(page)
            .and_then(|r| r.get(category).ok())
            .and_then(|o| self.resolve(o).as_dict().ok())
        {
            for (name, value) in dict.iter() {
                entries.insert(name.clone(), self.resolve(value));
            }
        }
        entries
    }

    /// Metrics and encoding for every font on a page.
    pub fn page_fonts(&self, page: PageId) -> BTreeMap<Vec<u8>, FontMetrics<'_>> {
        let mut fonts = BTreeMap::new();
        let dicts = match self.doc.get_page_fonts(page) {
            Ok(dicts) => dicts,
            Err(e) => {
                log::debug!("page {:?}: no fonts ({})", page, e);
                return fonts;
            }
        };
        for (name, dict) in dicts {
            fonts.insert(name, FontMetrics::from_dict(self, dict));
        }
        fonts
    }

    /// Serialize the document.
    pub fn save_bytes(&mut self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        Ok(out)
    }

    /// Follow a reference chain to the object it names.
    pub fn resolve<'a>(&'a self, object: &'a Object) -> &'a Object {
        let mut current = object;
        // Bounded to survive reference cycles.
        for _ in 0..8 {
            match current {
                Object::Reference(id) => match self.doc.get_object(*id) {
                    Ok(next) => current = next,
                    Err(_) => return current,
                },
                _ => return current,
            }
        }
        current
    }

    /// Look a key up on the page, then on its ancestors.
    fn inherited(&self, page: PageId, key: &[u8]) -> Option<&Object> {
        let mut node = self.doc.get_dictionary(page).ok()?;
        for _ in 0..32 {
            if let Ok(value) = node.get(key) {
                return Some(value);
            }
            let parent = node.get(b"Parent").ok()?.as_reference().ok()?;
            node = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }
}

/// What the walker needs to know about one font.
pub struct FontMetrics<'a> {
    /// Composite (Type0) font with multi-byte codes
    pub composite: bool,
    first_char: i64,
    widths: Vec<f32>,
    default_width: f32,
    encoding: Option<Encoding<'a>>,
}

impl<'a> FontMetrics<'a> {
    fn from_dict(pdf: &'a PdfDocument, dict: &'a Dictionary) -> Self {
        let subtype = dict
            .get(b"Subtype")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");
        let composite = subtype == b"Type0";
        let encoding = dict.get_font_encoding(&pdf.doc).ok();

        if composite {
            let default_width = dict
                .get(b"DescendantFonts")
                .ok()
                .and_then(|o| pdf.resolve(o).as_array().ok())
                .and_then(|arr| arr.first())
                .and_then(|o| pdf.resolve(o).as_dict().ok())
                .and_then(|d| d.get(b"DW").ok())
                .and_then(|o| number(pdf.resolve(o)))
                .unwrap_or(DEFAULT_CID_WIDTH);
            return Self {
                composite,
                first_char: 0,
                widths: Vec::new(),
                default_width,
                encoding,
            };
        }

        let first_char = dict
            .get(b"FirstChar")
            .ok()
            .and_then(|o| number(pdf.resolve(o)))
            .map_or(0, |v| v as i64);
        let widths = dict
            .get(b"Widths")
            .ok()
            .and_then(|o| pdf.resolve(o).as_array().ok())
            .map(|arr| {
                arr.iter()
                    .map(|o| number(pdf.resolve(o)).unwrap_or(0.0))
                    .collect()
            })
            .unwrap_or_default();
        let missing = dict
            .get(b"FontDescriptor")
            .ok()
            .and_then(|o| pdf.resolve(o).as_dict().ok())
            .and_then(|d| d.get(b"MissingWidth").ok())
            .and_then(|o| number(pdf.resolve(o)))
            .filter(|w| *w > 0.0);
        let base_font = dict
            .get(b"BaseFont")
            .ok()
            .and_then(|o| o.as_name().ok())
            .unwrap_or(b"");
        let default_width = missing.unwrap_or(if base_font.starts_with(b"Courier") {
            600.0
        } else {
            DEFAULT_GLYPH_WIDTH
        });

        Self {
            composite,
            first_char,
            widths,
            default_width,
            encoding,
        }
    }

    /// Metrics used when the font resource is missing.
    pub fn fallback() -> FontMetrics<'static> {
        FontMetrics {
            composite: false,
            first_char: 0,
            widths: Vec::new(),
            default_width: DEFAULT_GLYPH_WIDTH,
            encoding: None,
        }
    }

    /// Width of a single-byte code in 1/1000 em.
    pub fn code_width(&self, code: u8) -> f32 {
        let index = code as i64 - self.first_char;
        if index >= 0 {
            if let Some(w) = self.widths.get(index as usize) {
                if *w > 0.0 {
                    return *w;
                }
            }
        }
        self.default_width
    }

    /// Estimated width of a decoded character in 1/1000 em.
    pub fn char_width(&self, c: char) -> f32 {
        if self.composite || is_wide_char(c) {
            self.default_width.max(DEFAULT_CID_WIDTH * 0.5)
        } else {
            self.default_width
        }
    }

    /// Decode a string operand.
    pub fn decode(&self, bytes: &[u8]) -> String {
        if let Some(enc) = &self.encoding {
            if let Ok(text) = LopdfDocument::decode_text(enc, bytes) {
                return text;
            }
        }
        decode_text_simple(bytes)
    }
}

/// Simple text decoding fallback when no encoding is available.
pub fn decode_text_simple(bytes: &[u8]) -> String {
    // UTF-16BE with BOM
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let utf16: Vec<u16> = bytes[2..]
            .chunks(2)
            .filter_map(|c| {
                if c.len() == 2 {
                    Some(u16::from_be_bytes([c[0], c[1]]))
                } else {
                    None
                }
            })
            .collect();
        return String::from_utf16(&utf16).unwrap_or_default();
    }

    if let Ok(s) = std::str::from_utf8(bytes) {
        return s.to_string();
    }

    // Latin-1
    bytes.iter().map(|&b| b as char).collect()
}

/// Numeric value of an integer or real object.
pub fn number(obj: &Object) -> Option<f32> {
    match obj {
        Object::Integer(i) => Some(*i as f32),
        Object::Real(r) => Some(*r),
        _ => None,
    }
}

/// Hangul and CJK characters are set on full-width advances.
fn is_wide_char(c: char) -> bool {
    let code = c as u32;
    (0xAC00..=0xD7A3).contains(&code)
        || (0x1100..=0x11FF).contains(&code)
        || (0x3130..=0x318F).contains(&code)
        || (0x4E00..=0x9FFF).contains(&code)
        || (0x3000..=0x30FF).contains(&code)
        || (0xFF00..=0xFFEF).contains(&code)
}
