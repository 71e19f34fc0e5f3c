//! Content-stream walking with glyph geometry.
//!
//! The walker follows the graphics state (`q`/`Q`/`cm`) and the text
//! state (`Tf`, `Tc`, `Tw`, `Tz`, `TL`, `Ts`, text matrices) and records,
//! for every shown glyph, its decoded text, the operand bytes it came
//! from, its advance, and its rectangle in page space. Redaction needs
//! the byte provenance; the page text builder needs the rectangles.

use std::collections::BTreeMap;
use std::ops::Range;

use lopdf::content::{Content, Operation};
use lopdf::Object;

use super::backend::{number, FontMetrics, PageId, PdfDocument};
use crate::error::{Error, Result};

/// Affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Matrix {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
    pub e: f32,
    pub f: f32,
}

impl Matrix {
    /// The identity transform.
    pub const IDENTITY: Matrix = Matrix {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        e: 0.0,
        f: 0.0,
    };

    /// Build from the six components.
    pub fn new(a: f32, b: f32, c: f32, d: f32, e: f32, f: f32) -> Self {
        Self { a, b, c, d, e, f }
    }

    /// Pure translation.
    pub fn translate(tx: f32, ty: f32) -> Self {
        Self::new(1.0, 0.0, 0.0, 1.0, tx, ty)
    }

    /// Read six numeric operands (`cm`, `Tm`).
    pub fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() < 6 {
            return None;
        }
        let v: Vec<f32> = operands[..6].iter().filter_map(number).collect();
        if v.len() != 6 {
            return None;
        }
        Some(Self::new(v[0], v[1], v[2], v[3], v[4], v[5]))
    }

    /// `self` applied first, then `next`.
    pub fn then(&self, next: &Matrix) -> Matrix {
        Matrix {
            a: self.a * next.a + self.b * next.c,
            b: self.a * next.b + self.b * next.d,
            c: self.c * next.a + self.d * next.c,
            d: self.c * next.b + self.d * next.d,
            e: self.e * next.a + self.f * next.c + next.e,
            f: self.e * next.b + self.f * next.d + next.f,
        }
    }

    /// Transform a point.
    pub fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.a + y * self.c + self.e,
            x * self.b + y * self.d + self.f,
        )
    }

    fn vertical_scale(&self) -> f32 {
        (self.c * self.c + self.d * self.d).sqrt()
    }
}

impl Default for Matrix {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Axis-aligned rectangle in page space (points, y up).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl Rect {
    /// Rectangle spanning two corners in any order.
    pub fn from_corners(p: (f32, f32), q: (f32, f32)) -> Self {
        Self {
            x0: p.0.min(q.0),
            y0: p.1.min(q.1),
            x1: p.0.max(q.0),
            y1: p.1.max(q.1),
        }
    }

    pub fn width(&self) -> f32 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f32 {
        self.y1 - self.y0
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }
}

/// One shown glyph.
#[derive(Debug, Clone)]
pub struct Glyph {
    /// Decoded text (may be empty or several characters)
    pub text: String,
    /// Index of the string operand (array index for `TJ`, 0 otherwise)
    pub item: usize,
    /// Bytes of that string the glyph was shown from
    pub bytes: Range<usize>,
    /// Whether `bytes` is exact; otherwise it covers the whole string
    pub exact: bool,
    /// Advance in thousandths of text space, including spacing
    pub advance: f32,
    /// Baseline in page space
    pub baseline: f32,
    /// Effective font size in page space
    pub size: f32,
    /// Glyph box in page space
    pub rect: Rect,
}

/// Glyphs shown by one text-showing operator.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// Index of the operator in the page's operation list
    pub op_index: usize,
    pub glyphs: Vec<Glyph>,
}

/// An image XObject painted with `Do`.
#[derive(Debug, Clone)]
pub struct ImagePlacement {
    /// Resource name
    pub name: Vec<u8>,
    /// CTM at the time of painting; maps the unit square to the page
    pub ctm: Matrix,
}

impl ImagePlacement {
    /// Bounding box of the painted unit square.
    pub fn rect(&self) -> Rect {
        let corners = [
            self.ctm.apply(0.0, 0.0),
            self.ctm.apply(1.0, 0.0),
            self.ctm.apply(0.0, 1.0),
            self.ctm.apply(1.0, 1.0),
        ];
        corners[1..]
            .iter()
            .fold(Rect::from_corners(corners[0], corners[0]), |r, p| {
                r.union(&Rect::from_corners(*p, *p))
            })
    }
}

/// A parsed page: its operations plus what they paint.
#[derive(Debug, Clone, Default)]
pub struct PageContent {
    pub operations: Vec<Operation>,
    pub runs: Vec<TextRun>,
    pub images: Vec<ImagePlacement>,
}

impl PageContent {
    /// Decode and walk one page's content stream.
    pub fn parse(pdf: &PdfDocument, page: PageId) -> Result<Self> {
        let raw = pdf.page_content(page)?;
        let content = Content::decode(&raw).map_err(|e| Error::Pdf(e.to_string()))?;
        let fonts = pdf.page_fonts(page);
        Ok(Self::walk(content.operations, &fonts))
    }

    /// Walk already-decoded operations with the given fonts.
    pub fn walk(operations: Vec<Operation>, fonts: &BTreeMap<Vec<u8>, FontMetrics<'_>>) -> Self {
        let mut walker = Walker::new(fonts);
        for (index, op) in operations.iter().enumerate() {
            walker.step(index, op);
        }
        Self {
            operations,
            runs: walker.runs,
            images: walker.images,
        }
    }

    /// Reading-order text with a character-to-glyph map.
    pub fn text(&self) -> PageText {
        PageText::build(&self.runs)
    }

    /// Total number of decoded characters shown.
    pub fn char_count(&self) -> usize {
        self.runs
            .iter()
            .flat_map(|r| r.glyphs.iter())
            .map(|g| g.text.chars().filter(|c| !c.is_whitespace()).count())
            .sum()
    }
}

/// Page text plus the glyph behind each piece of it.
#[derive(Debug, Clone, Default)]
pub struct PageText {
    pub text: String,
    segments: Vec<Segment>,
}

#[derive(Debug, Clone)]
struct Segment {
    range: Range<usize>,
    run: usize,
    glyph: usize,
}

impl PageText {
    fn build(runs: &[TextRun]) -> Self {
        let mut text = String::new();
        let mut segments = Vec::new();
        let mut prev: Option<&Glyph> = None;

        for (run_index, run) in runs.iter().enumerate() {
            for (glyph_index, glyph) in run.glyphs.iter().enumerate() {
                if glyph.text.is_empty() {
                    continue;
                }
                if let Some(p) = prev {
                    let size = p.size.max(glyph.size).max(1.0);
                    let same_line = (p.baseline - glyph.baseline).abs() < size * 0.5;
                    if !same_line {
                        if !text.ends_with('\n') {
                            text.push('\n');
                        }
                    } else {
                        let gap = glyph.rect.x0 - p.rect.x1;
                        let backwards = glyph.rect.x1 <= p.rect.x0;
                        if (gap > size * 0.15 || backwards)
                            && !text.ends_with(char::is_whitespace)
                            && !glyph.text.starts_with(char::is_whitespace)
                        {
                            text.push(' ');
                        }
                    }
                }
                let start = text.len();
                text.push_str(&glyph.text);
                segments.push(Segment {
                    range: start..text.len(),
                    run: run_index,
                    glyph: glyph_index,
                });
                prev = Some(glyph);
            }
        }
        Self { text, segments }
    }

    /// `(run, glyph)` pairs whose text overlaps the byte range.
    pub fn glyphs_in(&self, range: &Range<usize>) -> Vec<(usize, usize)> {
        self.segments
            .iter()
            .filter(|s| s.range.start < range.end && range.start < s.range.end)
            .filter(|s| !self.text[s.range.clone()].trim().is_empty())
            .map(|s| (s.run, s.glyph))
            .collect()
    }
}

#[derive(Debug, Clone)]
struct TextState {
    font: Vec<u8>,
    size: f32,
    char_spacing: f32,
    word_spacing: f32,
    /// Horizontal scaling as a fraction
    scale: f32,
    leading: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            font: Vec::new(),
            size: 12.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            scale: 1.0,
            leading: 0.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct GraphicsState {
    ctm: Matrix,
    text: TextState,
}

struct Walker<'f, 'a> {
    fonts: &'f BTreeMap<Vec<u8>, FontMetrics<'a>>,
    fallback: FontMetrics<'static>,
    state: GraphicsState,
    stack: Vec<GraphicsState>,
    tm: Matrix,
    tlm: Matrix,
    runs: Vec<TextRun>,
    images: Vec<ImagePlacement>,
}

impl<'f, 'a> Walker<'f, 'a> {
    fn new(fonts: &'f BTreeMap<Vec<u8>, FontMetrics<'a>>) -> Self {
        Self {
            fonts,
            fallback: FontMetrics::fallback(),
            state: GraphicsState::default(),
            stack: Vec::new(),
            tm: Matrix::IDENTITY,
            tlm: Matrix::IDENTITY,
            runs: Vec::new(),
            images: Vec::new(),
        }
    }

    fn step(&mut self, index: usize, op: &Operation) {
        let operands = &op.operands;
        let num = |i: usize| operands.get(i).and_then(number);

        match op.operator.as_str() {
            "q" => self.stack.push(self.state.clone()),
            "Q" => {
                if let Some(saved) = self.stack.pop() {
                    self.state = saved;
                }
            }
            "cm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.state.ctm = m.then(&self.state.ctm);
                }
            }
            "BT" => {
                self.tm = Matrix::IDENTITY;
                self.tlm = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.state.text.font = name.clone();
                }
                if let Some(size) = num(1) {
                    self.state.text.size = size;
                }
            }
            "Tc" => self.state.text.char_spacing = num(0).unwrap_or(0.0),
            "Tw" => self.state.text.word_spacing = num(0).unwrap_or(0.0),
            "Tz" => self.state.text.scale = num(0).unwrap_or(100.0) / 100.0,
            "TL" => self.state.text.leading = num(0).unwrap_or(0.0),
            "Ts" => self.state.text.rise = num(0).unwrap_or(0.0),
            "Td" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let (Some(tx), Some(ty)) = (num(0), num(1)) {
                    self.state.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = Matrix::from_operands(operands) {
                    self.tm = m;
                    self.tlm = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let mut glyphs = Vec::new();
                    self.show(bytes, 0, &mut glyphs);
                    self.push_run(index, glyphs);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let mut glyphs = Vec::new();
                    for (item, obj) in items.iter().enumerate() {
                        match obj {
                            Object::String(bytes, _) => self.show(bytes, item, &mut glyphs),
                            other => {
                                if let Some(n) = number(other) {
                                    self.kern(n);
                                }
                            }
                        }
                    }
                    self.push_run(index, glyphs);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    let mut glyphs = Vec::new();
                    self.show(bytes, 0, &mut glyphs);
                    self.push_run(index, glyphs);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (num(0), num(1)) {
                    self.state.text.word_spacing = aw;
                    self.state.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    let mut glyphs = Vec::new();
                    self.show(bytes, 0, &mut glyphs);
                    self.push_run(index, glyphs);
                }
            }
            "Do" => {
                if let Some(Object::Name(name)) = operands.first() {
                    self.images.push(ImagePlacement {
                        name: name.clone(),
                        ctm: self.state.ctm,
                    });
                }
            }
            _ => {}
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.tlm = Matrix::translate(tx, ty).then(&self.tlm);
        self.tm = self.tlm;
    }

    fn next_line(&mut self) {
        let leading = self.state.text.leading;
        self.move_line(0.0, -leading);
    }

    fn push_run(&mut self, op_index: usize, glyphs: Vec<Glyph>) {
        if !glyphs.is_empty() {
            self.runs.push(TextRun { op_index, glyphs });
        }
    }

    /// A `TJ` number: move left by `n` thousandths of an em.
    fn kern(&mut self, n: f32) {
        let ts = &self.state.text;
        let tx = -n / 1000.0 * ts.size * ts.scale;
        self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
    }

    fn show(&mut self, bytes: &[u8], item: usize, glyphs: &mut Vec<Glyph>) {
        let font = self.fonts.get(&self.state.text.font).unwrap_or(&self.fallback);

        // (text, bytes, width in 1/1000 em, exact, is single-byte space)
        let mut pieces: Vec<(String, Range<usize>, f32, bool, bool)> = Vec::new();
        if font.composite {
            let decoded = font.decode(bytes);
            let chars: Vec<char> = decoded.chars().collect();
            let exact = chars.len() * 2 == bytes.len();
            for (i, c) in chars.iter().enumerate() {
                let range = if exact { i * 2..i * 2 + 2 } else { 0..bytes.len() };
                pieces.push((c.to_string(), range, font.char_width(*c), exact, false));
            }
        } else {
            for (i, &b) in bytes.iter().enumerate() {
                pieces.push((font.decode(&[b]), i..i + 1, font.code_width(b), true, b == b' '));
            }
        }

        let ts = self.state.text.clone();
        for (text, range, w0, exact, is_space) in pieces {
            let spacing = ts.char_spacing + if is_space { ts.word_spacing } else { 0.0 };
            let tx = (w0 / 1000.0 * ts.size + spacing) * ts.scale;

            let trm = self.tm.then(&self.state.ctm);
            let start = trm.apply(0.0, ts.rise);
            let end = trm.apply(tx, ts.rise);
            let size = ts.size * trm.vertical_scale();
            let baseline = start.1.min(end.1);
            let rect = Rect {
                x0: start.0.min(end.0),
                y0: baseline - size * 0.25,
                x1: start.0.max(end.0),
                y1: start.1.max(end.1) + size * 0.85,
            };
            let advance = if ts.size.abs() > f32::EPSILON {
                w0 + spacing * 1000.0 / ts.size
            } else {
                w0
            };

            glyphs.push(Glyph {
                text,
                item,
                bytes: range,
                exact,
                advance,
                baseline,
                size,
                rect,
            });
            self.tm = Matrix::translate(tx, 0.0).then(&self.tm);
        }
    }
}
