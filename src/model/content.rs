//! Extracted content: flat text, or pages of positioned tokens.

use serde::{Deserialize, Serialize};

/// Axis-aligned box in raster pixel coordinates (origin top-left).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge
    pub left: u32,
    /// Top edge
    pub top: u32,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

impl BoundingBox {
    /// Create a new box.
    pub fn new(left: u32, top: u32, width: u32, height: u32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Right edge (exclusive).
    pub fn right(&self) -> u32 {
        self.left.saturating_add(self.width)
    }

    /// Bottom edge (exclusive).
    pub fn bottom(&self) -> u32 {
        self.top.saturating_add(self.height)
    }

    /// Whether the box covers no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// A recognized word and where it sits on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrToken {
    /// Recognized text
    pub text: String,
    /// Location on the raster
    pub bbox: BoundingBox,
    /// Recognition confidence in percent, if reported
    pub confidence: Option<f32>,
}

impl OcrToken {
    /// Create a token without a confidence value.
    pub fn new(text: impl Into<String>, bbox: BoundingBox) -> Self {
        Self {
            text: text.into(),
            bbox,
            confidence: None,
        }
    }
}

/// Tokens recognized on one page (or one image).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TokenPage {
    /// Page number (1-indexed)
    pub number: u32,
    /// Tokens in reading order
    pub tokens: Vec<OcrToken>,
}

impl TokenPage {
    /// Create an empty page.
    pub fn new(number: u32) -> Self {
        Self {
            number,
            tokens: Vec::new(),
        }
    }

    /// Page text with tokens joined by single spaces.
    pub fn text(&self) -> String {
        self.tokens
            .iter()
            .map(|t| t.text.as_str())
            .filter(|t| !t.trim().is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Output of the format extractor for one document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExtractedContent {
    /// Flattened text
    Text {
        /// The text
        text: String,
    },
    /// Positioned tokens, page by page
    Pages {
        /// The pages
        pages: Vec<TokenPage>,
    },
}

impl ExtractedContent {
    /// Wrap flat text.
    pub fn text(text: impl Into<String>) -> Self {
        ExtractedContent::Text { text: text.into() }
    }

    /// Wrap token pages.
    pub fn pages(pages: Vec<TokenPage>) -> Self {
        ExtractedContent::Pages { pages }
    }

    /// Plain text view; pages are separated by newlines.
    pub fn plain_text(&self) -> String {
        match self {
            ExtractedContent::Text { text } => text.clone(),
            ExtractedContent::Pages { pages } => pages
                .iter()
                .map(TokenPage::text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }

    /// Whether nothing but whitespace was recovered.
    pub fn is_blank(&self) -> bool {
        match self {
            ExtractedContent::Text { text } => text.trim().is_empty(),
            ExtractedContent::Pages { pages } => pages
                .iter()
                .all(|p| p.tokens.iter().all(|t| t.text.trim().is_empty())),
        }
    }
}
