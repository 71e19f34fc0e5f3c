//! Data model shared by every pipeline stage.
//!
//! A [`Document`] goes in; [`ExtractedContent`] flows through the tagger
//! and regex detectors as [`TaggedUnit`]s and [`EntitySpan`]s; counts
//! come out as [`ScanReport`]s and masked content as [`MaskedOutput`].
//! All of these are document-scoped values with no cross-document
//! aliasing.

mod content;
mod document;
mod entity;
mod summary;

pub use content::{BoundingBox, ExtractedContent, OcrToken, TokenPage};
pub use document::{Document, MASKED_PREFIX};
pub use entity::{EntityLabel, EntitySpan, Tag, TaggedUnit};
pub use summary::{
    CategoryCounts, MaskedOutput, MaskedPayload, ScanReport, ScanStatus, ScanSummary,
};
