//! Producing masked copies of documents.
//!
//! Text-bearing formats are rewritten in place with masked text
//! ([`mask_text_document`]); PDFs and images are redacted spatially
//! ([`SpatialRedactor`]).

mod draw;
mod spatial;
mod text;

pub use draw::black_out;
pub use spatial::{PdfKind, SpatialRedactor, DEFAULT_TEXT_THRESHOLD};
pub use text::mask_text_document;
