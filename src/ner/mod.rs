//! Entity tagger and merger.
//!
//! The tagger runs a pretrained sequence-labeling model over the
//! characters of a text; the merger turns its begin/inside/outside
//! output into [`EntitySpan`](crate::model::EntitySpan)s.

mod merge;
#[cfg(feature = "ner")]
mod onnx;
mod tagger;

pub use merge::merge_entities;
#[cfg(feature = "ner")]
pub use onnx::OnnxLabeler;
pub use tagger::{SequenceLabeler, Tagger, TaggerConfig};
