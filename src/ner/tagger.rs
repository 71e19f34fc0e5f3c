//! Entity tagger: character units in, one tag per unit out.

use crate::error::{Error, Result};
use crate::model::{Tag, TaggedUnit};
use log::{debug, warn};
use once_cell::sync::OnceCell;
use std::path::PathBuf;
use std::sync::Arc;

/// Special tokens a sequence model adds around its input.
const SPECIAL_TOKENS: usize = 2;

/// A pretrained sequence-labeling model, used for inference only.
///
/// Implementations return exactly one BIO label string (`B-이름`,
/// `I-전화번호`, `O`, ...) per input unit.
pub trait SequenceLabeler: Send + Sync {
    /// Label each unit.
    fn label(&self, units: &[&str]) -> Result<Vec<String>>;

    /// Short name for logs.
    fn name(&self) -> &str {
        "labeler"
    }
}

/// How the tagger locates and drives its model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaggerConfig {
    /// Directory holding `model.onnx`, `tokenizer.json` and `config.json`
    pub model_dir: Option<PathBuf>,
    /// Model maximum sequence length, special tokens included
    pub max_seq_len: usize,
    /// Tag long inputs window by window instead of truncating them
    pub windowing: bool,
    /// Intra-op threads for the inference runtime
    pub intra_threads: usize,
}

impl Default for TaggerConfig {
    fn default() -> Self {
        Self {
            model_dir: None,
            max_seq_len: 512,
            windowing: false,
            intra_threads: 2,
        }
    }
}

impl TaggerConfig {
    /// Number of units that fit in one model call.
    pub fn max_units(&self) -> usize {
        self.max_seq_len.saturating_sub(SPECIAL_TOKENS).max(1)
    }
}

enum TaggerState {
    Ready(Arc<dyn SequenceLabeler>),
    Unavailable(String),
}

/// Entity tagger over a shared, read-only model.
///
/// A tagger whose model could not be loaded stays usable: it is in an
/// explicit unavailable state and callers fall back to regex-only
/// detection.
pub struct Tagger {
    state: TaggerState,
    max_units: usize,
    windowing: bool,
}

static GLOBAL: OnceCell<Arc<Tagger>> = OnceCell::new();

impl Tagger {
    /// Process-wide tagger, loaded on first use.
    ///
    /// The configuration of the first call wins; later calls return the
    /// same handle without reloading.
    pub fn global(config: &TaggerConfig) -> Arc<Tagger> {
        GLOBAL
            .get_or_init(|| Arc::new(Tagger::load(config)))
            .clone()
    }

    /// Load the model described by `config`.
    ///
    /// Never fails: a missing or broken model yields an unavailable
    /// tagger, logged once here.
    pub fn load(config: &TaggerConfig) -> Tagger {
        match load_labeler(config) {
            Ok(labeler) => {
                debug!("tagger ready ({})", labeler.name());
                Tagger::with_labeler(labeler).with_limits(config)
            }
            Err(e) => {
                warn!("entity tagger unavailable, using regex-only detection: {}", e);
                Tagger::unavailable(e.to_string()).with_limits(config)
            }
        }
    }

    /// Tagger over an existing labeler.
    pub fn with_labeler(labeler: Arc<dyn SequenceLabeler>) -> Tagger {
        let defaults = TaggerConfig::default();
        Tagger {
            state: TaggerState::Ready(labeler),
            max_units: defaults.max_units(),
            windowing: defaults.windowing,
        }
    }

    /// Tagger with no model.
    pub fn unavailable(reason: impl Into<String>) -> Tagger {
        let defaults = TaggerConfig::default();
        Tagger {
            state: TaggerState::Unavailable(reason.into()),
            max_units: defaults.max_units(),
            windowing: defaults.windowing,
        }
    }

    /// Apply the sequence limits of `config`.
    pub fn with_limits(mut self, config: &TaggerConfig) -> Tagger {
        self.max_units = config.max_units();
        self.windowing = config.windowing;
        self
    }

    /// Whether a model is loaded.
    pub fn is_available(&self) -> bool {
        matches!(self.state, TaggerState::Ready(_))
    }

    /// Why the model is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.state {
            TaggerState::Ready(_) => None,
            TaggerState::Unavailable(reason) => Some(reason),
        }
    }

    /// Tag every character of `text`.
    ///
    /// Returns exactly one unit per character. Without windowing, units
    /// past the model's capacity are not scanned and come back as
    /// [`Tag::Outside`].
    pub fn tag(&self, text: &str) -> Result<Vec<TaggedUnit>> {
        let labeler = match &self.state {
            TaggerState::Ready(labeler) => labeler,
            TaggerState::Unavailable(reason) => {
                return Err(Error::ModelUnavailable(reason.clone()))
            }
        };

        let chars: Vec<String> = text.chars().map(String::from).collect();
        let units: Vec<&str> = chars.iter().map(String::as_str).collect();
        let mut tags = Vec::with_capacity(units.len());

        let windows = if self.windowing {
            split_windows(&units, self.max_units)
        } else {
            if units.len() > self.max_units {
                debug!(
                    "input of {} units truncated to {}",
                    units.len(),
                    self.max_units
                );
            }
            vec![0..units.len().min(self.max_units)]
        };

        for window in windows {
            let slice = &units[window];
            if slice.is_empty() {
                continue;
            }
            let labels = labeler.label(slice)?;
            if labels.len() != slice.len() {
                return Err(Error::Inference(format!(
                    "{} returned {} labels for {} units",
                    labeler.name(),
                    labels.len(),
                    slice.len()
                )));
            }
            tags.extend(labels.iter().map(|l| Tag::parse(l)));
        }
        tags.resize(units.len(), Tag::Outside);

        Ok(chars
            .into_iter()
            .zip(tags)
            .enumerate()
            .map(|(position, (text, tag))| TaggedUnit::new(text, tag, position))
            .collect())
    }
}

impl std::fmt::Debug for Tagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tagger")
            .field("available", &self.is_available())
            .field("max_units", &self.max_units)
            .field("windowing", &self.windowing)
            .finish()
    }
}

#[cfg(feature = "ner")]
fn load_labeler(config: &TaggerConfig) -> Result<Arc<dyn SequenceLabeler>> {
    let dir = config
        .model_dir
        .as_ref()
        .ok_or_else(|| Error::ModelUnavailable("no model directory configured".to_string()))?;
    let labeler = super::onnx::OnnxLabeler::load(dir, config)?;
    Ok(Arc::new(labeler))
}

#[cfg(not(feature = "ner"))]
fn load_labeler(_config: &TaggerConfig) -> Result<Arc<dyn SequenceLabeler>> {
    Err(Error::ModelUnavailable(
        "built without the `ner` feature".to_string(),
    ))
}

/// Consecutive windows of at most `size` units, cut after whitespace
/// where possible so words are not split between windows.
fn split_windows(units: &[&str], size: usize) -> Vec<std::ops::Range<usize>> {
    let mut windows = Vec::new();
    let mut start = 0;
    while start < units.len() {
        let mut end = (start + size).min(units.len());
        if end < units.len() {
            let half = start + size / 2;
            if let Some(cut) = (half..end).rev().find(|&i| units[i].trim().is_empty()) {
                end = cut + 1;
            }
        }
        windows.push(start..end);
        start = end;
    }
    windows
}

/// Resolve units the model produced no label for.
///
/// A gap sitting inside one entity (e.g. the space in an address)
/// continues it; any other gap is outside.
pub(crate) fn fill_gaps(labels: Vec<Option<String>>) -> Vec<String> {
    let tags: Vec<Option<Tag>> = labels.iter().map(|l| l.as_deref().map(Tag::parse)).collect();
    let mut filled = Vec::with_capacity(labels.len());
    for (i, label) in labels.iter().enumerate() {
        match label {
            Some(label) => filled.push(label.clone()),
            None => {
                let before = tags[..i].iter().rev().find_map(|t| *t);
                let after = tags[i + 1..].iter().find_map(|t| *t);
                match (before.and_then(|t| t.label()), after) {
                    (Some(open), Some(Tag::Inside(next))) if open == next => {
                        filled.push(format!("I-{}", open.display_name()))
                    }
                    _ => filled.push("O".to_string()),
                }
            }
        }
    }
    filled
}
