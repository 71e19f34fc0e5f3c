//! ONNX Runtime token-classification model.
//!
//! Expects a Hugging Face style export in one directory: `model.onnx`,
//! `tokenizer.json`, and `config.json` carrying `id2label`.

use super::tagger::{fill_gaps, SequenceLabeler, TaggerConfig};
use crate::error::{Error, Result};
use log::debug;
use ort::session::Session;
use ort::value::Tensor;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Mutex;
use tokenizers::Tokenizer;

/// Label set used when `config.json` carries no `id2label`.
const DEFAULT_LABELS: &[&str] = &[
    "O", "B-이름", "I-이름", "B-주민번호", "I-주민번호", "B-전화번호", "I-전화번호", "B-이메일",
    "I-이메일", "B-카드번호", "I-카드번호", "B-주소", "I-주소",
];

/// Sequence labeler backed by an ONNX token-classification model.
pub struct OnnxLabeler {
    /// `Session::run` needs `&mut self`; inference is serialized.
    session: Mutex<Session>,
    tokenizer: Tokenizer,
    labels: Vec<String>,
    token_type_ids: bool,
    max_seq_len: usize,
    name: String,
}

impl OnnxLabeler {
    /// Load the model, tokenizer and label set from `dir`.
    pub fn load(dir: &Path, config: &TaggerConfig) -> Result<Self> {
        let model_path = dir.join("model.onnx");
        let tokenizer_path = dir.join("tokenizer.json");
        for path in [&model_path, &tokenizer_path] {
            if !path.is_file() {
                return Err(Error::ModelUnavailable(format!(
                    "{} not found",
                    path.display()
                )));
            }
        }

        let (labels, model_type) = read_config(&dir.join("config.json"))?;

        let session = Session::builder()
            .map_err(unavailable)?
            .with_intra_threads(config.intra_threads.max(1))
            .map_err(unavailable)?
            .commit_from_file(&model_path)
            .map_err(unavailable)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| Error::ModelUnavailable(format!("tokenizer: {}", e)))?;

        let name = dir
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "onnx".to_string());
        // RoBERTa-family exports take no token_type_ids input.
        let token_type_ids = !model_type.contains("roberta") && !model_type.contains("distilbert");

        debug!(
            "loaded {} ({} labels, model_type={})",
            name,
            labels.len(),
            model_type
        );

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
            labels,
            token_type_ids,
            max_seq_len: config.max_seq_len.max(2),
            name,
        })
    }

    fn infer(&self, units: &[&str]) -> Result<Vec<Option<String>>> {
        let encoding = self
            .tokenizer
            .encode(units.to_vec(), true)
            .map_err(|e| Error::Inference(format!("tokenize: {}", e)))?;

        let mut ids: Vec<i64> = encoding.get_ids().iter().map(|&v| v as i64).collect();
        let mut mask: Vec<i64> = encoding
            .get_attention_mask()
            .iter()
            .map(|&v| v as i64)
            .collect();
        let mut types: Vec<i64> = encoding.get_type_ids().iter().map(|&v| v as i64).collect();
        let mut word_ids: Vec<Option<u32>> = encoding.get_word_ids().to_vec();

        if ids.len() > self.max_seq_len {
            // Keep the closing special token.
            let keep = self.max_seq_len - 1;
            for column in [&mut ids, &mut mask, &mut types] {
                let last = column[column.len() - 1];
                column.truncate(keep);
                column.push(last);
            }
            word_ids.truncate(keep);
            word_ids.push(None);
        }

        let seq_len = ids.len();
        let shape = vec![1i64, seq_len as i64];
        let ids_tensor = Tensor::from_array((shape.clone(), ids)).map_err(inference)?;
        let mask_tensor = Tensor::from_array((shape.clone(), mask)).map_err(inference)?;

        let predictions = {
            let mut session = self
                .session
                .lock()
                .map_err(|e| Error::Inference(format!("session lock poisoned: {}", e)))?;
            let run = if self.token_type_ids {
                let types_tensor = Tensor::from_array((shape, types)).map_err(inference)?;
                session.run(ort::inputs![ids_tensor, mask_tensor, types_tensor])
            } else {
                session.run(ort::inputs![ids_tensor, mask_tensor])
            };
            let outputs = run.map_err(inference)?;

            let (_name, logits) = outputs
                .iter()
                .next()
                .ok_or_else(|| Error::Inference("no output tensor".to_string()))?;
            let (dims, data) = logits.try_extract_tensor::<f32>().map_err(inference)?;
            if dims.len() != 3 || dims[1] as usize != seq_len {
                return Err(Error::Inference(format!(
                    "unexpected logits shape {:?}",
                    &dims[..]
                )));
            }
            let classes = dims[2] as usize;
            argmax_rows(data, classes)
        };

        // First sub-token of each unit carries its label.
        let mut labels: Vec<Option<String>> = vec![None; units.len()];
        let mut prev: Option<u32> = None;
        for (token, word) in word_ids.iter().enumerate() {
            let word = match word {
                Some(w) => *w,
                None => continue,
            };
            if prev == Some(word) {
                continue;
            }
            prev = Some(word);
            if let Some(slot) = labels.get_mut(word as usize) {
                let class = predictions.get(token).copied().unwrap_or(0);
                *slot = Some(
                    self.labels
                        .get(class)
                        .cloned()
                        .unwrap_or_else(|| "O".to_string()),
                );
            }
        }
        Ok(labels)
    }
}

impl SequenceLabeler for OnnxLabeler {
    fn label(&self, units: &[&str]) -> Result<Vec<String>> {
        if units.is_empty() {
            return Ok(Vec::new());
        }
        Ok(fill_gaps(self.infer(units)?))
    }

    fn name(&self) -> &str {
        &self.name
    }
}

fn unavailable<E: std::fmt::Display>(e: E) -> Error {
    Error::ModelUnavailable(e.to_string())
}

fn inference<E: std::fmt::Display>(e: E) -> Error {
    Error::Inference(e.to_string())
}

/// Index of the largest logit in each row.
fn argmax_rows(data: &[f32], classes: usize) -> Vec<usize> {
    if classes == 0 {
        return Vec::new();
    }
    data.chunks(classes)
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 {
                        (i, v)
                    } else {
                        best
                    }
                })
                .0
        })
        .collect()
}

/// Read `id2label` and `model_type` from `config.json`.
fn read_config(path: &Path) -> Result<(Vec<String>, String)> {
    let defaults = || -> Vec<String> { DEFAULT_LABELS.iter().map(|l| l.to_string()).collect() };
    if !path.is_file() {
        return Ok((defaults(), String::new()));
    }
    let raw = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&raw)?;

    let model_type = value
        .get("model_type")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let labels = match value.get("id2label").and_then(|v| v.as_object()) {
        Some(map) if !map.is_empty() => {
            let mut by_id = BTreeMap::new();
            for (id, label) in map {
                let id: usize = id
                    .parse()
                    .map_err(|_| Error::ModelUnavailable(format!("bad label id '{}'", id)))?;
                if id >= map.len() {
                    return Err(Error::ModelUnavailable(format!(
                        "label id {} out of range for {} labels",
                        id,
                        map.len()
                    )));
                }
                let label = label.as_str().unwrap_or("O").to_string();
                by_id.insert(id, label);
            }
            let len = by_id.keys().next_back().map_or(0, |max| max + 1);
            let mut labels = vec!["O".to_string(); len];
            for (id, label) in by_id {
                labels[id] = label;
            }
            labels
        }
        _ => defaults(),
    };
    Ok((labels, model_type))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argmax_rows() {
        let data = [0.1, 0.9, 0.0, 2.0, -1.0, 1.0];
        assert_eq!(argmax_rows(&data, 3), vec![1, 0]);
        assert!(argmax_rows(&data, 0).is_empty());
    }

    #[test]
    fn test_read_config_id2label() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"model_type":"XLM-RoBERTa","id2label":{"0":"O","2":"I-이름","1":"B-이름"}}"#,
        )
        .unwrap();
        let (labels, model_type) = read_config(&path).unwrap();
        assert_eq!(labels, vec!["O", "B-이름", "I-이름"]);
        assert_eq!(model_type, "xlm-roberta");
    }

    #[test]
    fn test_read_config_rejects_sparse_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"id2label":{"0":"O","4000000000":"B-이름"}}"#).unwrap();
        assert!(matches!(read_config(&path), Err(Error::ModelUnavailable(_))));
    }

    #[test]
    fn test_read_config_missing_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let (labels, _) = read_config(&dir.path().join("config.json")).unwrap();
        assert_eq!(labels.len(), DEFAULT_LABELS.len());
        assert_eq!(labels[1], "B-이름");
    }

    #[test]
    fn test_load_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        let result = OnnxLabeler::load(dir.path(), &TaggerConfig::default());
        assert!(matches!(result, Err(Error::ModelUnavailable(_))));
    }
}
