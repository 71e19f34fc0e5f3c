//! Plain and delimited text.

use encoding_rs::{Encoding, EUC_KR};
use unicode_normalization::UnicodeNormalization;

use super::Extractor;
use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::model::{Document, ExtractedContent};

/// Cell separator used when flattening delimited text.
pub const CELL_SEPARATOR: &str = "\t";

/// Decode document bytes to text.
///
/// A byte-order mark decides the encoding when present; otherwise UTF-8
/// is tried first and CP949 (EUC-KR) second.
pub fn decode_text(data: &[u8]) -> Result<String> {
    if let Some((encoding, bom)) = Encoding::for_bom(data) {
        let (text, had_errors) = encoding.decode_without_bom_handling(&data[bom..]);
        if had_errors {
            return Err(Error::Encoding(format!("invalid {} text", encoding.name())));
        }
        return Ok(text.into_owned());
    }
    if let Ok(text) = std::str::from_utf8(data) {
        return Ok(text.to_string());
    }
    let (text, had_errors) = EUC_KR.decode_without_bom_handling(data);
    if had_errors {
        return Err(Error::Encoding(
            "text is neither UTF-8 nor CP949".to_string(),
        ));
    }
    Ok(text.into_owned())
}

/// Canonical composition, so decomposed Hangul matches the patterns.
pub fn normalize(text: &str) -> String {
    text.nfc().collect()
}

/// Parse delimited text into rows of cells.
pub fn read_csv(text: &str) -> Result<Vec<Vec<String>>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(text.as_bytes());
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(rows)
}

/// `.txt` documents.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextExtractor;

impl Extractor for TextExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Text]
    }

    fn name(&self) -> &str {
        "text"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let text = decode_text(doc.data())?;
        Ok(ExtractedContent::text(normalize(&text)))
    }
}

/// `.csv` documents: every cell, row by row.
#[derive(Debug, Clone, Copy, Default)]
pub struct CsvExtractor;

impl Extractor for CsvExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Csv]
    }

    fn name(&self) -> &str {
        "csv"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let text = decode_text(doc.data())?;
        let lines: Vec<String> = read_csv(&text)?
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter(|c| !c.trim().is_empty())
                    .collect::<Vec<_>>()
                    .join(CELL_SEPARATOR)
            })
            .filter(|line| !line.is_empty())
            .collect();
        Ok(ExtractedContent::text(normalize(&lines.join("\n"))))
    }
}
