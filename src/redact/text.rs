//! Masked copies of text-bearing documents.
//!
//! The output keeps the input's format: txt stays txt, csv stays csv
//! (masked cell by cell), and docx/xlsx keep every zip entry as it was
//! except the text runs that needed masking.

use log::debug;

use crate::detect::DocumentFormat;
use crate::error::{Error, Result};
use crate::extract::ooxml::{self, PartRules};
use crate::extract::{decode_text, normalize, read_csv};
use crate::mask::MaskingEngine;
use crate::model::{CategoryCounts, Document, MaskedOutput, MaskedPayload};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Mask a txt, csv, docx or xlsx document.
///
/// Counts are summed over the units masked independently (the whole
/// text, each cell, each paragraph or shared string).
pub fn mask_text_document(doc: &Document, engine: &MaskingEngine) -> Result<MaskedOutput> {
    let mut counts = CategoryCounts::new();
    let payload = match doc.format() {
        DocumentFormat::Text => {
            let text = normalize(&decode_text(doc.data())?);
            let (masked, analysis) = engine.mask_and_analyze(&text);
            counts = analysis.counts;
            MaskedPayload::Text(masked)
        }
        DocumentFormat::Csv => MaskedPayload::Binary(mask_csv(doc, engine, &mut counts)?),
        DocumentFormat::Docx => {
            MaskedPayload::Binary(mask_ooxml(doc, engine, &mut counts, ooxml::docx_rules)?)
        }
        DocumentFormat::Xlsx => {
            MaskedPayload::Binary(mask_ooxml(doc, engine, &mut counts, ooxml::xlsx_rules)?)
        }
        other => {
            return Err(Error::UnsupportedFormat(format!(
                "{} is not a text-bearing format",
                other
            )))
        }
    };

    debug!("{}: masked, {} entities", doc.name(), counts.total());
    Ok(MaskedOutput {
        name: doc.masked_name(),
        format: doc.format(),
        payload,
        counts,
    })
}

fn mask_csv(doc: &Document, engine: &MaskingEngine, counts: &mut CategoryCounts) -> Result<Vec<u8>> {
    let text = normalize(&decode_text(doc.data())?);
    let rows = read_csv(&text)?;

    // Spreadsheet tools need the BOM to read UTF-8 csv.
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .from_writer(UTF8_BOM.to_vec());
    for row in rows {
        let masked: Vec<String> = row
            .iter()
            .map(|cell| {
                let (masked, analysis) = engine.mask_and_analyze(cell);
                counts.merge_sum(&analysis.counts);
                masked
            })
            .collect();
        writer.write_record(&masked)?;
    }
    writer.into_inner().map_err(|e| Error::Io(e.into_error()))
}

fn mask_ooxml(
    doc: &Document,
    engine: &MaskingEngine,
    counts: &mut CategoryCounts,
    rules_for: fn(&str) -> Option<PartRules>,
) -> Result<Vec<u8>> {
    let mut entries = ooxml::read_entries(doc.data())?;
    let mut rewritten = 0usize;

    for entry in &mut entries {
        let Some(rules) = rules_for(&entry.name) else {
            continue;
        };
        let xml = std::str::from_utf8(&entry.data)
            .map_err(|e| Error::Xml(format!("{}: {}", entry.name, e)))?;
        let masked = ooxml::rewrite_part(xml, &rules, |unit| {
            let (masked, analysis) = engine.mask_and_analyze(unit);
            counts.merge_sum(&analysis.counts);
            masked
        })?;
        if let Some(xml) = masked {
            entry.data = xml.into_bytes();
            rewritten += 1;
        }
    }

    debug!("{}: {} parts rewritten", doc.name(), rewritten);
    ooxml::write_entries(&entries)
}
