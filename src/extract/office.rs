//! Spreadsheets and word-processing documents.

use std::io::Cursor;

use calamine::{Data, Reader, Xlsx};

use super::ooxml::{self, docx_rules};
use super::text::{normalize, CELL_SEPARATOR};
use super::Extractor;
use crate::detect::DocumentFormat;
use crate::error::Result;
use crate::model::{Document, ExtractedContent};

/// `.xlsx` workbooks: every non-empty cell of every sheet.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxExtractor;

impl Extractor for XlsxExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Xlsx]
    }

    fn name(&self) -> &str {
        "xlsx"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let mut workbook: Xlsx<_> = Xlsx::new(Cursor::new(doc.data()))?;
        let mut lines = Vec::new();
        for sheet in workbook.sheet_names() {
            let range = workbook.worksheet_range(&sheet)?;
            for row in range.rows() {
                let cells: Vec<String> = row
                    .iter()
                    .filter(|c| !matches!(c, Data::Empty))
                    .map(|c| c.to_string())
                    .filter(|c| !c.trim().is_empty())
                    .collect();
                if !cells.is_empty() {
                    lines.push(cells.join(CELL_SEPARATOR));
                }
            }
        }
        Ok(ExtractedContent::text(normalize(&lines.join("\n"))))
    }
}

/// `.docx` documents: body, tables, headers, footers and notes.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocxExtractor;

impl Extractor for DocxExtractor {
    fn formats(&self) -> &[DocumentFormat] {
        &[DocumentFormat::Docx]
    }

    fn name(&self) -> &str {
        "docx"
    }

    fn extract(&self, doc: &Document) -> Result<ExtractedContent> {
        let mut entries = ooxml::read_entries(doc.data())?;
        // Main body first, then the rest in archive order.
        entries.sort_by_key(|e| e.name != "word/document.xml");

        let mut parts = Vec::new();
        for entry in &entries {
            let Some(rules) = docx_rules(&entry.name) else {
                continue;
            };
            let xml = String::from_utf8_lossy(&entry.data);
            let text = ooxml::part_text(&xml, &rules)?;
            if !text.trim().is_empty() {
                parts.push(text);
            }
        }
        Ok(ExtractedContent::text(normalize(&parts.join("\n"))))
    }
}
