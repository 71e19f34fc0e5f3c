//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};

use image::{Rgb, RgbImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document as LopdfDocument, Object, Stream};
use unpii::error::Result;
use unpii::pdf::{images_to_pdf, RasterPage};
use unpii::{OcrEngine, OcrToken, SequenceLabeler};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// OCR stub returning the same words for every page, counting calls.
pub struct FixedOcr {
    tokens: Vec<OcrToken>,
    calls: AtomicUsize,
}

impl FixedOcr {
    pub fn new(tokens: Vec<OcrToken>) -> Self {
        Self {
            tokens,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for FixedOcr {
    fn recognize(&self, _image: &RgbImage) -> Result<Vec<OcrToken>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tokens.clone())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

/// Labeler tagging every occurrence of fixed words.
pub struct WordLabeler(pub Vec<(&'static str, &'static str)>);

impl SequenceLabeler for WordLabeler {
    fn label(&self, units: &[&str]) -> Result<Vec<String>> {
        let chars: Vec<char> = units.concat().chars().collect();
        let mut labels = vec!["O".to_string(); units.len()];
        for (word, entity) in &self.0 {
            let w: Vec<char> = word.chars().collect();
            let mut i = 0;
            while i + w.len() <= chars.len() {
                if chars[i..i + w.len()] == w[..] {
                    labels[i] = format!("B-{}", entity);
                    for label in labels.iter_mut().skip(i + 1).take(w.len() - 1) {
                        *label = format!("I-{}", entity);
                    }
                    i += w.len();
                } else {
                    i += 1;
                }
            }
        }
        Ok(labels)
    }
}

/// One-page PDF with a line of Courier text per entry.
pub fn text_pdf(lines: &[&str]) -> Vec<u8> {
    let mut doc = LopdfDocument::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });
    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), 12.into()]),
        Operation::new("TL", vec![14.into()]),
        Operation::new("Td", vec![72.into(), 700.into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    let encoded = Content { operations }.encode().unwrap();
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
        "Contents" => content_id,
        "Resources" => dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        },
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    let mut out = Vec::new();
    doc.save_to(&mut out).unwrap();
    out
}

/// Image-only PDF: one white page of `width` x `height` points.
pub fn scanned_pdf(width: u32, height: u32) -> Vec<u8> {
    let page = RasterPage {
        image: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
        width: width as f32,
        height: height as f32,
    };
    images_to_pdf(&[page]).unwrap()
}

/// Zip archive holding `entries` in order.
pub fn zip_of(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for (name, content) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap().into_inner()
}

/// Text of one entry of a zip archive.
pub fn zip_entry(data: &[u8], name: &str) -> String {
    let mut archive = ZipArchive::new(Cursor::new(data)).unwrap();
    let mut file = archive.by_name(name).unwrap();
    let mut text = String::new();
    file.read_to_string(&mut text).unwrap();
    text
}

const CONTENT_TYPES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/></Types>"#;

/// Word document with one paragraph per entry.
pub fn docx(paragraphs: &[&str]) -> Vec<u8> {
    let body: String = paragraphs
        .iter()
        .map(|p| format!("<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>", p))
        .collect();
    let document = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document>"#,
        body
    );
    zip_of(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        ("word/document.xml", &document),
    ])
}

/// Workbook with one sheet, one row of shared-string cells.
pub fn xlsx(cells: &[&str]) -> Vec<u8> {
    let strings: String = cells
        .iter()
        .map(|c| format!("<si><t>{}</t></si>", c))
        .collect();
    let shared = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><sst xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" count="{n}" uniqueCount="{n}">{}</sst>"#,
        strings,
        n = cells.len()
    );
    let row: String = cells
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let col = (b'A' + i as u8) as char;
            format!(r#"<c r="{}1" t="s"><v>{}</v></c>"#, col, i)
        })
        .collect();
    let sheet = format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData><row r="1">{}</row></sheetData></worksheet>"#,
        row
    );
    zip_of(&[
        ("[Content_Types].xml", CONTENT_TYPES),
        (
            "xl/workbook.xml",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets><sheet name="Sheet1" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
        ),
        (
            "xl/_rels/workbook.xml.rels",
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet1.xml"/><Relationship Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/sharedStrings" Target="sharedStrings.xml"/></Relationships>"#,
        ),
        ("xl/sharedStrings.xml", &shared),
        ("xl/worksheets/sheet1.xml", &sheet),
    ])
}
