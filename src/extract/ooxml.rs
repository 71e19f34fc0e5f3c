//! Office Open XML parts: zip entries and text units.
//!
//! A part is read as a flat list of XML events. Text elements (`w:t`,
//! `t`) are grouped into units (`w:p`, `si`, `is`); each unit's text is
//! what a reader sees as one paragraph or one cell string. Masking
//! rewrites a unit's text and spreads it back over the original text
//! elements, leaving every other event untouched.

use std::io::{Cursor, Read, Write};

use quick_xml::events::{BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Which elements form units and which carry text, for one kind of part.
#[derive(Debug, Clone, Copy)]
pub struct PartRules {
    /// Local name of the unit element
    pub unit: &'static [u8],
    /// Local names of text-carrying elements
    pub text: &'static [&'static [u8]],
}

/// Word paragraphs (`w:p`, and DrawingML `a:p` in embedded shapes).
pub const WORD_PARAGRAPHS: PartRules = PartRules {
    unit: b"p",
    text: &[b"t", b"delText"],
};

/// Shared strings (`si`).
pub const SHARED_STRINGS: PartRules = PartRules {
    unit: b"si",
    text: &[b"t"],
};

/// Inline cell strings (`is`).
pub const INLINE_STRINGS: PartRules = PartRules {
    unit: b"is",
    text: &[b"t"],
};

/// Cell comments.
pub const COMMENTS: PartRules = PartRules {
    unit: b"comment",
    text: &[b"t"],
};

/// Rules for a docx entry, if it can hold document text.
pub fn docx_rules(name: &str) -> Option<PartRules> {
    let is_part = name.starts_with("word/") && name.ends_with(".xml") && !name.contains("/_rels/");
    is_part.then_some(WORD_PARAGRAPHS)
}

/// Rules for an xlsx entry, if it can hold cell text.
pub fn xlsx_rules(name: &str) -> Option<PartRules> {
    if name == "xl/sharedStrings.xml" {
        Some(SHARED_STRINGS)
    } else if name.starts_with("xl/worksheets/") && name.ends_with(".xml") && !name.contains("/_rels/")
    {
        Some(INLINE_STRINGS)
    } else if name.starts_with("xl/comments") && name.ends_with(".xml") {
        Some(COMMENTS)
    } else {
        None
    }
}

/// One zip entry.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    pub name: String,
    pub data: Vec<u8>,
    pub compression: CompressionMethod,
    pub is_dir: bool,
}

/// Read all entries, in archive order.
pub fn read_entries(data: &[u8]) -> Result<Vec<ZipEntry>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let mut file = archive.by_index(i)?;
        let mut content = Vec::new();
        file.read_to_end(&mut content)?;
        entries.push(ZipEntry {
            name: file.name().to_string(),
            data: content,
            compression: file.compression(),
            is_dir: file.is_dir(),
        });
    }
    Ok(entries)
}

/// Write entries back, keeping order and (where supported) compression.
pub fn write_entries(entries: &[ZipEntry]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for entry in entries {
        let method = match entry.compression {
            CompressionMethod::Stored => CompressionMethod::Stored,
            _ => CompressionMethod::Deflated,
        };
        let options = SimpleFileOptions::default().compression_method(method);
        if entry.is_dir {
            zip.add_directory(entry.name.as_str(), options)?;
        } else {
            zip.start_file(entry.name.as_str(), options)?;
            zip.write_all(&entry.data)?;
        }
    }
    Ok(zip.finish()?.into_inner())
}

/// One text element's content within a unit.
#[derive(Debug)]
struct Piece {
    /// Index of the text event
    event: usize,
    /// Index of the enclosing element's start tag
    start: Option<usize>,
    text: String,
}

type Unit = Vec<Piece>;

/// Parse a part into owned events and its text units.
fn read_units(xml: &str, rules: &PartRules) -> Result<(Vec<Event<'static>>, Vec<Unit>)> {
    let mut reader = Reader::from_str(xml);
    let mut events = Vec::new();
    let mut units: Vec<Unit> = vec![Vec::new()];
    let mut text_depth = 0usize;
    let mut open_text: Option<usize> = None;

    loop {
        let event = reader.read_event()?;
        match &event {
            Event::Eof => break,
            Event::Start(e) => {
                let local = e.local_name();
                if local.as_ref() == rules.unit {
                    units.push(Vec::new());
                } else if rules.text.contains(&local.as_ref()) {
                    text_depth += 1;
                    open_text = Some(events.len());
                }
            }
            Event::End(e) => {
                let local = e.local_name();
                if local.as_ref() == rules.unit {
                    units.push(Vec::new());
                } else if rules.text.contains(&local.as_ref()) {
                    text_depth = text_depth.saturating_sub(1);
                    open_text = None;
                }
            }
            Event::Text(t) if text_depth > 0 => {
                let text = t.unescape().map_err(|e| Error::Xml(e.to_string()))?;
                if let Some(unit) = units.last_mut() {
                    unit.push(Piece {
                        event: events.len(),
                        start: open_text,
                        text: text.into_owned(),
                    });
                }
            }
            Event::CData(t) if text_depth > 0 => {
                let text = String::from_utf8_lossy(t.as_ref()).into_owned();
                if let Some(unit) = units.last_mut() {
                    unit.push(Piece {
                        event: events.len(),
                        start: open_text,
                        text,
                    });
                }
            }
            _ => {}
        }
        events.push(event.into_owned());
    }

    units.retain(|u| !u.is_empty());
    Ok((events, units))
}

/// Text of every unit, one per line.
pub fn part_text(xml: &str, rules: &PartRules) -> Result<String> {
    let (_, units) = read_units(xml, rules)?;
    let lines: Vec<String> = units
        .iter()
        .map(|unit| unit.iter().map(|p| p.text.as_str()).collect::<String>())
        .filter(|line| !line.trim().is_empty())
        .collect();
    Ok(lines.join("\n"))
}

/// Rewrite every unit's text through `mask`.
///
/// Returns `None` when nothing changed. The masked text is spread over
/// the unit's original text elements by their character lengths; the
/// last element takes whatever remains. Elements whose new text starts
/// or ends with whitespace are marked `xml:space="preserve"`.
pub fn rewrite_part<F>(xml: &str, rules: &PartRules, mut mask: F) -> Result<Option<String>>
where
    F: FnMut(&str) -> String,
{
    let (mut events, units) = read_units(xml, rules)?;
    let mut changed = false;

    for unit in &units {
        let original: String = unit.iter().map(|p| p.text.as_str()).collect();
        let masked = mask(&original);
        if masked == original {
            continue;
        }
        changed = true;

        let mut rest = masked.chars();
        for (i, piece) in unit.iter().enumerate() {
            let replacement: String = if i + 1 == unit.len() {
                rest.by_ref().collect()
            } else {
                rest.by_ref().take(piece.text.chars().count()).collect()
            };
            let padded = replacement.starts_with(char::is_whitespace)
                || replacement.ends_with(char::is_whitespace);
            if let (true, Some(start)) = (padded, piece.start) {
                if let Event::Start(e) = &events[start] {
                    let preserved = preserve_space(e);
                    events[start] = Event::Start(preserved);
                }
            }
            events[piece.event] = Event::Text(BytesText::new(&replacement).into_owned());
        }
    }

    if !changed {
        return Ok(None);
    }

    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    for event in events {
        writer.write_event(event)?;
    }
    let bytes = writer.into_inner();
    String::from_utf8(bytes)
        .map(Some)
        .map_err(|e| Error::Xml(e.to_string()))
}

/// Copy of a start tag with `xml:space="preserve"` set.
fn preserve_space(e: &BytesStart<'_>) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
    let mut start = BytesStart::new(name);
    for attr in e.attributes().flatten() {
        if attr.key.as_ref() != b"xml:space" {
            start.push_attribute(attr);
        }
    }
    start.push_attribute(("xml:space", "preserve"));
    start.into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body><w:p><w:r><w:t>연락처 010-12</w:t></w:r><w:r><w:t>34-5678</w:t></w:r></w:p><w:p><w:r><w:t xml:space="preserve">A &amp; B</w:t></w:r></w:p></w:body></w:document>"#;

    #[test]
    fn test_part_text() {
        let text = part_text(DOC, &WORD_PARAGRAPHS).unwrap();
        assert_eq!(text, "연락처 010-1234-5678\nA & B");
    }

    #[test]
    fn test_rewrite_spreads_over_runs() {
        let out = rewrite_part(DOC, &WORD_PARAGRAPHS, |t| t.replace("1234", "****"))
            .unwrap()
            .unwrap();
        assert!(out.contains("<w:t>연락처 010-**</w:t>"));
        assert!(out.contains("<w:t>**-5678</w:t>"));
        assert!(out.contains("A &amp; B"));
        assert!(out.starts_with("<?xml"));
    }

    #[test]
    fn test_rewrite_preserves_moved_spaces() {
        let xml = r#"<w:document xmlns:w="w"><w:body><w:p><w:r><w:t>남궁민수</w:t></w:r><w:r><w:t xml:space="preserve"> 고객</w:t></w:r></w:p></w:body></w:document>"#;
        let out = rewrite_part(xml, &WORD_PARAGRAPHS, |t| t.replace("남궁민수", "남**"))
            .unwrap()
            .unwrap();
        assert!(out.contains(r#"<w:t xml:space="preserve">남** </w:t>"#), "{}", out);
        assert!(out.contains("<w:t xml:space=\"preserve\">고객</w:t>"), "{}", out);
        assert_eq!(part_text(&out, &WORD_PARAGRAPHS).unwrap(), "남** 고객");
    }

    #[test]
    fn test_rewrite_unchanged() {
        assert!(rewrite_part(DOC, &WORD_PARAGRAPHS, |t| t.to_string())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_rules_by_entry_name() {
        assert!(docx_rules("word/document.xml").is_some());
        assert!(docx_rules("word/footer1.xml").is_some());
        assert!(docx_rules("word/_rels/document.xml.rels").is_none());
        assert!(docx_rules("[Content_Types].xml").is_none());
        assert!(xlsx_rules("xl/sharedStrings.xml").is_some());
        assert!(xlsx_rules("xl/worksheets/sheet1.xml").is_some());
        assert!(xlsx_rules("xl/styles.xml").is_none());
    }

    #[test]
    fn test_zip_roundtrip_keeps_order() {
        let entries = vec![
            ZipEntry {
                name: "b.xml".to_string(),
                data: b"<b/>".to_vec(),
                compression: CompressionMethod::Deflated,
                is_dir: false,
            },
            ZipEntry {
                name: "a.bin".to_string(),
                data: vec![1, 2, 3],
                compression: CompressionMethod::Stored,
                is_dir: false,
            },
        ];
        let bytes = write_entries(&entries).unwrap();
        let back = read_entries(&bytes).unwrap();
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].name, "b.xml");
        assert_eq!(back[1].data, vec![1, 2, 3]);
        assert_eq!(back[1].compression, CompressionMethod::Stored);
    }
}
