//! Applying redactions to a page's content stream.
//!
//! Text is removed, not covered: the bytes of every targeted glyph are
//! cut out of their string operand and replaced by an equivalent `TJ`
//! displacement, so the rest of the line keeps its position. Opaque
//! rectangles are then painted over the removed area.

use std::collections::{BTreeMap, BTreeSet};

use lopdf::content::{Content, Operation};
use lopdf::{Object, Stream};

use super::backend::{PageId, PdfDocument};
use super::content::{Glyph, PageContent, Rect};
use crate::error::{Error, Result};

/// Remove the targeted glyphs from a page and paint boxes over them.
///
/// `targets` are `(run, glyph)` indices into `content.runs`. Returns the
/// number of rectangles painted. The page is rewritten as a whole, or
/// not at all.
pub fn redact_page(
    pdf: &mut PdfDocument,
    page: PageId,
    content: &PageContent,
    targets: &[(usize, usize)],
) -> Result<usize> {
    if targets.is_empty() {
        return Ok(0);
    }

    let removed = expand_targets(content, targets);
    let rects = redaction_rects(content, &removed);

    let mut by_run: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for &(run, glyph) in &removed {
        by_run.entry(run).or_default().insert(glyph);
    }
    let mut replacements: BTreeMap<usize, Vec<Operation>> = BTreeMap::new();
    for (run_index, glyphs) in &by_run {
        let run = &content.runs[*run_index];
        let op = &content.operations[run.op_index];
        replacements.insert(run.op_index, rewrite_op(op, &run.glyphs, glyphs)?);
    }

    let mut operations = Vec::with_capacity(content.operations.len() + rects.len() * 5 + 2);
    operations.push(Operation::new("q", vec![]));
    for (index, op) in content.operations.iter().enumerate() {
        match replacements.remove(&index) {
            Some(ops) => operations.extend(ops),
            None => operations.push(op.clone()),
        }
    }
    operations.push(Operation::new("Q", vec![]));
    for rect in &rects {
        operations.extend(fill_rect(rect));
    }

    let bytes = Content { operations }
        .encode()
        .map_err(|e| Error::Redaction(format!("encode content: {}", e)))?;
    set_page_content(pdf, page, bytes)?;
    Ok(rects.len())
}

/// Operations painting one opaque black rectangle.
pub fn fill_rect(rect: &Rect) -> Vec<Operation> {
    vec![
        Operation::new("q", vec![]),
        Operation::new("rg", vec![0.into(), 0.into(), 0.into()]),
        Operation::new(
            "re",
            vec![
                rect.x0.into(),
                rect.y0.into(),
                rect.width().into(),
                rect.height().into(),
            ],
        ),
        Operation::new("f", vec![]),
        Operation::new("Q", vec![]),
    ]
}

/// Glyphs without exact byte provenance take their whole string with them.
fn expand_targets(content: &PageContent, targets: &[(usize, usize)]) -> BTreeSet<(usize, usize)> {
    let mut removed = BTreeSet::new();
    for &(run_index, glyph_index) in targets {
        let Some(run) = content.runs.get(run_index) else {
            continue;
        };
        let Some(glyph) = run.glyphs.get(glyph_index) else {
            continue;
        };
        removed.insert((run_index, glyph_index));
        if !glyph.exact {
            for (i, other) in run.glyphs.iter().enumerate() {
                if other.item == glyph.item {
                    removed.insert((run_index, i));
                }
            }
        }
    }
    removed
}

/// One rectangle per stretch of consecutive removed glyphs.
fn redaction_rects(content: &PageContent, removed: &BTreeSet<(usize, usize)>) -> Vec<Rect> {
    let mut rects: Vec<Rect> = Vec::new();
    let mut last: Option<(usize, usize)> = None;
    for &(run, glyph) in removed {
        let rect = content.runs[run].glyphs[glyph].rect;
        let contiguous = matches!(last, Some((r, g)) if r == run && g + 1 == glyph);
        match rects.last_mut() {
            Some(current) if contiguous => *current = current.union(&rect),
            _ => rects.push(rect),
        }
        last = Some((run, glyph));
    }
    rects.retain(|r| r.width() > 0.0 && r.height() > 0.0);
    rects
}

/// Replacement operations for one text-showing operator.
fn rewrite_op(op: &Operation, glyphs: &[Glyph], removed: &BTreeSet<usize>) -> Result<Vec<Operation>> {
    let operands = &op.operands;
    let array = |items: Vec<Object>| Operation::new("TJ", vec![Object::Array(items)]);

    match op.operator.as_str() {
        "Tj" => {
            let items = rewrite_item(operands.first(), 0, glyphs, removed)?;
            Ok(vec![array(items)])
        }
        "TJ" => {
            let Some(Object::Array(original)) = operands.first() else {
                return Err(Error::Redaction("TJ without array operand".to_string()));
            };
            let mut items = Vec::with_capacity(original.len());
            for (index, obj) in original.iter().enumerate() {
                match obj {
                    Object::String(..) => {
                        items.extend(rewrite_item(Some(obj), index, glyphs, removed)?)
                    }
                    other => items.push(other.clone()),
                }
            }
            Ok(vec![array(items)])
        }
        "'" => {
            let items = rewrite_item(operands.first(), 0, glyphs, removed)?;
            Ok(vec![Operation::new("T*", vec![]), array(items)])
        }
        "\"" => {
            let (Some(aw), Some(ac)) = (operands.first(), operands.get(1)) else {
                return Err(Error::Redaction("\" without spacing operands".to_string()));
            };
            let items = rewrite_item(operands.get(2), 0, glyphs, removed)?;
            Ok(vec![
                Operation::new("Tw", vec![aw.clone()]),
                Operation::new("Tc", vec![ac.clone()]),
                Operation::new("T*", vec![]),
                array(items),
            ])
        }
        other => Err(Error::Redaction(format!(
            "operator {} does not show text",
            other
        ))),
    }
}

/// Split one string operand into kept strings and displacements.
fn rewrite_item(
    operand: Option<&Object>,
    item: usize,
    glyphs: &[Glyph],
    removed: &BTreeSet<usize>,
) -> Result<Vec<Object>> {
    let Some(Object::String(bytes, format)) = operand else {
        return Err(Error::Redaction("missing string operand".to_string()));
    };
    let touched = glyphs
        .iter()
        .enumerate()
        .any(|(index, g)| g.item == item && removed.contains(&index));
    if !touched {
        return Ok(vec![Object::String(bytes.clone(), format.clone())]);
    }

    let mut out = Vec::new();
    let mut kept: Vec<u8> = Vec::new();
    let mut gap = 0.0f32;
    let mut cursor = 0usize;

    for (index, glyph) in glyphs.iter().enumerate().filter(|(_, g)| g.item == item) {
        if removed.contains(&index) {
            if !kept.is_empty() {
                out.push(Object::String(std::mem::take(&mut kept), format.clone()));
            }
            gap += glyph.advance;
        } else {
            if gap != 0.0 {
                out.push(Object::Real(-gap));
                gap = 0.0;
            }
            if glyph.exact {
                let range = glyph.bytes.start.max(cursor)..glyph.bytes.end.min(bytes.len());
                if range.start < range.end {
                    kept.extend_from_slice(&bytes[range]);
                }
            }
        }
        cursor = cursor.max(glyph.bytes.end);
    }
    if !kept.is_empty() {
        out.push(Object::String(kept, format.clone()));
    }
    if gap != 0.0 {
        out.push(Object::Real(-gap));
    }
    Ok(out)
}

/// Point the page at a fresh content stream and drop the old ones.
fn set_page_content(pdf: &mut PdfDocument, page: PageId, bytes: Vec<u8>) -> Result<()> {
    let doc = pdf.raw_doc_mut();
    let mut stream = Stream::new(lopdf::Dictionary::new(), bytes);
    // Uncompressible content keeps the plain stream.
    let _ = stream.compress();
    let stream_id = doc.add_object(stream);
    let page_dict = doc
        .get_object_mut(page)
        .and_then(|o| o.as_dict_mut())
        .map_err(|e| Error::Redaction(format!("page dictionary: {}", e)))?;
    page_dict.set("Contents", Object::Reference(stream_id));
    doc.prune_objects();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use lopdf::StringFormat;

    fn string(s: &str) -> Object {
        Object::String(s.as_bytes().to_vec(), StringFormat::Literal)
    }

    fn describe(items: &[Object]) -> Vec<String> {
        items
            .iter()
            .map(|o| match o {
                Object::String(bytes, _) => String::from_utf8_lossy(bytes).to_string(),
                Object::Integer(i) => i.to_string(),
                Object::Real(r) => r.to_string(),
                _ => "?".to_string(),
            })
            .collect()
    }

    fn page(ops: Vec<Operation>) -> PageContent {
        PageContent::walk(ops, &BTreeMap::new())
    }

    fn preamble() -> Vec<Operation> {
        vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec![Object::Name(b"F1".to_vec()), 10.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
        ]
    }

    #[test]
    fn test_rewrite_tj_cuts_bytes() {
        let mut ops = preamble();
        ops.push(Operation::new("Tj", vec![string("ab12cd")]));
        let content = page(ops);
        let run = &content.runs[0];
        let removed: BTreeSet<usize> = [2, 3].into_iter().collect();
        let rewritten = rewrite_op(&content.operations[run.op_index], &run.glyphs, &removed).unwrap();
        assert_eq!(rewritten.len(), 1);
        assert_eq!(rewritten[0].operator, "TJ");
        let Object::Array(items) = &rewritten[0].operands[0] else {
            panic!("expected array");
        };
        assert_eq!(describe(items), vec!["ab", "-1000", "cd"]);
    }

    #[test]
    fn test_rewrite_tj_array_keeps_numbers() {
        let mut ops = preamble();
        ops.push(Operation::new(
            "TJ",
            vec![Object::Array(vec![string("ab"), (-250).into(), string("99")])],
        ));
        let content = page(ops);
        let run = &content.runs[0];
        let removed: BTreeSet<usize> = [2, 3].into_iter().collect();
        let rewritten = rewrite_op(&content.operations[run.op_index], &run.glyphs, &removed).unwrap();
        let Object::Array(items) = &rewritten[0].operands[0] else {
            panic!("expected array");
        };
        assert_eq!(describe(items), vec!["ab", "-250", "-1000"]);
    }

    #[test]
    fn test_rewrite_double_quote_expands() {
        let mut ops = preamble();
        ops.push(Operation::new("\"", vec![1.into(), 0.into(), string("x")]));
        let content = page(ops);
        let run = &content.runs[0];
        let removed: BTreeSet<usize> = [0].into_iter().collect();
        let rewritten = rewrite_op(&content.operations[run.op_index], &run.glyphs, &removed).unwrap();
        let operators: Vec<&str> = rewritten.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(operators, vec!["Tw", "Tc", "T*", "TJ"]);
    }

    #[test]
    fn test_rects_merge_contiguous_glyphs() {
        let mut ops = preamble();
        ops.push(Operation::new("Tj", vec![string("abcdef")]));
        let content = page(ops);
        let removed: BTreeSet<(usize, usize)> = [(0, 1), (0, 2), (0, 4)].into_iter().collect();
        let rects = redaction_rects(&content, &removed);
        assert_eq!(rects.len(), 2);
        assert!((rects[0].x0 - 77.0).abs() < 0.01);
        assert!((rects[0].x1 - 87.0).abs() < 0.01);
    }

    #[test]
    fn test_fill_rect_ops() {
        let ops = fill_rect(&Rect {
            x0: 1.0,
            y0: 2.0,
            x1: 11.0,
            y1: 7.0,
        });
        let operators: Vec<&str> = ops.iter().map(|o| o.operator.as_str()).collect();
        assert_eq!(operators, vec!["q", "rg", "re", "f", "Q"]);
        assert_eq!(describe(&ops[2].operands), vec!["1", "2", "10", "5"]);
    }
}
