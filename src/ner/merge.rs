//! Collapse begin/inside/outside tag sequences into labeled spans.

use crate::model::{EntityLabel, EntitySpan, Tag, TaggedUnit};

/// Merge tagged units into contiguous entity spans.
///
/// A begin tag closes any open span and opens a new one. An inside tag
/// extends the open span only when its label matches; any other tag
/// closes the open span without opening a new one. Spans never straddle
/// two labels and never overlap.
pub fn merge_entities(units: &[TaggedUnit]) -> Vec<EntitySpan> {
    let mut spans = Vec::new();
    let mut open: Option<(EntityLabel, usize, String)> = None;

    for unit in units {
        match unit.tag {
            Tag::Begin(label) => {
                if let Some((l, start, text)) = open.take() {
                    spans.push(EntitySpan::new(text, l, start));
                }
                open = Some((label, unit.position, unit.text.clone()));
            }
            Tag::Inside(label) if matches!(&open, Some((l, _, _)) if *l == label) => {
                if let Some((_, _, text)) = open.as_mut() {
                    text.push_str(&unit.text);
                }
            }
            _ => {
                if let Some((l, start, text)) = open.take() {
                    spans.push(EntitySpan::new(text, l, start));
                }
            }
        }
    }
    if let Some((l, start, text)) = open {
        spans.push(EntitySpan::new(text, l, start));
    }
    spans
}

#[cfg(test)]
mod tests {
    use super::*;

    fn units(text: &str, tags: &[&str]) -> Vec<TaggedUnit> {
        text.chars()
            .zip(tags)
            .enumerate()
            .map(|(i, (c, t))| TaggedUnit::new(c.to_string(), Tag::parse(t), i))
            .collect()
    }

    #[test]
    fn test_basic_merge() {
        let tagged = units(
            "홍길동 씨",
            &["B-이름", "I-이름", "I-이름", "O", "O"],
        );
        let spans = merge_entities(&tagged);
        assert_eq!(spans, vec![EntitySpan::new("홍길동", EntityLabel::Name, 0)]);
    }

    #[test]
    fn test_label_mismatch_closes_span() {
        let tagged = units("ab12", &["B-이름", "I-이름", "I-전화번호", "I-전화번호"]);
        let spans = merge_entities(&tagged);
        assert_eq!(spans, vec![EntitySpan::new("ab", EntityLabel::Name, 0)]);
    }

    #[test]
    fn test_begin_closes_previous() {
        let tagged = units("abcd", &["B-이름", "I-이름", "B-이름", "I-이름"]);
        let spans = merge_entities(&tagged);
        assert_eq!(
            spans,
            vec![
                EntitySpan::new("ab", EntityLabel::Name, 0),
                EntitySpan::new("cd", EntityLabel::Name, 2),
            ]
        );
    }

    #[test]
    fn test_flush_at_end() {
        let tagged = units("x@y", &["O", "B-이메일", "I-이메일"]);
        let spans = merge_entities(&tagged);
        assert_eq!(spans, vec![EntitySpan::new("@y", EntityLabel::Email, 1)]);
    }

    #[test]
    fn test_spans_never_overlap() {
        let tags = ["B-이름", "I-주소", "B-주소", "I-주소", "O", "I-이름", "B-이메일", "I-이메일"];
        let tagged = units("abcdefgh", &tags);
        let spans = merge_entities(&tagged);
        for pair in spans.windows(2) {
            assert!(pair[0].end() <= pair[1].start);
        }
        assert_eq!(spans.len(), 3);
    }

    #[test]
    fn test_empty_input() {
        assert!(merge_entities(&[]).is_empty());
    }
}
