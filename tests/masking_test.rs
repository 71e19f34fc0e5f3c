//! Integration tests for text detection and masking.

mod common;

use std::sync::Arc;

use common::WordLabeler;
use unpii::{apply_regex_pass, EntityLabel, MaskingEngine, Pipeline, PipelineOptions, Tagger};

fn regex_pipeline() -> Pipeline {
    Pipeline::with_engine(MaskingEngine::regex_only(), PipelineOptions::new())
}

fn tagged_pipeline(words: Vec<(&'static str, &'static str)>) -> Pipeline {
    let tagger = Tagger::with_labeler(Arc::new(WordLabeler(words)));
    Pipeline::with_engine(MaskingEngine::new(Arc::new(tagger)), PipelineOptions::new())
}

#[test]
fn test_national_id_and_phone() {
    let pipeline = regex_pipeline();
    let text = "주민번호 900101-1234567 연락처 010-1234-5678";

    let report = pipeline.scan_text(text);
    assert_eq!(report.counts.get(EntityLabel::NationalId), 1);
    assert_eq!(report.counts.get(EntityLabel::Phone), 1);
    assert_eq!(report.counts.total(), 2);

    let masked = pipeline.mask_text(text);
    assert_eq!(masked, "주민번호 900101-******* 연락처 010-****-5678");
}

#[test]
fn test_email() {
    let pipeline = regex_pipeline();
    let report = pipeline.scan_text("email: test@example.com");
    assert_eq!(report.counts.get(EntityLabel::Email), 1);
    assert_eq!(pipeline.mask_text("email: test@example.com"), "email: t***@example.com");
}

#[test]
fn test_repeated_entity_masked_twice() {
    let pipeline = tagged_pipeline(vec![("홍길동", "이름")]);
    let text = "담당 홍길동 (010-1234-5678), 승인 홍길동 (010-1234-5678)";

    let report = pipeline.scan_text(text);
    assert_eq!(report.counts.get(EntityLabel::Name), 2);
    assert_eq!(report.counts.get(EntityLabel::Phone), 2);

    let masked = pipeline.mask_text(text);
    assert_eq!(masked, "담당 홍** (010-****-5678), 승인 홍** (010-****-5678)");
}

#[test]
fn test_tagger_and_regex_counts_take_max() {
    // The tagger sees one phone number, the regex table two.
    let pipeline = tagged_pipeline(vec![("010-1234-5678", "전화번호")]);
    let report = pipeline.scan_text("010-1234-5678 / 02-123-4567");
    assert_eq!(report.counts.get(EntityLabel::Phone), 2);
    assert!(report.tagger_available);
}

#[test]
fn test_mask_twice_is_stable() {
    let pipeline = tagged_pipeline(vec![("김철수", "이름")]);
    let text = "김철수 900101-1234567 1234-5678-9012-3456 a.b@corp.co.kr 110-123-456789";

    let once = pipeline.mask_text(text);
    assert_ne!(once, text);
    assert_eq!(pipeline.mask_text(&once), once);
    assert_eq!(apply_regex_pass(&once), once);
    assert!(!pipeline.scan_text(&once).contains_pii());
}

#[test]
fn test_clean_text_unchanged() {
    let pipeline = regex_pipeline();
    let text = "다음 회의는 3월 4일 10시입니다.";
    assert_eq!(pipeline.mask_text(text), text);
    assert!(!pipeline.scan_text(text).contains_pii());
}

#[test]
fn test_decomposed_hangul_is_normalized() {
    use unicode_normalization::UnicodeNormalization;

    let pipeline = regex_pipeline();
    // Conjoining jamo, as some PDFs emit Hangul.
    let decomposed: String = "주민번호 900101-1234567".nfd().collect();
    assert_ne!(decomposed, "주민번호 900101-1234567");
    assert_eq!(pipeline.mask_text(&decomposed), "주민번호 900101-*******");
}

#[test]
fn test_sensitive_terms_reported() {
    let pipeline = regex_pipeline();
    let report = pipeline.scan_text("[Confidential] 내부자료 공유");
    assert!(!report.contains_pii());
    assert!(report.is_sensitive());
    assert_eq!(report.keyword_hits.len(), 2);
}
