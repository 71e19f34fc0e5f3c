//! Integration tests for text-bearing formats: txt, csv, docx, xlsx.

mod common;

use common::{docx, xlsx, zip_entry};
use unpii::{
    Document, DocumentFormat, EntityLabel, MaskingEngine, Pipeline, PipelineOptions, ScanStatus,
};

fn pipeline() -> Pipeline {
    Pipeline::with_engine(MaskingEngine::regex_only(), PipelineOptions::new().sequential())
}

#[test]
fn test_cp949_text() {
    let (encoded, _, _) = encoding_rs::EUC_KR.encode("연락처 010-1234-5678");
    let doc = Document::new("memo.txt", encoded.into_owned()).unwrap();

    let report = pipeline().scan_document(&doc);
    assert_eq!(report.status, ScanStatus::Complete);
    assert_eq!(report.counts.get(EntityLabel::Phone), 1);

    let masked = pipeline().mask_document(&doc).unwrap();
    assert_eq!(masked.name, "masked_memo.txt");
    assert_eq!(masked.text(), Some("연락처 010-****-5678"));
}

#[test]
fn test_csv_counts_and_mask_per_cell() {
    let data = "이름,주민번호,이메일\n홍길동,900101-1234567,hong@example.com\n김영희,850505-2345678,kim@example.com\n";
    let doc = Document::new("members.csv", data).unwrap();

    let report = pipeline().scan_document(&doc);
    assert_eq!(report.counts.get(EntityLabel::NationalId), 2);
    assert_eq!(report.counts.get(EntityLabel::Email), 2);

    let masked = pipeline().mask_document(&doc).unwrap();
    assert_eq!(masked.format, DocumentFormat::Csv);
    assert_eq!(masked.counts.get(EntityLabel::NationalId), 2);

    let text = String::from_utf8(masked.into_bytes()).unwrap();
    let text = text.trim_start_matches('\u{feff}');
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "이름,주민번호,이메일");
    assert_eq!(lines[1], "홍길동,900101-*******,h***@example.com");
    assert_eq!(lines[2], "김영희,850505-*******,k***@example.com");
}

#[test]
fn test_docx_scan_and_mask() {
    let data = docx(&["고객 연락처: 010-9876-5432", "카드 1234-5678-9012-3456", "일반 문단"]);
    let doc = Document::new("contract.docx", data).unwrap();

    let report = pipeline().scan_document(&doc);
    assert_eq!(report.status, ScanStatus::Complete);
    assert_eq!(report.counts.get(EntityLabel::Phone), 1);
    assert_eq!(report.counts.get(EntityLabel::CardNumber), 1);

    let masked = pipeline().mask_document(&doc).unwrap();
    assert_eq!(masked.name, "masked_contract.docx");
    assert!(masked.as_bytes().starts_with(b"PK"));

    let xml = zip_entry(masked.as_bytes(), "word/document.xml");
    assert!(xml.contains("010-****-5432"));
    assert!(xml.contains("1234-****-****-3456"));
    assert!(xml.contains("일반 문단"));
    assert!(!xml.contains("9876"));

    // The untouched part is carried over as is.
    let types = zip_entry(masked.as_bytes(), "[Content_Types].xml");
    assert!(types.contains("content-types"));

    let rescanned = Document::new("again.docx", masked.into_bytes()).unwrap();
    assert!(!pipeline().scan_document(&rescanned).contains_pii());
}

#[test]
fn test_xlsx_scan_and_mask() {
    let data = xlsx(&["홍길동", "010-1234-5678", "seoul@example.com"]);
    let doc = Document::new("list.xlsx", data).unwrap();

    let report = pipeline().scan_document(&doc);
    assert_eq!(report.status, ScanStatus::Complete);
    assert_eq!(report.counts.get(EntityLabel::Phone), 1);
    assert_eq!(report.counts.get(EntityLabel::Email), 1);

    let masked = pipeline().mask_document(&doc).unwrap();
    let shared = zip_entry(masked.as_bytes(), "xl/sharedStrings.xml");
    assert!(shared.contains("<t>010-****-5678</t>"));
    assert!(shared.contains("<t>s***@example.com</t>"));
    assert!(shared.contains("<t>홍길동</t>"));

    let rescanned = Document::new("again.xlsx", masked.into_bytes()).unwrap();
    let report = pipeline().scan_document(&rescanned);
    assert_eq!(report.status, ScanStatus::Complete);
    assert!(!report.contains_pii());
}

#[test]
fn test_broken_archive_fails_without_panicking() {
    let doc = Document::with_format("broken.docx", DocumentFormat::Docx, b"PK\x03\x04junk".to_vec());
    let report = pipeline().scan_document(&doc);
    assert_eq!(report.status, ScanStatus::Failed);
    assert!(report.has_warnings());
    assert!(pipeline().mask_document(&doc).is_err());
}
