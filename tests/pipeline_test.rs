//! Integration tests for batches, messages, settings and audit records.

mod common;

use std::sync::Arc;

use common::{docx, scanned_pdf, FixedOcr};
use unpii::pipeline::{AttachmentContent, MaskOutcome};
use unpii::{
    BoundingBox, Document, DocumentFormat, EntityLabel, FailurePolicy, JsonLinesAuditSink,
    MaskingEngine, OcrToken, Pipeline, PipelineOptions, ScanStatus, Settings, Severity,
};

fn pipeline(options: PipelineOptions) -> Pipeline {
    Pipeline::with_engine(MaskingEngine::regex_only(), options.with_dpi(72))
        .with_ocr(Arc::new(FixedOcr::new(vec![
            OcrToken::new("phone", BoundingBox::new(4, 4, 30, 10)),
            OcrToken::new("010-2222-3333", BoundingBox::new(40, 4, 60, 10)),
        ])))
}

fn attachments() -> Vec<Document> {
    vec![
        Document::new("notes.txt", "회의록: 특이사항 없음").unwrap(),
        Document::new("members.csv", "name,rrn\nkim,900101-1234567\n").unwrap(),
        Document::new("scan.pdf", scanned_pdf(120, 40)).unwrap(),
        Document::new("letter.docx", docx(&["email a@b.com"])).unwrap(),
    ]
}

#[test]
fn test_batch_scans_every_document() {
    let docs = attachments();
    let batch = pipeline(PipelineOptions::new()).process_batch(&docs, false);

    assert_eq!(batch.results.len(), 4);
    assert_eq!(batch.results[0].report.name, "notes.txt");
    assert!(!batch.results[0].report.contains_pii());
    assert_eq!(batch.results[1].report.counts.get(EntityLabel::NationalId), 1);
    assert_eq!(batch.results[2].report.counts.get(EntityLabel::Phone), 1);
    assert_eq!(batch.results[3].report.counts.get(EntityLabel::Email), 1);
    assert!(batch.results.iter().all(|r| matches!(r.outcome, MaskOutcome::NotMasked)));

    assert_eq!(batch.summary.documents, 4);
    assert_eq!(batch.summary.counts.total(), 3);
    assert!(batch.contains_pii());
    // The national ID blocks the submission.
    assert!(batch.is_blocked());
}

#[test]
fn test_batch_masks_only_sensitive_documents() {
    let docs = attachments();
    let batch = pipeline(PipelineOptions::new().sequential()).process_batch(&docs, true);

    assert!(matches!(batch.results[0].outcome, MaskOutcome::NotMasked));
    for result in &batch.results[1..] {
        assert!(result.outcome.is_masked(), "{} not masked", result.report.name);
    }
    match &batch.results[1].outcome {
        MaskOutcome::Masked(output) => {
            assert_eq!(output.name, "masked_members.csv");
            let text = String::from_utf8_lossy(output.as_bytes()).to_string();
            assert!(text.contains("900101-*******"));
        }
        other => panic!("unexpected outcome {:?}", other),
    }
}

#[test]
fn test_parallel_and_sequential_agree() {
    let docs = attachments();
    let parallel = pipeline(PipelineOptions::new()).process_batch(&docs, false);
    let sequential = pipeline(PipelineOptions::new().sequential()).process_batch(&docs, false);
    assert_eq!(parallel.summary, sequential.summary);
}

#[test]
fn test_unsupported_attachment_skipped() {
    let doc = Document::with_format("data.bin", DocumentFormat::Png, b"not an image".to_vec());
    let report = pipeline(PipelineOptions::new()).scan_document(&doc);
    assert_eq!(report.status, ScanStatus::Failed);
    assert!(report.has_warnings());

    let err = Document::new("archive.hwp", b"HWP".to_vec()).unwrap_err();
    let report = unpii::pipeline::skipped_report("archive.hwp", 3, &err);
    assert_eq!(report.status, ScanStatus::Skipped);
}

#[test]
fn test_message_scan() {
    let docs: Vec<Document> = attachments().into_iter().take(2).collect();
    let scan = pipeline(PipelineOptions::new()).scan_message(
        "[기밀] 회원 명단",
        "담당자 연락처 010-1234-5678, 자료는 https://bit.ly/abc 참고",
        &docs,
    );

    assert_eq!(
        scan.masked_body,
        "담당자 연락처 010-****-5678, 자료는 https://bit.ly/abc 참고"
    );
    assert!(scan.warnings.iter().any(|w| w.contains("subject") && w.contains("기밀")));
    assert!(scan.warnings.iter().any(|w| w.contains("body contains personal information")));
    assert!(scan.warnings.iter().any(|w| w.contains("https://bit.ly/abc")));
    assert!(scan.warnings.iter().any(|w| w.starts_with("members.csv")));
    assert!(!scan.warnings.iter().any(|w| w.starts_with("notes.txt")));

    assert_eq!(scan.attachments.len(), 2);
    assert!(matches!(scan.attachments[0].content, AttachmentContent::Original));
    assert!(matches!(scan.attachments[1].content, AttachmentContent::Masked(_)));
    assert!(!scan.is_clean());
    assert!(scan
        .violations
        .iter()
        .any(|v| v.severity == Severity::Block && v.document.as_deref() == Some("members.csv")));
}

#[test]
fn test_message_with_unreadable_attachment() {
    let docs = vec![
        Document::new("notes.txt", "회의록: 특이사항 없음").unwrap(),
        Document::with_format("scan.pdf", DocumentFormat::Pdf, b"%PDF-1.4 corrupt".to_vec()),
    ];

    let withhold = pipeline(PipelineOptions::new().with_failure_policy(FailurePolicy::Withhold));
    let scan = withhold.scan_message("주간 보고", "첨부 확인 부탁드립니다.", &docs);
    assert_eq!(scan.attachments[1].report.status, ScanStatus::Failed);
    assert!(matches!(scan.attachments[0].content, AttachmentContent::Original));
    assert!(matches!(scan.attachments[1].content, AttachmentContent::Withheld));
    assert!(scan
        .warnings
        .iter()
        .any(|w| w.starts_with("scan.pdf: could not be scanned")));
    assert!(!scan.is_clean());

    let keep = pipeline(PipelineOptions::new());
    let scan = keep.scan_message("주간 보고", "첨부 확인 부탁드립니다.", &docs);
    assert!(matches!(scan.attachments[1].content, AttachmentContent::Original));
    assert_eq!(scan.warnings.len(), 1);
    assert!(!scan.is_clean());
}

#[test]
fn test_clean_message() {
    let docs: Vec<Document> = attachments().into_iter().take(1).collect();
    let scan = pipeline(PipelineOptions::new()).scan_message(
        "주간 회의",
        "다음 주 일정 공유드립니다.",
        &docs,
    );
    assert!(scan.warnings.is_empty());
    assert!(scan.is_clean());
}

#[test]
fn test_settings_custom_pattern_and_policy() {
    let settings = Settings::from_json(
        r#"{
            "patterns": { "사번": "EMP-[0-9]{5}" },
            "sensitive_terms": ["대외비"],
            "policy": { "max_files": 1, "block_if_national_id": false, "warn_if_email": false }
        }"#,
    )
    .unwrap();
    let pipeline = pipeline(PipelineOptions::new()).with_settings(&settings).unwrap();

    let report = pipeline.scan_text("대외비: 사번 EMP-00123, 주민번호 900101-1234567");
    assert_eq!(report.custom_counts.get("사번"), Some(&1));
    assert_eq!(report.keyword_hits, vec!["대외비".to_string()]);
    assert_eq!(pipeline.mask_text("사번 EMP-00123"), "사번 ***");

    let docs: Vec<Document> = attachments().into_iter().take(2).collect();
    let batch = pipeline.process_batch(&docs, false);
    assert_eq!(batch.violations.len(), 1);
    assert_eq!(batch.violations[0].severity, Severity::Block);
    assert!(batch.violations[0].document.is_none());
}

#[test]
fn test_audit_log_written() {
    let dir = tempfile::tempdir().unwrap();
    let sink = Arc::new(JsonLinesAuditSink::new(dir.path().join("audit.jsonl")));
    let pipeline = pipeline(PipelineOptions::new().sequential())
        .with_audit_sink(sink.clone())
        .with_user("auditor");

    let docs: Vec<Document> = attachments().into_iter().take(2).collect();
    pipeline.process_batch(&docs, true);

    let records = sink.read_all().unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.user == "auditor"));
    let members = records.iter().find(|r| r.name == "members.csv").unwrap();
    assert!(members.has_pii);
    assert!(members.masked);
    assert_eq!(members.counts.get(EntityLabel::NationalId), 1);
    let notes = records.iter().find(|r| r.name == "notes.txt").unwrap();
    assert!(!notes.masked);
}
