//! Directory ingestion.

mod common;

use std::fs;

use common::{pdf_with_pages, text_page, REPORT_PAGE};
use pdfninja::{DirectoryReader, TextOptions};

#[test]
fn test_reads_nested_directory() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("report.pdf"), pdf_with_pages(vec![REPORT_PAGE.to_vec()])).unwrap();
    fs::create_dir(dir.path().join("archive")).unwrap();
    fs::write(
        dir.path().join("archive").join("memo.pdf"),
        pdf_with_pages(vec![text_page("Memo one"), text_page("Memo two")]),
    )
    .unwrap();
    fs::write(dir.path().join("readme.md"), "# not a pdf").unwrap();

    let docs = DirectoryReader::new(dir.path()).load_data().unwrap();
    assert_eq!(docs.len(), 2);

    let memo = docs.iter().find(|d| d.metadata.file_name == "memo.pdf").unwrap();
    assert_eq!(memo.metadata.page_count, 2);
    assert!(memo.text.contains("Memo one"));
    assert!(memo.text.contains("Memo two"));

    let report = docs.iter().find(|d| d.metadata.file_name == "report.pdf").unwrap();
    assert!(report.text.contains("Quarterly report"));
    assert!(report.text.contains("Alice"));
}

#[test]
fn test_text_options_without_tables() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("report.pdf"), pdf_with_pages(vec![REPORT_PAGE.to_vec()])).unwrap();

    let docs = DirectoryReader::new(dir.path())
        .with_text_options(TextOptions::new().with_tables(false))
        .load_data()
        .unwrap();
    assert_eq!(docs.len(), 1);
    assert!(docs[0].text.contains("Quarterly report"));
}

#[test]
fn test_rag_document_serializes() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("a.pdf"), pdf_with_pages(vec![text_page("Alpha")])).unwrap();

    let rx = DirectoryReader::new(dir.path()).stream().unwrap();
    let docs: Vec<_> = rx.iter().collect();
    assert_eq!(docs.len(), 1);

    let json = serde_json::to_value(&docs[0]).unwrap();
    assert_eq!(json["metadata"]["file_name"], "a.pdf");
    assert_eq!(json["metadata"]["page_count"], 1);
    assert_eq!(json["text"], "Alpha");
}
