//! Opening documents protected by the standard security handler.

mod common;

use common::encrypted_pdf;
use pdfninja::{parse_bytes, parse_bytes_with_options, Error, OpenError, ParseOptions};

const CONTENT: &[u8] = b"BT /F1 12 Tf 72 720 Td (Hello World) Tj ET";

#[test]
fn test_open_without_password() {
    let data = encrypted_pdf(b"testpass", CONTENT);
    match parse_bytes(&data) {
        Err(Error::Open(OpenError::Encrypted)) => {}
        Err(e) => panic!("expected Encrypted, got: {e}"),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[test]
fn test_open_with_correct_password() {
    let data = encrypted_pdf(b"testpass", CONTENT);
    let doc = parse_bytes_with_options(&data, ParseOptions::new().with_password("testpass")).unwrap();

    assert_eq!(doc.page_count(), 1);
    assert!(doc.metadata.encrypted);
    assert_eq!(doc.metadata.title.as_deref(), Some("Integration"));
    assert_eq!(doc.plain_text(), "Hello World");
}

#[test]
fn test_open_with_wrong_password() {
    let data = encrypted_pdf(b"testpass", CONTENT);
    match parse_bytes_with_options(&data, ParseOptions::new().with_password("wrongpass")) {
        Err(Error::Open(OpenError::InvalidPassword)) => {}
        Err(e) => panic!("expected InvalidPassword, got: {e}"),
        Ok(_) => panic!("expected error, got Ok"),
    }
}

#[test]
fn test_password_on_plain_document_is_ignored() {
    let data = common::pdf_with_pages(vec![common::text_page("Hi")]);
    let doc = parse_bytes_with_options(&data, ParseOptions::new().with_password("anything")).unwrap();
    assert!(!doc.metadata.encrypted);
    assert_eq!(doc.plain_text(), "Hi");
}
