//! Document-level types.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ElementKind, PdfPage};
use crate::error::ExtractionError;

/// Separator placed between pages by [`ParsedPdf::stringify`].
pub const PAGE_BREAK: &str = "\n\n--- PAGE BREAK ---\n\n";

/// A fully parsed PDF document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedPdf {
    /// Source identifier (file path or caller-supplied name)
    pub source: String,

    /// Document metadata
    pub metadata: Metadata,

    /// Pages in ascending page number
    pub pages: Vec<PdfPage>,

    /// Every extraction failure that was recovered during the parse
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl ParsedPdf {
    /// Get the number of pages produced.
    pub fn page_count(&self) -> u32 {
        self.pages.len() as u32
    }

    /// Get a page by number (1-indexed).
    pub fn get_page(&self, page_number: u32) -> Option<&PdfPage> {
        self.pages.iter().find(|p| p.page_number == page_number)
    }

    /// Check if the document has any pages.
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Check if anything was skipped during extraction.
    pub fn has_diagnostics(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    /// Flatten the whole document to text, pages joined by [`PAGE_BREAK`].
    /// Empty pages are skipped.
    pub fn stringify(&self, include_tables: bool, include_images: bool) -> String {
        self.pages
            .iter()
            .map(|p| p.stringify(include_tables, include_images))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(PAGE_BREAK)
    }

    /// Plain text with tables and without images.
    pub fn plain_text(&self) -> String {
        self.stringify(true, false)
    }
}

/// Document metadata.
///
/// Serializes as one flat mapping; absent optional keys are omitted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Document title
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Document author
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Document subject
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Keywords
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,

    /// Creator application
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creator: Option<String>,

    /// PDF producer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub producer: Option<String>,

    /// Creation date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creation_date: Option<DateTime<Utc>>,

    /// Last modification date
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mod_date: Option<DateTime<Utc>>,

    /// Total number of pages in the source
    pub page_count: u32,

    /// Whether the source is encrypted
    pub encrypted: bool,

    /// Which password unlocked the document (`user` or `owner`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decrypted_with: Option<String>,

    /// PDF version (e.g., "1.7")
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pdf_version: Option<String>,

    /// Any other document-level keys
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl Metadata {
    /// Metadata that only knows the page count.
    pub fn with_page_count(page_count: u32) -> Self {
        Self {
            page_count,
            ..Default::default()
        }
    }
}

/// A recovered extraction failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Affected page, `None` for document-level extractors
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_number: Option<u32>,

    /// Extractor that failed; its elements are missing from the page
    pub extractor: ElementKind,

    /// Human-readable cause
    pub message: String,
}

impl From<&ExtractionError> for Diagnostic {
    fn from(err: &ExtractionError) -> Self {
        Self {
            page_number: err.page_number,
            extractor: err.extractor,
            message: err.kind.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_omits_absent_keys() {
        let mut metadata = Metadata::with_page_count(3);
        metadata.title = Some("Report".into());
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["title"], "Report");
        assert_eq!(json["page_count"], 3);
        assert!(json.get("author").is_none());
        assert!(json.get("creation_date").is_none());
    }

    #[test]
    fn test_metadata_extra_is_flattened() {
        let mut metadata = Metadata::with_page_count(1);
        metadata.extra.insert("source".into(), Value::from("a.pdf"));
        let json = serde_json::to_value(&metadata).unwrap();
        assert_eq!(json["source"], "a.pdf");
        assert!(json.get("extra").is_none());
    }

    #[test]
    fn test_diagnostic_from_error() {
        let err = ExtractionError::backend(ElementKind::Table, 2, "boom");
        let diag = Diagnostic::from(&err);
        assert_eq!(diag.page_number, Some(2));
        assert_eq!(diag.extractor, ElementKind::Table);
        assert_eq!(diag.message, "boom");
    }

    #[test]
    fn test_stringify_skips_empty_pages() {
        let page = |n: u32, text: &str| PdfPage {
            page_number: n,
            width: 612.0,
            height: 792.0,
            elements: if text.is_empty() {
                vec![]
            } else {
                vec![crate::model::PdfElement::text(Default::default(), text)]
            },
            diagnostics: vec![],
        };
        let doc = ParsedPdf {
            source: "x.pdf".into(),
            metadata: Metadata::with_page_count(3),
            pages: vec![page(1, "one"), page(2, ""), page(3, "three")],
            diagnostics: vec![],
        };
        assert_eq!(doc.stringify(true, false), "one\n\n--- PAGE BREAK ---\n\nthree");
    }
}
