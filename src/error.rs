//! Error types for pdfninja.
//!
//! Three families mirror the parse pipeline: [`OpenError`] (the source cannot
//! be opened at all), [`ExtractionError`] (one extractor failed on one page)
//! and [`AssemblyError`] (the produced pages do not form a consistent
//! document). Open and assembly errors are always fatal; extraction errors
//! are recovered into diagnostics unless fail-fast mode is on.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

use crate::model::{BBox, ElementKind};

/// Result type alias for pdfninja operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error returned by parsing entry points.
#[derive(Error, Debug)]
pub enum Error {
    /// The source could not be opened.
    #[error(transparent)]
    Open(#[from] OpenError),

    /// An extractor failed and fail-fast mode was requested.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// Pages could not be assembled into a document.
    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    /// The parse was aborted through its cancellation token.
    #[error("Parse cancelled")]
    Cancelled,

    /// I/O error outside of opening the source (batch reading, readers).
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Error during rendering (JSON, text).
    #[error("Rendering error: {0}")]
    Render(String),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// File-level failures. Always fatal.
#[derive(Error, Debug)]
pub enum OpenError {
    /// The file does not exist.
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("Cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The data does not start with a PDF header.
    #[error("Unknown file format: not a valid PDF")]
    NotPdf,

    /// The PDF header names a version we do not understand.
    #[error("Unsupported PDF version: {0}")]
    UnsupportedVersion(String),

    /// The object structure could not be parsed.
    #[error("Malformed PDF: {0}")]
    Malformed(String),

    /// The document is encrypted and no usable password was supplied.
    #[error("Document is encrypted")]
    Encrypted,

    /// The supplied password matches neither the user nor the owner password.
    #[error("Invalid password")]
    InvalidPassword,

    /// The security handler is not one we can decrypt.
    #[error("Unsupported encryption: {0}")]
    UnsupportedEncryption(String),
}

impl From<lopdf::Error> for OpenError {
    fn from(err: lopdf::Error) -> Self {
        match err {
            lopdf::Error::IO(e) => OpenError::Unreadable {
                path: PathBuf::new(),
                source: e,
            },
            lopdf::Error::Decryption(_) => OpenError::Encrypted,
            _ => OpenError::Malformed(err.to_string()),
        }
    }
}

/// Failure inside a parsing backend (content decoding, missing objects).
///
/// Extractors wrap it into an [`ExtractionError`] naming the page.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct BackendError(pub String);

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

impl From<lopdf::Error> for BackendError {
    fn from(err: lopdf::Error) -> Self {
        Self(err.to_string())
    }
}

/// A single extractor failing on a single page (or on the document, for
/// metadata).
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{extractor} extractor failed{}: {kind}", page_suffix(.page_number))]
pub struct ExtractionError {
    /// 1-based page number, `None` for document-level extraction.
    pub page_number: Option<u32>,
    /// Which extractor failed.
    pub extractor: ElementKind,
    /// What went wrong.
    pub kind: ExtractionErrorKind,
}

fn page_suffix(page_number: &Option<u32>) -> String {
    match page_number {
        Some(n) => format!(" on page {}", n),
        None => String::new(),
    }
}

/// Cause of an [`ExtractionError`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExtractionErrorKind {
    /// The backend reported an error.
    #[error("{0}")]
    Backend(String),

    /// The backend produced a bounding box that is inverted or not finite.
    #[error("malformed geometry {0:?}")]
    MalformedGeometry(BBox),

    /// The requested page index does not exist.
    #[error("page index {index} is out of range (document has {count} pages)")]
    PageOutOfRange { index: usize, count: usize },
}

impl ExtractionError {
    /// Backend failure on a page.
    pub fn backend(extractor: ElementKind, page_number: u32, message: impl Into<String>) -> Self {
        Self {
            page_number: Some(page_number),
            extractor,
            kind: ExtractionErrorKind::Backend(message.into()),
        }
    }

    /// Backend failure at document level.
    pub fn document(extractor: ElementKind, message: impl Into<String>) -> Self {
        Self {
            page_number: None,
            extractor,
            kind: ExtractionErrorKind::Backend(message.into()),
        }
    }

    /// Inverted or non-finite bounding box.
    pub fn malformed(extractor: ElementKind, page_number: u32, bbox: BBox) -> Self {
        Self {
            page_number: Some(page_number),
            extractor,
            kind: ExtractionErrorKind::MalformedGeometry(bbox),
        }
    }

    /// Page index outside `0..count`.
    pub fn out_of_range(extractor: ElementKind, index: usize, count: usize) -> Self {
        Self {
            page_number: None,
            extractor,
            kind: ExtractionErrorKind::PageOutOfRange { index, count },
        }
    }
}

/// Failures while assembling pages into a [`ParsedPdf`](crate::ParsedPdf).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// The same page number was produced twice.
    #[error("Page {0} appears more than once")]
    DuplicatePage(u32),

    /// An expected page was not produced.
    #[error("Page {0} is missing")]
    MissingPage(u32),

    /// A page was produced that was not requested.
    #[error("Page {0} was not requested")]
    UnexpectedPage(u32),

    /// Page numbers are 1-based.
    #[error("Page number 0 is invalid")]
    ZeroPageNumber,

    /// Metadata page count disagrees with the pages produced.
    #[error("Metadata reports {expected} pages but {actual} were produced")]
    PageCountMismatch { expected: u32, actual: u32 },
}
