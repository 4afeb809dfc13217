//! # pdfninja
//!
//! PDF parsing for retrieval-augmented generation pipelines.
//!
//! Several extractors (text blocks, ruled and whitespace tables, images,
//! document metadata) run over every page of a PDF. Their output is merged
//! into one JSON-serializable document in which every page lists its
//! elements in reading order.
//!
//! ## Quick Start
//!
//! ```no_run
//! use pdfninja::{parse_file, render};
//!
//! fn main() -> pdfninja::Result<()> {
//!     let doc = parse_file("document.pdf")?;
//!
//!     for page in &doc.pages {
//!         for element in &page.elements {
//!             println!("{:?} {} {:?}", element.order, element.kind, element.bbox);
//!         }
//!     }
//!
//!     let json = render::to_json(&doc, render::JsonFormat::Pretty)?;
//!     println!("{}", json);
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Reading order**: elements sorted top to bottom, left to right, with a
//!   fixed kind priority on ties
//! - **Tables**: ruled-line and whitespace-aligned detection, de-duplicated
//! - **Recoverable failures**: a failing extractor becomes a diagnostic
//!   instead of failing the document (unless fail-fast is requested)
//! - **Encrypted documents**: standard security handler, RC4 and AES-128
//! - **Parallel processing**: pages and batch files on the rayon pool

pub mod batch;
pub mod builder;
pub mod context;
pub mod detect;
pub mod error;
pub mod extract;
pub mod model;
pub mod ninja;
pub mod parser;
pub mod render;

#[cfg(test)]
mod testutil;

// Re-export commonly used types
pub use batch::{DirectoryReader, RagDocument, RagMetadata};
pub use builder::{DocumentBuilder, PageBuilder};
pub use context::{PageHandle, PdfContext, Source};
pub use detect::{detect_format_from_bytes, detect_format_from_path, is_pdf_bytes, PdfFormat};
pub use error::{
    AssemblyError, Error, ExtractionError, ExtractionErrorKind, OpenError, Result,
};
pub use extract::Extractor;
pub use model::{
    BBox, Content, Diagnostic, ElementKind, ImageRef, Metadata, ParsedPdf, PdfElement, PdfPage,
    PAGE_BREAK,
};
pub use ninja::PdfNinja;
pub use parser::{
    CancellationToken, ErrorMode, ExtractorConfig, ImageConfig, PageSelection, ParseOptions,
    TableConfig, TableStrategy, TextConfig,
};
pub use render::{JsonFormat, TextOptions};

use std::io::Read;
use std::path::Path;

/// Parse a PDF file with default options.
///
/// # Example
///
/// ```no_run
/// use pdfninja::parse_file;
///
/// let doc = parse_file("document.pdf").unwrap();
/// println!("Pages: {}", doc.page_count());
/// ```
pub fn parse_file<P: AsRef<Path>>(path: P) -> Result<ParsedPdf> {
    parse_file_with_options(path, ParseOptions::default())
}

/// Parse a PDF file with custom options.
///
/// # Example
///
/// ```no_run
/// use pdfninja::{parse_file_with_options, PageSelection, ParseOptions};
///
/// let options = ParseOptions::new()
///     .fail_fast()
///     .with_pages(PageSelection::Range(1..=3));
/// let doc = parse_file_with_options("document.pdf", options).unwrap();
/// ```
pub fn parse_file_with_options<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<ParsedPdf> {
    PdfNinja::with_options(options).parse(path.as_ref())
}

/// Parse a password-protected PDF file.
///
/// The password is tried as the user password first, then as the owner
/// password.
///
/// ```no_run
/// use pdfninja::parse_file_with_password;
///
/// let doc = parse_file_with_password("encrypted.pdf", "secret").unwrap();
/// ```
pub fn parse_file_with_password<P: AsRef<Path>>(path: P, password: &str) -> Result<ParsedPdf> {
    parse_file_with_options(path, ParseOptions::new().with_password(password))
}

/// Parse a PDF from bytes.
pub fn parse_bytes(data: &[u8]) -> Result<ParsedPdf> {
    parse_bytes_with_options(data, ParseOptions::default())
}

/// Parse a PDF from bytes with custom options.
pub fn parse_bytes_with_options(data: &[u8], options: ParseOptions) -> Result<ParsedPdf> {
    PdfNinja::with_options(options).parse(data)
}

/// Parse a PDF from a reader.
///
/// ```no_run
/// use pdfninja::parse_reader;
/// use std::fs::File;
///
/// let file = File::open("document.pdf").unwrap();
/// let doc = parse_reader(file).unwrap();
/// ```
pub fn parse_reader<R: Read>(mut reader: R) -> Result<ParsedPdf> {
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    PdfNinja::new().parse(data)
}

/// Extract plain text (tables included) from a PDF file.
///
/// ```no_run
/// use pdfninja::extract_text;
///
/// let text = extract_text("document.pdf").unwrap();
/// println!("{}", text);
/// ```
pub fn extract_text<P: AsRef<Path>>(path: P) -> Result<String> {
    let doc = parse_file(path)?;
    Ok(render::to_text(&doc, &TextOptions::default()))
}

/// Parse a PDF file and render it as JSON.
///
/// ```no_run
/// use pdfninja::{to_json, JsonFormat};
///
/// let json = to_json("document.pdf", JsonFormat::Pretty).unwrap();
/// std::fs::write("output.json", json).unwrap();
/// ```
pub fn to_json<P: AsRef<Path>>(path: P, format: JsonFormat) -> Result<String> {
    let doc = parse_file(path)?;
    render::to_json(&doc, format)
}

/// Parse a PDF file on tokio's blocking pool.
#[cfg(feature = "async")]
pub async fn parse_file_async<P: AsRef<Path>>(path: P, options: ParseOptions) -> Result<ParsedPdf> {
    let path = path.as_ref().to_path_buf();
    tokio::task::spawn_blocking(move || parse_file_with_options(path, options))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}
