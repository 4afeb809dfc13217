//! Document model types.
//!
//! This module defines the unified, JSON-serializable representation that
//! every extractor feeds into: elements with a kind, a reading order, a
//! bounding box and a payload, grouped into pages and documents.

mod document;
mod element;
mod geometry;
mod page;

pub use document::{Diagnostic, Metadata, ParsedPdf, PAGE_BREAK};
pub use element::{Content, ElementKind, ImageRef, PdfElement};
pub use geometry::BBox;
pub use page::PdfPage;
