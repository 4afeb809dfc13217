//! Element extractors.
//!
//! Each extractor turns one kind of page content into [`PdfElement`]s. The
//! orchestrator calls every registered extractor for every page and merges
//! their output; extractors never see each other's results.
//!
//! # Example
//!
//! A custom figure extractor only has to name its kind and produce elements:
//!
//! ```no_run
//! use pdfninja::extract::Extractor;
//! use pdfninja::{ElementKind, ExtractionError, PdfContext, PdfElement, PdfNinja};
//!
//! struct NoFigures;
//!
//! impl Extractor for NoFigures {
//!     fn kind(&self) -> ElementKind {
//!         ElementKind::Figure
//!     }
//!
//!     fn extract(&self, _ctx: &PdfContext, _page: usize) -> Result<Vec<PdfElement>, ExtractionError> {
//!         Ok(Vec::new())
//!     }
//! }
//!
//! let mut ninja = PdfNinja::new();
//! ninja.register(Box::new(NoFigures));
//! ```

mod image;
mod metadata;
mod table;
mod text;

pub use image::ImageExtractor;
pub use metadata::MetadataExtractor;
pub use table::TableExtractor;
pub use text::TextExtractor;

use crate::context::PdfContext;
use crate::error::{BackendError, ExtractionError};
use crate::model::{ElementKind, PdfElement};

/// A per-page element extractor.
///
/// Implement this trait to add a new content type.
pub trait Extractor: Send + Sync {
    /// Kind of element this extractor produces.
    fn kind(&self) -> ElementKind;

    /// Extract elements from the page at `page_index` (0-based).
    ///
    /// Returned elements have no `order` and bounding boxes in top-left
    /// page space.
    fn extract(&self, ctx: &PdfContext, page_index: usize)
        -> Result<Vec<PdfElement>, ExtractionError>;

    /// Name used in log messages.
    fn name(&self) -> &str {
        self.kind().as_str()
    }
}

/// The built-in per-page extractors: text, table and image.
pub fn default_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(TextExtractor::new()),
        Box::new(TableExtractor::new()),
        Box::new(ImageExtractor::new()),
    ]
}

/// Wrap a backend failure on a page.
fn backend_error(kind: ElementKind, page_number: u32, err: BackendError) -> ExtractionError {
    ExtractionError::backend(kind, page_number, err.to_string())
}

/// Round a coordinate-derived value for `meta`.
fn round2(v: f32) -> f64 {
    (f64::from(v) * 100.0).round() / 100.0
}
