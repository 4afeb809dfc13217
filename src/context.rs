//! Per-source parsing context.
//!
//! A [`PdfContext`] owns the opened document for one parse and hands out
//! the engines extractors need. Engines are built on first use and live as
//! long as the context; dropping the context releases everything.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::error::{BackendError, ExtractionError, OpenError};
use crate::model::{BBox, ElementKind, Metadata};
use crate::parser::{
    read_metadata, ExtractorConfig, ImageEngine, LayoutEngine, LopdfBackend, PageContent, PageId,
    ParseOptions, RuledTableConfig, RuledTableDetector, WhitespaceTableDetector,
};

/// Where a PDF comes from.
#[derive(Clone)]
pub enum Source {
    /// A file on disk
    Path(PathBuf),
    /// An in-memory buffer
    Bytes(Vec<u8>),
}

impl Source {
    /// Identifier recorded as [`ParsedPdf::source`](crate::ParsedPdf::source).
    pub fn name(&self) -> String {
        match self {
            Source::Path(path) => path.display().to_string(),
            Source::Bytes(_) => "<memory>".to_string(),
        }
    }
}

impl fmt::Debug for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Source::Bytes(data) => write!(f, "Bytes({} bytes)", data.len()),
        }
    }
}

impl From<PathBuf> for Source {
    fn from(path: PathBuf) -> Self {
        Source::Path(path)
    }
}

impl From<&Path> for Source {
    fn from(path: &Path) -> Self {
        Source::Path(path.to_path_buf())
    }
}

impl From<&str> for Source {
    fn from(path: &str) -> Self {
        Source::Path(PathBuf::from(path))
    }
}

impl From<Vec<u8>> for Source {
    fn from(data: Vec<u8>) -> Self {
        Source::Bytes(data)
    }
}

impl From<&[u8]> for Source {
    fn from(data: &[u8]) -> Self {
        Source::Bytes(data.to_vec())
    }
}

/// A page of the open document.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageHandle {
    /// 1-based page number
    pub number: u32,
    /// Object id of the page dictionary
    pub id: PageId,
    /// Media box in PDF user space
    pub media_box: BBox,
}

impl PageHandle {
    pub fn width(&self) -> f32 {
        self.media_box.width()
    }

    pub fn height(&self) -> f32 {
        self.media_box.height()
    }

    /// Convert a rectangle from PDF user space to top-left page space.
    pub fn to_page_space(&self, rect: BBox) -> BBox {
        BBox::from_pdf_space(rect, &self.media_box)
    }
}

/// Scoped access to one opened PDF and its engines.
pub struct PdfContext {
    source: String,
    backend: LopdfBackend,
    config: ExtractorConfig,
    layout: OnceLock<LayoutEngine>,
    ruled_tables: OnceLock<RuledTableDetector>,
    whitespace_tables: OnceLock<WhitespaceTableDetector>,
    images: OnceLock<ImageEngine>,
}

impl PdfContext {
    /// Open a source, decrypting it with the configured password if needed.
    pub fn open(source: impl Into<Source>, options: &ParseOptions) -> Result<Self, OpenError> {
        let source = source.into();
        let password = options.password.as_deref();
        let name = source.name();

        let backend = match &source {
            Source::Path(path) => LopdfBackend::load_file(path, password)?,
            Source::Bytes(data) => LopdfBackend::load_bytes(data, password)?,
        };
        log::debug!("Opened {} ({} pages)", name, backend.page_count());

        Ok(Self {
            source: name,
            backend,
            config: options.extractors.clone(),
            layout: OnceLock::new(),
            ruled_tables: OnceLock::new(),
            whitespace_tables: OnceLock::new(),
            images: OnceLock::new(),
        })
    }

    /// Source identifier.
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn config(&self) -> &ExtractorConfig {
        &self.config
    }

    pub fn backend(&self) -> &LopdfBackend {
        &self.backend
    }

    pub fn page_count(&self) -> usize {
        self.backend.page_count() as usize
    }

    /// Page by 0-based index.
    pub fn page(&self, index: usize) -> Option<PageHandle> {
        let number = u32::try_from(index).ok()?.checked_add(1)?;
        let id = self.backend.page_id(number)?;
        Some(PageHandle {
            number,
            id,
            media_box: self.backend.media_box(id),
        })
    }

    /// Page by 0-based index, or the out-of-range error for `extractor`.
    pub fn require_page(
        &self,
        extractor: ElementKind,
        index: usize,
    ) -> Result<PageHandle, ExtractionError> {
        self.page(index)
            .ok_or_else(|| ExtractionError::out_of_range(extractor, index, self.page_count()))
    }

    /// Interpreted content of a page, shared between engines.
    pub fn content(&self, page: &PageHandle) -> Result<Arc<PageContent>, BackendError> {
        self.layout().page_content(&self.backend, page.number)
    }

    /// Document metadata from the Info dictionary and the trailer.
    pub fn metadata(&self) -> Result<Metadata, BackendError> {
        read_metadata(&self.backend)
    }

    pub fn layout(&self) -> &LayoutEngine {
        self.layout
            .get_or_init(|| LayoutEngine::new(self.config.text.clone()))
    }

    pub fn ruled_tables(&self) -> &RuledTableDetector {
        self.ruled_tables.get_or_init(|| {
            RuledTableDetector::with_config(RuledTableConfig::from_table_config(&self.config.tables))
        })
    }

    pub fn whitespace_tables(&self) -> &WhitespaceTableDetector {
        self.whitespace_tables
            .get_or_init(|| WhitespaceTableDetector::new(self.config.tables.clone()))
    }

    pub fn images(&self) -> &ImageEngine {
        self.images
            .get_or_init(|| ImageEngine::new(self.config.images.clone()))
    }

    /// Release the document and every engine.
    pub fn close(self) {}
}

impl Drop for PdfContext {
    fn drop(&mut self) {
        let cached = self.layout.get().map_or(0, |l| l.cached_pages());
        log::debug!("Closing {} ({} pages interpreted)", self.source, cached);
    }
}

impl fmt::Debug for PdfContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PdfContext")
            .field("source", &self.source)
            .field("pages", &self.backend.page_count())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{single_page_pdf, write_temp_pdf};

    #[test]
    fn test_open_bytes() {
        let ctx = PdfContext::open(single_page_pdf(b"BT ET".to_vec()), &ParseOptions::default())
            .unwrap();
        assert_eq!(ctx.page_count(), 1);
        assert_eq!(ctx.source(), "<memory>");

        let page = ctx.page(0).unwrap();
        assert_eq!(page.number, 1);
        assert_eq!(page.width(), 612.0);
        assert_eq!(page.height(), 792.0);
        assert!(ctx.page(1).is_none());
    }

    #[test]
    fn test_open_missing_file() {
        let result = PdfContext::open("/definitely/not/here.pdf", &ParseOptions::default());
        assert!(matches!(result, Err(OpenError::NotFound(_))));
    }

    #[test]
    fn test_open_path() {
        let (_dir, path) = write_temp_pdf(&single_page_pdf(b"BT ET".to_vec()));
        let ctx = PdfContext::open(path.as_path(), &ParseOptions::default()).unwrap();
        assert!(ctx.source().ends_with(".pdf"));
        ctx.close();
    }

    #[test]
    fn test_require_page_out_of_range() {
        let ctx = PdfContext::open(single_page_pdf(Vec::new()), &ParseOptions::default()).unwrap();
        let err = ctx.require_page(ElementKind::Image, 5).unwrap_err();
        assert_eq!(err.extractor, ElementKind::Image);
        assert!(err.to_string().contains("out of range"));
    }

    #[test]
    fn test_engines_are_memoized() {
        let ctx = PdfContext::open(single_page_pdf(Vec::new()), &ParseOptions::default()).unwrap();
        assert!(std::ptr::eq(ctx.layout(), ctx.layout()));
        assert!(std::ptr::eq(ctx.ruled_tables(), ctx.ruled_tables()));
        assert!(std::ptr::eq(ctx.images(), ctx.images()));
    }

    #[test]
    fn test_content_is_cached_once() {
        let ctx = PdfContext::open(
            single_page_pdf(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET".to_vec()),
            &ParseOptions::default(),
        )
        .unwrap();
        let page = ctx.page(0).unwrap();
        let first = ctx.content(&page).unwrap();
        let second = ctx.content(&page).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(ctx.layout().cached_pages(), 1);
        assert_eq!(first.spans.len(), 1);
    }
}
