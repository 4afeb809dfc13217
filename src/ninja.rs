//! The parse orchestrator.

use rayon::prelude::*;

use crate::builder::{DocumentBuilder, PageBuilder};
use crate::context::{PdfContext, Source};
use crate::error::{Error, ExtractionError, Result};
use crate::extract::{default_extractors, Extractor, MetadataExtractor};
use crate::model::{Diagnostic, ElementKind, Metadata, ParsedPdf, PdfElement, PdfPage};
use crate::parser::{ErrorMode, ParseOptions};

/// Drives every registered extractor over the selected pages of a PDF and
/// assembles the results.
///
/// # Example
///
/// ```no_run
/// use pdfninja::{PdfNinja, ParseOptions};
///
/// let ninja = PdfNinja::with_options(ParseOptions::new().sequential());
/// let doc = ninja.parse("report.pdf").unwrap();
/// for page in &doc.pages {
///     println!("page {}: {} elements", page.page_number, page.element_count());
/// }
/// ```
pub struct PdfNinja {
    extractors: Vec<Box<dyn Extractor>>,
    metadata: MetadataExtractor,
    options: ParseOptions,
}

impl Default for PdfNinja {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfNinja {
    /// Orchestrator with the built-in extractors and default options.
    pub fn new() -> Self {
        Self::with_options(ParseOptions::default())
    }

    /// Orchestrator with the built-in extractors.
    pub fn with_options(options: ParseOptions) -> Self {
        Self {
            extractors: default_extractors(),
            metadata: MetadataExtractor::new(),
            options,
        }
    }

    /// Orchestrator without per-page extractors; only metadata is read
    /// until extractors are registered.
    pub fn empty(options: ParseOptions) -> Self {
        Self {
            extractors: Vec::new(),
            metadata: MetadataExtractor::new(),
            options,
        }
    }

    /// Add an extractor. It runs after the ones already registered.
    pub fn register(&mut self, extractor: Box<dyn Extractor>) -> &mut Self {
        log::debug!("Registered {} extractor", extractor.name());
        self.extractors.push(extractor);
        self
    }

    /// Kinds of the registered per-page extractors, in run order.
    pub fn extractor_kinds(&self) -> Vec<ElementKind> {
        self.extractors.iter().map(|e| e.kind()).collect()
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut ParseOptions {
        &mut self.options
    }

    /// Parse a PDF.
    pub fn parse(&self, source: impl Into<Source>) -> Result<ParsedPdf> {
        self.check_cancelled()?;
        let ctx = PdfContext::open(source, &self.options)?;

        let page_count = ctx.backend().page_count();
        let (metadata, document_diagnostics) = self.read_metadata(&ctx)?;
        let selected = self.options.pages.resolve(page_count)?;
        log::debug!(
            "Parsing {}: {} of {} pages with {} extractors",
            ctx.source(),
            selected.len(),
            page_count,
            self.extractors.len()
        );

        let pages: Vec<PdfPage> = if self.options.parallel {
            selected
                .par_iter()
                .map(|&n| self.parse_page(&ctx, n))
                .collect::<Result<_>>()?
        } else {
            selected
                .iter()
                .map(|&n| self.parse_page(&ctx, n))
                .collect::<Result<_>>()?
        };

        let builder = if self.options.pages.is_all() {
            DocumentBuilder::new()
        } else {
            DocumentBuilder::new().expect_pages(selected)
        };
        let source = ctx.source().to_string();
        ctx.close();

        let doc = builder.build(source, metadata, pages, document_diagnostics)?;
        if doc.has_diagnostics() {
            log::warn!(
                "{}: {} extraction failures recovered",
                doc.source,
                doc.diagnostics.len()
            );
        }
        Ok(doc)
    }

    fn read_metadata(&self, ctx: &PdfContext) -> Result<(Metadata, Vec<Diagnostic>)> {
        match self.metadata.extract(ctx) {
            Ok(metadata) => Ok((metadata, Vec::new())),
            Err(err) => {
                let diagnostic = self.recover(err)?;
                let mut metadata = Metadata::with_page_count(ctx.backend().page_count());
                metadata.encrypted = ctx.backend().is_encrypted();
                Ok((metadata, vec![diagnostic]))
            }
        }
    }

    fn parse_page(&self, ctx: &PdfContext, page_number: u32) -> Result<PdfPage> {
        self.check_cancelled()?;

        let index = page_number.saturating_sub(1) as usize;
        let page = ctx.page(index).ok_or_else(|| {
            Error::Config(format!(
                "Page {} is out of range (document has {} pages)",
                page_number,
                ctx.page_count()
            ))
        })?;

        let mut builder = PageBuilder::new(page_number).with_size(page.width(), page.height());
        let mut streams = Vec::with_capacity(self.extractors.len());
        for extractor in &self.extractors {
            let result = extractor
                .extract(ctx, index)
                .and_then(|elements| validate(extractor.kind(), page_number, elements));
            match result {
                Ok(elements) => streams.push(elements),
                Err(err) => builder.add_diagnostic(self.recover(err)?),
            }
        }

        Ok(builder.build(streams))
    }

    /// Turn an extraction error into a diagnostic, or fail in fail-fast mode.
    fn recover(&self, err: ExtractionError) -> Result<Diagnostic> {
        match self.options.error_mode {
            ErrorMode::FailFast => Err(err.into()),
            ErrorMode::Lenient => {
                log::warn!("{}", err);
                Ok(Diagnostic::from(&err))
            }
        }
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.options.is_cancelled() {
            log::debug!("Parse cancelled");
            return Err(Error::Cancelled);
        }
        Ok(())
    }
}

/// Reject an extractor's whole output if any bounding box is inverted or
/// not finite.
fn validate(
    kind: ElementKind,
    page_number: u32,
    elements: Vec<PdfElement>,
) -> std::result::Result<Vec<PdfElement>, ExtractionError> {
    match elements.iter().find(|e| !e.bbox.is_valid()) {
        Some(bad) => Err(ExtractionError::malformed(kind, page_number, bad.bbox)),
        None => Ok(elements),
    }
}
