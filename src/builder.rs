//! Page and document assembly.
//!
//! [`PageBuilder`] merges the element streams of one page into reading
//! order; [`DocumentBuilder`] checks that the produced pages form the
//! requested document.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use crate::error::AssemblyError;
use crate::model::{Diagnostic, Metadata, ParsedPdf, PdfElement, PdfPage};

/// Reading order: top edge, then left edge, then element kind.
///
/// Uses `total_cmp` so the order is total even for values that would not
/// pass geometry validation.
pub fn reading_order(a: &PdfElement, b: &PdfElement) -> Ordering {
    a.bbox
        .y0
        .total_cmp(&b.bbox.y0)
        .then(a.bbox.x0.total_cmp(&b.bbox.x0))
        .then(a.kind.priority().cmp(&b.kind.priority()))
}

/// Builds one [`PdfPage`].
#[derive(Debug, Clone)]
pub struct PageBuilder {
    page_number: u32,
    width: f32,
    height: f32,
    diagnostics: Vec<Diagnostic>,
}

impl PageBuilder {
    pub fn new(page_number: u32) -> Self {
        Self {
            page_number,
            width: 0.0,
            height: 0.0,
            diagnostics: Vec::new(),
        }
    }

    /// Page dimensions in points.
    pub fn with_size(mut self, width: f32, height: f32) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    /// Record a recovered extraction failure on this page.
    pub fn add_diagnostic(&mut self, diagnostic: Diagnostic) {
        self.diagnostics.push(diagnostic);
    }

    /// Flatten the element streams, sort them stably into reading order and
    /// number them `0..n`.
    pub fn build<I>(self, streams: I) -> PdfPage
    where
        I: IntoIterator<Item = Vec<PdfElement>>,
    {
        let mut elements: Vec<PdfElement> = streams.into_iter().flatten().collect();
        elements.sort_by(reading_order);
        for (i, element) in elements.iter_mut().enumerate() {
            element.order = Some(i as u32);
        }

        PdfPage {
            page_number: self.page_number,
            width: self.width,
            height: self.height,
            elements,
            diagnostics: self.diagnostics,
        }
    }
}

/// Assembles pages into a [`ParsedPdf`].
#[derive(Debug, Clone, Default)]
pub struct DocumentBuilder {
    expected: Option<Vec<u32>>,
    partial: bool,
}

impl DocumentBuilder {
    /// Expect every page of the document, `1..=metadata.page_count`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Expect exactly these pages; the page count check is skipped.
    pub fn expect_pages(mut self, pages: Vec<u32>) -> Self {
        self.expected = Some(pages);
        self.partial = true;
        self
    }

    /// Build the document.
    ///
    /// Pages are sorted by number. Document diagnostics are followed by the
    /// diagnostics of each page in page order.
    pub fn build(
        self,
        source: impl Into<String>,
        metadata: Metadata,
        mut pages: Vec<PdfPage>,
        diagnostics: Vec<Diagnostic>,
    ) -> Result<ParsedPdf, AssemblyError> {
        pages.sort_by_key(|p| p.page_number);

        if pages.first().is_some_and(|p| p.page_number == 0) {
            return Err(AssemblyError::ZeroPageNumber);
        }
        if let Some(w) = pages.windows(2).find(|w| w[0].page_number == w[1].page_number) {
            return Err(AssemblyError::DuplicatePage(w[0].page_number));
        }

        if !self.partial && pages.len() as u32 != metadata.page_count {
            return Err(AssemblyError::PageCountMismatch {
                expected: metadata.page_count,
                actual: pages.len() as u32,
            });
        }

        let expected: BTreeSet<u32> = match self.expected {
            Some(pages) => pages.into_iter().collect(),
            None => (1..=metadata.page_count).collect(),
        };
        let produced: BTreeSet<u32> = pages.iter().map(|p| p.page_number).collect();
        if let Some(&unexpected) = produced.difference(&expected).next() {
            return Err(AssemblyError::UnexpectedPage(unexpected));
        }
        if let Some(&missing) = expected.difference(&produced).next() {
            return Err(AssemblyError::MissingPage(missing));
        }

        let mut all_diagnostics = diagnostics;
        all_diagnostics.extend(pages.iter().flat_map(|p| p.diagnostics.iter().cloned()));

        Ok(ParsedPdf {
            source: source.into(),
            metadata,
            pages,
            diagnostics: all_diagnostics,
        })
    }
}
