//! Text block extraction.

use crate::context::PdfContext;
use crate::error::ExtractionError;
use crate::model::{ElementKind, PdfElement};

use super::{backend_error, round2, Extractor};

/// Emits one text element per layout block.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextExtractor;

impl TextExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for TextExtractor {
    fn kind(&self) -> ElementKind {
        ElementKind::Text
    }

    fn extract(
        &self,
        ctx: &PdfContext,
        page_index: usize,
    ) -> Result<Vec<PdfElement>, ExtractionError> {
        let page = ctx.require_page(self.kind(), page_index)?;
        let engine = ctx.layout();
        if !engine.config().enabled {
            return Ok(Vec::new());
        }

        let content = ctx
            .content(&page)
            .map_err(|e| backend_error(self.kind(), page.number, e))?;

        let elements: Vec<PdfElement> = engine
            .blocks(&content.spans)
            .into_iter()
            .filter_map(|block| {
                let text = engine.clean_text(&block.text());
                if text.is_empty() {
                    return None;
                }
                let element = PdfElement::text(page.to_page_space(block.pdf_rect()), text)
                    .with_meta("font_name", block.font_name())
                    .with_meta("font_size", round2(block.font_size()))
                    .with_meta("merged_lines", block.lines.len())
                    .with_meta("source", "layout");
                Some(element)
            })
            .collect();

        log::debug!("Page {}: {} text blocks", page.number, elements.len());
        Ok(elements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;
    use crate::testutil::single_page_pdf;

    fn extract(content: &[u8], options: &ParseOptions) -> Vec<PdfElement> {
        let ctx = PdfContext::open(single_page_pdf(content.to_vec()), options).unwrap();
        TextExtractor::new().extract(&ctx, 0).unwrap()
    }

    #[test]
    fn test_lines_merge_into_block() {
        let content = b"BT /F1 12 Tf 72 700 Td (First line) Tj 0 -14 Td (second line) Tj ET";
        let elements = extract(content, &ParseOptions::default());

        assert_eq!(elements.len(), 1);
        let el = &elements[0];
        assert_eq!(el.content.as_text(), Some("First line second line"));
        assert_eq!(el.meta["merged_lines"], 2);
        assert_eq!(el.meta["font_name"], "Helvetica");
        assert_eq!(el.meta["font_size"], 12.0);
        assert_eq!(el.meta["source"], "layout");
        assert!(el.order.is_none());
        assert!(el.bbox.is_valid());
        // Top of the first line: 792 - (700 + 0.8 * 12)
        assert!((el.bbox.y0 - 82.4).abs() < 0.01);
    }

    #[test]
    fn test_distant_lines_stay_separate() {
        let content = b"BT /F1 12 Tf 72 700 Td (Heading) Tj 0 -60 Td (Body text) Tj ET";
        let elements = extract(content, &ParseOptions::default());
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].content.as_text(), Some("Heading"));
        assert_eq!(elements[1].content.as_text(), Some("Body text"));
    }

    #[test]
    fn test_min_font_size_filter() {
        let mut options = ParseOptions::default();
        options.extractors.text.min_font_size = 8.0;
        let content = b"BT /F1 6 Tf 72 700 Td (tiny) Tj ET BT /F1 12 Tf 72 600 Td (normal) Tj ET";
        let elements = extract(content, &options);
        assert_eq!(elements.len(), 1);
        assert_eq!(elements[0].content.as_text(), Some("normal"));
    }

    #[test]
    fn test_disabled() {
        let mut options = ParseOptions::default();
        options.extractors.text.enabled = false;
        let elements = extract(b"BT /F1 12 Tf 72 700 Td (Hello) Tj ET", &options);
        assert!(elements.is_empty());
    }

    #[test]
    fn test_out_of_range_page() {
        let ctx = PdfContext::open(single_page_pdf(Vec::new()), &ParseOptions::default()).unwrap();
        let err = TextExtractor::new().extract(&ctx, 3).unwrap_err();
        assert_eq!(err.extractor, ElementKind::Text);
    }
}
