//! Image extraction.

use crate::context::PdfContext;
use crate::error::ExtractionError;
use crate::model::{ElementKind, PdfElement};

use super::{backend_error, Extractor};

/// Emits one image element per painted image XObject.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageExtractor;

impl ImageExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for ImageExtractor {
    fn kind(&self) -> ElementKind {
        ElementKind::Image
    }

    fn extract(
        &self,
        ctx: &PdfContext,
        page_index: usize,
    ) -> Result<Vec<PdfElement>, ExtractionError> {
        let page = ctx.require_page(self.kind(), page_index)?;
        let engine = ctx.images();
        if !engine.config().enabled {
            return Ok(Vec::new());
        }

        let content = ctx
            .content(&page)
            .map_err(|e| backend_error(self.kind(), page.number, e))?;

        let elements: Vec<PdfElement> = content
            .images
            .iter()
            .map(|placement| {
                let placed = engine.describe(ctx.backend(), placement);
                let mut element = PdfElement::image(page.to_page_space(placed.rect), placed.image);
                if let Some(bits) = placed.bits_per_component {
                    element = element.with_meta("bits_per_component", bits);
                }
                if let Some(cs) = placed.color_space {
                    element = element.with_meta("color_space", cs);
                }
                element
            })
            .collect();

        if !elements.is_empty() {
            log::debug!("Page {}: {} images", page.number, elements.len());
        }
        Ok(elements)
    }
}
