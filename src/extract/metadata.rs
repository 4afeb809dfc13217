//! Document-level metadata extraction.

use crate::context::PdfContext;
use crate::error::ExtractionError;
use crate::model::{ElementKind, Metadata};

/// Reads document metadata once per parse.
#[derive(Debug, Default, Clone, Copy)]
pub struct MetadataExtractor;

impl MetadataExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn kind(&self) -> ElementKind {
        ElementKind::Metadata
    }

    pub fn extract(&self, ctx: &PdfContext) -> Result<Metadata, ExtractionError> {
        ctx.metadata()
            .map_err(|e| ExtractionError::document(self.kind(), e.to_string()))
    }
}
