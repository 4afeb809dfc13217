//! Plain text rendering for parsed documents.

use crate::model::ParsedPdf;

/// What goes into the flattened text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextOptions {
    /// Render tables row by row, cells separated by ` | `
    pub include_tables: bool,
    /// Render captioned images as `[Image: caption]`
    pub include_images: bool,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            include_tables: true,
            include_images: false,
        }
    }
}

impl TextOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tables(mut self, include: bool) -> Self {
        self.include_tables = include;
        self
    }

    pub fn with_images(mut self, include: bool) -> Self {
        self.include_images = include;
        self
    }
}

/// Convert a document to plain text, pages separated by
/// [`PAGE_BREAK`](crate::model::PAGE_BREAK).
pub fn to_text(doc: &ParsedPdf, options: &TextOptions) -> String {
    doc.stringify(options.include_tables, options.include_images)
}
