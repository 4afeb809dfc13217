//! Page-level types.

use serde::{Deserialize, Serialize};

use super::{Diagnostic, ElementKind, PdfElement};

/// A single page with its elements in reading order.
///
/// Pages are produced by [`PageBuilder`](crate::builder::PageBuilder) and are
/// not modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfPage {
    /// Page number (1-indexed)
    pub page_number: u32,

    /// Page width in points (1 point = 1/72 inch)
    pub width: f32,

    /// Page height in points
    pub height: f32,

    /// Elements sorted by `order`
    pub elements: Vec<PdfElement>,

    /// Extraction failures recovered on this page
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

impl PdfPage {
    /// Check if the page has no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Get the number of elements on the page.
    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    /// Elements of one kind, in order.
    pub fn elements_of(&self, kind: ElementKind) -> impl Iterator<Item = &PdfElement> {
        self.elements.iter().filter(move |e| e.kind == kind)
    }

    /// Get page dimensions as (width, height) tuple.
    pub fn dimensions(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    /// Flatten the page to text in reading order.
    ///
    /// Tables are rendered row by row when `include_tables` is set. Images
    /// and figures only contribute when `include_images` is set and they
    /// carry a `caption` meta entry.
    pub fn stringify(&self, include_tables: bool, include_images: bool) -> String {
        let mut parts = Vec::new();
        for el in &self.elements {
            match el.kind {
                ElementKind::Text => parts.push(el.content.plain_text()),
                ElementKind::Table if include_tables => parts.push(el.content.plain_text()),
                ElementKind::Image | ElementKind::Figure if include_images => {
                    if let Some(caption) = el.meta.get("caption").and_then(|c| c.as_str()) {
                        parts.push(format!("[Image: {}]", caption));
                    }
                }
                _ => {}
            }
        }
        parts
            .into_iter()
            .filter(|p| !p.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
            .trim()
            .to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BBox, ImageRef};

    fn page() -> PdfPage {
        let mut title = PdfElement::text(BBox::new(0.0, 0.0, 100.0, 10.0), "Title");
        title.order = Some(0);
        let mut table = PdfElement::table(
            BBox::new(0.0, 20.0, 100.0, 40.0),
            vec![vec!["a".into(), "b".into()]],
        );
        table.order = Some(1);
        let mut image = PdfElement::image(
            BBox::new(0.0, 50.0, 100.0, 90.0),
            ImageRef {
                name: "Im0".into(),
                width: None,
                height: None,
                mime_type: "image/jpeg".into(),
                data: None,
            },
        )
        .with_meta("caption", "Figure 1");
        image.order = Some(2);

        PdfPage {
            page_number: 1,
            width: 612.0,
            height: 792.0,
            elements: vec![title, table, image],
            diagnostics: Vec::new(),
        }
    }

    #[test]
    fn test_stringify_defaults() {
        assert_eq!(page().stringify(true, false), "Title\n\na | b");
    }

    #[test]
    fn test_stringify_without_tables_with_images() {
        assert_eq!(page().stringify(false, true), "Title\n\n[Image: Figure 1]");
    }

    #[test]
    fn test_elements_of() {
        let p = page();
        assert_eq!(p.elements_of(ElementKind::Table).count(), 1);
        assert_eq!(p.elements_of(ElementKind::Figure).count(), 0);
    }
}
