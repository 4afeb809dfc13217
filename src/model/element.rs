//! Element-level types.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::BBox;

/// Kind of extracted content.
///
/// The declaration order is the tie-break priority used when two elements
/// share the exact same position: text, then table, image, figure, metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Text,
    Table,
    Image,
    Figure,
    Metadata,
}

impl ElementKind {
    /// Tie-break rank, lower sorts first.
    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ElementKind::Text => "text",
            ElementKind::Table => "table",
            ElementKind::Image => "image",
            ElementKind::Figure => "figure",
            ElementKind::Metadata => "metadata",
        }
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an image painted on a page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageRef {
    /// XObject resource name (e.g. `Im0`)
    pub name: String,

    /// Pixel width
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,

    /// Pixel height
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,

    /// MIME type derived from the stream filter
    pub mime_type: String,

    /// Base64 image bytes, only when embedding is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<String>,
}

/// Type-dependent element payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    /// Text run or block
    Text(String),
    /// Row-major grid of cell strings
    Table(Vec<Vec<String>>),
    /// Image reference
    Image(ImageRef),
    /// Free-form key/value payload (figures, metadata elements)
    Map(BTreeMap<String, Value>),
}

impl Content {
    /// Flatten the content to plain text. Tables render one row per line
    /// with ` | ` between cells.
    pub fn plain_text(&self) -> String {
        match self {
            Content::Text(t) => t.clone(),
            Content::Table(rows) => rows
                .iter()
                .map(|r| r.join(" | "))
                .collect::<Vec<_>>()
                .join("\n"),
            Content::Image(_) | Content::Map(_) => String::new(),
        }
    }

    /// Table rows, if this is a table.
    pub fn as_table(&self) -> Option<&[Vec<String>]> {
        match self {
            Content::Table(rows) => Some(rows),
            _ => None,
        }
    }

    /// Text, if this is a text payload.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Content::Text(t) => Some(t),
            _ => None,
        }
    }
}

/// One extracted content unit with its position on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PdfElement {
    /// Content kind
    #[serde(rename = "type")]
    pub kind: ElementKind,

    /// Reading position within the page; `None` until the page is built
    pub order: Option<u32>,

    /// Position on the page (top-left origin)
    pub bbox: BBox,

    /// Payload
    pub content: Content,

    /// Backend-specific details (font, table source, ...)
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub meta: BTreeMap<String, Value>,
}

impl PdfElement {
    /// Create an element without an order.
    pub fn new(kind: ElementKind, bbox: BBox, content: Content) -> Self {
        Self {
            kind,
            order: None,
            bbox,
            content,
            meta: BTreeMap::new(),
        }
    }

    /// Create a text element.
    pub fn text(bbox: BBox, text: impl Into<String>) -> Self {
        Self::new(ElementKind::Text, bbox, Content::Text(text.into()))
    }

    /// Create a table element.
    pub fn table(bbox: BBox, rows: Vec<Vec<String>>) -> Self {
        Self::new(ElementKind::Table, bbox, Content::Table(rows))
    }

    /// Create an image element.
    pub fn image(bbox: BBox, image: ImageRef) -> Self {
        Self::new(ElementKind::Image, bbox, Content::Image(image))
    }

    /// Attach a meta entry and return self.
    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.meta.insert(key.into(), value.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_priority() {
        assert!(ElementKind::Text.priority() < ElementKind::Table.priority());
        assert!(ElementKind::Table.priority() < ElementKind::Image.priority());
        assert!(ElementKind::Image.priority() < ElementKind::Figure.priority());
    }

    #[test]
    fn test_element_json_shape() {
        let mut el = PdfElement::text(BBox::new(72.0, 95.0, 520.0, 110.0), "Hello");
        el.order = Some(0);
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["type"], "text");
        assert_eq!(json["order"], 0);
        assert_eq!(json["content"], "Hello");
        assert_eq!(json["bbox"].as_array().unwrap().len(), 4);
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_table_content_json() {
        let el = PdfElement::table(
            BBox::new(0.0, 0.0, 10.0, 10.0),
            vec![vec!["a".into(), "b".into()], vec!["1".into(), "".into()]],
        )
        .with_meta("source", "ruled");
        let json = serde_json::to_value(&el).unwrap();
        assert_eq!(json["content"][1][0], "1");
        assert_eq!(json["meta"]["source"], "ruled");
    }

    #[test]
    fn test_table_plain_text() {
        let content = Content::Table(vec![
            vec!["Name".into(), "Age".into()],
            vec!["Alice".into(), "30".into()],
        ]);
        assert_eq!(content.plain_text(), "Name | Age\nAlice | 30");
    }
}
