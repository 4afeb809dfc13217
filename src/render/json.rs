//! JSON rendering for parsed documents.

use crate::error::{Error, Result};
use crate::model::ParsedPdf;

/// JSON output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JsonFormat {
    /// Pretty-printed JSON with indentation
    #[default]
    Pretty,
    /// Compact JSON without extra whitespace
    Compact,
}

/// Convert a document to JSON.
///
/// Every map in the model is ordered, so the same document always renders
/// to the same bytes.
pub fn to_json(doc: &ParsedPdf, format: JsonFormat) -> Result<String> {
    let result = match format {
        JsonFormat::Pretty => serde_json::to_string_pretty(doc),
        JsonFormat::Compact => serde_json::to_string(doc),
    };

    result.map_err(|e| Error::Render(format!("JSON serialization error: {}", e)))
}

/// Parse a document back from its JSON rendering.
pub fn from_json(json: &str) -> Result<ParsedPdf> {
    serde_json::from_str(json).map_err(|e| Error::Render(format!("JSON parse error: {}", e)))
}
