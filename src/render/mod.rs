//! Rendering parsed documents to JSON and plain text.

mod json;
mod text;

pub use json::{from_json, to_json, JsonFormat};
pub use text::{to_text, TextOptions};
