//! PDF parsing backends.
//!
//! Everything here sits on top of `lopdf`: opening and decrypting the
//! document, interpreting page content streams, and the engines that turn
//! interpreted content into text blocks, tables, images and metadata.

mod backend;
mod content;
mod images;
mod layout;
mod metadata;
mod options;
mod ruled;
mod security;
mod whitespace;

pub use backend::{LopdfBackend, PageId};
pub use content::{interpret_page, ImagePlacement, Matrix, Orientation, PageContent, Ruling};
pub use images::{ImageEngine, PlacedImage};
pub use layout::{Column, LayoutEngine, TextBlock, TextLine, TextSpan};
pub use metadata::{parse_pdf_date, read_metadata};
pub use options::{
    CancellationToken, ErrorMode, ExtractorConfig, ImageConfig, PageSelection, ParseOptions,
    TableConfig, TableStrategy, TextConfig,
};
pub use ruled::{RuledTable, RuledTableConfig, RuledTableDetector};
pub use security::PasswordKind;
pub use whitespace::{WhitespaceTable, WhitespaceTableDetector};
