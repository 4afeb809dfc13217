//! Parsing options and extractor configuration.

use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Options for parsing PDF documents.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Error handling mode
    pub error_mode: ErrorMode,

    /// Whether to process pages on the rayon pool
    pub parallel: bool,

    /// Page selection (which pages to parse)
    pub pages: PageSelection,

    /// Password for encrypted documents
    pub password: Option<String>,

    /// Per-extractor configuration
    pub extractors: ExtractorConfig,

    /// Token checked before each page; cancelling aborts the parse
    pub cancel: Option<CancellationToken>,
}

impl ParseOptions {
    /// Create new parse options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set error mode.
    pub fn with_error_mode(mut self, mode: ErrorMode) -> Self {
        self.error_mode = mode;
        self
    }

    /// Surface the first extraction error instead of recording it.
    pub fn fail_fast(mut self) -> Self {
        self.error_mode = ErrorMode::FailFast;
        self
    }

    /// Record extraction errors as diagnostics and continue (default).
    pub fn lenient(mut self) -> Self {
        self.error_mode = ErrorMode::Lenient;
        self
    }

    /// Enable or disable parallel processing.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel processing.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set page selection.
    pub fn with_pages(mut self, pages: PageSelection) -> Self {
        self.pages = pages;
        self
    }

    /// Set password for encrypted documents.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Replace the extractor configuration.
    pub fn with_extractors(mut self, config: ExtractorConfig) -> Self {
        self.extractors = config;
        self
    }

    /// Choose which table detector(s) to run.
    pub fn with_table_strategy(mut self, strategy: TableStrategy) -> Self {
        self.extractors.tables.strategy = strategy;
        self
    }

    /// Embed base64 image bytes in image elements.
    pub fn with_image_data(mut self, embed: bool) -> Self {
        self.extractors.images.embed_data = embed;
        self
    }

    /// Attach a cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Whether the attached token (if any) has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|c| c.is_cancelled())
    }
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            error_mode: ErrorMode::Lenient,
            parallel: true,
            pages: PageSelection::All,
            password: None,
            extractors: ExtractorConfig::default(),
            cancel: None,
        }
    }
}

/// Error handling mode for per-page extraction failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorMode {
    /// Omit the failed element type and record a diagnostic
    #[default]
    Lenient,
    /// Abort the parse on the first extraction error
    FailFast,
}

/// Which pages to parse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum PageSelection {
    /// All pages
    #[default]
    All,
    /// A range of pages (inclusive, 1-indexed), clamped to the document
    Range(RangeInclusive<u32>),
    /// Specific pages (1-indexed); each must exist
    Pages(Vec<u32>),
}

impl PageSelection {
    /// Whether every page is selected.
    pub fn is_all(&self) -> bool {
        matches!(self, PageSelection::All)
    }

    /// Resolve the selection against a document, returning sorted,
    /// de-duplicated page numbers.
    pub fn resolve(&self, page_count: u32) -> Result<Vec<u32>> {
        match self {
            PageSelection::All => Ok((1..=page_count).collect()),
            PageSelection::Range(range) => {
                let start = (*range.start()).max(1);
                let end = (*range.end()).min(page_count);
                Ok((start..=end).collect())
            }
            PageSelection::Pages(pages) => {
                let mut out = pages.clone();
                out.sort_unstable();
                out.dedup();
                if let Some(bad) = out.iter().find(|p| **p == 0 || **p > page_count) {
                    return Err(Error::Config(format!(
                        "Page {} is out of range (document has {} pages)",
                        bad, page_count
                    )));
                }
                Ok(out)
            }
        }
    }

    /// Parse a page selection string (e.g., "1-10", "1,3,5,7-10").
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        if s.is_empty() || s == "all" {
            return Ok(PageSelection::All);
        }

        let number = |v: &str| -> Result<u32> {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("Invalid page number: {:?}", v.trim())))
        };
        let range = |start: &str, end: &str| -> Result<RangeInclusive<u32>> {
            let (start, end) = (number(start)?, number(end)?);
            if start > end {
                return Err(Error::Config(format!("Page range {}-{} is reversed", start, end)));
            }
            Ok(start..=end)
        };

        if let Some((start, end)) = s.split_once('-') {
            if !start.contains(',') && !end.contains(',') {
                return Ok(PageSelection::Range(range(start, end)?));
            }
        }

        let mut pages = Vec::new();
        for part in s.split(',') {
            if let Some((start, end)) = part.split_once('-') {
                pages.extend(range(start, end)?);
            } else {
                pages.push(number(part)?);
            }
        }

        pages.sort_unstable();
        pages.dedup();
        Ok(PageSelection::Pages(pages))
    }
}

/// Cooperative cancellation flag shared between a caller and a parse.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request the parse to stop before its next page.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Configuration for the built-in extractors.
///
/// Every field has a default, so a partial JSON document is enough:
///
/// ```
/// use pdfninja::ExtractorConfig;
///
/// let config = ExtractorConfig::from_json(r#"{"tables": {"strategy": "ruled"}}"#).unwrap();
/// assert_eq!(config.tables.max_cell_len, 1000);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub text: TextConfig,
    pub tables: TableConfig,
    pub images: ImageConfig,
}

impl ExtractorConfig {
    /// Load configuration from a JSON string.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Config(e.to_string()))
    }
}

/// Text extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TextConfig {
    /// Whether the text extractor runs
    pub enabled: bool,
    /// Lines set in a smaller font are dropped
    pub min_font_size: f32,
    /// Baseline tolerance for joining spans into a line (fraction of font size)
    pub line_tolerance: f32,
    /// Maximum vertical gap between lines of the same block (points)
    pub block_gap: f32,
    /// Maximum font size difference between lines of the same block (points)
    pub font_size_tolerance: f32,
    /// Apply Unicode NFKC normalization (expands ligatures)
    pub normalize_unicode: bool,
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            min_font_size: 0.0,
            line_tolerance: 0.3,
            block_gap: 8.0,
            font_size_tolerance: 0.5,
            normalize_unicode: true,
        }
    }
}

/// Which table detectors to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableStrategy {
    /// Ruled-line detector only
    Ruled,
    /// Whitespace (text alignment) detector only
    Whitespace,
    /// Both, ruled results taking precedence on overlap
    #[default]
    Both,
    /// No table extraction
    None,
}

/// Table extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub strategy: TableStrategy,
    /// Tables with a longer cell are discarded as mis-detections
    pub max_cell_len: usize,
    /// Overlap above which a whitespace table duplicates a ruled one
    pub dedupe_iou: f32,
    /// A row gap above `factor × median gap` splits a ruled grid in two
    pub split_gap_factor: f32,
    /// Distance under which ruling lines are considered the same line (points)
    pub snap_tolerance: f32,
    /// Minimum rows for a whitespace table
    pub min_rows: usize,
    /// Minimum columns for a whitespace table
    pub min_columns: usize,
    /// Maximum columns for a whitespace table
    pub max_columns: usize,
    /// Share of a row's spans that must sit on a column edge
    pub min_alignment: f32,
    /// Column edges closer than this (points) are merged
    pub min_column_gap: f32,
    /// Baseline distance, as a fraction of the font size, within which
    /// spans share a whitespace-table row
    pub row_tolerance: f32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            strategy: TableStrategy::Both,
            max_cell_len: 1000,
            dedupe_iou: 0.6,
            split_gap_factor: 1.5,
            snap_tolerance: 2.0,
            min_rows: 2,
            min_columns: 2,
            max_columns: 6,
            min_alignment: 0.3,
            min_column_gap: 15.0,
            row_tolerance: 0.4,
        }
    }
}

/// Image extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImageConfig {
    pub enabled: bool,
    /// Embed base64 image bytes in the element content
    pub embed_data: bool,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            embed_data: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_options_builder() {
        let options = ParseOptions::new()
            .fail_fast()
            .sequential()
            .with_password("secret")
            .with_table_strategy(TableStrategy::Ruled);

        assert_eq!(options.error_mode, ErrorMode::FailFast);
        assert!(!options.parallel);
        assert_eq!(options.password.as_deref(), Some("secret"));
        assert_eq!(options.extractors.tables.strategy, TableStrategy::Ruled);
    }

    #[test]
    fn test_default_options() {
        let options = ParseOptions::default();
        assert_eq!(options.error_mode, ErrorMode::Lenient);
        assert!(options.parallel);
        assert!(options.pages.is_all());
        assert!(!options.is_cancelled());
    }

    #[test]
    fn test_page_selection_parse() {
        assert_eq!(PageSelection::parse("all").unwrap(), PageSelection::All);
        assert_eq!(
            PageSelection::parse("2-4").unwrap(),
            PageSelection::Range(2..=4)
        );
        assert_eq!(
            PageSelection::parse("5,1,3-4,1").unwrap(),
            PageSelection::Pages(vec![1, 3, 4, 5])
        );
        assert!(PageSelection::parse("one").is_err());
    }

    #[test]
    fn test_page_selection_reversed_range() {
        assert!(matches!(PageSelection::parse("3-1"), Err(Error::Config(_))));
        assert!(matches!(PageSelection::parse("1,5-2"), Err(Error::Config(_))));
        assert_eq!(
            PageSelection::parse("3-3").unwrap(),
            PageSelection::Range(3..=3)
        );
    }

    #[test]
    fn test_page_selection_resolve() {
        assert_eq!(PageSelection::All.resolve(3).unwrap(), vec![1, 2, 3]);
        assert_eq!(
            PageSelection::Range(2..=10).resolve(4).unwrap(),
            vec![2, 3, 4]
        );
        assert_eq!(
            PageSelection::Pages(vec![3, 1]).resolve(3).unwrap(),
            vec![1, 3]
        );
        assert!(PageSelection::Pages(vec![4]).resolve(3).is_err());
    }

    #[test]
    fn test_cancellation_token_is_shared() {
        let token = CancellationToken::new();
        let options = ParseOptions::new().with_cancellation(token.clone());
        assert!(!options.is_cancelled());
        token.cancel();
        assert!(options.is_cancelled());
    }

    #[test]
    fn test_extractor_config_from_partial_json() {
        let config =
            ExtractorConfig::from_json(r#"{"text": {"min_font_size": 6.5}, "images": {"embed_data": true}}"#)
                .unwrap();
        assert_eq!(config.text.min_font_size, 6.5);
        assert!(config.text.normalize_unicode);
        assert!(config.images.embed_data);
        assert_eq!(config.tables, TableConfig::default());

        assert!(ExtractorConfig::from_json("{not json").is_err());
    }
}
