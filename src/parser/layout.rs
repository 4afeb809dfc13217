//! Text layout analysis.
//!
//! Groups the positioned spans of a page into lines (shared baseline) and
//! lines into blocks (close vertically, same font). The layout engine also
//! owns the per-page cache of interpreted content so that text and table
//! extraction share one pass over each content stream.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::error::BackendError;
use crate::model::BBox;

use super::backend::LopdfBackend;
use super::content::{interpret_page, is_spaceless_script_char, PageContent};
use super::options::TextConfig;

/// A text span with position and style information.
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    /// The text content
    pub text: String,
    /// X position (left edge)
    pub x: f32,
    /// Y position (baseline)
    pub y: f32,
    /// Width of the text
    pub width: f32,
    /// Font size in points
    pub font_size: f32,
    /// Font name (e.g., "Helvetica-Bold")
    pub font_name: String,
}

impl TextSpan {
    /// Create a new text span. The width is filled in by the interpreter.
    pub fn new(text: String, x: f32, y: f32, font_size: f32, font_name: String) -> Self {
        Self {
            text,
            x,
            y,
            width: 0.0,
            font_size,
            font_name,
        }
    }

    /// Get the bottom Y coordinate (approximate descender).
    pub fn bottom(&self) -> f32 {
        self.y - self.font_size * 0.2
    }

    /// Get the top Y coordinate (approximate ascender).
    pub fn top(&self) -> f32 {
        self.y + self.font_size * 0.8
    }

    /// Right edge.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bounding box in PDF user space.
    pub fn pdf_rect(&self) -> BBox {
        BBox::new(self.x, self.bottom(), self.right(), self.top())
    }
}

/// A text line composed of multiple spans on the same baseline.
#[derive(Debug, Clone)]
pub struct TextLine {
    /// The spans in this line, sorted by X position
    pub spans: Vec<TextSpan>,
    /// Y position (baseline)
    pub y: f32,
    /// Leftmost X position
    pub x: f32,
    /// Dominant font size in this line
    pub font_size: f32,
    /// Font of the first span
    pub font_name: String,
}

impl TextLine {
    /// Create a new text line from spans.
    pub fn from_spans(mut spans: Vec<TextSpan>) -> Self {
        spans.sort_by(|a, b| a.x.total_cmp(&b.x));

        // Dominant font size, weighted by text length
        let total_chars: usize = spans.iter().map(|s| s.text.len()).sum();
        let weighted_size: f32 = spans
            .iter()
            .map(|s| s.font_size * s.text.len() as f32)
            .sum();
        let font_size = match spans.first() {
            Some(_) if total_chars > 0 => weighted_size / total_chars as f32,
            Some(first) => first.font_size,
            None => 0.0,
        };

        let (x, y, font_name) = spans
            .first()
            .map(|s| (s.x, s.y, s.font_name.clone()))
            .unwrap_or_default();

        Self {
            spans,
            y,
            x,
            font_size,
            font_name,
        }
    }

    /// Get the combined text of all spans with appropriate spacing.
    ///
    /// Inserts spaces between spans based on their X coordinate gaps.
    /// Between two CJK characters no space is inserted.
    pub fn text(&self) -> String {
        let mut result = String::new();

        for (i, span) in self.spans.iter().enumerate() {
            if i == 0 {
                result.push_str(&span.text);
                continue;
            }
            let prev_span = &self.spans[i - 1];

            let gap = span.x - prev_span.right();

            let char_count = span.text.chars().count();
            let avg_char_width = if char_count > 0 && span.width > 0.0 {
                span.width / char_count as f32
            } else {
                span.font_size * 0.5
            };
            let space_threshold = avg_char_width * 0.2;

            let should_insert_space = gap > space_threshold && {
                let prev_is_cjk = prev_span
                    .text
                    .chars()
                    .last()
                    .is_some_and(is_spaceless_script_char);
                let curr_is_cjk = span
                    .text
                    .chars()
                    .next()
                    .is_some_and(is_spaceless_script_char);
                !(prev_is_cjk && curr_is_cjk)
            };

            let prev_ends_with_space =
                prev_span.text.ends_with(' ') || prev_span.text.ends_with('\u{00A0}');
            let curr_starts_with_space =
                span.text.starts_with(' ') || span.text.starts_with('\u{00A0}');

            if should_insert_space && !prev_ends_with_space && !curr_starts_with_space {
                result.push(' ');
            }
            result.push_str(&span.text);
        }

        result
    }

    /// Lowest descender of the line.
    pub fn bottom(&self) -> f32 {
        self.spans
            .iter()
            .map(|s| s.bottom())
            .fold(f32::INFINITY, f32::min)
    }

    /// Highest ascender of the line.
    pub fn top(&self) -> f32 {
        self.spans
            .iter()
            .map(|s| s.top())
            .fold(f32::NEG_INFINITY, f32::max)
    }

    /// Bounding box in PDF user space.
    pub fn pdf_rect(&self) -> BBox {
        let right = self
            .spans
            .iter()
            .map(|s| s.right())
            .fold(f32::NEG_INFINITY, f32::max);
        BBox::new(self.x, self.bottom(), right, self.top())
    }
}

/// A paragraph-like group of consecutive lines.
#[derive(Debug, Clone)]
pub struct TextBlock {
    /// The lines in this block, top to bottom
    pub lines: Vec<TextLine>,
}

impl TextBlock {
    pub fn new(lines: Vec<TextLine>) -> Self {
        Self { lines }
    }

    /// Get the combined text of all lines, joined by spaces.
    pub fn text(&self) -> String {
        self.lines
            .iter()
            .map(|l| l.text().trim().to_string())
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Check if the block is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty() || self.text().trim().is_empty()
    }

    /// Font of the first line.
    pub fn font_name(&self) -> &str {
        self.lines.first().map(|l| l.font_name.as_str()).unwrap_or("")
    }

    /// Font size of the first line.
    pub fn font_size(&self) -> f32 {
        self.lines.first().map(|l| l.font_size).unwrap_or(0.0)
    }

    /// Bounding box in PDF user space.
    pub fn pdf_rect(&self) -> BBox {
        self.lines
            .iter()
            .map(|l| l.pdf_rect())
            .reduce(|a, b| a.union(&b))
            .unwrap_or_default()
    }
}

/// A detected column in the page layout.
#[derive(Debug, Clone)]
pub struct Column {
    /// Left boundary X coordinate
    pub left: f32,
    /// Right boundary X coordinate
    pub right: f32,
    /// Column index (0 = leftmost)
    pub index: usize,
}

impl Column {
    /// Check if an X coordinate falls within this column.
    pub fn contains(&self, x: f32) -> bool {
        x >= self.left && x <= self.right
    }

    /// A span belongs to a column if its left edge or its centre is inside.
    pub fn contains_span(&self, span: &TextSpan) -> bool {
        let center = span.x + span.width / 2.0;
        self.contains(span.x) || self.contains(center)
    }
}

/// Text layout engine shared by all pages of one document.
pub struct LayoutEngine {
    config: TextConfig,
    cache: Mutex<HashMap<u32, Arc<PageContent>>>,
    whitespace: Regex,
}

impl LayoutEngine {
    pub fn new(config: TextConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
            whitespace: Regex::new(r"\s+").expect("whitespace pattern is valid"),
        }
    }

    pub fn config(&self) -> &TextConfig {
        &self.config
    }

    /// Interpreted content of a page (1-indexed), computed once.
    pub fn page_content(
        &self,
        backend: &LopdfBackend,
        page_number: u32,
    ) -> Result<Arc<PageContent>, BackendError> {
        if let Some(hit) = self.lock_cache().get(&page_number) {
            return Ok(Arc::clone(hit));
        }

        let page_id = backend
            .page_id(page_number)
            .ok_or_else(|| BackendError::new(format!("Page {} not found", page_number)))?;
        let content = Arc::new(interpret_page(backend, page_id)?);
        log::debug!(
            "Page {}: {} spans, {} rulings, {} images",
            page_number,
            content.spans.len(),
            content.rulings.len(),
            content.images.len()
        );

        // Another thread may have interpreted the same page meanwhile; keep
        // whichever landed first.
        let mut cache = self.lock_cache();
        Ok(Arc::clone(cache.entry(page_number).or_insert(content)))
    }

    /// Number of pages currently cached.
    pub fn cached_pages(&self) -> usize {
        self.lock_cache().len()
    }

    /// Drop all cached page content.
    pub fn clear(&self) {
        self.lock_cache().clear();
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<u32, Arc<PageContent>>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Group the spans of a page into text blocks in reading order.
    pub fn blocks(&self, spans: &[TextSpan]) -> Vec<TextBlock> {
        let spans: Vec<TextSpan> = spans
            .iter()
            .filter(|s| s.font_size >= self.config.min_font_size)
            .cloned()
            .collect();
        if spans.is_empty() {
            return vec![];
        }

        let columns = detect_columns(&spans);
        log::debug!("Detected {} columns", columns.len());

        let mut column_spans: Vec<Vec<TextSpan>> = vec![Vec::new(); columns.len()];
        for span in spans {
            let col_idx = columns
                .iter()
                .position(|c| c.contains_span(&span))
                .unwrap_or(0);
            column_spans[col_idx].push(span);
        }

        column_spans
            .into_iter()
            .flat_map(|col| {
                let lines = self.group_spans_into_lines(col);
                self.group_lines_into_blocks(lines)
            })
            .filter(|b| !b.is_empty())
            .collect()
    }

    /// Clean block text: optional NFKC (expands ligatures such as `ﬁ`) and
    /// whitespace collapsing.
    pub fn clean_text(&self, text: &str) -> String {
        let text = if self.config.normalize_unicode {
            text.nfkc().collect::<String>()
        } else {
            text.to_string()
        };
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }

    /// Y-based line grouping, top to bottom.
    fn group_spans_into_lines(&self, mut spans: Vec<TextSpan>) -> Vec<TextLine> {
        // PDF y grows upward: sort by descending baseline, then x.
        spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

        let mut lines: Vec<TextLine> = Vec::new();
        let mut current_line_spans: Vec<TextSpan> = Vec::new();
        let mut current_y: Option<f32> = None;

        for span in spans {
            let y_tolerance = span.font_size * self.config.line_tolerance;
            match current_y {
                Some(y) if (span.y - y).abs() <= y_tolerance => current_line_spans.push(span),
                _ => {
                    if !current_line_spans.is_empty() {
                        lines.push(TextLine::from_spans(std::mem::take(
                            &mut current_line_spans,
                        )));
                    }
                    current_y = Some(span.y);
                    current_line_spans.push(span);
                }
            }
        }

        if !current_line_spans.is_empty() {
            lines.push(TextLine::from_spans(current_line_spans));
        }

        lines
    }

    /// Merge consecutive lines that are close vertically and share a style.
    fn group_lines_into_blocks(&self, lines: Vec<TextLine>) -> Vec<TextBlock> {
        let mut blocks: Vec<TextBlock> = Vec::new();
        let mut current: Vec<TextLine> = Vec::new();

        for line in lines {
            let joins = current
                .last()
                .is_some_and(|prev| self.same_block(prev, &line));
            if !joins && !current.is_empty() {
                blocks.push(TextBlock::new(std::mem::take(&mut current)));
            }
            current.push(line);
        }

        if !current.is_empty() {
            blocks.push(TextBlock::new(current));
        }

        blocks
    }

    fn same_block(&self, prev: &TextLine, curr: &TextLine) -> bool {
        let vertical_gap = prev.bottom() - curr.top();
        vertical_gap <= self.config.block_gap
            && prev.font_name == curr.font_name
            && (prev.font_size - curr.font_size).abs() < self.config.font_size_tolerance
    }
}

/// Detect columns based on vertical gutter detection.
///
/// Looks for a vertical empty band between text regions near the middle of
/// the text extent. Returns one or two columns, left to right.
/// Largest page dimension the format allows, in points.
const MAX_PAGE_EXTENT: f32 = 14_400.0;

fn detect_columns(spans: &[TextSpan]) -> Vec<Column> {
    let min_x = spans.iter().map(|s| s.x).fold(f32::INFINITY, f32::min);
    let max_x = spans
        .iter()
        .map(|s| s.right())
        .fold(f32::NEG_INFINITY, f32::max);
    let single = vec![Column {
        left: min_x - 10.0,
        right: max_x + 10.0,
        index: 0,
    }];

    let page_width = max_x - min_x;
    if !page_width.is_finite() || !(250.0..=MAX_PAGE_EXTENT).contains(&page_width) {
        return single;
    }

    // Divide the extent into vertical slices and count spans in each
    let slice_width = 3.0;
    let num_slices = ((page_width / slice_width) as usize) + 1;
    let mut slice_occupancy = vec![0usize; num_slices];
    for span in spans {
        let start_slice = ((span.x - min_x) / slice_width) as usize;
        let end_slice = ((span.right() - min_x) / slice_width) as usize;
        for slot in slice_occupancy
            .iter_mut()
            .take(end_slice.min(num_slices - 1) + 1)
            .skip(start_slice)
        {
            *slot += 1;
        }
    }

    // Longest empty run in the middle 70%, preferring runs near the centre
    let search_start = num_slices * 15 / 100;
    let search_end = num_slices * 85 / 100;
    let page_center = num_slices / 2;

    let mut best: Option<(usize, usize, usize)> = None; // (start, len, centre distance)
    let mut run_start = 0;
    let mut run_len = 0;
    for i in search_start..=search_end.min(num_slices) {
        let empty = i < search_end && slice_occupancy[i] == 0;
        if empty {
            if run_len == 0 {
                run_start = i;
            }
            run_len += 1;
            continue;
        }
        if run_len > 0 {
            let dist = (run_start + run_len / 2).abs_diff(page_center);
            let better = match best {
                None => true,
                Some((_, best_len, best_dist)) => {
                    run_len as f32 > best_len as f32 * 1.5
                        || (run_len as f32 >= best_len as f32 * 0.7 && dist < best_dist)
                }
            };
            if run_len as f32 * slice_width >= 10.0 && better {
                best = Some((run_start, run_len, dist));
            }
        }
        run_len = 0;
    }

    let Some((gap_start, gap_len, _)) = best else {
        return single;
    };
    if (gap_len as f32 * slice_width) < 12.0 {
        return single;
    }

    let gutter = min_x + (gap_start as f32 + gap_len as f32 / 2.0) * slice_width;
    if gutter - min_x < 80.0 || max_x - gutter < 80.0 {
        return single;
    }

    // Both sides need a fair share of the spans
    let left_spans = spans
        .iter()
        .filter(|s| s.x + s.width / 2.0 < gutter)
        .count();
    let right_spans = spans.len() - left_spans;
    let min_spans = (spans.len() / 10).max(2);
    if left_spans < min_spans || right_spans < min_spans {
        return single;
    }

    log::debug!("Column gutter at x={:.1}", gutter);
    vec![
        Column {
            left: min_x - 10.0,
            right: gutter,
            index: 0,
        },
        Column {
            left: gutter,
            right: max_x + 10.0,
            index: 1,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32, size: f32, font: &str) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x,
            y,
            width: text.chars().count() as f32 * size * 0.5,
            font_size: size,
            font_name: font.to_string(),
        }
    }

    fn engine() -> LayoutEngine {
        LayoutEngine::new(TextConfig::default())
    }

    #[test]
    fn test_spans_on_one_baseline_form_a_line() {
        let lines = engine().group_spans_into_lines(vec![
            span("world", 110.0, 700.5, 12.0, "Helvetica"),
            span("Hello", 72.0, 700.0, 12.0, "Helvetica"),
            span("Next", 72.0, 686.0, 12.0, "Helvetica"),
        ]);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text(), "Hello world");
        assert_eq!(lines[1].text(), "Next");
    }

    #[test]
    fn test_close_lines_merge_into_block() {
        let blocks = engine().blocks(&[
            span("First line", 72.0, 700.0, 12.0, "Helvetica"),
            span("second line", 72.0, 686.0, 12.0, "Helvetica"),
            span("Far away", 72.0, 600.0, 12.0, "Helvetica"),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text(), "First line second line");
        assert_eq!(blocks[0].lines.len(), 2);
        assert_eq!(blocks[1].text(), "Far away");
    }

    #[test]
    fn test_font_change_splits_block() {
        let blocks = engine().blocks(&[
            span("Heading", 72.0, 700.0, 18.0, "Helvetica-Bold"),
            span("Body text", 72.0, 684.0, 12.0, "Helvetica"),
        ]);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].font_name(), "Helvetica-Bold");
    }

    #[test]
    fn test_min_font_size_filters_spans() {
        let engine = LayoutEngine::new(TextConfig {
            min_font_size: 8.0,
            ..TextConfig::default()
        });
        let blocks = engine.blocks(&[
            span("Body", 72.0, 700.0, 12.0, "Helvetica"),
            span("footnote", 72.0, 100.0, 6.0, "Helvetica"),
        ]);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text(), "Body");
    }

    #[test]
    fn test_two_columns_are_read_separately() {
        let mut spans = Vec::new();
        for i in 0..5 {
            let y = 700.0 - i as f32 * 14.0;
            spans.push(span("left column words", 72.0, y, 12.0, "Helvetica"));
            spans.push(span("right column words", 340.0, y, 12.0, "Helvetica"));
        }
        let blocks = engine().blocks(&spans);
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].text().starts_with("left column words"));
        assert!(blocks[1].text().starts_with("right column words"));
    }

    #[test]
    fn test_off_page_span_keeps_single_column() {
        let spans = [
            span("Left", 72.0, 700.0, 12.0, "Helvetica"),
            span("Far", 3.0e10, 600.0, 12.0, "Helvetica"),
        ];
        assert_eq!(detect_columns(&spans).len(), 1);

        let blocks = engine().blocks(&spans);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text(), "Left");
    }

    #[test]
    fn test_clean_text() {
        let engine = engine();
        assert_eq!(engine.clean_text("  ﬁne   print \n here "), "fine print here");

        let raw = LayoutEngine::new(TextConfig {
            normalize_unicode: false,
            ..TextConfig::default()
        });
        assert_eq!(raw.clean_text("ﬁne  print"), "ﬁne print");
    }

    #[test]
    fn test_cjk_spans_join_without_space() {
        let line = TextLine::from_spans(vec![
            span("中文", 72.0, 700.0, 12.0, "SimSun"),
            span("文本", 100.0, 700.0, 12.0, "SimSun"),
        ]);
        assert_eq!(line.text(), "中文文本");
    }

    #[test]
    fn test_column_contains_span() {
        let col = Column {
            left: 100.0,
            right: 200.0,
            index: 0,
        };
        assert!(col.contains(100.0));
        assert!(!col.contains(201.0));
        // centre at 110
        let s = TextSpan {
            width: 40.0,
            ..span("Test", 90.0, 0.0, 12.0, "Helvetica")
        };
        assert!(col.contains_span(&s));
    }
}
