//! Whitespace-aligned table detection.
//!
//! Borderless tables show up as consecutive text rows whose left edges
//! share two or more x positions. Column edges come from a histogram of
//! span starts; a run of rows that mostly sits on those edges becomes a
//! table unless it reads like a bulleted or numbered list.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

use crate::model::BBox;

use super::layout::TextSpan;
use super::options::TableConfig;

/// Width of the histogram buckets for span left edges (points).
const EDGE_BUCKET: f32 = 5.0;
/// Distance from an edge within which a span counts as aligned.
const ALIGN_TOLERANCE: f32 = 5.0;
/// Spans may start this far left of their column edge.
const CELL_LEAD: f32 = 10.0;

const BULLETS: [&str; 23] = [
    "-", "–", "—", "•", "·", "*", "○", "▪", "◦", "▸", "▹", "►", "■", "●", "※", "□", "◆", "◇",
    "▶", "▷", "☞", "➤", "➜",
];

/// A borderless table, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct WhitespaceTable {
    /// Extent of the table text, ascenders to descenders
    pub rect: BBox,
    /// Left edge of each column
    pub columns: Vec<f32>,
    /// Cell text, row-major, top row first
    pub rows: Vec<Vec<String>>,
}

impl WhitespaceTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

/// Spans sharing a baseline, left to right.
#[derive(Debug)]
struct Row<'a> {
    y: f32,
    spans: Vec<&'a TextSpan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListMarker {
    Bullet,
    Number,
}

/// Finds tables laid out with whitespace only.
#[derive(Debug, Clone, Default)]
pub struct WhitespaceTableDetector {
    config: TableConfig,
}

impl WhitespaceTableDetector {
    pub fn new(config: TableConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Detect tables among a page's spans, top of the page first.
    pub fn detect(&self, spans: &[TextSpan]) -> Vec<WhitespaceTable> {
        let config = &self.config;
        if spans.len() < config.min_rows * config.min_columns {
            return Vec::new();
        }

        let rows = group_rows(spans, config.row_tolerance);
        if rows.len() < config.min_rows {
            return Vec::new();
        }

        let edges = self.column_edges(&rows);
        if edges.len() < config.min_columns {
            log::debug!("Whitespace tables: {} column edges, none found", edges.len());
            return Vec::new();
        }

        self.aligned_runs(&rows, &edges)
            .into_iter()
            .filter_map(|run| self.build_table(&rows[run]))
            .collect()
    }

    /// Left edges shared by enough rows, merged when closer than the
    /// minimum column gap.
    ///
    /// When enough rows hold several spans only those rows vote, once per
    /// edge; otherwise every span votes.
    fn column_edges(&self, rows: &[Row<'_>]) -> Vec<f32> {
        let multi: Vec<&Row<'_>> = rows.iter().filter(|r| r.spans.len() >= 2).collect();
        let per_row = multi.len() >= self.config.min_rows;
        let voters: Vec<&Row<'_>> = if per_row { multi } else { rows.iter().collect() };

        let mut votes: BTreeMap<i32, usize> = BTreeMap::new();
        for row in &voters {
            let buckets = row.spans.iter().map(|s| (s.x / EDGE_BUCKET).round() as i32);
            if per_row {
                for bucket in buckets.collect::<BTreeSet<_>>() {
                    *votes.entry(bucket).or_default() += 1;
                }
            } else {
                for bucket in buckets {
                    *votes.entry(bucket).or_default() += 1;
                }
            }
        }

        let threshold = ((voters.len() as f32 * self.config.min_alignment) as usize).max(2);
        let mut edges: Vec<f32> = Vec::new();
        for (bucket, count) in votes {
            if count < threshold {
                continue;
            }
            let x = bucket as f32 * EDGE_BUCKET;
            if edges.last().is_some_and(|last| x - last < self.config.min_column_gap) {
                continue;
            }
            edges.push(x);
        }
        edges
    }

    /// Runs of at least `min_rows` consecutive rows aligned with `edges`.
    fn aligned_runs(&self, rows: &[Row<'_>], edges: &[f32]) -> Vec<Range<usize>> {
        let min_rows = self.config.min_rows;
        let mut runs = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if alignment(row, edges) >= self.config.min_alignment {
                if start.is_none() {
                    start = Some(i);
                }
            } else if let Some(s) = start.take() {
                if i - s >= min_rows {
                    runs.push(s..i);
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= min_rows {
                runs.push(s..rows.len());
            }
        }
        runs
    }

    /// Re-derive columns for one run and fill its cells.
    fn build_table(&self, rows: &[Row<'_>]) -> Option<WhitespaceTable> {
        let columns = self.column_edges(rows);
        if columns.len() < self.config.min_columns {
            return None;
        }
        if columns.len() > self.config.max_columns {
            log::debug!(
                "Whitespace tables: skipping run of {} rows with {} columns",
                rows.len(),
                columns.len()
            );
            return None;
        }
        if looks_like_list(rows, columns.len()) {
            log::debug!("Whitespace tables: skipping list at y={}", rows[0].y);
            return None;
        }

        let rect = rows
            .iter()
            .flat_map(|r| r.spans.iter())
            .map(|s| s.pdf_rect())
            .reduce(|a, b| a.union(&b))?;
        let right = rect.x1;

        let cells: Vec<Vec<String>> = rows
            .iter()
            .map(|row| {
                let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
                for span in &row.spans {
                    cells[column_for(span.x, &columns, right)].push(span.text.trim());
                }
                cells.into_iter().map(|c| c.join(" ")).collect()
            })
            .collect();

        Some(WhitespaceTable {
            rect,
            columns,
            rows: cells,
        })
    }
}

/// Group spans into rows, top to bottom. A span joins the current row when
/// its baseline is within `tolerance × font size` of the row's first span.
fn group_rows(spans: &[TextSpan], tolerance: f32) -> Vec<Row<'_>> {
    let mut sorted: Vec<&TextSpan> = spans.iter().collect();
    sorted.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));

    let mut rows: Vec<Row<'_>> = Vec::new();
    let mut anchor: Option<f32> = None;
    for span in sorted {
        match (anchor, rows.last_mut()) {
            (Some(y), Some(row)) if (span.y - y).abs() <= span.font_size * tolerance => {
                row.spans.push(span);
            }
            _ => {
                anchor = Some(span.y);
                rows.push(Row {
                    y: span.y,
                    spans: vec![span],
                });
            }
        }
    }

    for row in &mut rows {
        row.y = row.spans.iter().map(|s| s.y).sum::<f32>() / row.spans.len() as f32;
    }
    rows
}

/// Share of a row's spans that start on one of `edges`.
fn alignment(row: &Row<'_>, edges: &[f32]) -> f32 {
    if row.spans.is_empty() || edges.is_empty() {
        return 0.0;
    }
    let aligned = row
        .spans
        .iter()
        .filter(|s| edges.iter().any(|e| (s.x - e).abs() <= ALIGN_TOLERANCE))
        .count();
    aligned as f32 / row.spans.len() as f32
}

/// Column whose interval `[edge - lead, next edge - lead)` holds `x`, or the
/// nearest edge.
fn column_for(x: f32, columns: &[f32], right: f32) -> usize {
    let end = |i: usize| columns.get(i + 1).copied().unwrap_or(right + 100.0);
    columns
        .iter()
        .enumerate()
        .position(|(i, &start)| x >= start - CELL_LEAD && x < end(i) - CELL_LEAD)
        .or_else(|| {
            columns
                .iter()
                .enumerate()
                .min_by(|a, b| (x - a.1).abs().total_cmp(&(x - b.1).abs()))
                .map(|(i, _)| i)
        })
        .unwrap_or(0)
}

/// Number and text of a list item often land in separate spans, which
/// aligns like a two-column table. Bulleted runs are always lists; numbered
/// runs only when there are two columns.
fn looks_like_list(rows: &[Row<'_>], column_count: usize) -> bool {
    let mut bullets = 0usize;
    let mut numbers = 0usize;
    for row in rows {
        match row.spans.first().and_then(|s| list_marker(&s.text)) {
            Some(ListMarker::Bullet) => bullets += 1,
            Some(ListMarker::Number) => numbers += 1,
            None => {}
        }
    }

    let total = rows.len() as f32;
    bullets as f32 / total >= 0.5 || (column_count == 2 && (bullets + numbers) as f32 / total >= 0.5)
}

/// Classify `1.`, `12)`, `3`, `a.` as numbers and `•`, `-` and friends as
/// bullets.
fn list_marker(text: &str) -> Option<ListMarker> {
    let text = text.trim();
    if BULLETS.contains(&text) {
        return Some(ListMarker::Bullet);
    }

    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let numbered = match compact.strip_suffix('.').or_else(|| compact.strip_suffix(')')) {
        Some(body) => {
            (!body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()))
                || (body.chars().count() == 1 && body.chars().all(char::is_alphabetic))
        }
        None => !compact.is_empty() && compact.bytes().all(|b| b.is_ascii_digit()),
    };
    numbered.then_some(ListMarker::Number)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(text: &str, x: f32, y: f32) -> TextSpan {
        TextSpan {
            text: text.to_string(),
            x,
            y,
            width: text.chars().count() as f32 * 6.0,
            font_size: 12.0,
            font_name: "Helvetica".to_string(),
        }
    }

    fn detector() -> WhitespaceTableDetector {
        WhitespaceTableDetector::new(TableConfig::default())
    }

    fn two_column_rows(pairs: &[(&str, &str)], x_left: f32, x_right: f32) -> Vec<TextSpan> {
        pairs
            .iter()
            .enumerate()
            .flat_map(|(i, (a, b))| {
                let y = 500.0 - i as f32 * 15.0;
                [span(a, x_left, y), span(b, x_right, y)]
            })
            .collect()
    }

    #[test]
    fn test_borderless_table() {
        let spans = two_column_rows(&[("Name", "Age"), ("Alice", "30"), ("Bob", "25")], 72.0, 160.0);
        let tables = detector().detect(&spans);

        assert_eq!(tables.len(), 1);
        let table = &tables[0];
        assert_eq!(table.row_count(), 3);
        assert_eq!(table.column_count(), 2);
        assert_eq!(table.rows[2], vec!["Bob".to_string(), "25".to_string()]);
        assert_eq!(table.rect.x0, 72.0);
        assert_eq!(table.rect.y1, 500.0 + 12.0 * 0.8);
        assert_eq!(table.rect.y0, 470.0 - 12.0 * 0.2);
    }

    #[test]
    fn test_single_column_text_is_not_a_table() {
        let spans = vec![
            span("The first line of a paragraph", 72.0, 500.0),
            span("continues on the second line", 72.0, 485.0),
            span("and ends here.", 72.0, 470.0),
            span("A new paragraph", 72.0, 440.0),
        ];
        assert!(detector().detect(&spans).is_empty());
    }

    #[test]
    fn test_numbered_list_is_not_a_table() {
        let spans = two_column_rows(
            &[("1.", "Install"), ("2.", "Configure"), ("3.", "Run"), ("4)", "Verify")],
            50.0,
            80.0,
        );
        assert!(detector().detect(&spans).is_empty());
    }

    #[test]
    fn test_bullet_list_is_not_a_table() {
        let spans = two_column_rows(&[("•", "Apples"), ("•", "Pears"), ("-", "Plums")], 50.0, 80.0);
        assert!(detector().detect(&spans).is_empty());
    }

    #[test]
    fn test_max_columns_from_config() {
        let spans: Vec<TextSpan> = (0..3)
            .flat_map(|i| {
                let y = 500.0 - i as f32 * 15.0;
                [span("a", 72.0, y), span("b", 150.0, y), span("c", 230.0, y)]
            })
            .collect();
        assert_eq!(detector().detect(&spans).len(), 1);

        let narrow = WhitespaceTableDetector::new(TableConfig {
            max_columns: 2,
            ..TableConfig::default()
        });
        assert!(narrow.detect(&spans).is_empty());
    }

    #[test]
    fn test_spans_sharing_a_cell_are_joined() {
        let mut spans = two_column_rows(&[("Item", "Price"), ("Green", "4"), ("Red", "5")], 72.0, 200.0);
        spans.push(span("tea", 110.0, 485.0));
        let tables = detector().detect(&spans);
        assert_eq!(tables[0].rows[1], vec!["Green tea".to_string(), "4".to_string()]);
    }

    #[test]
    fn test_column_for() {
        let columns = [72.0, 160.0];
        assert_eq!(column_for(72.0, &columns, 200.0), 0);
        assert_eq!(column_for(152.0, &columns, 200.0), 1);
        assert_eq!(column_for(140.0, &columns, 200.0), 0);
        assert_eq!(column_for(10.0, &columns, 200.0), 0);
    }

    #[test]
    fn test_list_marker() {
        assert_eq!(list_marker("1."), Some(ListMarker::Number));
        assert_eq!(list_marker("12)"), Some(ListMarker::Number));
        assert_eq!(list_marker("1 ."), Some(ListMarker::Number));
        assert_eq!(list_marker("7"), Some(ListMarker::Number));
        assert_eq!(list_marker("b."), Some(ListMarker::Number));
        assert_eq!(list_marker("•"), Some(ListMarker::Bullet));
        assert_eq!(list_marker("–"), Some(ListMarker::Bullet));
        assert_eq!(list_marker("Name"), None);
        assert_eq!(list_marker("3.5"), None);
        assert_eq!(list_marker(""), None);
    }
}
