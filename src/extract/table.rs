//! Table extraction.
//!
//! Runs the ruled-line detector, the whitespace detector, or both. When both
//! run, ruled tables win: a whitespace table overlapping a ruled one by more
//! than `dedupe_iou` is dropped.

use crate::context::PdfContext;
use crate::error::ExtractionError;
use crate::model::{BBox, ElementKind, PdfElement};
use crate::parser::{TableConfig, TableStrategy};

use super::{backend_error, Extractor};

/// A detected table before conversion to page space.
#[derive(Debug, Clone, PartialEq)]
struct Candidate {
    rect: BBox,
    rows: Vec<Vec<String>>,
    source: &'static str,
    split_from: Option<usize>,
}

/// Emits one table element per detected table.
#[derive(Debug, Default, Clone, Copy)]
pub struct TableExtractor;

impl TableExtractor {
    pub fn new() -> Self {
        Self
    }
}

impl Extractor for TableExtractor {
    fn kind(&self) -> ElementKind {
        ElementKind::Table
    }

    fn extract(
        &self,
        ctx: &PdfContext,
        page_index: usize,
    ) -> Result<Vec<PdfElement>, ExtractionError> {
        let page = ctx.require_page(self.kind(), page_index)?;
        let config = &ctx.config().tables;
        if config.strategy == TableStrategy::None {
            return Ok(Vec::new());
        }

        let content = ctx
            .content(&page)
            .map_err(|e| backend_error(self.kind(), page.number, e))?;

        let mut candidates: Vec<Candidate> = Vec::new();
        if matches!(config.strategy, TableStrategy::Ruled | TableStrategy::Both) {
            candidates.extend(
                ctx.ruled_tables()
                    .detect(&content.rulings, &content.spans)
                    .into_iter()
                    .map(|t| Candidate {
                        rect: t.rect,
                        rows: t.rows,
                        source: "ruled",
                        split_from: t.split_from,
                    }),
            );
        }

        if matches!(config.strategy, TableStrategy::Whitespace | TableStrategy::Both) {
            let whitespace: Vec<Candidate> = ctx
                .whitespace_tables()
                .detect(&content.spans)
                .into_iter()
                .map(|t| Candidate {
                    rect: t.rect,
                    rows: t.rows,
                    source: "whitespace",
                    split_from: None,
                })
                .collect();
            merge_candidates(&mut candidates, whitespace, config.dedupe_iou);
        }

        let layout = ctx.layout();
        let elements: Vec<PdfElement> = candidates
            .into_iter()
            .filter(|c| within_cell_limit(c, config))
            .map(|c| {
                let rows: Vec<Vec<String>> = c
                    .rows
                    .iter()
                    .map(|row| row.iter().map(|cell| layout.clean_text(cell)).collect())
                    .collect();
                let (n_rows, n_cols) = (rows.len(), rows.first().map_or(0, |r| r.len()));
                let mut element = PdfElement::table(page.to_page_space(c.rect), rows)
                    .with_meta("source", c.source)
                    .with_meta("rows", n_rows)
                    .with_meta("columns", n_cols);
                if let Some(index) = c.split_from {
                    element = element.with_meta("split_from", index);
                }
                element
            })
            .collect();

        log::debug!("Page {}: {} tables", page.number, elements.len());
        Ok(elements)
    }
}

/// Add whitespace tables that do not duplicate an existing (ruled) table.
fn merge_candidates(existing: &mut Vec<Candidate>, incoming: Vec<Candidate>, dedupe_iou: f32) {
    for candidate in incoming {
        let duplicate = existing
            .iter()
            .any(|e| e.rect.iou(&candidate.rect) > dedupe_iou);
        if duplicate {
            log::debug!(
                "Dropping {} table at {:?}: duplicates a ruled table",
                candidate.source,
                candidate.rect
            );
            continue;
        }
        existing.push(candidate);
    }
}

/// A table with an overlong cell is almost always running text that a
/// detector mistook for a grid.
fn within_cell_limit(candidate: &Candidate, config: &TableConfig) -> bool {
    let ok = candidate
        .rows
        .iter()
        .flatten()
        .all(|cell| cell.chars().count() <= config.max_cell_len);
    if !ok {
        log::debug!(
            "Dropping {} table: a cell exceeds {} characters",
            candidate.source,
            config.max_cell_len
        );
    }
    ok
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::ParseOptions;
    use crate::testutil::single_page_pdf;

    /// Two-by-two bordered grid with text in each cell.
    const RULED_TABLE: &[u8] = b"0.5 w \
        100 700 m 300 700 l S 100 680 m 300 680 l S 100 660 m 300 660 l S \
        100 660 m 100 700 l S 200 660 m 200 700 l S 300 660 m 300 700 l S \
        BT /F1 10 Tf 110 686 Td (Name) Tj ET BT /F1 10 Tf 210 686 Td (Age) Tj ET \
        BT /F1 10 Tf 110 666 Td (Alice) Tj ET BT /F1 10 Tf 210 666 Td (30) Tj ET";

    fn candidate(rect: BBox, source: &'static str) -> Candidate {
        Candidate {
            rect,
            rows: vec![vec!["x".into()]],
            source,
            split_from: None,
        }
    }

    #[test]
    fn test_ruled_table() {
        let options = ParseOptions::default().with_table_strategy(TableStrategy::Ruled);
        let ctx = PdfContext::open(single_page_pdf(RULED_TABLE.to_vec()), &options).unwrap();
        let elements = TableExtractor::new().extract(&ctx, 0).unwrap();

        assert_eq!(elements.len(), 1);
        let table = &elements[0];
        assert_eq!(
            table.content.as_table().unwrap(),
            &[
                vec!["Name".to_string(), "Age".to_string()],
                vec!["Alice".to_string(), "30".to_string()],
            ]
        );
        assert_eq!(table.meta["source"], "ruled");
        assert_eq!(table.meta["rows"], 2);
        assert_eq!(table.meta["columns"], 2);
        assert_eq!(table.bbox, BBox::new(100.0, 92.0, 300.0, 132.0));
    }

    #[test]
    fn test_strategy_none() {
        let options = ParseOptions::default().with_table_strategy(TableStrategy::None);
        let ctx = PdfContext::open(single_page_pdf(RULED_TABLE.to_vec()), &options).unwrap();
        assert!(TableExtractor::new().extract(&ctx, 0).unwrap().is_empty());
    }

    #[test]
    fn test_no_tables_in_plain_text() {
        let ctx = PdfContext::open(
            single_page_pdf(b"BT /F1 12 Tf 72 700 Td (Just a sentence.) Tj ET".to_vec()),
            &ParseOptions::default(),
        )
        .unwrap();
        assert!(TableExtractor::new().extract(&ctx, 0).unwrap().is_empty());
    }

    #[test]
    fn test_merge_prefers_ruled() {
        let mut existing = vec![candidate(BBox::new(0.0, 0.0, 100.0, 100.0), "ruled")];
        let incoming = vec![
            candidate(BBox::new(5.0, 5.0, 100.0, 100.0), "whitespace"),
            candidate(BBox::new(0.0, 300.0, 100.0, 400.0), "whitespace"),
        ];
        merge_candidates(&mut existing, incoming, 0.6);
        assert_eq!(existing.len(), 2);
        assert_eq!(existing[0].source, "ruled");
        assert_eq!(existing[1].rect, BBox::new(0.0, 300.0, 100.0, 400.0));
    }

    #[test]
    fn test_cell_limit() {
        let config = TableConfig {
            max_cell_len: 5,
            ..TableConfig::default()
        };
        let mut c = candidate(BBox::default(), "whitespace");
        assert!(within_cell_limit(&c, &config));
        c.rows = vec![vec!["short".into(), "much too long".into()]];
        assert!(!within_cell_limit(&c, &config));
    }
}
