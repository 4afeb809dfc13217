//! Ruled-line table detection.
//!
//! Tables drawn with visible borders are found from the page's ruling
//! segments alone: collinear segments are snapped together, crossing
//! horizontal and vertical rulings are clustered into grids, and text spans
//! are dropped into the grid cell under their centre point.

use crate::model::BBox;
use crate::parser::options::TableConfig;

use super::content::{Orientation, Ruling};
use super::layout::TextSpan;

/// Configuration for ruled-line detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RuledTableConfig {
    /// Rulings closer than this (points) are the same line
    pub snap_tolerance: f32,
    /// A row taller than `factor × median row height` starts a new table
    pub split_gap_factor: f32,
}

impl Default for RuledTableConfig {
    fn default() -> Self {
        Self {
            snap_tolerance: 2.0,
            split_gap_factor: 1.5,
        }
    }
}

impl RuledTableConfig {
    pub fn from_table_config(config: &TableConfig) -> Self {
        Self {
            snap_tolerance: config.snap_tolerance,
            split_gap_factor: config.split_gap_factor,
        }
    }
}

/// A table found from ruling lines, in PDF user space.
#[derive(Debug, Clone, PartialEq)]
pub struct RuledTable {
    /// Outer border of the (sub)grid
    pub rect: BBox,
    /// Cell text, row-major, top row first
    pub rows: Vec<Vec<String>>,
    /// Set when the table is one part of a grid that was split
    pub split_from: Option<usize>,
}

impl RuledTable {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.rows.first().map_or(0, |r| r.len())
    }
}

/// Grid skeleton: row boundaries top to bottom, column boundaries left to right.
#[derive(Debug, Clone, PartialEq)]
struct Grid {
    ys: Vec<f32>,
    xs: Vec<f32>,
}

impl Grid {
    fn rows(&self) -> usize {
        self.ys.len() - 1
    }

    fn columns(&self) -> usize {
        self.xs.len() - 1
    }

    fn rect(&self) -> BBox {
        BBox::from_corners(
            self.xs[0],
            self.ys[self.ys.len() - 1],
            self.xs[self.xs.len() - 1],
            self.ys[0],
        )
    }

    /// Cell (row, column) under a point, if any.
    fn cell_at(&self, x: f32, y: f32) -> Option<(usize, usize)> {
        if !self.rect().contains_point(x, y) {
            return None;
        }
        let row = (0..self.rows()).find(|&i| y >= self.ys[i + 1])?;
        let col = (0..self.columns()).rev().find(|&j| x >= self.xs[j])?;
        Some((row, col))
    }
}

/// Finds bordered tables from ruling segments.
pub struct RuledTableDetector {
    config: RuledTableConfig,
}

impl Default for RuledTableDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl RuledTableDetector {
    pub fn new() -> Self {
        Self {
            config: RuledTableConfig::default(),
        }
    }

    pub fn with_config(config: RuledTableConfig) -> Self {
        Self { config }
    }

    /// Detect tables on one page.
    pub fn detect(&self, rulings: &[Ruling], spans: &[TextSpan]) -> Vec<RuledTable> {
        let tol = self.config.snap_tolerance;
        let horizontal = merge_rulings(rulings, Orientation::Horizontal, tol);
        let vertical = merge_rulings(rulings, Orientation::Vertical, tol);
        if horizontal.len() < 2 || vertical.len() < 2 {
            return vec![];
        }

        let grids = self.find_grids(&horizontal, &vertical);
        log::debug!(
            "RuledTableDetector: {} horizontal, {} vertical rulings, {} grids",
            horizontal.len(),
            vertical.len(),
            grids.len()
        );

        let mut tables = Vec::new();
        for (index, grid) in grids.iter().enumerate() {
            let cells = fill_cells(grid, spans);
            let parts = self.split_grid(grid, &cells);
            let split = parts.len() > 1;
            for (ys, rows) in parts {
                let part = Grid {
                    ys,
                    xs: grid.xs.clone(),
                };
                tables.push(RuledTable {
                    rect: part.rect(),
                    rows,
                    split_from: split.then_some(index),
                });
            }
        }
        tables
    }

    /// Cluster crossing rulings into grids with at least two cells.
    fn find_grids(&self, horizontal: &[Ruling], vertical: &[Ruling]) -> Vec<Grid> {
        let tol = self.config.snap_tolerance;
        let n = horizontal.len();
        let mut parent: Vec<usize> = (0..n + vertical.len()).collect();

        for (i, h) in horizontal.iter().enumerate() {
            for (j, v) in vertical.iter().enumerate() {
                if crosses(h, v, tol) {
                    union(&mut parent, i, n + j);
                }
            }
        }

        let mut components: Vec<(usize, Vec<f32>, Vec<f32>)> = Vec::new();
        for (idx, ruling) in horizontal.iter().chain(vertical).enumerate() {
            let root = find(&mut parent, idx);
            let slot = match components.iter().position(|(r, _, _)| *r == root) {
                Some(pos) => pos,
                None => {
                    components.push((root, Vec::new(), Vec::new()));
                    components.len() - 1
                }
            };
            match ruling.orientation {
                Orientation::Horizontal => components[slot].1.push(ruling.position),
                Orientation::Vertical => components[slot].2.push(ruling.position),
            }
        }

        components
            .into_iter()
            .filter_map(|(_, ys, xs)| {
                let mut ys = cluster_positions(ys, tol);
                ys.reverse();
                let xs = cluster_positions(xs, tol);
                let grid = Grid { ys, xs };
                // A single bordered cell is a frame, not a table.
                (grid.ys.len() >= 2 && grid.xs.len() >= 2 && grid.rows() * grid.columns() >= 2)
                    .then_some(grid)
            })
            .collect()
    }

    /// Split a grid where a row is much taller than the median row.
    ///
    /// Returns the row boundaries and cell text of each part. A tall row
    /// with no text is the space between two tables and is dropped.
    fn split_grid(&self, grid: &Grid, cells: &[Vec<String>]) -> Vec<(Vec<f32>, Vec<Vec<String>>)> {
        let heights: Vec<f32> = grid.ys.windows(2).map(|w| w[0] - w[1]).collect();
        let whole = vec![(grid.ys.clone(), cells.to_vec())];
        if heights.len() < 3 {
            return whole;
        }

        let median = median(&heights);
        if median <= 0.0 {
            return whole;
        }
        let limit = median * self.config.split_gap_factor;

        let mut parts = Vec::new();
        let mut start = 0;
        for (i, &height) in heights.iter().enumerate().skip(1) {
            if height <= limit {
                continue;
            }
            push_part(&mut parts, grid, cells, start, i);
            start = i;
            if cells[i].iter().all(|c| c.is_empty()) {
                start = i + 1;
            }
        }
        push_part(&mut parts, grid, cells, start, heights.len());

        if parts.is_empty() {
            return whole;
        }
        if parts.len() > 1 {
            log::debug!("RuledTableDetector: split grid into {} tables", parts.len());
        }
        parts
    }
}

fn push_part(
    parts: &mut Vec<(Vec<f32>, Vec<Vec<String>>)>,
    grid: &Grid,
    cells: &[Vec<String>],
    start: usize,
    end: usize,
) {
    if start >= end {
        return;
    }
    parts.push((grid.ys[start..=end].to_vec(), cells[start..end].to_vec()));
}

/// Text of every cell, spans ordered top to bottom then left to right.
fn fill_cells(grid: &Grid, spans: &[TextSpan]) -> Vec<Vec<String>> {
    let mut buckets: Vec<Vec<Vec<&TextSpan>>> = vec![vec![Vec::new(); grid.columns()]; grid.rows()];
    for span in spans {
        let cx = span.x + span.width / 2.0;
        let cy = (span.top() + span.bottom()) / 2.0;
        if let Some((row, col)) = grid.cell_at(cx, cy) {
            buckets[row][col].push(span);
        }
    }

    buckets
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|mut cell| {
                    cell.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
                    cell.iter()
                        .map(|s| s.text.trim())
                        .filter(|t| !t.is_empty())
                        .collect::<Vec<_>>()
                        .join(" ")
                })
                .collect()
        })
        .collect()
}

/// Snap collinear, overlapping rulings of one orientation into single lines.
fn merge_rulings(rulings: &[Ruling], orientation: Orientation, tol: f32) -> Vec<Ruling> {
    let mut selected: Vec<Ruling> = rulings
        .iter()
        .filter(|r| r.orientation == orientation)
        .copied()
        .collect();
    selected.sort_by(|a, b| a.position.total_cmp(&b.position).then(a.start.total_cmp(&b.start)));

    let mut merged: Vec<Ruling> = Vec::new();
    for ruling in selected {
        let existing = merged.iter_mut().find(|m| {
            (m.position - ruling.position).abs() <= tol
                && ruling.start <= m.end + tol
                && m.start <= ruling.end + tol
        });
        match existing {
            Some(m) => {
                m.start = m.start.min(ruling.start);
                m.end = m.end.max(ruling.end);
            }
            None => merged.push(ruling),
        }
    }
    merged
}

fn crosses(h: &Ruling, v: &Ruling, tol: f32) -> bool {
    v.position >= h.start - tol
        && v.position <= h.end + tol
        && h.position >= v.start - tol
        && h.position <= v.end + tol
}

/// Distinct positions, ascending; values within `tol` collapse to their mean.
fn cluster_positions(mut values: Vec<f32>, tol: f32) -> Vec<f32> {
    values.sort_by(|a, b| a.total_cmp(b));
    let mut clusters: Vec<Vec<f32>> = Vec::new();
    for v in values {
        match clusters.last_mut() {
            Some(c) if c.last().is_some_and(|last| v - last <= tol) => c.push(v),
            _ => clusters.push(vec![v]),
        }
    }
    clusters
        .into_iter()
        .map(|c| c.iter().sum::<f32>() / c.len() as f32)
        .collect()
}

fn median(values: &[f32]) -> f32 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

fn find(parent: &mut [usize], mut i: usize) -> usize {
    while parent[i] != i {
        parent[i] = parent[parent[i]];
        i = parent[i];
    }
    i
}

fn union(parent: &mut [usize], a: usize, b: usize) {
    let (ra, rb) = (find(parent, a), find(parent, b));
    if ra != rb {
        parent[rb] = ra;
    }
}
