//! Chooses the row whose boxes define the table's columns.
use std::collections::BTreeMap;

use ocrgrid_ocr::TextRegion;

use crate::error::TableError;
use crate::row_segmenter::Row;

/// Closed horizontal interval `[start, end]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Interval {
    pub start: f32,
    pub end: f32,
}

impl Interval {
    pub fn new(start: f32, end: f32) -> Self {
        Self { start, end }
    }

    /// Left to right edge of the detection's top side.
    pub fn of(region: &TextRegion) -> Self {
        Self::new(region.left(), region.right())
    }

    pub fn contains(&self, x: f32) -> bool {
        x >= self.start && x <= self.end
    }

    /// True when either interval has an endpoint inside the other.
    pub fn overlaps(&self, other: &Interval) -> bool {
        other.contains(self.start)
            || other.contains(self.end)
            || self.contains(other.start)
            || self.contains(other.end)
    }
}

/// Column boundaries, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTemplate {
    columns: Vec<Interval>,
}

impl ColumnTemplate {
    pub fn from_row(row: &Row<'_>) -> Self {
        Self {
            columns: row.iter().map(Interval::of).collect(),
        }
    }

    pub fn columns(&self) -> &[Interval] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Picks the exemplar row: the most cells wins, then the widest span, then
/// the earliest row.
///
/// The row with the most separately detected fragments is assumed to be the
/// one where OCR merged no neighbouring cells.
pub fn select_template_row<'r, 'a>(rows: &'r [Row<'a>]) -> Result<&'r Row<'a>, TableError> {
    let mut by_count: BTreeMap<usize, Vec<&'r Row<'a>>> = BTreeMap::new();
    for row in rows {
        by_count.entry(row.len()).or_default().push(row);
    }
    let (_, candidates) = by_count
        .into_iter()
        .next_back()
        .ok_or_else(|| TableError::Internal("no rows to choose a column template from".into()))?;

    candidates
        .into_iter()
        .reduce(|best, row| if row.span() > best.span() { row } else { best })
        .ok_or_else(|| TableError::Internal("empty column template group".into()))
}

pub fn column_template(rows: &[Row<'_>]) -> Result<ColumnTemplate, TableError> {
    select_template_row(rows).map(ColumnTemplate::from_row)
}
