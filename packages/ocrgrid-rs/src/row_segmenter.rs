//! Groups OCR detections into horizontal text rows.
//!
//! Two detections share a row when their top edges are closer than a third of
//! the average detection height. Ordering and splitting are separate steps so
//! each can be checked on its own.
use ocrgrid_ocr::TextRegion;

use crate::error::TableError;

/// Detections believed to lie on one line, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct Row<'a> {
    detections: Vec<&'a TextRegion>,
}

impl<'a> Row<'a> {
    pub fn new(detections: Vec<&'a TextRegion>) -> Self {
        Self { detections }
    }

    pub fn len(&self) -> usize {
        self.detections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detections.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a TextRegion> + '_ {
        self.detections.iter().copied()
    }

    pub fn detections(&self) -> &[&'a TextRegion] {
        &self.detections
    }

    /// Distance from the first detection's left edge to the last one's right edge.
    pub fn span(&self) -> f32 {
        match (self.detections.first(), self.detections.last()) {
            (Some(first), Some(last)) => last.right() - first.left(),
            _ => 0.0,
        }
    }

    pub fn texts(&self) -> Vec<&'a str> {
        self.detections.iter().map(|d| d.text.as_str()).collect()
    }
}

/// A third of the mean detection height.
///
/// A single detection gives a tolerance derived from its own height alone.
pub fn row_tolerance(regions: &[TextRegion]) -> Result<f32, TableError> {
    if regions.is_empty() {
        return Err(TableError::NoTableDetected);
    }
    let total: f32 = regions.iter().map(TextRegion::height).sum();
    Ok(total / regions.len() as f32 / 3.0)
}

/// Orders detections top to bottom, then left to right within a line.
///
/// Detections whose top edge lies less than `tolerance` below the first
/// detection of the current line join that line.
pub fn reading_order(regions: &[TextRegion], tolerance: f32) -> Vec<&TextRegion> {
    let mut by_top: Vec<&TextRegion> = regions.iter().collect();
    by_top.sort_by(|a, b| {
        a.top()
            .total_cmp(&b.top())
            .then_with(|| a.left().total_cmp(&b.left()))
    });

    let mut ordered = Vec::with_capacity(by_top.len());
    let mut line: Vec<&TextRegion> = Vec::new();
    let mut line_top = f32::NEG_INFINITY;
    for region in by_top {
        if !line.is_empty() && region.top() - line_top >= tolerance {
            flush_line(&mut line, &mut ordered);
        }
        if line.is_empty() {
            line_top = region.top();
        }
        line.push(region);
    }
    flush_line(&mut line, &mut ordered);
    ordered
}

fn flush_line<'a>(line: &mut Vec<&'a TextRegion>, ordered: &mut Vec<&'a TextRegion>) {
    line.sort_by(|a, b| a.left().total_cmp(&b.left()));
    ordered.append(line);
}

/// Splits detections already in reading order into rows.
///
/// A row ends when the next detection starts left of the previous one or its
/// top edge lies more than `tolerance` below the row's first detection.
pub fn split_rows<'a>(ordered: &[&'a TextRegion], tolerance: f32) -> Vec<Row<'a>> {
    let mut rows = Vec::new();
    let mut current: Vec<&'a TextRegion> = Vec::new();
    // (top of the row's first detection, left of the previous detection)
    let mut cursor: Option<(f32, f32)> = None;

    for &region in ordered {
        let (x, y) = (region.left(), region.top());
        cursor = match cursor {
            None => Some((y, x)),
            Some((row_top, last_x)) if x < last_x || y - row_top > tolerance => {
                rows.push(Row::new(std::mem::take(&mut current)));
                Some((y, x))
            }
            Some((row_top, _)) => Some((row_top, x)),
        };
        current.push(region);
    }
    if !current.is_empty() {
        rows.push(Row::new(current));
    }
    rows
}

/// Full row segmentation of one OCR response.
pub fn segment_rows(regions: &[TextRegion]) -> Result<Vec<Row<'_>>, TableError> {
    let tolerance = row_tolerance(regions)?;
    let ordered = reading_order(regions, tolerance);
    Ok(split_rows(&ordered, tolerance))
}
