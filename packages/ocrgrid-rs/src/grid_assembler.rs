//! Final assembly of the reconstructed table.
use ocrgrid_ocr::TextRegion;
use serde::Serialize;
use tracing::debug;

use crate::cell_aligner::align_rows;
use crate::column_template::column_template;
use crate::error::TableError;
use crate::row_segmenter::segment_rows;

/// Row-major cell text. Every row has the same number of cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Grid {
    pub rows: Vec<Vec<String>>,
    /// Whether the first row is written as a header.
    pub header: bool,
}

impl Grid {
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, Vec::len)
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn header_row(&self) -> Option<&[String]> {
        if self.header {
            self.rows.first().map(Vec::as_slice)
        } else {
            None
        }
    }

    /// Tab separated rendering, one line per row.
    pub fn to_tsv(&self) -> String {
        self.rows
            .iter()
            .map(|row| row.join("\t"))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Wraps aligned rows as a grid whose first row is always the header.
pub fn assemble_grid(rows: Vec<Vec<String>>) -> Grid {
    Grid { rows, header: true }
}

/// Rebuilds a table from unordered OCR detections.
pub fn reconstruct_table(regions: &[TextRegion]) -> Result<Grid, TableError> {
    let rows = segment_rows(regions)?;
    let template = column_template(&rows)?;
    debug!(
        detections = regions.len(),
        rows = rows.len(),
        columns = template.len(),
        "reconstructed table layout"
    );
    Ok(assemble_grid(align_rows(&rows, &template)))
}
