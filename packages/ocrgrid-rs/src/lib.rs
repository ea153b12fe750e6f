//! # ocrgrid-rs
//!
//! Rebuilds tables from the unordered text fragments an OCR engine reports and
//! writes them out as spreadsheets.
//!
//! ## Features
//!
//! - **Row Segmentation**: Cluster detections into text lines using a tolerance derived from their heights
//! - **Column Inference**: Take the column layout from the row with the most separately detected cells
//! - **Cell Alignment**: Place every detection under the template column its box overlaps
//! - **Spreadsheet Export**: Write the grid as `.xlsx` with the first row as a header
//! - **HTTP API**: Upload an image, download the spreadsheet once under a per-request id
//!
//! ## Quick Start
//!
//! ```ignore
//! use ocrgrid_rs::prelude::*;
//!
//! let regions = vec![
//!     TextRegion::new("Item", Quad::from_rect(0.0, 0.0, 40.0, 12.0), 0.99),
//!     TextRegion::new("Qty", Quad::from_rect(60.0, 0.0, 30.0, 12.0), 0.99),
//! ];
//! let grid = reconstruct_table(&regions)?;
//! assert_eq!(grid.rows, vec![vec!["Item", "Qty"]]);
//!
//! XlsxExporter::new().export(&grid, Path::new("table.xlsx"))?;
//! ```

pub mod artifact_store;
pub mod cell_aligner;
pub mod column_template;
pub mod config;
pub mod error;
pub mod grid_assembler;
pub mod row_segmenter;
pub mod server;
pub mod table_extractor;
pub mod xlsx_exporter;

// Re-export commonly used types at the root level
pub use artifact_store::{export_atomically, ArtifactId, ArtifactStore};
pub use cell_aligner::{align_row, align_rows};
pub use column_template::{column_template, select_template_row, ColumnTemplate, Interval};
pub use config::{AppConfig, EngineConfig, EngineMode};
pub use error::TableError;
pub use grid_assembler::{assemble_grid, reconstruct_table, Grid};
pub use row_segmenter::{reading_order, row_tolerance, segment_rows, split_rows, Row};
pub use table_extractor::{ExtractError, ExtractedTable, TableExtractor};
pub use xlsx_exporter::{ExportError, GridExporter, XlsxExporter};

/// Prelude module for convenient imports
///
/// Import everything you need with:
/// ```ignore
/// use ocrgrid_rs::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{
        align_row, align_rows, assemble_grid, column_template, reconstruct_table, segment_rows,
        select_template_row, ArtifactId, ArtifactStore, ColumnTemplate, ExportError, ExtractError,
        Grid, GridExporter, Interval, Row, TableError, TableExtractor, XlsxExporter,
    };
    pub use ocrgrid_ocr::{OcrEngine, OcrInput, OcrOutput, Quad, TextRegion};
}
