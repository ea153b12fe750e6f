//! Spreadsheet serialization of reconstructed grids.
use std::path::Path;

use rust_xlsxwriter::{Format, Workbook, XlsxError};
use thiserror::Error;

use crate::grid_assembler::Grid;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("grid has no rows")]
    EmptyGrid,
    #[error("grid is too large for a worksheet ({rows} rows x {columns} columns)")]
    TooLarge { rows: usize, columns: usize },
    #[error("spreadsheet error: {0}")]
    Xlsx(#[from] XlsxError),
    #[error("artifact i/o: {0}")]
    Io(#[from] std::io::Error),
}

/// Writes a grid to a file in some tabular format.
pub trait GridExporter: Send + Sync {
    /// File extension without the leading dot.
    fn extension(&self) -> &'static str;

    fn export(&self, grid: &Grid, destination: &Path) -> Result<(), ExportError>;
}

/// Single-sheet `.xlsx` writer; a header row is written in bold.
#[derive(Debug, Clone, Default)]
pub struct XlsxExporter {
    pub sheet_name: Option<String>,
}

impl XlsxExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sheet_name(mut self, name: impl Into<String>) -> Self {
        self.sheet_name = Some(name.into());
        self
    }

    fn build_workbook(&self, grid: &Grid) -> Result<Workbook, ExportError> {
        if grid.is_empty() {
            return Err(ExportError::EmptyGrid);
        }
        let too_large = || ExportError::TooLarge {
            rows: grid.height(),
            columns: grid.width(),
        };

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        if let Some(name) = &self.sheet_name {
            worksheet.set_name(name)?;
        }
        let bold = Format::new().set_bold();

        for (r, row) in grid.rows.iter().enumerate() {
            let r = u32::try_from(r).map_err(|_| too_large())?;
            for (c, cell) in row.iter().enumerate() {
                if cell.is_empty() {
                    continue;
                }
                let c = u16::try_from(c).map_err(|_| too_large())?;
                if r == 0 && grid.header {
                    worksheet.write_string_with_format(r, c, cell, &bold)?;
                } else {
                    worksheet.write_string(r, c, cell)?;
                }
            }
        }
        worksheet.autofit();
        Ok(workbook)
    }

    pub fn to_bytes(&self, grid: &Grid) -> Result<Vec<u8>, ExportError> {
        Ok(self.build_workbook(grid)?.save_to_buffer()?)
    }
}

impl GridExporter for XlsxExporter {
    fn extension(&self) -> &'static str {
        "xlsx"
    }

    fn export(&self, grid: &Grid, destination: &Path) -> Result<(), ExportError> {
        self.build_workbook(grid)?.save(destination)?;
        Ok(())
    }
}
