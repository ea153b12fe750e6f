//! Image -> OCR -> grid -> spreadsheet, for one request at a time.
use std::path::Path;
use std::time::Instant;

use ocrgrid_ocr::{OcrEngine, OcrError, OcrInput, OcrOutput};
use thiserror::Error;
use tracing::info;

use crate::artifact_store::{export_atomically, ArtifactId, ArtifactStore};
use crate::error::TableError;
use crate::grid_assembler::{reconstruct_table, Grid};
use crate::xlsx_exporter::{ExportError, GridExporter, XlsxExporter};

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("recognition failed: {0}")]
    Recognition(#[from] OcrError),
    #[error("recognition produced no content")]
    NoContent,
    #[error(transparent)]
    Table(#[from] TableError),
    #[error("export failed: {0}")]
    Export(#[from] ExportError),
    #[error("export task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("no artifact store configured")]
    NoStore,
}

/// A stored spreadsheet and the grid it was written from.
#[derive(Debug, Clone)]
pub struct ExtractedTable {
    pub id: ArtifactId,
    pub grid: Grid,
}

pub struct TableExtractor<E> {
    engine: E,
    store: Option<ArtifactStore>,
    exporter: XlsxExporter,
}

impl<E: OcrEngine> TableExtractor<E> {
    pub fn new(engine: E) -> Self {
        Self {
            engine,
            store: None,
            exporter: XlsxExporter::new(),
        }
    }

    /// Keeps spreadsheets from [`extract_to_store`](Self::extract_to_store) in `store`.
    pub fn with_store(mut self, store: ArtifactStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_exporter(mut self, exporter: XlsxExporter) -> Self {
        self.exporter = exporter;
        self
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn store(&self) -> Option<&ArtifactStore> {
        self.store.as_ref()
    }

    pub fn extension(&self) -> &'static str {
        self.exporter.extension()
    }

    /// Raw engine output; an image without text is not an error here.
    pub async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, ExtractError> {
        Ok(self.engine.recognize(input).await?)
    }

    pub async fn extract_grid(&self, input: &OcrInput) -> Result<Grid, ExtractError> {
        let output = self.recognize(input).await?;
        if output.is_empty() {
            return Err(ExtractError::NoContent);
        }
        Ok(reconstruct_table(&output.regions)?)
    }

    /// Runs the whole pipeline and keeps the spreadsheet in the store.
    pub async fn extract_to_store(&self, input: &OcrInput) -> Result<ExtractedTable, ExtractError> {
        let store = self.store.clone().ok_or(ExtractError::NoStore)?;
        let started = Instant::now();
        let grid = self.extract_grid(input).await?;
        let ocr_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        let exporter = self.exporter.clone();
        let export_grid = grid.clone();
        let id = tokio::task::spawn_blocking(move || store.create(&export_grid, &exporter)).await??;
        let export_ms = started.elapsed().as_millis() as u64;

        info!(%id, rows = grid.height(), columns = grid.width(), ocr_ms, export_ms, "table extracted");
        Ok(ExtractedTable { id, grid })
    }

    /// Runs the whole pipeline and writes the spreadsheet to `destination`.
    pub async fn extract_to_file(&self, input: &OcrInput, destination: &Path) -> Result<Grid, ExtractError> {
        let started = Instant::now();
        let grid = self.extract_grid(input).await?;
        let ocr_ms = started.elapsed().as_millis() as u64;

        let started = Instant::now();
        let exporter = self.exporter.clone();
        let export_grid = grid.clone();
        let path = destination.to_path_buf();
        tokio::task::spawn_blocking(move || export_atomically(&export_grid, &exporter, &path)).await??;
        let export_ms = started.elapsed().as_millis() as u64;

        info!(
            path = %destination.display(),
            rows = grid.height(),
            columns = grid.width(),
            ocr_ms,
            export_ms,
            "table extracted"
        );
        Ok(grid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ocrgrid_ocr::{Quad, TextRegion};

    struct CannedEngine(Result<Vec<TextRegion>, String>);

    #[async_trait]
    impl OcrEngine for CannedEngine {
        async fn recognize(&self, _input: &OcrInput) -> Result<OcrOutput, OcrError> {
            match &self.0 {
                Ok(regions) => Ok(OcrOutput::from_regions(regions.clone())),
                Err(message) => Err(OcrError::EngineError(message.clone())),
            }
        }
    }

    fn regions() -> Vec<TextRegion> {
        vec![
            TextRegion::new("Name", Quad::from_rect(0.0, 0.0, 50.0, 15.0), 0.99),
            TextRegion::new("Score", Quad::from_rect(80.0, 0.0, 50.0, 15.0), 0.99),
            TextRegion::new("Ada", Quad::from_rect(0.0, 25.0, 30.0, 15.0), 0.99),
            TextRegion::new("97", Quad::from_rect(85.0, 25.0, 20.0, 15.0), 0.99),
        ]
    }

    fn extractor(engine: CannedEngine) -> (tempfile::TempDir, TableExtractor<CannedEngine>) {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path().join("artifacts")).unwrap();
        (dir, TableExtractor::new(engine).with_store(store))
    }

    #[tokio::test]
    async fn test_extract_to_store() {
        let (_dir, extractor) = extractor(CannedEngine(Ok(regions())));
        let table = extractor
            .extract_to_store(&OcrInput::Bytes(vec![0u8; 4]))
            .await
            .unwrap();
        assert_eq!(table.grid.rows, vec![vec!["Name", "Score"], vec!["Ada", "97"]]);
        assert!(extractor.store().unwrap().path(table.id, "xlsx").exists());
    }

    #[tokio::test]
    async fn test_extract_to_file() {
        let (dir, extractor) = extractor(CannedEngine(Ok(regions())));
        let path = dir.path().join("out.xlsx");
        let grid = extractor
            .extract_to_file(&OcrInput::Clipboard, &path)
            .await
            .unwrap();
        assert_eq!(grid.width(), 2);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_no_text_is_no_content() {
        let (_dir, extractor) = extractor(CannedEngine(Ok(Vec::new())));
        let err = extractor.extract_grid(&OcrInput::Clipboard).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoContent));
        assert_eq!(err.to_string(), "recognition produced no content");
    }

    #[tokio::test]
    async fn test_engine_failure_is_recognition_failure() {
        let (dir, extractor) = extractor(CannedEngine(Err("process exited".into())));
        let path = dir.path().join("out.xlsx");
        let err = extractor
            .extract_to_file(&OcrInput::Clipboard, &path)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("recognition failed"));
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_file_export_needs_no_store() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = TableExtractor::new(CannedEngine(Ok(regions())));
        let path = dir.path().join("out.xlsx");
        extractor
            .extract_to_file(&OcrInput::Clipboard, &path)
            .await
            .unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["out.xlsx"]);

        let err = extractor.extract_to_store(&OcrInput::Clipboard).await.unwrap_err();
        assert!(matches!(err, ExtractError::NoStore));
    }
}
