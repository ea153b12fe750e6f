//! Request-keyed storage for exported spreadsheets awaiting download.
use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::grid_assembler::Grid;
use crate::xlsx_exporter::{ExportError, GridExporter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ArtifactId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.as_hyphenated())
    }
}

impl FromStr for ArtifactId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

/// Exports to a sibling `.part` file and renames it to `destination` once
/// the write succeeded. The partial file is removed on failure.
pub fn export_atomically(
    grid: &Grid,
    exporter: &dyn GridExporter,
    destination: &Path,
) -> Result<(), ExportError> {
    let mut partial = destination.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    if let Err(e) = exporter.export(grid, &partial) {
        if let Err(cleanup) = std::fs::remove_file(&partial) {
            if cleanup.kind() != ErrorKind::NotFound {
                warn!(path = %partial.display(), error = %cleanup, "could not remove partial artifact");
            }
        }
        return Err(e);
    }
    std::fs::rename(&partial, destination)?;
    Ok(())
}

/// Directory of exported artifacts, one file per request.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_name(id: ArtifactId, extension: &str) -> String {
        format!("{id}.{extension}")
    }

    pub fn path(&self, id: ArtifactId, extension: &str) -> PathBuf {
        self.root.join(Self::file_name(id, extension))
    }

    /// Exports `grid` under a fresh id.
    pub fn create(&self, grid: &Grid, exporter: &dyn GridExporter) -> Result<ArtifactId, ExportError> {
        let id = ArtifactId::new();
        let path = self.path(id, exporter.extension());
        export_atomically(grid, exporter, &path)?;
        debug!(%id, path = %path.display(), "artifact stored");
        Ok(id)
    }

    /// Reads the artifact and deletes it. `None` when it does not exist.
    pub async fn take(&self, id: ArtifactId, extension: &str) -> std::io::Result<Option<Vec<u8>>> {
        let path = self.path(id, extension);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        tokio::fs::remove_file(&path).await?;
        debug!(%id, "artifact delivered and removed");
        Ok(Some(bytes))
    }

    /// Removes artifacts, finished or partial, last modified more than
    /// `max_age` ago. Files not named after an artifact id are left alone.
    pub fn purge_older_than(&self, max_age: Duration) -> std::io::Result<usize> {
        let now = SystemTime::now();
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.root)? {
            let entry = entry?;
            let path = entry.path();
            if !is_artifact_file(&path) {
                continue;
            }
            // gone already when a download raced the sweep
            let Ok(metadata) = entry.metadata() else {
                continue;
            };
            if !metadata.is_file() {
                continue;
            }
            let age = now.duration_since(metadata.modified()?).unwrap_or_default();
            if age <= max_age {
                continue;
            }
            match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(path = %path.display(), age_secs = age.as_secs(), "expired artifact removed");
                    removed += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e),
            }
        }
        Ok(removed)
    }
}

fn is_artifact_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(|name| name.split('.').next())
        .is_some_and(|stem| stem.parse::<ArtifactId>().is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid_assembler::assemble_grid;
    use crate::xlsx_exporter::XlsxExporter;

    struct FailingExporter;

    impl GridExporter for FailingExporter {
        fn extension(&self) -> &'static str {
            "xlsx"
        }

        fn export(&self, _grid: &Grid, destination: &Path) -> Result<(), ExportError> {
            std::fs::write(destination, b"half a workbook")?;
            Err(ExportError::EmptyGrid)
        }
    }

    fn grid() -> Grid {
        assemble_grid(vec![vec!["a".into()]])
    }

    #[tokio::test]
    async fn test_create_then_take_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let id = store.create(&grid(), &XlsxExporter::new()).unwrap();
        assert!(store.path(id, "xlsx").exists());

        let bytes = store.take(id, "xlsx").await.unwrap().unwrap();
        assert!(bytes.starts_with(b"PK"));
        assert!(!store.path(id, "xlsx").exists());
        assert!(store.take(id, "xlsx").await.unwrap().is_none());
    }

    #[test]
    fn test_each_request_gets_its_own_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let a = store.create(&grid(), &XlsxExporter::new()).unwrap();
        let b = store.create(&grid(), &XlsxExporter::new()).unwrap();
        assert_ne!(a, b);
        assert_ne!(store.path(a, "xlsx"), store.path(b, "xlsx"));
    }

    #[test]
    fn test_failed_export_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        assert!(store.create(&grid(), &FailingExporter).is_err());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    fn age(path: &Path, by: Duration) {
        let file = std::fs::File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() - by).unwrap();
    }

    #[test]
    fn test_purge_removes_only_expired_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = ArtifactStore::open(dir.path()).unwrap();
        let hour = Duration::from_secs(3600);

        let stale = store.create(&grid(), &XlsxExporter::new()).unwrap();
        let fresh = store.create(&grid(), &XlsxExporter::new()).unwrap();
        age(&store.path(stale, "xlsx"), 2 * hour);

        let leftover = dir.path().join(format!("{}.xlsx.part", ArtifactId::new()));
        std::fs::write(&leftover, b"half").unwrap();
        age(&leftover, 2 * hour);

        let notes = dir.path().join("notes.txt");
        std::fs::write(&notes, b"keep me").unwrap();
        age(&notes, 2 * hour);

        assert_eq!(store.purge_older_than(hour).unwrap(), 2);
        assert!(!store.path(stale, "xlsx").exists());
        assert!(!leftover.exists());
        assert!(store.path(fresh, "xlsx").exists());
        assert!(notes.exists());

        assert_eq!(store.purge_older_than(hour).unwrap(), 0);
    }

    #[test]
    fn test_id_round_trips_through_text() {
        let id = ArtifactId::new();
        assert_eq!(id.to_string().parse::<ArtifactId>().unwrap(), id);
        assert!("../../etc/passwd".parse::<ArtifactId>().is_err());
    }
}
