//! Runtime configuration, read from an optional TOML file.
//!
//! ```toml
//! timeout_secs = 60
//! output_dir = "/var/tmp/ocrgrid"
//! artifact_ttl_secs = 600
//! bind = "0.0.0.0:8080"
//!
//! [engine]
//! mode = "socket"
//! host = "127.0.0.1"
//! port = 8765
//!
//! [engine.args]
//! ensure_ascii = false
//! ```
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use ocrgrid_ocr::{EngineArgs, OcrEngine, OcrError, ProcessEngine, SocketEngine};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    #[default]
    Process,
    Socket,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub mode: EngineMode,
    /// Engine executable, used in `process` mode.
    pub exe_path: PathBuf,
    /// Engine server, used in `socket` mode.
    pub host: String,
    pub port: u16,
    pub args: EngineArgs,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mode: EngineMode::Process,
            exe_path: PathBuf::from("PaddleOCR-json_v1.4.1/PaddleOCR-json"),
            host: "127.0.0.1".into(),
            port: 8765,
            args: EngineArgs::default(),
        }
    }
}

impl EngineConfig {
    /// Starts (process mode) or reaches (socket mode) the configured engine.
    pub async fn start(&self, timeout: Duration) -> Result<Box<dyn OcrEngine>, OcrError> {
        match self.mode {
            EngineMode::Process => {
                info!(exe = %self.exe_path.display(), "starting OCR engine process");
                let engine = ProcessEngine::spawn(&self.exe_path, &self.args, timeout).await?;
                Ok(Box::new(engine))
            }
            EngineMode::Socket => {
                info!(host = %self.host, port = self.port, "using OCR engine server");
                let engine = SocketEngine::connect(self.host.clone(), self.port, &self.args, timeout).await?;
                Ok(Box::new(engine))
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    /// Upper bound for engine startup and for each recognition request.
    pub timeout_secs: u64,
    /// Where exported spreadsheets wait for download.
    pub output_dir: PathBuf,
    /// Spreadsheets not downloaded within this many seconds are deleted.
    pub artifact_ttl_secs: u64,
    pub bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            timeout_secs: 30,
            output_dir: std::env::temp_dir().join("ocrgrid"),
            artifact_ttl_secs: 3600,
            bind: "127.0.0.1:8080".into(),
        }
    }
}

impl AppConfig {
    /// Defaults when `path` is `None`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read config file {}", path.display()))?;
                Self::from_toml(&contents)
                    .with_context(|| format!("Failed to parse config file {}", path.display()))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn artifact_ttl(&self) -> Duration {
        Duration::from_secs(self.artifact_ttl_secs)
    }
}
