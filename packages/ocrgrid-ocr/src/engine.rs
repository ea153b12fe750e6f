use std::path::PathBuf;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::region::TextRegion;

#[derive(Debug, Clone)]
pub enum OcrInput {
    FilePath(PathBuf),
    Base64(String),
    Bytes(Vec<u8>),
    /// Whatever image the engine host currently has on its clipboard.
    Clipboard,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OcrOutput {
    pub text: String,
    pub regions: Vec<TextRegion>,
}

impl OcrOutput {
    pub fn from_regions(regions: Vec<TextRegion>) -> Self {
        let text = regions
            .iter()
            .map(|r| r.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Self { text, regions }
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[derive(Debug, Error)]
pub enum OcrError {
    #[error("unsupported operation")]
    Unsupported,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("engine arguments must be ASCII: {0}")]
    InvalidArgument(String),
    #[error("engine error: {0}")]
    EngineError(String),
    #[error("engine did not finish initializing: {0}")]
    NotReady(String),
    #[error("engine process exited or connection closed")]
    Disconnected,
    #[error("engine did not answer within {0:?}")]
    Timeout(std::time::Duration),
    #[error("recognition failed with code {code}: {message}")]
    Recognition { code: i32, message: String },
    #[error("engine i/o: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed engine response: {0}")]
    Protocol(#[from] serde_json::Error),
}

#[async_trait]
pub trait OcrEngine: Send + Sync {
    async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, OcrError>;
}

#[async_trait]
impl<E: OcrEngine + ?Sized> OcrEngine for std::sync::Arc<E> {
    async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, OcrError> {
        (**self).recognize(input).await
    }
}

#[async_trait]
impl<E: OcrEngine + ?Sized> OcrEngine for Box<E> {
    async fn recognize(&self, input: &OcrInput) -> Result<OcrOutput, OcrError> {
        (**self).recognize(input).await
    }
}
