//! Line-delimited JSON messages exchanged with a PaddleOCR-json style engine.
//!
//! Each request is a single JSON object terminated by `\r\n`; the engine
//! answers with exactly one line holding an [`OcrResponse`].

use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::engine::{OcrError, OcrInput, OcrOutput};
use crate::region::TextRegion;

/// Recognition succeeded and `data` holds at least one region.
pub const CODE_OK: i32 = 100;
/// Recognition succeeded but the image contained no text.
pub const CODE_NO_TEXT: i32 = 101;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OcrRequest {
    Path { image_path: String },
    Base64 { image_base64: String },
}

impl OcrRequest {
    pub fn from_input(input: &OcrInput) -> Result<Self, OcrError> {
        let request = match input {
            OcrInput::FilePath(path) => {
                let image_path = path
                    .to_str()
                    .ok_or_else(|| OcrError::InvalidInput("non-utf8 path".into()))?
                    .to_string();
                OcrRequest::Path { image_path }
            }
            OcrInput::Clipboard => OcrRequest::Path {
                image_path: "clipboard".into(),
            },
            OcrInput::Base64(data) => OcrRequest::Base64 {
                image_base64: data.clone(),
            },
            OcrInput::Bytes(bytes) => {
                if bytes.is_empty() {
                    return Err(OcrError::InvalidInput("empty image".into()));
                }
                OcrRequest::Base64 {
                    image_base64: base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            }
        };
        Ok(request)
    }

    pub fn is_path(&self) -> bool {
        matches!(self, OcrRequest::Path { .. })
    }

    /// Serialized request line including the trailing `\r\n`.
    pub fn to_line(&self) -> Result<String, OcrError> {
        let mut line = serde_json::to_string(self)?;
        line.push_str("\r\n");
        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    Regions(Vec<TextRegion>),
    Message(String),
}

impl Default for ResponseData {
    fn default() -> Self {
        ResponseData::Regions(Vec::new())
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OcrResponse {
    pub code: i32,
    #[serde(default)]
    pub data: ResponseData,
}

impl OcrResponse {
    pub fn parse(line: &str) -> Result<Self, OcrError> {
        Ok(serde_json::from_str(line.trim())?)
    }

    /// Code 100 yields the regions, code 101 an empty output, anything else
    /// is a recognition failure.
    pub fn into_output(self) -> Result<OcrOutput, OcrError> {
        match (self.code, self.data) {
            (CODE_OK, ResponseData::Regions(regions)) => Ok(OcrOutput::from_regions(regions)),
            (CODE_NO_TEXT, _) => Ok(OcrOutput::default()),
            (CODE_OK, ResponseData::Message(message)) => Err(OcrError::EngineError(format!(
                "success code without regions: {message}"
            ))),
            (code, ResponseData::Message(message)) => Err(OcrError::Recognition { code, message }),
            (code, ResponseData::Regions(_)) => Err(OcrError::Recognition {
                code,
                message: "unknown response code".into(),
            }),
        }
    }
}
