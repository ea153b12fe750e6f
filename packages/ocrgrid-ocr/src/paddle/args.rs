use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::engine::OcrError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ArgValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for ArgValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgValue::Bool(v) => write!(f, "{v}"),
            ArgValue::Int(v) => write!(f, "{v}"),
            ArgValue::Float(v) => write!(f, "{v}"),
            ArgValue::Text(v) => f.write_str(v),
        }
    }
}

impl From<bool> for ArgValue {
    fn from(v: bool) -> Self {
        ArgValue::Bool(v)
    }
}

impl From<i64> for ArgValue {
    fn from(v: i64) -> Self {
        ArgValue::Int(v)
    }
}

impl From<&str> for ArgValue {
    fn from(v: &str) -> Self {
        ArgValue::Text(v.to_string())
    }
}

impl From<String> for ArgValue {
    fn from(v: String) -> Self {
        ArgValue::Text(v)
    }
}

/// Startup flags passed to the engine as `--key=value`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineArgs(BTreeMap<String, ArgValue>);

impl Default for EngineArgs {
    /// Asks the engine to emit raw UTF-8 instead of `\u` escapes.
    fn default() -> Self {
        Self::empty().with("ensure_ascii", false)
    }
}

impl EngineArgs {
    pub fn empty() -> Self {
        Self(BTreeMap::new())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ArgValue>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Renders the flags, rejecting any that are not pure ASCII.
    pub fn to_flags(&self) -> Result<Vec<String>, OcrError> {
        self.0
            .iter()
            .map(|(key, value)| {
                let flag = format!("--{key}={value}");
                if flag.is_ascii() {
                    Ok(flag)
                } else {
                    Err(OcrError::InvalidArgument(flag))
                }
            })
            .collect()
    }
}
