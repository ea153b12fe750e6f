use thiserror::Error;

/// Failures of the table reconstruction itself.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("no table detected")]
    NoTableDetected,
    /// An internal invariant was broken; never caused by user input.
    #[error("internal error: {0}")]
    Internal(String),
}
