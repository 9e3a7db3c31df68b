//! Batch Error Types

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, BatchError>;

/// Errors that abort a batch run. Per-row API failures are recorded in the
/// output file instead.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("CSV not found: {}", .0.display())]
    CsvNotFound(PathBuf),

    #[error("CSV is missing the `{0}` column")]
    MissingColumn(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
