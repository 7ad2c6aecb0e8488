use std::path::PathBuf;

/// Errors that abort a run.
///
/// Schema- and row-level anomalies (unparseable timestamps, missing optional
/// columns) never show up here; they are reported as
/// [`SchemaWarning`](crate::data::schema::SchemaWarning)s instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// I/O error reading the export or writing the run log
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing error
    #[error("CSV parsing error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON parsing error
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Parquet reader error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Arrow batch error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// A column the pipeline cannot run without
    #[error("Missing required column '{0}'")]
    MissingColumn(String),

    /// Input with an extension no loader handles
    #[error("Unsupported file extension: .{0}")]
    UnsupportedFormat(String),

    /// Structurally invalid input (e.g. a JSON root that is not an array)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration file could not be parsed
    #[error("Invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    /// The operator aborted, or input ran out, while answering a prompt
    #[error(transparent)]
    Prompt(#[from] PromptError),
}

/// Errors raised by interactive prompts.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    /// Retry budget exhausted on invalid answers
    #[error("No valid answer to '{prompt}' after {attempts} attempts, aborting run")]
    TooManyAttempts { prompt: String, attempts: u32 },

    /// Input stream closed before a valid answer was read
    #[error("Input closed while waiting for an answer to '{0}'")]
    InputClosed(String),

    /// Terminal I/O failure
    #[error("Prompt I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
