use thiserror::Error;

/// Error taxonomy shared across seedbed crates.
///
/// Row-level variants are recoverable (the row is skipped); every other
/// variant aborts the current call.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    /// A referenced column is absent from the table.
    #[error("missing column '{0}'")]
    MissingColumn(String),
    /// Bad numeric argument: negative count, non-positive length.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    /// Empty or inverted range, or sampling more distinct values than a pool holds.
    #[error("invalid range: {0}")]
    InvalidRange(String),
    /// Missing input file or unreachable remote source.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),
    /// A single row could not be transformed or emitted.
    #[error("row {row}: {message}")]
    RowProcessing { row: usize, message: String },
    /// A required transform produced no rows.
    #[error("empty result: {0}")]
    EmptyResult(String),
}

impl Error {
    /// Returns true for problems that only affect a single row.
    pub fn is_row_level(&self) -> bool {
        matches!(self, Error::RowProcessing { .. })
    }

    pub fn row(row: usize, message: impl Into<String>) -> Self {
        Error::RowProcessing {
            row,
            message: message.into(),
        }
    }
}

/// Convenience alias for results returned by seedbed crates.
pub type Result<T> = std::result::Result<T, Error>;
