use thiserror::Error;

/// Errors emitted by the sampling, sanitizing, scraping and emission stages.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Table(#[from] seedbed_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl GenerationError {
    /// The taxonomy error behind this failure, if any.
    pub fn as_core(&self) -> Option<&seedbed_core::Error> {
        match self {
            GenerationError::Table(err) => Some(err),
            _ => None,
        }
    }

    /// Returns true for problems that only affect a single row.
    pub fn is_row_level(&self) -> bool {
        self.as_core().is_some_and(seedbed_core::Error::is_row_level)
    }
}
