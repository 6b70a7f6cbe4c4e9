mod atomic;
mod logging;
mod run;

pub use atomic::write_json_atomic;
pub use logging::init_logging;
pub use run::{RunRecord, write_run_record};

use thiserror::Error;

/// Errors raised while writing run artifacts.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("logging error: {0}")]
    Logging(String),
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

pub type RegistryResult<T> = std::result::Result<T, RegistryError>;
