//! CLI error types.

use gsidem::DemError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Dem(#[from] DemError),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize heightmap: {0}")]
    Json(#[from] serde_json::Error),

    #[error("tile {0} was cancelled")]
    Cancelled(String),

    #[error("{failed} of {total} tiles failed")]
    BatchFailed { failed: usize, total: usize },
}
