//! Run-level generation errors.
//!
//! Any of these aborts the run: a terminal error event is emitted and no
//! catalog entry is written. Recoverable post-generation prompt failures
//! never become a `GenerationError`; they accumulate as warnings instead.

use std::path::PathBuf;

use thiserror::Error;

use super::{CatalogError, EngineError, TaskError, ValidationError};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Pre-generation task '{task}' failed: {source}")]
    PreTask { task: String, source: TaskError },

    #[error("Post-generation task '{task}' failed: {source}")]
    PostTask { task: String, source: TaskError },

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("Expected output file missing after generation: {0}")]
    OutputMissing(PathBuf),

    #[error("Catalog write failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("{0}")]
    Internal(String),
}
