//! Task execution errors.

use std::path::PathBuf;

use thiserror::Error;

use super::{EngineError, GenerationError, LlmError};

#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Prompt task failed: {0}")]
    Prompt(#[from] LlmError),

    #[error("Engine call failed: {0}")]
    Engine(#[from] EngineError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Nested workflow '{workflow}' failed: {source}")]
    NestedWorkflow {
        workflow: String,
        source: Box<GenerationError>,
    },

    #[error("{0}")]
    Failed(String),
}

impl TaskError {
    /// Whether this error came from a prompt/template task.
    ///
    /// Prompt failures are recoverable in the post-generation phase;
    /// everything else is fatal everywhere.
    pub fn is_prompt(&self) -> bool {
        matches!(self, TaskError::Prompt(_))
    }
}
