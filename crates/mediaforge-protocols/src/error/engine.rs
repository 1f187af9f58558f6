//! External engine client errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Media upload failed: {0}")]
    Upload(String),

    #[error("Graph submission failed: {0}")]
    Submission(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Engine reported an execution error: {0}")]
    Execution(String),

    #[error("Job {job_id} did not complete within {attempts} status checks")]
    Timeout { job_id: String, attempts: u32 },

    #[error("Unexpected engine response: {0}")]
    InvalidResponse(String),
}
