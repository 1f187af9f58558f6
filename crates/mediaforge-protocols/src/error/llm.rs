//! LLM bridge errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("The model returned an empty completion")]
    EmptyCompletion,

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}
