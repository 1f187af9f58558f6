//! Request and workflow validation errors.
//!
//! All of these surface before the orchestrator begins phase execution; no
//! task id exists yet when one is raised.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Unknown workflow: {0}")]
    UnknownWorkflow(String),

    #[error("Workflow '{workflow}' requires {required} input image(s), got {provided}")]
    MissingInputImages {
        workflow: String,
        required: u32,
        provided: u32,
    },

    #[error("Workflow '{workflow}' requires {required} input audio file(s), got {provided}")]
    MissingInputAudio {
        workflow: String,
        required: u32,
        provided: u32,
    },

    #[error("Unknown process task name: {0}")]
    UnknownProcess(String),

    #[error("Nested workflow reference '{0}' does not exist")]
    MissingNestedTarget(String),

    #[error("Workflow '{0}' nests another nesting workflow; nesting depth is limited to one")]
    NestingTooDeep(String),

    #[error("Workflow nesting cycle detected at '{0}'")]
    NestingCycle(String),

    #[error("Missing required field: {0}")]
    MissingField(String),
}
