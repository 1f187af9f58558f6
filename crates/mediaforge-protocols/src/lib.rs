//! # Mediaforge Protocols
//!
//! Shared data model for the mediaforge workspace. Contains the workflow
//! definition schema, task specifications, the condition evaluator, progress
//! event wire types, and the per-domain error enums. No implementations live
//! here; the other crates depend on these types.

pub mod condition;
pub mod error;
pub mod event;
pub mod generation;
pub mod task;
pub mod workflow;

pub use condition::{Condition, ConditionLeaf, is_blank};
pub use error::{
    CatalogError, EngineError, GenerationError, LlmError, TaskError, ValidationError,
};
pub use event::{ProgressEvent, ProgressSnapshot};
pub use generation::{GenerationData, GenerationWarning, RunPhase};
pub use task::{MathStep, ProcessKind, RoundMode, TaskKind, TaskSpec};
pub use workflow::{ExtraInput, FieldBinding, MediaKind, WorkflowDefinition, WorkflowOptions};
