//! # Mediaforge Runtime
//!
//! The generation orchestrator: computes the execution plan for a workflow,
//! runs pre-generation tasks, binds data into the graph template, drives the
//! external engine, runs post-generation tasks with their asymmetric failure
//! policies, and finalizes the result into the media catalog, emitting
//! progress throughout.
//!
//! Process task handlers (the closed [`ProcessKind`] set) live in
//! [`process`]; nested workflows re-enter the orchestrator recursively in
//! silent mode.
//!
//! [`ProcessKind`]: mediaforge_protocols::ProcessKind

mod binding;
mod orchestrator;
mod paths;
mod plan;
mod process;
mod tasks;

pub use orchestrator::{GenerationRequest, Orchestrator, RunOutcome, StartedRun};
pub use plan::{ExecutionPlan, IMPORTANT_NODE_TYPES};
