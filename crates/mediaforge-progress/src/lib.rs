//! # Mediaforge Progress
//!
//! The progress/event channel: a per-run registry mapping a task id to live
//! subscriber connections, a bounded replay buffer, and the step counter
//! that turns heterogeneous pipeline events into one fractional progress
//! stream.
//!
//! A subscriber may attach after work has started; every emission that finds
//! no subscribers is buffered and replayed, in order, to the first
//! subscriber. Lookups accept either the orchestrator's task id or the
//! engine's job id (reverse index populated by
//! [`ProgressChannel::link_engine_job`]).

mod channel;
mod record;

pub use channel::ProgressChannel;
pub use record::{RunMetadata, RunStatus};
