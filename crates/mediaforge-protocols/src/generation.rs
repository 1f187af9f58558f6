//! Generation run state shared across crates.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The mutable working copy of the caller's request fields.
///
/// Tasks read and write this map throughout the pipeline; field names are the
/// workflow document's vocabulary (`prompt`, `seed`, `image_format`,
/// `save_image_path`, ...).
pub type GenerationData = serde_json::Map<String, Value>;

/// Read a string field, if present and a string.
pub fn get_str<'a>(data: &'a GenerationData, key: &str) -> Option<&'a str> {
    data.get(key).and_then(Value::as_str)
}

/// Read a numeric field, accepting numbers and numeric strings.
pub fn get_number(data: &GenerationData, key: &str) -> Option<f64> {
    match data.get(key) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Pipeline phase of a generation run.
///
/// Transitions are strictly sequential; any phase may short-circuit to
/// `Failed`. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunPhase {
    Created,
    PreTasks,
    EngineSubmission,
    EngineExecuting,
    PostTasks,
    Finalizing,
    Completed,
    Failed,
}

impl RunPhase {
    /// Whether the run has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunPhase::Completed | RunPhase::Failed)
    }
}

/// A recoverable post-generation failure attached to the success event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationWarning {
    /// Field the failed task was writing to.
    pub field: String,
    /// Human-readable failure description.
    pub message: String,
}
