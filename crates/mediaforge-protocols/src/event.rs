//! Progress event wire types delivered to subscribers.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::generation::GenerationWarning;

/// A snapshot of fractional progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressSnapshot {
    /// Overall progress in [0, 100].
    pub percentage: f32,
    /// Completed (or in-flight) countable step, 1-based.
    pub current_step: u32,
    /// Fixed step budget for the run.
    pub total_steps: u32,
    /// Engine-reported intra-node progress value.
    pub current_value: u32,
    /// Engine-reported intra-node progress maximum.
    pub max_value: u32,
    /// Display label for the current step.
    pub label: String,
    /// Graph node the label refers to, when engine-originated.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
}

/// One frame of the progress stream.
///
/// Terminal frames (`Completed`, `Error`) close the stream after delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProgressEvent {
    InProgress {
        progress: ProgressSnapshot,
    },
    Completed {
        result: Value,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        warnings: Vec<GenerationWarning>,
    },
    Error {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        details: Option<Value>,
    },
}

impl ProgressEvent {
    /// Whether this frame ends the stream.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Completed { .. } | ProgressEvent::Error { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_in_progress_serialization() {
        let event = ProgressEvent::InProgress {
            progress: ProgressSnapshot {
                percentage: 37.5,
                current_step: 3,
                total_steps: 8,
                current_value: 10,
                max_value: 20,
                label: "KSampler".to_string(),
                node: Some("4".to_string()),
            },
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""status":"in_progress""#));
        assert!(json.contains("37.5"));
        assert!(!event.is_terminal());
    }

    #[test]
    fn test_terminal_frames() {
        let done = ProgressEvent::Completed {
            result: json!({"uid": 1}),
            warnings: Vec::new(),
        };
        assert!(done.is_terminal());

        let err = ProgressEvent::Error {
            message: "boom".to_string(),
            details: None,
        };
        assert!(err.is_terminal());

        let json = serde_json::to_string(&err).unwrap();
        assert!(json.contains(r#""status":"error""#));
        assert!(!json.contains("details"));
    }

    #[test]
    fn test_completed_carries_warnings() {
        let event = ProgressEvent::Completed {
            result: json!({}),
            warnings: vec![GenerationWarning {
                field: "tags".to_string(),
                message: "llm unavailable".to_string(),
            }],
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("tags"));
        assert!(json.contains("warnings"));
    }
}
