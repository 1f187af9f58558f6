//! Engine push events.

use serde_json::Value;

/// A decoded push frame from the engine's WebSocket.
///
/// Frames the orchestration layer does not care about decode to `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A node began executing. `node: None` signals the job finished its
    /// node list.
    Executing {
        job_id: String,
        node: Option<String>,
    },
    /// Intra-node progress.
    Progress {
        job_id: String,
        node: Option<String>,
        value: u32,
        max: u32,
    },
    /// Nodes served from the engine's cache; they will emit no progress.
    Cached { job_id: String, nodes: Vec<String> },
    /// The engine failed the job.
    ExecutionError { job_id: String, message: String },
}

impl EngineEvent {
    /// Decode a raw WebSocket text frame. Unknown or malformed frames are
    /// ignored rather than treated as errors; the push channel is advisory.
    pub fn decode(frame: &str) -> Option<Self> {
        let value: Value = serde_json::from_str(frame).ok()?;
        let kind = value.get("type")?.as_str()?;
        let data = value.get("data")?;

        match kind {
            "executing" => Some(EngineEvent::Executing {
                job_id: data.get("prompt_id")?.as_str()?.to_string(),
                node: data
                    .get("node")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            }),
            "progress" => Some(EngineEvent::Progress {
                job_id: data.get("prompt_id")?.as_str()?.to_string(),
                node: data
                    .get("node")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                value: data.get("value").and_then(Value::as_u64).unwrap_or(0) as u32,
                max: data.get("max").and_then(Value::as_u64).unwrap_or(0) as u32,
            }),
            "execution_cached" => Some(EngineEvent::Cached {
                job_id: data.get("prompt_id")?.as_str()?.to_string(),
                nodes: data
                    .get("nodes")
                    .and_then(Value::as_array)
                    .map(|nodes| {
                        nodes
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            }),
            "execution_error" => Some(EngineEvent::ExecutionError {
                job_id: data.get("prompt_id")?.as_str()?.to_string(),
                message: data
                    .get("exception_message")
                    .and_then(Value::as_str)
                    .unwrap_or("execution error")
                    .to_string(),
            }),
            _ => None,
        }
    }

    /// The job this event belongs to.
    pub fn job_id(&self) -> &str {
        match self {
            EngineEvent::Executing { job_id, .. }
            | EngineEvent::Progress { job_id, .. }
            | EngineEvent::Cached { job_id, .. }
            | EngineEvent::ExecutionError { job_id, .. } => job_id,
        }
    }
}
