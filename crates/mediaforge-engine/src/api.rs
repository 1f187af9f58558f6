//! Engine API wire types.
//! Fields mirror the engine's JSON shapes for serde deserialization.
#![allow(dead_code)]

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Graph submission request.
#[derive(Debug, Serialize)]
pub struct SubmitRequest {
    pub prompt: Value,
    pub client_id: String,
}

/// Graph submission response.
#[derive(Debug, Deserialize)]
pub struct SubmitResponse {
    pub prompt_id: Option<String>,
    #[serde(default)]
    pub number: Option<u64>,
    #[serde(default)]
    pub node_errors: Option<Value>,
}

/// Media upload response.
#[derive(Debug, Deserialize)]
pub struct UploadResponse {
    pub name: String,
    #[serde(default)]
    pub subfolder: Option<String>,
}

/// History endpoint response: job id to execution record.
pub type HistoryResponse = HashMap<String, HistoryEntry>;

/// One finished (or failed) execution in the engine's history.
#[derive(Debug, Deserialize)]
pub struct HistoryEntry {
    #[serde(default)]
    pub status: Option<HistoryStatus>,
    #[serde(default)]
    pub outputs: Option<Value>,
}

/// Execution status block within a history entry.
#[derive(Debug, Deserialize)]
pub struct HistoryStatus {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub status_str: Option<String>,
    #[serde(default)]
    pub messages: Option<Value>,
}

/// Memory release request.
#[derive(Debug, Serialize)]
pub struct FreeRequest {
    pub unload_models: bool,
    pub free_memory: bool,
}

/// A successfully uploaded media file, by its engine-side name.
#[derive(Debug, Clone)]
pub struct UploadedMedia {
    pub filename: String,
}

/// A submitted job handle.
#[derive(Debug, Clone)]
pub struct SubmittedJob {
    pub job_id: String,
}

/// Terminal result of a completion poll.
///
/// An engine-reported execution error is a *result*, not a transport error;
/// only exhausting the attempt budget is.
#[derive(Debug, Clone)]
pub struct CompletionStatus {
    pub completed: bool,
    pub errored: bool,
    pub error: Option<String>,
    pub outputs: Option<Value>,
}
