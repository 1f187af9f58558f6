//! Engine HTTP client.

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};

use mediaforge_protocols::EngineError;

use crate::api::{
    CompletionStatus, FreeRequest, HistoryResponse, SubmitRequest, SubmitResponse, SubmittedJob,
    UploadResponse, UploadedMedia,
};

/// What kind of media an upload carries; selects the engine endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaUploadKind {
    Image,
    Audio,
}

impl MediaUploadKind {
    fn endpoint(&self) -> &'static str {
        match self {
            MediaUploadKind::Image => "upload/image",
            MediaUploadKind::Audio => "upload/audio",
        }
    }
}

/// Engine-side storage scope an upload lands in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageScope {
    Input,
    Output,
    Temp,
}

impl StorageScope {
    fn as_str(&self) -> &'static str {
        match self {
            StorageScope::Input => "input",
            StorageScope::Output => "output",
            StorageScope::Temp => "temp",
        }
    }
}

/// HTTP client for the node-graph engine.
pub struct EngineClient {
    base_url: String,
    client: reqwest::Client,
}

impl EngineClient {
    /// Create a client for the engine at `base_url`.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// The engine's WebSocket push endpoint for a given client id.
    pub fn ws_url(&self, client_id: &str) -> String {
        let ws_base = self
            .base_url
            .replacen("http://", "ws://", 1)
            .replacen("https://", "wss://", 1);
        format!("{ws_base}/ws?clientId={client_id}")
    }

    /// Upload a media file into the engine's storage.
    pub async fn upload_media(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        kind: MediaUploadKind,
        scope: StorageScope,
        overwrite: bool,
    ) -> Result<UploadedMedia, EngineError> {
        let part = reqwest::multipart::Part::bytes(bytes).file_name(filename.to_string());
        let form = reqwest::multipart::Form::new()
            .part("image", part)
            .text("type", scope.as_str())
            .text("overwrite", if overwrite { "true" } else { "false" });

        let url = format!("{}/{}", self.base_url, kind.endpoint());
        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| EngineError::Upload(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Upload(format!("{status}: {text}")));
        }

        let upload: UploadResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        debug!(filename = %upload.name, "media uploaded to engine");
        Ok(UploadedMedia {
            filename: upload.name,
        })
    }

    /// Submit a fully-bound graph for execution.
    pub async fn submit(&self, graph: &Value, client_id: &str) -> Result<SubmittedJob, EngineError> {
        let request = SubmitRequest {
            prompt: graph.clone(),
            client_id: client_id.to_string(),
        };
        let url = format!("{}/prompt", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(EngineError::Submission(format!("{status}: {text}")));
        }

        let submit: SubmitResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;
        let job_id = submit
            .prompt_id
            .ok_or_else(|| EngineError::Submission("engine returned no job id".to_string()))?;
        debug!(%job_id, "graph submitted");
        Ok(SubmittedJob { job_id })
    }

    /// Poll the history endpoint until the job reaches a terminal state.
    ///
    /// Transient poll failures count against the attempt budget and are
    /// retried; an engine-reported execution error is returned as an errored
    /// [`CompletionStatus`], not an `Err`. Only exhausting the budget without
    /// ever seeing a terminal state is a [`EngineError::Timeout`].
    pub async fn await_completion(
        &self,
        job_id: &str,
        max_attempts: u32,
        interval: Duration,
    ) -> Result<CompletionStatus, EngineError> {
        for attempt in 1..=max_attempts {
            tokio::time::sleep(interval).await;
            match self.history(job_id).await {
                Ok(Some(status)) => return Ok(status),
                Ok(None) => {}
                Err(e) => {
                    warn!(%job_id, attempt, error = %e, "status check failed, retrying");
                }
            }
        }
        Err(EngineError::Timeout {
            job_id: job_id.to_string(),
            attempts: max_attempts,
        })
    }

    /// One status check. `Ok(None)` means the job is still running.
    async fn history(&self, job_id: &str) -> Result<Option<CompletionStatus>, EngineError> {
        let url = format!("{}/history/{}", self.base_url, job_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Network(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EngineError::Network(format!(
                "history returned {}",
                response.status()
            )));
        }

        let history: HistoryResponse = response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))?;

        let Some(entry) = history.get(job_id) else {
            return Ok(None);
        };
        let Some(status) = &entry.status else {
            return Ok(None);
        };

        let errored = status.status_str.as_deref() == Some("error");
        if errored {
            let message = status
                .messages
                .as_ref()
                .map(|m| m.to_string())
                .unwrap_or_else(|| "execution error".to_string());
            return Ok(Some(CompletionStatus {
                completed: false,
                errored: true,
                error: Some(message),
                outputs: entry.outputs.clone(),
            }));
        }
        if status.completed {
            return Ok(Some(CompletionStatus {
                completed: true,
                errored: false,
                error: None,
                outputs: entry.outputs.clone(),
            }));
        }
        Ok(None)
    }

    /// Ask the engine to release model memory. Best-effort: failures are
    /// logged and swallowed so a workflow switch never fails on cleanup.
    pub async fn free_memory(&self) {
        let url = format!("{}/free", self.base_url);
        let request = FreeRequest {
            unload_models: true,
            free_memory: true,
        };
        match self.client.post(&url).json(&request).send().await {
            Ok(response) if !response.status().is_success() => {
                warn!(status = %response.status(), "engine memory free rejected");
            }
            Ok(_) => debug!("engine memory freed"),
            Err(e) => warn!(error = %e, "engine memory free failed"),
        }
    }
}
