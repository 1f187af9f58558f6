//! Generation submission and status.

#[cfg(test)]
#[path = "generate_tests.rs"]
mod tests;

use std::sync::Arc;

use axum::Json;
use axum::extract::{Multipart, Path, State};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use mediaforge_progress::RunStatus;
use mediaforge_protocols::{GenerationData, ValidationError, WorkflowDefinition};
use mediaforge_runtime::GenerationRequest;

use crate::error::ApiError;
use crate::state::AppState;

const AUDIO_EXTENSIONS: &[&str] = &[".wav", ".mp3", ".flac", ".ogg", ".m4a"];

/// Response to a successful submission.
#[derive(Debug, Serialize)]
pub struct StartResponse {
    pub task_id: String,
}

/// `POST /api/generations`: multipart form with a `workflow` field, scalar
/// fields, and uploaded media parts.
///
/// All validation (workflow existence, required input counts, nesting
/// legality) happens before a task id exists; a rejected request leaves no
/// trace.
pub async fn start_generation(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<StartResponse>, ApiError> {
    let mut workflow = None;
    let mut fields = GenerationData::new();
    let mut image_count = 0u32;
    let mut audio_count = 0u32;

    while let Some(part) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        let name = part.name().unwrap_or_default().to_string();
        if let Some(filename) = part.file_name().map(str::to_string) {
            let bytes = part
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed reading upload: {e}")))?;
            let stored = store_upload(state.as_ref(), &filename, &bytes).await?;
            let key = if is_audio_filename(&filename) {
                audio_count += 1;
                format!("input_audio_{}", audio_count - 1)
            } else {
                image_count += 1;
                format!("input_image_{}", image_count - 1)
            };
            debug!(%key, %filename, "upload stored");
            fields.insert(key, Value::String(stored));
        } else {
            let text = part
                .text()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed reading field: {e}")))?;
            if name == "workflow" {
                workflow = Some(text);
            } else if !name.is_empty() {
                fields.insert(name, Value::String(text));
            }
        }
    }

    let workflow =
        workflow.ok_or_else(|| ApiError::BadRequest("missing 'workflow' field".to_string()))?;

    // Required-input validation happens here, where the upload counts are
    // known, before the orchestrator is invoked.
    let definitions = state
        .library
        .load()
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let definition = definitions
        .iter()
        .find(|d| d.name == workflow)
        .ok_or_else(|| ValidationError::UnknownWorkflow(workflow.clone()))?;
    validate_input_counts(definition, image_count, audio_count)?;

    let started = state
        .orchestrator
        .start(GenerationRequest {
            workflow,
            fields,
            silent: false,
        })
        .await?;
    info!(task_id = %started.task_id, "generation accepted");
    Ok(Json(StartResponse {
        task_id: started.task_id,
    }))
}

/// `GET /api/generations/{task_id}`: run status snapshot.
pub async fn generation_status(
    State(state): State<Arc<AppState>>,
    Path(task_id): Path<String>,
) -> Result<Json<RunStatus>, ApiError> {
    state
        .progress
        .get_run(&task_id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("run {task_id}")))
}

/// Check the uploaded media counts against the workflow's requirements.
pub(crate) fn validate_input_counts(
    definition: &WorkflowDefinition,
    images: u32,
    audio: u32,
) -> Result<(), ValidationError> {
    if images < definition.options.input_images {
        return Err(ValidationError::MissingInputImages {
            workflow: definition.name.clone(),
            required: definition.options.input_images,
            provided: images,
        });
    }
    if audio < definition.options.input_audio {
        return Err(ValidationError::MissingInputAudio {
            workflow: definition.name.clone(),
            required: definition.options.input_audio,
            provided: audio,
        });
    }
    Ok(())
}

pub(crate) fn is_audio_filename(filename: &str) -> bool {
    let lower = filename.to_ascii_lowercase();
    AUDIO_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

async fn store_upload(state: &AppState, filename: &str, bytes: &[u8]) -> Result<String, ApiError> {
    tokio::fs::create_dir_all(&state.storage.upload_dir)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let safe_name: String = filename
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let path = state
        .storage
        .upload_dir
        .join(format!("{}_{safe_name}", Uuid::new_v4()));
    tokio::fs::write(&path, bytes)
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(path.to_string_lossy().into_owned())
}
