//! Nested workflow execution.
//!
//! Re-enters the orchestrator recursively with a fresh synthetic request in
//! silent mode (no catalog write). The nesting validator already bounded the
//! recursion depth before the parent run started.

#[cfg(test)]
#[path = "nested_tests.rs"]
mod tests;

use std::path::Path;
use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use mediaforge_engine::{MediaUploadKind, StorageScope};
use mediaforge_protocols::generation::{get_number, get_str};
use mediaforge_protocols::{GenerationData, TaskError};

use crate::orchestrator::{GenerationRequest, Orchestrator};

/// Metadata fields injected alongside every media mapping.
const MEDIA_METADATA_FIELDS: &[&str] = &["description", "summary", "tags", "name", "uid"];

/// Fields implicitly propagated from the child back to the parent even
/// without an output mapping rule, because the parent's finalization checks
/// its own save path and would otherwise see nothing.
const IMPLICIT_OUTPUT_FIELDS: &[&str] = &[
    "image_url",
    "audio_url",
    "save_image_path",
    "save_audio_path",
];

#[derive(Debug, Deserialize)]
pub(crate) struct NestedParams {
    pub workflow: Option<String>,
    #[serde(default)]
    pub input_mapping: Vec<InputRule>,
    #[serde(default)]
    pub output_mapping: Vec<CopyRule>,
}

/// One input mapping rule: either a plain field copy or a media mapping
/// that uploads a referenced file to the engine.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum InputRule {
    Media {
        /// Parent field holding the media file path.
        media: String,
    },
    Copy { from: String, to: String },
}

#[derive(Debug, Deserialize)]
pub(crate) struct CopyRule {
    pub from: String,
    pub to: String,
}

/// Build the child's scalar fields: a fresh seed plus the plain copies.
///
/// Missing copied fields default to the empty string rather than failing;
/// only the target workflow name is mandatory, and that is checked by the
/// caller.
pub(crate) fn build_child_fields(
    parent: &GenerationData,
    rules: &[InputRule],
    fresh_seed: u64,
) -> GenerationData {
    let mut child = GenerationData::new();
    let mut seed = fresh_seed;
    // Freshly randomized, never inherited.
    if let Some(parent_seed) = get_number(parent, "seed") {
        if seed == parent_seed as u64 {
            seed = seed.wrapping_add(1);
        }
    }
    child.insert("seed".to_string(), Value::from(seed));

    for rule in rules {
        if let InputRule::Copy { from, to } = rule {
            let value = parent
                .get(from)
                .cloned()
                .unwrap_or_else(|| Value::String(String::new()));
            child.insert(to.clone(), value);
        }
    }
    child
}

/// Inject an uploaded media file's engine-side name and the fixed metadata
/// set under indexed keys.
pub(crate) fn inject_media_fields(
    child: &mut GenerationData,
    parent: &GenerationData,
    index: u32,
    prefix: &str,
    engine_filename: &str,
) {
    let base = format!("{prefix}_{index}");
    child.insert(base.clone(), Value::String(engine_filename.to_string()));
    for field in MEDIA_METADATA_FIELDS {
        let value = parent
            .get(*field)
            .map(value_text)
            .unwrap_or_default();
        child.insert(format!("{base}_{field}"), Value::String(value));
    }
    let format = get_str(parent, "image_format").unwrap_or_default();
    child.insert(format!("{base}_format"), Value::String(format.to_string()));
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn upload_kind(path: &str) -> MediaUploadKind {
    let lower = path.to_ascii_lowercase();
    for ext in [".wav", ".mp3", ".flac", ".ogg", ".m4a"] {
        if lower.ends_with(ext) {
            return MediaUploadKind::Audio;
        }
    }
    MediaUploadKind::Image
}

pub(crate) async fn execute_nested(
    orchestrator: &Arc<Orchestrator>,
    params: &Value,
    data: &mut GenerationData,
) -> Result<(), TaskError> {
    let spec: NestedParams = serde_json::from_value(params.clone())
        .map_err(|e| TaskError::Failed(format!("invalid execute_workflow parameters: {e}")))?;
    let workflow = spec
        .workflow
        .ok_or_else(|| TaskError::MissingParameter("workflow".to_string()))?;

    let mut child = build_child_fields(data, &spec.input_mapping, rand::random::<u32>() as u64);

    // Media mappings upload into the engine and inject indexed fields.
    let mut image_index = 0;
    let mut audio_index = 0;
    for rule in &spec.input_mapping {
        let InputRule::Media { media } = rule else {
            continue;
        };
        let path = get_str(data, media)
            .ok_or_else(|| TaskError::MissingParameter(media.clone()))?
            .to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| TaskError::FileNotFound(path.clone().into()))?;
        let filename = Path::new(&path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("input.bin")
            .to_string();
        let kind = upload_kind(&path);
        let uploaded = orchestrator
            .engine
            .upload_media(bytes, &filename, kind, StorageScope::Input, true)
            .await?;
        let (prefix, index) = match kind {
            MediaUploadKind::Image => {
                image_index += 1;
                ("input_image", image_index - 1)
            }
            MediaUploadKind::Audio => {
                audio_index += 1;
                ("input_audio", audio_index - 1)
            }
        };
        inject_media_fields(&mut child, data, index, prefix, &uploaded.filename);
        debug!(%media, filename = %uploaded.filename, "nested input media uploaded");
    }

    info!(workflow = %workflow, "executing nested workflow");
    let outcome = orchestrator
        .run_nested(GenerationRequest {
            workflow: workflow.clone(),
            fields: child,
            silent: true,
        })
        .await
        .map_err(|source| TaskError::NestedWorkflow {
            workflow: workflow.clone(),
            source: Box::new(source),
        })?;

    for rule in &spec.output_mapping {
        if let Some(value) = outcome.data.get(&rule.from).cloned() {
            data.insert(rule.to.clone(), value);
        }
    }
    for field in IMPLICIT_OUTPUT_FIELDS {
        if let Some(value) = outcome.data.get(*field).cloned() {
            data.insert((*field).to_string(), value);
        }
    }
    Ok(())
}
