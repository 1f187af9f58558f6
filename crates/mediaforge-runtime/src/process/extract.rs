//! Sidecar-file extraction handlers.
//!
//! The engine writes text sidecars next to its outputs during execution;
//! these handlers pull their content into the generation data after the
//! engine reports completion.

use std::path::Path;

use serde_json::Value;
use tracing::debug;

use mediaforge_protocols::generation::get_str;
use mediaforge_protocols::{GenerationData, TaskError};

/// For each named property, read a sidecar text file and assign its trimmed
/// content. The first missing or unreadable file fails the task and aborts
/// the remaining properties.
pub(crate) async fn extract_text_outputs(
    params: &Value,
    data: &mut GenerationData,
    output_dir: &Path,
) -> Result<(), TaskError> {
    let outputs = params
        .get("outputs")
        .and_then(Value::as_object)
        .ok_or_else(|| TaskError::MissingParameter("outputs".to_string()))?;

    for (field, file) in outputs {
        let Some(file) = file.as_str() else {
            return Err(TaskError::MissingParameter(format!("outputs.{field}")));
        };
        let path = output_dir.join(file);
        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|_| TaskError::FileNotFound(path.clone()))?;
        debug!(field, file, "text output extracted");
        data.insert(field.clone(), Value::String(content.trim().to_string()));
    }
    Ok(())
}

/// Resolve the engine's real output path from a pointer sidecar and copy the
/// file to the run's final save path.
///
/// The save path declared inside the graph is a placeholder; the pointer
/// file names where the engine actually wrote, and the extension is
/// rewritten to the requested image format.
pub(crate) async fn extract_media_from_pointer(
    params: &Value,
    data: &mut GenerationData,
    output_dir: &Path,
) -> Result<(), TaskError> {
    let pointer = params
        .get("pointer")
        .and_then(Value::as_str)
        .ok_or_else(|| TaskError::MissingParameter("pointer".to_string()))?;
    let format = get_str(data, "image_format")
        .ok_or_else(|| TaskError::MissingParameter("image_format".to_string()))?
        .to_string();
    let save_path = get_str(data, "save_image_path")
        .ok_or_else(|| TaskError::MissingParameter("save_image_path".to_string()))?
        .to_string();

    let pointer_path = output_dir.join(pointer);
    let declared = tokio::fs::read_to_string(&pointer_path)
        .await
        .map_err(|_| TaskError::FileNotFound(pointer_path.clone()))?;
    let declared = declared.trim();

    let mut resolved = Path::new(declared).with_extension(&format);
    if resolved.is_relative() {
        resolved = output_dir.join(resolved);
    }
    if !resolved.exists() {
        return Err(TaskError::FileNotFound(resolved));
    }

    if let Some(parent) = Path::new(&save_path).parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }
    tokio::fs::copy(&resolved, &save_path).await?;
    debug!(from = %resolved.display(), to = %save_path, "media output copied");
    Ok(())
}
