//! Output path materialization.
//!
//! Runs after pre-generation tasks (which may still set format fields) and
//! before engine submission, because the bound graph carries the final save
//! path.

use std::collections::HashSet;
use std::path::Path;

use serde_json::Value;
use tracing::debug;

use mediaforge_protocols::generation::get_str;
use mediaforge_protocols::{GenerationData, GenerationError, MediaKind, ValidationError};

const AUDIO_FORMAT_FALLBACK: &str = "flac";

/// Synthesize `save_image_path` / `save_audio_path` when the caller did not
/// supply them.
///
/// Indexing scans the directory by filename pattern rather than keeping a
/// counter, so files dropped in out of band never collide.
pub fn materialize_output_paths(
    data: &mut GenerationData,
    kind: MediaKind,
    media_dir: &Path,
) -> Result<(), GenerationError> {
    if kind.is_audio() {
        if get_str(data, "save_audio_path").is_none() {
            let format = match get_str(data, "audio_format") {
                Some(format) => format.to_string(),
                None => {
                    data.insert(
                        "audio_format".to_string(),
                        Value::String(AUDIO_FORMAT_FALLBACK.to_string()),
                    );
                    AUDIO_FORMAT_FALLBACK.to_string()
                }
            };
            let index = next_free_index(media_dir, "audio");
            let path = media_dir.join(format!("audio_{index}.{format}"));
            debug!(path = %path.display(), "audio save path materialized");
            data.insert(
                "save_audio_path".to_string(),
                Value::String(path.to_string_lossy().into_owned()),
            );
        }
        return Ok(());
    }

    if get_str(data, "save_image_path").is_none() {
        // The format must have been resolved by now, from workflow options,
        // an extra input, or a pre-generation task.
        let format = get_str(data, "image_format")
            .ok_or_else(|| ValidationError::MissingField("image_format".to_string()))?
            .to_string();
        let index = next_free_index(media_dir, "image");
        let path = media_dir.join(format!("image_{index}.{format}"));
        debug!(path = %path.display(), "image save path materialized");
        data.insert(
            "save_image_path".to_string(),
            Value::String(path.to_string_lossy().into_owned()),
        );
    }
    Ok(())
}

/// The first unused index for `{prefix}_{n}.*` filenames in `dir`.
pub fn next_free_index(dir: &Path, prefix: &str) -> u32 {
    let mut used = HashSet::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            let Some(rest) = name.strip_prefix(prefix).and_then(|r| r.strip_prefix('_')) else {
                continue;
            };
            let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
            if let Ok(index) = digits.parse::<u32>() {
                used.insert(index);
            }
        }
    }
    let mut index = 1;
    while used.contains(&index) {
        index += 1;
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn data(value: Value) -> GenerationData {
        value.as_object().unwrap().clone()
    }

    #[test]
    fn test_image_path_synthesized() {
        let dir = TempDir::new().unwrap();
        let mut fields = data(json!({"image_format": "png"}));
        materialize_output_paths(&mut fields, MediaKind::Image, dir.path()).unwrap();
        let path = get_str(&fields, "save_image_path").unwrap();
        assert!(path.ends_with("image_1.png"));
    }

    #[test]
    fn test_existing_path_kept() {
        let dir = TempDir::new().unwrap();
        let mut fields = data(json!({"save_image_path": "/custom/out.png"}));
        materialize_output_paths(&mut fields, MediaKind::Image, dir.path()).unwrap();
        assert_eq!(get_str(&fields, "save_image_path").unwrap(), "/custom/out.png");
    }

    #[test]
    fn test_missing_format_is_fatal() {
        let dir = TempDir::new().unwrap();
        let mut fields = data(json!({}));
        let result = materialize_output_paths(&mut fields, MediaKind::Image, dir.path());
        assert!(matches!(
            result,
            Err(GenerationError::Validation(ValidationError::MissingField(f))) if f == "image_format"
        ));
    }

    #[test]
    fn test_index_skips_existing_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("image_1.png"), b"x").unwrap();
        std::fs::write(dir.path().join("image_2.webp"), b"x").unwrap();
        // Out-of-band file with a gap.
        std::fs::write(dir.path().join("image_5.png"), b"x").unwrap();
        // First unused index, not max+1.
        assert_eq!(next_free_index(dir.path(), "image"), 3);
    }

    #[test]
    fn test_index_namespaces_are_independent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("image_1.png"), b"x").unwrap();
        assert_eq!(next_free_index(dir.path(), "audio"), 1);
    }

    #[test]
    fn test_audio_path_with_fallback_format() {
        let dir = TempDir::new().unwrap();
        let mut fields = data(json!({}));
        materialize_output_paths(&mut fields, MediaKind::Audio, dir.path()).unwrap();
        let path = get_str(&fields, "save_audio_path").unwrap();
        assert!(path.ends_with("audio_1.flac"));
        assert_eq!(get_str(&fields, "audio_format").unwrap(), "flac");
    }

    #[test]
    fn test_unreadable_dir_starts_at_one() {
        let mut fields = data(json!({"image_format": "png"}));
        materialize_output_paths(&mut fields, MediaKind::Image, Path::new("/nonexistent/dir"))
            .unwrap();
        assert!(get_str(&fields, "save_image_path").unwrap().contains("image_1.png"));
    }
}
