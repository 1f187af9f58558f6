//! Loop crossfade handlers.
//!
//! Blend the trailing window of an asset into its leading window so the loop
//! point is seamless, shortening the asset by the window. The blending runs
//! in an external `ffmpeg` process; this module owns only the window-fit
//! decision and command construction.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tokio::process::Command;
use tracing::{debug, info};

use mediaforge_protocols::generation::{get_number, get_str};
use mediaforge_protocols::{GenerationData, TaskError};

/// A viable blend: `body` is the output length, `window` the blended span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BlendPlan {
    pub body: f64,
    pub window: f64,
}

/// Decide whether a blend fits.
///
/// A window of at least half the asset leaves no unblended body, so the
/// handler is a no-op rather than a failure.
pub(crate) fn blend_plan(total: f64, window: f64) -> Option<BlendPlan> {
    if total <= 0.0 || window <= 0.0 {
        return None;
    }
    if window * 2.0 >= total {
        return None;
    }
    Some(BlendPlan {
        body: total - window,
        window,
    })
}

/// Crossfade the tail of a video into its head.
pub(crate) async fn loop_crossfade(
    params: &Value,
    data: &mut GenerationData,
) -> Result<(), TaskError> {
    run_crossfade(params, data, "save_image_path", "video_seconds", false).await
}

/// Crossfade the tail of an audio asset into its head.
pub(crate) async fn audio_crossfade(
    params: &Value,
    data: &mut GenerationData,
) -> Result<(), TaskError> {
    run_crossfade(params, data, "save_audio_path", "audio_seconds", true).await
}

async fn run_crossfade(
    params: &Value,
    data: &mut GenerationData,
    default_field: &str,
    duration_field: &str,
    audio: bool,
) -> Result<(), TaskError> {
    let window = params
        .get("window_seconds")
        .and_then(Value::as_f64)
        .ok_or_else(|| TaskError::MissingParameter("window_seconds".to_string()))?;
    let field = params
        .get("field")
        .and_then(Value::as_str)
        .unwrap_or(default_field);
    let path = get_str(data, field)
        .ok_or_else(|| TaskError::MissingParameter(field.to_string()))?
        .to_string();
    let path = PathBuf::from(path);
    if !path.exists() {
        return Err(TaskError::FileNotFound(path));
    }

    // Prefer a duration the pipeline already knows; probe otherwise.
    let total = match get_number(data, duration_field) {
        Some(total) => total,
        None => probe_duration(&path).await?,
    };

    let Some(plan) = blend_plan(total, window) else {
        debug!(
            path = %path.display(),
            total, window, "asset too short for crossfade, leaving untouched"
        );
        return Ok(());
    };

    let output = sibling_temp_path(&path);
    let filter = if audio {
        format!(
            "[0:a]atrim=end={body},asetpts=PTS-STARTPTS[body];\
             [0:a]atrim=start={body},asetpts=PTS-STARTPTS[tail];\
             [tail][body]acrossfade=d={window}[out]",
            body = plan.body,
            window = plan.window
        )
    } else {
        format!(
            "[0:v]trim=end={body},setpts=PTS-STARTPTS[body];\
             [0:v]trim=start={body},setpts=PTS-STARTPTS[tail];\
             [tail][body]xfade=transition=fade:duration={window}:offset=0[out]",
            body = plan.body,
            window = plan.window
        )
    };

    let status = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(&path)
        .arg("-filter_complex")
        .arg(&filter)
        .arg("-map")
        .arg("[out]")
        .arg(&output)
        .output()
        .await
        .map_err(|e| TaskError::Failed(format!("ffmpeg not runnable: {e}")))?;

    if !status.status.success() {
        let stderr = String::from_utf8_lossy(&status.stderr);
        return Err(TaskError::Failed(format!(
            "ffmpeg crossfade failed: {}",
            stderr.trim()
        )));
    }

    tokio::fs::rename(&output, &path).await?;
    info!(path = %path.display(), window, "loop crossfade applied");

    // The asset shortened by the window; keep the duration field honest.
    if data.contains_key(duration_field) {
        data.insert(duration_field.to_string(), Value::from(plan.body));
    }
    Ok(())
}

/// Probe an asset's duration in seconds with ffprobe.
async fn probe_duration(path: &Path) -> Result<f64, TaskError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error", "-show_entries", "format=duration", "-of", "csv=p=0"])
        .arg(path)
        .output()
        .await
        .map_err(|e| TaskError::Failed(format!("ffprobe not runnable: {e}")))?;

    if !output.status.success() {
        return Err(TaskError::Failed(format!(
            "ffprobe failed for {}",
            path.display()
        )));
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout
        .trim()
        .parse()
        .map_err(|_| TaskError::Failed(format!("unparseable duration '{}'", stdout.trim())))
}

/// Output path next to the input, keeping the extension so the muxer picks
/// the same container.
fn sibling_temp_path(path: &Path) -> PathBuf {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("out");
    path.with_file_name(format!("xfade_{name}"))
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
    fn test_blend_plan_fits() {
        let plan = blend_plan(10.0, 2.0).unwrap();
        assert_eq!(plan.body, 8.0);
        assert_eq!(plan.window, 2.0);
    }

    #[test]
    fn test_blend_plan_window_half_or_more_is_none() {
        // Exactly half: nothing unblended would remain.
        assert!(blend_plan(4.0, 2.0).is_none());
        assert!(blend_plan(4.0, 3.0).is_none());
        assert!(blend_plan(0.0, 1.0).is_none());
        assert!(blend_plan(4.0, 0.0).is_none());
    }

    #[tokio::test]
    async fn test_short_asset_is_untouched_noop() {
        let dir = TempDir::new().unwrap();
        let asset = dir.path().join("loop.mp4");
        std::fs::write(&asset, b"fake-video").unwrap();

        let mut fields = data(json!({
            "save_image_path": asset.to_string_lossy(),
            "video_seconds": 2.0
        }));
        // Window >= half the duration: succeed without modifying the file.
        loop_crossfade(&json!({"window_seconds": 1.0}), &mut fields)
            .await
            .unwrap();
        assert_eq!(std::fs::read(&asset).unwrap(), b"fake-video");
        assert_eq!(fields.get("video_seconds").unwrap(), &json!(2.0));
    }

    #[tokio::test]
    async fn test_missing_asset_fails() {
        let mut fields = data(json!({"save_audio_path": "/nonexistent/a.flac"}));
        let result = audio_crossfade(&json!({"window_seconds": 1.0}), &mut fields).await;
        assert!(matches!(result, Err(TaskError::FileNotFound(_))));
    }

    #[tokio::test]
    async fn test_missing_window_parameter_fails() {
        let mut fields = data(json!({}));
        let result = loop_crossfade(&json!({}), &mut fields).await;
        assert!(matches!(
            result,
            Err(TaskError::MissingParameter(p)) if p == "window_seconds"
        ));
    }

    #[test]
    fn test_sibling_temp_path_keeps_extension() {
        let temp = sibling_temp_path(Path::new("/media/loop.mp4"));
        assert_eq!(temp, PathBuf::from("/media/xfade_loop.mp4"));
    }
}
