//! Process task handlers.
//!
//! The closed handler set; workflow JSON names resolve to [`ProcessKind`]
//! variants at validation, and dispatch here is a total match. Handlers
//! mutate the generation data in place and fail the enclosing run on any
//! unrecoverable condition: there is no silent-degrade path for process
//! tasks.

mod crossfade;
mod extract;
mod nested;

use std::sync::Arc;

use serde_json::Value;

use mediaforge_protocols::{GenerationData, ProcessKind, TaskError};

use crate::orchestrator::Orchestrator;

pub(crate) async fn dispatch(
    orchestrator: &Arc<Orchestrator>,
    kind: ProcessKind,
    parameters: Option<&Value>,
    data: &mut GenerationData,
) -> Result<(), TaskError> {
    let params = parameters.unwrap_or(&Value::Null);
    match kind {
        ProcessKind::ExtractTextOutputs => {
            extract::extract_text_outputs(params, data, &orchestrator.storage.engine_output_dir)
                .await
        }
        ProcessKind::ExtractMediaFromTextPointer => {
            extract::extract_media_from_pointer(
                params,
                data,
                &orchestrator.storage.engine_output_dir,
            )
            .await
        }
        ProcessKind::LoopCrossfade => crossfade::loop_crossfade(params, data).await,
        ProcessKind::AudioCrossfade => crossfade::audio_crossfade(params, data).await,
        ProcessKind::ExecuteWorkflow => nested::execute_nested(orchestrator, params, data).await,
    }
}
