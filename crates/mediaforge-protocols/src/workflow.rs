//! Workflow definition schema.
//!
//! A workflow definition describes everything the orchestrator needs to run
//! one generation: the node-graph template it binds into, the required and
//! optional inputs, and the ordered pre/post task lists.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::condition::Condition;
use crate::task::TaskSpec;

/// The kind of media a workflow produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Inpaint,
}

impl MediaKind {
    /// Whether this workflow produces an audio asset.
    pub fn is_audio(&self) -> bool {
        matches!(self, MediaKind::Audio)
    }

    /// Whether this workflow produces a video asset.
    pub fn is_video(&self) -> bool {
        matches!(self, MediaKind::Video)
    }
}

/// An extra scalar input a workflow accepts beyond its media inputs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtraInput {
    /// Field name in the generation data.
    pub name: String,
    /// Default value applied when the caller does not supply the field.
    #[serde(default)]
    pub default: Option<serde_json::Value>,
}

/// Workflow input requirements and output type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowOptions {
    /// Output media kind.
    pub kind: MediaKind,
    /// Number of input images the caller must upload.
    #[serde(default)]
    pub input_images: u32,
    /// Number of input audio files the caller must upload.
    #[serde(default)]
    pub input_audio: u32,
    /// Extra scalar inputs with optional defaults.
    #[serde(default)]
    pub extra_inputs: Vec<ExtraInput>,
}

/// A rule describing how one generation-data field is written into the
/// graph template before submission.
///
/// Bindings are a merge, not a replace: when the condition is unmet or the
/// resolved value is absent, the template's existing value stays untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldBinding {
    /// Nested key sequence into the graph template.
    pub target_path: Vec<String>,
    /// Generation-data field the value is read from.
    #[serde(default)]
    pub source: Option<String>,
    /// Literal value used instead of a data field.
    #[serde(default)]
    pub literal: Option<serde_json::Value>,
    /// String prepended to the resolved value.
    #[serde(default)]
    pub prefix: Option<String>,
    /// String appended to the resolved value.
    #[serde(default)]
    pub postfix: Option<String>,
    /// Gate; the binding is skipped when unmet.
    #[serde(default)]
    pub condition: Option<Condition>,
}

/// A complete workflow definition, immutable once loaded for a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Unique workflow name.
    pub name: String,
    /// Path to the node-graph template JSON.
    pub template_path: PathBuf,
    /// Input requirements and output type.
    pub options: WorkflowOptions,
    /// Data-to-graph binding rules.
    #[serde(default)]
    pub field_bindings: Vec<FieldBinding>,
    /// Tasks executed before engine submission.
    #[serde(default)]
    pub pre_tasks: Vec<TaskSpec>,
    /// Tasks executed after engine completion.
    #[serde(default)]
    pub post_tasks: Vec<TaskSpec>,
}
