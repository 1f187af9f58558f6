//! Task specifications for pre/post generation phases.

use serde::{Deserialize, Serialize};

use crate::condition::Condition;

/// Which of the task families a spec belongs to.
///
/// Discriminated by field presence: `process` wins over `prompt`/`template`,
/// which win over `transforms`, which win over a bare `from`/`to` copy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Named side-effecting handler from the process registry.
    Process,
    /// LLM prompt/template writing into a target field.
    Prompt,
    /// Arithmetic transform chain between two fields.
    Math,
    /// Plain field copy.
    Copy,
    /// No meaningful fields; executes as a no-op.
    Empty,
}

/// Rounding applied after a math transform chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoundMode {
    Floor,
    Ceil,
    Nearest,
}

/// One step of a math task: `(value + offset) * scale + bias`, then rounding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MathStep {
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_scale")]
    pub scale: f64,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub round: Option<RoundMode>,
}

fn default_scale() -> f64 {
    1.0
}

impl MathStep {
    /// Apply this step to a value.
    pub fn apply(&self, value: f64) -> f64 {
        let v = (value + self.offset) * self.scale + self.bias;
        match self.round {
            Some(RoundMode::Floor) => v.floor(),
            Some(RoundMode::Ceil) => v.ceil(),
            Some(RoundMode::Nearest) => v.round(),
            None => v,
        }
    }
}

/// A single pre/post generation task.
///
/// The union is encoded by which optional fields are present; [`TaskSpec::kind`]
/// resolves the discriminant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskSpec {
    /// Process handler name (resolved to [`ProcessKind`] at validation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process: Option<String>,
    /// Handler parameters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Value>,
    /// LLM prompt text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// LLM prompt template; interchangeable with `prompt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    /// Source field for prompt context, math input, or copy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    /// Target field written by prompt, math, or copy tasks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    /// Field holding an image path for caption-style prompts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
    /// Math transform chain.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transforms: Vec<MathStep>,
    /// Guard evaluated against the generation data before execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl TaskSpec {
    /// Resolve the task family from field presence.
    pub fn kind(&self) -> TaskKind {
        if self.process.is_some() {
            TaskKind::Process
        } else if self.prompt_text().is_some() {
            TaskKind::Prompt
        } else if !self.transforms.is_empty() {
            TaskKind::Math
        } else if self.from.is_some() && self.to.is_some() {
            TaskKind::Copy
        } else {
            TaskKind::Empty
        }
    }

    /// The prompt text, from either the `prompt` or `template` field.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().or(self.template.as_deref())
    }

    /// Whether this task contributes one unit to the progress total.
    ///
    /// Only process and prompt tasks count; math and copy tasks are free.
    pub fn countable(&self) -> bool {
        matches!(self.kind(), TaskKind::Process | TaskKind::Prompt)
    }

    /// Display label used in progress events.
    pub fn label(&self) -> String {
        match self.kind() {
            TaskKind::Process => self.process.clone().unwrap_or_default(),
            TaskKind::Prompt => self
                .to
                .as_deref()
                .map(|to| format!("prompt:{to}"))
                .unwrap_or_else(|| "prompt".to_string()),
            TaskKind::Math => "math".to_string(),
            TaskKind::Copy => "copy".to_string(),
            TaskKind::Empty => "noop".to_string(),
        }
    }
}

/// The closed set of process task handlers.
///
/// Workflow JSON refers to handlers by name; the name resolves to a variant
/// exactly once, at validation, so a typo is a hard error rather than a
/// silently skipped task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProcessKind {
    /// Read sidecar text files written by the engine into data fields.
    ExtractTextOutputs,
    /// Resolve the real engine output path from a pointer file and copy it
    /// to the run's save path.
    ExtractMediaFromTextPointer,
    /// Blend the tail of a video into its head for a seamless loop.
    LoopCrossfade,
    /// Blend the tail of an audio asset into its head.
    AudioCrossfade,
    /// Run another workflow as a nested sub-run.
    ExecuteWorkflow,
}

impl ProcessKind {
    /// Resolve a workflow-JSON handler name. Returns `None` for unknown names.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "extract_text_outputs" => Some(Self::ExtractTextOutputs),
            "extract_media_from_text_pointer" => Some(Self::ExtractMediaFromTextPointer),
            "loop_crossfade" => Some(Self::LoopCrossfade),
            "audio_crossfade" => Some(Self::AudioCrossfade),
            "execute_workflow" => Some(Self::ExecuteWorkflow),
            _ => None,
        }
    }

    /// The canonical handler name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ExtractTextOutputs => "extract_text_outputs",
            Self::ExtractMediaFromTextPointer => "extract_media_from_text_pointer",
            Self::LoopCrossfade => "loop_crossfade",
            Self::AudioCrossfade => "audio_crossfade",
            Self::ExecuteWorkflow => "execute_workflow",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(json: &str) -> TaskSpec {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_kind_discrimination() {
        assert_eq!(
            task(r#"{"process":"execute_workflow"}"#).kind(),
            TaskKind::Process
        );
        assert_eq!(
            task(r#"{"prompt":"describe","to":"caption"}"#).kind(),
            TaskKind::Prompt
        );
        assert_eq!(
            task(r#"{"template":"describe","to":"caption"}"#).kind(),
            TaskKind::Prompt
        );
        assert_eq!(
            task(r#"{"from":"a","to":"b","transforms":[{"offset":1.0}]}"#).kind(),
            TaskKind::Math
        );
        assert_eq!(task(r#"{"from":"a","to":"b"}"#).kind(), TaskKind::Copy);
        assert_eq!(task(r#"{}"#).kind(), TaskKind::Empty);
    }

    #[test]
    fn test_countable_only_process_and_prompt() {
        assert!(task(r#"{"process":"loop_crossfade"}"#).countable());
        assert!(task(r#"{"prompt":"p","to":"t"}"#).countable());
        assert!(!task(r#"{"from":"a","to":"b","transforms":[{"scale":2.0}]}"#).countable());
        assert!(!task(r#"{"from":"a","to":"b"}"#).countable());
    }

    #[test]
    fn test_math_step_apply() {
        let step = MathStep {
            offset: 1.0,
            scale: 2.0,
            bias: 0.5,
            round: None,
        };
        assert_eq!(step.apply(3.0), 8.5);

        let floored = MathStep {
            round: Some(RoundMode::Floor),
            ..step
        };
        assert_eq!(floored.apply(3.0), 8.0);

        let ceiled = MathStep {
            round: Some(RoundMode::Ceil),
            ..step
        };
        assert_eq!(ceiled.apply(3.0), 9.0);
    }

    #[test]
    fn test_math_step_defaults() {
        let step: MathStep = serde_json::from_str("{}").unwrap();
        assert_eq!(step.scale, 1.0);
        assert_eq!(step.apply(7.0), 7.0);
    }

    #[test]
    fn test_process_kind_roundtrip() {
        for name in [
            "extract_text_outputs",
            "extract_media_from_text_pointer",
            "loop_crossfade",
            "audio_crossfade",
            "execute_workflow",
        ] {
            let kind = ProcessKind::from_name(name).unwrap();
            assert_eq!(kind.name(), name);
        }
        assert!(ProcessKind::from_name("no_such_handler").is_none());
    }
}
