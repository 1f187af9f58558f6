//! Pre/post generation task execution.
//!
//! Both phases share one dispatch loop; the difference is policy. Every
//! pre-generation failure aborts the run because pre-gen fields are
//! load-bearing for the submission that follows. Post-generation prompt
//! failures are recoverable cosmetic enrichment; post-generation process
//! failures stay fatal because they do structural work.

use std::sync::Arc;

use serde_json::{Number, Value};
use tracing::warn;

use mediaforge_protocols::generation::{get_number, get_str};
use mediaforge_protocols::{
    GenerationData, GenerationError, GenerationWarning, ProcessKind, TaskError, TaskKind, TaskSpec,
};

use crate::orchestrator::Orchestrator;
use crate::process;

/// Written into the target field when a recoverable prompt task fails, so
/// downstream consumers never see a missing value.
pub(crate) const PROMPT_FALLBACK: &str = "unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TaskPhase {
    Pre,
    Post,
}

impl TaskPhase {
    fn wrap(&self, label: &str, source: TaskError) -> GenerationError {
        match self {
            TaskPhase::Pre => GenerationError::PreTask {
                task: label.to_string(),
                source,
            },
            TaskPhase::Post => GenerationError::PostTask {
                task: label.to_string(),
                source,
            },
        }
    }
}

/// Run a task list in declaration order.
///
/// Condition-gated tasks that are skipped still consume their step when
/// countable, so the step total stays meaningful across conditional
/// branches.
pub(crate) async fn execute_task_list(
    orchestrator: &Arc<Orchestrator>,
    task_id: &str,
    phase: TaskPhase,
    tasks: &[TaskSpec],
    data: &mut GenerationData,
    warnings: &mut Vec<GenerationWarning>,
) -> Result<(), GenerationError> {
    for task in tasks {
        let label = task.label();

        if let Some(condition) = &task.condition {
            if !condition.evaluate(data) {
                if task.countable() {
                    orchestrator.progress.skip_step(task_id, &label);
                }
                continue;
            }
        }

        match task.kind() {
            TaskKind::Process => {
                orchestrator.progress.begin_step(task_id, &label);
                let kind = resolve_process(task)?;
                process::dispatch(orchestrator, kind, task.parameters.as_ref(), data)
                    .await
                    .map_err(|source| phase.wrap(&label, source))?;
                orchestrator.progress.complete_step(task_id);
            }
            TaskKind::Prompt => {
                orchestrator.progress.begin_step(task_id, &label);
                match run_prompt_task(orchestrator, task, data).await {
                    Ok(()) => {}
                    Err(source) if phase == TaskPhase::Post => {
                        let field = task.to.clone().unwrap_or_else(|| label.clone());
                        warn!(
                            task_id,
                            field = %field,
                            error = %source,
                            "post-generation prompt failed, continuing with fallback"
                        );
                        data.insert(field.clone(), Value::String(PROMPT_FALLBACK.to_string()));
                        warnings.push(GenerationWarning {
                            field,
                            message: source.to_string(),
                        });
                    }
                    Err(source) => return Err(phase.wrap(&label, source)),
                }
                orchestrator.progress.complete_step(task_id);
            }
            TaskKind::Math => apply_math(task, data),
            TaskKind::Copy => copy_field(task, data),
            TaskKind::Empty => {}
        }
    }
    Ok(())
}

fn resolve_process(task: &TaskSpec) -> Result<ProcessKind, GenerationError> {
    let name = task.process.as_deref().unwrap_or_default();
    // Names were validated before the run started; an unknown name here is
    // an internal inconsistency rather than user error.
    ProcessKind::from_name(name)
        .ok_or_else(|| GenerationError::Internal(format!("unresolved process name '{name}'")))
}

/// Run one prompt/template task: interpolate, call the bridge, write the
/// target field.
async fn run_prompt_task(
    orchestrator: &Arc<Orchestrator>,
    task: &TaskSpec,
    data: &mut GenerationData,
) -> Result<(), TaskError> {
    let to = task
        .to
        .as_deref()
        .ok_or_else(|| TaskError::MissingParameter("to".to_string()))?
        .to_string();
    let text = task.prompt_text().unwrap_or_default();
    let prompt = interpolate(text, data);

    orchestrator.note_llm_model().await;

    let completion = if let Some(image_field) = task.image_path.as_deref() {
        let path = get_str(data, image_field)
            .ok_or_else(|| TaskError::MissingParameter(image_field.to_string()))?
            .to_string();
        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|_| TaskError::FileNotFound(path.clone().into()))?;
        orchestrator
            .llm
            .caption(&prompt, &bytes, mime_for(&path))
            .await?
    } else {
        let context = task.from.as_deref().and_then(|field| get_str(data, field));
        orchestrator.llm.complete(&prompt, context).await?
    };

    data.insert(to, Value::String(completion));
    Ok(())
}

/// Replace `{field}` placeholders with generation-data values.
pub(crate) fn interpolate(text: &str, data: &GenerationData) -> String {
    let mut result = text.to_string();
    for (key, value) in data {
        let placeholder = format!("{{{key}}}");
        if result.contains(&placeholder) {
            let replacement = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            result = result.replace(&placeholder, &replacement);
        }
    }
    result
}

/// Apply a math task's transform chain. A missing or non-numeric source
/// leaves the target untouched, matching binding merge semantics.
pub(crate) fn apply_math(task: &TaskSpec, data: &mut GenerationData) {
    let (Some(from), Some(to)) = (task.from.as_deref(), task.to.as_deref()) else {
        return;
    };
    let Some(mut value) = get_number(data, from) else {
        return;
    };
    for step in &task.transforms {
        value = step.apply(value);
    }
    let number = if value.fract() == 0.0 {
        Number::from(value as i64)
    } else {
        Number::from_f64(value).unwrap_or_else(|| Number::from(0))
    };
    data.insert(to.to_string(), Value::Number(number));
}

/// Plain field copy; absent sources are left alone.
pub(crate) fn copy_field(task: &TaskSpec, data: &mut GenerationData) {
    let (Some(from), Some(to)) = (task.from.as_deref(), task.to.as_deref()) else {
        return;
    };
    if let Some(value) = data.get(from).cloned() {
        data.insert(to.to_string(), value);
    }
}

fn mime_for(path: &str) -> &'static str {
    let lower = path.to_ascii_lowercase();
    if lower.ends_with(".png") {
        "image/png"
    } else if lower.ends_with(".jpg") || lower.ends_with(".jpeg") {
        "image/jpeg"
    } else if lower.ends_with(".webp") {
        "image/webp"
    } else {
        "application/octet-stream"
    }
}
