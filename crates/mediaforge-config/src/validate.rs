//! Workflow graph validation.
//!
//! Runs once per top-level request, before any side effect, so that bad
//! configuration fails fast instead of surfacing mid-pipeline.

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;

use std::collections::HashSet;

use mediaforge_protocols::{ProcessKind, TaskSpec, ValidationError, WorkflowDefinition};

/// The workflow a task's `execute_workflow` process targets, if any.
pub fn nested_target(task: &TaskSpec) -> Option<&str> {
    if task.process.as_deref() != Some(ProcessKind::ExecuteWorkflow.name()) {
        return None;
    }
    task.parameters
        .as_ref()
        .and_then(|p| p.get("workflow"))
        .and_then(|w| w.as_str())
}

fn nested_targets(definition: &WorkflowDefinition) -> Vec<&str> {
    definition
        .pre_tasks
        .iter()
        .chain(definition.post_tasks.iter())
        .filter_map(nested_target)
        .collect()
}

fn has_nested_post_task(definition: &WorkflowDefinition) -> bool {
    definition.post_tasks.iter().any(|t| nested_target(t).is_some())
}

/// Reject illegal `execute_workflow` graphs.
///
/// A definition is invalid when a referenced target does not exist, when a
/// target's own post-tasks contain another `execute_workflow` (nesting deeper
/// than one level is categorically rejected, whether or not it would cycle),
/// or when a workflow name recurs along a reference chain (cycle).
pub fn validate_nesting(
    definition: &WorkflowDefinition,
    all: &[WorkflowDefinition],
) -> Result<(), ValidationError> {
    let mut visited = HashSet::new();
    visited.insert(definition.name.as_str());
    walk(definition, all, &mut visited)
}

fn walk<'a>(
    definition: &'a WorkflowDefinition,
    all: &'a [WorkflowDefinition],
    visited: &mut HashSet<&'a str>,
) -> Result<(), ValidationError> {
    for target_name in nested_targets(definition) {
        let Some(target) = all.iter().find(|w| w.name == target_name) else {
            return Err(ValidationError::MissingNestedTarget(target_name.to_string()));
        };
        if !visited.insert(target_name) {
            return Err(ValidationError::NestingCycle(target_name.to_string()));
        }
        if has_nested_post_task(target) {
            return Err(ValidationError::NestingTooDeep(target.name.clone()));
        }
        walk(target, all, visited)?;
    }
    Ok(())
}

/// Resolve every process task name in a definition against the closed
/// handler set; an unknown name is a validation error, not a silent no-op.
pub fn validate_process_names(definition: &WorkflowDefinition) -> Result<(), ValidationError> {
    for task in definition.pre_tasks.iter().chain(definition.post_tasks.iter()) {
        if let Some(name) = task.process.as_deref() {
            if ProcessKind::from_name(name).is_none() {
                return Err(ValidationError::UnknownProcess(name.to_string()));
            }
        }
    }
    Ok(())
}
