//! Execution plan and step accounting.
//!
//! The step total is computed once, before any task executes, from the task
//! lists and a structural scan of the graph template. The scan is independent
//! of runtime execution order, which keeps the total immune to engine-side
//! branching and caching.

use std::collections::{HashMap, HashSet};

use serde_json::Value;

use mediaforge_protocols::{TaskSpec, WorkflowDefinition};
use mediaforge_progress::RunMetadata;

/// Node types that represent substantial work: sampling, VAE encode/decode,
/// media save, TTS/voice. Each instance of one of these owns one unit of the
/// progress budget; everything else is bookkeeping the engine rushes through.
pub const IMPORTANT_NODE_TYPES: &[&str] = &[
    "KSampler",
    "KSamplerAdvanced",
    "SamplerCustom",
    "SamplerCustomAdvanced",
    "VAEDecode",
    "VAEDecodeTiled",
    "VAEEncode",
    "VAEEncodeForInpaint",
    "ImageUpscaleWithModel",
    "SaveImage",
    "SaveAnimatedWEBP",
    "VHS_VideoCombine",
    "SaveAudio",
    "TTSGenerate",
    "VoiceCloneGenerate",
];

/// The fixed step budget for one run.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    /// Countable pre-generation tasks.
    pub pre_countable: u32,
    /// Countable post-generation tasks.
    pub post_countable: u32,
    /// Graph node ids that count one step each.
    pub important_nodes: HashSet<String>,
    /// Display labels (class types) per node id.
    pub node_labels: HashMap<String, String>,
}

impl ExecutionPlan {
    /// Compute the plan for a definition and its resolved template.
    pub fn compute(definition: &WorkflowDefinition, template: &Value) -> Self {
        let (important_nodes, node_labels) = important_graph_nodes(template);
        Self {
            pre_countable: count_countable(&definition.pre_tasks),
            post_countable: count_countable(&definition.post_tasks),
            important_nodes,
            node_labels,
        }
    }

    /// The full step budget.
    pub fn total_steps(&self) -> u32 {
        self.pre_countable + self.important_nodes.len() as u32 + self.post_countable
    }

    /// The step count at the moment engine execution finishes.
    ///
    /// Used to resynchronize the counter after completion: the engine may
    /// have served important nodes from cache without emitting events for
    /// them, so the structural count is authoritative.
    pub fn engine_baseline(&self) -> u32 {
        self.pre_countable + self.important_nodes.len() as u32
    }

    /// Metadata handed to the progress channel at run creation.
    pub fn metadata(&self, workflow: &str) -> RunMetadata {
        RunMetadata {
            workflow: workflow.to_string(),
            total_steps: self.total_steps(),
            important_nodes: self.important_nodes.clone(),
            node_labels: self.node_labels.clone(),
        }
    }
}

/// Count tasks that consume a progress step: only process and prompt tasks.
fn count_countable(tasks: &[TaskSpec]) -> u32 {
    tasks.iter().filter(|t| t.countable()).count() as u32
}

/// Structural scan: node ids whose declared class type is in the allow-list.
fn important_graph_nodes(template: &Value) -> (HashSet<String>, HashMap<String, String>) {
    let mut nodes = HashSet::new();
    let mut labels = HashMap::new();
    let Some(graph) = template.as_object() else {
        return (nodes, labels);
    };
    for (id, node) in graph {
        let Some(class_type) = node.get("class_type").and_then(Value::as_str) else {
            continue;
        };
        labels.insert(id.clone(), class_type.to_string());
        if IMPORTANT_NODE_TYPES.contains(&class_type) {
            nodes.insert(id.clone());
        }
    }
    (nodes, labels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn definition(pre: Value, post: Value) -> WorkflowDefinition {
        serde_json::from_value(json!({
            "name": "w",
            "template_path": "w.json",
            "options": { "kind": "image" },
            "pre_tasks": pre,
            "post_tasks": post
        }))
        .unwrap()
    }

    #[test]
    fn test_total_counts_tasks_and_nodes() {
        let def = definition(
            json!([
                { "prompt": "describe", "to": "caption" },
                { "from": "a", "to": "b" },
                { "from": "steps", "to": "steps", "transforms": [{"scale": 2.0}] }
            ]),
            json!([
                { "process": "extract_text_outputs", "parameters": {"outputs": {}} }
            ]),
        );
        let template = json!({
            "1": { "class_type": "CheckpointLoader", "inputs": {} },
            "2": { "class_type": "KSampler", "inputs": {} },
            "3": { "class_type": "VAEDecode", "inputs": {} },
            "4": { "class_type": "SaveImage", "inputs": {} }
        });

        let plan = ExecutionPlan::compute(&def, &template);
        // One countable pre-task (the prompt), one countable post-task,
        // three important nodes; copy and math tasks are free.
        assert_eq!(plan.pre_countable, 1);
        assert_eq!(plan.post_countable, 1);
        assert_eq!(plan.important_nodes.len(), 3);
        assert_eq!(plan.total_steps(), 5);
        assert_eq!(plan.engine_baseline(), 4);
    }

    #[test]
    fn test_labels_cover_all_nodes() {
        let def = definition(json!([]), json!([]));
        let template = json!({
            "1": { "class_type": "CheckpointLoader", "inputs": {} },
            "2": { "class_type": "KSampler", "inputs": {} }
        });
        let plan = ExecutionPlan::compute(&def, &template);
        // Even unimportant nodes get labels for progress display.
        assert_eq!(plan.node_labels.get("1").unwrap(), "CheckpointLoader");
        assert!(!plan.important_nodes.contains("1"));
        assert!(plan.important_nodes.contains("2"));
    }

    #[test]
    fn test_empty_template() {
        let def = definition(json!([]), json!([]));
        let plan = ExecutionPlan::compute(&def, &json!({}));
        assert_eq!(plan.total_steps(), 0);
    }

    #[test]
    fn test_metadata_carries_budget() {
        let def = definition(json!([{ "prompt": "p", "to": "t" }]), json!([]));
        let template = json!({"2": { "class_type": "KSampler", "inputs": {} }});
        let plan = ExecutionPlan::compute(&def, &template);
        let meta = plan.metadata("w");
        assert_eq!(meta.total_steps, 2);
        assert!(meta.important_nodes.contains("2"));
    }
}
