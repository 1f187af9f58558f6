//! Run records.

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use mediaforge_protocols::{ProgressEvent, RunPhase};

/// Replay buffer bound per run; overflow drops the oldest frame.
pub(crate) const BUFFER_CAPACITY: usize = 256;

/// Subscriber channel depth.
pub(crate) const SUBSCRIBER_CAPACITY: usize = 256;

/// Everything the channel needs to know about a run up front.
#[derive(Debug, Clone)]
pub struct RunMetadata {
    /// Workflow name, for labels and status queries.
    pub workflow: String,
    /// Fixed step budget computed from the execution plan.
    pub total_steps: u32,
    /// Graph node ids whose execution counts one step.
    pub important_nodes: HashSet<String>,
    /// Display labels per node id; unknown ids show a generic label.
    pub node_labels: HashMap<String, String>,
}

/// Public snapshot of a run's state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunStatus {
    pub task_id: String,
    pub workflow: String,
    pub phase: RunPhase,
    pub current_step: u32,
    pub total_steps: u32,
    pub percentage: f32,
    pub started_at: DateTime<Utc>,
}

/// Internal per-run state.
pub(crate) struct RunRecord {
    pub task_id: String,
    pub workflow: String,
    pub phase: RunPhase,
    pub current_step: u32,
    pub total_steps: u32,
    pub percentage: f32,
    pub label: String,
    pub started_at: DateTime<Utc>,
    pub job_id: Option<String>,
    pub important_nodes: HashSet<String>,
    pub node_labels: HashMap<String, String>,
    /// Nodes already counted, so duplicate engine events cannot
    /// double-increment the step counter.
    pub processed_nodes: HashSet<String>,
    pub subscribers: Vec<mpsc::Sender<ProgressEvent>>,
    pub buffer: VecDeque<ProgressEvent>,
}

impl RunRecord {
    pub fn new(task_id: String, meta: RunMetadata) -> Self {
        Self {
            task_id,
            workflow: meta.workflow,
            phase: RunPhase::Created,
            current_step: 0,
            total_steps: meta.total_steps,
            percentage: 0.0,
            label: String::new(),
            started_at: Utc::now(),
            job_id: None,
            important_nodes: meta.important_nodes,
            node_labels: meta.node_labels,
            processed_nodes: HashSet::new(),
            subscribers: Vec::new(),
            buffer: VecDeque::new(),
        }
    }

    pub fn status(&self) -> RunStatus {
        RunStatus {
            task_id: self.task_id.clone(),
            workflow: self.workflow.clone(),
            phase: self.phase,
            current_step: self.current_step,
            total_steps: self.total_steps,
            percentage: self.percentage,
            started_at: self.started_at,
        }
    }
}
