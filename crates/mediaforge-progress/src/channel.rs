//! The progress channel implementation.

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use mediaforge_protocols::{
    GenerationWarning, ProgressEvent, ProgressSnapshot, RunPhase,
};

use crate::record::{BUFFER_CAPACITY, RunMetadata, RunRecord, RunStatus, SUBSCRIBER_CAPACITY};

/// Generic label for engine nodes with no known display name.
const GENERIC_LABEL: &str = "Processing…";

/// How long a terminal run record stays resident so slow subscribers can
/// still receive the final frame.
const EVICTION_GRACE: Duration = Duration::from_secs(60);

/// The per-run progress registry and event fan-out.
pub struct ProgressChannel {
    runs: DashMap<String, RunRecord>,
    /// Engine job id to task id.
    jobs: DashMap<String, String>,
    eviction_grace: Duration,
}

impl ProgressChannel {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            runs: DashMap::new(),
            jobs: DashMap::new(),
            eviction_grace: EVICTION_GRACE,
        })
    }

    /// A channel with a custom eviction grace, for tests.
    pub fn with_eviction_grace(grace: Duration) -> Arc<Self> {
        Arc::new(Self {
            runs: DashMap::new(),
            jobs: DashMap::new(),
            eviction_grace: grace,
        })
    }

    /// Register a new run.
    pub fn create_run(&self, task_id: &str, meta: RunMetadata) {
        debug!(%task_id, workflow = %meta.workflow, total_steps = meta.total_steps, "run created");
        self.runs
            .insert(task_id.to_string(), RunRecord::new(task_id.to_string(), meta));
    }

    /// Snapshot a run's state.
    pub fn get_run(&self, task_id: &str) -> Option<RunStatus> {
        self.runs.get(task_id).map(|r| r.status())
    }

    /// Update a run's phase.
    pub fn set_phase(&self, task_id: &str, phase: RunPhase) {
        if let Some(mut record) = self.runs.get_mut(task_id) {
            record.phase = phase;
        }
    }

    /// Remove a run record and its job-id index entry.
    pub fn delete_run(&self, task_id: &str) {
        if let Some((_, record)) = self.runs.remove(task_id) {
            if let Some(job_id) = record.job_id {
                self.jobs.remove(&job_id);
            }
        }
    }

    /// Number of live run records.
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Create the engine-job reverse lookup for a run.
    ///
    /// Engine-originated events arrive keyed by job id while orchestrator
    /// events are keyed by task id; both resolve to the same record.
    pub fn link_engine_job(&self, task_id: &str, job_id: &str) {
        if let Some(mut record) = self.runs.get_mut(task_id) {
            record.job_id = Some(job_id.to_string());
            self.jobs.insert(job_id.to_string(), task_id.to_string());
        }
    }

    /// Resolve a task id or engine job id to the owning task id.
    fn resolve(&self, key: &str) -> Option<String> {
        if self.runs.contains_key(key) {
            return Some(key.to_string());
        }
        self.jobs.get(key).map(|t| t.value().clone())
    }

    /// Attach a subscriber. Buffered events are replayed in order before any
    /// live event is delivered. Returns `None` for an unknown run.
    pub fn subscribe(&self, task_id: &str) -> Option<mpsc::Receiver<ProgressEvent>> {
        let mut record = self.runs.get_mut(task_id)?;
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CAPACITY);
        for event in record.buffer.drain(..) {
            // Capacity covers the whole buffer; nothing has consumed yet.
            let _ = tx.try_send(event);
        }
        record.subscribers.push(tx);
        debug!(%task_id, "subscriber attached");
        Some(rx)
    }

    /// Begin a countable step: advance the counter and emit a start frame.
    pub fn begin_step(&self, key: &str, label: &str) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            if record.current_step < record.total_steps {
                record.current_step += 1;
            }
            record.label = label.to_string();
            record.percentage = step_fraction(record.current_step, record.total_steps, 0.0);
            let event = in_progress(&record, 0, 0, None);
            deliver(&mut record, event);
        }
    }

    /// Finish the step begun by [`begin_step`](Self::begin_step).
    pub fn complete_step(&self, key: &str) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            record.percentage = step_fraction(record.current_step, record.total_steps, 1.0);
            let event = in_progress(&record, 0, 0, None);
            deliver(&mut record, event);
        }
    }

    /// Advance the counter for a skipped countable task.
    ///
    /// The total must stay meaningful when conditional branches are skipped,
    /// so skipping still consumes exactly one step.
    pub fn skip_step(&self, key: &str, label: &str) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            if record.current_step < record.total_steps {
                record.current_step += 1;
            }
            record.label = format!("Skipped: {label}");
            record.percentage = step_fraction(record.current_step, record.total_steps, 1.0);
            let event = in_progress(&record, 0, 0, None);
            deliver(&mut record, event);
        }
    }

    /// Force the counter to a known value (post-engine resynchronization).
    /// The counter never moves backwards.
    pub fn set_step(&self, key: &str, step: u32) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            let clamped = step.min(record.total_steps).max(record.current_step);
            record.current_step = clamped;
            record.percentage = step_fraction(clamped, record.total_steps, 1.0);
            let event = in_progress(&record, 0, 0, None);
            deliver(&mut record, event);
        }
    }

    /// Handle an engine node-level event.
    ///
    /// An important node increments the counter exactly once (the processed
    /// set absorbs duplicate/retried events); its intra-node percentage is
    /// interpolated within that one step's share of the budget. Other nodes
    /// update only the display label.
    pub fn engine_node_event(&self, job_id: &str, node_id: &str, value: u32, max: u32) {
        let Some(task_id) = self.resolve(job_id) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            let important = record.important_nodes.contains(node_id);
            if important && !record.processed_nodes.contains(node_id) {
                record.processed_nodes.insert(node_id.to_string());
                if record.current_step < record.total_steps {
                    record.current_step += 1;
                }
            }
            let label = record
                .node_labels
                .get(node_id)
                .cloned()
                .unwrap_or_else(|| GENERIC_LABEL.to_string());
            record.label = label;
            if important {
                let node_fraction = if max > 0 {
                    value as f32 / max as f32
                } else {
                    0.0
                };
                record.percentage =
                    step_fraction(record.current_step, record.total_steps, node_fraction);
            }
            let node = Some(node_id.to_string());
            let event = in_progress(&record, value, max, node);
            deliver(&mut record, event);
        }
    }

    /// Emit the terminal success frame and schedule eviction.
    pub fn emit_completion(
        self: &Arc<Self>,
        key: &str,
        result: Value,
        warnings: Vec<GenerationWarning>,
    ) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            record.phase = RunPhase::Completed;
            record.percentage = 100.0;
            let event = ProgressEvent::Completed { result, warnings };
            deliver(&mut record, event);
        }
        self.schedule_eviction(task_id);
    }

    /// Emit the terminal error frame and schedule eviction.
    pub fn emit_error(self: &Arc<Self>, key: &str, message: &str, details: Option<Value>) {
        let Some(task_id) = self.resolve(key) else {
            return;
        };
        if let Some(mut record) = self.runs.get_mut(&task_id) {
            record.phase = RunPhase::Failed;
            let event = ProgressEvent::Error {
                message: message.to_string(),
                details,
            };
            deliver(&mut record, event);
        }
        self.schedule_eviction(task_id);
    }

    fn schedule_eviction(self: &Arc<Self>, task_id: String) {
        let channel = Arc::clone(self);
        let grace = self.eviction_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            debug!(task_id = %task_id, "run evicted");
            channel.delete_run(&task_id);
        });
    }
}

/// Fractional progress: completed steps plus the in-flight step's own
/// fraction, each important unit owning `1/total` of the budget.
fn step_fraction(current_step: u32, total_steps: u32, unit_fraction: f32) -> f32 {
    if total_steps == 0 {
        return 0.0;
    }
    let completed = current_step.saturating_sub(1) as f32;
    let fraction = (completed + unit_fraction.clamp(0.0, 1.0)) / total_steps as f32;
    (fraction * 100.0).clamp(0.0, 100.0)
}

fn in_progress(record: &RunRecord, value: u32, max: u32, node: Option<String>) -> ProgressEvent {
    ProgressEvent::InProgress {
        progress: ProgressSnapshot {
            percentage: record.percentage,
            current_step: record.current_step,
            total_steps: record.total_steps,
            current_value: value,
            max_value: max,
            label: record.label.clone(),
            node,
        },
    }
}

/// Send an event to every live subscriber; with none attached, buffer it for
/// replay. Subscribers that are gone or hopelessly backed up are dropped.
fn deliver(record: &mut RunRecord, event: ProgressEvent) {
    if record.subscribers.is_empty() {
        if record.buffer.len() == BUFFER_CAPACITY {
            record.buffer.pop_front();
        }
        record.buffer.push_back(event);
        return;
    }
    record
        .subscribers
        .retain(|subscriber| subscriber.try_send(event.clone()).is_ok());
}
