//! Process-wide engine session state.

use tokio::sync::Mutex;

/// Tracks what the engine currently has loaded so the orchestrator can skip
/// redundant memory-free calls.
///
/// Single-writer discipline: only the orchestrator mutates this, immediately
/// before a submission.
#[derive(Debug, Default)]
pub struct EngineSessionState {
    last_workflow: Mutex<Option<String>>,
    last_llm_model: Mutex<Option<String>>,
}

impl EngineSessionState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the workflow about to run. Returns true when it differs from
    /// the previous one, i.e. the engine's memory should be freed first.
    pub async fn note_workflow(&self, name: &str) -> bool {
        let mut last = self.last_workflow.lock().await;
        let changed = last.as_deref() != Some(name);
        *last = Some(name.to_string());
        changed
    }

    /// Record the LLM model about to be used. Returns true on change.
    pub async fn note_llm_model(&self, model: &str) -> bool {
        let mut last = self.last_llm_model.lock().await;
        let changed = last.as_deref() != Some(model);
        *last = Some(model.to_string());
        changed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_workflow_change_detection() {
        let state = EngineSessionState::new();
        // First use always counts as a change.
        assert!(state.note_workflow("txt2img").await);
        // Same workflow again: no change, no free needed.
        assert!(!state.note_workflow("txt2img").await);
        // Switching workflows is a change.
        assert!(state.note_workflow("tts").await);
        assert!(!state.note_workflow("tts").await);
    }

    #[tokio::test]
    async fn test_llm_model_tracking_is_independent() {
        let state = EngineSessionState::new();
        assert!(state.note_workflow("txt2img").await);
        assert!(state.note_llm_model("llama3").await);
        assert!(!state.note_llm_model("llama3").await);
        // Workflow switches do not reset the model tracking.
        assert!(state.note_workflow("other").await);
        assert!(!state.note_llm_model("llama3").await);
    }
}
