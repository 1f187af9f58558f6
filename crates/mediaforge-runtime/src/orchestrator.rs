//! The generation orchestrator.
//!
//! One request becomes one run: validate and plan, execute pre-generation
//! tasks, bind data into the graph, drive the engine, execute
//! post-generation tasks, finalize into the catalog. The submitting HTTP
//! request returns as soon as the run record exists; the pipeline itself is
//! a detached task that reports through the progress channel.

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;

use std::future::Future;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};
use tracing::{debug, error, info};
use uuid::Uuid;

use mediaforge_catalog::{MediaCatalog, NewEntry};
use mediaforge_config::{
    EngineConfig, StorageConfig, WorkflowLibrary, validate_nesting, validate_process_names,
};
use mediaforge_engine::{EngineClient, EngineSessionState};
use mediaforge_llm::LlmClient;
use mediaforge_progress::ProgressChannel;
use mediaforge_protocols::generation::get_str;
use mediaforge_protocols::{
    EngineError, GenerationData, GenerationError, GenerationWarning, MediaKind, RunPhase,
    ValidationError, WorkflowDefinition,
};

use crate::binding::apply_bindings;
use crate::paths::materialize_output_paths;
use crate::plan::ExecutionPlan;
use crate::tasks::{TaskPhase, execute_task_list};

/// A request to run one workflow.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub workflow: String,
    pub fields: GenerationData,
    /// Suppresses catalog persistence; set for nested sub-runs.
    pub silent: bool,
}

/// Handle returned to the caller at acceptance.
#[derive(Debug, Clone)]
pub struct StartedRun {
    pub task_id: String,
}

/// Final state of a successful run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub data: GenerationData,
    pub uid: Option<u64>,
    pub time_taken_ms: u64,
    pub total_steps: u32,
    pub warnings: Vec<GenerationWarning>,
}

/// Everything resolved before the run record exists. Failing to build this
/// leaves no trace: no task id, no side effects.
struct PreparedRun {
    definition: WorkflowDefinition,
    template: Value,
    data: GenerationData,
    plan: ExecutionPlan,
    silent: bool,
}

pub struct Orchestrator {
    pub(crate) engine: Arc<EngineClient>,
    pub(crate) llm: Arc<LlmClient>,
    pub(crate) catalog: Arc<MediaCatalog>,
    pub(crate) progress: Arc<ProgressChannel>,
    pub(crate) library: Arc<WorkflowLibrary>,
    pub(crate) session: Arc<EngineSessionState>,
    pub(crate) storage: StorageConfig,
    poll_interval: Duration,
    poll_max_attempts: u32,
    client_id: String,
}

impl Orchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        engine: Arc<EngineClient>,
        llm: Arc<LlmClient>,
        catalog: Arc<MediaCatalog>,
        progress: Arc<ProgressChannel>,
        library: Arc<WorkflowLibrary>,
        session: Arc<EngineSessionState>,
        storage: StorageConfig,
        engine_config: &EngineConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            engine,
            llm,
            catalog,
            progress,
            library,
            session,
            storage,
            poll_interval: Duration::from_millis(engine_config.poll_interval_ms),
            poll_max_attempts: engine_config.poll_max_attempts,
            client_id: Uuid::new_v4().to_string(),
        })
    }

    /// The idempotency/client token used for engine submissions and the
    /// push channel.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Accept a request: validate, plan, create the run record, detach the
    /// pipeline. Validation failures surface here, before any task id
    /// exists.
    pub async fn start(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> Result<StartedRun, GenerationError> {
        let prepared = self.prepare(request)?;
        let task_id = Uuid::new_v4().to_string();
        self.progress
            .create_run(&task_id, prepared.plan.metadata(&prepared.definition.name));
        info!(
            %task_id,
            workflow = %prepared.definition.name,
            total_steps = prepared.plan.total_steps(),
            "generation run accepted"
        );

        let orchestrator = Arc::clone(self);
        let pipeline_task_id = task_id.clone();
        tokio::spawn(async move {
            orchestrator.run_pipeline(pipeline_task_id, prepared).await;
        });
        Ok(StartedRun { task_id })
    }

    /// Run a nested sub-workflow through the same pipeline, silently.
    ///
    /// Boxed because nesting re-enters the orchestrator recursively; the
    /// nesting validator bounded the depth before the parent run started.
    pub(crate) fn run_nested(
        self: &Arc<Self>,
        request: GenerationRequest,
    ) -> Pin<Box<dyn Future<Output = Result<RunOutcome, GenerationError>> + Send + 'static>> {
        let orchestrator = Arc::clone(self);
        Box::pin(async move {
            let prepared = orchestrator.prepare(request)?;
            // Synthetic id, never exposed to the original caller.
            let task_id = format!("nested-{}", Uuid::new_v4());
            orchestrator
                .progress
                .create_run(&task_id, prepared.plan.metadata(&prepared.definition.name));
            let result = orchestrator.execute_run(&task_id, prepared).await;
            match &result {
                Ok(outcome) => {
                    orchestrator.progress.emit_completion(
                        &task_id,
                        json!({ "silent": true }),
                        outcome.warnings.clone(),
                    );
                }
                Err(e) => {
                    orchestrator
                        .progress
                        .emit_error(&task_id, &e.to_string(), None);
                }
            }
            result
        })
    }

    /// Load definitions fresh, validate, and compute the plan.
    fn prepare(&self, request: GenerationRequest) -> Result<PreparedRun, GenerationError> {
        let definitions = self
            .library
            .load()
            .map_err(|e| GenerationError::Config(e.to_string()))?;
        let definition = definitions
            .iter()
            .find(|d| d.name == request.workflow)
            .cloned()
            .ok_or_else(|| ValidationError::UnknownWorkflow(request.workflow.clone()))?;
        validate_process_names(&definition)?;
        validate_nesting(&definition, &definitions)?;
        let template = self
            .library
            .load_template(&definition)
            .map_err(|e| GenerationError::Config(e.to_string()))?;

        let mut data = request.fields;
        for extra in &definition.options.extra_inputs {
            if !data.contains_key(&extra.name) {
                if let Some(default) = &extra.default {
                    data.insert(extra.name.clone(), default.clone());
                }
            }
        }
        if !data.contains_key("seed") {
            data.insert(
                "seed".to_string(),
                Value::from(rand::random::<u32>() as u64),
            );
        }

        let plan = ExecutionPlan::compute(&definition, &template);
        Ok(PreparedRun {
            definition,
            template,
            data,
            plan,
            silent: request.silent,
        })
    }

    async fn run_pipeline(self: Arc<Self>, task_id: String, prepared: PreparedRun) {
        match self.execute_run(&task_id, prepared).await {
            Ok(outcome) => {
                info!(
                    %task_id,
                    uid = ?outcome.uid,
                    time_taken_ms = outcome.time_taken_ms,
                    warnings = outcome.warnings.len(),
                    "generation run completed"
                );
                let result = json!({
                    "task_id": task_id,
                    "uid": outcome.uid,
                    "total_steps": outcome.total_steps,
                    "time_taken_ms": outcome.time_taken_ms,
                    "data": outcome.data,
                });
                self.progress
                    .emit_completion(&task_id, result, outcome.warnings);
            }
            Err(e) => {
                error!(%task_id, error = %e, "generation run failed");
                self.progress.emit_error(&task_id, &e.to_string(), None);
            }
        }
    }

    /// The phase machine. Strictly sequential; any error short-circuits to
    /// the failed terminal state in the caller.
    async fn execute_run(
        self: &Arc<Self>,
        task_id: &str,
        mut prepared: PreparedRun,
    ) -> Result<RunOutcome, GenerationError> {
        let started = Instant::now();
        let mut warnings = Vec::new();
        let kind = prepared.definition.options.kind;
        let total_steps = prepared.plan.total_steps();

        self.progress.set_phase(task_id, RunPhase::PreTasks);
        execute_task_list(
            self,
            task_id,
            TaskPhase::Pre,
            &prepared.definition.pre_tasks,
            &mut prepared.data,
            &mut warnings,
        )
        .await?;

        // After pre-tasks (which may have resolved format fields), before
        // submission (the bound graph carries the save path).
        materialize_output_paths(&mut prepared.data, kind, &self.storage.media_dir)?;

        self.progress.set_phase(task_id, RunPhase::EngineSubmission);
        apply_bindings(
            &mut prepared.template,
            &prepared.definition.field_bindings,
            &prepared.data,
        );
        if self.session.note_workflow(&prepared.definition.name).await {
            debug!(workflow = %prepared.definition.name, "workflow switch, freeing engine memory");
            self.engine.free_memory().await;
        }
        let job = self
            .engine
            .submit(&prepared.template, &self.client_id)
            .await?;
        self.progress.link_engine_job(task_id, &job.job_id);
        self.progress.set_phase(task_id, RunPhase::EngineExecuting);

        let status = self
            .engine
            .await_completion(&job.job_id, self.poll_max_attempts, self.poll_interval)
            .await?;
        if status.errored {
            return Err(EngineError::Execution(
                status
                    .error
                    .unwrap_or_else(|| "unknown engine error".to_string()),
            )
            .into());
        }
        // Resynchronize the counter: the engine may have served important
        // nodes from cache without emitting progress for them.
        self.progress
            .set_step(task_id, prepared.plan.engine_baseline());

        self.progress.set_phase(task_id, RunPhase::PostTasks);
        execute_task_list(
            self,
            task_id,
            TaskPhase::Post,
            &prepared.definition.post_tasks,
            &mut prepared.data,
            &mut warnings,
        )
        .await?;

        self.progress.set_phase(task_id, RunPhase::Finalizing);
        self.verify_outputs(&prepared.data, kind)?;
        attach_media_urls(&mut prepared.data, kind);

        let time_taken_ms = started.elapsed().as_millis() as u64;
        let uid = if prepared.silent {
            None
        } else {
            let entry = self
                .catalog
                .add_entry(NewEntry {
                    workflow: prepared.definition.name.clone(),
                    folder: get_str(&prepared.data, "folder").map(str::to_string),
                    time_taken_ms,
                    fields: prepared.data.clone(),
                })
                .await?;
            Some(entry.uid)
        };

        Ok(RunOutcome {
            data: prepared.data,
            uid,
            time_taken_ms,
            total_steps,
            warnings,
        })
    }

    /// A "successful" engine run with no file on disk is a failure: the
    /// save-to-disk step may be a late pipeline stage that silently did not
    /// run.
    fn verify_outputs(&self, data: &GenerationData, kind: MediaKind) -> Result<(), GenerationError> {
        let field = if kind.is_audio() {
            "save_audio_path"
        } else {
            "save_image_path"
        };
        let path = get_str(data, field).ok_or_else(|| {
            GenerationError::Internal(format!("{field} unset at finalization"))
        })?;
        if !Path::new(path).exists() {
            return Err(GenerationError::OutputMissing(path.into()));
        }
        Ok(())
    }

    /// Track LLM model usage for the session state.
    pub(crate) async fn note_llm_model(&self) {
        if self.session.note_llm_model(self.llm.model()).await {
            debug!(model = %self.llm.model(), "llm model in use changed");
        }
    }
}

/// Derive public media URLs from the save paths.
fn attach_media_urls(data: &mut GenerationData, kind: MediaKind) {
    let (path_field, url_field) = if kind.is_audio() {
        ("save_audio_path", "audio_url")
    } else {
        ("save_image_path", "image_url")
    };
    let Some(name) = get_str(data, path_field)
        .and_then(|p| Path::new(p).file_name())
        .and_then(|n| n.to_str())
        .map(str::to_string)
    else {
        return;
    };
    data.insert(url_field.to_string(), Value::String(format!("/media/{name}")));
}
