use std::path::PathBuf;
use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use mediaforge_progress::ProgressChannel;
use mediaforge_protocols::ProgressEvent;

use super::*;

struct Harness {
    dir: TempDir,
    #[allow(dead_code)]
    engine: MockServer,
    llm: MockServer,
    orchestrator: Arc<Orchestrator>,
    catalog: Arc<MediaCatalog>,
    progress: Arc<ProgressChannel>,
}

impl Harness {
    fn media_dir(&self) -> PathBuf {
        self.dir.path().join("media")
    }

    fn engine_output_dir(&self) -> PathBuf {
        self.dir.path().join("engine-out")
    }
}

fn completed_history() -> serde_json::Value {
    json!({
        "job-1": {
            "status": { "completed": true, "status_str": "success" },
            "outputs": {}
        }
    })
}

fn errored_history() -> serde_json::Value {
    json!({
        "job-1": {
            "status": {
                "completed": false,
                "status_str": "error",
                "messages": ["sampler exploded"]
            }
        }
    })
}

async fn harness(
    workflows: serde_json::Value,
    templates: &[(&str, serde_json::Value)],
    history: serde_json::Value,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let graphs = dir.path().join("graphs");
    std::fs::create_dir_all(&graphs).unwrap();
    std::fs::create_dir_all(dir.path().join("media")).unwrap();
    std::fs::create_dir_all(dir.path().join("engine-out")).unwrap();
    std::fs::write(
        dir.path().join("workflows.json"),
        serde_json::to_vec(&workflows).unwrap(),
    )
    .unwrap();
    for (name, template) in templates {
        std::fs::write(graphs.join(name), serde_json::to_vec(template).unwrap()).unwrap();
    }

    let engine = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/prompt"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"prompt_id": "job-1"})))
        .mount(&engine)
        .await;
    Mock::given(method("GET"))
        .and(path("/history/job-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(history))
        .mount(&engine)
        .await;
    Mock::given(method("POST"))
        .and(path("/free"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&engine)
        .await;

    let llm = MockServer::start().await;

    let catalog = Arc::new(
        MediaCatalog::open(dir.path().join("catalog.json"))
            .await
            .unwrap(),
    );
    let progress = ProgressChannel::new();
    let orchestrator = Orchestrator::new(
        Arc::new(EngineClient::new(engine.uri())),
        Arc::new(LlmClient::new(llm.uri(), None, "llama3", None)),
        catalog.clone(),
        progress.clone(),
        Arc::new(WorkflowLibrary::new(dir.path().join("workflows.json"), graphs)),
        Arc::new(EngineSessionState::new()),
        StorageConfig {
            media_dir: dir.path().join("media"),
            upload_dir: dir.path().join("uploads"),
            engine_output_dir: dir.path().join("engine-out"),
        },
        &EngineConfig {
            base_url: engine.uri(),
            poll_interval_ms: 10,
            poll_max_attempts: 50,
        },
    );

    Harness {
        dir,
        engine,
        llm,
        orchestrator,
        catalog,
        progress,
    }
}

async fn mount_llm_failure(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/chat/completions"))
        .respond_with(ResponseTemplate::new(500).set_body_string("model crashed"))
        .mount(server)
        .await;
}

async fn await_terminal(progress: &Arc<ProgressChannel>, task_id: &str) -> ProgressEvent {
    let mut rx = progress.subscribe(task_id).expect("run record exists");
    tokio::time::timeout(Duration::from_secs(10), async move {
        loop {
            let event = rx.recv().await.expect("stream open until terminal");
            if event.is_terminal() {
                return event;
            }
        }
    })
    .await
    .expect("terminal event within timeout")
}

fn fields(value: serde_json::Value) -> GenerationData {
    value.as_object().unwrap().clone()
}

fn simple_template() -> serde_json::Value {
    json!({
        "1": { "class_type": "CheckpointLoader", "inputs": {} },
        "2": { "class_type": "KSampler", "inputs": { "prompt": "", "seed": 0 } },
        "3": { "class_type": "SaveImage", "inputs": { "filename_prefix": "out" } }
    })
}

/// A workflow whose post-task extracts the real output via a pointer file,
/// the way the engine actually hands results back.
fn extracting_workflow(extra_post_tasks: serde_json::Value) -> serde_json::Value {
    let mut post_tasks = vec![json!({
        "process": "extract_media_from_text_pointer",
        "parameters": { "pointer": "pointer.txt" }
    })];
    if let Some(extra) = extra_post_tasks.as_array() {
        post_tasks.extend(extra.iter().cloned());
    }
    json!([{
        "name": "txt2img",
        "template_path": "txt2img.json",
        "options": {
            "kind": "image",
            "extra_inputs": [{ "name": "image_format", "default": "png" }]
        },
        "field_bindings": [
            { "source": "prompt", "target_path": ["2", "inputs", "prompt"] },
            { "source": "seed", "target_path": ["2", "inputs", "seed"] }
        ],
        "post_tasks": post_tasks
    }])
}

fn seed_engine_output(harness: &Harness) {
    std::fs::write(
        harness.engine_output_dir().join("pointer.txt"),
        "result.tmp\n",
    )
    .unwrap();
    std::fs::write(harness.engine_output_dir().join("result.png"), b"png-bytes").unwrap();
}

#[tokio::test]
async fn test_happy_path_persists_and_reports() {
    let h = harness(
        extracting_workflow(json!([])),
        &[("txt2img.json", simple_template())],
        completed_history(),
    )
    .await;
    seed_engine_output(&h);

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "txt2img".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Completed { result, warnings } = event else {
        panic!("expected completion, got {event:?}");
    };
    assert!(warnings.is_empty());
    assert!(result["uid"].is_u64());
    assert_eq!(result["data"]["image_url"], "/media/image_1.png");

    // The extracted file landed at the materialized save path.
    let saved = h.media_dir().join("image_1.png");
    assert_eq!(std::fs::read(saved).unwrap(), b"png-bytes");

    // Exactly one catalog entry, carrying the generation data.
    assert_eq!(h.catalog.len().await, 1);
    let uid = result["uid"].as_u64().unwrap();
    let entry = h.catalog.find_by_uid(uid).await.unwrap();
    assert_eq!(entry.workflow, "txt2img");
    assert_eq!(entry.fields.get("prompt").unwrap(), "a cat");
}

#[tokio::test]
async fn test_pre_generation_prompt_failure_is_fatal() {
    let workflows = {
        let mut w = extracting_workflow(json!([]));
        w[0]["pre_tasks"] = json!([{ "prompt": "expand this", "to": "prompt" }]);
        w
    };
    let h = harness(
        workflows,
        &[("txt2img.json", simple_template())],
        completed_history(),
    )
    .await;
    seed_engine_output(&h);
    mount_llm_failure(&h.llm).await;

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "txt2img".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Error { message, .. } = event else {
        panic!("expected error, got {event:?}");
    };
    assert!(message.contains("Pre-generation"));
    // No partial catalog entry.
    assert_eq!(h.catalog.len().await, 0);
}

#[tokio::test]
async fn test_post_generation_prompt_failure_is_tolerated() {
    let workflows = extracting_workflow(json!([
        { "prompt": "tag the result", "to": "tags" }
    ]));
    let h = harness(
        workflows,
        &[("txt2img.json", simple_template())],
        completed_history(),
    )
    .await;
    seed_engine_output(&h);
    mount_llm_failure(&h.llm).await;

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "txt2img".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Completed { result, warnings } = event else {
        panic!("expected completion, got {event:?}");
    };
    // The run succeeded with a degraded enrichment field.
    assert_eq!(warnings.len(), 1);
    assert_eq!(warnings[0].field, "tags");
    let tags = result["data"]["tags"].as_str().unwrap();
    assert!(!tags.is_empty());
    assert_eq!(tags, "unavailable");
    assert_eq!(h.catalog.len().await, 1);
}

#[tokio::test]
async fn test_engine_execution_error_fails_the_run() {
    let h = harness(
        extracting_workflow(json!([])),
        &[("txt2img.json", simple_template())],
        errored_history(),
    )
    .await;
    seed_engine_output(&h);

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "txt2img".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Error { message, .. } = event else {
        panic!("expected error, got {event:?}");
    };
    assert!(message.contains("sampler exploded"));
    assert_eq!(h.catalog.len().await, 0);
}

#[tokio::test]
async fn test_missing_output_file_fails_despite_engine_success() {
    // No extraction post-task and nothing writes the save path: the engine
    // "succeeded" but there is no file, which must fail the run.
    let workflows = json!([{
        "name": "txt2img",
        "template_path": "txt2img.json",
        "options": {
            "kind": "image",
            "extra_inputs": [{ "name": "image_format", "default": "png" }]
        }
    }]);
    let h = harness(
        workflows,
        &[("txt2img.json", simple_template())],
        completed_history(),
    )
    .await;

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "txt2img".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Error { message, .. } = event else {
        panic!("expected error, got {event:?}");
    };
    assert!(message.contains("missing"));
    assert_eq!(h.catalog.len().await, 0);
}

#[tokio::test]
async fn test_unknown_workflow_rejected_without_a_run() {
    let h = harness(json!([]), &[], completed_history()).await;

    let result = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "ghost".to_string(),
            fields: fields(json!({})),
            silent: false,
        })
        .await;

    assert!(matches!(
        result,
        Err(GenerationError::Validation(ValidationError::UnknownWorkflow(_)))
    ));
    // No task id was created.
    assert_eq!(h.progress.run_count(), 0);
}

#[tokio::test]
async fn test_illegal_nesting_rejected_before_any_side_effect() {
    let workflows = json!([
        {
            "name": "a",
            "template_path": "t.json",
            "options": { "kind": "image" },
            "post_tasks": [{ "process": "execute_workflow", "parameters": { "workflow": "b" } }]
        },
        {
            "name": "b",
            "template_path": "t.json",
            "options": { "kind": "image" },
            "post_tasks": [{ "process": "execute_workflow", "parameters": { "workflow": "c" } }]
        },
        { "name": "c", "template_path": "t.json", "options": { "kind": "image" } }
    ]);
    let h = harness(workflows, &[("t.json", simple_template())], completed_history()).await;

    let result = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "a".to_string(),
            fields: fields(json!({})),
            silent: false,
        })
        .await;

    assert!(matches!(
        result,
        Err(GenerationError::Validation(ValidationError::NestingTooDeep(_)))
    ));
    assert_eq!(h.progress.run_count(), 0);
}

#[tokio::test]
async fn test_nested_workflow_runs_silently_and_propagates_outputs() {
    let workflows = json!([
        {
            "name": "parent",
            "template_path": "t.json",
            "options": {
                "kind": "image",
                "extra_inputs": [{ "name": "image_format", "default": "png" }]
            },
            "post_tasks": [{
                "process": "execute_workflow",
                "parameters": {
                    "workflow": "child",
                    "input_mapping": [
                        { "from": "image_format", "to": "image_format" }
                    ]
                }
            }]
        },
        {
            "name": "child",
            "template_path": "t.json",
            "options": { "kind": "image" },
            "post_tasks": [{
                "process": "extract_media_from_text_pointer",
                "parameters": { "pointer": "pointer.txt" }
            }]
        }
    ]);
    let h = harness(workflows, &[("t.json", simple_template())], completed_history()).await;
    seed_engine_output(&h);

    let run = h
        .orchestrator
        .start(GenerationRequest {
            workflow: "parent".to_string(),
            fields: fields(json!({"prompt": "a cat"})),
            silent: false,
        })
        .await
        .unwrap();

    let event = await_terminal(&h.progress, &run.task_id).await;
    let ProgressEvent::Completed { result, .. } = event else {
        panic!("expected completion, got {event:?}");
    };

    // The child's save path propagated up and the file exists.
    let save_path = result["data"]["save_image_path"].as_str().unwrap();
    assert!(std::path::Path::new(save_path).exists());
    assert!(result["data"]["image_url"].as_str().unwrap().starts_with("/media/"));

    // Only the parent persisted; the nested run was silent.
    assert_eq!(h.catalog.len().await, 1);
    let entries = h
        .catalog
        .list_filtered(&mediaforge_catalog::CatalogFilter::default())
        .await;
    assert_eq!(entries[0].workflow, "parent");
}
