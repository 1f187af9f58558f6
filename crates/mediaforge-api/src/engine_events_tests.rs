use std::collections::HashMap;

use mediaforge_progress::RunMetadata;

use super::*;

fn channel_with_run(important: &[&str]) -> Arc<ProgressChannel> {
    let channel = ProgressChannel::new();
    channel.create_run(
        "t1",
        RunMetadata {
            workflow: "w".to_string(),
            total_steps: important.len() as u32,
            important_nodes: important.iter().map(|s| s.to_string()).collect(),
            node_labels: HashMap::new(),
        },
    );
    channel.link_engine_job("t1", "j1");
    channel
}

#[tokio::test]
async fn test_executing_event_counts_important_node() {
    let channel = channel_with_run(&["4"]);
    handle_engine_event(
        &channel,
        EngineEvent::Executing {
            job_id: "j1".to_string(),
            node: Some("4".to_string()),
        },
    );
    assert_eq!(channel.get_run("t1").unwrap().current_step, 1);
}

#[tokio::test]
async fn test_done_marker_is_ignored() {
    let channel = channel_with_run(&["4"]);
    handle_engine_event(
        &channel,
        EngineEvent::Executing {
            job_id: "j1".to_string(),
            node: None,
        },
    );
    assert_eq!(channel.get_run("t1").unwrap().current_step, 0);
}

#[tokio::test]
async fn test_cached_nodes_are_counted() {
    let channel = channel_with_run(&["2", "4"]);
    handle_engine_event(
        &channel,
        EngineEvent::Cached {
            job_id: "j1".to_string(),
            nodes: vec!["2".to_string(), "4".to_string(), "99".to_string()],
        },
    );
    // Both important nodes counted; the unimportant one only relabels.
    assert_eq!(channel.get_run("t1").unwrap().current_step, 2);
}

#[tokio::test]
async fn test_execution_error_does_not_touch_the_run() {
    let channel = channel_with_run(&["4"]);
    handle_engine_event(
        &channel,
        EngineEvent::ExecutionError {
            job_id: "j1".to_string(),
            message: "OOM".to_string(),
        },
    );
    // Failure authority is the completion poll, not the push channel.
    let status = channel.get_run("t1").unwrap();
    assert_eq!(status.current_step, 0);
    assert!(!status.phase.is_terminal());
}
