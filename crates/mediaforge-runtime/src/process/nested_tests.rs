use serde_json::json;

use super::*;

fn data(value: Value) -> GenerationData {
    value.as_object().unwrap().clone()
}

#[test]
fn test_child_seed_differs_from_parent() {
    let parent = data(json!({"seed": 1234, "prompt": "a cat"}));
    // Even when the fresh seed collides with the parent's, the child must
    // not inherit it.
    let child = build_child_fields(&parent, &[], 1234);
    let child_seed = child.get("seed").unwrap().as_u64().unwrap();
    assert_ne!(child_seed, 1234);

    let child = build_child_fields(&parent, &[], 777);
    assert_eq!(child.get("seed").unwrap().as_u64().unwrap(), 777);
}

#[test]
fn test_child_without_parent_seed() {
    let parent = data(json!({}));
    let child = build_child_fields(&parent, &[], 42);
    assert_eq!(child.get("seed").unwrap().as_u64().unwrap(), 42);
}

#[test]
fn test_copy_rules_with_empty_string_defaults() {
    let parent = data(json!({"prompt": "a cat"}));
    let rules: Vec<InputRule> = serde_json::from_value(json!([
        {"from": "prompt", "to": "prompt"},
        {"from": "style", "to": "style"}
    ]))
    .unwrap();
    let child = build_child_fields(&parent, &rules, 1);
    assert_eq!(child.get("prompt").unwrap(), "a cat");
    // Missing source fields default to empty string rather than failing.
    assert_eq!(child.get("style").unwrap(), "");
}

#[test]
fn test_media_rules_do_not_copy_scalars() {
    let parent = data(json!({"save_image_path": "/m/image_1.png"}));
    let rules: Vec<InputRule> =
        serde_json::from_value(json!([{"media": "save_image_path"}])).unwrap();
    let child = build_child_fields(&parent, &rules, 1);
    // Media rules are handled by the upload pass, not the scalar pass.
    assert_eq!(child.len(), 1);
    assert!(child.contains_key("seed"));
}

#[test]
fn test_inject_media_fields() {
    let parent = data(json!({
        "description": "a fox",
        "tags": "fox, animal",
        "uid": 1700000000000u64,
        "image_format": "png"
    }));
    let mut child = GenerationData::new();
    inject_media_fields(&mut child, &parent, 0, "input_image", "engine_fox.png");

    assert_eq!(child.get("input_image_0").unwrap(), "engine_fox.png");
    assert_eq!(child.get("input_image_0_description").unwrap(), "a fox");
    assert_eq!(child.get("input_image_0_tags").unwrap(), "fox, animal");
    // Numeric metadata is stringified.
    assert_eq!(child.get("input_image_0_uid").unwrap(), "1700000000000");
    assert_eq!(child.get("input_image_0_format").unwrap(), "png");
    // Missing metadata defaults to empty string.
    assert_eq!(child.get("input_image_0_summary").unwrap(), "");
    assert_eq!(child.get("input_image_0_name").unwrap(), "");
}

#[test]
fn test_upload_kind_by_extension() {
    assert_eq!(upload_kind("/a/b.WAV"), MediaUploadKind::Audio);
    assert_eq!(upload_kind("x.flac"), MediaUploadKind::Audio);
    assert_eq!(upload_kind("x.png"), MediaUploadKind::Image);
    assert_eq!(upload_kind("x.mp4"), MediaUploadKind::Image);
}

#[test]
fn test_nested_params_parse() {
    let params: NestedParams = serde_json::from_value(json!({
        "workflow": "upscale",
        "input_mapping": [
            {"media": "save_image_path"},
            {"from": "prompt", "to": "prompt"}
        ],
        "output_mapping": [{"from": "caption", "to": "upscaled_caption"}]
    }))
    .unwrap();
    assert_eq!(params.workflow.as_deref(), Some("upscale"));
    assert_eq!(params.input_mapping.len(), 2);
    assert!(matches!(params.input_mapping[0], InputRule::Media { .. }));
    assert!(matches!(params.input_mapping[1], InputRule::Copy { .. }));
    assert_eq!(params.output_mapping[0].to, "upscaled_caption");
}
