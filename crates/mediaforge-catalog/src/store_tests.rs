use serde_json::json;
use tempfile::TempDir;

use super::*;
use crate::entry::NewEntry;

fn new_entry(workflow: &str) -> NewEntry {
    NewEntry {
        workflow: workflow.to_string(),
        folder: None,
        time_taken_ms: 1200,
        fields: json!({"prompt": "a cat"}).as_object().unwrap().clone(),
    }
}

#[tokio::test]
async fn test_add_and_find() {
    let dir = TempDir::new().unwrap();
    let catalog = MediaCatalog::open(dir.path().join("catalog.json"))
        .await
        .unwrap();

    let entry = catalog.add_entry(new_entry("txt2img")).await.unwrap();
    assert!(entry.uid > 0);

    let found = catalog.find_by_uid(entry.uid).await.unwrap();
    assert_eq!(found.workflow, "txt2img");
    assert_eq!(found.fields.get("prompt").unwrap(), "a cat");

    assert!(catalog.find_by_uid(entry.uid + 999).await.is_none());
}

#[tokio::test]
async fn test_uids_strictly_monotonic() {
    let dir = TempDir::new().unwrap();
    let catalog = MediaCatalog::open(dir.path().join("catalog.json"))
        .await
        .unwrap();

    let mut last = 0;
    for _ in 0..5 {
        let entry = catalog.add_entry(new_entry("w")).await.unwrap();
        assert!(entry.uid > last);
        last = entry.uid;
    }
}

#[tokio::test]
async fn test_persistence_across_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");

    let uid = {
        let catalog = MediaCatalog::open(&path).await.unwrap();
        catalog.add_entry(new_entry("txt2img")).await.unwrap().uid
    };

    let reopened = MediaCatalog::open(&path).await.unwrap();
    assert_eq!(reopened.len().await, 1);
    assert!(reopened.find_by_uid(uid).await.is_some());
}

#[tokio::test]
async fn test_list_filtered() {
    let dir = TempDir::new().unwrap();
    let catalog = MediaCatalog::open(dir.path().join("catalog.json"))
        .await
        .unwrap();

    catalog.add_entry(new_entry("txt2img")).await.unwrap();
    catalog.add_entry(new_entry("tts")).await.unwrap();
    let mut filed = new_entry("txt2img");
    filed.folder = Some("portraits".to_string());
    catalog.add_entry(filed).await.unwrap();

    let all = catalog.list_filtered(&CatalogFilter::default()).await;
    assert_eq!(all.len(), 3);
    // Newest first.
    assert!(all[0].uid > all[2].uid);

    let by_workflow = catalog
        .list_filtered(&CatalogFilter {
            workflow: Some("txt2img".to_string()),
            ..Default::default()
        })
        .await;
    assert_eq!(by_workflow.len(), 2);

    let by_folder = catalog
        .list_filtered(&CatalogFilter {
            folder: Some("portraits".to_string()),
            ..Default::default()
        })
        .await;
    assert_eq!(by_folder.len(), 1);
}

#[tokio::test]
async fn test_open_empty_on_missing_file() {
    let dir = TempDir::new().unwrap();
    let catalog = MediaCatalog::open(dir.path().join("absent.json"))
        .await
        .unwrap();
    assert!(catalog.is_empty().await);
}

#[tokio::test]
async fn test_open_rejects_corrupt_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("catalog.json");
    tokio::fs::write(&path, "{ not json").await.unwrap();
    assert!(MediaCatalog::open(&path).await.is_err());
}
