//! The catalog store.

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;

use std::path::PathBuf;

use chrono::Utc;
use tokio::sync::RwLock;
use tracing::debug;

use mediaforge_protocols::CatalogError;

use crate::entry::{CatalogEntry, NewEntry};

/// Filter for catalog listings. Empty filters match everything.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub workflow: Option<String>,
    pub folder: Option<String>,
}

impl CatalogFilter {
    fn matches(&self, entry: &CatalogEntry) -> bool {
        if let Some(workflow) = &self.workflow {
            if &entry.workflow != workflow {
                return false;
            }
        }
        if let Some(folder) = &self.folder {
            if entry.folder.as_deref() != Some(folder.as_str()) {
                return false;
            }
        }
        true
    }
}

/// JSON-file-backed media catalog.
pub struct MediaCatalog {
    path: PathBuf,
    entries: RwLock<Vec<CatalogEntry>>,
}

impl MediaCatalog {
    /// Open the catalog, loading existing entries if the file exists.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, CatalogError> {
        let path = path.into();
        let entries = match tokio::fs::read_to_string(&path).await {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "catalog file absent, starting empty");
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    /// Append an entry, assigning uid and timestamp, and flush to disk.
    pub async fn add_entry(&self, new: NewEntry) -> Result<CatalogEntry, CatalogError> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let mut uid = now.timestamp_millis() as u64;
        if let Some(last) = entries.last() {
            if uid <= last.uid {
                uid = last.uid + 1;
            }
        }
        let entry = CatalogEntry {
            uid,
            created_at: now,
            workflow: new.workflow,
            folder: new.folder,
            time_taken_ms: new.time_taken_ms,
            fields: new.fields,
        };
        entries.push(entry.clone());
        self.flush(&entries).await?;
        debug!(uid, workflow = %entry.workflow, "catalog entry added");
        Ok(entry)
    }

    /// Look up an entry by uid.
    pub async fn find_by_uid(&self, uid: u64) -> Option<CatalogEntry> {
        let entries = self.entries.read().await;
        entries.iter().find(|e| e.uid == uid).cloned()
    }

    /// List entries matching a filter, newest first.
    pub async fn list_filtered(&self, filter: &CatalogFilter) -> Vec<CatalogEntry> {
        let entries = self.entries.read().await;
        let mut matched: Vec<CatalogEntry> = entries
            .iter()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.uid.cmp(&a.uid));
        matched
    }

    /// Number of entries.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Whether the catalog has no entries.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Full-file rewrite of the backing document.
    async fn flush(&self, entries: &[CatalogEntry]) -> Result<(), CatalogError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}
