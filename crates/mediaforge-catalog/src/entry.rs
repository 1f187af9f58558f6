//! Catalog entry types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mediaforge_protocols::GenerationData;

/// A persisted generation result.
///
/// Created once on successful completion and never mutated by the
/// orchestrator afterwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Monotonic identifier derived from the creation timestamp.
    pub uid: u64,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Name of the workflow that produced this entry.
    pub workflow: String,
    /// Folder reference, when the caller filed the result.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub folder: Option<String>,
    /// Wall-clock duration of the run in milliseconds.
    pub time_taken_ms: u64,
    /// All generation-data fields at completion, including media paths.
    pub fields: GenerationData,
}

/// Input for [`MediaCatalog::add_entry`](crate::MediaCatalog::add_entry);
/// the catalog assigns uid and timestamp.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub workflow: String,
    pub folder: Option<String>,
    pub time_taken_ms: u64,
    pub fields: GenerationData,
}
