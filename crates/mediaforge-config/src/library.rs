//! Workflow definition library.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use mediaforge_protocols::WorkflowDefinition;

use crate::error::ConfigError;

/// Loads workflow definitions from a JSON document on disk.
///
/// The document is re-read on every [`load`](WorkflowLibrary::load) so that
/// edits take effect on the next run without a server restart. Definitions
/// are never cached across runs.
pub struct WorkflowLibrary {
    library_path: PathBuf,
    template_dir: PathBuf,
}

impl WorkflowLibrary {
    /// Create a library over the given document and template directory.
    pub fn new(library_path: impl Into<PathBuf>, template_dir: impl Into<PathBuf>) -> Self {
        Self {
            library_path: library_path.into(),
            template_dir: template_dir.into(),
        }
    }

    /// Read and parse all workflow definitions.
    pub fn load(&self) -> Result<Vec<WorkflowDefinition>, ConfigError> {
        let content = fs::read_to_string(&self.library_path)?;
        let definitions: Vec<WorkflowDefinition> = serde_json::from_str(&content)?;
        debug!(
            count = definitions.len(),
            path = %self.library_path.display(),
            "loaded workflow definitions"
        );
        Ok(definitions)
    }

    /// Resolve a definition's graph template to an absolute path.
    pub fn template_path(&self, definition: &WorkflowDefinition) -> PathBuf {
        if definition.template_path.is_absolute() {
            definition.template_path.clone()
        } else {
            self.template_dir.join(&definition.template_path)
        }
    }

    /// Load and parse a definition's graph template.
    pub fn load_template(
        &self,
        definition: &WorkflowDefinition,
    ) -> Result<serde_json::Value, ConfigError> {
        let path = self.template_path(definition);
        if !path.exists() {
            return Err(ConfigError::TemplateMissing(path));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// The library document path.
    pub fn path(&self) -> &Path {
        &self.library_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_library(dir: &TempDir, content: &str) -> PathBuf {
        let path = dir.path().join("workflows.json");
        let mut file = fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_definitions() {
        let dir = TempDir::new().unwrap();
        let path = write_library(
            &dir,
            r#"[
                {
                    "name": "txt2img",
                    "template_path": "txt2img.json",
                    "options": { "kind": "image" }
                }
            ]"#,
        );
        let library = WorkflowLibrary::new(path, dir.path());
        let defs = library.load().unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "txt2img");
    }

    #[test]
    fn test_load_missing_document() {
        let library = WorkflowLibrary::new("/nonexistent/workflows.json", "/nonexistent");
        assert!(library.load().is_err());
    }

    #[test]
    fn test_load_malformed_document() {
        let dir = TempDir::new().unwrap();
        let path = write_library(&dir, "{ not json");
        let library = WorkflowLibrary::new(path, dir.path());
        assert!(matches!(library.load(), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_reload_picks_up_edits() {
        let dir = TempDir::new().unwrap();
        let path = write_library(&dir, "[]");
        let library = WorkflowLibrary::new(path.clone(), dir.path());
        assert!(library.load().unwrap().is_empty());

        write_library(
            &dir,
            r#"[{"name": "added", "template_path": "t.json", "options": {"kind": "image"}}]"#,
        );
        assert_eq!(library.load().unwrap().len(), 1);
    }

    #[test]
    fn test_template_missing() {
        let dir = TempDir::new().unwrap();
        let path = write_library(
            &dir,
            r#"[{"name": "w", "template_path": "absent.json", "options": {"kind": "image"}}]"#,
        );
        let library = WorkflowLibrary::new(path, dir.path());
        let defs = library.load().unwrap();
        assert!(matches!(
            library.load_template(&defs[0]),
            Err(ConfigError::TemplateMissing(_))
        ));
    }

    #[test]
    fn test_template_loads() {
        let dir = TempDir::new().unwrap();
        let path = write_library(
            &dir,
            r#"[{"name": "w", "template_path": "graph.json", "options": {"kind": "image"}}]"#,
        );
        fs::write(
            dir.path().join("graph.json"),
            r#"{"1": {"class_type": "KSampler", "inputs": {}}}"#,
        )
        .unwrap();
        let library = WorkflowLibrary::new(path, dir.path());
        let defs = library.load().unwrap();
        let template = library.load_template(&defs[0]).unwrap();
        assert!(template.get("1").is_some());
    }
}
