//! Configuration schema.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub llm: LlmConfig,
    pub storage: StorageConfig,
    pub workflows: WorkflowsConfig,
    pub catalog: CatalogConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// External compute engine settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Base URL of the node-graph engine.
    pub base_url: String,
    /// Completion poll interval.
    pub poll_interval_ms: u64,
    /// Bound on completion poll attempts before giving up.
    pub poll_max_attempts: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8188".to_string(),
            poll_interval_ms: 1000,
            poll_max_attempts: 600,
        }
    }
}

/// LLM bridge settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible API base URL.
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model used for text prompt tasks.
    pub model: String,
    /// Model used for image-caption prompts; falls back to `model`.
    pub caption_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:11434/v1".to_string(),
            api_key: None,
            model: "llama3".to_string(),
            caption_model: None,
        }
    }
}

/// Filesystem layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory generated media is saved into.
    pub media_dir: PathBuf,
    /// Directory caller uploads land in.
    pub upload_dir: PathBuf,
    /// Directory the engine writes its outputs and sidecar files into.
    pub engine_output_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            media_dir: PathBuf::from("data/media"),
            upload_dir: PathBuf::from("data/uploads"),
            engine_output_dir: PathBuf::from("data/engine-output"),
        }
    }
}

/// Workflow library locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowsConfig {
    /// The workflow definition document.
    pub library_path: PathBuf,
    /// Directory graph templates are resolved against.
    pub template_dir: PathBuf,
}

impl Default for WorkflowsConfig {
    fn default() -> Self {
        Self {
            library_path: PathBuf::from("config/workflows.json"),
            template_dir: PathBuf::from("config/graphs"),
        }
    }
}

/// Media catalog persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub path: PathBuf,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/catalog.json"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.engine.poll_interval_ms, 1000);
        assert_eq!(config.llm.model, "llama3");
        assert!(config.llm.caption_model.is_none());
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: AppConfig = toml::from_str(
            r#"
            [engine]
            base_url = "http://gpu-box:8188"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.base_url, "http://gpu-box:8188");
        assert_eq!(config.engine.poll_max_attempts, 600);
        assert_eq!(config.server.host, "127.0.0.1");
    }
}
