//! # Mediaforge Config
//!
//! Server configuration (TOML with environment-variable expansion) and the
//! workflow definition library (a JSON document re-read fresh for every run
//! so edits take effect without a restart), including the nesting validator
//! that rejects illegal `execute_workflow` graphs before any side effect.

mod error;
mod library;
mod loader;
mod schema;
mod validate;

pub use error::ConfigError;
pub use library::WorkflowLibrary;
pub use loader::ConfigLoader;
pub use schema::{
    AppConfig, CatalogConfig, EngineConfig, LlmConfig, ServerConfig, StorageConfig,
    WorkflowsConfig,
};
pub use validate::{nested_target, validate_nesting, validate_process_names};
