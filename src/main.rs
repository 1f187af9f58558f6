//! Mediaforge - media generation orchestration server.
//!
//! Main entry point: CLI parsing, tracing setup, state construction, serve.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use mediaforge_api::{ApiServer, AppState, spawn_engine_event_pump};
use mediaforge_catalog::MediaCatalog;
use mediaforge_config::{AppConfig, ConfigLoader, WorkflowLibrary};
use mediaforge_engine::{EngineClient, EngineSessionState};
use mediaforge_llm::LlmClient;
use mediaforge_progress::ProgressChannel;
use mediaforge_runtime::Orchestrator;

/// Mediaforge CLI.
#[derive(Parser)]
#[command(name = "mediaforge")]
#[command(about = "Media generation orchestration server")]
#[command(version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    config: PathBuf,

    /// Log directory (file logging disabled when unset)
    #[arg(long, global = true)]
    log_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the server in the foreground (default)
    Run {
        /// Override the configured host
        #[arg(long)]
        host: Option<String>,

        /// Override the configured port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration and workflow library, then exit
    Check,
}

fn init_tracing(log_dir: Option<&PathBuf>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer());
    match log_dir {
        Some(dir) => {
            let appender = RollingFileAppender::new(Rotation::DAILY, dir, "mediaforge.log");
            registry
                .with(fmt::layer().with_ansi(false).with_writer(appender))
                .init();
        }
        None => registry.init(),
    }
}

fn load_config(path: &PathBuf) -> AppConfig {
    match ConfigLoader::load(path) {
        Ok(config) => config,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "config not loaded, using defaults");
            AppConfig::default()
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_dir.as_ref());

    let mut config = load_config(&cli.config);
    let command = cli.command.unwrap_or(Commands::Run {
        host: None,
        port: None,
    });

    match command {
        Commands::Check => check(&config),
        Commands::Run { host, port } => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            run(config).await
        }
    }
}

/// Validate the workflow library and template files without serving.
fn check(config: &AppConfig) -> anyhow::Result<()> {
    let library = WorkflowLibrary::new(
        &config.workflows.library_path,
        &config.workflows.template_dir,
    );
    let definitions = library.load()?;
    for definition in &definitions {
        mediaforge_config::validate_process_names(definition)?;
        mediaforge_config::validate_nesting(definition, &definitions)?;
        library.load_template(definition)?;
        info!(workflow = %definition.name, "ok");
    }
    info!(count = definitions.len(), "workflow library is valid");
    Ok(())
}

async fn run(config: AppConfig) -> anyhow::Result<()> {
    for dir in [
        &config.storage.media_dir,
        &config.storage.upload_dir,
        &config.storage.engine_output_dir,
    ] {
        tokio::fs::create_dir_all(dir).await?;
    }

    let engine = Arc::new(EngineClient::new(&config.engine.base_url));
    let llm = Arc::new(LlmClient::new(
        &config.llm.base_url,
        config.llm.api_key.clone(),
        &config.llm.model,
        config.llm.caption_model.clone(),
    ));
    let catalog = Arc::new(MediaCatalog::open(&config.catalog.path).await?);
    let progress = ProgressChannel::new();
    let library = Arc::new(WorkflowLibrary::new(
        &config.workflows.library_path,
        &config.workflows.template_dir,
    ));
    let session = Arc::new(EngineSessionState::new());

    let orchestrator = Orchestrator::new(
        engine.clone(),
        llm,
        catalog.clone(),
        progress.clone(),
        library.clone(),
        session,
        config.storage.clone(),
        &config.engine,
    );

    // Engine push events feed the progress channel; completion is confirmed
    // by polling, so this channel is display-only.
    let pump = spawn_engine_event_pump(engine, orchestrator.client_id(), progress.clone());

    let state = Arc::new(AppState::new(
        orchestrator,
        progress,
        catalog,
        library,
        config.storage.clone(),
    ));
    let server = ApiServer::new(config.server.clone(), state);

    info!(addr = %server.addr(), "mediaforge starting");
    server
        .run(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown requested");
        })
        .await
        .map_err(|e| anyhow::anyhow!(e.to_string()))?;

    pump.abort();
    Ok(())
}
