//! `rusty-automation` CLI entry-point.
//!
//! Available sub-commands:
//! - `serve`: start the HTTP API and the cron scheduler.
//! - `validate`: compile a workflow JSON file against the tool catalog.
//! - `run`: execute a workflow JSON file once and print the result.
//! - `migrate`: apply the state store's database migrations.

mod config;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use engine::{CronScheduler, DirectorySource, ExecutorConfig, Workflow, WorkflowExecutor};
use sandbox::{Sandbox, SandboxConfig};
use state::{MemoryBackend, PostgresBackend, StateConfig, StateStore};
use tools::{HttpToolInvoker, ToolCatalog};

use crate::config::Config;

const TOOL_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(
    name = "rusty-automation",
    about = "Tree-structured workflow automation engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve the HTTP API and fire cron-triggered workflows.
    Serve {
        /// Overrides AUTOMATION_BIND.
        #[arg(long)]
        bind: Option<String>,
    },
    /// Compile a workflow definition JSON file.
    Validate {
        /// Path to the workflow JSON file.
        path: PathBuf,
        /// Tool catalog JSON; overrides AUTOMATION_TOOL_CATALOG.
        #[arg(long)]
        catalog: Option<PathBuf>,
    },
    /// Execute a workflow definition JSON file once.
    Run {
        path: PathBuf,
        /// Trigger payload as JSON.
        #[arg(long, default_value = "{}")]
        input: String,
        /// State namespace; defaults to the file stem.
        #[arg(long)]
        namespace: Option<String>,
    },
    /// Apply pending state store migrations.
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is fine.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Serve { bind } => serve(&config, bind).await,
        Command::Validate { path, catalog } => validate(&config, &path, catalog).await,
        Command::Run {
            path,
            input,
            namespace,
        } => run(&config, &path, &input, namespace).await,
        Command::Migrate => migrate(&config).await,
    }
}

// ---------------------------------------------------------------------------
// Sub-commands
// ---------------------------------------------------------------------------

async fn serve(config: &Config, bind: Option<String>) -> Result<()> {
    let bind = bind.unwrap_or_else(|| config.bind.clone());
    let runner = Arc::new(build_sandbox(config));
    let registry = Arc::new(build_catalog(config.tool_catalog.as_deref()).await?);
    let executor = Arc::new(build_executor(config, runner.clone()).await?);
    let source = Arc::new(DirectorySource::new(&config.workflow_dir));
    info!(dir = %config.workflow_dir.display(), "serving workflows");

    let scheduler = CronScheduler::new(source.clone(), executor.clone()).start();

    let state = api::AppState {
        source,
        executor,
        registry,
        runner,
    };
    let served = api::serve(&bind, state, shutdown_signal()).await;
    scheduler.shutdown().await;
    served.with_context(|| format!("API server on {bind} failed"))
}

async fn validate(config: &Config, path: &Path, catalog: Option<PathBuf>) -> Result<()> {
    let workflow = read_workflow(path).await?;
    let catalog_path = catalog.or_else(|| config.tool_catalog.clone());
    let registry = build_catalog(catalog_path.as_deref()).await?;
    let runner = build_sandbox(config);

    println!("{}", workflow.to_viewable_string());
    match workflow.compile(&registry, &runner).await {
        Ok(()) => {
            println!("✅ Workflow is valid.");
            Ok(())
        }
        Err(failures) => {
            eprintln!("❌ Validation failed with {} problem(s):", failures.len());
            for failure in &failures {
                eprintln!("  - {failure}");
            }
            std::process::exit(1);
        }
    }
}

async fn run(config: &Config, path: &Path, input: &str, namespace: Option<String>) -> Result<()> {
    let workflow = read_workflow(path).await?;
    let payload: Value = serde_json::from_str(input).context("--input is not valid JSON")?;
    let namespace = match namespace {
        Some(ns) => ns,
        None => path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(str::to_owned)
            .context("cannot derive a namespace from the file name; pass --namespace")?,
    };

    let executor = build_executor(config, Arc::new(build_sandbox(config))).await?;
    let result = executor
        .run(&workflow, &namespace, payload)
        .await
        .context("workflow run failed")?;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

async fn migrate(config: &Config) -> Result<()> {
    let Some(url) = &config.database_url else {
        bail!("AUTOMATION_DATABASE_URL is not set");
    };
    let pool = state::create_pool(&StateConfig::new(url.clone()))
        .await
        .context("failed to connect to the state database")?;
    state::run_migrations(&pool).await.context("migration failed")?;
    info!("Migrations applied successfully");
    Ok(())
}

// ---------------------------------------------------------------------------
// Wiring
// ---------------------------------------------------------------------------

fn build_sandbox(config: &Config) -> Sandbox {
    Sandbox::new(SandboxConfig::default().with_timeout(config.sandbox_timeout))
}

async fn build_catalog(path: Option<&Path>) -> Result<ToolCatalog> {
    match path {
        Some(path) => ToolCatalog::load(path)
            .await
            .with_context(|| format!("cannot load tool catalog {}", path.display())),
        None => {
            warn!("no tool catalog configured; every tool reference will be reported missing");
            Ok(ToolCatalog::new())
        }
    }
}

async fn build_state(config: &Config) -> Result<StateStore> {
    let backend: Arc<dyn state::StateBackend> = match &config.database_url {
        Some(url) => {
            let pool = state::create_pool(&StateConfig::new(url.clone()))
                .await
                .context("failed to connect to the state database")?;
            Arc::new(PostgresBackend::new(pool))
        }
        None => {
            warn!("AUTOMATION_DATABASE_URL not set; state is kept in memory");
            Arc::new(MemoryBackend::new())
        }
    };
    Ok(StateStore::new(backend))
}

async fn build_executor(config: &Config, runner: Arc<Sandbox>) -> Result<WorkflowExecutor> {
    let invoker = HttpToolInvoker::new(config.tools_url.clone(), TOOL_REQUEST_TIMEOUT);
    Ok(WorkflowExecutor::new(
        Arc::new(invoker),
        runner,
        build_state(config).await?,
        ExecutorConfig::default(),
    ))
}

async fn read_workflow(path: &Path) -> Result<Workflow> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("cannot read file {}", path.display()))?;
    Workflow::from_json(&content).with_context(|| format!("invalid workflow {}", path.display()))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for ctrl-c: {err}");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
