//! spindle - run task workflows from the command line.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use spindle_core::impls::{JsonFileTaskStore, LocalFileProcessor, TracingNotifier};
use spindle_core::{Collaborators, EngineBuilder, EngineConfig, TaskManager, TaskSpec, TaskStatus};

#[derive(Parser)]
#[command(name = "spindle")]
#[command(about = "Spindle - multi-step task automation engine")]
#[command(version)]
struct Cli {
    /// Engine configuration (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `spindle_core=trace` (default: RUST_LOG, then info)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Register `system_command` (runs local programs)
    #[arg(long, global = true)]
    allow_system_commands: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a task from a workflow file and run it to completion
    Run {
        /// Path to the workflow definition (JSON)
        file: PathBuf,

        /// Persist task snapshots as JSON files in this directory
        #[arg(long)]
        store: Option<PathBuf>,
    },

    /// Check a workflow file without running it
    Validate {
        /// Path to the workflow definition (JSON)
        file: PathBuf,
    },

    /// List available actions
    Actions,
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level).context("invalid --log-level")?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let config = match &cli.config {
        Some(path) => EngineConfig::load(path).await?,
        None => EngineConfig::default(),
    };

    match &cli.command {
        Commands::Run { file, store } => {
            let manager = engine(&cli, config, store.as_deref())?;
            run_workflow(&manager, file).await
        }
        Commands::Validate { file } => {
            let manager = engine(&cli, config, None)?;
            validate_workflow(&manager, file).await?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Actions => {
            let manager = engine(&cli, config, None)?;
            for action in manager.registry().registered_actions() {
                println!("{action}");
            }
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn engine(cli: &Cli, config: EngineConfig, store: Option<&Path>) -> anyhow::Result<TaskManager> {
    let collaborators = Collaborators::new()
        .with_notifier(Arc::new(TracingNotifier))
        .with_files(Arc::new(LocalFileProcessor::new()))
        .with_system_commands(cli.allow_system_commands);

    let mut builder = EngineBuilder::new().config(config).collaborators(collaborators);
    if let Some(dir) = store {
        builder = builder.store(Arc::new(JsonFileTaskStore::new(dir)));
    }
    Ok(builder.build()?)
}

async fn read_spec(file: &Path) -> anyhow::Result<TaskSpec> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    serde_json::from_str(&content).with_context(|| format!("failed to parse {}", file.display()))
}

async fn validate_workflow(manager: &TaskManager, file: &Path) -> anyhow::Result<()> {
    let spec = read_spec(file).await?;
    spec.validate()?;

    let missing: Vec<&str> = spec
        .steps
        .iter()
        .map(|s| s.action.as_str())
        .filter(|action| !manager.registry().contains(action))
        .collect();
    if !missing.is_empty() {
        bail!("no handler for actions: {}", missing.join(", "));
    }

    println!("{}: ok ({} steps)", spec.name, spec.steps.len());
    Ok(())
}

async fn run_workflow(manager: &TaskManager, file: &Path) -> anyhow::Result<ExitCode> {
    let spec = read_spec(file).await?;
    let created = manager.create(spec).await?;

    // Scheduled and auto-run tasks are started by the engine.
    let task = if created.scheduled_for.is_some() || manager.auto_run() {
        info!(task_id = %created.id, "waiting for the engine to run the task");
        manager.wait(created.id).await?
    } else {
        manager.execute(created.id).await?
    };

    println!("{}", serde_json::to_string_pretty(&task)?);
    Ok(match task.status {
        TaskStatus::Completed => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    })
}
