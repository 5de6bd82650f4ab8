//! forged - autonomous software-development workflow engine daemon.
//!
//! Drives the workflow coordinator (C7) either as a long-running HTTP
//! control-plane server (`serve`, the default) or as a one-shot CLI
//! convenience for a single request (`run-once`).

use clap::{Parser, Subcommand};
use eyre::{Context, Result};
use forge_core::ExitCategory;
use forged::agent_runtime::{AgentRuntime, ProcessAgentRuntime};
use forged::config::Config;
use forged::coordinator::Coordinator;
use forged::server;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, EnvFilter};

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "forged", version, about = "Autonomous software-development workflow engine daemon")]
struct Cli {
    /// Path to the `.forge/config` key=value file. Defaults to `.forge/config`
    /// in the current directory if present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP control-plane server (default).
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Start and drive a single workflow to completion, then exit.
    RunOnce {
        /// The free-form feature request.
        request: String,
    },
}

fn load_config(path: &Option<PathBuf>) -> Config {
    let candidate = path.clone().unwrap_or_else(|| PathBuf::from(".forge/config"));
    if candidate.exists() {
        match Config::from_file(&candidate) {
            Ok(config) => return config,
            Err(err) => {
                tracing::warn!(path = %candidate.display(), %err, "failed to parse config file, using defaults");
            }
        }
    }
    Config::default()
}

fn build_coordinator(config: &Config) -> Coordinator {
    let runtime: Arc<dyn AgentRuntime> = Arc::new(ProcessAgentRuntime::new(
        config.agent_cli_bin.clone(),
        config.agent_retries,
        Duration::from_secs(config.agent_retry_backoff_sec as u64),
    ));
    Coordinator::new(
        config.charter_path.clone(),
        config.store_root.clone(),
        config.log_dir.clone(),
        runtime,
        config.alignment_confidence_threshold,
        Duration::from_secs(config.alignment_timeout_sec),
        config.model.clone(),
        None,
    )
}

fn main() -> Result<()> {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    match cli.command.unwrap_or(Command::Serve { bind: None }) {
        Command::Serve { bind } => {
            let bind_addr = bind.unwrap_or_else(|| config.bind_addr.clone());
            runtime.block_on(async move {
                let coordinator = Arc::new(build_coordinator(&config));
                server::serve(coordinator, &bind_addr).await
            })?;
            Ok(())
        }
        Command::RunOnce { request } => {
            let exit_code = runtime.block_on(async move {
                let coordinator = build_coordinator(&config);
                run_once(&coordinator, &request).await
            })?;
            std::process::exit(exit_code);
        }
    }
}

/// Exit semantics from a command-line shim: `0` success, `1` alignment
/// refusal, `2` upstream or schema violation, `3` agent runtime failure.
async fn run_once(coordinator: &Coordinator, request: &str) -> Result<i32> {
    let start = coordinator.start_workflow(request).await?;
    let Some(workflow_id) = start.workflow_id else {
        tracing::warn!(reason = %start.message, "alignment refusal");
        return Ok(1);
    };
    tracing::info!(%workflow_id, "workflow created");

    let run = coordinator.run(&workflow_id).await?;
    if run.ok {
        tracing::info!(%workflow_id, "workflow complete");
        return Ok(0);
    }

    tracing::error!(%workflow_id, failed_agent = ?run.failed_agent, message = %run.message, "workflow halted");
    match run.failure_category {
        Some(ExitCategory::UpstreamOrSchema) => Ok(2),
        Some(ExitCategory::AgentRuntime) | None => Ok(3),
    }
}
