use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use agentflow_backend::{HttpAgentBackend, HttpWorkflowStore};
use agentflow_core::config::AppConfig;
use agentflow_core::event::{EventBus, RunEvent};
use agentflow_core::traits::WorkflowStore;
use agentflow_engine::{Orchestrator, RunTarget, StaticCatalog};
use agentflow_gateway::GatewayServer;
use agentflow_graph::document::WorkflowDocument;
use agentflow_store::{migrate_legacy_store, SqliteStore};

#[derive(Parser)]
#[command(name = "agentflow", version, about = "Visual multi-agent workflow builder and runner")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "agentflow.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST gateway
    Serve,
    /// List saved workflows, newest first
    List,
    /// Print a saved workflow as JSON
    Show {
        id: String,
    },
    /// Execute a saved workflow
    Run {
        id: String,
        /// Input text (read from stdin when omitted)
        #[arg(trailing_var_arg = true)]
        input: Vec<String>,
    },
    /// Delete a saved workflow
    Delete {
        id: String,
    },
    /// Import workflows exported from the legacy browser store
    Migrate {
        /// JSON file holding an array of records or `{"workflows": [...]}`
        file: PathBuf,
    },
    /// Show current configuration
    Config,
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("agentflow=info,warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(*shell, &mut cmd, "agentflow", &mut io::stdout());
        return Ok(());
    }

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Config => {
            println!("{}", toml::to_string_pretty(&config)?);
        }
        Commands::List => {
            let store = open_store(&config)?;
            let workflows = store.list().await?;
            if workflows.is_empty() {
                println!("No workflows saved.");
            }
            for wf in workflows {
                println!(
                    "{}  {:<30}  nodes={:<3} agents={:<3} updated {}",
                    wf.id,
                    wf.name,
                    wf.node_count,
                    wf.agent_count,
                    wf.updated_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
        Commands::Show { id } => {
            let store = open_store(&config)?;
            let wf = store.get(&id).await?;
            println!(
                "{}",
                serde_json::to_string_pretty(&WorkflowDocument::from(&wf))?
            );
        }
        Commands::Delete { id } => {
            let store = open_store(&config)?;
            store.delete(&id).await?;
            println!("Deleted {}", id);
        }
        Commands::Migrate { file } => {
            let store = open_store(&config)?;
            let records = read_legacy_records(&file)?;
            let report = migrate_legacy_store(store.as_ref(), records).await;
            println!(
                "Migrated {} of {} (already existed: {}, failed: {})",
                report.migrated_count,
                report.total_attempted,
                report.already_existed,
                report.failed
            );
        }
        Commands::Run { id, input } => {
            let text = if input.is_empty() {
                io::stdin()
                    .lock()
                    .lines()
                    .map_while(|l| l.ok())
                    .collect::<Vec<_>>()
                    .join("\n")
            } else {
                input.join(" ")
            };
            let orchestrator = build_orchestrator(&config)?;
            let progress = spawn_progress_printer(orchestrator.events());

            let result = orchestrator.execute(RunTarget::Saved(id), &text).await;
            progress.abort();
            let result = result?;

            for (i, step) in result.results.iter().enumerate() {
                println!("── step {} · {} ({} ms)", i + 1, step.agent_name, step.elapsed_ms);
                println!("{}\n", step.output);
            }
            println!("Completed in {:.2}s", result.execution_time);
        }
        Commands::Serve => {
            let orchestrator = Arc::new(build_orchestrator(&config)?);
            info!(bind = %config.gateway.bind, "Starting gateway");
            let server = GatewayServer::new(config.gateway.clone(), orchestrator);

            let cancel = tokio_util::sync::CancellationToken::new();
            let cancel_clone = cancel.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Shutting down gateway...");
                cancel_clone.cancel();
            });

            server.run(cancel).await?;
        }
        Commands::Completions { .. } => {}
    }

    Ok(())
}

/// `--config` if it exists, else `~/.agentflow/config.toml`, else defaults.
fn load_config(path: &Path) -> anyhow::Result<AppConfig> {
    if path.exists() {
        return Ok(AppConfig::load(path)?);
    }
    match AppConfig::default_path() {
        Some(home) if home.exists() => {
            info!(path = %home.display(), "Loading config from home directory");
            Ok(AppConfig::load(&home)?)
        }
        _ => {
            warn!("No config file found, using defaults");
            Ok(AppConfig::default())
        }
    }
}

fn open_store(config: &AppConfig) -> anyhow::Result<Arc<dyn WorkflowStore>> {
    match &config.store.url {
        Some(url) => {
            info!(url = %url, "Using remote workflow store");
            Ok(Arc::new(HttpWorkflowStore::new(
                url,
                config.store.token.clone(),
                config.backend.request_timeout_secs,
            )?))
        }
        None => {
            let path = config.store_path();
            info!(path = %path.display(), "Using SQLite workflow store");
            Ok(Arc::new(SqliteStore::open(&path)?))
        }
    }
}

fn build_orchestrator(config: &AppConfig) -> anyhow::Result<Orchestrator> {
    let store = open_store(config)?;
    let backend = Arc::new(HttpAgentBackend::new(&config.backend)?);
    let catalog = StaticCatalog::new(&config.agents);
    if catalog.is_empty() && config.execution.sync_agents {
        warn!("No [[agents]] definitions configured; missing backend agents cannot be synced");
    }
    Ok(Orchestrator::new(
        store,
        backend,
        Arc::new(catalog),
        Arc::new(EventBus::default()),
        config.execution.clone(),
    ))
}

fn read_legacy_records(path: &Path) -> anyhow::Result<Vec<serde_json::Value>> {
    let content = std::fs::read_to_string(path)?;
    let value: serde_json::Value = serde_json::from_str(&content)?;
    match value {
        serde_json::Value::Array(records) => Ok(records),
        serde_json::Value::Object(mut obj) => match obj.remove("workflows") {
            Some(serde_json::Value::Array(records)) => Ok(records),
            _ => anyhow::bail!("expected a \"workflows\" array in {}", path.display()),
        },
        _ => anyhow::bail!("expected a JSON array in {}", path.display()),
    }
}

fn spawn_progress_printer(events: &EventBus) -> tokio::task::JoinHandle<()> {
    let mut rx = events.subscribe();
    tokio::spawn(async move {
        while let Ok(event) = rx.recv().await {
            match event {
                RunEvent::StepStarted {
                    index, agent_name, ..
                } => eprintln!("▶ step {}: {}", index + 1, agent_name),
                RunEvent::AgentSyncFailed { agent_id, message } => {
                    eprintln!("! could not sync agent {}: {}", agent_id, message)
                }
                _ => {}
            }
        }
    })
}
