use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cl_domain::config::{Config, ConfigSeverity};
use cl_gateway::api;
use cl_gateway::broker::EventBroker;
use cl_gateway::cli::{load_config, Cli, Command, ConfigCommand};
use cl_gateway::runtime::{AgentRuntime, Session};
use cl_gateway::state::AppState;
use cl_providers::AnthropicProvider;
use cl_tools::ToolRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = load_config(cli.config.as_deref())?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = load_config(cli.config.as_deref())?;
            let issues = config.validate();
            for issue in &issues {
                println!("{issue}");
            }
            if issues
                .iter()
                .any(|i| i.severity == ConfigSeverity::Error)
            {
                std::process::exit(1);
            }
            println!("config ok");
            Ok(())
        }
        Some(Command::Version) => {
            println!("codeloom {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Initialize structured JSON tracing (only for the `serve` command).
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cl_gateway=debug")),
        )
        .json()
        .init();
}

/// Start the service with the given configuration.
async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    tracing::info!("codeloom starting");

    // ── Config validation ────────────────────────────────────────────
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    if issues.iter().any(|i| i.severity == ConfigSeverity::Error) {
        anyhow::bail!(
            "config validation failed with {} error(s)",
            issues
                .iter()
                .filter(|i| i.severity == ConfigSeverity::Error)
                .count()
        );
    }

    // ── Wiring ───────────────────────────────────────────────────────
    let provider = Arc::new(
        AnthropicProvider::from_config(&config.llm).context("failed to initialise LLM provider")?,
    );
    let tools = Arc::new(ToolRegistry::builtin());
    tracing::info!(tools = tools.len(), model = %config.llm.model, "runtime ready");

    let broker = Arc::new(EventBroker::new());
    let session = Arc::new(Session::new());
    let runtime = Arc::new(AgentRuntime::new(
        provider,
        tools,
        broker.clone(),
        session.clone(),
        &config,
    ));

    let state = AppState {
        config: config.clone(),
        broker,
        session,
        runtime,
    };

    // ── Serve ────────────────────────────────────────────────────────
    let app = api::router(state);
    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| {
            format!(
                "failed to bind {}:{}",
                config.server.host, config.server.port
            )
        })?;
    tracing::info!(addr = %listener.local_addr()?, "codeloom listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("codeloom stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("shutdown signal received");
    }
}
