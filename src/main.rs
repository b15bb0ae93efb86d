use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticket_triage::{
    chatbot::ChatbotService,
    cli::{execute_command, Cli, Commands},
    config::{Config, LogFormat},
    error::AppResult,
    server::{AppState, McpServer},
    storage::SqliteStorage,
    triage::{AgentRoster, TriageService},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize logging
    init_logging(&config);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        "Ticket triage starting..."
    );

    let (storage, triage, chatbot) = match build_services(&config).await {
        Ok(services) => services,
        Err(e) => {
            error!(error = %e, "Failed to initialize services");
            return Err(e.into());
        }
    };

    let command = cli.command();
    if command != Commands::Serve {
        let result = execute_command(command, &triage, &storage).await;
        if result.exit_code == 0 {
            println!("{}", result.message);
        } else {
            eprintln!("{}", result.message);
        }
        std::process::exit(result.exit_code);
    }

    // Create application state
    let state = Arc::new(AppState::new(config, storage, triage).with_chatbot(chatbot));

    // Start MCP server
    let server = McpServer::new(Arc::clone(&state));

    info!("Server ready, waiting for requests on stdin...");

    let result = server.run().await;
    state.storage.close().await;
    if let Err(e) = result {
        error!(error = %e, "Server error");
        return Err(e.into());
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Open the database and build the triage and chatbot services.
async fn build_services(
    config: &Config,
) -> AppResult<(SqliteStorage, TriageService, ChatbotService)> {
    let roster = match &config.triage.roster_path {
        Some(path) => AgentRoster::from_file(path)?,
        None => AgentRoster::default(),
    };

    let storage = SqliteStorage::new(&config.database).await?;
    info!(path = %config.database.path.display(), "Database initialized");

    let triage = TriageService::from_config(config, roster)?;
    let chatbot = ChatbotService::from_config(config)?;
    Ok((storage, triage, chatbot))
}

/// Initialize tracing/logging
fn init_logging(config: &Config) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    match config.logging.format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}
