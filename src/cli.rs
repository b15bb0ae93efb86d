//! Command-line interface.
//!
//! With no subcommand the binary serves MCP over stdio. `analyze` triages a
//! single ticket against the configured store and prints the result as JSON.

use clap::{Parser, Subcommand};

use crate::storage::{Category, Priority, SqliteStorage, Ticket};
use crate::triage::{TriageOutcome, TriageService};

/// IT service-desk ticket triage.
#[derive(Parser, Debug)]
#[command(name = "ticket-triage", version, about)]
pub struct Cli {
    /// Command to run; defaults to `serve`.
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// The selected command, `serve` when none was given.
    pub fn command(&self) -> Commands {
        self.command.clone().unwrap_or(Commands::Serve)
    }
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Commands {
    /// Serve MCP over stdin/stdout
    Serve,

    /// Triage one ticket and print the analysis
    Analyze {
        /// Ticket title
        #[arg(long)]
        title: String,

        /// Ticket description
        #[arg(long, default_value = "")]
        description: String,

        /// Category (Hardware, Software, Network, Email, Access, Security, Other)
        #[arg(long)]
        category: Option<Category>,

        /// Explicit priority (low, medium, high, critical)
        #[arg(long)]
        priority: Option<Priority>,

        /// Skip the language model even when a credential is configured
        #[arg(long)]
        heuristic_only: bool,
    },

    /// Print the agent roster
    Roster,
}

/// Result of CLI command execution.
pub struct CliResult {
    /// Exit code (0 = success)
    pub exit_code: i32,
    /// Output message
    pub message: String,
}

impl CliResult {
    /// Create a success result with the given message.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            message: message.into(),
        }
    }

    /// Create an error result with the given message.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            exit_code: 1,
            message: message.into(),
        }
    }
}

/// Execute a one-shot command. `serve` is handled by the binary.
pub async fn execute_command(
    command: Commands,
    triage: &TriageService,
    storage: &SqliteStorage,
) -> CliResult {
    match command {
        Commands::Serve => CliResult::error("serve runs the MCP server and is not a one-shot command"),
        Commands::Analyze {
            title,
            description,
            category,
            priority,
            heuristic_only,
        } => {
            let ticket = build_ticket(triage, title, description, category, priority);
            let outcome = if heuristic_only {
                let service = TriageService::heuristic_only(triage.heuristic().clone());
                service.triage(&ticket, storage).await
            } else {
                triage.triage(&ticket, storage).await
            };
            render_outcome(&outcome)
        }
        Commands::Roster => CliResult::success(triage.heuristic().roster().summary()),
    }
}

/// Assemble a ticket from CLI arguments; the category is inferred when absent.
fn build_ticket(
    triage: &TriageService,
    title: String,
    description: String,
    category: Option<Category>,
    priority: Option<Priority>,
) -> Ticket {
    let mut ticket = Ticket::new(title, description);
    let category = category.unwrap_or_else(|| triage.heuristic().classify(&ticket).category);
    ticket = ticket.with_category(category);
    if let Some(priority) = priority {
        ticket = ticket.with_priority(priority);
    }
    ticket
}

fn render_outcome(outcome: &TriageOutcome) -> CliResult {
    match serde_json::to_string_pretty(outcome) {
        Ok(json) => CliResult::success(json),
        Err(e) => CliResult::error(format!("Failed to render analysis: {}", e)),
    }
}
