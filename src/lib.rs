//! # Ticket Triage
//!
//! IT service-desk ticket triage served over the Model Context Protocol (MCP).
//!
//! Each ticket is analyzed into a suggested agent, self-fix steps, a priority
//! recommendation, similar past tickets and a resolution estimate. A language
//! model produces the analysis when a provider credential is configured; a
//! deterministic keyword classifier takes over when it is not, or when the
//! provider call fails.
//!
//! The same server keeps a small knowledge base of support articles and
//! answers free-form questions through a chatbot that falls back to article
//! suggestions and a human-agent offer.
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (Rust) → TriageService ─→ OpenAI-compatible API (HTTP)
//!                    │                    └──────→ HeuristicClassifier
//!                    ├──────────→ ChatbotService ─→ OpenAI-compatible API (HTTP)
//!                    ↓
//!              SQLite (tickets, history, analyses, knowledge base)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use ticket_triage::{Config, AppState, McpServer};
//! use ticket_triage::storage::SqliteStorage;
//! use ticket_triage::triage::{AgentRoster, TriageService};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let triage = TriageService::from_config(&config, AgentRoster::default())?;
//!     let state = Arc::new(AppState::new(config, storage, triage));
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

/// Support chatbot with canned fallback replies.
pub mod chatbot;
/// Command-line interface.
pub mod cli;
/// Configuration management.
pub mod config;
/// Error types and result aliases for the application.
pub mod error;
/// Knowledge-base articles and keyword search.
pub mod knowledge;
/// OpenAI-compatible chat completions client.
pub mod llm;
/// Prompts for AI ticket analysis and the chatbot.
pub mod prompts;
/// MCP server implementation and request handling.
pub mod server;
/// SQLite storage layer for tickets, analyses and articles.
pub mod storage;
/// Heuristic and AI ticket triage.
pub mod triage;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
