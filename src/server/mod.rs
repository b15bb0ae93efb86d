//! Server module for MCP protocol handling.
//!
//! This module provides:
//! - MCP server implementation over stdio
//! - Tool call handlers and routing
//! - Shared application state management

mod handlers;
mod mcp;

pub use handlers::*;
pub use mcp::*;

use std::sync::Arc;

use crate::chatbot::ChatbotService;
use crate::config::Config;
use crate::storage::SqliteStorage;
use crate::triage::TriageService;

/// Application state shared across handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// SQLite storage backend; also the history source for triage.
    pub storage: SqliteStorage,
    /// Ticket triage service.
    pub triage: TriageService,
    /// Support chatbot; offline until [`AppState::with_chatbot`] is called.
    pub chatbot: ChatbotService,
}

impl AppState {
    /// Create new application state
    pub fn new(config: Config, storage: SqliteStorage, triage: TriageService) -> Self {
        tracing::info!(
            ai_enabled = triage.ai_enabled(),
            history_sample_cap = triage.history_sample_cap(),
            agents = triage.heuristic().roster().agents().len(),
            "AppState initialized"
        );

        Self {
            config,
            storage,
            triage,
            chatbot: ChatbotService::offline(),
        }
    }

    /// Replace the chatbot
    pub fn with_chatbot(mut self, chatbot: ChatbotService) -> Self {
        tracing::info!(ai_enabled = chatbot.ai_enabled(), "Chatbot configured");
        self.chatbot = chatbot;
        self
    }
}

/// Shared application state handle
pub type SharedState = Arc<AppState>;
