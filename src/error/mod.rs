use thiserror::Error;

/// Application-level errors
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Storage layer errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database connection failed: {message}")]
    Connection { message: String },

    #[error("Query failed: {message}")]
    Query { message: String },

    #[error("Ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: String },

    #[error("Migration failed: {message}")]
    Migration { message: String },

    #[error("SQLx error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

/// Failures of a single LLM analysis attempt.
///
/// Every transport or provider fault is folded into one of these four
/// kinds before it leaves the analysis client.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Analysis request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Provider rejected credentials: {status} - {message}")]
    Auth { status: u16, message: String },

    #[error("Invalid analysis response: {message}")]
    Parse { message: String },

    #[error("Provider unavailable or rate limited: {message}")]
    RateLimit {
        status: Option<u16>,
        message: String,
    },
}

impl AnalysisError {
    /// Stable kind name used in logs and tool responses.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::Timeout { .. } => "AnalysisTimeoutError",
            AnalysisError::Auth { .. } => "AnalysisAuthError",
            AnalysisError::Parse { .. } => "AnalysisParseError",
            AnalysisError::RateLimit { .. } => "AnalysisRateLimitError",
        }
    }

    /// Shorthand for a parse failure.
    pub fn parse(message: impl Into<String>) -> Self {
        AnalysisError::Parse {
            message: message.into(),
        }
    }
}

/// MCP protocol errors
#[derive(Debug, Error)]
pub enum McpError {
    #[error("Unknown tool: {tool_name}")]
    UnknownTool { tool_name: String },

    #[error("Invalid parameters for {tool_name}: {message}")]
    InvalidParameters { tool_name: String, message: String },

    #[error("Tool execution failed: {message}")]
    ExecutionFailed { message: String },

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Tool-specific errors with structured details
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Validation failed: {field} - {reason}")]
    Validation { field: String, reason: String },
}

/// Result type alias for application errors
pub type AppResult<T> = Result<T, AppError>;

/// Result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type alias for a single analysis attempt
pub type AnalysisResult<T> = Result<T, AnalysisError>;

/// Result type alias for MCP operations
pub type McpResult<T> = Result<T, McpError>;
