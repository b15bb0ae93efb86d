//! Line-delimited JSON-RPC 2.0 over stdio, and the tool catalogue.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info};

use super::{handle_tool_call, SharedState};

#[cfg(test)]
#[path = "mcp_tests.rs"]
mod mcp_tests;

/// Incoming JSON-RPC message; no `id` means notification.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: Option<Value>,
    pub method: String,
    #[serde(default)]
    pub params: Option<Value>,
}

/// Outgoing JSON-RPC message. Exactly one of `result` and `error` is set.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    /// Echoed request id; null when the request could not be parsed.
    pub id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

/// JSON-RPC error object (-32700 parse, -32601 method, -32602 params, -32603 internal).
#[derive(Debug, Serialize)]
pub struct JsonRpcError {
    pub code: i32,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ServerInfo {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct Capabilities {
    pub tools: ToolCapabilities,
}

#[derive(Debug, Serialize)]
pub struct ToolCapabilities {
    /// The tool set is fixed for the life of the process.
    #[serde(rename = "listChanged")]
    pub list_changed: bool,
}

/// Reply to `initialize`.
#[derive(Debug, Serialize)]
pub struct InitializeResult {
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
    pub capabilities: Capabilities,
    #[serde(rename = "serverInfo")]
    pub server_info: ServerInfo,
}

/// One entry of `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct Tool {
    pub name: String,
    pub description: String,
    /// JSON Schema of the `arguments` object.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// `tools/call` params.
#[derive(Debug, Deserialize)]
pub struct ToolCallParams {
    pub name: String,
    #[serde(default)]
    pub arguments: Option<Value>,
}

/// Tool output is always a single text item holding pretty JSON or an error line.
#[derive(Debug, Serialize)]
pub struct ToolResultContent {
    #[serde(rename = "type")]
    pub content_type: String,
    pub text: String,
}

/// `tools/call` result; tool failures set `isError` instead of a JSON-RPC error.
#[derive(Debug, Serialize)]
pub struct ToolCallResult {
    pub content: Vec<ToolResultContent>,
    #[serde(rename = "isError", skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
}

impl JsonRpcResponse {
    pub fn success(id: Option<Value>, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: Option<Value>, code: i32, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".to_string(),
            id: id.unwrap_or(Value::Null),
            result: None,
            error: Some(JsonRpcError {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }
}

/// MCP server: one JSON-RPC message per line on stdin, one reply per line on stdout.
pub struct McpServer {
    state: SharedState,
}

impl McpServer {
    pub fn new(state: SharedState) -> Self {
        Self { state }
    }

    /// Serve until stdin closes.
    pub async fn run(&self) -> std::io::Result<()> {
        info!("Ticket triage MCP server starting...");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();
            let bytes_read = reader.read_line(&mut line).await?;

            if bytes_read == 0 {
                info!("EOF received, shutting down");
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            debug!(request = %trimmed, "Received request");

            let response = match serde_json::from_str::<JsonRpcRequest>(trimmed) {
                Ok(request) => self.handle_request(request).await,
                Err(e) => {
                    error!(error = %e, "Failed to parse request");
                    Some(JsonRpcResponse::error(
                        None,
                        -32700,
                        format!("Parse error: {}", e),
                    ))
                }
            };

            if let Some(response) = response {
                let response_json = serde_json::to_string(&response)?;
                debug!(response = %response_json, "Sending response");

                stdout.write_all(response_json.as_bytes()).await?;
                stdout.write_all(b"\n").await?;
                stdout.flush().await?;
            }
        }

        Ok(())
    }

    /// Dispatch one message; `None` means nothing is written back.
    pub async fn handle_request(&self, request: JsonRpcRequest) -> Option<JsonRpcResponse> {
        let is_notification = request.id.is_none();

        match request.method.as_str() {
            "initialize" => Some(self.handle_initialize(request.id)),
            "initialized" | "notifications/initialized" | "notifications/cancelled" => {
                debug!(method = %request.method, "Notification");
                None
            }
            "tools/list" => Some(self.handle_tools_list(request.id)),
            "tools/call" => Some(self.handle_tool_call(request.id, request.params).await),
            "ping" => Some(JsonRpcResponse::success(
                request.id,
                Value::Object(Default::default()),
            )),
            method => {
                if is_notification {
                    debug!(method = %method, "Unknown notification, ignoring");
                    None
                } else {
                    error!(method = %method, "Unknown method");
                    Some(JsonRpcResponse::error(
                        request.id,
                        -32601,
                        format!("Method not found: {}", method),
                    ))
                }
            }
        }
    }

    fn handle_initialize(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling initialize request");

        let result = InitializeResult {
            protocol_version: "2024-11-05".to_string(),
            capabilities: Capabilities {
                tools: ToolCapabilities {
                    list_changed: false,
                },
            },
            server_info: ServerInfo {
                name: "ticket-triage".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        match serde_json::to_value(result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize initialize result");
                JsonRpcResponse::error(id, -32603, format!("Internal error: {}", e))
            }
        }
    }

    fn handle_tools_list(&self, id: Option<Value>) -> JsonRpcResponse {
        info!("Handling tools/list request");

        JsonRpcResponse::success(
            id,
            serde_json::json!({
                "tools": tool_definitions()
            }),
        )
    }

    async fn handle_tool_call(&self, id: Option<Value>, params: Option<Value>) -> JsonRpcResponse {
        let params: ToolCallParams = match params {
            Some(p) => match serde_json::from_value(p) {
                Ok(p) => p,
                Err(e) => {
                    return JsonRpcResponse::error(id, -32602, format!("Invalid params: {}", e));
                }
            },
            None => {
                return JsonRpcResponse::error(id, -32602, "Missing params");
            }
        };

        info!(tool = %params.name, "Handling tool call");

        let (content, is_error) =
            match handle_tool_call(&self.state, &params.name, params.arguments).await {
                Ok(result) => {
                    let text = serde_json::to_string_pretty(&result).unwrap_or_else(|e| {
                        error!(error = %e, "Failed to serialize tool result");
                        format!("{{\"error\": \"Serialization failed: {}\"}}", e)
                    });
                    (
                        ToolResultContent {
                            content_type: "text".to_string(),
                            text,
                        },
                        None,
                    )
                }
                Err(e) => (
                    ToolResultContent {
                        content_type: "text".to_string(),
                        text: format!("Error: {}", e),
                    },
                    Some(true),
                ),
            };

        let tool_result = ToolCallResult {
            content: vec![content],
            is_error,
        };

        match serde_json::to_value(tool_result) {
            Ok(val) => JsonRpcResponse::success(id, val),
            Err(e) => {
                error!(error = %e, "Failed to serialize tool call result");
                JsonRpcResponse::error(id.clone(), -32603, format!("Internal error: {}", e))
            }
        }
    }
}

/// All tools exposed by the server.
pub fn tool_definitions() -> Vec<Tool> {
    vec![
        get_ticket_create_tool(),
        get_ticket_get_tool(),
        get_ticket_list_tool(),
        get_ticket_update_tool(),
        get_ticket_resolve_tool(),
        get_triage_analyze_tool(),
        get_triage_classify_tool(),
        get_triage_latest_tool(),
        get_triage_config_tool(),
        get_kb_create_tool(),
        get_kb_get_tool(),
        get_kb_list_tool(),
        get_kb_search_tool(),
        get_kb_recommend_tool(),
        get_chatbot_message_tool(),
    ]
}

fn category_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "enum": ["Hardware", "Software", "Network", "Email", "Access", "Security", "Other"]
    })
}

fn priority_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "enum": ["low", "medium", "high", "critical"]
    })
}

fn status_schema() -> Value {
    serde_json::json!({
        "type": "string",
        "enum": ["open", "in_progress", "resolved", "closed"]
    })
}

fn inline_ticket_schema() -> Value {
    serde_json::json!({
        "type": "object",
        "description": "Ticket to analyze without storing it",
        "properties": {
            "title": { "type": "string" },
            "description": { "type": "string" },
            "category": category_schema(),
            "priority": priority_schema(),
            "department": { "type": "string" },
            "requester_name": { "type": "string" },
            "requester_email": { "type": "string" }
        }
    })
}

/// Get the ticket creation tool definition
fn get_ticket_create_tool() -> Tool {
    Tool {
        name: "ticket_create".to_string(),
        description: "Create a support ticket. When no category is given it is inferred from the title and description.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "Short summary of the problem"
                },
                "description": {
                    "type": "string",
                    "description": "Full problem description"
                },
                "category": category_schema(),
                "priority": priority_schema(),
                "department": {
                    "type": "string",
                    "description": "Requesting department"
                },
                "requester_name": { "type": "string" },
                "requester_email": { "type": "string" }
            },
            "required": ["title"],
            "additionalProperties": false
        }),
    }
}

fn get_ticket_get_tool() -> Tool {
    Tool {
        name: "ticket_get".to_string(),
        description: "Fetch a ticket by id.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": {
                    "type": "string",
                    "description": "The ticket ID"
                }
            },
            "required": ["ticket_id"],
            "additionalProperties": false
        }),
    }
}

/// Get the ticket list tool definition
fn get_ticket_list_tool() -> Tool {
    Tool {
        name: "ticket_list".to_string(),
        description: "List tickets, newest first, optionally filtered by status and category."
            .to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "status": status_schema(),
                "category": category_schema(),
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Maximum tickets to return (default: 50)"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_ticket_update_tool() -> Tool {
    Tool {
        name: "ticket_update".to_string(),
        description: "Change a ticket's status, assignee, category or priority. A resolution is only accepted for resolved or closed tickets; reopening a ticket clears it.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": { "type": "string" },
                "status": status_schema(),
                "assigned_to": { "type": "string" },
                "category": category_schema(),
                "priority": priority_schema(),
                "resolution": { "type": "string" }
            },
            "required": ["ticket_id"],
            "additionalProperties": false
        }),
    }
}

fn get_ticket_resolve_tool() -> Tool {
    Tool {
        name: "ticket_resolve".to_string(),
        description: "Mark a ticket resolved and record how it was fixed. Resolved tickets feed the similar-ticket search.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": { "type": "string" },
                "resolution": {
                    "type": "string",
                    "description": "How the ticket was resolved"
                },
                "assigned_to": {
                    "type": "string",
                    "description": "Agent who resolved the ticket"
                }
            },
            "required": ["ticket_id", "resolution"],
            "additionalProperties": false
        }),
    }
}

/// Get the triage analysis tool definition
fn get_triage_analyze_tool() -> Tool {
    Tool {
        name: "triage_analyze".to_string(),
        description: "Triage a ticket: suggested agent, self-fix steps, priority, similar past tickets and resolution estimate. Uses the language model when configured and falls back to keyword rules otherwise.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": {
                    "type": "string",
                    "description": "ID of a stored ticket"
                },
                "ticket": inline_ticket_schema(),
                "persist": {
                    "type": "boolean",
                    "description": "Store the analysis with the ticket (requires ticket_id)"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_triage_classify_tool() -> Tool {
    Tool {
        name: "triage_classify".to_string(),
        description: "Keyword-only triage. Never calls the language model.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": {
                    "type": "string",
                    "description": "ID of a stored ticket"
                },
                "ticket": inline_ticket_schema(),
                "update_category": {
                    "type": "boolean",
                    "description": "Save the inferred category on the stored ticket (requires ticket_id)"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_triage_latest_tool() -> Tool {
    Tool {
        name: "triage_latest".to_string(),
        description: "Most recent stored analysis for a ticket, or null.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": { "type": "string" }
            },
            "required": ["ticket_id"],
            "additionalProperties": false
        }),
    }
}

fn get_triage_config_tool() -> Tool {
    Tool {
        name: "triage_config".to_string(),
        description: "Inspect the triage configuration: whether AI analysis is enabled, model, timeout, history sample size and agent roster.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {},
            "additionalProperties": false
        }),
    }
}

fn get_kb_create_tool() -> Tool {
    Tool {
        name: "kb_create".to_string(),
        description: "Add a knowledge-base article.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "title": { "type": "string" },
                "content": { "type": "string" },
                "category": category_schema(),
                "tags": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "author": { "type": "string" }
            },
            "required": ["title", "content", "author"],
            "additionalProperties": false
        }),
    }
}

fn get_kb_get_tool() -> Tool {
    Tool {
        name: "kb_get".to_string(),
        description: "Fetch a knowledge-base article and count the view.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "article_id": { "type": "string" }
            },
            "required": ["article_id"],
            "additionalProperties": false
        }),
    }
}

fn get_kb_list_tool() -> Tool {
    Tool {
        name: "kb_list".to_string(),
        description: "List knowledge-base articles, newest first.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "category": category_schema(),
                "limit": {
                    "type": "integer",
                    "minimum": 1,
                    "maximum": 100,
                    "description": "Maximum articles to return (default: 20)"
                }
            },
            "additionalProperties": false
        }),
    }
}

fn get_kb_search_tool() -> Tool {
    Tool {
        name: "kb_search".to_string(),
        description: "Search knowledge-base articles by keyword. Matches in the title rank above matches in the content, tags or category.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "query": { "type": "string" },
                "category": category_schema()
            },
            "required": ["query"],
            "additionalProperties": false
        }),
    }
}

fn get_kb_recommend_tool() -> Tool {
    Tool {
        name: "kb_recommend".to_string(),
        description: "Articles for a ticket's category, or the most viewed articles when no ticket is given.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "ticket_id": { "type": "string" }
            },
            "additionalProperties": false
        }),
    }
}

fn get_chatbot_message_tool() -> Tool {
    Tool {
        name: "chatbot_message".to_string(),
        description: "Answer an end-user IT question. Suggests related knowledge-base articles and flags when a human agent should take over.".to_string(),
        input_schema: serde_json::json!({
            "type": "object",
            "properties": {
                "message": { "type": "string" },
                "user_id": { "type": "string" },
                "context": {
                    "type": "object",
                    "description": "Extra context passed to the model"
                }
            },
            "required": ["message"],
            "additionalProperties": false
        }),
    }
}
