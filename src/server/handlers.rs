use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use super::SharedState;
use crate::chatbot::ChatbotMessage;
use crate::error::{McpError, McpResult, ToolError};
use crate::knowledge::{self, NewKbArticle, RecommendationBasis};
use crate::storage::{
    Category, NewTicket, Priority, Status, Storage, StoredAnalysis, Ticket, TicketFilter,
    TicketUpdate,
};
use crate::triage::{orchestrator::HISTORY_UNAVAILABLE, AnalysisSource, Fallback, TicketAnalysis};

/// Largest page `ticket_list` and `kb_list` will return.
pub const MAX_LIST_LIMIT: u32 = 100;

/// Route tool calls to appropriate handlers
pub async fn handle_tool_call(
    state: &SharedState,
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<Value> {
    info!(tool = %tool_name, "Routing tool call");

    match tool_name {
        // Ticket store
        "ticket_create" => handle_ticket_create(state, arguments).await,
        "ticket_get" => handle_ticket_get(state, arguments).await,
        "ticket_list" => handle_ticket_list(state, arguments).await,
        "ticket_update" => handle_ticket_update(state, arguments).await,
        "ticket_resolve" => handle_ticket_resolve(state, arguments).await,
        // Triage
        "triage_analyze" => handle_triage_analyze(state, arguments).await,
        "triage_classify" => handle_triage_classify(state, arguments).await,
        "triage_latest" => handle_triage_latest(state, arguments).await,
        "triage_config" => handle_triage_config(state),
        // Knowledge base
        "kb_create" => handle_kb_create(state, arguments).await,
        "kb_get" => handle_kb_get(state, arguments).await,
        "kb_list" => handle_kb_list(state, arguments).await,
        "kb_search" => handle_kb_search(state, arguments).await,
        "kb_recommend" => handle_kb_recommend(state, arguments).await,
        // Chatbot
        "chatbot_message" => handle_chatbot_message(state, arguments).await,
        _ => Err(McpError::UnknownTool {
            tool_name: tool_name.to_string(),
        }),
    }
}

// ============================================================================
// Ticket handlers
// ============================================================================

/// Create a ticket; an absent category is filled in by the keyword classifier.
async fn handle_ticket_create(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: NewTicket = parse_arguments("ticket_create", arguments)?;

    let fallback_category = match params.category {
        Some(category) => category,
        None => {
            let draft = Ticket::new(params.title.as_str(), params.description.as_str());
            state.triage.heuristic().classify(&draft).category
        }
    };

    let ticket = params
        .into_ticket(fallback_category)
        .map_err(|e| invalid_parameters("ticket_create", e))?;

    state
        .storage
        .create_ticket(&ticket)
        .await
        .map_err(execution_failed)?;

    info!(ticket_id = %ticket.id, category = %ticket.category, "Ticket created");
    serde_json::to_value(ticket).map_err(McpError::Json)
}

#[derive(Debug, Deserialize)]
struct TicketIdParams {
    ticket_id: String,
}

async fn handle_ticket_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: TicketIdParams = parse_arguments("ticket_get", arguments)?;
    let ticket = load_ticket(state, &params.ticket_id).await?;
    serde_json::to_value(ticket).map_err(McpError::Json)
}

async fn handle_ticket_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let filter: TicketFilter = match arguments {
        Some(args) => parse_arguments("ticket_list", Some(args))?,
        None => TicketFilter::default(),
    };

    check_limit("ticket_list", filter.limit)?;

    let tickets = state
        .storage
        .list_tickets(&filter)
        .await
        .map_err(execution_failed)?;

    Ok(serde_json::json!({
        "count": tickets.len(),
        "tickets": tickets,
    }))
}

/// Handle ticket_update - change status, assignment, category or priority
async fn handle_ticket_update(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct UpdateParams {
        ticket_id: String,
        #[serde(flatten)]
        update: TicketUpdate,
    }

    let params: UpdateParams = parse_arguments("ticket_update", arguments)?;
    let ticket = apply_update(state, "ticket_update", &params.ticket_id, params.update).await?;

    info!(ticket_id = %ticket.id, status = %ticket.status, "Ticket updated");
    serde_json::to_value(ticket).map_err(McpError::Json)
}

/// Handle ticket_resolve - close out a ticket with a resolution
async fn handle_ticket_resolve(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ResolveParams {
        ticket_id: String,
        resolution: String,
        #[serde(default)]
        assigned_to: Option<String>,
    }

    let params: ResolveParams = parse_arguments("ticket_resolve", arguments)?;
    let update = TicketUpdate {
        status: Some(Status::Resolved),
        resolution: Some(params.resolution),
        assigned_to: params.assigned_to,
        ..Default::default()
    };
    let ticket = apply_update(state, "ticket_resolve", &params.ticket_id, update).await?;

    info!(ticket_id = %ticket.id, "Ticket resolved");
    serde_json::to_value(ticket).map_err(McpError::Json)
}

async fn apply_update(
    state: &SharedState,
    tool_name: &str,
    ticket_id: &str,
    update: TicketUpdate,
) -> McpResult<Ticket> {
    update
        .validate()
        .map_err(|e| invalid_parameters(tool_name, e))?;
    let current = load_ticket(state, ticket_id).await?;
    let ticket = update
        .apply(current)
        .map_err(|e| invalid_parameters(tool_name, e))?;

    state
        .storage
        .update_ticket(&ticket)
        .await
        .map_err(execution_failed)?;
    Ok(ticket)
}

// ============================================================================
// Triage handlers
// ============================================================================

/// A stored ticket by id, or an inline ticket.
#[derive(Debug, Deserialize)]
struct TicketRef {
    #[serde(default)]
    ticket_id: Option<String>,
    #[serde(default)]
    ticket: Option<Ticket>,
}

impl TicketRef {
    /// Resolve to a ticket; the id is returned only for stored tickets.
    async fn resolve(
        self,
        state: &SharedState,
        tool_name: &str,
    ) -> McpResult<(Ticket, Option<String>)> {
        match (self.ticket_id, self.ticket) {
            (Some(id), None) => {
                let ticket = load_ticket(state, &id).await?;
                Ok((ticket, Some(id)))
            }
            (None, Some(ticket)) => Ok((ticket, None)),
            (Some(_), Some(_)) => Err(McpError::InvalidParameters {
                tool_name: tool_name.to_string(),
                message: "Provide either ticket_id or ticket, not both".to_string(),
            }),
            (None, None) => Err(McpError::InvalidParameters {
                tool_name: tool_name.to_string(),
                message: "Provide ticket_id or ticket".to_string(),
            }),
        }
    }
}

/// Response of `triage_analyze`.
#[derive(Debug, Serialize)]
pub struct AnalyzeResponse {
    /// Id of the stored ticket, absent for inline tickets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticket_id: Option<String>,
    /// Which path produced the analysis.
    pub source: AnalysisSource,
    /// Why the AI path was abandoned, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
    /// Id of the stored analysis when `persist` was requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
    /// The analysis.
    pub analysis: TicketAnalysis,
}

/// Handle triage_analyze - full triage, AI first with heuristic fallback
async fn handle_triage_analyze(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct AnalyzeParams {
        #[serde(flatten)]
        target: TicketRef,
        #[serde(default)]
        persist: bool,
    }

    let params: AnalyzeParams = parse_arguments("triage_analyze", arguments)?;
    let (ticket, ticket_id) = params.target.resolve(state, "triage_analyze").await?;

    if params.persist && ticket_id.is_none() {
        return Err(McpError::InvalidParameters {
            tool_name: "triage_analyze".to_string(),
            message: "persist requires a stored ticket (ticket_id)".to_string(),
        });
    }

    let outcome = state.triage.triage(&ticket, &state.storage).await;

    let analysis_id = match (&ticket_id, params.persist) {
        (Some(id), true) => {
            let stored = StoredAnalysis::new(id, outcome.source, outcome.analysis.clone());
            state
                .storage
                .save_analysis(&stored)
                .await
                .map_err(execution_failed)?;
            Some(stored.id)
        }
        _ => None,
    };

    let response = AnalyzeResponse {
        ticket_id,
        source: outcome.source,
        fallback: outcome.fallback,
        analysis_id,
        analysis: outcome.analysis,
    };
    serde_json::to_value(response).map_err(McpError::Json)
}

/// Handle triage_classify - keyword classification only, never leaves the process
///
/// Similar tickets come from the store when it can be read; otherwise the
/// analysis is produced without them.
async fn handle_triage_classify(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ClassifyParams {
        #[serde(flatten)]
        target: TicketRef,
        #[serde(default)]
        update_category: bool,
    }

    let params: ClassifyParams = parse_arguments("triage_classify", arguments)?;
    let (mut ticket, ticket_id) = params.target.resolve(state, "triage_classify").await?;

    if params.update_category && ticket_id.is_none() {
        return Err(McpError::InvalidParameters {
            tool_name: "triage_classify".to_string(),
            message: "update_category requires a stored ticket (ticket_id)".to_string(),
        });
    }

    let history = match state
        .storage
        .list_recent_tickets(state.triage.history_sample_cap())
        .await
    {
        Ok(history) => history,
        Err(e) => {
            warn!(
                kind = HISTORY_UNAVAILABLE,
                error = %e,
                "Ticket history unavailable, classifying without similar tickets"
            );
            Vec::new()
        }
    };

    let heuristic = state.triage.heuristic();
    let classification = heuristic.classify(&ticket);
    let analysis = heuristic.analyze_with_history(&ticket, &history);

    if params.update_category && ticket.category != classification.category {
        ticket.category = classification.category;
        ticket.updated_at = chrono::Utc::now();
        state
            .storage
            .update_ticket(&ticket)
            .await
            .map_err(execution_failed)?;
        info!(ticket_id = %ticket.id, category = %ticket.category, "Ticket recategorized");
    }

    Ok(serde_json::json!({
        "ticket_id": ticket_id,
        "source": AnalysisSource::Heuristic,
        "category": classification.category,
        "priority": classification.priority,
        "matched_keywords": classification.matched_keywords,
        "analysis": analysis,
    }))
}

async fn handle_triage_latest(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: TicketIdParams = parse_arguments("triage_latest", arguments)?;

    let latest = state
        .storage
        .get_latest_analysis(&params.ticket_id)
        .await
        .map_err(execution_failed)?;

    serde_json::to_value(latest).map_err(McpError::Json)
}

/// Handle triage_config - non-secret view of the triage configuration
fn handle_triage_config(state: &SharedState) -> McpResult<Value> {
    let (model, base_url) = match &state.config.ai {
        crate::config::AiMode::Enabled(openai) => {
            (Some(openai.model.clone()), Some(openai.base_url.clone()))
        }
        crate::config::AiMode::Disabled => (None, None),
    };

    let agents: Vec<Value> = state
        .triage
        .heuristic()
        .roster()
        .agents()
        .iter()
        .map(|a| {
            serde_json::json!({
                "name": a.name,
                "skills": a.skills,
                "availability": a.availability,
            })
        })
        .collect();

    Ok(serde_json::json!({
        "ai_enabled": state.triage.ai_enabled(),
        "model": model,
        "base_url": base_url,
        "request_timeout_ms": state.config.request.timeout_ms,
        "history_sample_cap": state.triage.history_sample_cap(),
        "categories": Category::ALL,
        "priorities": [Priority::Low, Priority::Medium, Priority::High, Priority::Critical],
        "statuses": [Status::Open, Status::InProgress, Status::Resolved, Status::Closed],
        "agents": agents,
        "chatbot_ai_enabled": state.chatbot.ai_enabled(),
    }))
}

// ============================================================================
// Knowledge base handlers
// ============================================================================

async fn handle_kb_create(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let params: NewKbArticle = parse_arguments("kb_create", arguments)?;
    let article = params
        .into_article()
        .map_err(|e| invalid_parameters("kb_create", e))?;

    state
        .storage
        .create_article(&article)
        .await
        .map_err(execution_failed)?;

    info!(article_id = %article.id, category = %article.category, "Article created");
    serde_json::to_value(article).map_err(McpError::Json)
}

/// Handle kb_get - fetch an article and count the view
async fn handle_kb_get(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ArticleIdParams {
        article_id: String,
    }

    let params: ArticleIdParams = parse_arguments("kb_get", arguments)?;
    let mut article = state
        .storage
        .get_article(&params.article_id)
        .await
        .map_err(execution_failed)?
        .ok_or_else(|| McpError::ExecutionFailed {
            message: format!("Article not found: {}", params.article_id),
        })?;

    state
        .storage
        .record_article_view(&article.id)
        .await
        .map_err(execution_failed)?;
    article.views += 1;

    serde_json::to_value(article).map_err(McpError::Json)
}

async fn handle_kb_list(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct ListParams {
        #[serde(default)]
        category: Option<Category>,
        #[serde(default = "default_kb_list_limit")]
        limit: u32,
    }

    let params: ListParams = match arguments {
        Some(args) => parse_arguments("kb_list", Some(args))?,
        None => ListParams {
            category: None,
            limit: default_kb_list_limit(),
        },
    };
    check_limit("kb_list", params.limit)?;

    let articles = state
        .storage
        .list_articles(params.category, params.limit as usize)
        .await
        .map_err(execution_failed)?;

    Ok(serde_json::json!({
        "count": articles.len(),
        "articles": articles,
    }))
}

fn default_kb_list_limit() -> u32 {
    20
}

/// Handle kb_search - keyword-ranked article search
async fn handle_kb_search(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize)]
    struct SearchParams {
        query: String,
        #[serde(default)]
        category: Option<Category>,
    }

    let params: SearchParams = parse_arguments("kb_search", arguments)?;
    if params.query.trim().is_empty() {
        return Err(invalid_parameters(
            "kb_search",
            ToolError::Validation {
                field: "query".to_string(),
                reason: "Query cannot be empty".to_string(),
            },
        ));
    }

    let articles = state
        .storage
        .list_articles(params.category, knowledge::SEARCH_SCAN_LIMIT)
        .await
        .map_err(execution_failed)?;
    let matches = knowledge::search(articles, &params.query, knowledge::MAX_ARTICLE_RESULTS);

    Ok(serde_json::json!({
        "query": params.query,
        "count": matches.len(),
        "articles": matches,
    }))
}

/// Handle kb_recommend - articles for a ticket, or the most viewed ones
async fn handle_kb_recommend(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    #[derive(Deserialize, Default)]
    struct RecommendParams {
        #[serde(default)]
        ticket_id: Option<String>,
    }

    let params: RecommendParams = match arguments {
        Some(args) => parse_arguments("kb_recommend", Some(args))?,
        None => RecommendParams::default(),
    };

    let (basis, articles) = match &params.ticket_id {
        Some(id) => {
            let ticket = load_ticket(state, id).await?;
            let candidates = state
                .storage
                .list_articles(Some(ticket.category), knowledge::SEARCH_SCAN_LIMIT)
                .await
                .map_err(execution_failed)?;
            (
                RecommendationBasis::Category,
                knowledge::recommend_for(&ticket, candidates, knowledge::MAX_ARTICLE_RESULTS),
            )
        }
        None => {
            let candidates = state
                .storage
                .list_articles(None, knowledge::SEARCH_SCAN_LIMIT)
                .await
                .map_err(execution_failed)?;
            (
                RecommendationBasis::Popular,
                knowledge::popular(candidates, knowledge::MAX_ARTICLE_RESULTS),
            )
        }
    };

    Ok(serde_json::json!({
        "ticket_id": params.ticket_id,
        "basis": basis,
        "articles": articles,
    }))
}

// ============================================================================
// Chatbot handler
// ============================================================================

/// Handle chatbot_message - answer a user question
async fn handle_chatbot_message(state: &SharedState, arguments: Option<Value>) -> McpResult<Value> {
    let message: ChatbotMessage = parse_arguments("chatbot_message", arguments)?;
    if message.message.trim().is_empty() {
        return Err(invalid_parameters(
            "chatbot_message",
            ToolError::Validation {
                field: "message".to_string(),
                reason: "Message cannot be empty".to_string(),
            },
        ));
    }

    let reply = state.chatbot.reply(&message, &state.storage).await;
    serde_json::to_value(reply).map_err(McpError::Json)
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_ticket(state: &SharedState, ticket_id: &str) -> McpResult<Ticket> {
    state
        .storage
        .get_ticket(ticket_id)
        .await
        .map_err(execution_failed)?
        .ok_or_else(|| McpError::ExecutionFailed {
            message: format!("Ticket not found: {}", ticket_id),
        })
}

fn check_limit(tool_name: &str, limit: u32) -> McpResult<()> {
    if limit == 0 || limit > MAX_LIST_LIMIT {
        return Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: format!("limit must be between 1 and {}", MAX_LIST_LIMIT),
        });
    }
    Ok(())
}

fn execution_failed(e: impl std::fmt::Display) -> McpError {
    McpError::ExecutionFailed {
        message: e.to_string(),
    }
}

fn invalid_parameters(tool_name: &str, e: ToolError) -> McpError {
    McpError::InvalidParameters {
        tool_name: tool_name.to_string(),
        message: e.to_string(),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool_name: &str,
    arguments: Option<Value>,
) -> McpResult<T> {
    match arguments {
        Some(args) => serde_json::from_value(args).map_err(|e| McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: e.to_string(),
        }),
        None => Err(McpError::InvalidParameters {
            tool_name: tool_name.to_string(),
            message: "Missing arguments".to_string(),
        }),
    }
}
