//! Language-model ticket analysis.
//!
//! [`LlmAnalyzer`] builds the prompt, makes one chat completion call and
//! turns the reply into a [`TicketAnalysis`] with [`parse_analysis`]. The
//! reply is untrusted input: anything missing, mistyped or out of range is
//! rejected as a parse error, never patched up with defaults.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt::Write as _;
use tracing::debug;

use super::roster::AgentRoster;
use super::types::{
    Availability, Score, SimilarTicket, SuggestedProcessor, TicketAnalysis, MAX_INSIGHTS,
    MAX_SELF_FIX_SUGGESTIONS, MAX_SIMILAR_TICKETS,
};
use crate::error::{AnalysisError, AnalysisResult};
use crate::llm::{ChatMessage, OpenAiClient};
use crate::prompts::{ANALYSIS_RESPONSE_FORMAT, TRIAGE_SYSTEM_PROMPT};
use crate::storage::{Priority, Ticket};

/// One analysis attempt for a ticket given a history sample.
///
/// Implementations make at most one outbound call and never truncate
/// `history`; the caller decides how much context to pass.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketAnalyzer: Send + Sync {
    /// Analyze `ticket` using `history` as similarity context.
    async fn analyze(&self, ticket: &Ticket, history: &[Ticket]) -> AnalysisResult<TicketAnalysis>;
}

/// [`TicketAnalyzer`] backed by an OpenAI-compatible chat model.
#[derive(Clone)]
pub struct LlmAnalyzer {
    client: OpenAiClient,
    roster: AgentRoster,
}

impl LlmAnalyzer {
    /// Create an analyzer routing to the given roster
    pub fn new(client: OpenAiClient, roster: AgentRoster) -> Self {
        Self { client, roster }
    }

    /// System and user messages for one ticket.
    pub fn build_messages(&self, ticket: &Ticket, history: &[Ticket]) -> Vec<ChatMessage> {
        vec![
            ChatMessage::system(TRIAGE_SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(ticket, history, &self.roster)),
        ]
    }
}

#[async_trait]
impl TicketAnalyzer for LlmAnalyzer {
    async fn analyze(&self, ticket: &Ticket, history: &[Ticket]) -> AnalysisResult<TicketAnalysis> {
        debug!(
            ticket_id = %ticket.id,
            history = history.len(),
            "Requesting AI ticket analysis"
        );

        let messages = self.build_messages(ticket, history);
        let completion = self.client.complete(messages).await?;
        parse_analysis(&completion)
    }
}

fn build_user_prompt(ticket: &Ticket, history: &[Ticket], roster: &AgentRoster) -> String {
    let mut prompt = String::from("Analyze this IT support ticket.\n\nTicket:\n");

    // Writing into a String cannot fail.
    let _ = writeln!(prompt, "- Title: {}", ticket.title);
    let _ = writeln!(prompt, "- Description: {}", ticket.description);
    let _ = writeln!(prompt, "- Category: {}", ticket.category);
    let _ = writeln!(
        prompt,
        "- Priority: {}",
        ticket.priority.map(|p| p.as_str()).unwrap_or("not set")
    );
    if let Some(department) = &ticket.department {
        let _ = writeln!(prompt, "- Department: {}", department);
    }
    match (&ticket.requester_name, &ticket.requester_email) {
        (Some(name), Some(email)) => {
            let _ = writeln!(prompt, "- Requester: {} <{}>", name, email);
        }
        (Some(name), None) => {
            let _ = writeln!(prompt, "- Requester: {}", name);
        }
        (None, Some(email)) => {
            let _ = writeln!(prompt, "- Requester: {}", email);
        }
        (None, None) => {}
    }

    let _ = write!(prompt, "\nAgents:\n{}\n", roster.summary());

    let _ = writeln!(prompt, "\nHistorical tickets ({}):", history.len());
    if history.is_empty() {
        prompt.push_str("- none\n");
    }
    for past in history {
        let _ = writeln!(
            prompt,
            "- {} | resolution: {}",
            past.title,
            past.resolution.as_deref().unwrap_or("unresolved")
        );
    }

    prompt.push('\n');
    prompt.push_str(ANALYSIS_RESPONSE_FORMAT);
    prompt
}

/// Extract the JSON object from a completion (raw, or inside a code fence).
pub(crate) fn extract_json(completion: &str) -> Result<&str, String> {
    let trimmed = completion.trim();
    if trimmed.starts_with('{') {
        return Ok(trimmed);
    }

    if completion.contains("```json") {
        return completion
            .split("```json")
            .nth(1)
            .and_then(|s| s.split("```").next())
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ```json block but content was empty or malformed".to_string());
    }

    if completion.contains("```") {
        return completion
            .split("```")
            .nth(1)
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| "Found ``` block but content was empty or malformed".to_string());
    }

    Err(format!(
        "No JSON found in response. First 100 chars: '{}'",
        completion.chars().take(100).collect::<String>()
    ))
}

#[derive(Debug, Deserialize)]
struct RawAnalysis {
    #[serde(alias = "suggestedProcessor")]
    suggested_processor: Option<RawProcessor>,
    #[serde(alias = "selfFixSuggestions")]
    self_fix_suggestions: Option<Vec<String>>,
    #[serde(alias = "categoryConfidence")]
    category_confidence: Option<f64>,
    #[serde(alias = "priorityRecommendation")]
    priority_recommendation: Option<String>,
    #[serde(alias = "similarTickets")]
    similar_tickets: Option<Vec<RawSimilarTicket>>,
    #[serde(alias = "estimatedResolutionTime")]
    estimated_resolution_time: Option<String>,
    #[serde(alias = "additionalInsights")]
    additional_insights: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawProcessor {
    name: Option<String>,
    reason: Option<String>,
    #[serde(alias = "confidenceScore")]
    confidence_score: Option<f64>,
    #[serde(alias = "matchedSkills")]
    matched_skills: Option<Vec<String>>,
    availability: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSimilarTicket {
    title: Option<String>,
    #[serde(alias = "similarityScore")]
    similarity_score: Option<f64>,
    #[serde(alias = "resolutionApproach")]
    resolution_approach: Option<String>,
}

fn required<T>(value: Option<T>, field: &str) -> AnalysisResult<T> {
    value.ok_or_else(|| AnalysisError::parse(format!("missing field {}", field)))
}

fn required_text(value: Option<String>, field: &str) -> AnalysisResult<String> {
    let text = required(value, field)?;
    if text.trim().is_empty() {
        return Err(AnalysisError::parse(format!("field {} is empty", field)));
    }
    Ok(text)
}

fn score(value: Option<f64>, field: &str) -> AnalysisResult<Score> {
    Score::new(required(value, field)?)
        .map_err(|e| AnalysisError::parse(format!("field {}: {}", field, e)))
}

fn bounded<T>(value: Option<Vec<T>>, field: &str, max: usize) -> AnalysisResult<Vec<T>> {
    let list = required(value, field)?;
    if list.len() > max {
        return Err(AnalysisError::parse(format!(
            "field {} has {} entries (max {})",
            field,
            list.len(),
            max
        )));
    }
    Ok(list)
}

/// Validate a model completion into a [`TicketAnalysis`].
///
/// Every field must be present with the right type; scores must lie in
/// `[0, 1]`, availability must be a known value, the priority recommendation
/// must start with a priority level and lists must respect their caps.
/// Similar tickets are put in most-similar-first order.
pub fn parse_analysis(completion: &str) -> AnalysisResult<TicketAnalysis> {
    let json = extract_json(completion).map_err(AnalysisError::parse)?;
    let raw: RawAnalysis = serde_json::from_str(json)
        .map_err(|e| AnalysisError::parse(format!("Invalid analysis JSON: {}", e)))?;

    let processor = required(raw.suggested_processor, "suggested_processor")?;
    let availability_text = required(processor.availability, "suggested_processor.availability")?;
    let availability: Availability = availability_text
        .parse()
        .map_err(|e| AnalysisError::parse(format!("field suggested_processor.availability: {}", e)))?;

    let suggested_processor = SuggestedProcessor {
        name: required_text(processor.name, "suggested_processor.name")?,
        reason: required_text(processor.reason, "suggested_processor.reason")?,
        confidence_score: score(
            processor.confidence_score,
            "suggested_processor.confidence_score",
        )?,
        matched_skills: required(processor.matched_skills, "suggested_processor.matched_skills")?,
        availability,
    };

    let priority_recommendation =
        required_text(raw.priority_recommendation, "priority_recommendation")?;
    recommended_priority(&priority_recommendation).ok_or_else(|| {
        AnalysisError::parse(format!(
            "priority_recommendation does not start with a priority level: {:?}",
            priority_recommendation
        ))
    })?;

    let mut similar_tickets = bounded(raw.similar_tickets, "similar_tickets", MAX_SIMILAR_TICKETS)?
        .into_iter()
        .map(|t| {
            Ok(SimilarTicket {
                title: required_text(t.title, "similar_tickets.title")?,
                similarity_score: score(t.similarity_score, "similar_tickets.similarity_score")?,
                resolution_approach: required(
                    t.resolution_approach,
                    "similar_tickets.resolution_approach",
                )?,
            })
        })
        .collect::<AnalysisResult<Vec<_>>>()?;
    similar_tickets.sort_by(|a, b| b.similarity_score.value().total_cmp(&a.similarity_score.value()));

    Ok(TicketAnalysis {
        suggested_processor,
        self_fix_suggestions: bounded(
            raw.self_fix_suggestions,
            "self_fix_suggestions",
            MAX_SELF_FIX_SUGGESTIONS,
        )?,
        category_confidence: score(raw.category_confidence, "category_confidence")?,
        priority_recommendation,
        similar_tickets,
        estimated_resolution_time: required_text(
            raw.estimated_resolution_time,
            "estimated_resolution_time",
        )?,
        additional_insights: bounded(raw.additional_insights, "additional_insights", MAX_INSIGHTS)?,
    })
}

/// Priority level a recommendation starts with.
pub fn recommended_priority(recommendation: &str) -> Option<Priority> {
    recommendation
        .split(|c: char| !c.is_alphabetic())
        .find(|word| !word.is_empty())
        .and_then(|word| word.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::{json, Value};

    fn valid_json() -> Value {
        json!({
            "suggested_processor": {
                "name": "Bob Smith",
                "reason": "Network specialist with VPN experience",
                "confidence_score": 0.85,
                "matched_skills": ["Network", "VPN"],
                "availability": "Available"
            },
            "self_fix_suggestions": ["Restart the VPN client", "Check your internet connection"],
            "category_confidence": 0.9,
            "priority_recommendation": "medium - Single user affected with a workaround",
            "similar_tickets": [
                {"title": "VPN error 807", "similarity_score": 0.6, "resolution_approach": "Reset VPN profile"},
                {"title": "VPN drops at home", "similarity_score": 0.8, "resolution_approach": "Updated client"}
            ],
            "estimated_resolution_time": "2-4 hours",
            "additional_insights": ["Error 807 usually points to a blocked port"]
        })
    }

    fn without(path: &[&str]) -> String {
        let mut value = valid_json();
        let (last, parents) = path.split_last().unwrap();
        let mut target = &mut value;
        for p in parents {
            target = target.get_mut(*p).unwrap();
        }
        target.as_object_mut().unwrap().remove(*last);
        value.to_string()
    }

    fn with(path: &[&str], replacement: Value) -> String {
        let mut value = valid_json();
        let mut target = &mut value;
        for p in path {
            target = target.get_mut(*p).unwrap();
        }
        *target = replacement;
        value.to_string()
    }

    fn assert_parse_error(completion: &str) {
        let err = parse_analysis(completion).unwrap_err();
        assert_eq!(err.kind(), "AnalysisParseError", "unexpected error: {}", err);
    }

    #[test]
    fn test_parse_valid_analysis() {
        let analysis = parse_analysis(&valid_json().to_string()).unwrap();

        assert_eq!(analysis.suggested_processor.name, "Bob Smith");
        assert_eq!(analysis.suggested_processor.availability, Availability::Available);
        assert_eq!(analysis.suggested_processor.confidence_score.value(), 0.85);
        assert_eq!(analysis.category_confidence.value(), 0.9);
        assert_eq!(analysis.self_fix_suggestions.len(), 2);
        assert_eq!(analysis.estimated_resolution_time, "2-4 hours");
    }

    #[test]
    fn test_parse_orders_similar_tickets() {
        let analysis = parse_analysis(&valid_json().to_string()).unwrap();
        let titles: Vec<&str> = analysis
            .similar_tickets
            .iter()
            .map(|t| t.title.as_str())
            .collect();
        assert_eq!(titles, vec!["VPN drops at home", "VPN error 807"]);
    }

    #[test]
    fn test_parse_fenced_json() {
        let completion = format!("Here you go:\n```json\n{}\n```", valid_json());
        assert!(parse_analysis(&completion).is_ok());

        let completion = format!("```\n{}\n```", valid_json());
        assert!(parse_analysis(&completion).is_ok());
    }

    #[test]
    fn test_parse_accepts_camel_case_keys() {
        let completion = json!({
            "suggestedProcessor": {
                "name": "Alice Johnson",
                "reason": "Outlook specialist",
                "confidenceScore": 0.7,
                "matchedSkills": ["Email"],
                "availability": "busy"
            },
            "selfFixSuggestions": [],
            "categoryConfidence": 0.5,
            "priorityRecommendation": "Low: cosmetic issue",
            "similarTickets": [],
            "estimatedResolutionTime": "1-2 business days",
            "additionalInsights": []
        })
        .to_string();
        let analysis = parse_analysis(&completion).unwrap();
        assert_eq!(analysis.suggested_processor.availability, Availability::Busy);
    }

    #[test]
    fn test_parse_missing_priority_recommendation() {
        let err = parse_analysis(&without(&["priority_recommendation"])).unwrap_err();
        assert_eq!(err.kind(), "AnalysisParseError");
        assert!(err.to_string().contains("priority_recommendation"));
    }

    #[test]
    fn test_parse_rejects_every_missing_field() {
        for field in [
            "suggested_processor",
            "self_fix_suggestions",
            "category_confidence",
            "priority_recommendation",
            "similar_tickets",
            "estimated_resolution_time",
            "additional_insights",
        ] {
            assert_parse_error(&without(&[field]));
        }
        for field in ["name", "reason", "confidence_score", "matched_skills", "availability"] {
            assert_parse_error(&without(&["suggested_processor", field]));
        }
    }

    #[test]
    fn test_parse_rejects_out_of_range_scores() {
        assert_parse_error(&with(&["category_confidence"], json!(1.2)));
        assert_parse_error(&with(&["suggested_processor", "confidence_score"], json!(-0.1)));
        assert_parse_error(&with(
            &["similar_tickets"],
            json!([{"title": "x", "similarity_score": 7, "resolution_approach": "y"}]),
        ));
    }

    #[test]
    fn test_parse_rejects_wrong_types() {
        assert_parse_error(&with(&["category_confidence"], json!("high")));
        assert_parse_error(&with(&["self_fix_suggestions"], json!("reboot")));
        assert_parse_error(&with(&["suggested_processor"], json!("Bob")));
    }

    #[test]
    fn test_parse_rejects_unknown_availability() {
        assert_parse_error(&with(
            &["suggested_processor", "availability"],
            json!("On holiday"),
        ));
    }

    #[test]
    fn test_parse_rejects_overlong_lists() {
        assert_parse_error(&with(&["self_fix_suggestions"], json!(vec!["step"; 7])));
        assert_parse_error(&with(&["additional_insights"], json!(vec!["note"; 6])));
        let similar: Vec<Value> = (0..6)
            .map(|i| json!({"title": format!("t{}", i), "similarity_score": 0.5, "resolution_approach": "r"}))
            .collect();
        assert_parse_error(&with(&["similar_tickets"], Value::Array(similar)));
    }

    #[test]
    fn test_parse_rejects_priority_without_level() {
        assert_parse_error(&with(
            &["priority_recommendation"],
            json!("Please handle soon"),
        ));
        assert_parse_error(&with(&["priority_recommendation"], json!("   ")));
    }

    #[test]
    fn test_parse_rejects_non_json() {
        assert_parse_error("I think this ticket is about the VPN.");
        assert_parse_error("{ not json");
        assert_parse_error("```json\n```");
    }

    #[test]
    fn test_recommended_priority() {
        assert_eq!(recommended_priority("high - users blocked"), Some(Priority::High));
        assert_eq!(recommended_priority("Critical: outage"), Some(Priority::Critical));
        assert_eq!(recommended_priority("soon"), None);
        assert_eq!(recommended_priority(""), None);
    }

    #[test]
    fn test_user_prompt_contents() {
        let ticket = Ticket::new("VPN won't connect", "error 807")
            .with_priority(Priority::High)
            .with_department("Finance")
            .with_requester("Jane Doe", "jane@example.com");
        let history = vec![
            Ticket::new("VPN error 807", "blocked port").resolved("Opened port 1723"),
            Ticket::new("Printer jam", "tray 2"),
        ];
        let prompt = build_user_prompt(&ticket, &history, &AgentRoster::default());

        assert!(prompt.contains("- Title: VPN won't connect"));
        assert!(prompt.contains("- Priority: high"));
        assert!(prompt.contains("- Department: Finance"));
        assert!(prompt.contains("- Requester: Jane Doe <jane@example.com>"));
        assert!(prompt.contains("Historical tickets (2):"));
        assert!(prompt.contains("- VPN error 807 | resolution: Opened port 1723"));
        assert!(prompt.contains("- Printer jam | resolution: unresolved"));
        // history descriptions stay out of the prompt
        assert!(!prompt.contains("blocked port"));
        assert!(prompt.contains("Bob Smith"));
        assert!(prompt.ends_with(ANALYSIS_RESPONSE_FORMAT));
    }

    #[test]
    fn test_user_prompt_without_history() {
        let prompt = build_user_prompt(&Ticket::default(), &[], &AgentRoster::default());
        assert!(prompt.contains("- Priority: not set"));
        assert!(prompt.contains("Historical tickets (0):\n- none"));
        assert!(!prompt.contains("Requester"));
    }
}
