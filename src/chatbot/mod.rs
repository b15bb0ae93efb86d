//! Support chatbot: a language-model reply grounded in knowledge-base
//! articles, with a canned reply whenever the model cannot answer.
//!
//! Escalation to a human agent is decided from the user's own words, so it
//! is the same whether or not the model answered.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::Write as _;
use tracing::{debug, info, warn};

use crate::config::{AiMode, Config};
use crate::error::AppResult;
use crate::knowledge::KbArticle;
use crate::llm::{ChatMessage, OpenAiClient};
use crate::prompts::CHATBOT_SYSTEM_PROMPT;
use crate::storage::ArticleProvider;
use crate::triage::{AnalysisSource, Fallback, Score};

/// Words in a user message that ask for a human.
pub const ESCALATION_KEYWORDS: [&str; 5] =
    ["complex", "urgent", "manager", "escalate", "human agent"];

/// Articles scanned for ones the message mentions.
pub const ARTICLE_SCAN_LIMIT: usize = 50;

/// Most articles suggested with a reply.
pub const MAX_ARTICLE_SUGGESTIONS: usize = 3;

/// Kind reported when the knowledge base could not be read.
pub const KNOWLEDGE_BASE_UNAVAILABLE: &str = "KnowledgeBaseUnavailableError";

const MODEL_REPLY_CONFIDENCE: f64 = 0.7;
const ARTICLE_REPLY_CONFIDENCE: f64 = 0.4;

const CANNED_REPLY: &str = "I apologize, but I'm having trouble processing your request right now. Would you like me to connect you with a human agent?";
const ARTICLE_REPLY: &str = "These knowledge base articles look related to your question. If they don't solve the problem, I can connect you with a human agent.";

/// A message from a user.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatbotMessage {
    pub message: String,
    #[serde(default)]
    pub user_id: Option<String>,
    /// Free-form context supplied by the client, passed to the model as is.
    #[serde(default)]
    pub context: Option<Value>,
}

impl ChatbotMessage {
    /// Message with no user or context
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }
}

/// The chatbot's answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatbotReply {
    pub response: String,
    pub suggestions: Vec<String>,
    pub escalate_to_human: bool,
    pub confidence: Score,
    /// `ai` when the model wrote the reply, `heuristic` otherwise.
    pub source: AnalysisSource,
    /// Set when the model was asked and failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
}

/// Whether the message asks for a human.
pub fn needs_escalation(message: &str) -> bool {
    let message = message.to_lowercase();
    ESCALATION_KEYWORDS.iter().any(|k| message.contains(k))
}

/// Answers user messages. Never fails.
#[derive(Clone, Default)]
pub struct ChatbotService {
    client: Option<OpenAiClient>,
}

impl std::fmt::Debug for ChatbotService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatbotService")
            .field("ai_enabled", &self.ai_enabled())
            .finish()
    }
}

impl ChatbotService {
    /// Chatbot that answers from the knowledge base only.
    pub fn offline() -> Self {
        Self { client: None }
    }

    /// Chatbot that asks `client` first.
    pub fn new(client: OpenAiClient) -> Self {
        Self {
            client: Some(client),
        }
    }

    /// Build from configuration, sharing the triage provider settings.
    pub fn from_config(config: &Config) -> AppResult<Self> {
        match &config.ai {
            AiMode::Enabled(openai) => Ok(Self::new(OpenAiClient::new(
                openai,
                config.request.clone(),
            )?)),
            AiMode::Disabled => Ok(Self::offline()),
        }
    }

    /// Whether replies come from the model.
    pub fn ai_enabled(&self) -> bool {
        self.client.is_some()
    }

    /// Reply to one message.
    pub async fn reply(
        &self,
        message: &ChatbotMessage,
        articles: &dyn ArticleProvider,
    ) -> ChatbotReply {
        let escalate_to_human = needs_escalation(&message.message);
        let related = related_articles(message, articles).await;
        let suggestions: Vec<String> = related
            .iter()
            .map(|a| format!("Check: {}", a.title))
            .collect();

        let client = match &self.client {
            Some(client) => client,
            None => return offline_reply(suggestions, escalate_to_human, None),
        };

        let messages = vec![
            ChatMessage::system(CHATBOT_SYSTEM_PROMPT),
            ChatMessage::user(build_user_prompt(message, &related)),
        ];

        match client.complete_text(messages).await {
            Ok(text) if !text.trim().is_empty() => {
                info!(
                    user_id = message.user_id.as_deref().unwrap_or("anonymous"),
                    escalate_to_human,
                    "Chatbot reply generated"
                );
                ChatbotReply {
                    response: text.trim().to_string(),
                    suggestions,
                    escalate_to_human,
                    confidence: Score::clamped(MODEL_REPLY_CONFIDENCE),
                    source: AnalysisSource::Ai,
                    fallback: None,
                }
            }
            Ok(_) => {
                let fallback = Fallback {
                    kind: "AnalysisParseError",
                    message: "Provider returned an empty reply".to_string(),
                };
                warn!(
                    kind = fallback.kind,
                    error = %fallback.message,
                    "Chatbot reply failed, using canned reply"
                );
                offline_reply(suggestions, escalate_to_human, Some(fallback))
            }
            Err(e) => {
                warn!(
                    kind = e.kind(),
                    error = %e,
                    "Chatbot reply failed, using canned reply"
                );
                offline_reply(
                    suggestions,
                    escalate_to_human,
                    Some(Fallback {
                        kind: e.kind(),
                        message: e.to_string(),
                    }),
                )
            }
        }
    }
}

/// Articles the message mentions by title or tag, newest first.
async fn related_articles(
    message: &ChatbotMessage,
    articles: &dyn ArticleProvider,
) -> Vec<KbArticle> {
    match articles.recent_articles(ARTICLE_SCAN_LIMIT).await {
        Ok(all) => all
            .into_iter()
            .filter(|a| a.mentioned_in(&message.message))
            .take(MAX_ARTICLE_SUGGESTIONS)
            .collect(),
        Err(e) => {
            warn!(
                kind = KNOWLEDGE_BASE_UNAVAILABLE,
                error = %e,
                "Knowledge base lookup failed, replying without articles"
            );
            Vec::new()
        }
    }
}

/// Reply used without a model, or after the model failed.
///
/// Related articles are offered when there are any. Otherwise, or when the
/// model failed, the user is offered a human agent.
fn offline_reply(
    article_suggestions: Vec<String>,
    escalate_to_human: bool,
    fallback: Option<Fallback>,
) -> ChatbotReply {
    if fallback.is_none() && !article_suggestions.is_empty() {
        debug!(articles = article_suggestions.len(), "Offline chatbot reply with articles");
        return ChatbotReply {
            response: ARTICLE_REPLY.to_string(),
            suggestions: article_suggestions,
            escalate_to_human,
            confidence: Score::clamped(ARTICLE_REPLY_CONFIDENCE),
            source: AnalysisSource::Heuristic,
            fallback: None,
        };
    }

    ChatbotReply {
        response: CANNED_REPLY.to_string(),
        suggestions: vec![
            "Contact human agent".to_string(),
            "Try rephrasing your question".to_string(),
        ],
        escalate_to_human: true,
        confidence: Score::clamped(0.0),
        source: AnalysisSource::Heuristic,
        fallback,
    }
}

fn build_user_prompt(message: &ChatbotMessage, related: &[KbArticle]) -> String {
    let mut prompt = format!("User message: {}\n", message.message.trim());

    if !related.is_empty() {
        prompt.push_str("\nRelated knowledge base articles:\n");
        for article in related {
            let _ = writeln!(prompt, "- {} ({})", article.title, article.category);
        }
    }

    if let Some(context) = &message.context {
        let _ = write!(prompt, "\nUser context: {}\n", context);
    }

    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::storage::{Category, MockArticleProvider};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn articles() -> Vec<KbArticle> {
        vec![
            KbArticle::new(
                "VPN error 807",
                "Open port 1723 on the router.",
                Category::Network,
                "Bob Smith",
            )
            .with_tags(["vpn"]),
            KbArticle::new(
                "Clearing a printer jam",
                "Remove the stuck paper.",
                Category::Hardware,
                "Carol Williams",
            )
            .with_tags(["printer"]),
        ]
    }

    #[test]
    fn test_needs_escalation() {
        assert!(needs_escalation("This is URGENT, the CEO can't print"));
        assert!(needs_escalation("can I talk to a human agent?"));
        assert!(!needs_escalation("How do I reset my password?"));
    }

    #[tokio::test]
    async fn test_offline_reply_suggests_mentioned_articles() {
        let chatbot = ChatbotService::offline();

        let reply = chatbot
            .reply(&ChatbotMessage::new("My VPN says error 807"), &articles())
            .await;

        assert_eq!(reply.source, AnalysisSource::Heuristic);
        assert_eq!(reply.suggestions, vec!["Check: VPN error 807"]);
        assert!(!reply.escalate_to_human);
        assert!(reply.fallback.is_none());
    }

    #[tokio::test]
    async fn test_offline_reply_without_articles_offers_human() {
        let chatbot = ChatbotService::offline();

        let reply = chatbot
            .reply(&ChatbotMessage::new("Teams won't start"), &articles())
            .await;

        assert_eq!(reply.response, CANNED_REPLY);
        assert!(reply.escalate_to_human);
        assert_eq!(reply.confidence.value(), 0.0);
    }

    #[tokio::test]
    async fn test_escalation_keyword_kept_with_articles() {
        let reply = ChatbotService::offline()
            .reply(&ChatbotMessage::new("urgent: printer jammed again"), &articles())
            .await;

        assert_eq!(reply.suggestions, vec!["Check: Clearing a printer jam"]);
        assert!(reply.escalate_to_human);
    }

    #[tokio::test]
    async fn test_knowledge_base_failure_degrades_to_no_articles() {
        let mut provider = MockArticleProvider::new();
        provider
            .expect_recent_articles()
            .times(1)
            .returning(|_| {
                Err(StorageError::Connection {
                    message: "database is locked".to_string(),
                })
            });

        let reply = ChatbotService::offline()
            .reply(&ChatbotMessage::new("My VPN is down"), &provider)
            .await;

        assert!(reply.suggestions.iter().all(|s| !s.starts_with("Check:")));
        assert!(reply.escalate_to_human);
    }

    #[test]
    fn test_user_prompt_includes_articles_and_context() {
        let message = ChatbotMessage {
            message: "VPN fails".to_string(),
            user_id: Some("u-1".to_string()),
            context: Some(json!({"device": "laptop"})),
        };

        let prompt = build_user_prompt(&message, &articles()[..1]);

        assert!(prompt.starts_with("User message: VPN fails"));
        assert!(prompt.contains("- VPN error 807 (Network)"));
        assert!(prompt.contains("\"device\":\"laptop\""));
    }
}
