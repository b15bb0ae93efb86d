use serde::Serialize;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use super::analyzer::{LlmAnalyzer, TicketAnalyzer};
use super::heuristic::HeuristicClassifier;
use super::roster::AgentRoster;
use super::types::{AnalysisSource, TicketAnalysis};
use crate::config::{AiMode, Config, DEFAULT_HISTORY_SAMPLE_CAP};
use crate::error::AppResult;
use crate::llm::OpenAiClient;
use crate::storage::{HistoryProvider, Ticket};

/// Kind reported when the history sample could not be fetched.
pub const HISTORY_UNAVAILABLE: &str = "HistoryUnavailableError";

/// How analyses are produced, fixed at construction.
#[derive(Clone)]
pub enum TriageBackend {
    /// Try the analyzer first, fall back to the heuristic on any failure.
    Ai(Arc<dyn TicketAnalyzer>),
    /// Heuristic only; no history fetch, no network.
    HeuristicOnly,
}

impl std::fmt::Debug for TriageBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TriageBackend::Ai(_) => f.write_str("Ai"),
            TriageBackend::HeuristicOnly => f.write_str("HeuristicOnly"),
        }
    }
}

/// Why an AI attempt was abandoned.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Fallback {
    /// Error kind, e.g. `AnalysisTimeoutError`.
    pub kind: &'static str,
    /// Underlying error message.
    pub message: String,
}

/// An analysis together with how it was produced.
#[derive(Debug, Clone, Serialize)]
pub struct TriageOutcome {
    pub analysis: TicketAnalysis,
    pub source: AnalysisSource,
    /// Set when the AI path was attempted and failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fallback: Option<Fallback>,
}

/// Ticket triage entry point.
///
/// Always yields a complete [`TicketAnalysis`]. Failures of the AI path are
/// logged once, as a warning carrying `kind` and `error` fields, and then
/// replaced by the heuristic result for the ticket alone.
///
/// Dropping the future returned by [`TriageService::analyze`] abandons any
/// in-flight provider request.
#[derive(Debug, Clone)]
pub struct TriageService {
    backend: TriageBackend,
    heuristic: HeuristicClassifier,
    history_sample_cap: usize,
}

impl TriageService {
    /// Service that never leaves the process.
    pub fn heuristic_only(heuristic: HeuristicClassifier) -> Self {
        Self {
            backend: TriageBackend::HeuristicOnly,
            heuristic,
            history_sample_cap: DEFAULT_HISTORY_SAMPLE_CAP,
        }
    }

    /// Service that tries `analyzer` first.
    pub fn with_analyzer(
        analyzer: Arc<dyn TicketAnalyzer>,
        heuristic: HeuristicClassifier,
        history_sample_cap: usize,
    ) -> Self {
        Self {
            backend: TriageBackend::Ai(analyzer),
            heuristic,
            history_sample_cap,
        }
    }

    /// Build from configuration; the provider client exists only when a credential does.
    pub fn from_config(config: &Config, roster: AgentRoster) -> AppResult<Self> {
        let heuristic = HeuristicClassifier::new(roster.clone());

        match &config.ai {
            AiMode::Enabled(openai) => {
                let client = OpenAiClient::new(openai, config.request.clone())?;
                info!(
                    model = %openai.model,
                    timeout_ms = config.request.timeout_ms,
                    history_sample_cap = config.triage.history_sample_cap,
                    "AI ticket analysis enabled"
                );
                Ok(Self::with_analyzer(
                    Arc::new(LlmAnalyzer::new(client, roster)),
                    heuristic,
                    config.triage.history_sample_cap,
                ))
            }
            AiMode::Disabled => {
                info!("No AI credential configured, using heuristic ticket analysis");
                Ok(Self::heuristic_only(heuristic))
            }
        }
    }

    /// Whether the AI path is attempted.
    pub fn ai_enabled(&self) -> bool {
        matches!(self.backend, TriageBackend::Ai(_))
    }

    /// The fallback classifier.
    pub fn heuristic(&self) -> &HeuristicClassifier {
        &self.heuristic
    }

    /// Maximum history entries passed to the analyzer.
    pub fn history_sample_cap(&self) -> usize {
        self.history_sample_cap
    }

    /// Analyze a ticket. Never fails.
    pub async fn analyze(&self, ticket: &Ticket, history: &dyn HistoryProvider) -> TicketAnalysis {
        self.triage(ticket, history).await.analysis
    }

    /// Analyze a ticket and report which path produced the result.
    pub async fn triage(&self, ticket: &Ticket, history: &dyn HistoryProvider) -> TriageOutcome {
        let analyzer = match &self.backend {
            TriageBackend::Ai(analyzer) => analyzer,
            TriageBackend::HeuristicOnly => {
                debug!(ticket_id = %ticket.id, "Heuristic ticket analysis");
                return TriageOutcome {
                    analysis: self.heuristic.analyze(ticket),
                    source: AnalysisSource::Heuristic,
                    fallback: None,
                };
            }
        };

        let start = Instant::now();
        let result = match self.history_sample(ticket, history).await {
            Ok(sample) => analyzer
                .analyze(ticket, &sample)
                .await
                .map_err(|e| Fallback {
                    kind: e.kind(),
                    message: e.to_string(),
                }),
            Err(fallback) => Err(fallback),
        };

        match result {
            Ok(analysis) => {
                info!(
                    ticket_id = %ticket.id,
                    latency_ms = start.elapsed().as_millis(),
                    "AI ticket analysis completed"
                );
                TriageOutcome {
                    analysis,
                    source: AnalysisSource::Ai,
                    fallback: None,
                }
            }
            Err(fallback) => {
                warn!(
                    ticket_id = %ticket.id,
                    kind = fallback.kind,
                    error = %fallback.message,
                    "AI ticket analysis failed, using heuristic fallback"
                );
                TriageOutcome {
                    analysis: self.heuristic.analyze(ticket),
                    source: AnalysisSource::Heuristic,
                    fallback: Some(fallback),
                }
            }
        }
    }

    /// Up to `history_sample_cap` recent tickets other than `ticket` itself.
    async fn history_sample(
        &self,
        ticket: &Ticket,
        history: &dyn HistoryProvider,
    ) -> Result<Vec<Ticket>, Fallback> {
        let mut sample = history
            .list_recent(self.history_sample_cap.saturating_add(1))
            .await
            .map_err(|e| Fallback {
                kind: HISTORY_UNAVAILABLE,
                message: e.to_string(),
            })?;

        if !ticket.id.is_empty() {
            sample.retain(|past| past.id != ticket.id);
        }
        sample.truncate(self.history_sample_cap);
        Ok(sample)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AnalysisError, StorageError};
    use crate::storage::MockHistoryProvider;
    use crate::triage::analyzer::MockTicketAnalyzer;
    use crate::triage::types::{Availability, Score, SuggestedProcessor};
    use mockall::predicate::eq;

    fn ai_analysis() -> TicketAnalysis {
        TicketAnalysis {
            suggested_processor: SuggestedProcessor {
                name: "Model Pick".to_string(),
                reason: "Chosen by the model".to_string(),
                confidence_score: Score::clamped(0.95),
                matched_skills: vec!["Network".to_string()],
                availability: Availability::Available,
            },
            self_fix_suggestions: vec![],
            category_confidence: Score::clamped(0.9),
            priority_recommendation: "high - model says so".to_string(),
            similar_tickets: vec![],
            estimated_resolution_time: "2-4 hours".to_string(),
            additional_insights: vec![],
        }
    }

    fn vpn_ticket() -> Ticket {
        Ticket::new(
            "VPN won't connect",
            "cannot connect to VPN from home, error code 807",
        )
    }

    #[tokio::test]
    async fn test_heuristic_only_skips_history() {
        let mut history = MockHistoryProvider::new();
        history.expect_list_recent().never();

        let service = TriageService::heuristic_only(HeuristicClassifier::default());
        let outcome = service.triage(&vpn_ticket(), &history).await;

        assert_eq!(outcome.source, AnalysisSource::Heuristic);
        assert!(outcome.fallback.is_none());
        assert!(!service.ai_enabled());
    }

    #[tokio::test]
    async fn test_ai_success_returned_verbatim() {
        let mut history = MockHistoryProvider::new();
        history
            .expect_list_recent()
            .with(eq(51))
            .times(1)
            .returning(|_| Ok(vec![Ticket::new("Old VPN issue", "").resolved("Reset")]));

        let mut analyzer = MockTicketAnalyzer::new();
        analyzer
            .expect_analyze()
            .times(1)
            .withf(|_, history| history.len() == 1)
            .returning(|_, _| Ok(ai_analysis()));

        let service =
            TriageService::with_analyzer(Arc::new(analyzer), HeuristicClassifier::default(), 50);
        let outcome = service.triage(&vpn_ticket(), &history).await;

        assert_eq!(outcome.source, AnalysisSource::Ai);
        assert_eq!(outcome.analysis, ai_analysis());
        assert!(outcome.fallback.is_none());
    }

    #[tokio::test]
    async fn test_history_sample_excludes_ticket_and_respects_cap() {
        let ticket = vpn_ticket();
        let mut stored = vec![ticket.clone()];
        for i in 0..5 {
            stored.push(Ticket::new(format!("Past {}", i), ""));
        }

        let mut analyzer = MockTicketAnalyzer::new();
        let ticket_id = ticket.id.clone();
        analyzer
            .expect_analyze()
            .times(1)
            .withf(move |_, history| {
                history.len() == 3 && history.iter().all(|t| t.id != ticket_id)
            })
            .returning(|_, _| Ok(ai_analysis()));

        let service =
            TriageService::with_analyzer(Arc::new(analyzer), HeuristicClassifier::default(), 3);
        let outcome = service.triage(&ticket, &stored).await;
        assert_eq!(outcome.source, AnalysisSource::Ai);
    }

    #[tokio::test]
    async fn test_analyzer_error_falls_back() {
        let errors = [
            AnalysisError::Timeout { timeout_ms: 30_000 },
            AnalysisError::Auth {
                status: 401,
                message: "bad key".to_string(),
            },
            AnalysisError::parse("missing field priority_recommendation"),
            AnalysisError::RateLimit {
                status: Some(429),
                message: "slow down".to_string(),
            },
        ];

        for error in errors {
            let kind = error.kind();
            let slot = std::sync::Mutex::new(Some(error));
            let mut analyzer = MockTicketAnalyzer::new();
            analyzer
                .expect_analyze()
                .times(1)
                .returning(move |_, _| Err(slot.lock().unwrap().take().unwrap()));

            let service = TriageService::with_analyzer(
                Arc::new(analyzer),
                HeuristicClassifier::default(),
                50,
            );
            let ticket = vpn_ticket();
            let outcome = service.triage(&ticket, &Vec::<Ticket>::new()).await;

            assert_eq!(outcome.source, AnalysisSource::Heuristic);
            assert_eq!(outcome.fallback.as_ref().map(|f| f.kind), Some(kind));
            assert_eq!(outcome.analysis, HeuristicClassifier::default().analyze(&ticket));
        }
    }

    #[tokio::test]
    async fn test_history_failure_falls_back_without_calling_analyzer() {
        let mut history = MockHistoryProvider::new();
        history.expect_list_recent().times(1).returning(|_| {
            Err(StorageError::Connection {
                message: "database is locked".to_string(),
            })
        });

        let mut analyzer = MockTicketAnalyzer::new();
        analyzer.expect_analyze().never();

        let service =
            TriageService::with_analyzer(Arc::new(analyzer), HeuristicClassifier::default(), 50);
        let outcome = service.triage(&vpn_ticket(), &history).await;

        assert_eq!(outcome.source, AnalysisSource::Heuristic);
        let fallback = outcome.fallback.unwrap();
        assert_eq!(fallback.kind, HISTORY_UNAVAILABLE);
        assert!(fallback.message.contains("database is locked"));
    }

    #[test]
    fn test_from_config_disabled() {
        let config = test_config(AiMode::Disabled);
        let service = TriageService::from_config(&config, AgentRoster::default()).unwrap();
        assert!(!service.ai_enabled());
    }

    #[test]
    fn test_from_config_enabled() {
        let config = test_config(AiMode::Enabled(crate::config::OpenAiConfig::new("sk-test")));
        let service = TriageService::from_config(&config, AgentRoster::default()).unwrap();
        assert!(service.ai_enabled());
        assert_eq!(service.history_sample_cap(), 50);
    }

    fn test_config(ai: AiMode) -> Config {
        use crate::config::{
            DatabaseConfig, LogFormat, LoggingConfig, RequestConfig, TriageConfig,
        };
        Config {
            ai,
            request: RequestConfig::default(),
            triage: TriageConfig::default(),
            database: DatabaseConfig {
                path: std::path::PathBuf::from(":memory:"),
                max_connections: 1,
            },
            logging: LoggingConfig {
                level: "info".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }
}
