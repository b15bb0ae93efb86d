//! Ticket triage: AI analysis with a deterministic heuristic fallback.
//!
//! [`TriageService`] is the entry point. It asks a [`TicketAnalyzer`] (in
//! production an [`LlmAnalyzer`]) for an analysis and falls back to the
//! [`HeuristicClassifier`] whenever the AI path is disabled or fails, so
//! callers always receive a complete [`TicketAnalysis`].

pub mod analyzer;
pub mod heuristic;
pub mod orchestrator;
pub mod roster;
mod types;

pub use analyzer::{parse_analysis, LlmAnalyzer, TicketAnalyzer};
pub use heuristic::{Classification, HeuristicClassifier, PriorityBasis};
pub use orchestrator::{Fallback, TriageBackend, TriageOutcome, TriageService};
pub use roster::{Agent, AgentRoster, Routing};
pub use types::{
    AnalysisSource, Availability, Score, SimilarTicket, SuggestedProcessor, TicketAnalysis,
    MAX_INSIGHTS, MAX_SELF_FIX_SUGGESTIONS, MAX_SIMILAR_TICKETS,
};
