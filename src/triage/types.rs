use serde::{Deserialize, Serialize};

/// Most self-fix suggestions an analysis may carry.
pub const MAX_SELF_FIX_SUGGESTIONS: usize = 6;
/// Most similar tickets an analysis may carry.
pub const MAX_SIMILAR_TICKETS: usize = 5;
/// Most additional insights an analysis may carry.
pub const MAX_INSIGHTS: usize = 5;

/// A confidence or similarity value, always within `[0.0, 1.0]`.
///
/// Trusted values are clamped with [`Score::clamped`]; values from outside
/// the process go through [`Score::new`], which rejects anything out of range.
#[derive(Debug, Clone, Copy, Default, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Score(f64);

impl Score {
    /// Lowest confidence the heuristic path reports.
    pub const FLOOR: Score = Score(0.3);

    /// Checked construction; NaN and values outside `[0, 1]` are rejected.
    pub fn new(value: f64) -> Result<Self, String> {
        if value.is_finite() && (0.0..=1.0).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("score {} is outside [0, 1]", value))
        }
    }

    /// Clamp into range; NaN becomes 0.
    pub fn clamped(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn value(self) -> f64 {
        self.0
    }
}

impl TryFrom<f64> for Score {
    type Error = String;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Score::new(value)
    }
}

impl From<Score> for f64 {
    fn from(score: Score) -> Self {
        score.0
    }
}

/// Agent availability as reported by the roster or the model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Availability {
    #[serde(alias = "available")]
    Available,
    #[serde(alias = "busy")]
    Busy,
    #[serde(alias = "offline")]
    Offline,
    #[default]
    #[serde(alias = "unknown")]
    Unknown,
}

impl Availability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Availability::Available => "Available",
            Availability::Busy => "Busy",
            Availability::Offline => "Offline",
            Availability::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for Availability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Availability {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "available" => Ok(Availability::Available),
            "busy" => Ok(Availability::Busy),
            "offline" => Ok(Availability::Offline),
            "unknown" => Ok(Availability::Unknown),
            _ => Err(format!("Unknown availability: {}", s)),
        }
    }
}

/// Recommended agent for a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestedProcessor {
    /// Agent name.
    pub name: String,
    /// Why this agent fits.
    pub reason: String,
    /// Confidence in the routing (0.0-1.0).
    pub confidence_score: Score,
    /// Skills of the agent that match the ticket.
    pub matched_skills: Vec<String>,
    /// Current availability of the agent.
    pub availability: Availability,
}

/// A past ticket resembling the one under analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarTicket {
    pub title: String,
    pub similarity_score: Score,
    pub resolution_approach: String,
}

/// Triage result for one ticket.
///
/// Every field is always populated, whichever path produced the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TicketAnalysis {
    /// Agent best suited to handle the ticket.
    pub suggested_processor: SuggestedProcessor,
    /// Steps the requester can try before an agent picks the ticket up.
    pub self_fix_suggestions: Vec<String>,
    /// Confidence in the ticket's category (0.0-1.0).
    pub category_confidence: Score,
    /// Priority level plus a one-sentence justification.
    pub priority_recommendation: String,
    /// Most similar past tickets first.
    pub similar_tickets: Vec<SimilarTicket>,
    /// Duration range, e.g. "2-4 hours".
    pub estimated_resolution_time: String,
    /// Free-form observations.
    pub additional_insights: Vec<String>,
}

impl TicketAnalysis {
    /// Check the list-length limits of the schema.
    pub fn check_limits(&self) -> Result<(), String> {
        if self.self_fix_suggestions.len() > MAX_SELF_FIX_SUGGESTIONS {
            return Err(format!(
                "self_fix_suggestions has {} entries (max {})",
                self.self_fix_suggestions.len(),
                MAX_SELF_FIX_SUGGESTIONS
            ));
        }
        if self.similar_tickets.len() > MAX_SIMILAR_TICKETS {
            return Err(format!(
                "similar_tickets has {} entries (max {})",
                self.similar_tickets.len(),
                MAX_SIMILAR_TICKETS
            ));
        }
        if self.additional_insights.len() > MAX_INSIGHTS {
            return Err(format!(
                "additional_insights has {} entries (max {})",
                self.additional_insights.len(),
                MAX_INSIGHTS
            ));
        }
        Ok(())
    }
}

/// Which path produced an analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisSource {
    /// Language-model analysis.
    Ai,
    /// Keyword heuristic.
    Heuristic,
}

impl AnalysisSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisSource::Ai => "ai",
            AnalysisSource::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for AnalysisSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AnalysisSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ai" => Ok(AnalysisSource::Ai),
            "heuristic" => Ok(AnalysisSource::Heuristic),
            _ => Err(format!("Unknown analysis source: {}", s)),
        }
    }
}
