//! Storage layer for service-desk tickets.
//!
//! This module defines the ticket record shared by every other layer, the
//! read-only [`HistoryProvider`] and [`ArticleProvider`] capabilities the
//! triage and chatbot paths consume, and SQLite-backed persistence for
//! tickets, stored analyses and knowledge-base articles.

mod sqlite;

#[cfg(test)]
#[path = "types_tests.rs"]
mod types_tests;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::error::{StorageResult, ToolError};
use crate::knowledge::KbArticle;
use crate::triage::{AnalysisSource, TicketAnalysis};

/// Ticket category.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    /// Physical devices: laptops, printers, monitors.
    #[serde(alias = "hardware")]
    Hardware,
    /// Applications, installs, updates.
    #[serde(alias = "software")]
    Software,
    /// Connectivity: VPN, WiFi, DNS.
    #[serde(alias = "network")]
    Network,
    /// Mail and calendar.
    #[serde(alias = "email")]
    Email,
    /// Accounts, passwords, permissions.
    #[serde(alias = "access")]
    Access,
    /// Phishing, malware, suspicious activity.
    #[serde(alias = "security")]
    Security,
    /// Anything else.
    #[default]
    #[serde(alias = "other")]
    Other,
}

impl Category {
    /// All categories in declaration order.
    pub const ALL: [Category; 7] = [
        Category::Hardware,
        Category::Software,
        Category::Network,
        Category::Email,
        Category::Access,
        Category::Security,
        Category::Other,
    ];

    /// Display name as stored and shown to users
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Hardware => "Hardware",
            Category::Software => "Software",
            Category::Network => "Network",
            Category::Email => "Email",
            Category::Access => "Access",
            Category::Security => "Security",
            Category::Other => "Other",
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "hardware" => Ok(Category::Hardware),
            "software" => Ok(Category::Software),
            "network" => Ok(Category::Network),
            "email" => Ok(Category::Email),
            "access" => Ok(Category::Access),
            "security" => Ok(Category::Security),
            "other" => Ok(Category::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Ticket priority, ordered from least to most urgent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

impl Priority {
    /// Lowercase wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
            Priority::Critical => "critical",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "low" => Ok(Priority::Low),
            "medium" => Ok(Priority::Medium),
            "high" => Ok(Priority::High),
            "critical" => Ok(Priority::Critical),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Ticket workflow status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

impl Status {
    /// Snake-case wire name
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Open => "open",
            Status::InProgress => "in_progress",
            Status::Resolved => "resolved",
            Status::Closed => "closed",
        }
    }

    /// Whether the ticket is finished and may carry a resolution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Status::Resolved | Status::Closed)
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(Status::Open),
            "in_progress" => Ok(Status::InProgress),
            "resolved" => Ok(Status::Resolved),
            "closed" => Ok(Status::Closed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// A service-desk ticket.
///
/// Every field has a default so that partially filled tickets coming from
/// clients still deserialize; triage treats a missing title or description
/// as empty text. An unrecognized category reads as `Other` and an
/// unrecognized priority as unset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Ticket {
    /// Unique ticket identifier.
    pub id: String,
    /// Short summary.
    pub title: String,
    /// Full problem description.
    pub description: String,
    /// Ticket category.
    #[serde(deserialize_with = "lenient_category")]
    pub category: Category,
    /// Requested priority, if the requester set one.
    #[serde(deserialize_with = "lenient_priority")]
    pub priority: Option<Priority>,
    /// Workflow status.
    pub status: Status,
    /// Requesting department.
    pub department: Option<String>,
    /// Requester display name.
    pub requester_name: Option<String>,
    /// Requester email address.
    pub requester_email: Option<String>,
    /// Agent currently handling the ticket.
    pub assigned_to: Option<String>,
    /// How the ticket was resolved (resolved/closed tickets only).
    pub resolution: Option<String>,
    /// When the ticket was created.
    pub created_at: DateTime<Utc>,
    /// When the ticket was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Default for Ticket {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            id: String::new(),
            title: String::new(),
            description: String::new(),
            category: Category::Other,
            priority: None,
            status: Status::Open,
            department: None,
            requester_name: None,
            requester_email: None,
            assigned_to: None,
            resolution: None,
            created_at: now,
            updated_at: now,
        }
    }
}

impl Ticket {
    /// Create a new open ticket with a fresh id
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            description: description.into(),
            ..Default::default()
        }
    }

    /// Set the category
    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    /// Set the priority
    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Set the department
    pub fn with_department(mut self, department: impl Into<String>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Set requester name and email
    pub fn with_requester(mut self, name: impl Into<String>, email: impl Into<String>) -> Self {
        self.requester_name = Some(name.into());
        self.requester_email = Some(email.into());
        self
    }

    /// Set the creation time (also used as the update time)
    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Mark the ticket resolved with the given resolution text
    pub fn resolved(mut self, resolution: impl Into<String>) -> Self {
        self.status = Status::Resolved;
        self.resolution = Some(resolution.into());
        self
    }

    /// Title and description joined for keyword scanning.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

fn lenient_category<'de, D>(deserializer: D) -> Result<Category, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_str(deserializer)?
        .and_then(|s| s.parse().ok())
        .unwrap_or_default())
}

fn lenient_priority<'de, D>(deserializer: D) -> Result<Option<Priority>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_str(deserializer)?.and_then(|s| s.parse().ok()))
}

/// Any JSON value; only strings are kept.
fn lenient_str<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

/// Input for creating a ticket.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTicket {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub requester_name: Option<String>,
    #[serde(default)]
    pub requester_email: Option<String>,
}

impl NewTicket {
    /// Validate the input and build an open ticket.
    ///
    /// `fallback_category` is used when the requester left the category empty.
    pub fn into_ticket(self, fallback_category: Category) -> Result<Ticket, ToolError> {
        if self.title.trim().is_empty() {
            return Err(ToolError::Validation {
                field: "title".to_string(),
                reason: "Title cannot be empty".to_string(),
            });
        }

        if let Some(email) = &self.requester_email {
            if !email.contains('@') {
                return Err(ToolError::Validation {
                    field: "requester_email".to_string(),
                    reason: format!("Not an email address: {}", email),
                });
            }
        }

        let mut ticket = Ticket::new(self.title.trim(), self.description)
            .with_category(self.category.unwrap_or(fallback_category));
        ticket.priority = self.priority;
        ticket.department = self.department;
        ticket.requester_name = self.requester_name;
        ticket.requester_email = self.requester_email;
        Ok(ticket)
    }
}

/// Partial update of a stored ticket.
///
/// Absent fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub assigned_to: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl TicketUpdate {
    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.category.is_none()
            && self.priority.is_none()
            && self.assigned_to.is_none()
            && self.resolution.is_none()
    }

    /// Checks that do not depend on the stored ticket.
    pub fn validate(&self) -> Result<(), ToolError> {
        if self.is_empty() {
            return Err(ToolError::Validation {
                field: "update".to_string(),
                reason: "No fields to update".to_string(),
            });
        }
        if matches!(&self.resolution, Some(text) if text.trim().is_empty()) {
            return Err(ToolError::Validation {
                field: "resolution".to_string(),
                reason: "Resolution cannot be empty".to_string(),
            });
        }
        if matches!(&self.assigned_to, Some(name) if name.trim().is_empty()) {
            return Err(ToolError::Validation {
                field: "assigned_to".to_string(),
                reason: "Assignee cannot be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Apply the update to `ticket`.
    ///
    /// A resolution is only accepted when the resulting status is resolved
    /// or closed; moving a ticket back to open or in progress drops its
    /// resolution.
    pub fn apply(self, mut ticket: Ticket) -> Result<Ticket, ToolError> {
        self.validate()?;

        let status = self.status.unwrap_or(ticket.status);
        if self.resolution.is_some() && !status.is_terminal() {
            return Err(ToolError::Validation {
                field: "resolution".to_string(),
                reason: format!("A {} ticket cannot carry a resolution", status),
            });
        }

        ticket.status = status;
        if let Some(category) = self.category {
            ticket.category = category;
        }
        if self.priority.is_some() {
            ticket.priority = self.priority;
        }
        if let Some(assignee) = self.assigned_to {
            ticket.assigned_to = Some(assignee.trim().to_string());
        }
        if let Some(resolution) = self.resolution {
            ticket.resolution = Some(resolution.trim().to_string());
        }
        if !status.is_terminal() {
            ticket.resolution = None;
        }
        ticket.updated_at = Utc::now();
        Ok(ticket)
    }
}

/// Filter for listing tickets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketFilter {
    #[serde(default)]
    pub status: Option<Status>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default = "default_list_limit")]
    pub limit: u32,
}

fn default_list_limit() -> u32 {
    50
}

impl Default for TicketFilter {
    fn default() -> Self {
        Self {
            status: None,
            category: None,
            limit: default_list_limit(),
        }
    }
}

/// A persisted analysis of a ticket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredAnalysis {
    /// Unique analysis identifier.
    pub id: String,
    /// Ticket the analysis belongs to.
    pub ticket_id: String,
    /// Which path produced the analysis.
    pub source: AnalysisSource,
    /// The analysis record itself.
    pub analysis: TicketAnalysis,
    /// When the analysis was stored.
    pub created_at: DateTime<Utc>,
}

impl StoredAnalysis {
    /// Wrap an analysis for storage
    pub fn new(
        ticket_id: impl Into<String>,
        source: AnalysisSource,
        analysis: TicketAnalysis,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            ticket_id: ticket_id.into(),
            source,
            analysis,
            created_at: Utc::now(),
        }
    }
}

/// Read-only access to past tickets, used as similarity context for triage.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait HistoryProvider: Send + Sync {
    /// Up to `limit` tickets, most recent first.
    async fn list_recent(&self, limit: usize) -> StorageResult<Vec<Ticket>>;
}

#[async_trait]
impl HistoryProvider for Vec<Ticket> {
    async fn list_recent(&self, limit: usize) -> StorageResult<Vec<Ticket>> {
        Ok(self.iter().take(limit).cloned().collect())
    }
}

/// Read-only access to knowledge-base articles, used by the chatbot.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ArticleProvider: Send + Sync {
    /// Up to `limit` articles, newest first.
    async fn recent_articles(&self, limit: usize) -> StorageResult<Vec<KbArticle>>;
}

#[async_trait]
impl ArticleProvider for Vec<KbArticle> {
    async fn recent_articles(&self, limit: usize) -> StorageResult<Vec<KbArticle>> {
        Ok(self.iter().take(limit).cloned().collect())
    }
}

/// Storage trait for ticket persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    // Ticket operations

    /// Insert a new ticket.
    async fn create_ticket(&self, ticket: &Ticket) -> StorageResult<()>;
    /// Get a ticket by ID.
    async fn get_ticket(&self, id: &str) -> StorageResult<Option<Ticket>>;
    /// List tickets matching a filter, newest first.
    async fn list_tickets(&self, filter: &TicketFilter) -> StorageResult<Vec<Ticket>>;
    /// The most recently created tickets, newest first.
    async fn list_recent_tickets(&self, limit: usize) -> StorageResult<Vec<Ticket>>;
    /// Overwrite the mutable fields of an existing ticket.
    async fn update_ticket(&self, ticket: &Ticket) -> StorageResult<()>;

    // Analysis operations

    /// Store an analysis produced for a ticket.
    async fn save_analysis(&self, analysis: &StoredAnalysis) -> StorageResult<()>;
    /// The newest stored analysis for a ticket.
    async fn get_latest_analysis(&self, ticket_id: &str) -> StorageResult<Option<StoredAnalysis>>;

    // Knowledge base

    /// Insert a new article.
    async fn create_article(&self, article: &KbArticle) -> StorageResult<()>;
    /// Get an article by ID.
    async fn get_article(&self, id: &str) -> StorageResult<Option<KbArticle>>;
    /// Count one more view of an article.
    async fn record_article_view(&self, id: &str) -> StorageResult<()>;
    /// Articles, newest first, optionally restricted to one category.
    async fn list_articles(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> StorageResult<Vec<KbArticle>>;
}
