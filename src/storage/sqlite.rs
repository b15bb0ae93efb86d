use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    ArticleProvider, Category, HistoryProvider, Status, Storage, StoredAnalysis, Ticket,
    TicketFilter,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};
use crate::knowledge::KbArticle;
use crate::triage::AnalysisSource;

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

const TICKET_COLUMNS: &str = "id, title, description, category, priority, status, department, \
     requester_name, requester_email, assigned_to, resolution, created_at, updated_at";

const ARTICLE_COLUMNS: &str =
    "id, title, content, category, tags, author, views, created_at, updated_at";

/// SQLite-backed storage implementation
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory database (one pinned connection, lives as long as the pool)
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(|e| {
            StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            }
        })?;

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to open in-memory database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR.run(&self.pool).await.map_err(|e| StorageError::Migration {
            message: format!("Failed to run migrations: {}", e),
        })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Close every pooled connection; later queries fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_ticket(&self, ticket: &Ticket) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO tickets (id, title, description, category, priority, status, department,
                                 requester_name, requester_email, assigned_to, resolution,
                                 created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&ticket.id)
        .bind(&ticket.title)
        .bind(&ticket.description)
        .bind(ticket.category.as_str())
        .bind(ticket.priority.map(|p| p.as_str()))
        .bind(ticket.status.as_str())
        .bind(&ticket.department)
        .bind(&ticket.requester_name)
        .bind(&ticket.requester_email)
        .bind(&ticket.assigned_to)
        .bind(&ticket.resolution)
        .bind(db_time(&ticket.created_at))
        .bind(db_time(&ticket.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(ticket_id = %ticket.id, "Ticket stored");
        Ok(())
    }

    async fn get_ticket(&self, id: &str) -> StorageResult<Option<Ticket>> {
        let sql = format!("SELECT {} FROM tickets WHERE id = ?", TICKET_COLUMNS);
        let row: Option<TicketRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn list_tickets(&self, filter: &TicketFilter) -> StorageResult<Vec<Ticket>> {
        let mut sql = format!("SELECT {} FROM tickets", TICKET_COLUMNS);
        let mut conditions = Vec::new();
        if filter.status.is_some() {
            conditions.push("status = ?");
        }
        if filter.category.is_some() {
            conditions.push("category = ?");
        }
        if !conditions.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&conditions.join(" AND "));
        }
        sql.push_str(" ORDER BY created_at DESC, rowid DESC LIMIT ?");

        let mut query = sqlx::query_as::<_, TicketRow>(&sql);
        if let Some(status) = filter.status {
            query = query.bind(status.as_str());
        }
        if let Some(category) = filter.category {
            query = query.bind(category.as_str());
        }
        let rows = query
            .bind(i64::from(filter.limit))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn list_recent_tickets(&self, limit: usize) -> StorageResult<Vec<Ticket>> {
        let sql = format!(
            "SELECT {} FROM tickets ORDER BY created_at DESC, rowid DESC LIMIT ?",
            TICKET_COLUMNS
        );
        let rows: Vec<TicketRow> = sqlx::query_as(&sql)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StorageResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE tickets
            SET category = ?, priority = ?, status = ?, assigned_to = ?, resolution = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(ticket.category.as_str())
        .bind(ticket.priority.map(|p| p.as_str()))
        .bind(ticket.status.as_str())
        .bind(&ticket.assigned_to)
        .bind(&ticket.resolution)
        .bind(db_time(&ticket.updated_at))
        .bind(&ticket.id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::TicketNotFound {
                ticket_id: ticket.id.clone(),
            });
        }

        debug!(ticket_id = %ticket.id, status = %ticket.status, "Ticket updated");
        Ok(())
    }

    async fn save_analysis(&self, analysis: &StoredAnalysis) -> StorageResult<()> {
        let body = serde_json::to_string(&analysis.analysis).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize analysis: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO analyses (id, ticket_id, source, analysis, created_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&analysis.id)
        .bind(&analysis.ticket_id)
        .bind(analysis.source.as_str())
        .bind(&body)
        .bind(db_time(&analysis.created_at))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_latest_analysis(&self, ticket_id: &str) -> StorageResult<Option<StoredAnalysis>> {
        let row: Option<AnalysisRow> = sqlx::query_as(
            r#"
            SELECT id, ticket_id, source, analysis, created_at
            FROM analyses
            WHERE ticket_id = ?
            ORDER BY created_at DESC, rowid DESC
            LIMIT 1
            "#,
        )
        .bind(ticket_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(StoredAnalysis::try_from).transpose()
    }

    async fn create_article(&self, article: &KbArticle) -> StorageResult<()> {
        let tags = serde_json::to_string(&article.tags).map_err(|e| StorageError::Query {
            message: format!("Failed to serialize tags: {}", e),
        })?;

        sqlx::query(
            r#"
            INSERT INTO kb_articles (id, title, content, category, tags, author, views,
                                     created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&article.id)
        .bind(&article.title)
        .bind(&article.content)
        .bind(article.category.as_str())
        .bind(&tags)
        .bind(&article.author)
        .bind(i64::try_from(article.views).unwrap_or(i64::MAX))
        .bind(db_time(&article.created_at))
        .bind(db_time(&article.updated_at))
        .execute(&self.pool)
        .await?;

        debug!(article_id = %article.id, "Article stored");
        Ok(())
    }

    async fn get_article(&self, id: &str) -> StorageResult<Option<KbArticle>> {
        let sql = format!("SELECT {} FROM kb_articles WHERE id = ?", ARTICLE_COLUMNS);
        let row: Option<ArticleRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.into()))
    }

    async fn record_article_view(&self, id: &str) -> StorageResult<()> {
        sqlx::query("UPDATE kb_articles SET views = views + 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_articles(
        &self,
        category: Option<Category>,
        limit: usize,
    ) -> StorageResult<Vec<KbArticle>> {
        let filter = if category.is_some() {
            " WHERE category = ?"
        } else {
            ""
        };
        let sql = format!(
            "SELECT {} FROM kb_articles{} ORDER BY created_at DESC, rowid DESC LIMIT ?",
            ARTICLE_COLUMNS, filter
        );

        let mut query = sqlx::query_as::<_, ArticleRow>(&sql);
        if let Some(category) = category {
            query = query.bind(category.as_str());
        }
        let rows = query
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

#[async_trait]
impl HistoryProvider for SqliteStorage {
    async fn list_recent(&self, limit: usize) -> StorageResult<Vec<Ticket>> {
        self.list_recent_tickets(limit).await
    }
}

#[async_trait]
impl ArticleProvider for SqliteStorage {
    async fn recent_articles(&self, limit: usize) -> StorageResult<Vec<KbArticle>> {
        self.list_articles(None, limit).await
    }
}

/// Fixed-width UTC timestamps so lexical order matches time order.
fn db_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_db_time(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct TicketRow {
    id: String,
    title: String,
    description: String,
    category: String,
    priority: Option<String>,
    status: String,
    department: Option<String>,
    requester_name: Option<String>,
    requester_email: Option<String>,
    assigned_to: Option<String>,
    resolution: Option<String>,
    created_at: String,
    updated_at: String,
}

impl From<TicketRow> for Ticket {
    fn from(row: TicketRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            category: Category::from_str(&row.category).unwrap_or_default(),
            priority: row.priority.and_then(|p| p.parse().ok()),
            status: Status::from_str(&row.status).unwrap_or_default(),
            department: row.department,
            requester_name: row.requester_name,
            requester_email: row.requester_email,
            assigned_to: row.assigned_to,
            resolution: row.resolution,
            created_at: parse_db_time(&row.created_at),
            updated_at: parse_db_time(&row.updated_at),
        }
    }
}

#[derive(sqlx::FromRow)]
struct AnalysisRow {
    id: String,
    ticket_id: String,
    source: String,
    analysis: String,
    created_at: String,
}

impl TryFrom<AnalysisRow> for StoredAnalysis {
    type Error = StorageError;

    fn try_from(row: AnalysisRow) -> Result<Self, Self::Error> {
        let analysis = serde_json::from_str(&row.analysis).map_err(|e| StorageError::Query {
            message: format!("Stored analysis {} is unreadable: {}", row.id, e),
        })?;
        let source = AnalysisSource::from_str(&row.source)
            .map_err(|message| StorageError::Query { message })?;

        Ok(Self {
            id: row.id,
            ticket_id: row.ticket_id,
            source,
            analysis,
            created_at: parse_db_time(&row.created_at),
        })
    }
}

#[derive(sqlx::FromRow)]
struct ArticleRow {
    id: String,
    title: String,
    content: String,
    category: String,
    tags: String,
    author: String,
    views: i64,
    created_at: String,
    updated_at: String,
}

impl From<ArticleRow> for KbArticle {
    fn from(row: ArticleRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            content: row.content,
            category: Category::from_str(&row.category).unwrap_or_default(),
            tags: serde_json::from_str(&row.tags).unwrap_or_default(),
            author: row.author,
            views: u64::try_from(row.views).unwrap_or(0),
            created_at: parse_db_time(&row.created_at),
            updated_at: parse_db_time(&row.updated_at),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_time_is_fixed_width() {
        let a = DateTime::parse_from_rfc3339("2025-01-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let b = DateTime::parse_from_rfc3339("2025-01-01T10:00:00.5Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(db_time(&a).len(), db_time(&b).len());
        assert!(db_time(&a) < db_time(&b));
    }

    #[test]
    fn test_parse_db_time_round_trip() {
        let now = Utc::now();
        let parsed = parse_db_time(&db_time(&now));
        assert_eq!(parsed.timestamp_micros(), now.timestamp_micros());
    }

    #[tokio::test]
    async fn test_in_memory_storage_is_usable() {
        let storage = SqliteStorage::new_in_memory().await.unwrap();
        let ticket = Ticket::new("Printer jam", "Paper stuck in tray 2");
        storage.create_ticket(&ticket).await.unwrap();

        let fetched = storage.get_ticket(&ticket.id).await.unwrap().unwrap();
        assert_eq!(fetched.title, "Printer jam");
        assert_eq!(fetched.status, Status::Open);
    }
}
