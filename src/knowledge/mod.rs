//! Knowledge-base articles and keyword ranking over them.
//!
//! Search is deterministic and runs entirely in process: a query scores an
//! article by where it appears (title, content, tags, category) and the best
//! matches are returned first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ToolError;
use crate::storage::{Category, Ticket};

/// Most articles a search or recommendation returns.
pub const MAX_ARTICLE_RESULTS: usize = 5;

/// Articles considered by a search.
pub const SEARCH_SCAN_LIMIT: usize = 100;

const TITLE_WEIGHT: u32 = 3;
const CONTENT_WEIGHT: u32 = 2;
const TAG_WEIGHT: u32 = 1;
const CATEGORY_WEIGHT: u32 = 1;

/// A knowledge-base article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KbArticle {
    pub id: String,
    pub title: String,
    pub content: String,
    pub category: Category,
    pub tags: Vec<String>,
    pub author: String,
    /// Times the article was opened with `kb_get`.
    pub views: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KbArticle {
    /// New article with no views
    pub fn new(
        title: impl Into<String>,
        content: impl Into<String>,
        category: Category,
        author: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            content: content.into(),
            category,
            tags: Vec::new(),
            author: author.into(),
            views: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the tags
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Keyword relevance of the article to `query`; zero means unrelated.
    pub fn relevance(&self, query: &str) -> u32 {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return 0;
        }

        let mut score = 0;
        if self.title.to_lowercase().contains(&query) {
            score += TITLE_WEIGHT;
        }
        if self.content.to_lowercase().contains(&query) {
            score += CONTENT_WEIGHT;
        }
        if self.tags_in(&query) > 0 {
            score += TAG_WEIGHT;
        }
        if query.contains(&self.category.as_str().to_lowercase()) {
            score += CATEGORY_WEIGHT;
        }
        score
    }

    /// Whether a chat message names this article by title or by one of its tags.
    pub fn mentioned_in(&self, message: &str) -> bool {
        let message = message.to_lowercase();
        let title = self.title.trim().to_lowercase();
        (!title.is_empty() && message.contains(&title)) || self.tags_in(&message) > 0
    }

    /// Number of tags occurring in already-lowercased `text`.
    fn tags_in(&self, text: &str) -> usize {
        self.tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty() && text.contains(t.as_str()))
            .count()
    }
}

/// Input for creating an article.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewKbArticle {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub tags: Vec<String>,
    pub author: String,
}

impl NewKbArticle {
    /// Validate the input and build an article.
    pub fn into_article(self) -> Result<KbArticle, ToolError> {
        for (field, value) in [
            ("title", &self.title),
            ("content", &self.content),
            ("author", &self.author),
        ] {
            if value.trim().is_empty() {
                return Err(ToolError::Validation {
                    field: field.to_string(),
                    reason: format!("{} cannot be empty", field),
                });
            }
        }

        let tags: Vec<String> = self
            .tags
            .iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect();

        Ok(KbArticle::new(
            self.title.trim(),
            self.content.trim(),
            self.category,
            self.author.trim(),
        )
        .with_tags(tags))
    }
}

/// An article with its search score.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArticleMatch {
    #[serde(flatten)]
    pub article: KbArticle,
    pub relevance_score: u32,
}

/// Articles relevant to `query`, best first, at most `limit`.
///
/// Ties keep the input order.
pub fn search(articles: Vec<KbArticle>, query: &str, limit: usize) -> Vec<ArticleMatch> {
    let mut matches: Vec<ArticleMatch> = articles
        .into_iter()
        .filter_map(|article| {
            let relevance_score = article.relevance(query);
            (relevance_score > 0).then_some(ArticleMatch {
                article,
                relevance_score,
            })
        })
        .collect();

    matches.sort_by(|a, b| b.relevance_score.cmp(&a.relevance_score));
    matches.truncate(limit);
    matches
}

/// How a recommendation list was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationBasis {
    /// Most viewed articles overall.
    Popular,
    /// Articles in the ticket's category.
    Category,
}

/// Most viewed articles first, at most `limit`.
pub fn popular(mut articles: Vec<KbArticle>, limit: usize) -> Vec<KbArticle> {
    articles.sort_by(|a, b| b.views.cmp(&a.views));
    articles.truncate(limit);
    articles
}

/// Articles from the ticket's category, those whose tags appear in the
/// ticket text first, then by views.
pub fn recommend_for(ticket: &Ticket, articles: Vec<KbArticle>, limit: usize) -> Vec<KbArticle> {
    let text = ticket.text().to_lowercase();
    let mut ranked: Vec<(usize, KbArticle)> = articles
        .into_iter()
        .filter(|a| a.category == ticket.category)
        .map(|a| (a.tags_in(&text), a))
        .collect();

    ranked.sort_by(|(hits_a, a), (hits_b, b)| {
        hits_b.cmp(hits_a).then_with(|| b.views.cmp(&a.views))
    });
    ranked.into_iter().take(limit).map(|(_, a)| a).collect()
}
