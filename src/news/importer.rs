use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Post, User};
use crate::db::post_repository::PostRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::news::client::{NewsArticle, NewsSource};
use crate::news::tags::extract_tags;

/// Outcome of an import run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportSummary {
    /// Articles received from the source.
    pub fetched: usize,
    /// New posts created.
    pub imported: usize,
    /// Articles whose source URL was already stored.
    pub skipped: usize,
    /// Articles that could not be stored.
    pub failed: usize,
    /// Categories whose fetch failed.
    #[serde(default)]
    pub failed_categories: Vec<String>,
}

impl ImportSummary {
    fn merge(&mut self, other: ImportSummary) {
        self.fetched += other.fetched;
        self.imported += other.imported;
        self.skipped += other.skipped;
        self.failed += other.failed;
        self.failed_categories.extend(other.failed_categories);
    }
}

/// The account imported posts are attributed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewsAuthor {
    pub id: String,
    pub username: String,
}

/// Look up the news author account, creating it on first use.
///
/// The account has no password and cannot log in.
pub async fn ensure_news_author(
    users: &dyn UserRepository,
    username: &str,
) -> Result<NewsAuthor, AppError> {
    let username = username.to_lowercase();
    let username = username.as_str();
    if let Some(user) = users.find_by_username(username).await? {
        return Ok(NewsAuthor {
            id: user.id,
            username: user.username,
        });
    }

    let user = User {
        id: uuid::Uuid::new_v4().to_string(),
        email: format!("{}@news.invalid", username),
        username: username.to_string(),
        password_hash: String::new(),
        display_name: Some("News".to_string()),
        bio: Some("Automatically imported headlines.".to_string()),
        avatar_url: None,
        followers: vec![],
        following: vec![],
        created_at: Utc::now(),
    };
    let author = NewsAuthor {
        id: user.id.clone(),
        username: user.username.clone(),
    };

    match users.insert(user).await {
        Ok(()) => {
            tracing::info!("Created news author account '{}'", username);
            Ok(author)
        }
        // Another instance created it first
        Err(AppError::Conflict(_)) => users
            .find_by_username(username)
            .await?
            .map(|u| NewsAuthor {
                id: u.id,
                username: u.username,
            })
            .ok_or_else(|| {
                AppError::Conflict(format!("Username '{}' is unavailable", username))
            }),
        Err(e) => Err(e),
    }
}

/// Convert a news article into a post attributed to `author`.
pub fn article_to_post(article: &NewsArticle, author: &NewsAuthor, now: DateTime<Utc>) -> Post {
    let tags = extract_tags(
        article.source_name.as_deref(),
        &article.title,
        article.description.as_deref(),
    );

    let mut body = String::new();
    if let Some(description) = &article.description {
        body.push_str(description);
    }
    if let Some(content) = &article.content {
        if article.description.as_deref() != Some(content.as_str()) {
            if !body.is_empty() {
                body.push_str("\n\n");
            }
            body.push_str(content);
        }
    }
    if !body.is_empty() {
        body.push_str("\n\n");
    }
    body.push_str(&format!("[Read the full article]({})", article.url));

    let created_at = article.published_at.unwrap_or(now);

    Post {
        id: uuid::Uuid::new_v4().to_string(),
        title: article.title.clone(),
        content: body,
        author_id: author.id.clone(),
        author_username: author.username.clone(),
        tags,
        created_at,
        updated_at: now,
        reactions: vec![],
        reposts: vec![],
        comments: vec![],
        source_url: Some(article.url.clone()),
        source_name: article.source_name.clone(),
        image_url: article.image_url.clone(),
    }
}

/// Store a batch of articles, skipping any whose source URL is already known.
///
/// Per-article failures are logged and counted, never propagated.
pub async fn import_articles(
    posts: &dyn PostRepository,
    articles: &[NewsArticle],
    author: &NewsAuthor,
    now: DateTime<Utc>,
) -> ImportSummary {
    let mut summary = ImportSummary::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for article in articles {
        if !seen.insert(article.url.as_str()) {
            summary.skipped += 1;
            continue;
        }

        match posts.exists_by_source_url(&article.url).await {
            Ok(true) => {
                summary.skipped += 1;
                continue;
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!("Duplicate check failed for '{}': {e}", article.url);
                summary.failed += 1;
                continue;
            }
        }

        match posts.insert(article_to_post(article, author, now)).await {
            Ok(()) => summary.imported += 1,
            // Lost a race with a concurrent import; the unique index caught it.
            Err(AppError::Conflict(_)) => summary.skipped += 1,
            Err(e) => {
                tracing::warn!("Failed to store article '{}': {e}", article.url);
                summary.failed += 1;
            }
        }
    }

    summary
}

/// Run one full import pass over `categories`.
pub async fn run_import(
    posts: &dyn PostRepository,
    source: &dyn NewsSource,
    categories: &[String],
    author: &NewsAuthor,
) -> ImportSummary {
    let mut summary = ImportSummary::default();

    for category in categories {
        match source.top_headlines(category).await {
            Ok(articles) => {
                let mut batch = import_articles(posts, &articles, author, Utc::now()).await;
                batch.fetched = articles.len();
                tracing::debug!(
                    category = %category,
                    fetched = batch.fetched,
                    imported = batch.imported,
                    "Imported news category"
                );
                summary.merge(batch);
            }
            Err(e) => {
                tracing::warn!("Failed to fetch news category '{}': {e}", category);
                summary.failed_categories.push(category.clone());
            }
        }
    }

    summary
}

/// Owns everything an import run needs and serialises concurrent runs.
///
/// Shared by the periodic scheduler and the HTTP trigger.
pub struct ImportRunner {
    posts: Arc<dyn PostRepository>,
    source: Arc<dyn NewsSource>,
    categories: Vec<String>,
    author: NewsAuthor,
    lock: tokio::sync::Mutex<()>,
}

impl ImportRunner {
    pub fn new(
        posts: Arc<dyn PostRepository>,
        source: Arc<dyn NewsSource>,
        categories: Vec<String>,
        author: NewsAuthor,
    ) -> Self {
        Self {
            posts,
            source,
            categories,
            author,
            lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn author(&self) -> &NewsAuthor {
        &self.author
    }

    /// Run an import. A call made while another run is in progress waits for it.
    pub async fn run(&self) -> ImportSummary {
        let _guard = self.lock.lock().await;

        tracing::info!("Starting news import ({} categories)", self.categories.len());
        let summary = run_import(
            self.posts.as_ref(),
            self.source.as_ref(),
            &self.categories,
            &self.author,
        )
        .await;

        tracing::info!(
            fetched = summary.fetched,
            imported = summary.imported,
            skipped = summary.skipped,
            failed = summary.failed,
            "News import finished"
        );
        summary
    }
}
