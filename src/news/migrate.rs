use std::path::Path;

use chrono::Utc;
use serde::Deserialize;

use crate::db::post_repository::PostRepository;
use crate::error::AppError;
use crate::news::client::{ApiArticle, NewsArticle};
use crate::news::importer::{import_articles, ImportSummary, NewsAuthor};

/// Accepted layouts of a local article file.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArticleFile {
    /// A saved NewsAPI response: `{ "status": "ok", "articles": [...] }`.
    Wrapped { articles: Vec<ApiArticle> },
    /// A bare array of articles.
    List(Vec<ApiArticle>),
}

/// Parse a local article file. Unusable entries are dropped.
pub fn parse_articles(json: &str) -> Result<Vec<NewsArticle>, AppError> {
    let file: ArticleFile = serde_json::from_str(json)
        .map_err(|e| AppError::BadRequest(format!("Invalid article file: {e}")))?;

    let raw = match file {
        ArticleFile::Wrapped { articles } => articles,
        ArticleFile::List(articles) => articles,
    };

    Ok(raw.into_iter().filter_map(ApiArticle::into_article).collect())
}

pub async fn load_articles_file(path: &Path) -> Result<Vec<NewsArticle>, AppError> {
    let json = tokio::fs::read_to_string(path).await.map_err(|e| {
        AppError::BadRequest(format!("Failed to read '{}': {e}", path.display()))
    })?;

    parse_articles(&json)
}

/// Move articles from a local file into the database, deduplicated by URL.
///
/// Safe to re-run: already migrated articles are skipped.
pub async fn migrate_file(
    posts: &dyn PostRepository,
    path: &Path,
    author: &NewsAuthor,
) -> Result<ImportSummary, AppError> {
    let articles = load_articles_file(path).await?;
    tracing::info!(
        "Migrating {} articles from '{}'",
        articles.len(),
        path.display()
    );

    let mut summary = import_articles(posts, &articles, author, Utc::now()).await;
    summary.fetched = articles.len();
    Ok(summary)
}
