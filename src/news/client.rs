use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// A news article ready for import. Always has a title and a source URL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub content: Option<String>,
    pub url: String,
    pub image_url: Option<String>,
    pub source_name: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
}

/// The article shape returned by NewsAPI (and stored in legacy import files).
///
/// Every field is nullable upstream.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiArticle {
    #[serde(default)]
    pub source: Option<ApiSource>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub url_to_image: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiSource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Placeholder NewsAPI uses for articles pulled after publication.
const REMOVED_MARKER: &str = "[Removed]";

impl ApiArticle {
    /// Convert into an importable article, dropping entries without a usable
    /// title or URL.
    pub fn into_article(self) -> Option<NewsArticle> {
        let title = non_blank(self.title)?;
        if title == REMOVED_MARKER {
            return None;
        }
        let url = non_blank(self.url)?;
        if !url.starts_with("http://") && !url.starts_with("https://") {
            return None;
        }

        Some(NewsArticle {
            title,
            description: non_blank(self.description),
            content: non_blank(self.content),
            url,
            image_url: non_blank(self.url_to_image),
            source_name: non_blank(self.source.and_then(|s| s.name)),
            published_at: self.published_at,
        })
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Deserialize)]
struct TopHeadlinesResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

/// A source of news articles, abstracted so tests can run without the network.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NewsSource: Send + Sync {
    /// Fetch the current top headlines for a category.
    async fn top_headlines(&self, category: &str) -> Result<Vec<NewsArticle>, AppError>;
}

/// NewsAPI-compatible HTTP client.
pub struct NewsApiClient {
    http: reqwest::Client,
    base_url: url::Url,
    api_key: String,
    country: String,
    page_size: u32,
}

impl NewsApiClient {
    pub fn new(
        base_url: &str,
        api_key: impl Into<String>,
        country: impl Into<String>,
        page_size: u32,
    ) -> Result<Self, AppError> {
        let mut base_url = url::Url::parse(base_url)
            .map_err(|e| AppError::Internal(format!("Invalid news API URL: {e}")))?;
        // Relative joins keep a path prefix only when the base ends in `/`
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .user_agent(concat!("inkpost/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url,
            api_key: api_key.into(),
            country: country.into(),
            page_size,
        })
    }

    /// Build the config-driven client, or `None` when no API key is set.
    pub fn from_config(config: &crate::config::AppConfig) -> Result<Option<Self>, AppError> {
        config
            .news_api_key()
            .map(|key| {
                Self::new(
                    &config.news_api_url,
                    key,
                    config.news_country.clone(),
                    config.news_page_size,
                )
            })
            .transpose()
    }

    pub fn headlines_url(&self, category: &str) -> Result<url::Url, AppError> {
        let mut url = self
            .base_url
            .join("v2/top-headlines")
            .map_err(|e| AppError::Internal(format!("Invalid news API URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("country", &self.country)
            .append_pair("category", category)
            .append_pair("pageSize", &self.page_size.to_string());

        Ok(url)
    }
}

#[async_trait]
impl NewsSource for NewsApiClient {
    async fn top_headlines(&self, category: &str) -> Result<Vec<NewsArticle>, AppError> {
        let url = self.headlines_url(category)?;

        let response = self
            .http
            .get(url)
            .header("X-Api-Key", &self.api_key)
            .send()
            .await
            .map_err(|e| AppError::Upstream(format!("News API request failed: {e}")))?;

        let status = response.status();
        let body: TopHeadlinesResponse = response
            .json()
            .await
            .map_err(|e| AppError::Upstream(format!("Invalid news API response: {e}")))?;

        if !status.is_success() || body.status != "ok" {
            return Err(AppError::Upstream(format!(
                "News API returned {} for category '{}': {}",
                status,
                category,
                body.message.unwrap_or_else(|| body.status.clone())
            )));
        }

        Ok(body
            .articles
            .into_iter()
            .filter_map(ApiArticle::into_article)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_headlines_url() {
        let client = NewsApiClient::new("https://newsapi.org", "key", "us", 20).unwrap();
        let url = client.headlines_url("science").unwrap();
        assert_eq!(url.path(), "/v2/top-headlines");
        let query = url.query().unwrap();
        assert!(query.contains("country=us"));
        assert!(query.contains("category=science"));
        assert!(query.contains("pageSize=20"));
        // The key travels in a header, never in the URL.
        assert!(!query.contains("key"));
    }

    #[test]
    fn test_headlines_url_keeps_path_prefix() {
        for base in ["https://proxy.test/newsapi", "https://proxy.test/newsapi/"] {
            let client = NewsApiClient::new(base, "key", "us", 20).unwrap();
            let url = client.headlines_url("science").unwrap();
            assert_eq!(url.path(), "/newsapi/v2/top-headlines");
        }
    }

    #[test]
    fn test_parse_api_response() {
        let json = r###"{
            "status": "ok",
            "totalResults": 3,
            "articles": [
                {
                    "source": { "id": "bbc-news", "name": "BBC News" },
                    "author": "Someone",
                    "title": "Rust adoption grows",
                    "description": "More teams use Rust",
                    "url": "https://example.com/rust",
                    "urlToImage": "https://example.com/rust.png",
                    "publishedAt": "2024-05-01T12:00:00Z",
                    "content": null
                },
                {
                    "source": { "id": null, "name": "Nobody" },
                    "title": "[Removed]",
                    "url": "https://removed.com"
                },
                {
                    "source": { "id": null, "name": "Nobody" },
                    "title": "No link",
                    "url": null
                }
            ]
        }"###;

        let response: TopHeadlinesResponse = serde_json::from_str(json).unwrap();
        let articles: Vec<NewsArticle> = response
            .articles
            .into_iter()
            .filter_map(ApiArticle::into_article)
            .collect();

        assert_eq!(articles.len(), 1);
        let article = &articles[0];
        assert_eq!(article.title, "Rust adoption grows");
        assert_eq!(article.source_name.as_deref(), Some("BBC News"));
        assert_eq!(article.image_url.as_deref(), Some("https://example.com/rust.png"));
        assert!(article.content.is_none());
        assert!(article.published_at.is_some());
    }

    #[test]
    fn test_non_http_url_rejected() {
        let article = ApiArticle {
            title: Some("Title".into()),
            url: Some("ftp://example.com/x".into()),
            ..Default::default()
        };
        assert!(article.into_article().is_none());
    }

    #[test]
    fn test_blank_fields_become_none() {
        let article = ApiArticle {
            title: Some("  Title  ".into()),
            description: Some("   ".into()),
            url: Some("https://example.com/a".into()),
            source: Some(ApiSource {
                id: None,
                name: Some("".into()),
            }),
            ..Default::default()
        };
        let article = article.into_article().unwrap();
        assert_eq!(article.title, "Title");
        assert!(article.description.is_none());
        assert!(article.source_name.is_none());
    }
}
