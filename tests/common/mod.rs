#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::mongo::Mongo;

use inkpost::app::{build_router, AppState};
use inkpost::db::notification_repository::{MongoNotificationRepository, NotificationRepository};
use inkpost::db::post_repository::{MongoPostRepository, PostRepository};
use inkpost::db::session_repository::{MongoSessionRepository, SessionRepository};
use inkpost::db::user_repository::{MongoUserRepository, UserRepository};
use inkpost::error::AppError;
use inkpost::news::client::{NewsArticle, NewsSource};
use inkpost::news::importer::{ensure_news_author, ImportRunner};

pub const SERVICE_TOKEN: &str = "test-token";

/// A fixed set of articles returned for every category.
pub struct StaticNewsSource {
    pub articles: Vec<NewsArticle>,
}

#[async_trait]
impl NewsSource for StaticNewsSource {
    async fn top_headlines(&self, _category: &str) -> Result<Vec<NewsArticle>, AppError> {
        Ok(self.articles.clone())
    }
}

pub fn article(url: &str, title: &str, source: &str) -> NewsArticle {
    NewsArticle {
        title: title.to_string(),
        description: Some(format!("{title} explained in detail")),
        content: None,
        url: url.to_string(),
        image_url: None,
        source_name: Some(source.to_string()),
        published_at: None,
    }
}

/// Holds the running MongoDB container and the wired router.
///
/// The container is stopped when this struct is dropped.
pub struct TestEnv {
    _mongo: ContainerAsync<Mongo>,
    pub router: Router,
    pub posts: Arc<dyn PostRepository>,
    pub users: Arc<dyn UserRepository>,
    pub notifications: Arc<dyn NotificationRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub importer: Option<Arc<ImportRunner>>,
}

impl TestEnv {
    /// Start MongoDB and build a router without news import.
    pub async fn start() -> Self {
        Self::start_with_news(None).await
    }

    /// Start MongoDB and build a router whose importer reads from `source`.
    pub async fn start_with_news(source: Option<Arc<dyn NewsSource>>) -> Self {
        Self::start_with_token(source, Some(SERVICE_TOKEN)).await
    }

    /// Like `start_with_news`, with an explicit (possibly absent) service token.
    pub async fn start_with_token(
        source: Option<Arc<dyn NewsSource>>,
        service_token: Option<&str>,
    ) -> Self {
        let mongo_container = Mongo::default()
            .start()
            .await
            .expect("Failed to start MongoDB container");
        let mongo_port = mongo_container
            .get_host_port_ipv4(27017)
            .await
            .expect("Failed to get MongoDB port");
        let mongo_uri = format!("mongodb://127.0.0.1:{}", mongo_port);
        let mongo_client = mongodb::Client::with_uri_str(&mongo_uri)
            .await
            .expect("Failed to connect to MongoDB");
        let db = mongo_client.database("inkpost_test");

        let post_repo = MongoPostRepository::new(&db);
        post_repo.ensure_indexes().await.expect("post indexes");
        let user_repo = MongoUserRepository::new(&db);
        user_repo.ensure_indexes().await.expect("user indexes");
        let notification_repo = MongoNotificationRepository::new(&db);
        notification_repo
            .ensure_indexes()
            .await
            .expect("notification indexes");
        let session_repo = MongoSessionRepository::new(&db);
        session_repo.ensure_indexes().await.expect("session indexes");

        let posts: Arc<dyn PostRepository> = Arc::new(post_repo);
        let users: Arc<dyn UserRepository> = Arc::new(user_repo);
        let notifications: Arc<dyn NotificationRepository> = Arc::new(notification_repo);
        let sessions: Arc<dyn SessionRepository> = Arc::new(session_repo);

        let importer = match source {
            Some(source) => {
                let author = ensure_news_author(users.as_ref(), "newsbot")
                    .await
                    .expect("Failed to create news author");
                Some(Arc::new(ImportRunner::new(
                    posts.clone(),
                    source,
                    vec!["general".to_string(), "technology".to_string()],
                    author,
                )))
            }
            None => None,
        };

        let state = AppState {
            post_repo: posts.clone(),
            user_repo: users.clone(),
            notification_repo: notifications.clone(),
            session_repo: sessions.clone(),
            importer: importer.clone(),
            service_token: service_token.map(str::to_string),
            session_ttl: chrono::Duration::hours(1),
            cookie_secure: false,
        };

        Self {
            _mongo: mongo_container,
            router: build_router(state),
            posts,
            users,
            notifications,
            sessions,
            importer,
        }
    }

    /// A `TestServer` with its own cookie jar, so each one acts as a separate browser.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// A `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .save_cookies()
            .build(self.router.clone())
    }

    /// Register `username` on `server`, leaving it logged in. Returns the user id.
    pub async fn register(&self, server: &axum_test::TestServer, username: &str) -> String {
        let response = server
            .post("/api/auth/register")
            .json(&serde_json::json!({
                "email": format!("{username}@example.com"),
                "username": username,
                "password": "password123"
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        body["id"].as_str().expect("id in response").to_string()
    }

    /// Create a post as the user logged in on `server`. Returns the post id.
    pub async fn create_post(
        &self,
        server: &axum_test::TestServer,
        title: &str,
        content: &str,
    ) -> String {
        let response = server
            .post("/api/posts")
            .json(&serde_json::json!({
                "title": title,
                "content": content,
                "tags": ["test"]
            }))
            .await;
        response.assert_status(axum::http::StatusCode::CREATED);

        let body: serde_json::Value = response.json();
        body["id"].as_str().expect("id in response").to_string()
    }
}
