use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};

use inkpost::config::{AppConfig, NEWS_CATEGORIES};
use inkpost::db::notification_repository::MongoNotificationRepository;
use inkpost::db::post_repository::{MongoPostRepository, PostRepository};
use inkpost::db::session_repository::MongoSessionRepository;
use inkpost::db::user_repository::MongoUserRepository;
use inkpost::news::client::NewsApiClient;
use inkpost::news::importer::{ensure_news_author, ImportRunner};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Run one news import and exit.
    Import,
    /// Import articles from a local JSON file and exit.
    Migrate {
        /// A NewsAPI response or a bare array of articles.
        #[arg(long)]
        file: PathBuf,
    },
}

struct Repositories {
    posts: Arc<MongoPostRepository>,
    users: Arc<MongoUserRepository>,
    notifications: Arc<MongoNotificationRepository>,
    sessions: Arc<MongoSessionRepository>,
}

async fn connect(config: &AppConfig) -> anyhow::Result<Repositories> {
    let client = mongodb::Client::with_uri_str(&config.mongodb_uri)
        .await
        .context("Failed to connect to MongoDB")?;
    let db = client.database(&config.mongodb_database);

    let repos = Repositories {
        posts: Arc::new(MongoPostRepository::new(&db)),
        users: Arc::new(MongoUserRepository::new(&db)),
        notifications: Arc::new(MongoNotificationRepository::new(&db)),
        sessions: Arc::new(MongoSessionRepository::new(&db)),
    };

    repos.posts.ensure_indexes().await?;
    repos.users.ensure_indexes().await?;
    repos.notifications.ensure_indexes().await?;
    repos.sessions.ensure_indexes().await?;

    tracing::info!(
        "Connected to MongoDB database '{}'",
        config.mongodb_database
    );
    Ok(repos)
}

/// Build the import runner, or `None` when no API key is configured.
async fn build_importer(
    config: &AppConfig,
    repos: &Repositories,
) -> anyhow::Result<Option<Arc<ImportRunner>>> {
    let Some(client) = NewsApiClient::from_config(config)? else {
        tracing::warn!("NEWS_API_KEY is not set; news import is disabled");
        return Ok(None);
    };

    let author = ensure_news_author(repos.users.as_ref(), &config.news_author_username).await?;
    let posts: Arc<dyn PostRepository> = repos.posts.clone();

    Ok(Some(Arc::new(ImportRunner::new(
        posts,
        Arc::new(client),
        NEWS_CATEGORIES.iter().map(|c| c.to_string()).collect(),
        author,
    ))))
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let repos = connect(&config).await?;
    let importer = build_importer(&config, &repos).await?;

    if let Some(runner) = &importer {
        match config.import_interval() {
            Some(period) => {
                let _scheduler =
                    inkpost::news::scheduler::spawn_periodic_import(runner.clone(), period);
            }
            None => {
                // No timer: still import once at startup
                let runner = runner.clone();
                tokio::spawn(async move {
                    runner.run().await;
                });
            }
        }
    }

    let state = inkpost::app::AppState {
        post_repo: repos.posts.clone(),
        user_repo: repos.users.clone(),
        notification_repo: repos.notifications.clone(),
        session_repo: repos.sessions.clone(),
        importer,
        service_token: config.service_token().map(str::to_string),
        session_ttl: config.session_ttl(),
        cookie_secure: config.cookie_secure,
    };

    let mut app = inkpost::app::build_router(state);
    if let Some(origin) = &config.cors_origin {
        app = app.layer(inkpost::app::cors_layer(origin)?);
        tracing::info!("CORS enabled for {}", origin);
    }

    tracing::info!("Listening on http://{}", config.bind_addr);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await?;
    Ok(())
}

async fn import_once(config: AppConfig) -> anyhow::Result<()> {
    let repos = connect(&config).await?;
    let runner = build_importer(&config, &repos)
        .await?
        .context("NEWS_API_KEY must be set to import news")?;

    let summary = runner.run().await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn migrate(config: AppConfig, file: PathBuf) -> anyhow::Result<()> {
    let repos = connect(&config).await?;
    let author = ensure_news_author(repos.users.as_ref(), &config.news_author_username).await?;

    let summary = inkpost::news::migrate::migrate_file(repos.posts.as_ref(), &file, &author).await?;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "inkpost=info,tower_http=info".into()),
        )
        .init();

    let cli = Cli::parse();
    let config = AppConfig::from_env()?;

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Import => import_once(config).await,
        Command::Migrate { file } => migrate(config, file).await,
    }
}
