use crate::auth::middleware::ImportCaller;
use crate::auth::models::ImportTrigger;
use crate::error::AppError;
use crate::news::importer::{ImportRunner, ImportSummary};

/// Run an import on behalf of `trigger`.
///
/// Returns `Unavailable` when news import is not configured.
pub async fn process_import(
    runner: Option<&ImportRunner>,
    trigger: &ImportTrigger,
) -> Result<ImportSummary, AppError> {
    let runner = runner.ok_or_else(|| {
        AppError::Unavailable("News import is not configured (NEWS_API_KEY is unset)".into())
    })?;

    match trigger {
        ImportTrigger::User(username) => {
            tracing::info!("News import triggered by user '{}'", username)
        }
        ImportTrigger::Service => tracing::info!("News import triggered by service token"),
    }

    Ok(runner.run().await)
}

/// Axum handler for `POST /api/news/import`.
pub async fn import_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    ImportCaller(trigger): ImportCaller,
) -> Result<axum::Json<ImportSummary>, AppError> {
    let summary = process_import(state.importer.as_deref(), &trigger).await?;
    Ok(axum::Json(summary))
}
