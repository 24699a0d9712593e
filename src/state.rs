use std::sync::Arc;

use crate::db::notification_repository::NotificationRepository;
use crate::db::post_repository::PostRepository;
use crate::db::session_repository::SessionRepository;
use crate::db::user_repository::UserRepository;
use crate::news::importer::ImportRunner;

/// Shared handles available to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub post_repo: Arc<dyn PostRepository>,
    pub user_repo: Arc<dyn UserRepository>,
    pub notification_repo: Arc<dyn NotificationRepository>,
    pub session_repo: Arc<dyn SessionRepository>,
    /// `None` when no news API key is configured.
    pub importer: Option<Arc<ImportRunner>>,
    /// `None` disables the `X-Service-Token` header.
    pub service_token: Option<String>,
    pub session_ttl: chrono::Duration,
    pub cookie_secure: bool,
}
