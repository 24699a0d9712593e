use serde::{Deserialize, Serialize};

use crate::api::notifications::notify;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{NotificationKind, Post, ReactionCounts, ReactionKind};
use crate::db::notification_repository::NotificationRepository;
use crate::db::post_repository::PostRepository;
use crate::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReactRequest {
    pub kind: ReactionKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionResponse {
    pub reactions: ReactionCounts,
    /// The caller's reaction after the toggle, if any.
    pub my_reaction: Option<ReactionKind>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepostResponse {
    pub reposted: bool,
    pub repost_count: usize,
}

async fn load_post(posts: &dyn PostRepository, id: &str) -> Result<Post, AppError> {
    posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post '{}' not found", id)))
}

/// Toggle the caller's reaction on a post.
///
/// Same kind again clears it; a different kind replaces it.
pub async fn process_react(
    posts: &dyn PostRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    post_id: &str,
    kind: ReactionKind,
) -> Result<ReactionResponse, AppError> {
    let post = load_post(posts, post_id).await?;

    let current = post
        .reactions
        .iter()
        .find(|r| r.user_id == user.user_id)
        .map(|r| r.kind);
    let next = if current == Some(kind) { None } else { Some(kind) };

    if !posts.set_reaction(post_id, &user.user_id, next).await? {
        return Err(AppError::NotFound(format!("Post '{}' not found", post_id)));
    }

    if next == Some(ReactionKind::Like) {
        notify(
            notifications,
            &post.author_id,
            NotificationKind::Like,
            user,
            Some(post_id),
        )
        .await;
    }

    let updated = load_post(posts, post_id).await?;
    Ok(ReactionResponse {
        reactions: ReactionCounts::from_reactions(&updated.reactions),
        my_reaction: updated
            .reactions
            .iter()
            .find(|r| r.user_id == user.user_id)
            .map(|r| r.kind),
    })
}

/// Repost a post. Repeating is a no-op; only the first repost notifies.
pub async fn process_repost(
    posts: &dyn PostRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    post_id: &str,
) -> Result<RepostResponse, AppError> {
    let post = load_post(posts, post_id).await?;
    if post.author_id == user.user_id {
        return Err(AppError::BadRequest("You cannot repost your own post".into()));
    }

    let added = posts.add_repost(post_id, &user.user_id).await?;
    if added {
        notify(
            notifications,
            &post.author_id,
            NotificationKind::Repost,
            user,
            Some(post_id),
        )
        .await;
    }

    let updated = load_post(posts, post_id).await?;
    Ok(RepostResponse {
        reposted: true,
        repost_count: updated.reposts.len(),
    })
}

/// Axum handler for `POST /api/posts/{id}/reactions`.
pub async fn react_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(post_id): axum::extract::Path<String>,
    axum::Json(request): axum::Json<ReactRequest>,
) -> Result<axum::Json<ReactionResponse>, AppError> {
    let response = process_react(
        state.post_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        &post_id,
        request.kind,
    )
    .await?;
    Ok(axum::Json(response))
}

/// Axum handler for `POST /api/posts/{id}/repost`.
pub async fn repost_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(post_id): axum::extract::Path<String>,
) -> Result<axum::Json<RepostResponse>, AppError> {
    let response = process_repost(
        state.post_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        &post_id,
    )
    .await?;
    Ok(axum::Json(response))
}
