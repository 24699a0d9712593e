use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::notifications::{notify, notify_mentions};
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Comment, NotificationKind};
use crate::db::notification_repository::NotificationRepository;
use crate::db::post_repository::PostRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::rendering::content::render_markdown;

const MAX_COMMENT_LEN: usize = 5_000;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    /// Reply target; must be a comment on the same post.
    #[serde(default)]
    pub parent_id: Option<String>,
}

/// A comment with its replies nested beneath it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentNode {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    pub content_html: String,
    pub parent_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub replies: Vec<CommentNode>,
}

impl From<&Comment> for CommentNode {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id.clone(),
            author_id: c.author_id.clone(),
            author_username: c.author_username.clone(),
            content: c.content.clone(),
            content_html: render_markdown(&c.content),
            parent_id: c.parent_id.clone(),
            created_at: c.created_at,
            replies: vec![],
        }
    }
}

/// Nest flat comments into threads.
///
/// Every level is ordered oldest first. A reply whose parent no longer
/// exists is shown at the top level.
pub fn build_comment_tree(comments: &[Comment]) -> Vec<CommentNode> {
    let ids: HashSet<&str> = comments.iter().map(|c| c.id.as_str()).collect();

    let mut sorted: Vec<&Comment> = comments.iter().collect();
    sorted.sort_by(|a, b| a.created_at.cmp(&b.created_at));

    let mut children: HashMap<&str, Vec<&Comment>> = HashMap::new();
    let mut roots: Vec<&Comment> = Vec::new();
    for comment in sorted {
        match comment.parent_id.as_deref() {
            Some(parent) if parent != comment.id && ids.contains(parent) => {
                children.entry(parent).or_default().push(comment)
            }
            _ => roots.push(comment),
        }
    }

    fn attach(
        comment: &Comment,
        children: &HashMap<&str, Vec<&Comment>>,
        visiting: &mut HashSet<String>,
    ) -> CommentNode {
        let mut node = CommentNode::from(comment);
        // Stored data could contain a parent cycle; never recurse into one.
        if visiting.insert(comment.id.clone()) {
            if let Some(replies) = children.get(comment.id.as_str()) {
                node.replies = replies
                    .iter()
                    .map(|reply| attach(reply, children, visiting))
                    .collect();
            }
        }
        node
    }

    let mut visiting = HashSet::new();
    roots
        .into_iter()
        .map(|root| attach(root, &children, &mut visiting))
        .collect()
}

/// Ids of `root_id` and every reply beneath it.
pub fn collect_subtree(comments: &[Comment], root_id: &str) -> Vec<String> {
    let mut ids = vec![root_id.to_string()];
    let mut cursor = 0;

    while cursor < ids.len() {
        let current = ids[cursor].clone();
        for comment in comments {
            if comment.parent_id.as_deref() == Some(current.as_str()) && !ids.contains(&comment.id)
            {
                ids.push(comment.id.clone());
            }
        }
        cursor += 1;
    }

    ids
}

/// Add a comment or reply, notifying the post author and mentioned users.
pub async fn process_add_comment(
    posts: &dyn PostRepository,
    users: &dyn UserRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    post_id: &str,
    request: CreateCommentRequest,
    now: DateTime<Utc>,
) -> Result<CommentNode, AppError> {
    let content = request.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".into()));
    }
    if content.chars().count() > MAX_COMMENT_LEN {
        return Err(AppError::BadRequest(format!(
            "Comment cannot exceed {} characters",
            MAX_COMMENT_LEN
        )));
    }

    let post = posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post '{}' not found", post_id)))?;

    if let Some(parent_id) = &request.parent_id {
        if !post.comments.iter().any(|c| &c.id == parent_id) {
            return Err(AppError::BadRequest(format!(
                "Parent comment '{}' does not exist on this post",
                parent_id
            )));
        }
    }

    let comment = Comment {
        id: uuid::Uuid::new_v4().to_string(),
        author_id: user.user_id.clone(),
        author_username: user.username.clone(),
        content: content.to_string(),
        parent_id: request.parent_id,
        created_at: now,
    };
    let node = CommentNode::from(&comment);

    if !posts.add_comment(post_id, comment).await? {
        return Err(AppError::NotFound(format!("Post '{}' not found", post_id)));
    }

    notify(
        notifications,
        &post.author_id,
        NotificationKind::Comment,
        user,
        Some(post_id),
    )
    .await;
    notify_mentions(users, notifications, content, user, post_id).await;

    Ok(node)
}

/// Remove a comment and its replies. Allowed for the comment author and the post author.
pub async fn process_delete_comment(
    posts: &dyn PostRepository,
    user: &AuthenticatedUser,
    post_id: &str,
    comment_id: &str,
) -> Result<(), AppError> {
    let post = posts
        .find_by_id(post_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post '{}' not found", post_id)))?;

    let comment = post
        .comments
        .iter()
        .find(|c| c.id == comment_id)
        .ok_or_else(|| AppError::NotFound(format!("Comment '{}' not found", comment_id)))?;

    if comment.author_id != user.user_id && post.author_id != user.user_id {
        return Err(AppError::Forbidden(
            "Only the comment author or post author can delete this comment".into(),
        ));
    }

    let ids = collect_subtree(&post.comments, comment_id);
    posts.remove_comments(post_id, &ids).await?;
    Ok(())
}

/// Axum handler for `POST /api/posts/{id}/comments`.
pub async fn add_comment_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(post_id): axum::extract::Path<String>,
    axum::Json(request): axum::Json<CreateCommentRequest>,
) -> Result<(axum::http::StatusCode, axum::Json<CommentNode>), AppError> {
    let comment = process_add_comment(
        state.post_repo.as_ref(),
        state.user_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        &post_id,
        request,
        Utc::now(),
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, axum::Json(comment)))
}

/// Axum handler for `DELETE /api/posts/{id}/comments/{comment_id}`.
pub async fn delete_comment_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path((post_id, comment_id)): axum::extract::Path<(String, String)>,
) -> Result<axum::http::StatusCode, AppError> {
    process_delete_comment(state.post_repo.as_ref(), &user, &post_id, &comment_id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
