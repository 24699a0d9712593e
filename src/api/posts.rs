use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::api::comments::{build_comment_tree, CommentNode};
use crate::api::notifications::notify_mentions;
use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Post, ReactionCounts, ReactionKind};
use crate::db::notification_repository::NotificationRepository;
use crate::db::post_repository::{PostChanges, PostQuery, PostRepository};
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::rendering::content::{excerpt, render_markdown, EXCERPT_LEN};

pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_POST_TAGS: usize = 10;
pub const DEFAULT_PAGE_SIZE: i64 = 20;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Partial edit. Omitted fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdatePostRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListPostsQuery {
    pub tag: Option<String>,
    /// Author username.
    pub author: Option<String>,
    pub q: Option<String>,
    pub page: Option<u64>,
    pub limit: Option<i64>,
}

/// A post as it appears in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostSummary {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    pub author_id: String,
    pub author_username: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reactions: ReactionCounts,
    pub comment_count: usize,
    pub repost_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<&Post> for PostSummary {
    fn from(post: &Post) -> Self {
        Self {
            id: post.id.clone(),
            title: post.title.clone(),
            excerpt: excerpt(&post.content, EXCERPT_LEN),
            author_id: post.author_id.clone(),
            author_username: post.author_username.clone(),
            tags: post.tags.clone(),
            created_at: post.created_at,
            updated_at: post.updated_at,
            reactions: ReactionCounts::from_reactions(&post.reactions),
            comment_count: post.comments.len(),
            repost_count: post.reposts.len(),
            source_url: post.source_url.clone(),
            source_name: post.source_name.clone(),
            image_url: post.image_url.clone(),
        }
    }
}

/// A full post with threaded comments.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostDetail {
    pub id: String,
    pub title: String,
    /// Markdown exactly as the author wrote it.
    pub content: String,
    /// `content` rendered to sanitized HTML.
    pub content_html: String,
    pub author_id: String,
    pub author_username: String,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub reactions: ReactionCounts,
    pub reposts: Vec<String>,
    pub comments: Vec<CommentNode>,
    pub comment_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub my_reaction: Option<ReactionKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl PostDetail {
    /// Build the detail view. `viewer_id` fills in `my_reaction`.
    pub fn new(post: Post, viewer_id: Option<&str>) -> Self {
        let my_reaction = viewer_id.and_then(|viewer| {
            post.reactions
                .iter()
                .find(|r| r.user_id == viewer)
                .map(|r| r.kind)
        });

        Self {
            reactions: ReactionCounts::from_reactions(&post.reactions),
            comments: build_comment_tree(&post.comments),
            comment_count: post.comments.len(),
            my_reaction,
            id: post.id,
            title: post.title,
            content_html: render_markdown(&post.content),
            content: post.content,
            author_id: post.author_id,
            author_username: post.author_username,
            tags: post.tags,
            created_at: post.created_at,
            updated_at: post.updated_at,
            reposts: post.reposts,
            source_url: post.source_url,
            source_name: post.source_name,
            image_url: post.image_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostPage {
    pub posts: Vec<PostSummary>,
    pub page: u64,
    pub limit: i64,
    pub total: u64,
}

impl PostPage {
    fn empty(page: u64, limit: i64) -> Self {
        Self {
            posts: vec![],
            page,
            limit,
            total: 0,
        }
    }
}

/// Validate and trim a post title.
pub fn validate_title(title: &str) -> Result<String, AppError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(AppError::BadRequest("Title cannot be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(AppError::BadRequest(format!(
            "Title cannot exceed {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

/// Trim, lowercase and deduplicate tags, keeping first-seen order.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, AppError> {
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !normalized.contains(&tag) {
            normalized.push(tag);
        }
    }

    if normalized.len() > MAX_POST_TAGS {
        return Err(AppError::BadRequest(format!(
            "A post can have at most {} tags",
            MAX_POST_TAGS
        )));
    }
    Ok(normalized)
}

fn validate_content(content: &str) -> Result<String, AppError> {
    if content.trim().is_empty() {
        return Err(AppError::BadRequest("Content cannot be empty".into()));
    }
    Ok(content.to_string())
}

/// Resolve `page`/`limit` into (page, limit, skip).
fn paging(page: Option<u64>, limit: Option<i64>) -> (u64, i64, u64) {
    let page = page.unwrap_or(1).max(1);
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let skip = (page - 1).saturating_mul(limit as u64);
    (page, limit, skip)
}

async fn fetch_page(
    posts: &dyn PostRepository,
    query: PostQuery,
    page: u64,
) -> Result<PostPage, AppError> {
    let total = posts.count(&query).await?;
    let items = posts.list(&query).await?;

    Ok(PostPage {
        posts: items.iter().map(PostSummary::from).collect(),
        page,
        limit: query.limit,
        total,
    })
}

async fn load_post(posts: &dyn PostRepository, id: &str) -> Result<Post, AppError> {
    posts
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Post '{}' not found", id)))
}

/// Validate and store a new post, then notify mentioned users.
pub async fn process_create_post(
    posts: &dyn PostRepository,
    users: &dyn UserRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    request: CreatePostRequest,
    now: DateTime<Utc>,
) -> Result<PostDetail, AppError> {
    let title = validate_title(&request.title)?;
    let content = validate_content(&request.content)?;
    let tags = normalize_tags(&request.tags)?;

    let post = Post {
        id: uuid::Uuid::new_v4().to_string(),
        title,
        content,
        author_id: user.user_id.clone(),
        author_username: user.username.clone(),
        tags,
        created_at: now,
        updated_at: now,
        reactions: vec![],
        reposts: vec![],
        comments: vec![],
        source_url: None,
        source_name: None,
        image_url: None,
    };

    posts.insert(post.clone()).await?;
    tracing::info!("Post '{}' created by {}", post.id, user.username);

    notify_mentions(users, notifications, &request.content, user, &post.id).await;

    Ok(PostDetail::new(post, Some(&user.user_id)))
}

pub async fn process_list_posts(
    posts: &dyn PostRepository,
    users: &dyn UserRepository,
    query: &ListPostsQuery,
) -> Result<PostPage, AppError> {
    let (page, limit, skip) = paging(query.page, query.limit);

    let author_id = match query.author.as_deref().map(str::trim) {
        Some(username) if !username.is_empty() => match users.find_by_username(username).await? {
            Some(author) => Some(author.id),
            None => return Ok(PostPage::empty(page, limit)),
        },
        _ => None,
    };

    let post_query = PostQuery {
        tag: query
            .tag
            .as_deref()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty()),
        author_id,
        author_ids: None,
        search: query
            .q
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(str::to_string),
        skip,
        limit,
    };

    fetch_page(posts, post_query, page).await
}

/// Posts by the users `user` follows, newest first.
pub async fn process_feed(
    posts: &dyn PostRepository,
    users: &dyn UserRepository,
    user: &AuthenticatedUser,
    page: Option<u64>,
    limit: Option<i64>,
) -> Result<PostPage, AppError> {
    let (page, limit, skip) = paging(page, limit);

    let me = users
        .find_by_id(&user.user_id)
        .await?
        .ok_or_else(|| AppError::Auth("Session user no longer exists".into()))?;

    if me.following.is_empty() {
        return Ok(PostPage::empty(page, limit));
    }

    let query = PostQuery {
        author_ids: Some(me.following),
        skip,
        limit,
        ..Default::default()
    };
    fetch_page(posts, query, page).await
}

pub async fn process_get_post(
    posts: &dyn PostRepository,
    id: &str,
    viewer_id: Option<&str>,
) -> Result<PostDetail, AppError> {
    let post = load_post(posts, id).await?;
    Ok(PostDetail::new(post, viewer_id))
}

/// Apply an edit. Only the author may edit.
pub async fn process_update_post(
    posts: &dyn PostRepository,
    users: &dyn UserRepository,
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    id: &str,
    request: UpdatePostRequest,
    now: DateTime<Utc>,
) -> Result<PostDetail, AppError> {
    let post = load_post(posts, id).await?;
    if post.author_id != user.user_id {
        return Err(AppError::Forbidden("Only the author can edit this post".into()));
    }

    let changes = PostChanges {
        title: request.title.as_deref().map(validate_title).transpose()?,
        content: request.content.as_deref().map(validate_content).transpose()?,
        tags: request.tags.as_deref().map(normalize_tags).transpose()?,
    };

    if !posts.update(id, &changes, now).await? {
        return Err(AppError::NotFound(format!("Post '{}' not found", id)));
    }

    if let Some(content) = &request.content {
        // Only users newly mentioned by the edit are notified
        let before = crate::rendering::mentions::extract_mentions(&post.content);
        let added: Vec<String> = crate::rendering::mentions::extract_mentions(content)
            .into_iter()
            .filter(|name| !before.contains(name))
            .map(|name| format!("@{name}"))
            .collect();
        if !added.is_empty() {
            notify_mentions(users, notifications, &added.join(" "), user, id).await;
        }
    }

    process_get_post(posts, id, Some(&user.user_id)).await
}

/// Delete a post. Only the author may delete.
pub async fn process_delete_post(
    posts: &dyn PostRepository,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    let post = load_post(posts, id).await?;
    if post.author_id != user.user_id {
        return Err(AppError::Forbidden("Only the author can delete this post".into()));
    }

    posts.delete(id).await?;
    tracing::info!("Post '{}' deleted by {}", id, user.username);
    Ok(())
}

/// Axum handler for `POST /api/posts`.
pub async fn create_post_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::Json(request): axum::Json<CreatePostRequest>,
) -> Result<(axum::http::StatusCode, axum::Json<PostDetail>), AppError> {
    let post = process_create_post(
        state.post_repo.as_ref(),
        state.user_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        request,
        Utc::now(),
    )
    .await?;

    Ok((axum::http::StatusCode::CREATED, axum::Json(post)))
}

/// Axum handler for `GET /api/posts`.
pub async fn list_posts_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    axum::extract::Query(query): axum::extract::Query<ListPostsQuery>,
) -> Result<axum::Json<PostPage>, AppError> {
    let page =
        process_list_posts(state.post_repo.as_ref(), state.user_repo.as_ref(), &query).await?;
    Ok(axum::Json(page))
}

/// Axum handler for `GET /api/posts/feed`.
pub async fn feed_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Query(query): axum::extract::Query<ListPostsQuery>,
) -> Result<axum::Json<PostPage>, AppError> {
    let page = process_feed(
        state.post_repo.as_ref(),
        state.user_repo.as_ref(),
        &user,
        query.page,
        query.limit,
    )
    .await?;
    Ok(axum::Json(page))
}

/// Axum handler for `GET /api/posts/{id}`.
///
/// Public; a valid session additionally fills in `my_reaction`.
pub async fn get_post_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    viewer: Option<CurrentUser>,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::Json<PostDetail>, AppError> {
    let viewer_id = viewer.map(|CurrentUser(user)| user.user_id);
    let post = process_get_post(state.post_repo.as_ref(), &id, viewer_id.as_deref()).await?;
    Ok(axum::Json(post))
}

/// Axum handler for `PUT /api/posts/{id}`.
pub async fn update_post_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(id): axum::extract::Path<String>,
    axum::Json(request): axum::Json<UpdatePostRequest>,
) -> Result<axum::Json<PostDetail>, AppError> {
    let post = process_update_post(
        state.post_repo.as_ref(),
        state.user_repo.as_ref(),
        state.notification_repo.as_ref(),
        &user,
        &id,
        request,
        Utc::now(),
    )
    .await?;
    Ok(axum::Json(post))
}

/// Axum handler for `DELETE /api/posts/{id}`.
pub async fn delete_post_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    process_delete_post(state.post_repo.as_ref(), &user, &id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}
