use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::CurrentUser;
use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Notification, NotificationKind};
use crate::db::notification_repository::NotificationRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;
use crate::rendering::mentions::extract_mentions;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 200;

/// A notification as returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationView {
    pub id: String,
    pub kind: NotificationKind,
    pub sender_id: String,
    pub sender_username: String,
    pub post_id: Option<String>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationView {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            kind: n.kind,
            sender_id: n.sender_id,
            sender_username: n.sender_username,
            post_id: n.post_id,
            read: n.read,
            created_at: n.created_at,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListNotificationsQuery {
    #[serde(default)]
    pub unread: bool,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnreadCountResponse {
    pub unread: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

/// Record a notification for `recipient_id`.
///
/// Users are never notified about their own actions. Failures are logged
/// and swallowed so they never undo the action that caused them.
pub async fn notify(
    notifications: &dyn NotificationRepository,
    recipient_id: &str,
    kind: NotificationKind,
    sender: &AuthenticatedUser,
    post_id: Option<&str>,
) {
    if recipient_id == sender.user_id {
        return;
    }

    let notification = Notification {
        id: uuid::Uuid::new_v4().to_string(),
        recipient_id: recipient_id.to_string(),
        kind,
        sender_id: sender.user_id.clone(),
        sender_username: sender.username.clone(),
        post_id: post_id.map(str::to_string),
        read: false,
        created_at: Utc::now(),
    };

    if let Err(e) = notifications.insert(notification).await {
        tracing::warn!("Failed to record {:?} notification for {recipient_id}: {e}", kind);
    }
}

/// Notify every existing user mentioned as `@username` in `text`.
pub async fn notify_mentions(
    users: &dyn UserRepository,
    notifications: &dyn NotificationRepository,
    text: &str,
    sender: &AuthenticatedUser,
    post_id: &str,
) {
    let mentioned = extract_mentions(text);
    if mentioned.is_empty() {
        return;
    }

    match users.find_by_usernames(&mentioned).await {
        Ok(found) => {
            for user in found {
                notify(
                    notifications,
                    &user.id,
                    NotificationKind::Mention,
                    sender,
                    Some(post_id),
                )
                .await;
            }
        }
        Err(e) => tracing::warn!("Failed to resolve mentions: {e}"),
    }
}

pub async fn process_list_notifications(
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    query: &ListNotificationsQuery,
) -> Result<Vec<NotificationView>, AppError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

    Ok(notifications
        .list_for(&user.user_id, query.unread, limit)
        .await?
        .into_iter()
        .map(NotificationView::from)
        .collect())
}

pub async fn process_mark_read(
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    if !notifications.mark_read(&user.user_id, id).await? {
        return Err(AppError::NotFound(format!("Notification '{}' not found", id)));
    }
    Ok(())
}

pub async fn process_delete_notification(
    notifications: &dyn NotificationRepository,
    user: &AuthenticatedUser,
    id: &str,
) -> Result<(), AppError> {
    if !notifications.delete(&user.user_id, id).await? {
        return Err(AppError::NotFound(format!("Notification '{}' not found", id)));
    }
    Ok(())
}

/// Axum handler for `GET /api/notifications`.
pub async fn list_notifications_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Query(query): axum::extract::Query<ListNotificationsQuery>,
) -> Result<axum::Json<Vec<NotificationView>>, AppError> {
    let result =
        process_list_notifications(state.notification_repo.as_ref(), &user, &query).await?;
    Ok(axum::Json(result))
}

/// Axum handler for `GET /api/notifications/unread-count`.
pub async fn unread_count_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<axum::Json<UnreadCountResponse>, AppError> {
    let unread = state.notification_repo.unread_count(&user.user_id).await?;
    Ok(axum::Json(UnreadCountResponse { unread }))
}

/// Axum handler for `POST /api/notifications/{id}/read`.
pub async fn mark_read_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    process_mark_read(state.notification_repo.as_ref(), &user, &id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

/// Axum handler for `POST /api/notifications/read-all`.
pub async fn mark_all_read_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<axum::Json<MarkAllReadResponse>, AppError> {
    let updated = state.notification_repo.mark_all_read(&user.user_id).await?;
    Ok(axum::Json(MarkAllReadResponse { updated }))
}

/// Axum handler for `DELETE /api/notifications/{id}`.
pub async fn delete_notification_handler(
    axum::extract::State(state): axum::extract::State<crate::app::AppState>,
    CurrentUser(user): CurrentUser,
    axum::extract::Path(id): axum::extract::Path<String>,
) -> Result<axum::http::StatusCode, AppError> {
    process_delete_notification(state.notification_repo.as_ref(), &user, &id).await?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{auth_user, sample_user, MemoryNotificationRepo, MemoryUserRepo};

    #[tokio::test]
    async fn test_notify_skips_self() {
        let repo = MemoryNotificationRepo::new();
        let alice = auth_user("u1", "alice");

        notify(&repo, "u1", NotificationKind::Like, &alice, Some("p1")).await;
        assert!(repo.notifications.lock().unwrap().is_empty());

        notify(&repo, "u2", NotificationKind::Like, &alice, Some("p1")).await;
        let stored = repo.notifications.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].sender_username, "alice");
        assert!(!stored[0].read);
    }

    #[tokio::test]
    async fn test_notify_mentions_only_existing_users() {
        let users = MemoryUserRepo::new();
        users.insert(sample_user("u2", "bob")).await.unwrap();
        let repo = MemoryNotificationRepo::new();
        let alice = auth_user("u1", "alice");

        notify_mentions(&users, &repo, "hey @bob and @ghost", &alice, "p1").await;

        let stored = repo.notifications.lock().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].recipient_id, "u2");
        assert_eq!(stored[0].kind, NotificationKind::Mention);
    }

    #[tokio::test]
    async fn test_list_and_mark_read_scoped_to_owner() {
        let repo = MemoryNotificationRepo::new();
        let alice = auth_user("u1", "alice");
        let bob = auth_user("u2", "bob");

        notify(&repo, "u2", NotificationKind::Follow, &alice, None).await;
        notify(&repo, "u2", NotificationKind::Like, &alice, Some("p1")).await;

        let listed = process_list_notifications(&repo, &bob, &ListNotificationsQuery::default())
            .await
            .unwrap();
        assert_eq!(listed.len(), 2);

        // Alice cannot mark Bob's notification
        let id = listed[0].id.clone();
        let result = process_mark_read(&repo, &alice, &id).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        process_mark_read(&repo, &bob, &id).await.unwrap();
        let unread = process_list_notifications(
            &repo,
            &bob,
            &ListNotificationsQuery {
                unread: true,
                limit: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(unread.len(), 1);
        assert_ne!(unread[0].id, id);
    }

    #[tokio::test]
    async fn test_delete_notification() {
        let repo = MemoryNotificationRepo::new();
        let alice = auth_user("u1", "alice");
        let bob = auth_user("u2", "bob");
        notify(&repo, "u2", NotificationKind::Follow, &alice, None).await;
        let id = repo.notifications.lock().unwrap()[0].id.clone();

        assert!(process_delete_notification(&repo, &alice, &id).await.is_err());
        process_delete_notification(&repo, &bob, &id).await.unwrap();
        assert!(repo.notifications.lock().unwrap().is_empty());
    }
}
