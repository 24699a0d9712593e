//! In-memory repositories shared by unit tests.

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::auth::models::AuthenticatedUser;
use crate::db::models::{Comment, Notification, Post, ProfileUpdate, Reaction, ReactionKind, Session, User};
use crate::db::notification_repository::NotificationRepository;
use crate::db::post_repository::{PostChanges, PostQuery, PostRepository};
use crate::db::session_repository::SessionRepository;
use crate::db::user_repository::UserRepository;
use crate::error::AppError;

pub fn sample_user(id: &str, username: &str) -> User {
    User {
        id: id.to_string(),
        email: format!("{username}@example.com"),
        username: username.to_string(),
        password_hash: String::new(),
        display_name: None,
        bio: None,
        avatar_url: None,
        followers: vec![],
        following: vec![],
        created_at: Utc::now(),
    }
}

pub fn auth_user(id: &str, username: &str) -> AuthenticatedUser {
    AuthenticatedUser {
        user_id: id.to_string(),
        username: username.to_string(),
        email: format!("{username}@example.com"),
    }
}

pub fn sample_post(id: &str, author_id: &str, author_username: &str) -> Post {
    let now = Utc::now();
    Post {
        id: id.to_string(),
        title: format!("Post {id}"),
        content: "Some body text".to_string(),
        author_id: author_id.to_string(),
        author_username: author_username.to_string(),
        tags: vec![],
        created_at: now,
        updated_at: now,
        reactions: vec![],
        reposts: vec![],
        comments: vec![],
        source_url: None,
        source_name: None,
        image_url: None,
    }
}

pub struct MemoryPostRepo {
    pub posts: Mutex<Vec<Post>>,
}

impl MemoryPostRepo {
    pub fn new() -> Self {
        Self {
            posts: Mutex::new(vec![]),
        }
    }

    fn matching(&self, query: &PostQuery) -> Vec<Post> {
        let search = query.search.as_ref().map(|s| s.to_lowercase());
        let mut found: Vec<Post> = self
            .posts
            .lock()
            .unwrap()
            .iter()
            .filter(|p| query.tag.as_ref().is_none_or(|t| p.tags.contains(t)))
            .filter(|p| query.author_id.as_ref().is_none_or(|a| &p.author_id == a))
            .filter(|p| {
                query
                    .author_ids
                    .as_ref()
                    .is_none_or(|ids| ids.contains(&p.author_id))
            })
            .filter(|p| {
                search.as_ref().is_none_or(|s| {
                    p.title.to_lowercase().contains(s) || p.content.to_lowercase().contains(s)
                })
            })
            .cloned()
            .collect();

        found.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        found
    }

    fn with_post<T>(&self, id: &str, f: impl FnOnce(&mut Post) -> T) -> Option<T> {
        self.posts.lock().unwrap().iter_mut().find(|p| p.id == id).map(f)
    }
}

#[async_trait]
impl PostRepository for MemoryPostRepo {
    async fn insert(&self, post: Post) -> Result<(), AppError> {
        let mut posts = self.posts.lock().unwrap();
        if let Some(url) = &post.source_url {
            if posts.iter().any(|p| p.source_url.as_ref() == Some(url)) {
                return Err(AppError::Conflict(format!("Duplicate source URL '{url}'")));
            }
        }
        posts.push(post);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>, AppError> {
        Ok(self.posts.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, AppError> {
        Ok(self
            .matching(query)
            .into_iter()
            .skip(query.skip as usize)
            .take(query.limit.max(0) as usize)
            .collect())
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, AppError> {
        Ok(self.matching(query).len() as u64)
    }

    async fn update(
        &self,
        id: &str,
        changes: &PostChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        Ok(self
            .with_post(id, |p| {
                if let Some(title) = &changes.title {
                    p.title = title.clone();
                }
                if let Some(content) = &changes.content {
                    p.content = content.clone();
                }
                if let Some(tags) = &changes.tags {
                    p.tags = tags.clone();
                }
                p.updated_at = updated_at;
            })
            .is_some())
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let mut posts = self.posts.lock().unwrap();
        let before = posts.len();
        posts.retain(|p| p.id != id);
        Ok(posts.len() < before)
    }

    async fn exists_by_source_url(&self, url: &str) -> Result<bool, AppError> {
        Ok(self
            .posts
            .lock()
            .unwrap()
            .iter()
            .any(|p| p.source_url.as_deref() == Some(url)))
    }

    async fn add_comment(&self, post_id: &str, comment: Comment) -> Result<bool, AppError> {
        Ok(self.with_post(post_id, |p| p.comments.push(comment)).is_some())
    }

    async fn remove_comments(
        &self,
        post_id: &str,
        comment_ids: &[String],
    ) -> Result<bool, AppError> {
        Ok(self
            .with_post(post_id, |p| p.comments.retain(|c| !comment_ids.contains(&c.id)))
            .is_some())
    }

    async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: Option<ReactionKind>,
    ) -> Result<bool, AppError> {
        Ok(self
            .with_post(post_id, |p| {
                p.reactions.retain(|r| r.user_id != user_id);
                if let Some(kind) = kind {
                    p.reactions.push(Reaction {
                        user_id: user_id.to_string(),
                        kind,
                    });
                }
            })
            .is_some())
    }

    async fn add_repost(&self, post_id: &str, user_id: &str) -> Result<bool, AppError> {
        Ok(self
            .with_post(post_id, |p| {
                if p.reposts.iter().any(|u| u == user_id) {
                    false
                } else {
                    p.reposts.push(user_id.to_string());
                    true
                }
            })
            .unwrap_or(false))
    }
}

pub struct MemoryUserRepo {
    pub users: Mutex<Vec<User>>,
}

impl MemoryUserRepo {
    pub fn new() -> Self {
        Self {
            users: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl UserRepository for MemoryUserRepo {
    async fn insert(&self, user: User) -> Result<(), AppError> {
        let mut users = self.users.lock().unwrap();
        if users
            .iter()
            .any(|u| {
                u.id == user.id
                    || u.username.eq_ignore_ascii_case(&user.username)
                    || u.email == user.email
            })
        {
            return Err(AppError::Conflict(
                "Username or email already registered".into(),
            ));
        }
        users.push(user);
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        Ok(self.users.lock().unwrap().iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username.eq_ignore_ascii_case(username))
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| ids.contains(&u.id))
            .cloned()
            .collect())
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError> {
        Ok(self
            .users
            .lock()
            .unwrap()
            .iter()
            .filter(|u| usernames.iter().any(|n| n.eq_ignore_ascii_case(&u.username)))
            .cloned()
            .collect())
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let Some(user) = users.iter_mut().find(|u| u.id == id) else {
            return Ok(false);
        };
        if let Some(display_name) = &update.display_name {
            user.display_name = Some(display_name.clone());
        }
        if let Some(bio) = &update.bio {
            user.bio = Some(bio.clone());
        }
        if let Some(avatar_url) = &update.avatar_url {
            user.avatar_url = Some(avatar_url.clone());
        }
        Ok(true)
    }

    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let mut added = false;
        for user in users.iter_mut() {
            if user.id == followee_id && !user.followers.iter().any(|f| f == follower_id) {
                user.followers.push(follower_id.to_string());
                added = true;
            }
            if user.id == follower_id && !user.following.iter().any(|f| f == followee_id) {
                user.following.push(followee_id.to_string());
            }
        }
        Ok(added)
    }

    async fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError> {
        let mut users = self.users.lock().unwrap();
        let mut removed = false;
        for user in users.iter_mut() {
            if user.id == followee_id {
                let before = user.followers.len();
                user.followers.retain(|f| f != follower_id);
                removed = user.followers.len() < before;
            }
            if user.id == follower_id {
                user.following.retain(|f| f != followee_id);
            }
        }
        Ok(removed)
    }
}

pub struct MemoryNotificationRepo {
    pub notifications: Mutex<Vec<Notification>>,
}

impl MemoryNotificationRepo {
    pub fn new() -> Self {
        Self {
            notifications: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl NotificationRepository for MemoryNotificationRepo {
    async fn insert(&self, notification: Notification) -> Result<(), AppError> {
        self.notifications.lock().unwrap().push(notification);
        Ok(())
    }

    async fn list_for(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        let mut found: Vec<Notification> = self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && (!unread_only || !n.read))
            .cloned()
            .collect();
        found.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        found.truncate(limit.max(0) as usize);
        Ok(found)
    }

    async fn unread_count(&self, recipient_id: &str) -> Result<u64, AppError> {
        Ok(self
            .notifications
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient_id == recipient_id && !n.read)
            .count() as u64)
    }

    async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        let mut notifications = self.notifications.lock().unwrap();
        match notifications
            .iter_mut()
            .find(|n| n.id == id && n.recipient_id == recipient_id)
        {
            Some(n) => {
                n.read = true;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        let mut updated = 0;
        for n in self.notifications.lock().unwrap().iter_mut() {
            if n.recipient_id == recipient_id && !n.read {
                n.read = true;
                updated += 1;
            }
        }
        Ok(updated)
    }

    async fn delete(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        let mut notifications = self.notifications.lock().unwrap();
        let before = notifications.len();
        notifications.retain(|n| !(n.id == id && n.recipient_id == recipient_id));
        Ok(notifications.len() < before)
    }
}

pub struct MemorySessionRepo {
    pub sessions: Mutex<Vec<Session>>,
}

impl MemorySessionRepo {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(vec![]),
        }
    }
}

#[async_trait]
impl SessionRepository for MemorySessionRepo {
    async fn insert(&self, session: Session) -> Result<(), AppError> {
        self.sessions.lock().unwrap().push(session);
        Ok(())
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.token_hash == token_hash && s.expires_at > now)
            .cloned())
    }

    async fn delete(&self, token_hash: &str) -> Result<(), AppError> {
        self.sessions
            .lock()
            .unwrap()
            .retain(|s| s.token_hash != token_hash);
        Ok(())
    }
}
