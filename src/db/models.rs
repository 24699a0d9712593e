use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A blog entry stored in the `posts` collection.
///
/// Comments, reactions and reposts are embedded in the post document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    /// Public identifier (uuid v4).
    pub id: String,
    pub title: String,
    /// Sanitised HTML/markdown body.
    pub content: String,
    pub author_id: String,
    /// Denormalised for listing without a user lookup.
    pub author_username: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    /// Ids of users who reposted this post.
    #[serde(default)]
    pub reposts: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
    /// Original article URL for imported news. Unique when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// A comment embedded in a post. `parent_id` links replies into threads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub author_id: String,
    pub author_username: String,
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// The kinds of reaction a user can leave on a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReactionKind {
    Like,
    Love,
    Laugh,
    Wow,
    Sad,
    Angry,
}

impl ReactionKind {
    pub const ALL: [ReactionKind; 6] = [
        ReactionKind::Like,
        ReactionKind::Love,
        ReactionKind::Laugh,
        ReactionKind::Wow,
        ReactionKind::Sad,
        ReactionKind::Angry,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReactionKind::Like => "like",
            ReactionKind::Love => "love",
            ReactionKind::Laugh => "laugh",
            ReactionKind::Wow => "wow",
            ReactionKind::Sad => "sad",
            ReactionKind::Angry => "angry",
        }
    }
}

/// One user's reaction to a post. A user holds at most one per post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub user_id: String,
    pub kind: ReactionKind,
}

/// Per-kind reaction counters derived from a post's reactions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReactionCounts {
    pub like: u32,
    pub love: u32,
    pub laugh: u32,
    pub wow: u32,
    pub sad: u32,
    pub angry: u32,
    pub total: u32,
}

impl ReactionCounts {
    pub fn from_reactions(reactions: &[Reaction]) -> Self {
        let mut counts = Self::default();
        for reaction in reactions {
            let slot = match reaction.kind {
                ReactionKind::Like => &mut counts.like,
                ReactionKind::Love => &mut counts.love,
                ReactionKind::Laugh => &mut counts.laugh,
                ReactionKind::Wow => &mut counts.wow,
                ReactionKind::Sad => &mut counts.sad,
                ReactionKind::Angry => &mut counts.angry,
            };
            *slot += 1;
            counts.total += 1;
        }
        counts
    }
}

/// A registered account stored in the `users` collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    /// Unique, stored lowercased.
    pub email: String,
    /// Unique, case preserved.
    pub username: String,
    /// Argon2 PHC string. Empty for system accounts that cannot log in.
    pub password_hash: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
    /// Ids of users following this user.
    #[serde(default)]
    pub followers: Vec<String>,
    /// Ids of users this user follows.
    #[serde(default)]
    pub following: Vec<String>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// Editable profile fields. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Mention,
    Follow,
    Repost,
}

/// An entry in a user's notification inbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub recipient_id: String,
    pub kind: NotificationKind,
    pub sender_id: String,
    pub sender_username: String,
    #[serde(default)]
    pub post_id: Option<String>,
    #[serde(default)]
    pub read: bool,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
}

/// A login session. Only the SHA-256 of the cookie token is stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    pub expires_at: DateTime<Utc>,
}
