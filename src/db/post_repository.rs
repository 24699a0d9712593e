use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Comment, Post, ReactionKind};
use crate::error::AppError;

/// Filters and paging for post listings. Results are always newest first.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    /// Only posts carrying this tag.
    pub tag: Option<String>,
    /// Only posts by this author.
    pub author_id: Option<String>,
    /// Only posts by any of these authors (following feed).
    pub author_ids: Option<Vec<String>>,
    /// Case-insensitive substring match on title or content.
    pub search: Option<String>,
    pub skip: u64,
    pub limit: i64,
}

/// Fields changed by a post edit. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub tags: Option<Vec<String>>,
}

/// Repository trait for post operations.
///
/// This trait allows mocking the database layer in tests.
#[async_trait]
pub trait PostRepository: Send + Sync {
    /// Insert a new post. A duplicate `source_url` yields `AppError::Conflict`.
    async fn insert(&self, post: Post) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>, AppError>;

    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, AppError>;

    /// Count the posts matching `query`, ignoring paging.
    async fn count(&self, query: &PostQuery) -> Result<u64, AppError>;

    /// Apply an edit. Returns `false` if the post does not exist.
    async fn update(
        &self,
        id: &str,
        changes: &PostChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError>;

    async fn delete(&self, id: &str) -> Result<bool, AppError>;

    /// Whether an imported post with this source URL is already stored.
    async fn exists_by_source_url(&self, url: &str) -> Result<bool, AppError>;

    async fn add_comment(&self, post_id: &str, comment: Comment) -> Result<bool, AppError>;

    /// Remove every comment whose id is in `comment_ids`.
    async fn remove_comments(&self, post_id: &str, comment_ids: &[String])
        -> Result<bool, AppError>;

    /// Replace the user's reaction with `kind`, or clear it when `None`.
    async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: Option<ReactionKind>,
    ) -> Result<bool, AppError>;

    /// Record a repost. Returns `true` only the first time a user reposts.
    async fn add_repost(&self, post_id: &str, user_id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the PostRepository.
pub struct MongoPostRepository {
    collection: mongodb::Collection<Post>,
}

impl MongoPostRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("posts"),
        }
    }

    /// Create the indexes the repository relies on. Safe to call on every start.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let models = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            // Guards the import dedup against concurrent runs.
            IndexModel::builder()
                .keys(doc! { "source_url": 1 })
                .options(
                    IndexOptions::builder()
                        .unique(true)
                        .partial_filter_expression(doc! { "source_url": { "$exists": true } })
                        .build(),
                )
                .build(),
            IndexModel::builder()
                .keys(doc! { "created_at": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "tags": 1, "created_at": -1 })
                .build(),
            IndexModel::builder()
                .keys(doc! { "author_id": 1, "created_at": -1 })
                .build(),
        ];

        self.collection.create_indexes(models).await?;
        Ok(())
    }
}

/// Build the MongoDB filter for a listing query.
pub(crate) fn build_filter(query: &PostQuery) -> mongodb::bson::Document {
    use mongodb::bson::{doc, Regex};

    let mut filter = doc! {};

    if let Some(tag) = &query.tag {
        filter.insert("tags", tag.as_str());
    }
    if let Some(author_id) = &query.author_id {
        filter.insert("author_id", author_id.as_str());
    }
    if let Some(author_ids) = &query.author_ids {
        filter.insert("author_id", doc! { "$in": author_ids.clone() });
    }
    if let Some(search) = &query.search {
        let regex = Regex {
            pattern: escape_regex(search),
            options: "i".to_string(),
        };
        filter.insert(
            "$or",
            vec![
                doc! { "title": regex.clone() },
                doc! { "content": regex },
            ],
        );
    }

    filter
}

/// Escape regex metacharacters so user input matches literally.
fn escape_regex(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if "\\^$.|?*+()[]{}".contains(c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[async_trait]
impl PostRepository for MongoPostRepository {
    async fn insert(&self, post: Post) -> Result<(), AppError> {
        match self.collection.insert_one(&post).await {
            Ok(_) => Ok(()),
            Err(e) if crate::error::is_duplicate_key(&e) => Err(AppError::Conflict(format!(
                "Post with source URL '{}' already exists",
                post.source_url.as_deref().unwrap_or_default()
            ))),
            Err(e) => Err(AppError::Database(e.to_string())),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Post>, AppError> {
        use mongodb::bson::doc;

        self.collection
            .find_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn list(&self, query: &PostQuery) -> Result<Vec<Post>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        let options = FindOptions::builder()
            .sort(doc! { "created_at": -1, "id": 1 })
            .skip(query.skip)
            .limit(query.limit)
            .build();

        let cursor = self
            .collection
            .find(build_filter(query))
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn count(&self, query: &PostQuery) -> Result<u64, AppError> {
        self.collection
            .count_documents(build_filter(query))
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn update(
        &self,
        id: &str,
        changes: &PostChanges,
        updated_at: DateTime<Utc>,
    ) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let mut set = doc! { "updated_at": mongodb::bson::DateTime::from_chrono(updated_at) };
        if let Some(title) = &changes.title {
            set.insert("title", title.as_str());
        }
        if let Some(content) = &changes.content {
            set.insert("content", content.as_str());
        }
        if let Some(tags) = &changes.tags {
            set.insert("tags", tags.clone());
        }

        let result = self
            .collection
            .update_one(doc! { "id": id }, doc! { "$set": set })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn delete(&self, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .delete_one(doc! { "id": id })
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.deleted_count > 0)
    }

    async fn exists_by_source_url(&self, url: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let count = self
            .collection
            .count_documents(doc! { "source_url": url })
            .limit(1)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(count > 0)
    }

    async fn add_comment(&self, post_id: &str, comment: Comment) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let comment = mongodb::bson::to_bson(&comment)
            .map_err(|e| AppError::Internal(format!("Failed to encode comment: {e}")))?;

        let result = self
            .collection
            .update_one(
                doc! { "id": post_id },
                doc! { "$push": { "comments": comment } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn remove_comments(
        &self,
        post_id: &str,
        comment_ids: &[String],
    ) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(
                doc! { "id": post_id },
                doc! { "$pull": { "comments": { "id": { "$in": comment_ids } } } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn set_reaction(
        &self,
        post_id: &str,
        user_id: &str,
        kind: Option<ReactionKind>,
    ) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        // Single pipeline update so the remove-then-add is atomic per document.
        let without_user = doc! {
            "$filter": {
                "input": { "$ifNull": ["$reactions", []] },
                "as": "r",
                "cond": { "$ne": ["$$r.user_id", user_id] }
            }
        };
        let reactions = match kind {
            Some(kind) => doc! {
                "$concatArrays": [
                    without_user,
                    [ { "user_id": user_id, "kind": kind.as_str() } ]
                ]
            },
            None => without_user,
        };

        let result = self
            .collection
            .update_one(
                doc! { "id": post_id },
                vec![doc! { "$set": { "reactions": reactions } }],
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.matched_count > 0)
    }

    async fn add_repost(&self, post_id: &str, user_id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(
                doc! { "id": post_id, "reposts": { "$ne": user_id } },
                doc! { "$addToSet": { "reposts": user_id } },
            )
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.modified_count > 0)
    }
}
