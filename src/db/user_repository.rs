use async_trait::async_trait;

use crate::db::models::{ProfileUpdate, User};
use crate::error::AppError;

/// Repository trait for user accounts and the follow graph.
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a new user. A taken username or email yields `AppError::Conflict`.
    async fn insert(&self, user: User) -> Result<(), AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError>;

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    /// Lookup by email. Callers pass the lowercased address.
    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError>;

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError>;

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError>;

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool, AppError>;

    /// Add the follow edge. Returns `true` only if it did not exist yet.
    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError>;

    /// Remove the follow edge. Returns `true` if it existed.
    async fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the UserRepository.
pub struct MongoUserRepository {
    collection: mongodb::Collection<User>,
}

impl MongoUserRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("users"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let unique = || IndexOptions::builder().unique(true).build();
        let models = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
        ];

        self.collection.create_indexes(models).await?;
        Ok(())
    }

    async fn find_many(&self, filter: mongodb::bson::Document) -> Result<Vec<User>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "username": 1 })
            .await?;

        Ok(cursor.try_collect().await?)
    }
}

#[async_trait]
impl UserRepository for MongoUserRepository {
    async fn insert(&self, user: User) -> Result<(), AppError> {
        match self.collection.insert_one(&user).await {
            Ok(_) => Ok(()),
            Err(e) if crate::error::is_duplicate_key(&e) => Err(AppError::Conflict(
                "Username or email already registered".into(),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;
        Ok(self.collection.find_one(doc! { "id": id }).await?)
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;
        // Usernames are stored lowercase
        Ok(self
            .collection
            .find_one(doc! { "username": username.to_lowercase() })
            .await?)
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        use mongodb::bson::doc;
        Ok(self.collection.find_one(doc! { "email": email }).await?)
    }

    async fn find_by_ids(&self, ids: &[String]) -> Result<Vec<User>, AppError> {
        use mongodb::bson::doc;
        if ids.is_empty() {
            return Ok(vec![]);
        }
        self.find_many(doc! { "id": { "$in": ids } }).await
    }

    async fn find_by_usernames(&self, usernames: &[String]) -> Result<Vec<User>, AppError> {
        use mongodb::bson::doc;
        if usernames.is_empty() {
            return Ok(vec![]);
        }
        let usernames: Vec<String> = usernames.iter().map(|u| u.to_lowercase()).collect();
        self.find_many(doc! { "username": { "$in": usernames } }).await
    }

    async fn update_profile(&self, id: &str, update: &ProfileUpdate) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let mut set = doc! {};
        if let Some(display_name) = &update.display_name {
            set.insert("display_name", display_name.as_str());
        }
        if let Some(bio) = &update.bio {
            set.insert("bio", bio.as_str());
        }
        if let Some(avatar_url) = &update.avatar_url {
            set.insert("avatar_url", avatar_url.as_str());
        }

        if set.is_empty() {
            return Ok(self.find_by_id(id).await?.is_some());
        }

        let result = self
            .collection
            .update_one(doc! { "id": id }, doc! { "$set": set })
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn follow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(
                doc! { "id": followee_id, "followers": { "$ne": follower_id } },
                doc! { "$addToSet": { "followers": follower_id } },
            )
            .await?;

        // Unconditional: also repairs a half-applied edge.
        self.collection
            .update_one(
                doc! { "id": follower_id },
                doc! { "$addToSet": { "following": followee_id } },
            )
            .await?;

        Ok(result.modified_count > 0)
    }

    async fn unfollow(&self, follower_id: &str, followee_id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(
                doc! { "id": followee_id },
                doc! { "$pull": { "followers": follower_id } },
            )
            .await?;

        self.collection
            .update_one(
                doc! { "id": follower_id },
                doc! { "$pull": { "following": followee_id } },
            )
            .await?;

        Ok(result.modified_count > 0)
    }
}
