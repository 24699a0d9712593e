use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::Session;
use crate::error::AppError;

/// Repository trait for login sessions.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn insert(&self, session: Session) -> Result<(), AppError>;

    /// Find a session by token hash that has not expired at `now`.
    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError>;

    async fn delete(&self, token_hash: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the SessionRepository.
pub struct MongoSessionRepository {
    collection: mongodb::Collection<Session>,
}

impl MongoSessionRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("sessions"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let models = vec![
            IndexModel::builder()
                .keys(doc! { "token_hash": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            // MongoDB purges expired sessions in the background.
            IndexModel::builder()
                .keys(doc! { "expires_at": 1 })
                .options(
                    IndexOptions::builder()
                        .expire_after(std::time::Duration::from_secs(0))
                        .build(),
                )
                .build(),
        ];

        self.collection.create_indexes(models).await?;
        Ok(())
    }
}

#[async_trait]
impl SessionRepository for MongoSessionRepository {
    async fn insert(&self, session: Session) -> Result<(), AppError> {
        self.collection.insert_one(&session).await?;
        Ok(())
    }

    async fn find_active(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<Session>, AppError> {
        use mongodb::bson::doc;

        // The TTL monitor runs once a minute, so expiry is checked here too.
        Ok(self
            .collection
            .find_one(doc! {
                "token_hash": token_hash,
                "expires_at": { "$gt": mongodb::bson::DateTime::from_chrono(now) }
            })
            .await?)
    }

    async fn delete(&self, token_hash: &str) -> Result<(), AppError> {
        use mongodb::bson::doc;

        self.collection
            .delete_one(doc! { "token_hash": token_hash })
            .await?;
        Ok(())
    }
}
