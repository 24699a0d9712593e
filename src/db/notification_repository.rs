use async_trait::async_trait;

use crate::db::models::Notification;
use crate::error::AppError;

/// Repository trait for notification inboxes.
///
/// Every read/write is scoped to a recipient so users only ever touch their own.
#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: Notification) -> Result<(), AppError>;

    /// Newest first, at most `limit` entries.
    async fn list_for(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError>;

    async fn unread_count(&self, recipient_id: &str) -> Result<u64, AppError>;

    /// Returns `false` if no such notification belongs to the recipient.
    async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError>;

    /// Returns the number of notifications that changed.
    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError>;

    async fn delete(&self, recipient_id: &str, id: &str) -> Result<bool, AppError>;
}

/// MongoDB implementation of the NotificationRepository.
pub struct MongoNotificationRepository {
    collection: mongodb::Collection<Notification>,
}

impl MongoNotificationRepository {
    pub fn new(db: &mongodb::Database) -> Self {
        Self {
            collection: db.collection("notifications"),
        }
    }

    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        let models = vec![
            IndexModel::builder()
                .keys(doc! { "id": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder()
                .keys(doc! { "recipient_id": 1, "read": 1, "created_at": -1 })
                .build(),
        ];

        self.collection.create_indexes(models).await?;
        Ok(())
    }
}

#[async_trait]
impl NotificationRepository for MongoNotificationRepository {
    async fn insert(&self, notification: Notification) -> Result<(), AppError> {
        self.collection.insert_one(&notification).await?;
        Ok(())
    }

    async fn list_for(
        &self,
        recipient_id: &str,
        unread_only: bool,
        limit: i64,
    ) -> Result<Vec<Notification>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;

        let mut filter = doc! { "recipient_id": recipient_id };
        if unread_only {
            filter.insert("read", false);
        }

        let cursor = self
            .collection
            .find(filter)
            .sort(doc! { "created_at": -1 })
            .limit(limit)
            .await?;

        Ok(cursor.try_collect().await?)
    }

    async fn unread_count(&self, recipient_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        Ok(self
            .collection
            .count_documents(doc! { "recipient_id": recipient_id, "read": false })
            .await?)
    }

    async fn mark_read(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_one(
                doc! { "id": id, "recipient_id": recipient_id },
                doc! { "$set": { "read": true } },
            )
            .await?;

        Ok(result.matched_count > 0)
    }

    async fn mark_all_read(&self, recipient_id: &str) -> Result<u64, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .update_many(
                doc! { "recipient_id": recipient_id, "read": false },
                doc! { "$set": { "read": true } },
            )
            .await?;

        Ok(result.modified_count)
    }

    async fn delete(&self, recipient_id: &str, id: &str) -> Result<bool, AppError> {
        use mongodb::bson::doc;

        let result = self
            .collection
            .delete_one(doc! { "id": id, "recipient_id": recipient_id })
            .await?;

        Ok(result.deleted_count > 0)
    }
}
