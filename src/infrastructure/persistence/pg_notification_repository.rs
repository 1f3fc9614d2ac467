use async_trait::async_trait;
use sqlx::PgPool;

use crate::application::ports::{NotificationRepository, RepositoryError};
use crate::domain::Notification;

pub struct PgNotificationRepository {
    pool: PgPool,
}

impl PgNotificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl NotificationRepository for PgNotificationRepository {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notifications (id, user_id, task_id, category, action, title, \
             message, priority, created_at, read_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(notification.id)
        .bind(notification.user_id.as_uuid())
        .bind(notification.task_id.map(|id| id.as_uuid()))
        .bind(&notification.category)
        .bind(&notification.action)
        .bind(&notification.title)
        .bind(&notification.message)
        .bind(&notification.priority)
        .bind(notification.created_at)
        .bind(notification.read_at)
        .execute(&self.pool)
        .await
        .map_err(|e| RepositoryError::QueryFailed(e.to_string()))?;
        Ok(())
    }
}
