use async_trait::async_trait;

use super::RepositoryError;
use crate::domain::Notification;

#[async_trait]
pub trait NotificationRepository: Send + Sync {
    async fn insert(&self, notification: &Notification) -> Result<(), RepositoryError>;
}
