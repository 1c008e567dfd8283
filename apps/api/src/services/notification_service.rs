//! Notification publishing.
//!
//! Services publish only after their transaction commits, and a failed
//! publish never fails the operation that triggered it.

use async_trait::async_trait;
use tracing::{debug, warn};

use meridian_core::Notification;
use meridian_db::{DbError, NotificationRepository};

#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Outbox write failed: {0}")]
    Outbox(#[from] DbError),

    #[error("Publisher rejected notification: {0}")]
    Rejected(String),
}

/// Sink for customer notifications.
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    async fn publish(&self, notification: Notification) -> Result<(), PublishError>;
}

/// Default publisher: writes to the `notifications` outbox table.
pub struct OutboxPublisher {
    repo: NotificationRepository,
}

impl OutboxPublisher {
    pub fn new(repo: NotificationRepository) -> Self {
        OutboxPublisher { repo }
    }
}

#[async_trait]
impl NotificationPublisher for OutboxPublisher {
    async fn publish(&self, notification: Notification) -> Result<(), PublishError> {
        let id = self.repo.queue(&notification).await?;
        debug!(outbox_id = %id, event = %notification.event, "Notification queued");
        Ok(())
    }
}

/// Publishes each notification, logging failures instead of returning them.
pub async fn publish_best_effort(
    publisher: &dyn NotificationPublisher,
    notifications: Vec<Notification>,
) {
    for notification in notifications {
        let event = notification.event.clone();
        let recipient = notification.recipient.clone();
        if let Err(e) = publisher.publish(notification).await {
            warn!(event = %event, recipient = %recipient, error = %e, "Notification not published");
        }
    }
}
