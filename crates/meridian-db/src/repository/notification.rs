//! # Notification Outbox Repository
//!
//! Durable record of customer notifications, written after the owning
//! transaction commits. A failed write is logged by the publisher and never
//! reaches the caller. Rows are delivered by a separate worker, which reads
//! the `notifications` table directly; this crate only appends.

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use meridian_core::Notification;

/// Repository for notification outbox operations.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    pool: SqlitePool,
}

impl NotificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        NotificationRepository { pool }
    }

    /// Queues a notification for delivery. Returns the outbox id.
    pub async fn queue(&self, notification: &Notification) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();
        let data = serde_json::to_string(&notification.data)
            .map_err(|e| DbError::corrupt("notification.data", e))?;

        debug!(
            event = %notification.event,
            recipient = %notification.recipient,
            entity_id = %notification.entity_id,
            "Queuing notification"
        );

        sqlx::query(
            r#"
            INSERT INTO notifications (
                id, recipient, channel, event, actor, entity_type, entity_id,
                data, message, link, attempts, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11)
            "#,
        )
        .bind(&id)
        .bind(&notification.recipient)
        .bind(notification.channel)
        .bind(&notification.event)
        .bind(&notification.actor)
        .bind(&notification.entity_type)
        .bind(&notification.entity_id)
        .bind(data)
        .bind(&notification.message)
        .bind(&notification.link)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    /// Entries not yet marked delivered.
    pub async fn count_pending(&self) -> DbResult<i64> {
        let count: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE delivered_at IS NULL")
                .fetch_one(&self.pool)
                .await?;
        Ok(count)
    }
}
