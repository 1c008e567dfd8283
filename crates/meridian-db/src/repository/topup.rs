//! # Top-Up Request Repository
//!
//! ## Idempotency
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Bank retries the same webhook three times:                            │
//! │                                                                         │
//! │  #1  find_pending_by_code("NAP123456ABC") → Some(req)                  │
//! │      ledger::credit(..) + mark_completed(..)          commit            │
//! │                                                                         │
//! │  #2  find_pending_by_code("NAP123456ABC") → None      no-op             │
//! │  #3  find_pending_by_code("NAP123456ABC") → None      no-op             │
//! │                                                                         │
//! │  mark_completed / mark_failed are also guarded on status = 'PENDING',  │
//! │  so two deliveries racing past the read still credit once.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::{TopUpRequest, TopUpRequestId, UserId};

const TOPUP_COLUMNS: &str = "id, user_id, request_code, status, base_amount, bonus_amount, \
                             total_amount, payment_method, qr_image_url, bank_transaction_id, \
                             promo_code_id, wallet_transaction_id, received_amount, \
                             failure_reason, expires_at, completed_at, created_at, updated_at";

#[derive(Debug, Clone)]
pub struct TopUpRepository {
    pool: SqlitePool,
}

impl TopUpRepository {
    pub fn new(pool: SqlitePool) -> Self {
        TopUpRepository { pool }
    }

    /// Persists a new PENDING request.
    ///
    /// A duplicate request code surfaces as `DbError::UniqueViolation`.
    pub async fn insert(&self, request: &TopUpRequest) -> DbResult<()> {
        debug!(id = %request.id, code = %request.request_code, "Inserting top-up request");

        sqlx::query(
            r#"
            INSERT INTO topup_requests (
                id, user_id, request_code, status, base_amount, bonus_amount, total_amount,
                payment_method, qr_image_url, promo_code_id, expires_at, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
            "#,
        )
        .bind(&request.id)
        .bind(&request.user_id)
        .bind(&request.request_code)
        .bind(request.status)
        .bind(request.base_amount)
        .bind(request.bonus_amount)
        .bind(request.total_amount)
        .bind(&request.payment_method)
        .bind(&request.qr_image_url)
        .bind(&request.promo_code_id)
        .bind(request.expires_at)
        .bind(request.created_at)
        .bind(request.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_by_code(&self, request_code: &str) -> DbResult<Option<TopUpRequest>> {
        let request = sqlx::query_as::<_, TopUpRequest>(&format!(
            "SELECT {} FROM topup_requests WHERE request_code = ?1",
            TOPUP_COLUMNS
        ))
        .bind(request_code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(request)
    }

    pub async fn list_for_user(&self, user_id: &UserId, limit: i64) -> DbResult<Vec<TopUpRequest>> {
        let requests = sqlx::query_as::<_, TopUpRequest>(&format!(
            "SELECT {} FROM topup_requests WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            TOPUP_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(requests)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// The PENDING request carrying `request_code`, if any.
pub async fn find_pending_by_code(
    conn: &mut SqliteConnection,
    request_code: &str,
) -> DbResult<Option<TopUpRequest>> {
    let request = sqlx::query_as::<_, TopUpRequest>(&format!(
        "SELECT {} FROM topup_requests WHERE request_code = ?1 AND status = 'PENDING'",
        TOPUP_COLUMNS
    ))
    .bind(request_code)
    .fetch_optional(&mut *conn)
    .await?;

    Ok(request)
}

/// PENDING → COMPLETED, linking the ledger row that credited the wallet.
pub async fn mark_completed(
    conn: &mut SqliteConnection,
    id: &TopUpRequestId,
    wallet_transaction_id: &str,
    bank_transaction_id: Option<&str>,
    received_amount: i64,
    completed_at: DateTime<Utc>,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE topup_requests SET
            status = 'COMPLETED',
            wallet_transaction_id = ?2,
            bank_transaction_id = ?3,
            received_amount = ?4,
            completed_at = ?5,
            updated_at = ?5
        WHERE id = ?1 AND status = 'PENDING'
        "#,
    )
    .bind(id)
    .bind(wallet_transaction_id)
    .bind(bank_transaction_id)
    .bind(received_amount)
    .bind(completed_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("TopUpRequest", id.as_str(), "no longer pending"));
    }
    Ok(())
}

/// PENDING → FAILED with the amount actually received and why.
pub async fn mark_failed(
    conn: &mut SqliteConnection,
    id: &TopUpRequestId,
    bank_transaction_id: Option<&str>,
    received_amount: i64,
    failure_reason: &str,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE topup_requests SET
            status = 'FAILED',
            bank_transaction_id = ?2,
            received_amount = ?3,
            failure_reason = ?4,
            updated_at = ?5
        WHERE id = ?1 AND status = 'PENDING'
        "#,
    )
    .bind(id)
    .bind(bank_transaction_id)
    .bind(received_amount)
    .bind(failure_reason)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict("TopUpRequest", id.as_str(), "no longer pending"));
    }
    Ok(())
}
