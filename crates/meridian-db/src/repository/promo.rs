//! # Promo Code Repository
//!
//! Promo codes are looked up by their upper-cased code. Usage is recorded
//! only when a top-up actually completes.

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use crate::error::DbResult;
use meridian_core::{PromoCode, PromoCodeId, TopUpRequestId, UserId};

const PROMO_COLUMNS: &str = "id, code, discount_type, discount_value, max_bonus, min_amount, \
                             usage_limit, usage_count, is_active, starts_at, expires_at";

#[derive(Debug, Clone)]
pub struct PromoRepository {
    pool: SqlitePool,
}

impl PromoRepository {
    pub fn new(pool: SqlitePool) -> Self {
        PromoRepository { pool }
    }

    /// Looks up a promo by its normalized (upper-case) code.
    pub async fn get_by_code(&self, code: &str) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {} FROM promo_codes WHERE code = ?1",
            PROMO_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    pub async fn get(&self, id: &PromoCodeId) -> DbResult<Option<PromoCode>> {
        let promo = sqlx::query_as::<_, PromoCode>(&format!(
            "SELECT {} FROM promo_codes WHERE id = ?1",
            PROMO_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(promo)
    }

    /// Inserts a promo code (seeding and tests).
    pub async fn insert(&self, promo: &PromoCode) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO promo_codes (
                id, code, discount_type, discount_value, max_bonus, min_amount,
                usage_limit, usage_count, is_active, starts_at, expires_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&promo.id)
        .bind(&promo.code)
        .bind(promo.discount_type)
        .bind(promo.discount_value)
        .bind(promo.max_bonus)
        .bind(promo.min_amount)
        .bind(promo.usage_limit)
        .bind(promo.usage_count)
        .bind(promo.is_active)
        .bind(promo.starts_at)
        .bind(promo.expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Whether this user already redeemed the promo on a completed top-up.
    pub async fn has_user_used(&self, promo_id: &PromoCodeId, user_id: &UserId) -> DbResult<bool> {
        let used = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM promo_code_usages WHERE promo_code_id = ?1 AND user_id = ?2",
        )
        .bind(promo_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(used > 0)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Same as [`PromoRepository::has_user_used`], inside a transaction.
pub async fn usage_exists(
    conn: &mut SqliteConnection,
    promo_id: &PromoCodeId,
    user_id: &UserId,
) -> DbResult<bool> {
    let used = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM promo_code_usages WHERE promo_code_id = ?1 AND user_id = ?2",
    )
    .bind(promo_id)
    .bind(user_id)
    .fetch_one(&mut *conn)
    .await?;

    Ok(used > 0)
}

/// Records a redemption and bumps the promo's usage counter.
pub async fn record_usage(
    conn: &mut SqliteConnection,
    promo_id: &PromoCodeId,
    user_id: &UserId,
    topup_request_id: &TopUpRequestId,
    bonus_amount: i64,
) -> DbResult<()> {
    let now = Utc::now();

    sqlx::query(
        r#"
        INSERT INTO promo_code_usages (
            id, promo_code_id, user_id, topup_request_id, bonus_amount, used_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(promo_id)
    .bind(user_id)
    .bind(topup_request_id)
    .bind(bonus_amount)
    .bind(now)
    .execute(&mut *conn)
    .await?;

    sqlx::query("UPDATE promo_codes SET usage_count = usage_count + 1 WHERE id = ?1")
        .bind(promo_id)
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use meridian_core::{DiscountType, TopUpRequest, TopUpStatus};

    fn welcome() -> PromoCode {
        PromoCode {
            id: PromoCodeId::from("promo-1"),
            code: "WELCOME10".to_string(),
            discount_type: DiscountType::Percentage,
            discount_value: 10,
            max_bonus: Some(50_000),
            min_amount: 100_000,
            usage_limit: Some(100),
            usage_count: 0,
            is_active: true,
            starts_at: None,
            expires_at: None,
        }
    }

    #[tokio::test]
    async fn test_usage_is_recorded_once_per_user() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let promo = welcome();
        db.promos().insert(&promo).await.unwrap();

        let found = db.promos().get_by_code("WELCOME10").await.unwrap().unwrap();
        assert_eq!(found.discount_type, DiscountType::Percentage);

        let now = Utc::now();
        let request = TopUpRequest {
            id: TopUpRequestId::generate(),
            user_id: UserId::from("alice"),
            request_code: "NAP111111AAA".to_string(),
            status: TopUpStatus::Pending,
            base_amount: 200_000,
            bonus_amount: 20_000,
            total_amount: 220_000,
            payment_method: "bank_transfer".to_string(),
            qr_image_url: "https://qr.example/x.png".to_string(),
            bank_transaction_id: None,
            promo_code_id: Some(promo.id.clone()),
            wallet_transaction_id: None,
            received_amount: None,
            failure_reason: None,
            expires_at: now + Duration::minutes(15),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        db.topups().insert(&request).await.unwrap();

        let alice = UserId::from("alice");
        assert!(!db.promos().has_user_used(&promo.id, &alice).await.unwrap());

        let mut conn = db.pool().acquire().await.unwrap();
        assert!(!usage_exists(&mut conn, &promo.id, &alice).await.unwrap());
        record_usage(&mut conn, &promo.id, &alice, &request.id, 20_000)
            .await
            .unwrap();
        let second = record_usage(&mut conn, &promo.id, &alice, &request.id, 20_000).await;
        assert!(second.unwrap_err().is_unique_violation());
        drop(conn);

        assert!(db.promos().has_user_used(&promo.id, &alice).await.unwrap());
        let after = db.promos().get(&promo.id).await.unwrap().unwrap();
        assert_eq!(after.usage_count, 1);
    }
}
