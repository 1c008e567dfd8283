//! # Wallet Repository
//!
//! Wallet rows, PIN hashes and read access to the ledger. Balance changes
//! live in [`ledger`] and only run inside a transaction.

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::{
    LedgerEntry, LedgerMetadata, TransactionType, UserId, Wallet, WalletId,
};

const WALLET_COLUMNS: &str = "id, user_id, balance, pin_hash, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, wallet_id, amount, balance_before, balance_after, \
                             type AS transaction_type, status, description, metadata, created_at";

/// Flat `wallet_transactions` row. Metadata is a JSON column.
#[derive(Debug, FromRow)]
struct LedgerRow {
    id: String,
    wallet_id: WalletId,
    amount: i64,
    balance_before: i64,
    balance_after: i64,
    transaction_type: TransactionType,
    status: String,
    description: String,
    metadata: String,
    created_at: chrono::DateTime<Utc>,
}

impl TryFrom<LedgerRow> for LedgerEntry {
    type Error = DbError;

    fn try_from(row: LedgerRow) -> DbResult<Self> {
        let metadata: LedgerMetadata = serde_json::from_str(&row.metadata)
            .map_err(|e| DbError::corrupt("wallet_transaction.metadata", e))?;

        Ok(LedgerEntry {
            id: row.id,
            wallet_id: row.wallet_id,
            amount: row.amount,
            balance_before: row.balance_before,
            balance_after: row.balance_after,
            transaction_type: row.transaction_type,
            status: row.status,
            description: row.description,
            metadata,
            created_at: row.created_at,
        })
    }
}

/// Repository for wallet database operations.
#[derive(Debug, Clone)]
pub struct WalletRepository {
    pool: SqlitePool,
}

impl WalletRepository {
    pub fn new(pool: SqlitePool) -> Self {
        WalletRepository { pool }
    }

    pub async fn get(&self, id: &WalletId) -> DbResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE id = ?1",
            WALLET_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    pub async fn get_by_user(&self, user_id: &UserId) -> DbResult<Option<Wallet>> {
        let wallet = sqlx::query_as::<_, Wallet>(&format!(
            "SELECT {} FROM wallets WHERE user_id = ?1",
            WALLET_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Creates an empty wallet for a user.
    ///
    /// Fails with `UniqueViolation` if the user already has one.
    pub async fn create(&self, user_id: &UserId) -> DbResult<Wallet> {
        let now = Utc::now();
        let wallet = Wallet {
            id: WalletId::generate(),
            user_id: user_id.clone(),
            balance: 0,
            pin_hash: None,
            created_at: now,
            updated_at: now,
        };

        debug!(id = %wallet.id, user_id = %user_id, "Creating wallet");

        sqlx::query(
            r#"
            INSERT INTO wallets (id, user_id, balance, pin_hash, created_at, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&wallet.id)
        .bind(&wallet.user_id)
        .bind(wallet.balance)
        .bind(&wallet.pin_hash)
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(wallet)
    }

    /// Returns the user's wallet, creating an empty one on first use.
    pub async fn get_or_create(&self, user_id: &UserId) -> DbResult<Wallet> {
        if let Some(wallet) = self.get_by_user(user_id).await? {
            return Ok(wallet);
        }

        match self.create(user_id).await {
            Ok(wallet) => Ok(wallet),
            // Lost a race with another first use
            Err(e) if e.is_unique_violation_on("wallets.user_id") => self
                .get_by_user(user_id)
                .await?
                .ok_or_else(|| DbError::not_found("Wallet", user_id.as_str())),
            Err(e) => Err(e),
        }
    }

    /// Stores an argon2 hash of `pin`. The plain PIN is never persisted.
    pub async fn set_pin(&self, id: &WalletId, pin: &str) -> DbResult<()> {
        let pin = pin.to_owned();
        let pin_hash = tokio::task::spawn_blocking(move || hash_pin(&pin))
            .await
            .map_err(|e| DbError::Internal(format!("PIN hashing task failed: {}", e)))??;

        let result = sqlx::query("UPDATE wallets SET pin_hash = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(pin_hash)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Wallet", id.as_str()));
        }
        Ok(())
    }

    /// Ledger rows for a wallet, newest first.
    pub async fn list_transactions(
        &self,
        wallet_id: &WalletId,
        limit: i64,
    ) -> DbResult<Vec<LedgerEntry>> {
        let rows = sqlx::query_as::<_, LedgerRow>(&format!(
            "SELECT {} FROM wallet_transactions WHERE wallet_id = ?1 \
             ORDER BY created_at DESC, rowid DESC LIMIT ?2",
            ENTRY_COLUMNS
        ))
        .bind(wallet_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LedgerEntry::try_from).collect()
    }

    /// Sum of all ledger amounts for a wallet. Equals the balance when the
    /// ledger is intact.
    pub async fn ledger_sum(&self, wallet_id: &WalletId) -> DbResult<i64> {
        let sum = sqlx::query_scalar::<_, i64>(
            "SELECT COALESCE(SUM(amount), 0) FROM wallet_transactions WHERE wallet_id = ?1",
        )
        .bind(wallet_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(sum)
    }
}

/// Hash a PIN for storage.
pub fn hash_pin(pin: &str) -> DbResult<String> {
    use argon2::{
        password_hash::{rand_core::OsRng, SaltString},
        Argon2, PasswordHasher,
    };

    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(pin.as_bytes(), &salt)
        .map_err(|e| DbError::Internal(format!("Failed to hash PIN: {}", e)))?;

    Ok(hash.to_string())
}

/// Verify a PIN against its stored hash. Malformed hashes never verify.
pub fn verify_pin(pin: &str, hash: &str) -> bool {
    use argon2::{Argon2, PasswordHash, PasswordVerifier};

    let parsed_hash = match PasswordHash::new(hash) {
        Ok(h) => h,
        Err(_) => return false,
    };

    Argon2::default()
        .verify_password(pin.as_bytes(), &parsed_hash)
        .is_ok()
}

/// [`verify_pin`] on the blocking pool, keeping argon2 off the async workers.
pub async fn check_pin(pin: &str, hash: &str) -> DbResult<bool> {
    let (pin, hash) = (pin.to_owned(), hash.to_owned());
    tokio::task::spawn_blocking(move || verify_pin(&pin, &hash))
        .await
        .map_err(|e| DbError::Internal(format!("PIN check task failed: {}", e)))
}

// =============================================================================
// Ledger
// =============================================================================

/// # Wallet Ledger
///
/// The only code that changes a wallet balance.
///
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  debit(tx, wallet, 150.000 ₫, draft)                                   │
/// │                                                                         │
/// │  1. SELECT balance            → before = 500.000                        │
/// │  2. after = before - amount   → 350.000 (negative → InsufficientFunds)  │
/// │  3. UPDATE wallets SET balance = after                                  │
/// │       WHERE id = :wallet AND balance = :before   (0 rows → Conflict)   │
/// │  4. INSERT wallet_transactions                                          │
/// │       (amount -150.000, before 500.000, after 350.000)                  │
/// │                                                                         │
/// │  Steps 3 and 4 share the caller's transaction: the row exists iff the  │
/// │  balance moved.                                                         │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
pub mod ledger {
    use chrono::Utc;
    use sqlx::{Sqlite, SqliteConnection, Transaction};
    use tracing::debug;
    use uuid::Uuid;

    use crate::error::{DbError, DbResult};
    use meridian_core::{LedgerDraft, LedgerEntry, Money, WalletId};

    /// Takes `amount` out of the wallet. `amount` must be positive.
    pub async fn debit(
        tx: &mut Transaction<'_, Sqlite>,
        wallet_id: &WalletId,
        amount: Money,
        draft: LedgerDraft,
    ) -> DbResult<LedgerEntry> {
        ensure_positive(wallet_id, amount)?;
        apply(&mut **tx, wallet_id, -amount.vnd(), draft).await
    }

    /// Adds `amount` to the wallet. `amount` must be positive.
    pub async fn credit(
        tx: &mut Transaction<'_, Sqlite>,
        wallet_id: &WalletId,
        amount: Money,
        draft: LedgerDraft,
    ) -> DbResult<LedgerEntry> {
        ensure_positive(wallet_id, amount)?;
        apply(&mut **tx, wallet_id, amount.vnd(), draft).await
    }

    fn ensure_positive(wallet_id: &WalletId, amount: Money) -> DbResult<()> {
        if amount.is_positive() {
            Ok(())
        } else {
            Err(DbError::CheckViolation {
                message: format!(
                    "ledger amount for wallet {} must be positive, got {}",
                    wallet_id,
                    amount.vnd()
                ),
            })
        }
    }

    async fn apply(
        conn: &mut SqliteConnection,
        wallet_id: &WalletId,
        delta: i64,
        draft: LedgerDraft,
    ) -> DbResult<LedgerEntry> {
        let balance_before =
            sqlx::query_scalar::<_, i64>("SELECT balance FROM wallets WHERE id = ?1")
                .bind(wallet_id)
                .fetch_optional(&mut *conn)
                .await?
                .ok_or_else(|| DbError::not_found("Wallet", wallet_id.as_str()))?;

        let balance_after = balance_before + delta;
        if balance_after < 0 {
            return Err(DbError::InsufficientFunds {
                wallet_id: wallet_id.to_string(),
                balance: balance_before,
                required: -delta,
            });
        }

        let now = Utc::now();

        let result = sqlx::query(
            "UPDATE wallets SET balance = ?3, updated_at = ?4 WHERE id = ?1 AND balance = ?2",
        )
        .bind(wallet_id)
        .bind(balance_before)
        .bind(balance_after)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::conflict(
                "Wallet",
                wallet_id.as_str(),
                "balance changed concurrently",
            ));
        }

        let metadata = serde_json::to_string(&draft.metadata)
            .map_err(|e| DbError::corrupt("wallet_transaction.metadata", e))?;

        let entry = LedgerEntry {
            id: Uuid::new_v4().to_string(),
            wallet_id: wallet_id.clone(),
            amount: delta,
            balance_before,
            balance_after,
            transaction_type: draft.transaction_type,
            status: "COMPLETED".to_string(),
            description: draft.description,
            metadata: draft.metadata,
            created_at: now,
        };

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, wallet_id, amount, balance_before, balance_after,
                type, status, description, metadata, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.wallet_id)
        .bind(entry.amount)
        .bind(entry.balance_before)
        .bind(entry.balance_after)
        .bind(entry.transaction_type)
        .bind(&entry.status)
        .bind(&entry.description)
        .bind(metadata)
        .bind(entry.created_at)
        .execute(&mut *conn)
        .await?;

        debug!(
            wallet_id = %wallet_id,
            amount = delta,
            balance_after,
            "Ledger entry recorded"
        );

        Ok(entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use meridian_core::{LedgerDraft, Money, OrderId};

    fn topup_draft() -> LedgerDraft {
        LedgerDraft {
            transaction_type: TransactionType::Topup,
            description: "Top-up".to_string(),
            metadata: LedgerMetadata::default(),
        }
    }

    #[tokio::test]
    async fn test_get_or_create_is_stable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let user = UserId::from("alice");

        let first = db.wallets().get_or_create(&user).await.unwrap();
        let second = db.wallets().get_or_create(&user).await.unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.balance, 0);

        let dup = db.wallets().create(&user).await;
        assert!(matches!(dup, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_pin_is_hashed() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wallet = db.wallets().create(&UserId::from("alice")).await.unwrap();
        db.wallets().set_pin(&wallet.id, "123456").await.unwrap();

        let stored = db.wallets().get(&wallet.id).await.unwrap().unwrap();
        let hash = stored.pin_hash.unwrap();
        assert_ne!(hash, "123456");
        assert!(verify_pin("123456", &hash));
        assert!(!verify_pin("654321", &hash));
        assert!(!verify_pin("123456", "not-a-phc-string"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_check_pin_on_blocking_pool() {
        let hash = hash_pin("246810").unwrap();
        let checks: Vec<_> = (0..4)
            .map(|i| {
                let hash = hash.clone();
                tokio::spawn(async move {
                    let pin = if i % 2 == 0 { "246810" } else { "000000" };
                    check_pin(pin, &hash).await.unwrap()
                })
            })
            .collect();
        let mut results = Vec::new();
        for check in checks {
            results.push(check.await.unwrap());
        }
        assert_eq!(results, vec![true, false, true, false]);
    }

    #[tokio::test]
    async fn test_credit_then_debit_keeps_ledger_consistent() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wallet = db.wallets().create(&UserId::from("alice")).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let credit = ledger::credit(&mut tx, &wallet.id, Money::from_vnd(500_000), topup_draft())
            .await
            .unwrap();
        let debit = ledger::debit(
            &mut tx,
            &wallet.id,
            Money::from_vnd(150_000),
            LedgerDraft {
                transaction_type: TransactionType::Payment,
                description: "Order payment".to_string(),
                metadata: LedgerMetadata::for_order(&OrderId::from("o1")),
            },
        )
        .await
        .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(credit.balance_after, 500_000);
        assert_eq!(debit.amount, -150_000);
        assert_eq!(debit.balance_before, 500_000);
        assert_eq!(debit.balance_after, 350_000);

        let stored = db.wallets().get(&wallet.id).await.unwrap().unwrap();
        assert_eq!(stored.balance, 350_000);
        assert_eq!(db.wallets().ledger_sum(&wallet.id).await.unwrap(), 350_000);

        let history = db.wallets().list_transactions(&wallet.id, 10).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_type, TransactionType::Payment);
        assert_eq!(history[0].metadata.order_id, Some(OrderId::from("o1")));
    }

    #[tokio::test]
    async fn test_overdraft_is_rejected_without_writes() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wallet = db.wallets().create(&UserId::from("alice")).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let result = ledger::debit(&mut tx, &wallet.id, Money::from_vnd(1), topup_draft()).await;
        assert!(matches!(
            result,
            Err(DbError::InsufficientFunds { balance: 0, required: 1, .. })
        ));
        drop(tx);

        assert!(db.wallets().list_transactions(&wallet.id, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_non_positive_amounts_are_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wallet = db.wallets().create(&UserId::from("alice")).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        let zero = ledger::credit(&mut tx, &wallet.id, Money::zero(), topup_draft()).await;
        assert!(matches!(zero, Err(DbError::CheckViolation { .. })));
    }

    #[tokio::test]
    async fn test_ledger_rows_are_immutable() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let wallet = db.wallets().create(&UserId::from("alice")).await.unwrap();

        let mut tx = db.begin().await.unwrap();
        ledger::credit(&mut tx, &wallet.id, Money::from_vnd(10_000), topup_draft())
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let update = sqlx::query("UPDATE wallet_transactions SET amount = 1")
            .execute(db.pool())
            .await;
        assert!(update.is_err());

        let delete = sqlx::query("DELETE FROM wallet_transactions")
            .execute(db.pool())
            .await;
        assert!(delete.is_err());
    }
}
