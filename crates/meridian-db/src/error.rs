//! Persistence failures.
//!
//! Most variants reach the HTTP edge as a logged 500. Two do not: a guarded
//! write that matched no rows (`Conflict`) becomes a 409 state conflict, and a
//! debit the ledger refused (`InsufficientFunds`) becomes an insufficient
//! balance error. `NotFound` is likewise re-labelled as a business 404.

use sqlx::error::{DatabaseError, ErrorKind};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// A UNIQUE index rejected the write. `columns` holds the
    /// `table.column` names SQLite reported, e.g. `topup_requests.request_code`.
    #[error("Duplicate value for {}", .columns.join(", "))]
    UniqueViolation { columns: Vec<String> },

    #[error("Foreign key violation: {message}")]
    ForeignKeyViolation { message: String },

    /// Schema CHECK failed, or the ledger refused a non-positive amount.
    #[error("Check constraint violated: {message}")]
    CheckViolation { message: String },

    /// A guarded write (status or balance compare-and-set) matched zero rows.
    #[error("Conflict on {entity} {id}: {message}")]
    Conflict {
        entity: String,
        id: String,
        message: String,
    },

    #[error("Wallet {wallet_id} has {balance}, needs {required}")]
    InsufficientFunds {
        wallet_id: String,
        balance: i64,
        required: i64,
    },

    /// A JSON column no longer decodes into its Rust type.
    #[error("Corrupt {entity} data: {message}")]
    Corrupt { entity: String, message: String },

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Migration failed: {0}")]
    MigrationFailed(String),

    #[error("SQLite error (code {code:?}): {message}")]
    Sqlite {
        code: Option<String>,
        message: String,
    },

    #[error("Timed out waiting for a pooled connection")]
    PoolTimeout,

    #[error("Internal database error: {0}")]
    Internal(String),
}

impl DbError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        DbError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn conflict(
        entity: impl Into<String>,
        id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        DbError::Conflict {
            entity: entity.into(),
            id: id.into(),
            message: message.into(),
        }
    }

    pub fn corrupt(entity: impl Into<String>, err: impl std::fmt::Display) -> Self {
        DbError::Corrupt {
            entity: entity.into(),
            message: err.to_string(),
        }
    }

    pub fn is_unique_violation(&self) -> bool {
        matches!(self, DbError::UniqueViolation { .. })
    }

    /// True when the duplicate was on `column` (written `table.column`).
    pub fn is_unique_violation_on(&self, column: &str) -> bool {
        match self {
            DbError::UniqueViolation { columns } => columns.iter().any(|c| c == column),
            _ => false,
        }
    }

    fn from_database(err: &dyn DatabaseError) -> Self {
        let message = err.message().to_string();
        match err.kind() {
            ErrorKind::UniqueViolation => DbError::UniqueViolation {
                columns: unique_columns(&message),
            },
            ErrorKind::ForeignKeyViolation => DbError::ForeignKeyViolation { message },
            ErrorKind::CheckViolation => DbError::CheckViolation { message },
            _ => DbError::Sqlite {
                code: err.code().map(|c| c.into_owned()),
                message,
            },
        }
    }
}

/// Pulls the column list out of
/// `UNIQUE constraint failed: promo_code_usages.promo_code_id, promo_code_usages.user_id`.
fn unique_columns(message: &str) -> Vec<String> {
    message
        .split_once(": ")
        .map(|(_, cols)| cols.split(", ").map(str::to_string).collect())
        .unwrap_or_default()
}

impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db_err) => DbError::from_database(db_err.as_ref()),
            sqlx::Error::RowNotFound => DbError::not_found("Row", "unknown"),
            sqlx::Error::PoolTimedOut => DbError::PoolTimeout,
            sqlx::Error::PoolClosed => DbError::ConnectionFailed("pool closed".to_string()),
            other => DbError::Internal(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for DbError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DbError::MigrationFailed(err.to_string())
    }
}

pub type DbResult<T> = Result<T, DbError>;
