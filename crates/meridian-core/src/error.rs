//! Business outcomes a caller can act on.
//!
//! `CoreError` is what services return for expected failures; `ErrorKind`
//! buckets those into the five classes the HTTP edge maps to 400, 403, 404,
//! 409 and 502. Persistence failures live in `meridian_db::DbError` and are
//! joined with these in the API crate's `ServiceError`.

use thiserror::Error;

use crate::promo::PromoRejection;

// =============================================================================
// Error Kind
// =============================================================================

/// Coarse category of a business error. Drives status codes and logging level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Authorization,
    NotFound,
    StateConflict,
    ExternalService,
}

// =============================================================================
// Core Error
// =============================================================================

/// Business errors.
///
/// Every variant is an outcome a caller can act on. Database and transport
/// failures never appear here.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// None of the selected cart items belong to the caller's cart.
    #[error("No selected items found in your cart")]
    EmptySelection,

    /// The caller may not perform this action on this resource.
    #[error("Not allowed to {action}")]
    Forbidden { action: String },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Requested quantity exceeds live stock (checked before the transaction).
    ///
    /// ```text
    /// cart: 5 × SKU-A      stock: 3
    ///      │
    ///      ▼
    /// InsufficientStock { sku: "SKU-A", available: 3, requested: 5 }
    /// ```
    #[error("Insufficient stock for {sku}: available {available}, requested {requested}")]
    InsufficientStock {
        sku: String,
        available: i64,
        requested: i64,
    },

    /// Stock was depleted by a concurrent order between validation and the
    /// guarded decrement. The whole placement was rolled back.
    #[error("Stock changed while placing the order, please review your cart")]
    StockRace,

    /// Status compare-and-swap failed or the transition is not allowed.
    #[error("{entity} {id} is {current}, cannot {attempted}")]
    InvalidState {
        entity: &'static str,
        id: String,
        current: String,
        attempted: String,
    },

    /// Wallet has no PIN configured yet.
    #[error("Wallet PIN has not been set")]
    PinNotSet,

    /// PIN did not verify against the stored hash.
    #[error("Incorrect wallet PIN")]
    InvalidPin,

    #[error("Insufficient wallet balance: balance {balance}, required {required}")]
    InsufficientBalance { balance: i64, required: i64 },

    #[error("Promo code rejected: {0}")]
    PromoRejected(PromoRejection),

    /// Bank transfer amount differs from the requested base amount.
    #[error("Amount mismatch: expected {expected}, received {received}")]
    AmountMismatch { expected: i64, received: i64 },

    /// Webhook authentication failed.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// A collaborator (QR provider, bank payload) misbehaved.
    #[error("{service} failed: {message}")]
    ExternalService {
        service: &'static str,
        message: String,
    },
}

impl CoreError {
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        CoreError::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn forbidden(action: impl Into<String>) -> Self {
        CoreError::Forbidden {
            action: action.into(),
        }
    }

    pub fn external(service: &'static str, message: impl Into<String>) -> Self {
        CoreError::ExternalService {
            service,
            message: message.into(),
        }
    }

    /// Returns the category this error belongs to.
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::Validation(_)
            | CoreError::EmptySelection
            | CoreError::PromoRejected(_) => ErrorKind::Validation,
            CoreError::Forbidden { .. } | CoreError::InvalidSignature(_) => {
                ErrorKind::Authorization
            }
            CoreError::NotFound { .. } => ErrorKind::NotFound,
            CoreError::InsufficientStock { .. }
            | CoreError::StockRace
            | CoreError::InvalidState { .. }
            | CoreError::PinNotSet
            | CoreError::InvalidPin
            | CoreError::InsufficientBalance { .. }
            | CoreError::AmountMismatch { .. } => ErrorKind::StateConflict,
            CoreError::ExternalService { .. } => ErrorKind::ExternalService,
        }
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Request shape failures, raised before any transaction is opened.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (e.g., PIN with letters, unknown status).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
