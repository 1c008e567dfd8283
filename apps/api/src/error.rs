//! Error types for the Meridian API.
//!
//! ```text
//! ServiceError
//! ├── Unauthenticated(..)         401  (no / bad bearer token)
//! ├── Business(CoreError)         expected outcome, body { success: false, .. }
//! │     Validation      400
//! │     Authorization   403
//! │     NotFound        404
//! │     StateConflict   409
//! │     ExternalService 502
//! └── Infrastructure(DbError)     500, logged, generic message
//! ```

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use meridian_core::{CoreError, ErrorKind};
use meridian_db::DbError;

/// Errors returned by service entrypoints.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("Authentication required: {0}")]
    Unauthenticated(String),

    #[error(transparent)]
    Business(#[from] CoreError),

    #[error("Infrastructure failure: {0}")]
    Infrastructure(DbError),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Guarded-write conflicts and overdrafts are business outcomes; everything
/// else from the database is infrastructure.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Conflict {
                entity,
                id,
                message,
            } => ServiceError::Business(CoreError::InvalidState {
                entity: entity_label(&entity),
                id,
                current: message,
                attempted: "complete this operation".to_string(),
            }),
            DbError::InsufficientFunds {
                balance, required, ..
            } => ServiceError::Business(CoreError::InsufficientBalance { balance, required }),
            DbError::NotFound { entity, id } => {
                ServiceError::Business(CoreError::not_found(entity_label(&entity), id))
            }
            other => ServiceError::Infrastructure(other),
        }
    }
}

impl From<sqlx::Error> for ServiceError {
    fn from(err: sqlx::Error) -> Self {
        ServiceError::from(DbError::from(err))
    }
}

fn entity_label(entity: &str) -> &'static str {
    match entity {
        "Order" => "Order",
        "Wallet" => "Wallet",
        "TopUpRequest" => "TopUpRequest",
        "Product" => "Product",
        "PromoCode" => "PromoCode",
        _ => "Record",
    }
}

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ServiceError::Business(e) => match e.kind() {
                ErrorKind::Validation => StatusCode::BAD_REQUEST,
                ErrorKind::Authorization => StatusCode::FORBIDDEN,
                ErrorKind::NotFound => StatusCode::NOT_FOUND,
                ErrorKind::StateConflict => StatusCode::CONFLICT,
                ErrorKind::ExternalService => StatusCode::BAD_GATEWAY,
            },
            ServiceError::Infrastructure(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the storefront client.
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Unauthenticated(_) => "UNAUTHENTICATED",
            ServiceError::Infrastructure(_) => "INTERNAL_ERROR",
            ServiceError::Business(e) => match e {
                CoreError::Validation(_) => "VALIDATION_FAILED",
                CoreError::EmptySelection => "EMPTY_SELECTION",
                CoreError::Forbidden { .. } => "FORBIDDEN",
                CoreError::NotFound { .. } => "NOT_FOUND",
                CoreError::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
                CoreError::StockRace => "STOCK_RACE",
                CoreError::InvalidState { .. } => "INVALID_STATE",
                CoreError::PinNotSet => "PIN_NOT_SET",
                CoreError::InvalidPin => "INVALID_PIN",
                CoreError::InsufficientBalance { .. } => "INSUFFICIENT_BALANCE",
                CoreError::PromoRejected(_) => "PROMO_REJECTED",
                CoreError::AmountMismatch { .. } => "AMOUNT_MISMATCH",
                CoreError::InvalidSignature(_) => "INVALID_SIGNATURE",
                CoreError::ExternalService { .. } => "EXTERNAL_SERVICE",
            },
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ServiceError::Business(CoreError::PromoRejected(rejection)) => {
                serde_json::to_value(rejection).ok()
            }
            _ => None,
        }
    }
}

// =============================================================================
// Response Envelope
// =============================================================================

/// Body of every storefront response.
///
/// `success: true` carries `data`; `success: false` carries a human message
/// and a `code`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            order_id: None,
            data: Some(data),
            code: None,
            details: None,
        }
    }

    pub fn with_order_id(mut self, order_id: impl Into<String>) -> Self {
        self.order_id = Some(order_id.into());
        self
    }
}

impl ApiResponse<()> {
    pub fn message(message: impl Into<String>) -> Self {
        ApiResponse {
            success: true,
            message: message.into(),
            order_id: None,
            data: None,
            code: None,
            details: None,
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();

        let message = match &self {
            ServiceError::Infrastructure(e) => {
                error!(error = %e, "Request failed on infrastructure error");
                "Internal server error".to_string()
            }
            ServiceError::Business(e) if e.kind() == ErrorKind::ExternalService => {
                warn!(error = %e, "Collaborator failure");
                e.to_string()
            }
            other => other.to_string(),
        };

        let body = ApiResponse::<()> {
            success: false,
            message,
            order_id: None,
            data: None,
            code: Some(self.code()),
            details: self.details(),
        };

        (status, Json(body)).into_response()
    }
}
