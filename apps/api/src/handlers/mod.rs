//! HTTP handlers.
//!
//! Handlers only unpack the request, call one service method and wrap the
//! result in [`ApiResponse`]. Authorization happens in the services.

pub mod health;
pub mod orders;
pub mod wallet;
pub mod webhooks;

use axum::extract::rejection::JsonRejection;
use axum::Json;

use crate::error::{ApiResponse, ServiceError};
use meridian_core::{CoreError, ValidationError};

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ServiceError>;

/// Turns axum's body rejection into the usual validation envelope.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ServiceError> {
    match payload {
        Ok(Json(value)) => Ok(value),
        Err(rejection) => Err(CoreError::from(ValidationError::InvalidFormat {
            field: "body".to_string(),
            reason: rejection.body_text(),
        })
        .into()),
    }
}
