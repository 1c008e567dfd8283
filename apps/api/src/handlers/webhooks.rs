//! Bank webhook handler.
//!
//! The body is taken as raw bytes: the signature covers the payload, so
//! nothing may be parsed before it is verified.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use serde_json::{json, Value};

use crate::services::webhook_service::WebhookService;
use crate::AppState;
use meridian_core::webhook::SIGNATURE_HEADER;

/// POST /api/webhooks/bank
pub async fn bank_webhook(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> (StatusCode, Json<Value>) {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    match WebhookService::new(state).handle(signature, &body).await {
        Ok(outcome) => (StatusCode::OK, Json(json!({ "message": outcome.message() }))),
        Err(_) => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid signature" })),
        ),
    }
}
