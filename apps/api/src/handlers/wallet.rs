//! Wallet handlers (summary, history, PIN check, top-ups)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use super::{json_body, ApiResult};
use crate::error::{ApiResponse, ServiceError};
use crate::services::topup_service::{CreateTopUpInput, TopUpService, TopUpView};
use crate::services::wallet_service::{WalletService, WalletSummary};
use crate::AppState;
use meridian_core::{Caller, LedgerEntry};

#[derive(Debug, Deserialize)]
pub struct VerifyPinRequest {
    #[serde(default)]
    pub pin: String,
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

/// GET /api/wallet
pub async fn get_wallet(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<WalletSummary> {
    let summary = WalletService::new(state).summary(&caller).await?;
    Ok(Json(ApiResponse::ok("Wallet found", summary)))
}

/// GET /api/wallet/transactions?limit=20
pub async fn get_transactions(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Vec<LedgerEntry>> {
    let entries = WalletService::new(state).history(&caller, query.limit).await?;
    Ok(Json(ApiResponse::ok("Wallet transactions", entries)))
}

/// POST /api/wallet/pin/verify
pub async fn verify_pin(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<VerifyPinRequest>, JsonRejection>,
) -> ApiResult<()> {
    let body = json_body(payload)?;
    WalletService::new(state).verify_pin(&caller, &body.pin).await?;
    Ok(Json(ApiResponse::message("PIN verified")))
}

/// Start a bank-transfer top-up and get its QR image
///
/// POST /api/wallet/topups
pub async fn create_topup(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<CreateTopUpInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<TopUpView>>), ServiceError> {
    let input = json_body(payload)?;
    let view = TopUpService::new(state).create(&caller, input).await?;
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Top-up request created", view)),
    ))
}

/// GET /api/wallet/topups
pub async fn list_topups(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
) -> ApiResult<Vec<TopUpView>> {
    let requests = TopUpService::new(state).list(&caller).await?;
    Ok(Json(ApiResponse::ok("Top-up requests", requests)))
}

/// GET /api/wallet/topups/{code}
pub async fn get_topup(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(code): Path<String>,
) -> ApiResult<TopUpView> {
    let view = TopUpService::new(state).status(&caller, &code).await?;
    Ok(Json(ApiResponse::ok("Top-up request found", view)))
}
