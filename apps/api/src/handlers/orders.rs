//! Order handlers (placement, lookup, cancellation, admin status)

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use super::{json_body, ApiResult};
use crate::error::{ApiResponse, ServiceError};
use crate::services::lifecycle_service::{AdvanceStatusInput, LifecycleService};
use crate::services::order_service::{OrderService, PlaceOrderInput};
use crate::AppState;
use meridian_core::{Caller, Order, OrderId};

#[derive(Debug, Deserialize)]
pub struct CancelOrderRequest {
    #[serde(default)]
    pub reason: String,
}

/// Place an order from selected cart lines
///
/// POST /api/orders
pub async fn place_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    payload: Result<Json<PlaceOrderInput>, JsonRejection>,
) -> Result<(StatusCode, Json<ApiResponse<Order>>), ServiceError> {
    let input = json_body(payload)?;
    let order = OrderService::new(state).place_order(&caller, input).await?;

    let order_id = order.id.to_string();
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::ok("Order placed successfully", order).with_order_id(order_id)),
    ))
}

/// GET /api/orders/{id}
pub async fn get_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
) -> ApiResult<Order> {
    let order = OrderService::new(state)
        .get_order(&caller, &OrderId::from(order_id))
        .await?;
    Ok(Json(ApiResponse::ok("Order found", order)))
}

/// Cancel one of the caller's own orders
///
/// POST /api/orders/{id}/cancel
pub async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    payload: Result<Json<CancelOrderRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let body = json_body(payload)?;
    let order = LifecycleService::new(state)
        .cancel_order(&caller, &OrderId::from(order_id), &body.reason, false)
        .await?;
    Ok(Json(ApiResponse::ok("Order cancelled", order)))
}

/// POST /api/admin/orders/{id}/cancel
pub async fn admin_cancel_order(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    payload: Result<Json<CancelOrderRequest>, JsonRejection>,
) -> ApiResult<Order> {
    let body = json_body(payload)?;
    let order = LifecycleService::new(state)
        .cancel_order(&caller, &OrderId::from(order_id), &body.reason, true)
        .await?;
    Ok(Json(ApiResponse::ok("Order cancelled by admin", order)))
}

/// Advance an order one step along the fulfilment chain
///
/// POST /api/admin/orders/{id}/status
pub async fn advance_status(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<Caller>,
    Path(order_id): Path<String>,
    payload: Result<Json<AdvanceStatusInput>, JsonRejection>,
) -> ApiResult<Order> {
    let input = json_body(payload)?;
    let order = LifecycleService::new(state)
        .advance_status(&caller, &OrderId::from(order_id), input)
        .await?;
    let message = format!("Order is now {}", order.status);
    Ok(Json(ApiResponse::ok(message, order)))
}
