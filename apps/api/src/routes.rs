//! Route table.
//!
//! ```text
//! /health                         public
//! /api/webhooks/bank              HMAC signature (checked by the handler)
//! /api/orders/..                  bearer JWT ─┐
//! /api/wallet/..                  bearer JWT  ├─ require_caller
//! /api/admin/orders/..            bearer JWT ─┘  (admin checked in services)
//! ```

use std::sync::Arc;

use axum::{
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};

use crate::auth::require_caller;
use crate::handlers::{health, orders, wallet, webhooks};
use crate::AppState;

pub fn build_router(state: Arc<AppState>) -> Router {
    // ==========================================================================
    // Caller Routes - Protected by JWT
    // ==========================================================================
    let caller_routes = Router::new()
        // Orders
        .route("/orders", post(orders::place_order))
        .route("/orders/{id}", get(orders::get_order))
        .route("/orders/{id}/cancel", post(orders::cancel_order))
        // Admin
        .route("/admin/orders/{id}/cancel", post(orders::admin_cancel_order))
        .route("/admin/orders/{id}/status", post(orders::advance_status))
        // Wallet
        .route("/wallet", get(wallet::get_wallet))
        .route("/wallet/transactions", get(wallet::get_transactions))
        .route("/wallet/pin/verify", post(wallet::verify_pin))
        .route(
            "/wallet/topups",
            post(wallet::create_topup).get(wallet::list_topups),
        )
        .route("/wallet/topups/{code}", get(wallet::get_topup))
        .layer(from_fn_with_state(state.clone(), require_caller));

    // ==========================================================================
    // Bank Routes - Authenticated by signature, not JWT
    // ==========================================================================
    let bank_routes = Router::new().route("/webhooks/bank", post(webhooks::bank_webhook));

    Router::new()
        .route("/health", get(health::health_check))
        .nest("/api", caller_routes.merge(bank_routes))
        .with_state(state)
}
