//! Order lifecycle: admin status moves and cancellation.
//!
//! ```text
//! cancel_order
//!   authorize + validate reason          (before the transaction)
//!   ┌── tx ─────────────────────────────────────────────────────────┐
//!   │ re-read order, status ∈ {pending, processing}                 │
//!   │ [WalletPay + paid] ledger credit grand_total, payment→refunded │
//!   │ restore stock per line                                        │
//!   │ CAS status → cancelled                                        │
//!   └── commit ─────────────────────────────────────────────────────┘
//!   notify order.cancelled (+ wallet.refunded)
//! ```

use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use meridian_core::lifecycle::{check_cancellable, check_transition, payment_status_on};
use meridian_core::validation::validate_reason;
use meridian_core::{
    authorize, Action, Caller, Cancellation, CoreError, LedgerDraft, LedgerMetadata, Money,
    Notification, Order, OrderId, OrderStatus, PaymentMethod, PaymentStatus, Resource,
    TransactionType,
};
use meridian_db::ledger;
use meridian_db::repository::{order as order_store, product as product_store};

use super::notification_service::publish_best_effort;
use crate::error::ServiceResult;
use crate::AppState;

/// Body of `POST /api/admin/orders/{id}/status`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdvanceStatusInput {
    pub status: String,
    #[serde(default)]
    pub tracking_number: Option<String>,
}

pub struct LifecycleService {
    state: Arc<AppState>,
}

impl LifecycleService {
    pub fn new(state: Arc<AppState>) -> Self {
        LifecycleService { state }
    }

    async fn load(&self, order_id: &OrderId) -> ServiceResult<Order> {
        let order = self
            .state
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id.as_str()))?;
        Ok(order)
    }

    /// Moves an order one step forward. Admin only.
    pub async fn advance_status(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        input: AdvanceStatusInput,
    ) -> ServiceResult<Order> {
        let order = self.load(order_id).await?;
        authorize(caller, Resource::Order { owner: &order.user_id }, Action::AdvanceStatus)?;

        let to: OrderStatus = input.status.parse().map_err(CoreError::from)?;
        check_transition(order.id.as_str(), order.status, to)?;

        let tracking = input
            .tracking_number
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let payment_status = payment_status_on(order.payment.method, order.payment.status, to)
            .unwrap_or(order.payment.status);

        let mut tx = self.state.db.begin().await?;
        order_store::transition_status(&mut *tx, &order.id, order.status, to, tracking, payment_status)
            .await?;
        let updated = order_store::load_order(&mut *tx, &order.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order.id.as_str()))?;
        tx.commit().await?;

        info!(
            order_id = %order.id,
            from = %order.status,
            to = %to,
            admin = %caller.user_id,
            "Order status advanced"
        );

        let mut data = json!({ "orderId": updated.id, "status": to });
        if let Some(tracking) = &updated.shipping.tracking_number {
            data["trackingNumber"] = json!(tracking);
        }
        publish_best_effort(
            self.state.notifier.as_ref(),
            vec![Notification::in_app(
                updated.user_id.clone(),
                "order.status_updated",
                "order",
                updated.id.as_str(),
                format!("Order {} is now {}", updated.id, to),
            )
            .with_actor(caller.user_id.clone())
            .with_data(data)
            .with_link(format!("/orders/{}", updated.id))],
        )
        .await;

        Ok(updated)
    }

    /// Cancels an order and compensates stock and wallet.
    ///
    /// `as_admin` selects the admin route, which may cancel any order.
    pub async fn cancel_order(
        &self,
        caller: &Caller,
        order_id: &OrderId,
        reason: &str,
        as_admin: bool,
    ) -> ServiceResult<Order> {
        let action = if as_admin {
            Action::AdminCancel
        } else {
            Action::Cancel
        };

        let snapshot = self.load(order_id).await?;
        authorize(caller, Resource::Order { owner: &snapshot.user_id }, action)?;
        let reason = validate_reason(reason).map_err(CoreError::from)?;

        // Wallet ids never change, so resolve it before the transaction
        let refund_wallet = if snapshot.payment.method == PaymentMethod::WalletPay {
            let wallet = self
                .state
                .db
                .wallets()
                .get_by_user(&snapshot.user_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Wallet", snapshot.user_id.as_str()))?;
            Some(wallet.id)
        } else {
            None
        };

        let mut tx = self.state.db.begin().await?;

        let order = order_store::load_order(&mut *tx, order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id.as_str()))?;
        check_cancellable(order.id.as_str(), order.status)?;

        let mut refund = None;
        let mut payment_status = order.payment.status;
        if order.needs_wallet_refund() {
            if let Some(wallet_id) = &refund_wallet {
                let entry = ledger::credit(
                    &mut tx,
                    wallet_id,
                    order.totals.grand_total(),
                    LedgerDraft {
                        transaction_type: TransactionType::Refund,
                        description: format!("Refund for cancelled order {}", order.id),
                        metadata: LedgerMetadata::for_order(&order.id),
                    },
                )
                .await?;
                payment_status = PaymentStatus::Refunded;
                refund = Some(entry);
            }
        }

        for item in &order.items {
            product_store::restore_stock(&mut *tx, &item.product_id, item.quantity).await?;
        }

        let cancellation = Cancellation {
            reason,
            cancelled_by: caller.user_id.clone(),
            cancelled_at: Utc::now(),
        };
        order_store::mark_cancelled(&mut *tx, &order.id, order.status, &cancellation, payment_status)
            .await?;
        let cancelled = order_store::load_order(&mut *tx, &order.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order.id.as_str()))?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            from = %order.status,
            by = %caller.user_id,
            refunded = refund.is_some(),
            "Order cancelled"
        );

        let mut notifications = vec![Notification::in_app(
            cancelled.user_id.clone(),
            "order.cancelled",
            "order",
            cancelled.id.as_str(),
            format!("Order {} was cancelled", cancelled.id),
        )
        .with_actor(caller.user_id.clone())
        .with_data(json!({
            "orderId": cancelled.id,
            "reason": cancellation.reason,
            "cancelledBy": caller.user_id,
        }))
        .with_link(format!("/orders/{}", cancelled.id))];

        if let Some(entry) = refund {
            notifications.push(
                Notification::in_app(
                    cancelled.user_id.clone(),
                    "wallet.refunded",
                    "wallet",
                    entry.wallet_id.as_str(),
                    format!(
                        "{} refunded to your wallet for order {}",
                        Money::from_vnd(entry.amount),
                        cancelled.id
                    ),
                )
                .with_data(json!({
                    "orderId": cancelled.id,
                    "amount": entry.amount,
                    "balanceAfter": entry.balance_after,
                    "transactionId": entry.id,
                })),
            );
        }

        publish_best_effort(self.state.notifier.as_ref(), notifications).await;

        Ok(cancelled)
    }
}
