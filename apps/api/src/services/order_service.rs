//! Order placement.
//!
//! ```text
//! place_order = prepare + execute
//!
//! prepare (no transaction)                 execute (one transaction)
//! ─────────────────────────                ─────────────────────────
//! input shape                              [WalletPay] ledger debit
//! selection ∩ caller's cart                guarded stock decrement ×N
//! address ownership                        Σ rows < N ──► StockRace, rollback
//! products active, stock ≥ qty             insert order + items
//! quote totals                             delete consumed cart lines
//! payment branch (PIN, balance)            commit ──► notifications
//!         │                                        ▲
//!         └────────── PlacementPlan ───────────────┘
//! ```
//!
//! The stock check in `prepare` only produces a readable error; the guarded
//! decrement in `execute` is authoritative.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use meridian_core::pricing::{ensure_available, quote, LineInput};
use meridian_core::validation::{validate_id, validate_pin};
use meridian_core::{
    authorize, Action, Caller, CoreError, LedgerDraft, LedgerMetadata, Money, Notification,
    Order, OrderId, OrderStatus, PaymentInfo, PaymentMethod, PaymentStatus, Product, ProductId,
    Resource, ShippingAddress, ShippingInfo, TransactionType, WalletId,
};
use meridian_db::ledger;
use meridian_db::repository::wallet::check_pin;
use meridian_db::repository::{cart, order as order_store, product as product_store};

use super::notification_service::publish_best_effort;
use crate::error::ServiceResult;
use crate::AppState;

/// Body of `POST /api/orders`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderInput {
    #[serde(default)]
    pub selected_cart_item_ids: Vec<String>,
    #[serde(default)]
    pub shipping_address_id: String,
    pub payment_method: PaymentMethod,
    #[serde(default)]
    pub pin: Option<String>,
}

/// Everything `execute` needs, computed and validated by `prepare`.
#[derive(Debug, Clone)]
pub struct PlacementPlan {
    /// Fully priced order, not yet persisted.
    pub order: Order,
    /// Cart lines consumed by this order (already scoped to the caller).
    pub cart_item_ids: Vec<String>,
    /// Quantity to take from each distinct product.
    pub reservations: Vec<(ProductId, i64)>,
    /// Set for wallet payments.
    pub wallet_id: Option<WalletId>,
}

pub struct OrderService {
    state: Arc<AppState>,
}

impl OrderService {
    pub fn new(state: Arc<AppState>) -> Self {
        OrderService { state }
    }

    pub async fn place_order(&self, caller: &Caller, input: PlaceOrderInput) -> ServiceResult<Order> {
        let plan = self.prepare(caller, input).await?;
        self.execute(plan).await
    }

    /// Validation phase. Reads only; never opens a transaction.
    pub async fn prepare(
        &self,
        caller: &Caller,
        input: PlaceOrderInput,
    ) -> ServiceResult<PlacementPlan> {
        if input.selected_cart_item_ids.is_empty() {
            return Err(CoreError::EmptySelection.into());
        }
        validate_id("shippingAddressId", &input.shipping_address_id).map_err(CoreError::from)?;
        if input.payment_method == PaymentMethod::WalletPay {
            validate_pin(input.pin.as_deref().unwrap_or("")).map_err(CoreError::from)?;
        }

        let db = &self.state.db;

        let cart_items = db
            .carts()
            .get_selected(&caller.user_id, &input.selected_cart_item_ids)
            .await?;
        if cart_items.is_empty() {
            return Err(CoreError::EmptySelection.into());
        }

        let address = db
            .addresses()
            .get_owned(&caller.user_id, &input.shipping_address_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Address", input.shipping_address_id.as_str()))?;

        // Aggregate per product, keeping first-seen order for stable line order
        let mut reservations: Vec<(ProductId, i64)> = Vec::new();
        for item in &cart_items {
            match reservations.iter_mut().find(|(id, _)| *id == item.product_id) {
                Some((_, qty)) => *qty += item.quantity,
                None => reservations.push((item.product_id.clone(), item.quantity)),
            }
        }

        let product_ids: Vec<ProductId> = reservations.iter().map(|(id, _)| id.clone()).collect();
        let products: HashMap<ProductId, Product> = db
            .products()
            .get_many(&product_ids)
            .await?
            .into_iter()
            .map(|p| (p.id.clone(), p))
            .collect();

        let mut lines = Vec::with_capacity(reservations.len());
        for (product_id, quantity) in &reservations {
            let product = products
                .get(product_id)
                .ok_or_else(|| CoreError::not_found("Product", product_id.as_str()))?;
            ensure_available(product, *quantity)?;
            lines.push(LineInput {
                product,
                quantity: *quantity,
            });
        }

        let priced = quote(&lines, Money::from_vnd(self.state.config.shipping_fee))?;
        let grand_total = priced.totals.grand_total();

        let (payment, wallet_id) = match input.payment_method {
            PaymentMethod::Cod => (
                PaymentInfo {
                    method: PaymentMethod::Cod,
                    status: PaymentStatus::Pending,
                    transaction_reference: None,
                },
                None,
            ),
            PaymentMethod::CreditCard => (
                PaymentInfo {
                    method: PaymentMethod::CreditCard,
                    status: PaymentStatus::Paid,
                    transaction_reference: Some(format!("CC-{}", Uuid::new_v4())),
                },
                None,
            ),
            PaymentMethod::WalletPay => {
                let wallet = db
                    .wallets()
                    .get_by_user(&caller.user_id)
                    .await?
                    .ok_or_else(|| CoreError::not_found("Wallet", caller.user_id.as_str()))?;
                authorize(caller, Resource::Wallet { owner: &wallet.user_id }, Action::Use)?;

                let hash = wallet.pin_hash.as_deref().ok_or(CoreError::PinNotSet)?;
                if !check_pin(input.pin.as_deref().unwrap_or(""), hash).await? {
                    debug!(wallet_id = %wallet.id, "PIN rejected at checkout");
                    return Err(CoreError::InvalidPin.into());
                }
                if wallet.balance() < grand_total {
                    return Err(CoreError::InsufficientBalance {
                        balance: wallet.balance,
                        required: grand_total.vnd(),
                    }
                    .into());
                }

                (
                    PaymentInfo {
                        method: PaymentMethod::WalletPay,
                        status: PaymentStatus::Paid,
                        transaction_reference: None,
                    },
                    Some(wallet.id),
                )
            }
        };

        let order_id = OrderId::generate();
        let now = Utc::now();
        let order = Order {
            items: priced
                .lines
                .into_iter()
                .map(|line| line.into_item(&order_id))
                .collect(),
            id: order_id,
            user_id: caller.user_id.clone(),
            status: OrderStatus::Pending,
            shipping_address: ShippingAddress::from(&address),
            payment,
            shipping: ShippingInfo {
                fee: priced.totals.shipping_total,
                tracking_number: None,
            },
            totals: priced.totals,
            cancellation: None,
            created_at: now,
            updated_at: now,
        };

        Ok(PlacementPlan {
            order,
            cart_item_ids: cart_items.into_iter().map(|item| item.id).collect(),
            reservations,
            wallet_id,
        })
    }

    /// Execution phase: debit, reserve stock, persist, clear the cart, commit.
    pub async fn execute(&self, plan: PlacementPlan) -> ServiceResult<Order> {
        let PlacementPlan {
            mut order,
            cart_item_ids,
            reservations,
            wallet_id,
        } = plan;

        let mut tx = self.state.db.begin().await?;

        let mut debit = None;
        if let Some(wallet_id) = &wallet_id {
            let entry = ledger::debit(
                &mut tx,
                wallet_id,
                order.totals.grand_total(),
                LedgerDraft {
                    transaction_type: TransactionType::Payment,
                    description: format!("Payment for order {}", order.id),
                    metadata: LedgerMetadata::for_order(&order.id),
                },
            )
            .await?;
            order.payment.transaction_reference = Some(entry.id.clone());
            debit = Some(entry);
        }

        let mut reserved = 0u64;
        for (product_id, quantity) in &reservations {
            reserved += product_store::decrement_stock(&mut *tx, product_id, *quantity).await?;
        }
        if reserved < reservations.len() as u64 {
            warn!(
                order_id = %order.id,
                reserved,
                wanted = reservations.len(),
                "Stock depleted during placement, rolling back"
            );
            return Err(CoreError::StockRace.into());
        }

        order_store::insert_order(&mut *tx, &order).await?;
        cart::remove_items(&mut *tx, &order.user_id, &cart_item_ids).await?;

        tx.commit().await?;

        info!(
            order_id = %order.id,
            user_id = %order.user_id,
            method = %order.payment.method,
            grand_total = order.totals.grand_total,
            "Order placed"
        );

        let mut notifications = vec![Notification::in_app(
            order.user_id.clone(),
            "order.placed",
            "order",
            order.id.as_str(),
            format!(
                "Order {} placed, total {}",
                order.id,
                order.totals.grand_total()
            ),
        )
        .with_data(json!({
            "orderId": order.id,
            "grandTotal": order.totals.grand_total,
            "paymentMethod": order.payment.method,
        }))
        .with_link(format!("/orders/{}", order.id))];

        if let Some(entry) = debit {
            notifications.push(
                Notification::in_app(
                    order.user_id.clone(),
                    "wallet.payment_debited",
                    "wallet",
                    entry.wallet_id.as_str(),
                    format!(
                        "{} paid from your wallet for order {}",
                        Money::from_vnd(-entry.amount),
                        order.id
                    ),
                )
                .with_data(json!({
                    "orderId": order.id,
                    "amount": entry.amount,
                    "balanceAfter": entry.balance_after,
                    "transactionId": entry.id,
                })),
            );
        }

        publish_best_effort(self.state.notifier.as_ref(), notifications).await;

        Ok(order)
    }

    /// An order, visible to its owner and to admins.
    pub async fn get_order(&self, caller: &Caller, order_id: &OrderId) -> ServiceResult<Order> {
        let order = self
            .state
            .db
            .orders()
            .get(order_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Order", order_id.as_str()))?;
        authorize(caller, Resource::Order { owner: &order.user_id }, Action::View)?;
        Ok(order)
    }
}
