//! # Domain Types
//!
//! Records shared by every layer: catalog reads, orders, wallets, the ledger,
//! top-up requests, promo codes and notifications.
//!
//! ## Snapshot Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Product (live, mutable)            OrderItem (frozen at placement)     │
//! │  ─────────────────────              ──────────────────────────────      │
//! │  name      "Tee Red M"   ──copy──►  name       "Tee Red M"              │
//! │  price     200.000 ₫     ──copy──►  unit_price 200.000 ₫                │
//! │  sale      150.000 ₫     ──copy──►  sale_price 150.000 ₫                │
//! │  stock     12                        quantity   2                        │
//! │                                                                         │
//! │  Later catalog edits never change what the customer was charged.        │
//! │  Address rows are copied into Order.shipping_address the same way.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::money::Money;

pub use ids::*;

// =============================================================================
// Typed Identifiers
// =============================================================================

/// Newtype identifiers so an order id can never be passed where a wallet id
/// is expected.
pub mod ids {
    use serde::{Deserialize, Serialize};
    use std::fmt;
    use uuid::Uuid;

    macro_rules! string_id {
        ($(#[$meta:meta])* $name:ident) => {
            $(#[$meta])*
            #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
            #[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
            #[cfg_attr(feature = "sqlx", sqlx(transparent))]
            #[serde(transparent)]
            pub struct $name(String);

            impl $name {
                /// Generates a fresh random (v4) identifier.
                pub fn generate() -> Self {
                    $name(Uuid::new_v4().to_string())
                }

                pub fn as_str(&self) -> &str {
                    &self.0
                }

                pub fn into_inner(self) -> String {
                    self.0
                }
            }

            impl From<String> for $name {
                fn from(value: String) -> Self {
                    $name(value)
                }
            }

            impl From<&str> for $name {
                fn from(value: &str) -> Self {
                    $name(value.to_string())
                }
            }

            impl AsRef<str> for $name {
                fn as_ref(&self) -> &str {
                    &self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(&self.0)
                }
            }
        };
    }

    string_id!(
        /// Authenticated customer or admin.
        UserId
    );
    string_id!(ProductId);
    string_id!(OrderId);
    string_id!(WalletId);
    string_id!(TopUpRequestId);
    string_id!(PromoCodeId);
}

// =============================================================================
// Catalog (read-mostly, owned by the catalog service)
// =============================================================================

/// A sellable product. Only `stock` is mutated by this subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub sku: String,
    pub name: String,
    pub image_url: Option<String>,
    /// List price in đồng.
    pub price: i64,
    /// Optional discounted price. Only honoured when `0 <= sale_price < price`.
    pub sale_price: Option<i64>,
    pub stock: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn list_price(&self) -> Money {
        Money::from_vnd(self.price)
    }

    /// The price actually charged per unit.
    pub fn effective_price(&self) -> Money {
        match self.sale_price {
            Some(sale) if sale >= 0 && sale < self.price => Money::from_vnd(sale),
            _ => self.list_price(),
        }
    }
}

/// One line of a customer's cart.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub id: String,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i64,
    pub added_at: DateTime<Utc>,
}

/// A saved delivery address.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Address {
    pub id: String,
    pub user_id: UserId,
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub ward: String,
    pub district: String,
    pub city: String,
}

/// Address copied into the order at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    pub full_name: String,
    pub phone: String,
    pub street: String,
    pub ward: String,
    pub district: String,
    pub city: String,
}

impl From<&Address> for ShippingAddress {
    fn from(address: &Address) -> Self {
        ShippingAddress {
            full_name: address.full_name.clone(),
            phone: address.phone.clone(),
            street: address.street.clone(),
            ward: address.ward.clone(),
            district: address.district.clone(),
            city: address.city.clone(),
        }
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Where an order is in its life.
///
/// ```text
/// pending ─► processing ─► shipped ─► delivered ─► completed
///    │            │
///    └────────────┴──► cancelled
///
/// returned: representable, not reachable
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Processing,
    Shipped,
    Delivered,
    Completed,
    Cancelled,
    Returned,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Returned => "returned",
        }
    }
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "processing" => Ok(OrderStatus::Processing),
            "shipped" => Ok(OrderStatus::Shipped),
            "delivered" => Ok(OrderStatus::Delivered),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            "returned" => Ok(OrderStatus::Returned),
            other => Err(ValidationError::InvalidFormat {
                field: "status".to_string(),
                reason: format!("unknown order status '{}'", other),
            }),
        }
    }
}

// =============================================================================
// Payment
// =============================================================================

/// How the customer pays. Wire names follow the storefront client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
pub enum PaymentMethod {
    /// Cash on delivery.
    #[serde(rename = "COD")]
    Cod,
    /// Card charged by the storefront's payment page before the order is placed.
    #[serde(rename = "CreditCard")]
    CreditCard,
    /// Custodial wallet debit, PIN protected.
    #[serde(rename = "WalletPay")]
    WalletPay,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentMethod::Cod => "COD",
            PaymentMethod::CreditCard => "CreditCard",
            PaymentMethod::WalletPay => "WalletPay",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Refunded,
    Failed,
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInfo {
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    pub transaction_reference: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderTotals {
    pub subtotal: i64,
    pub discount: i64,
    pub shipping_total: i64,
    pub grand_total: i64,
}

impl OrderTotals {
    pub fn grand_total(&self) -> Money {
        Money::from_vnd(self.grand_total)
    }

    /// `grand_total = subtotal - discount + shipping_total`
    pub fn is_consistent(&self) -> bool {
        self.grand_total == self.subtotal - self.discount + self.shipping_total
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingInfo {
    pub fee: i64,
    pub tracking_number: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cancellation {
    pub reason: String,
    pub cancelled_by: UserId,
    pub cancelled_at: DateTime<Utc>,
}

/// A line item, frozen at placement time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    pub id: String,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub name: String,
    pub sku: String,
    pub image_url: Option<String>,
    /// List price at placement.
    pub unit_price: i64,
    /// Price actually charged per unit at placement.
    pub sale_price: i64,
    pub quantity: i64,
    /// `sale_price × quantity`
    pub line_total: i64,
}

/// A placed order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub shipping_address: ShippingAddress,
    pub payment: PaymentInfo,
    pub shipping: ShippingInfo,
    pub totals: OrderTotals,
    pub cancellation: Option<Cancellation>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Whether a wallet refund is owed if this order is cancelled now.
    pub fn needs_wallet_refund(&self) -> bool {
        self.payment.method == PaymentMethod::WalletPay
            && self.payment.status == PaymentStatus::Paid
    }
}

// =============================================================================
// Wallet & Ledger
// =============================================================================

/// A custodial wallet. One per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub balance: i64,
    /// Argon2 PHC string. Never serialized.
    #[serde(skip_serializing, default)]
    pub pin_hash: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wallet {
    pub fn balance(&self) -> Money {
        Money::from_vnd(self.balance)
    }

    pub fn has_pin(&self) -> bool {
        self.pin_hash.is_some()
    }
}

/// Kind of ledger movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    /// Order paid from the wallet (negative amount).
    Payment,
    /// Cancelled order returned to the wallet (positive amount).
    Refund,
    /// Bank transfer credited to the wallet (positive amount).
    Topup,
}

/// Links a ledger row back to the business event that caused it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_id: Option<OrderId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topup_request_id: Option<TopUpRequestId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bank_transaction_id: Option<String>,
}

impl LedgerMetadata {
    pub fn for_order(order_id: &OrderId) -> Self {
        LedgerMetadata {
            order_id: Some(order_id.clone()),
            ..Default::default()
        }
    }
}

/// What a caller asks the ledger to record; amounts are applied by the ledger.
#[derive(Debug, Clone)]
pub struct LedgerDraft {
    pub transaction_type: TransactionType,
    pub description: String,
    pub metadata: LedgerMetadata,
}

/// One immutable row of the wallet ledger.
///
/// `amount` is signed: debits negative, credits positive, and
/// `balance_after = balance_before + amount`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub id: String,
    pub wallet_id: WalletId,
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub transaction_type: TransactionType,
    pub status: String,
    pub description: String,
    pub metadata: LedgerMetadata,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Top-Up Requests
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum TopUpStatus {
    Pending,
    Completed,
    Failed,
}

/// A customer's intent to load money into their wallet by bank transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct TopUpRequest {
    pub id: TopUpRequestId,
    pub user_id: UserId,
    /// Idempotency key; also the token the customer types into the transfer note.
    pub request_code: String,
    pub status: TopUpStatus,
    pub base_amount: i64,
    pub bonus_amount: i64,
    pub total_amount: i64,
    pub payment_method: String,
    pub qr_image_url: String,
    pub bank_transaction_id: Option<String>,
    pub promo_code_id: Option<PromoCodeId>,
    pub wallet_transaction_id: Option<String>,
    pub received_amount: Option<i64>,
    pub failure_reason: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TopUpRequest {
    /// A pending request past its deadline. Expiry is informational: a late
    /// bank transfer is still reconciled.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == TopUpStatus::Pending && now >= self.expires_at
    }

    /// Status label shown to the customer.
    pub fn display_status(&self, now: DateTime<Utc>) -> &'static str {
        if self.is_expired(now) {
            return "EXPIRED";
        }
        match self.status {
            TopUpStatus::Pending => "PENDING",
            TopUpStatus::Completed => "COMPLETED",
            TopUpStatus::Failed => "FAILED",
        }
    }
}

// =============================================================================
// Promo Codes
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum DiscountType {
    /// `discount_value` is a whole percent of the base amount.
    Percentage,
    /// `discount_value` is a flat đồng bonus.
    Fixed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[serde(rename_all = "camelCase")]
pub struct PromoCode {
    pub id: PromoCodeId,
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: i64,
    /// Cap on a percentage bonus.
    pub max_bonus: Option<i64>,
    /// Minimum base amount to qualify.
    pub min_amount: i64,
    pub usage_limit: Option<i64>,
    pub usage_count: i64,
    pub is_active: bool,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

// =============================================================================
// Notifications
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[serde(rename_all = "snake_case")]
pub enum NotificationChannel {
    InApp,
    Email,
}

/// A message for the notification collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub recipient: UserId,
    pub channel: NotificationChannel,
    /// Dotted event name, e.g. `order.placed`.
    pub event: String,
    pub actor: Option<UserId>,
    pub entity_type: String,
    pub entity_id: String,
    pub data: serde_json::Value,
    pub message: String,
    pub link: Option<String>,
}

impl Notification {
    /// In-app notification with no actor and no link.
    pub fn in_app(
        recipient: UserId,
        event: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Notification {
            recipient,
            channel: NotificationChannel::InApp,
            event: event.into(),
            actor: None,
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            data: serde_json::Value::Null,
            message: message.into(),
            link: None,
        }
    }

    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.link = Some(link.into());
        self
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
