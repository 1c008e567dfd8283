//! # Order Repository
//!
//! Orders and their frozen line items.
//!
//! ## Status Compare-And-Set
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  UPDATE orders SET status = :to, ...                                   │
//! │  WHERE id = :id AND status = :from                                     │
//! │                                                                         │
//! │  Two cancellations race:                                               │
//! │    A: pending → cancelled   rows_affected = 1   ✓ refund + restock     │
//! │    B: pending → cancelled   rows_affected = 0   ✗ DbError::Conflict    │
//! │                                                                         │
//! │  B's transaction rolls back, so the compensation runs exactly once.   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use meridian_core::{
    Cancellation, Order, OrderId, OrderItem, OrderStatus, OrderTotals, PaymentInfo,
    PaymentMethod, PaymentStatus, ShippingAddress, ShippingInfo, UserId,
};

const ORDER_COLUMNS: &str = "id, user_id, status, payment_method, payment_status, \
                             payment_reference, shipping_fee, tracking_number, subtotal, \
                             discount, shipping_total, grand_total, shipping_address, \
                             cancel_reason, cancelled_by, cancelled_at, created_at, updated_at";

/// Flat `orders` row. The shipping address is a JSON column.
#[derive(Debug, FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    payment_method: PaymentMethod,
    payment_status: PaymentStatus,
    payment_reference: Option<String>,
    shipping_fee: i64,
    tracking_number: Option<String>,
    subtotal: i64,
    discount: i64,
    shipping_total: i64,
    grand_total: i64,
    shipping_address: String,
    cancel_reason: Option<String>,
    cancelled_by: Option<UserId>,
    cancelled_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        let shipping_address: ShippingAddress = serde_json::from_str(&self.shipping_address)
            .map_err(|e| DbError::corrupt("order.shipping_address", e))?;

        let cancellation = match (self.cancel_reason, self.cancelled_by, self.cancelled_at) {
            (Some(reason), Some(cancelled_by), Some(cancelled_at)) => Some(Cancellation {
                reason,
                cancelled_by,
                cancelled_at,
            }),
            _ => None,
        };

        Ok(Order {
            id: self.id,
            user_id: self.user_id,
            status: self.status,
            items,
            shipping_address,
            payment: PaymentInfo {
                method: self.payment_method,
                status: self.payment_status,
                transaction_reference: self.payment_reference,
            },
            shipping: ShippingInfo {
                fee: self.shipping_fee,
                tracking_number: self.tracking_number,
            },
            totals: OrderTotals {
                subtotal: self.subtotal,
                discount: self.discount,
                shipping_total: self.shipping_total,
                grand_total: self.grand_total,
            },
            cancellation,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Repository for order reads outside a transaction.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order with its items.
    pub async fn get(&self, id: &OrderId) -> DbResult<Option<Order>> {
        let mut conn = self.pool.acquire().await?;
        load_order(&mut conn, id).await
    }

    /// A customer's orders, newest first.
    pub async fn list_for_user(&self, user_id: &UserId, limit: i64) -> DbResult<Vec<Order>> {
        let mut conn = self.pool.acquire().await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC LIMIT ?2",
            ORDER_COLUMNS
        ))
        .bind(user_id)
        .bind(limit)
        .fetch_all(&mut *conn)
        .await?;

        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            let items = load_items(&mut conn, &row.id).await?;
            orders.push(row.into_order(items)?);
        }
        Ok(orders)
    }
}

// =============================================================================
// Transaction-scoped operations
// =============================================================================

/// Inserts an order header and all its items.
pub async fn insert_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
    debug!(id = %order.id, items = order.items.len(), "Inserting order");

    let shipping_address = serde_json::to_string(&order.shipping_address)
        .map_err(|e| DbError::corrupt("order.shipping_address", e))?;

    sqlx::query(
        r#"
        INSERT INTO orders (
            id, user_id, status, payment_method, payment_status, payment_reference,
            shipping_fee, tracking_number, subtotal, discount, shipping_total, grand_total,
            shipping_address, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)
        "#,
    )
    .bind(&order.id)
    .bind(&order.user_id)
    .bind(order.status)
    .bind(order.payment.method)
    .bind(order.payment.status)
    .bind(&order.payment.transaction_reference)
    .bind(order.shipping.fee)
    .bind(&order.shipping.tracking_number)
    .bind(order.totals.subtotal)
    .bind(order.totals.discount)
    .bind(order.totals.shipping_total)
    .bind(order.totals.grand_total)
    .bind(shipping_address)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&mut *conn)
    .await?;

    for item in &order.items {
        sqlx::query(
            r#"
            INSERT INTO order_items (
                id, order_id, product_id, name_snapshot, sku_snapshot, image_snapshot,
                unit_price, sale_price, quantity, line_total
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&item.id)
        .bind(&item.order_id)
        .bind(&item.product_id)
        .bind(&item.name)
        .bind(&item.sku)
        .bind(&item.image_url)
        .bind(item.unit_price)
        .bind(item.sale_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .execute(&mut *conn)
        .await?;
    }

    Ok(())
}

/// Reads an order with its items on the given connection.
///
/// Used inside a transaction to re-read the order after locking it in.
pub async fn load_order(conn: &mut SqliteConnection, id: &OrderId) -> DbResult<Option<Order>> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        "SELECT {} FROM orders WHERE id = ?1",
        ORDER_COLUMNS
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?;

    match row {
        Some(row) => {
            let items = load_items(conn, &row.id).await?;
            Ok(Some(row.into_order(items)?))
        }
        None => Ok(None),
    }
}

async fn load_items(conn: &mut SqliteConnection, order_id: &OrderId) -> DbResult<Vec<OrderItem>> {
    let items = sqlx::query_as::<_, OrderItem>(
        r#"
        SELECT
            id, order_id, product_id,
            name_snapshot AS name,
            sku_snapshot AS sku,
            image_snapshot AS image_url,
            unit_price, sale_price, quantity, line_total
        FROM order_items
        WHERE order_id = ?1
        ORDER BY rowid
        "#,
    )
    .bind(order_id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(items)
}

/// Moves an order forward one step, guarded on its current status.
///
/// A tracking number, when given, replaces the stored one.
pub async fn transition_status(
    conn: &mut SqliteConnection,
    id: &OrderId,
    from: OrderStatus,
    to: OrderStatus,
    tracking_number: Option<&str>,
    payment_status: PaymentStatus,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = ?3,
            tracking_number = COALESCE(?4, tracking_number),
            payment_status = ?5,
            updated_at = ?6
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(to)
    .bind(tracking_number)
    .bind(payment_status)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(
            "Order",
            id.as_str(),
            format!("status is no longer {}", from),
        ));
    }

    Ok(())
}

/// Marks an order cancelled, guarded on the status it was read with.
pub async fn mark_cancelled(
    conn: &mut SqliteConnection,
    id: &OrderId,
    from: OrderStatus,
    cancellation: &Cancellation,
    payment_status: PaymentStatus,
) -> DbResult<()> {
    let result = sqlx::query(
        r#"
        UPDATE orders SET
            status = 'cancelled',
            payment_status = ?3,
            cancel_reason = ?4,
            cancelled_by = ?5,
            cancelled_at = ?6,
            updated_at = ?6
        WHERE id = ?1 AND status = ?2
        "#,
    )
    .bind(id)
    .bind(from)
    .bind(payment_status)
    .bind(&cancellation.reason)
    .bind(&cancellation.cancelled_by)
    .bind(cancellation.cancelled_at)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::conflict(
            "Order",
            id.as_str(),
            format!("status is no longer {}", from),
        ));
    }

    Ok(())
}
