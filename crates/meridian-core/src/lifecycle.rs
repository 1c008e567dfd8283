//! # Order Lifecycle
//!
//! Forward-only status machine. The database applies every transition as a
//! compare-and-swap on the prior status; this module decides which
//! transitions exist at all.
//!
//! ```text
//!   pending ──► processing ──► shipped ──► delivered ──► completed
//!      │             │
//!      └──────┬──────┘
//!             ▼
//!         cancelled      (cancellation flow only, with compensation)
//!
//!   returned             (no transition targets it)
//! ```

use crate::error::{CoreError, CoreResult};
use crate::types::{OrderStatus, PaymentMethod, PaymentStatus};

/// The single forward step allowed from `status`, if any.
pub fn next_status(status: OrderStatus) -> Option<OrderStatus> {
    match status {
        OrderStatus::Pending => Some(OrderStatus::Processing),
        OrderStatus::Processing => Some(OrderStatus::Shipped),
        OrderStatus::Shipped => Some(OrderStatus::Delivered),
        OrderStatus::Delivered => Some(OrderStatus::Completed),
        OrderStatus::Completed | OrderStatus::Cancelled | OrderStatus::Returned => None,
    }
}

/// Statuses from which an order can still be cancelled.
pub const CANCELLABLE: [OrderStatus; 2] = [OrderStatus::Pending, OrderStatus::Processing];

pub fn is_cancellable(status: OrderStatus) -> bool {
    CANCELLABLE.contains(&status)
}

/// Validates a forward (admin) transition.
///
/// Cancellation is not a forward transition; it goes through
/// `check_cancellable` and the cancellation flow.
pub fn check_transition(order_id: &str, from: OrderStatus, to: OrderStatus) -> CoreResult<()> {
    if next_status(from) == Some(to) {
        return Ok(());
    }

    Err(CoreError::InvalidState {
        entity: "Order",
        id: order_id.to_string(),
        current: from.to_string(),
        attempted: format!("move to {}", to),
    })
}

/// Validates that an order in `status` may be cancelled.
pub fn check_cancellable(order_id: &str, status: OrderStatus) -> CoreResult<()> {
    if is_cancellable(status) {
        return Ok(());
    }

    Err(CoreError::InvalidState {
        entity: "Order",
        id: order_id.to_string(),
        current: status.to_string(),
        attempted: "cancel".to_string(),
    })
}

/// Payment status change implied by reaching `to`.
///
/// Cash on delivery is collected by the courier, so the order counts as paid
/// once it is delivered.
pub fn payment_status_on(
    method: PaymentMethod,
    current: PaymentStatus,
    to: OrderStatus,
) -> Option<PaymentStatus> {
    match (method, current, to) {
        (PaymentMethod::Cod, PaymentStatus::Pending, OrderStatus::Delivered) => {
            Some(PaymentStatus::Paid)
        }
        _ => None,
    }
}
