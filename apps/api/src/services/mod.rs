//! Service layer.
//!
//! Each service owns the transactions for its operations. Notifications are
//! published only after commit.

pub mod lifecycle_service;
pub mod notification_service;
pub mod order_service;
pub mod qr_service;
pub mod topup_service;
pub mod wallet_service;
pub mod webhook_service;
