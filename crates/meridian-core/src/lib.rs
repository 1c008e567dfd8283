//! # meridian-core: Pure Business Logic for Meridian Commerce
//!
//! The rules that move money and inventory, as pure functions.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Meridian Commerce Architecture                      │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                  apps/api (axum handlers)                       │   │
//! │  │   place order ─► cancel ─► advance status ─► top-up ─► webhook  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │             ★ meridian-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌─────────┐ ┌──────────┐ ┌─────────┐ ┌─────────┐ ┌────────┐  │   │
//! │  │   │ pricing │ │lifecycle │ │  promo  │ │ webhook │ │ authz  │  │   │
//! │  │   │ totals  │ │ CAS rules│ │ bonus   │ │ HMAC    │ │ guard  │  │   │
//! │  │   └─────────┘ └──────────┘ └─────────┘ └─────────┘ └────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  meridian-db (Database Layer)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain records (Order, Wallet, LedgerEntry, TopUpRequest, ...)
//! - [`money`] - Integer VND amounts
//! - [`error`] - Business error taxonomy
//! - [`validation`] - Input shape checks
//! - [`pricing`] - Order totals
//! - [`lifecycle`] - Order status machine
//! - [`promo`] - Top-up promo eligibility and bonus
//! - [`webhook`] - Bank webhook signature and payload parsing
//! - [`authz`] - Caller/resource/action guard
//!
//! ## Example Usage
//!
//! ```rust
//! use meridian_core::money::Money;
//!
//! let price = Money::from_vnd(150_000);
//! assert_eq!((price * 2).vnd(), 300_000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod authz;
pub mod error;
pub mod lifecycle;
pub mod money;
pub mod pricing;
pub mod promo;
pub mod types;
pub mod validation;
pub mod webhook;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use authz::{authorize, Action, Caller, Resource, Role};
pub use error::{CoreError, CoreResult, ErrorKind, ValidationError};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Flat shipping fee applied to every order (VND).
pub const DEFAULT_SHIPPING_FEE: i64 = 30_000;

/// Smallest top-up a customer may request (VND).
pub const MIN_TOPUP_AMOUNT: i64 = 10_000;

/// Largest top-up a customer may request (VND).
pub const MAX_TOPUP_AMOUNT: i64 = 50_000_000;

/// Minutes a pending top-up request stays payable.
pub const TOPUP_TTL_MINUTES: i64 = 15;

/// Prefix of every top-up request code. Customers type it into the bank
/// transfer note, so it must stay short and unambiguous.
pub const REQUEST_CODE_PREFIX: &str = "NAP";

/// Maximum quantity of a single product on one order.
pub const MAX_ITEM_QUANTITY: i64 = 999;

/// Wallet PINs are exactly this many ASCII digits.
pub const PIN_LENGTH: usize = 6;

/// Maximum length of a cancellation reason.
pub const MAX_REASON_LENGTH: usize = 500;
