//! # meridian-db: Database Layer for Meridian Commerce
//!
//! SQLite persistence for orders, wallets, top-up requests and the
//! notification outbox.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Meridian Commerce Data Flow                        │
//! │                                                                         │
//! │  apps/api service (place_order, cancel_order, reconcile, ...)          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                   meridian-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐  │   │
//! │  │   │   Database    │    │  Repositories │    │  Migrations  │  │   │
//! │  │   │   (pool.rs)   │    │ product, cart │    │  (embedded)  │  │   │
//! │  │   │               │◄───│ order, wallet │    │ 001_init.sql │  │   │
//! │  │   │ SqlitePool    │    │ topup, promo  │    │              │  │   │
//! │  │   │ begin() → tx  │    │ notification  │    │              │  │   │
//! │  │   └───────────────┘    └───────┬───────┘    └──────────────┘  │   │
//! │  │                                │                                │   │
//! │  │                        ┌───────▼───────┐                        │   │
//! │  │                        │    ledger     │ debit / credit         │   │
//! │  │                        │ (tx required) │ CAS balance + row      │   │
//! │  │                        └───────────────┘                        │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Two Kinds of Repository Methods
//!
//! - `&self` methods on `XxxRepository` run on the pool: reads and
//!   single-statement writes that need no surrounding transaction.
//! - Free functions in each repository module take `&mut SqliteConnection`
//!   and are meant to be called with `&mut *tx` so several of them commit or
//!   roll back together.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use meridian_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("meridian.db")).await?;
//! let wallet = db.wallets().get_by_user(&user_id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};
pub use repository::wallet::ledger;

pub use repository::address::AddressRepository;
pub use repository::cart::CartRepository;
pub use repository::notification::NotificationRepository;
pub use repository::order::OrderRepository;
pub use repository::product::ProductRepository;
pub use repository::promo::PromoRepository;
pub use repository::topup::TopUpRepository;
pub use repository::wallet::WalletRepository;
