//! # Repository Module
//!
//! Database access for every table the transactional core touches.
//!
//! ## Pool vs Transaction
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Where Each Call Runs                                 │
//! │                                                                         │
//! │  Handler / service                                                      │
//! │       │                                                                 │
//! │       ├── db.orders().get(&id)            → pool (own connection)       │
//! │       │                                                                 │
//! │       └── let mut tx = db.begin()                                       │
//! │              ├── product::decrement_stock(&mut *tx, ..)                 │
//! │              ├── order::insert_order(&mut *tx, ..)                      │
//! │              ├── ledger::debit(&mut tx, ..)                             │
//! │              ├── cart::remove_items(&mut *tx, ..)                       │
//! │              └── tx.commit()      ← all or nothing                      │
//! │                                                                         │
//! │  Inside a transaction never call a pool-scoped method: with a single   │
//! │  connection pool it waits on itself.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog reads, guarded stock movements
//! - [`cart::CartRepository`] - Cart selection and removal
//! - [`address::AddressRepository`] - Saved delivery addresses
//! - [`order::OrderRepository`] - Orders, items, status CAS
//! - [`wallet::WalletRepository`] - Wallets, PINs, ledger history
//! - [`topup::TopUpRepository`] - Bank top-up requests
//! - [`promo::PromoRepository`] - Promo codes and per-user usage
//! - [`notification::NotificationRepository`] - Notification outbox

pub mod address;
pub mod cart;
pub mod notification;
pub mod order;
pub mod product;
pub mod promo;
pub mod topup;
pub mod wallet;
