//! # Meridian API
//!
//! HTTP server for the storefront's transactional core: order placement and
//! cancellation, the custodial wallet, bank-transfer top-ups and the bank
//! webhook that settles them.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Meridian API Services                           │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐ │
//! │  │  OrderService  │  │LifecycleService│  │  WalletService             │ │
//! │  │                │  │                │  │                            │ │
//! │  │ • prepare      │  │ • advance      │  │ • verify_pin               │ │
//! │  │ • execute      │  │ • cancel       │  │ • summary / history        │ │
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘ │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐                                 │
//! │  │  TopUpService  │  │ WebhookService │◄──── bank (HMAC-SHA512 signed)  │
//! │  │                │  │                │                                 │
//! │  │ • create + QR  │  │ • verify       │                                 │
//! │  │ • status       │  │ • reconcile    │                                 │
//! │  └────────────────┘  └────────────────┘                                 │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐   │
//! │  │                      Infrastructure                              │   │
//! │  │                                                                  │   │
//! │  │  ┌──────────────┐  ┌──────────────────┐  ┌────────────────────┐  │   │
//! │  │  │ meridian-db  │  │ NotificationPub. │  │  JWT Auth          │  │   │
//! │  │  │ (SQLite)     │  │ QrGenerator      │  │  (caller identity) │  │   │
//! │  │  └──────────────┘  └──────────────────┘  └────────────────────┘  │   │
//! │  └──────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables:
//! - `DATABASE_PATH` - SQLite file (default: ./meridian.db)
//! - `PORT` - HTTP port (default: 8080)
//! - `JWT_SECRET` - Secret for validating bearer tokens
//! - `WEBHOOK_SECRET` - Shared HMAC secret with the bank (required)
//! - `SHIPPING_FEE` - Flat fee per order (default: 30000)
//! - `QR_BASE_URL`, `QR_BANK_CODE`, `QR_ACCOUNT_NUMBER`, `QR_ACCOUNT_NAME`

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod logging;
pub mod routes;
pub mod services;

use std::sync::Arc;

use meridian_db::Database;

// Re-exports
pub use auth::JwtManager;
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiResponse, ServiceError, ServiceResult};
pub use routes::build_router;
pub use services::notification_service::{NotificationPublisher, OutboxPublisher};
pub use services::qr_service::{QrGenerator, VietQrGenerator};

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub config: ApiConfig,
    pub jwt: JwtManager,
    pub notifier: Arc<dyn NotificationPublisher>,
    pub qr: Arc<dyn QrGenerator>,
}

impl AppState {
    /// State with the default collaborators: the notification outbox table
    /// and the VietQR link builder.
    pub fn new(db: Database, config: ApiConfig) -> Result<Self, ConfigError> {
        let qr = VietQrGenerator::from_config(&config)?;
        let notifier = OutboxPublisher::new(db.notifications());
        let jwt = JwtManager::new(config.jwt_secret.clone(), config.jwt_expiry_secs);

        Ok(AppState {
            db,
            config,
            jwt,
            notifier: Arc::new(notifier),
            qr: Arc::new(qr),
        })
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationPublisher>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_qr(mut self, qr: Arc<dyn QrGenerator>) -> Self {
        self.qr = qr;
        self
    }
}
