//! API configuration module.
//!
//! Configuration is loaded from environment variables with fallback to defaults.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::SocketAddr;

use meridian_core::{DEFAULT_SHIPPING_FEE, MAX_TOPUP_AMOUNT, MIN_TOPUP_AMOUNT};

/// API server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Interface to bind
    pub bind_addr: String,

    /// HTTP port
    pub port: u16,

    /// SQLite database file
    pub database_path: String,

    /// Maximum pooled connections
    pub db_max_connections: u32,

    /// Secret used to validate caller bearer tokens
    #[serde(skip_serializing)]
    pub jwt_secret: String,

    /// Lifetime of tokens minted by [`crate::auth::JwtManager::generate_token`]
    pub jwt_expiry_secs: i64,

    /// Shared secret for bank webhook HMAC signatures
    #[serde(skip_serializing)]
    pub webhook_secret: String,

    /// Flat shipping fee per order (VND)
    pub shipping_fee: i64,

    /// Smallest accepted top-up (VND)
    pub topup_min_amount: i64,

    /// Largest accepted top-up (VND)
    pub topup_max_amount: i64,

    /// QR image provider, e.g. https://img.vietqr.io/image
    pub qr_base_url: String,

    /// Receiving bank short code
    pub qr_bank_code: String,

    /// Receiving account number
    pub qr_account_number: String,

    /// Receiving account holder name
    pub qr_account_name: String,
}

impl ApiConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from any key lookup (environment, test map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let config = ApiConfig {
            bind_addr: get("BIND_ADDR", "0.0.0.0"),

            port: get("PORT", "8080")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("PORT".to_string()))?,

            database_path: get("DATABASE_PATH", "./meridian.db"),

            db_max_connections: get("DB_MAX_CONNECTIONS", "5")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()))?,

            // In production, this MUST be set via environment variable
            jwt_secret: get("JWT_SECRET", "meridian-dev-secret-change-in-production"),

            jwt_expiry_secs: get("JWT_EXPIRY_SECS", "3600")
                .parse()
                .map_err(|_| ConfigError::InvalidValue("JWT_EXPIRY_SECS".to_string()))?,

            webhook_secret: lookup("WEBHOOK_SECRET").unwrap_or_default(),

            shipping_fee: get("SHIPPING_FEE", &DEFAULT_SHIPPING_FEE.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("SHIPPING_FEE".to_string()))?,

            topup_min_amount: get("TOPUP_MIN_AMOUNT", &MIN_TOPUP_AMOUNT.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TOPUP_MIN_AMOUNT".to_string()))?,

            topup_max_amount: get("TOPUP_MAX_AMOUNT", &MAX_TOPUP_AMOUNT.to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidValue("TOPUP_MAX_AMOUNT".to_string()))?,

            qr_base_url: get("QR_BASE_URL", "https://img.vietqr.io/image"),
            qr_bank_code: get("QR_BANK_CODE", "MB"),
            qr_account_number: get("QR_ACCOUNT_NUMBER", "0000000000"),
            qr_account_name: get("QR_ACCOUNT_NAME", "MERIDIAN COMMERCE"),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.webhook_secret.trim().is_empty() {
            return Err(ConfigError::MissingRequired("WEBHOOK_SECRET".to_string()));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("JWT_SECRET".to_string()));
        }
        if self.shipping_fee < 0 {
            return Err(ConfigError::InvalidValue("SHIPPING_FEE".to_string()));
        }
        if self.topup_min_amount <= 0 || self.topup_min_amount > self.topup_max_amount {
            return Err(ConfigError::InvalidValue("TOPUP_MIN_AMOUNT".to_string()));
        }
        if self.db_max_connections == 0 {
            return Err(ConfigError::InvalidValue("DB_MAX_CONNECTIONS".to_string()));
        }
        Ok(())
    }

    /// Socket address the server listens on.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.port)
            .parse()
            .map_err(|_| ConfigError::InvalidValue("BIND_ADDR".to_string()))
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
