//! QR image URLs for bank-transfer top-ups.
//!
//! The default generator builds a VietQR-style quick-link:
//!
//! ```text
//! {base}/{bank}-{account}-compact2.png?amount=100000&addInfo=NAP123456ABC&accountName=..
//! ```
//!
//! Banking apps that scan it prefill the amount and the transfer note, so the
//! request code reaches the webhook without the customer typing it.

use async_trait::async_trait;
use url::Url;

use crate::config::{ApiConfig, ConfigError};

#[derive(Debug, thiserror::Error)]
pub enum QrError {
    #[error("QR provider unavailable: {0}")]
    Unavailable(String),

    #[error("Could not build QR URL: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait QrGenerator: Send + Sync {
    /// Returns an image URL encoding a transfer of `amount` with `note`.
    async fn generate(&self, amount: i64, note: &str) -> Result<String, QrError>;
}

pub struct VietQrGenerator {
    base_url: Url,
    bank_code: String,
    account_number: String,
    account_name: String,
}

impl VietQrGenerator {
    pub fn from_config(config: &ApiConfig) -> Result<Self, ConfigError> {
        let base_url = Url::parse(&config.qr_base_url)
            .map_err(|_| ConfigError::InvalidValue("QR_BASE_URL".to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ConfigError::InvalidValue("QR_BASE_URL".to_string()));
        }

        Ok(VietQrGenerator {
            base_url,
            bank_code: config.qr_bank_code.clone(),
            account_number: config.qr_account_number.clone(),
            account_name: config.qr_account_name.clone(),
        })
    }

    fn build(&self, amount: i64, note: &str) -> Result<Url, QrError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| QrError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(&format!(
                "{}-{}-compact2.png",
                self.bank_code, self.account_number
            ));
        url.query_pairs_mut()
            .append_pair("amount", &amount.to_string())
            .append_pair("addInfo", note)
            .append_pair("accountName", &self.account_name);
        Ok(url)
    }
}

#[async_trait]
impl QrGenerator for VietQrGenerator {
    async fn generate(&self, amount: i64, note: &str) -> Result<String, QrError> {
        Ok(self.build(amount, note)?.into())
    }
}
