//! Wallet reads and PIN verification.

use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use meridian_core::validation::validate_pin;
use meridian_core::{authorize, Action, Caller, CoreError, LedgerEntry, Resource, Wallet};
use meridian_db::repository::wallet::check_pin;

use crate::error::ServiceResult;
use crate::AppState;

/// Ledger rows returned when the caller does not ask for a limit.
pub const DEFAULT_HISTORY_LIMIT: i64 = 20;
const MAX_HISTORY_LIMIT: i64 = 100;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub wallet_id: String,
    pub balance: i64,
    pub formatted_balance: String,
    pub has_pin: bool,
}

impl From<&Wallet> for WalletSummary {
    fn from(wallet: &Wallet) -> Self {
        WalletSummary {
            wallet_id: wallet.id.to_string(),
            balance: wallet.balance,
            formatted_balance: wallet.balance().to_string(),
            has_pin: wallet.has_pin(),
        }
    }
}

pub struct WalletService {
    state: Arc<AppState>,
}

impl WalletService {
    pub fn new(state: Arc<AppState>) -> Self {
        WalletService { state }
    }

    /// Checks a PIN without moving money (storefront confirm dialogs).
    pub async fn verify_pin(&self, caller: &Caller, pin: &str) -> ServiceResult<()> {
        validate_pin(pin).map_err(CoreError::from)?;

        let wallet = self
            .state
            .db
            .wallets()
            .get_by_user(&caller.user_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Wallet", caller.user_id.as_str()))?;
        authorize(caller, Resource::Wallet { owner: &wallet.user_id }, Action::Use)?;

        let hash = wallet.pin_hash.as_deref().ok_or(CoreError::PinNotSet)?;
        if !check_pin(pin, hash).await? {
            debug!(wallet_id = %wallet.id, "PIN verification failed");
            return Err(CoreError::InvalidPin.into());
        }
        Ok(())
    }

    /// Balance and PIN status. The wallet is opened on first access.
    pub async fn summary(&self, caller: &Caller) -> ServiceResult<WalletSummary> {
        let wallet = self.state.db.wallets().get_or_create(&caller.user_id).await?;
        authorize(caller, Resource::Wallet { owner: &wallet.user_id }, Action::View)?;
        Ok(WalletSummary::from(&wallet))
    }

    /// Most recent ledger rows, newest first.
    pub async fn history(&self, caller: &Caller, limit: Option<i64>) -> ServiceResult<Vec<LedgerEntry>> {
        let Some(wallet) = self.state.db.wallets().get_by_user(&caller.user_id).await? else {
            return Ok(Vec::new());
        };
        authorize(caller, Resource::Wallet { owner: &wallet.user_id }, Action::View)?;

        let limit = limit
            .unwrap_or(DEFAULT_HISTORY_LIMIT)
            .clamp(1, MAX_HISTORY_LIMIT);
        let entries = self
            .state
            .db
            .wallets()
            .list_transactions(&wallet.id, limit)
            .await?;
        Ok(entries)
    }
}
