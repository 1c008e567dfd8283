//! Bank webhook handling.
//!
//! ```text
//! raw bytes + x-webhook-signature
//!        │
//!        ▼
//!   verify HMAC ──── fail ──► Err(InvalidSignature)   (401, nothing written)
//!        │
//!        ▼
//!   interpret ────── ignored / malformed ──► Ok(outcome)
//!        │
//!        ▼
//!   reconcile (one tx, guard: request_code AND status = PENDING)
//!        ├── no pending match ──────────► no-op
//!        ├── amount ≠ base ─────────────► FAILED "amount_mismatch"
//!        └── amount = base ─────────────► ledger credit total, COMPLETED,
//!                                         promo usage
//! ```
//!
//! Every authenticated delivery is acknowledged. Reconciliation errors are
//! logged and swallowed so the bank does not retry into the same failure.

use std::sync::Arc;

use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};

use meridian_core::webhook::{self, BankTransfer, IgnoreReason, WebhookEvent};
use meridian_core::{
    CoreError, LedgerDraft, LedgerMetadata, Money, Notification, TopUpRequest, TopUpStatus,
    TransactionType,
};
use meridian_db::ledger;
use meridian_db::repository::{promo as promo_store, topup as topup_store};

use super::notification_service::publish_best_effort;
use crate::error::ServiceResult;
use crate::AppState;

/// Failure reason stored on a request paid with the wrong amount.
pub const AMOUNT_MISMATCH_REASON: &str = "amount_mismatch";

/// What an authenticated delivery led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Ignored(IgnoreReason),
    /// Authenticated but unreadable (bad amount, unexpected shape).
    Malformed(String),
    /// No PENDING request carries this code (unknown, or already settled).
    NoPendingRequest { request_code: String },
    Completed {
        request_code: String,
        credited: i64,
        balance_after: i64,
    },
    AmountMismatch {
        request_code: String,
        expected: i64,
        received: i64,
    },
    /// Reconciliation failed and was rolled back.
    Errored { request_code: String },
}

impl WebhookOutcome {
    /// Message returned to the bank.
    pub fn message(&self) -> String {
        match self {
            WebhookOutcome::Ignored(reason) => format!("Ignored: {:?}", reason),
            WebhookOutcome::Malformed(_) => "Acknowledged".to_string(),
            WebhookOutcome::NoPendingRequest { .. } => "No pending request".to_string(),
            WebhookOutcome::Completed { request_code, .. } => {
                format!("Top-up {} completed", request_code)
            }
            WebhookOutcome::AmountMismatch { request_code, .. } => {
                format!("Top-up {} failed: amount mismatch", request_code)
            }
            WebhookOutcome::Errored { .. } => "Acknowledged".to_string(),
        }
    }
}

pub struct WebhookService {
    state: Arc<AppState>,
}

impl WebhookService {
    pub fn new(state: Arc<AppState>) -> Self {
        WebhookService { state }
    }

    /// Authenticates and processes one delivery.
    ///
    /// Only authentication failures are returned as errors.
    pub async fn handle(
        &self,
        signature_header: Option<&str>,
        raw_body: &[u8],
    ) -> Result<WebhookOutcome, CoreError> {
        let body = match webhook::verify(
            self.state.config.webhook_secret.as_bytes(),
            signature_header,
            raw_body,
        ) {
            Ok(body) => body,
            Err(e) => {
                warn!(error = %e, "Webhook rejected");
                return Err(e);
            }
        };

        let transfer = match webhook::interpret(body) {
            Ok(WebhookEvent::Transfer(transfer)) => transfer,
            Ok(WebhookEvent::Ignored(reason)) => {
                info!(?reason, "Webhook acknowledged without action");
                return Ok(WebhookOutcome::Ignored(reason));
            }
            Err(e) => {
                error!(error = %e, "Webhook payload could not be interpreted");
                return Ok(WebhookOutcome::Malformed(e.to_string()));
            }
        };

        match self.reconcile(&transfer).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                error!(
                    request_code = %transfer.request_code,
                    bank_transaction_id = ?transfer.bank_transaction_id,
                    error = %e,
                    "Top-up reconciliation failed"
                );
                Ok(WebhookOutcome::Errored {
                    request_code: transfer.request_code,
                })
            }
        }
    }

    /// Settles the PENDING request named by `transfer`, at most once.
    pub async fn reconcile(&self, transfer: &BankTransfer) -> ServiceResult<WebhookOutcome> {
        let no_match = || WebhookOutcome::NoPendingRequest {
            request_code: transfer.request_code.clone(),
        };

        // Pre-read outside the transaction; the wallet is opened before `begin`
        let Some(request) = self.state.db.topups().get_by_code(&transfer.request_code).await? else {
            info!(request_code = %transfer.request_code, "No top-up request for code");
            return Ok(no_match());
        };
        if request.status != TopUpStatus::Pending {
            info!(
                request_code = %request.request_code,
                status = ?request.status,
                "Top-up already settled, delivery ignored"
            );
            return Ok(no_match());
        }

        if transfer.amount != request.base_amount {
            return self.fail_mismatch(transfer, no_match).await;
        }

        let wallet = self.state.db.wallets().get_or_create(&request.user_id).await?;

        let mut tx = self.state.db.begin().await?;

        let Some(request) = topup_store::find_pending_by_code(&mut *tx, &transfer.request_code).await?
        else {
            return Ok(no_match());
        };

        // A second pending request with the same promo can reach here after
        // the first completed; it is credited without the bonus.
        let already_redeemed = match &request.promo_code_id {
            Some(promo_id) => promo_store::usage_exists(&mut *tx, promo_id, &request.user_id).await?,
            None => false,
        };
        let promo_id = if already_redeemed {
            warn!(
                request_code = %request.request_code,
                "Promo already redeemed by this user, crediting base amount only"
            );
            None
        } else {
            request.promo_code_id.clone()
        };
        let credit = if promo_id.is_some() {
            request.total_amount
        } else {
            request.base_amount
        };

        let entry = ledger::credit(
            &mut tx,
            &wallet.id,
            Money::from_vnd(credit),
            LedgerDraft {
                transaction_type: TransactionType::Topup,
                description: format!("Top-up {}", request.request_code),
                metadata: LedgerMetadata {
                    topup_request_id: Some(request.id.clone()),
                    request_code: Some(request.request_code.clone()),
                    bank_transaction_id: transfer.bank_transaction_id.clone(),
                    ..LedgerMetadata::default()
                },
            },
        )
        .await?;

        topup_store::mark_completed(
            &mut *tx,
            &request.id,
            &entry.id,
            transfer.bank_transaction_id.as_deref(),
            transfer.amount,
            Utc::now(),
        )
        .await?;

        if let Some(promo_id) = &promo_id {
            promo_store::record_usage(
                &mut *tx,
                promo_id,
                &request.user_id,
                &request.id,
                request.bonus_amount,
            )
            .await?;
        }

        tx.commit().await?;

        info!(
            request_code = %request.request_code,
            user_id = %request.user_id,
            credited = credit,
            balance_after = entry.balance_after,
            "Top-up completed"
        );

        publish_best_effort(
            self.state.notifier.as_ref(),
            vec![completed_notification(&request, credit, entry.balance_after)],
        )
        .await;

        Ok(WebhookOutcome::Completed {
            request_code: request.request_code,
            credited: credit,
            balance_after: entry.balance_after,
        })
    }

    async fn fail_mismatch(
        &self,
        transfer: &BankTransfer,
        no_match: impl Fn() -> WebhookOutcome,
    ) -> ServiceResult<WebhookOutcome> {
        let mut tx = self.state.db.begin().await?;

        let Some(request) = topup_store::find_pending_by_code(&mut *tx, &transfer.request_code).await?
        else {
            return Ok(no_match());
        };

        topup_store::mark_failed(
            &mut *tx,
            &request.id,
            transfer.bank_transaction_id.as_deref(),
            transfer.amount,
            AMOUNT_MISMATCH_REASON,
        )
        .await?;

        tx.commit().await?;

        warn!(
            request_code = %request.request_code,
            expected = request.base_amount,
            received = transfer.amount,
            "Top-up failed on amount mismatch"
        );

        let mismatch = CoreError::AmountMismatch {
            expected: request.base_amount,
            received: transfer.amount,
        };
        publish_best_effort(
            self.state.notifier.as_ref(),
            vec![Notification::in_app(
                request.user_id.clone(),
                "wallet.topup_failed",
                "topup_request",
                request.request_code.as_str(),
                format!(
                    "Top-up {} failed: expected {}, received {}",
                    request.request_code,
                    Money::from_vnd(request.base_amount),
                    Money::from_vnd(transfer.amount)
                ),
            )
            .with_data(json!({
                "requestCode": request.request_code,
                "expectedAmount": request.base_amount,
                "receivedAmount": transfer.amount,
                "reason": mismatch.to_string(),
            }))],
        )
        .await;

        Ok(WebhookOutcome::AmountMismatch {
            request_code: request.request_code,
            expected: request.base_amount,
            received: transfer.amount,
        })
    }
}

fn completed_notification(request: &TopUpRequest, credited: i64, balance_after: i64) -> Notification {
    Notification::in_app(
        request.user_id.clone(),
        "wallet.topup_completed",
        "topup_request",
        request.request_code.as_str(),
        format!(
            "{} added to your wallet, new balance {}",
            Money::from_vnd(credited),
            Money::from_vnd(balance_after)
        ),
    )
    .with_data(json!({
        "requestCode": request.request_code,
        "credited": credited,
        "bonusAmount": request.bonus_amount,
        "newBalance": balance_after,
    }))
    .with_link("/wallet")
}
