//! Top-up initiation and status.
//!
//! A request is a promise: "if a transfer of exactly `base_amount` carrying
//! `request_code` arrives, credit `base_amount + bonus_amount`". Nothing moves
//! here; the webhook does the crediting.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use meridian_core::promo::{check_eligibility, compute_bonus, normalize_code, PromoRejection};
use meridian_core::validation::validate_topup_amount;
use meridian_core::webhook::generate_request_code;
use meridian_core::{
    authorize, Action, Caller, CoreError, Money, PromoCodeId, Resource, TopUpRequest,
    TopUpRequestId, TopUpStatus, TOPUP_TTL_MINUTES,
};

use crate::error::ServiceResult;
use crate::AppState;

/// Fresh codes tried before giving up on a request-code collision.
const CODE_ATTEMPTS: usize = 3;

const RECENT_REQUESTS_LIMIT: i64 = 20;

/// Body of `POST /api/wallet/topups`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTopUpInput {
    pub amount: i64,
    #[serde(default)]
    pub promo_code: Option<String>,
}

/// A request as the customer sees it, with expiry applied.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopUpView {
    #[serde(flatten)]
    pub request: TopUpRequest,
    pub display_status: &'static str,
}

impl From<TopUpRequest> for TopUpView {
    fn from(request: TopUpRequest) -> Self {
        let display_status = request.display_status(Utc::now());
        TopUpView {
            request,
            display_status,
        }
    }
}

pub struct TopUpService {
    state: Arc<AppState>,
}

impl TopUpService {
    pub fn new(state: Arc<AppState>) -> Self {
        TopUpService { state }
    }

    pub async fn create(&self, caller: &Caller, input: CreateTopUpInput) -> ServiceResult<TopUpView> {
        let config = &self.state.config;
        validate_topup_amount(input.amount, config.topup_min_amount, config.topup_max_amount)
            .map_err(CoreError::from)?;

        let promo_code = input
            .promo_code
            .as_deref()
            .map(normalize_code)
            .filter(|code| !code.is_empty());

        let (promo_id, bonus) = match promo_code {
            Some(code) => {
                let (id, bonus) = self.apply_promo(caller, &code, input.amount).await?;
                (Some(id), bonus)
            }
            None => (None, Money::zero()),
        };

        let total = Money::from_vnd(input.amount) + bonus;

        for attempt in 1..=CODE_ATTEMPTS {
            let request_code = generate_request_code();

            let qr_image_url = self
                .state
                .qr
                .generate(input.amount, &request_code)
                .await
                .map_err(|e| CoreError::external("QR provider", e.to_string()))?;

            let now = Utc::now();
            let request = TopUpRequest {
                id: TopUpRequestId::generate(),
                user_id: caller.user_id.clone(),
                request_code,
                status: TopUpStatus::Pending,
                base_amount: input.amount,
                bonus_amount: bonus.vnd(),
                total_amount: total.vnd(),
                payment_method: "bank_transfer".to_string(),
                qr_image_url,
                bank_transaction_id: None,
                promo_code_id: promo_id.clone(),
                wallet_transaction_id: None,
                received_amount: None,
                failure_reason: None,
                expires_at: now + Duration::minutes(TOPUP_TTL_MINUTES),
                completed_at: None,
                created_at: now,
                updated_at: now,
            };

            match self.state.db.topups().insert(&request).await {
                Ok(()) => {
                    info!(
                        user_id = %caller.user_id,
                        request_code = %request.request_code,
                        base_amount = request.base_amount,
                        bonus_amount = request.bonus_amount,
                        "Top-up request created"
                    );
                    return Ok(TopUpView::from(request));
                }
                Err(e) if e.is_unique_violation_on("topup_requests.request_code") && attempt < CODE_ATTEMPTS => {
                    warn!(attempt, "Request code collision, regenerating");
                }
                Err(e) => return Err(e.into()),
            }
        }

        // Only reachable with CODE_ATTEMPTS == 0
        Err(CoreError::external("request code generator", "no code available").into())
    }

    async fn apply_promo(
        &self,
        caller: &Caller,
        code: &str,
        base_amount: i64,
    ) -> ServiceResult<(PromoCodeId, Money)> {
        let promos = self.state.db.promos();

        let promo = promos
            .get_by_code(code)
            .await?
            .ok_or(CoreError::PromoRejected(PromoRejection::UnknownCode))?;
        let used = promos.has_user_used(&promo.id, &caller.user_id).await?;

        check_eligibility(&promo, base_amount, Utc::now(), used).map_err(CoreError::PromoRejected)?;

        let bonus = compute_bonus(&promo, base_amount);
        Ok((promo.id, bonus))
    }

    /// One request by code, visible to its owner and to admins.
    pub async fn status(&self, caller: &Caller, request_code: &str) -> ServiceResult<TopUpView> {
        let code = request_code.trim().to_ascii_uppercase();
        let request = self
            .state
            .db
            .topups()
            .get_by_code(&code)
            .await?
            .ok_or_else(|| CoreError::not_found("TopUpRequest", code.as_str()))?;
        authorize(caller, Resource::TopUpRequest { owner: &request.user_id }, Action::View)?;
        Ok(TopUpView::from(request))
    }

    /// The caller's recent requests, newest first.
    pub async fn list(&self, caller: &Caller) -> ServiceResult<Vec<TopUpView>> {
        let requests = self
            .state
            .db
            .topups()
            .list_for_user(&caller.user_id, RECENT_REQUESTS_LIMIT)
            .await?;
        Ok(requests.into_iter().map(TopUpView::from).collect())
    }
}
