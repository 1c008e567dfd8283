//! # Top-Up Promotions
//!
//! Eligibility checks and bonus computation for promo codes attached to a
//! top-up request. Usage is only recorded when the transfer is reconciled.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

use crate::money::Money;
use crate::types::{DiscountType, PromoCode};

/// Why a promo code cannot be applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum PromoRejection {
    UnknownCode,
    Inactive,
    NotStarted,
    Expired,
    UsageLimitReached,
    BelowMinimum { min_amount: i64 },
    AlreadyUsed,
}

impl fmt::Display for PromoRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PromoRejection::UnknownCode => write!(f, "code does not exist"),
            PromoRejection::Inactive => write!(f, "code is no longer active"),
            PromoRejection::NotStarted => write!(f, "code is not valid yet"),
            PromoRejection::Expired => write!(f, "code has expired"),
            PromoRejection::UsageLimitReached => write!(f, "code has reached its usage limit"),
            PromoRejection::BelowMinimum { min_amount } => write!(
                f,
                "top-up must be at least {}",
                Money::from_vnd(*min_amount)
            ),
            PromoRejection::AlreadyUsed => write!(f, "you have already used this code"),
        }
    }
}

/// Codes are stored upper-case; customers type whatever they like.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_ascii_uppercase()
}

/// Checks every eligibility rule in a fixed order so the customer always sees
/// the most fundamental problem first.
pub fn check_eligibility(
    promo: &PromoCode,
    base_amount: i64,
    now: DateTime<Utc>,
    already_used_by_user: bool,
) -> Result<(), PromoRejection> {
    if !promo.is_active {
        return Err(PromoRejection::Inactive);
    }
    if let Some(starts_at) = promo.starts_at {
        if now < starts_at {
            return Err(PromoRejection::NotStarted);
        }
    }
    if let Some(expires_at) = promo.expires_at {
        if now >= expires_at {
            return Err(PromoRejection::Expired);
        }
    }
    if let Some(limit) = promo.usage_limit {
        if promo.usage_count >= limit {
            return Err(PromoRejection::UsageLimitReached);
        }
    }
    if base_amount < promo.min_amount {
        return Err(PromoRejection::BelowMinimum {
            min_amount: promo.min_amount,
        });
    }
    if already_used_by_user {
        return Err(PromoRejection::AlreadyUsed);
    }
    Ok(())
}

/// Bonus credited on top of the base amount.
///
/// Percentage bonuses round down and are capped by `max_bonus` when set.
pub fn compute_bonus(promo: &PromoCode, base_amount: i64) -> Money {
    let base = Money::from_vnd(base_amount);
    match promo.discount_type {
        DiscountType::Percentage => {
            let bonus = base.percent_floor(promo.discount_value);
            match promo.max_bonus {
                Some(cap) => bonus.min(Money::from_vnd(cap)),
                None => bonus,
            }
        }
        DiscountType::Fixed => Money::from_vnd(promo.discount_value),
    }
}
