//! # Validation Module
//!
//! Input shape checks run before any transaction is opened.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: axum extractors (deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE (shape: PIN digits, amounts, reasons)            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: services (ownership, stock, balance - needs reads)           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 4: SQLite CHECK / UNIQUE constraints                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::{MAX_ITEM_QUANTITY, MAX_REASON_LENGTH, PIN_LENGTH};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Validates a wallet PIN: exactly six ASCII digits.
///
/// ## Example
/// ```rust
/// use meridian_core::validation::validate_pin;
///
/// assert!(validate_pin("123456").is_ok());
/// assert!(validate_pin("12345").is_err());
/// assert!(validate_pin("12345a").is_err());
/// ```
pub fn validate_pin(pin: &str) -> ValidationResult<()> {
    if pin.is_empty() {
        return Err(ValidationError::Required {
            field: "pin".to_string(),
        });
    }

    if pin.len() != PIN_LENGTH || !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "pin".to_string(),
            reason: format!("must be exactly {} digits", PIN_LENGTH),
        });
    }

    Ok(())
}

/// Validates an item quantity (1..=MAX_ITEM_QUANTITY).
pub fn validate_quantity(quantity: i64) -> ValidationResult<()> {
    if quantity <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if quantity > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a top-up base amount against the configured bounds.
pub fn validate_topup_amount(amount: i64, min: i64, max: i64) -> ValidationResult<()> {
    if amount < min || amount > max {
        return Err(ValidationError::OutOfRange {
            field: "amount".to_string(),
            min,
            max,
        });
    }
    Ok(())
}

/// Validates that an identifier field is present.
pub fn validate_id(field: &str, value: &str) -> ValidationResult<()> {
    if value.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

/// Validates a cancellation reason and returns it trimmed.
pub fn validate_reason(reason: &str) -> ValidationResult<String> {
    let reason = reason.trim();

    if reason.is_empty() {
        return Err(ValidationError::Required {
            field: "reason".to_string(),
        });
    }

    if reason.chars().count() > MAX_REASON_LENGTH {
        return Err(ValidationError::TooLong {
            field: "reason".to_string(),
            max: MAX_REASON_LENGTH,
        });
    }

    Ok(reason.to_string())
}
