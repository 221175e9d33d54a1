//! # Validation Module
//!
//! Input validation for settlement requests.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: HTTP handler (apps/api)                                      │
//! │  └── Type validation (JSON deserialization)                            │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Cart must not be empty                                            │
//! │  ├── Payment method must be present and known                          │
//! │  └── Movement quantities must make sense for their type                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  ├── NOT NULL / CHECK constraints                                      │
//! │  └── Foreign key constraints                                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fee percentages and installment counts are deliberately left unchecked.

use crate::checkout::CartLine;
use crate::error::ValidationError;
use crate::types::{MovementType, PaymentMethod};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

/// Upper bound for list endpoints.
pub const MAX_LIST_LIMIT: i64 = 500;

// =============================================================================
// Sale Validators
// =============================================================================

/// Validates that the cart has at least one line.
///
/// ## Example
/// ```rust
/// use paws_core::validation::validate_cart;
///
/// assert!(validate_cart(&[]).is_err());
/// ```
pub fn validate_cart(lines: &[CartLine]) -> ValidationResult<()> {
    if lines.is_empty() {
        return Err(ValidationError::required("items"));
    }

    for line in lines {
        if line.product_id.trim().is_empty() {
            return Err(ValidationError::required("product_id"));
        }
        validate_quantity(line.quantity)?;
    }

    Ok(())
}

/// Validates and parses the payment method tag.
///
/// `None` and blank strings are reported as missing. `cashback` parses but
/// is refused: the wallet is spent through `use_wallet_balance`.
pub fn validate_payment_method(method: Option<&str>) -> ValidationResult<PaymentMethod> {
    let method = match method.map(str::trim) {
        None | Some("") => return Err(ValidationError::required("payment_method")),
        Some(tag) => tag.parse::<PaymentMethod>()?,
    };

    if !method.is_tender() {
        return Err(ValidationError::NotAllowed {
            field: "payment_method".to_string(),
            allowed: PaymentMethod::ALL
                .iter()
                .filter(|m| m.is_tender())
                .map(|m| m.as_str().to_string())
                .collect(),
        });
    }

    Ok(method)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a line quantity.
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }
    Ok(())
}

/// Validates a manual stock movement.
///
/// IN and OUT take a positive magnitude; ADJUSTMENT takes a non-zero signed
/// delta. A unit cost, when given, must not be negative.
pub fn validate_movement(
    movement_type: MovementType,
    quantity: i64,
    unit_cost_cents: Option<i64>,
) -> ValidationResult<()> {
    match movement_type {
        MovementType::In | MovementType::Out => validate_quantity(quantity)?,
        MovementType::Adjustment if quantity == 0 => {
            return Err(ValidationError::InvalidFormat {
                field: "quantity".to_string(),
                reason: "adjustment must not be zero".to_string(),
            })
        }
        MovementType::Adjustment => {}
    }

    if unit_cost_cents.is_some_and(|c| c < 0) {
        return Err(ValidationError::MustBePositive {
            field: "unit_cost".to_string(),
        });
    }

    Ok(())
}

/// Clamps a list limit into `1..=MAX_LIST_LIMIT`, defaulting to 50.
pub fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, MAX_LIST_LIMIT)
}

// =============================================================================
// Unit Tests
// =============================================================================
