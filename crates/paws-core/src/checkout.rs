//! # Checkout Totals
//!
//! Turns the cart of a new sale into line totals and sale totals.
//!
//! ```text
//! line_total = unit_price × quantity − discount
//! subtotal   = Σ unit_price × quantity
//! discount   = explicit discount_amount, else Σ line discounts
//! total      = max(subtotal − discount, 0)
//! ```
//!
//! Cart amounts come straight from the request, so every step is checked;
//! an amount that doesn't fit in cents is a validation error.

use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::money::Money;
use crate::validation::ValidationResult;

/// One requested line of a new sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: Money,
    #[serde(default)]
    pub discount: Money,
}

impl CartLine {
    /// Gross value of the line before its discount.
    #[inline]
    pub fn gross(&self) -> ValidationResult<Money> {
        self.unit_price
            .checked_multiply_quantity(self.quantity)
            .ok_or_else(|| ValidationError::overflow("unit_price"))
    }

    /// unit_price × quantity − discount.
    pub fn line_total(&self) -> ValidationResult<Money> {
        self.gross()?
            .checked_sub(self.discount)
            .ok_or_else(|| ValidationError::overflow("discount"))
    }
}

fn checked_sum<I>(amounts: I, field: &str) -> ValidationResult<Money>
where
    I: IntoIterator<Item = ValidationResult<Money>>,
{
    amounts.into_iter().try_fold(Money::zero(), |acc, amount| {
        acc.checked_add(amount?)
            .ok_or_else(|| ValidationError::overflow(field))
    })
}

/// Totals of a sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleTotals {
    pub subtotal: Money,
    pub discount: Money,
    pub total: Money,
}

/// Computes the totals of `lines`.
///
/// An explicit `discount_amount` replaces the per-line discounts; it is not
/// added on top of them.
///
/// ## Example
/// ```rust
/// use paws_core::checkout::{compute_totals, CartLine};
/// use paws_core::Money;
///
/// let lines = vec![CartLine {
///     product_id: "a".into(),
///     quantity: 2,
///     unit_price: Money::from_cents(5000),
///     discount: Money::zero(),
/// }];
/// let totals = compute_totals(&lines, None).unwrap();
/// assert_eq!(totals.total.cents(), 10000);
/// ```
pub fn compute_totals(
    lines: &[CartLine],
    discount_amount: Option<Money>,
) -> ValidationResult<SaleTotals> {
    for line in lines {
        line.line_total()?;
    }

    let subtotal = checked_sum(lines.iter().map(CartLine::gross), "subtotal")?;
    let discount = match discount_amount {
        Some(amount) => amount,
        None => checked_sum(lines.iter().map(|line| Ok(line.discount)), "discount")?,
    };
    let total = subtotal
        .checked_sub(discount)
        .ok_or_else(|| ValidationError::overflow("discount_amount"))?;

    Ok(SaleTotals {
        subtotal,
        discount,
        total: total.non_negative(),
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn line(qty: i64, price: i64, discount: i64) -> CartLine {
        CartLine {
            product_id: "p".to_string(),
            quantity: qty,
            unit_price: Money::from_cents(price),
            discount: Money::from_cents(discount),
        }
    }

    #[test]
    fn test_line_total() {
        assert_eq!(line(3, 1000, 250).line_total().unwrap().cents(), 2750);
    }

    #[test]
    fn test_line_discounts_are_summed() {
        let totals = compute_totals(&[line(2, 5000, 500), line(1, 2000, 100)], None).unwrap();
        assert_eq!(totals.subtotal.cents(), 12000);
        assert_eq!(totals.discount.cents(), 600);
        assert_eq!(totals.total.cents(), 11400);
    }

    #[test]
    fn test_explicit_discount_wins() {
        let totals = compute_totals(
            &[line(2, 5000, 500), line(1, 2000, 100)],
            Some(Money::from_cents(1000)),
        )
        .unwrap();
        assert_eq!(totals.discount.cents(), 1000);
        assert_eq!(totals.total.cents(), 11000);
    }

    #[test]
    fn test_total_never_negative() {
        let totals = compute_totals(&[line(1, 500, 0)], Some(Money::from_cents(900))).unwrap();
        assert_eq!(totals.total, Money::zero());
    }

    #[test]
    fn test_oversized_line_is_rejected() {
        let err = compute_totals(&[line(10_000_000_000, 10_000_000_000, 0)], None).unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
    }

    #[test]
    fn test_oversized_subtotal_is_rejected() {
        let half = i64::MAX / 2 + 1;
        let err = compute_totals(&[line(1, half, 0), line(1, half, 0)], None).unwrap_err();
        assert!(matches!(err, ValidationError::Overflow { .. }));
    }

    #[test]
    fn test_negative_discount_overflow_is_rejected() {
        let result = compute_totals(&[line(1, i64::MAX, 0)], Some(Money::from_cents(-1)));
        assert!(result.is_err());
    }
}
