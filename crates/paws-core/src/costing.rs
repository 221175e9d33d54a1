//! # Weighted-Average Costing
//!
//! The single formula that moves a product's stock level and cost basis.
//!
//! ## Movement Rules
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  type        new stock           new average cost                       │
//! │  ─────────   ─────────────────   ──────────────────────────────────     │
//! │  IN          old + qty           old == 0 → unit cost                   │
//! │                                  else (old×avg + qty×unit) / new        │
//! │  OUT         old − qty           unchanged                              │
//! │  ADJUSTMENT  old + qty (signed)  unchanged                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Stock may go negative (oversell is allowed). An IN without a unit cost
//! leaves the average untouched; sale cancellations post such movements.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::Money;
use crate::types::MovementType;

/// Outcome of applying one movement to a product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StockChange {
    pub old_stock: i64,
    pub new_stock: i64,
    pub old_avg_cost: Money,
    pub new_avg_cost: Money,
}

/// Applies a movement to `(old_stock, old_avg)`.
///
/// `quantity` is the magnitude for IN and OUT and the signed delta for
/// ADJUSTMENT. The weighted average is rounded to the nearest cent.
///
/// ## Example
/// ```rust
/// use paws_core::costing::apply_movement;
/// use paws_core::{Money, MovementType};
///
/// let change = apply_movement(15, Money::from_cents(600), MovementType::Out, 4, None);
/// assert_eq!(change.new_stock, 11);
/// assert_eq!(change.new_avg_cost.cents(), 600);
/// ```
pub fn apply_movement(
    old_stock: i64,
    old_avg: Money,
    movement_type: MovementType,
    quantity: i64,
    unit_cost: Option<Money>,
) -> StockChange {
    let new_stock = old_stock + signed_quantity(movement_type, quantity);

    let new_avg_cost = match (movement_type, unit_cost) {
        (MovementType::In, Some(unit)) if old_stock == 0 || new_stock == 0 => unit,
        (MovementType::In, Some(unit)) => {
            let value = old_stock as i128 * old_avg.cents() as i128
                + quantity as i128 * unit.cents() as i128;
            Money::from_cents(div_round(value, new_stock as i128) as i64)
        }
        _ => old_avg,
    };

    StockChange {
        old_stock,
        new_stock,
        old_avg_cost: old_avg,
        new_avg_cost,
    }
}

/// Quantity as stored on the movement row: OUT is negative.
#[inline]
pub fn signed_quantity(movement_type: MovementType, quantity: i64) -> i64 {
    match movement_type {
        MovementType::Out => -quantity,
        MovementType::In | MovementType::Adjustment => quantity,
    }
}

/// Integer division rounding half away from zero.
fn div_round(numerator: i128, denominator: i128) -> i128 {
    let half = denominator.abs() / 2;
    if (numerator < 0) != (denominator < 0) {
        (numerator - half * denominator.signum()) / denominator
    } else {
        (numerator + half * denominator.signum()) / denominator
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
