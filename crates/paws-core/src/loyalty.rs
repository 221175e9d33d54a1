//! # Loyalty & Cashback Accrual
//!
//! Computes what a customer earns from a sale. Only sales with a customer
//! accrue anything; the caller skips accrual otherwise.
//!
//! ```text
//! loyalty_enabled   → points   = floor(total × points_per_real)
//!                     points > 0 → loyalty_points += points,
//!                                  total_spent += total, last_purchase_at
//! cashback_enabled  → cashback = amount_to_pay × cashback%   (wallet part
//!                     never earns cashback); expires now + expire_days
//! neither enabled   → total_spent += total, last_purchase_at
//! ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::LoyaltySettings;

/// What a sale earns its customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accrual {
    /// Loyalty points to grant. Zero when the program is off.
    pub points: i64,
    /// Cashback to credit to the wallet. Zero when the program is off.
    pub cashback: Money,
    pub cashback_expires_at: Option<DateTime<Utc>>,
    /// Whether `total_spent` and `last_purchase_at` are updated.
    pub touch_total_spent: bool,
}

impl Accrual {
    /// Nothing to write.
    pub fn is_empty(&self) -> bool {
        self.points == 0 && self.cashback.is_zero() && !self.touch_total_spent
    }
}

/// Loyalty points for `total`: hundredths of a point per currency unit,
/// floored.
///
/// ## Example
/// ```rust
/// use paws_core::loyalty::points_for;
/// use paws_core::Money;
///
/// // 1.5 points per R$ 1.00 on R$ 99.99
/// assert_eq!(points_for(Money::from_cents(9999), 150), 149);
/// ```
pub fn points_for(total: Money, points_per_real_hundredths: i64) -> i64 {
    let points = total.cents() as i128 * points_per_real_hundredths as i128 / 10_000;
    points.max(0) as i64
}

/// Computes the accrual of a sale with a customer.
pub fn accrue(
    amount_to_pay: Money,
    total: Money,
    settings: &LoyaltySettings,
    now: DateTime<Utc>,
) -> Accrual {
    let points = if settings.loyalty_enabled {
        points_for(total, settings.loyalty_points_per_real_hundredths)
    } else {
        0
    };

    let cashback = if settings.cashback_enabled && amount_to_pay.is_positive() {
        amount_to_pay.percentage(settings.cashback_rate()).non_negative()
    } else {
        Money::zero()
    };

    let no_program = !settings.loyalty_enabled && !settings.cashback_enabled;

    Accrual {
        points,
        cashback,
        cashback_expires_at: cashback
            .is_positive()
            .then(|| now + Duration::days(settings.cashback_expire_days)),
        touch_total_spent: points > 0 || no_program,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 10, 9, 30, 0).unwrap()
    }

    fn settings(loyalty: bool, cashback: bool) -> LoyaltySettings {
        LoyaltySettings {
            loyalty_enabled: loyalty,
            loyalty_points_per_real_hundredths: 100,
            cashback_enabled: cashback,
            cashback_bps: 500,
            cashback_expire_days: 90,
        }
    }

    #[test]
    fn test_points_are_floored() {
        assert_eq!(points_for(Money::from_cents(10000), 100), 100);
        assert_eq!(points_for(Money::from_cents(1099), 100), 10);
        assert_eq!(points_for(Money::from_cents(50), 100), 0);
        assert_eq!(points_for(Money::from_cents(-500), 100), 0);
    }

    #[test]
    fn test_loyalty_only() {
        let result = accrue(Money::from_cents(10000), Money::from_cents(10000), &settings(true, false), now());
        assert_eq!(result.points, 100);
        assert_eq!(result.cashback, Money::zero());
        assert!(result.touch_total_spent);
        assert_eq!(result.cashback_expires_at, None);
    }

    #[test]
    fn test_loyalty_with_zero_points_leaves_totals() {
        let result = accrue(Money::from_cents(50), Money::from_cents(50), &settings(true, false), now());
        assert_eq!(result.points, 0);
        assert!(!result.touch_total_spent);
        assert!(result.is_empty());
    }

    #[test]
    fn test_cashback_on_tendered_amount_only() {
        // total 100.00, 30.00 from wallet, 70.00 tendered → 5% of 70.00
        let result = accrue(Money::from_cents(7000), Money::from_cents(10000), &settings(false, true), now());
        assert_eq!(result.cashback.cents(), 350);
        assert_eq!(result.cashback_expires_at, Some(now() + Duration::days(90)));
        assert!(!result.touch_total_spent);
    }

    #[test]
    fn test_no_cashback_when_wallet_paid_everything() {
        let result = accrue(Money::zero(), Money::from_cents(10000), &settings(false, true), now());
        assert_eq!(result.cashback, Money::zero());
        assert_eq!(result.cashback_expires_at, None);
    }

    #[test]
    fn test_no_program_still_tracks_spending() {
        let result = accrue(Money::from_cents(10000), Money::from_cents(10000), &LoyaltySettings::default(), now());
        assert_eq!(result.points, 0);
        assert_eq!(result.cashback, Money::zero());
        assert!(result.touch_total_spent);
    }

    #[test]
    fn test_both_programs() {
        let result = accrue(Money::from_cents(2000), Money::from_cents(2000), &settings(true, true), now());
        assert_eq!(result.points, 20);
        assert_eq!(result.cashback.cents(), 100);
        assert!(result.touch_total_spent);
    }
}
