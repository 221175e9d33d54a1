//! # Payment Splitter
//!
//! Decides how much of a sale total the customer's wallet covers and how
//! much is tendered with the chosen payment method.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sale total 100.00, wallet 30.00, useWalletBalance                      │
//! │                                                                         │
//! │     wallet_amount_used = min(30.00, 100.00) = 30.00                     │
//! │     amount_to_pay      = 100.00 − 30.00     = 70.00                     │
//! │                                                                         │
//! │     SalePayment(cashback, 30.00)   SalePayment(cash, 70.00)             │
//! │                                                                         │
//! │  Σ payments == sale total, always                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};

use crate::money::Money;
use crate::types::PaymentMethod;

/// Result of splitting a sale total.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSplit {
    /// Part of the total taken from the wallet.
    pub wallet_amount_used: Money,
    /// Part of the total paid with the tendered method.
    pub amount_to_pay: Money,
}

/// A payment row to be recorded against the sale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub method: PaymentMethod,
    pub amount: Money,
    pub installments: i64,
}

/// Splits `total` between the wallet and the tendered method.
///
/// `wallet_balance` is `None` unless the sale has a customer and the
/// cashier asked to use the balance. A negative balance is treated as zero.
pub fn split(total: Money, wallet_balance: Option<Money>) -> PaymentSplit {
    let wallet_amount_used = wallet_balance
        .map(|balance| balance.non_negative().min(total.non_negative()))
        .unwrap_or_default();

    PaymentSplit {
        wallet_amount_used,
        amount_to_pay: total - wallet_amount_used,
    }
}

impl PaymentSplit {
    /// Payment rows for this split: the wallet part first, then the
    /// tendered part. Zero parts produce no row.
    pub fn drafts(&self, method: PaymentMethod, installments: i64) -> Vec<PaymentDraft> {
        let mut drafts = Vec::with_capacity(2);

        if self.wallet_amount_used.is_positive() {
            drafts.push(PaymentDraft {
                method: PaymentMethod::Cashback,
                amount: self.wallet_amount_used,
                installments: 1,
            });
        }

        if self.amount_to_pay.is_positive() {
            drafts.push(PaymentDraft {
                method,
                amount: self.amount_to_pay,
                installments,
            });
        }

        drafts
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_wallet() {
        let result = split(Money::from_cents(10000), None);
        assert_eq!(result.wallet_amount_used, Money::zero());
        assert_eq!(result.amount_to_pay.cents(), 10000);

        let drafts = result.drafts(PaymentMethod::Cash, 1);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].method, PaymentMethod::Cash);
    }

    #[test]
    fn test_partial_wallet() {
        let result = split(Money::from_cents(10000), Some(Money::from_cents(3000)));
        assert_eq!(result.wallet_amount_used.cents(), 3000);
        assert_eq!(result.amount_to_pay.cents(), 7000);

        let drafts = result.drafts(PaymentMethod::Cash, 1);
        let methods: Vec<_> = drafts.iter().map(|d| d.method).collect();
        assert_eq!(methods, vec![PaymentMethod::Cashback, PaymentMethod::Cash]);
        assert_eq!(drafts.iter().map(|d| d.amount).sum::<Money>().cents(), 10000);
    }

    #[test]
    fn test_wallet_covers_everything() {
        let result = split(Money::from_cents(5000), Some(Money::from_cents(8000)));
        assert_eq!(result.wallet_amount_used.cents(), 5000);
        assert_eq!(result.amount_to_pay, Money::zero());

        let drafts = result.drafts(PaymentMethod::Pix, 1);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].method, PaymentMethod::Cashback);
    }

    #[test]
    fn test_negative_balance_is_ignored() {
        let result = split(Money::from_cents(5000), Some(Money::from_cents(-200)));
        assert_eq!(result.wallet_amount_used, Money::zero());
        assert_eq!(result.amount_to_pay.cents(), 5000);
    }

    #[test]
    fn test_installments_kept_on_tendered_part() {
        let result = split(Money::from_cents(9000), Some(Money::from_cents(1000)));
        let drafts = result.drafts(PaymentMethod::CreditCard, 3);
        assert_eq!(drafts[0].installments, 1);
        assert_eq!(drafts[1].installments, 3);
    }
}
