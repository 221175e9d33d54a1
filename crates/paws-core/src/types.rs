//! # Domain Types
//!
//! Core domain types used throughout Paws POS.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌────────────┐ owns ┌──────────────┐     ┌────────────────────┐        │
//! │  │    Sale    │─────►│  SaleItem    │────►│  Product (shared)  │        │
//! │  │ sale_number│      │ cost frozen  │     │  stock, avg cost   │        │
//! │  │ status     │─┐    └──────────────┘     └─────────┬──────────┘        │
//! │  └────────────┘ │    ┌──────────────┐               │ appends           │
//! │        │        └───►│ SalePayment  │     ┌─────────▼──────────┐        │
//! │        │             │ cashback/cash│     │  StockMovement     │        │
//! │        │             └──────────────┘     │  IN/OUT/ADJUSTMENT │        │
//! │        ▼                                  └────────────────────┘        │
//! │  ┌────────────┐      ┌──────────────────────┐   ┌─────────────┐         │
//! │  │ Receivable │      │ FinancialTransaction │──►│ BankAccount │         │
//! │  │ 1..N rows  │      │ only when born paid  │   └─────────────┘         │
//! │  └────────────┘      └──────────────────────┘                           │
//! │                                                                         │
//! │  Customer (wallet, points) ──► WalletTransaction / LoyaltyTransaction  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Money Columns
//! Monetary fields are `i64` cents with a `_cents` suffix; rates are basis
//! points with a `_bps` suffix. Accessors return [`Money`] / [`Rate`].

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::ValidationError;
use crate::money::{Money, Rate};

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// `(none) → Completed → Cancelled`; no other transition exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has been settled.
    Completed,
    /// Sale was reversed.
    Cancelled,
}

impl SaleStatus {
    /// Returns the stored name of the status.
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        }
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// A payment method tag.
///
/// `Cashback` is synthetic: it marks the part of a sale paid from the
/// customer's stored wallet balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    Money,
    CreditCard,
    DebitCard,
    Pix,
    BankTransfer,
    StoreCredit,
    Cashback,
}

impl PaymentMethod {
    /// All stored tags. See [`PaymentMethod::is_tender`] for input.
    pub const ALL: [PaymentMethod; 8] = [
        PaymentMethod::Cash,
        PaymentMethod::Money,
        PaymentMethod::CreditCard,
        PaymentMethod::DebitCard,
        PaymentMethod::Pix,
        PaymentMethod::BankTransfer,
        PaymentMethod::StoreCredit,
        PaymentMethod::Cashback,
    ];

    /// Returns the stored name of the method.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Money => "money",
            PaymentMethod::CreditCard => "credit_card",
            PaymentMethod::DebitCard => "debit_card",
            PaymentMethod::Pix => "pix",
            PaymentMethod::BankTransfer => "bank_transfer",
            PaymentMethod::StoreCredit => "store_credit",
            PaymentMethod::Cashback => "cashback",
        }
    }

    /// Whether a register may tender this method. `Cashback` only tags
    /// the wallet payment row of a sale.
    pub fn is_tender(&self) -> bool {
        !matches!(self, PaymentMethod::Cashback)
    }

    /// Physical cash. Always settles on the spot.
    pub fn is_cash_equivalent(&self) -> bool {
        matches!(self, PaymentMethod::Cash | PaymentMethod::Money)
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_lowercase();
        PaymentMethod::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "payment_method".to_string(),
                allowed: PaymentMethod::ALL
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect(),
            })
    }
}

// =============================================================================
// Product
// =============================================================================

/// A product with its stock level and weighted-average cost basis.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    pub id: String,
    pub sku: String,
    pub name: String,
    /// Shelf price in cents.
    pub price_cents: i64,
    /// Weighted-average cost basis in cents. Only receipts (IN) move it.
    pub cost_price_cents: i64,
    /// Unit cost of the most recent receipt.
    pub last_cost_cents: Option<i64>,
    /// May go negative: overselling is not guarded at this layer.
    pub stock_quantity: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the cost basis as Money.
    #[inline]
    pub fn cost_price(&self) -> Money {
        Money::from_cents(self.cost_price_cents)
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Kind of inventory movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    /// Receipt. Re-weights the cost basis.
    In,
    /// Issue. Cost basis unchanged.
    Out,
    /// Signed correction. Cost basis unchanged.
    Adjustment,
}

/// Immutable, append-only inventory movement.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub movement_type: MovementType,
    /// Signed: OUT rows are negative.
    pub quantity: i64,
    pub cost_price_cents: Option<i64>,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub notes: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale
// =============================================================================

/// A settled (or cancelled) sale.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Sale {
    pub id: String,
    /// Human-readable number: max purely-numeric number + 1.
    pub sale_number: String,
    pub customer_id: Option<String>,
    pub user_id: String,
    pub subtotal_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub payment_method: PaymentMethod,
    pub installments: i64,
    pub status: SaleStatus,
    /// Points granted by this sale, for audit.
    pub loyalty_points_earned: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
    #[ts(as = "Option<String>")]
    pub cancelled_at: Option<DateTime<Utc>>,
}

impl Sale {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Description prefix shared by every ledger row this sale produces.
    pub fn ledger_reference(&self) -> String {
        sale_ledger_reference(&self.sale_number)
    }
}

/// Description prefix for ledger rows of the sale numbered `sale_number`.
pub fn sale_ledger_reference(sale_number: &str) -> String {
    format!("Sale #{}", sale_number)
}

// =============================================================================
// Sale Item
// =============================================================================

/// A line item in a sale.
/// Uses the snapshot pattern: the product's cost at sale time is frozen here.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SaleItem {
    pub id: String,
    pub sale_id: String,
    pub product_id: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_cents: i64,
    /// unit_price × quantity − discount.
    pub line_total_cents: i64,
    /// Product cost basis at the moment of sale (frozen).
    pub cost_price_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sale Payment
// =============================================================================

/// A payment towards a sale.
/// A sale has two rows when the wallet only partially covers the total.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct SalePayment {
    pub id: String,
    pub sale_id: String,
    pub payment_method: PaymentMethod,
    pub amount_cents: i64,
    pub installments: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl SalePayment {
    /// Returns the payment amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Receivables & Ledger
// =============================================================================

/// Settlement status shared by receivables and financial transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Paid,
    Cancelled,
}

/// How a payment method's receivables are posted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ReceivableMode {
    /// One lump receivable, possibly born paid.
    Immediate,
    /// One pending receivable per installment.
    Flow,
}

/// Future money owed to the shop (accounts receivable).
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Receivable {
    pub id: String,
    pub description: String,
    /// Always `sale` for rows produced by the settlement engine.
    pub origin_type: String,
    pub sale_id: Option<String>,
    pub customer_id: Option<String>,
    pub payment_method: PaymentMethod,
    pub payment_config_id: Option<String>,
    /// Gross amount.
    pub amount_cents: i64,
    pub net_amount_cents: i64,
    pub fee_amount_cents: i64,
    pub fee_rate_bps: u32,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub paid_date: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    pub installment_number: i64,
    pub total_installments: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

/// Direction of a ledger posting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Revenue,
    Expense,
}

/// A realized posting in the money ledger.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct FinancialTransaction {
    pub id: String,
    pub description: String,
    pub transaction_type: TransactionType,
    pub amount_cents: i64,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub paid_date: Option<DateTime<Utc>>,
    pub payment_method: PaymentMethod,
    pub bank_account_id: Option<String>,
    pub status: PaymentStatus,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// A bank account whose balance immediate settlements credit.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct BankAccount {
    pub id: String,
    pub name: String,
    pub current_balance_cents: i64,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

// =============================================================================
// Payment Method Configuration
// =============================================================================

/// Fee override for one installment count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct InstallmentFee {
    pub installments: i64,
    pub fee_bps: u32,
}

/// Liquidation rules of one payment method (and provider).
/// Read-only input to receivable planning.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct PaymentMethodConfig {
    pub id: String,
    pub payment_method: PaymentMethod,
    pub provider_name: Option<String>,
    pub days_to_liquidate: i64,
    pub receivable_mode: ReceivableMode,
    pub flat_fee_bps: u32,
    pub max_installments: i64,
    pub bank_account_id: Option<String>,
    pub is_active: bool,
    /// Loaded separately from the per-installment fee table.
    #[cfg_attr(feature = "sqlx", sqlx(skip))]
    pub installment_fees: Vec<InstallmentFee>,
}

impl PaymentMethodConfig {
    /// Fee for a plan of `installments`: the schedule entry, else the flat fee.
    pub fn fee_rate_for(&self, installments: i64) -> Rate {
        self.installment_fees
            .iter()
            .find(|f| f.installments == installments)
            .map(|f| Rate::from_bps(f.fee_bps))
            .unwrap_or(Rate::from_bps(self.flat_fee_bps))
    }
}

// =============================================================================
// Customer, Wallet & Loyalty
// =============================================================================

/// A customer with stored wallet balance and loyalty points.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Customer {
    pub id: String,
    pub name: String,
    pub wallet_balance_cents: i64,
    pub loyalty_points: i64,
    pub total_spent_cents: i64,
    #[ts(as = "Option<String>")]
    pub last_purchase_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Customer {
    /// Returns the wallet balance as Money.
    #[inline]
    pub fn wallet_balance(&self) -> Money {
        Money::from_cents(self.wallet_balance_cents)
    }
}

/// Direction of a wallet delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    Debit,
    Credit,
}

/// Audit row for every wallet balance change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct WalletTransaction {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub transaction_type: WalletTransactionType,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub description: String,
    #[ts(as = "Option<String>")]
    pub expires_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// Direction of a loyalty points delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTransactionType {
    Earn,
    Redeem,
}

/// Audit row for every loyalty points change.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoyaltyTransaction {
    pub id: String,
    pub customer_id: String,
    pub sale_id: Option<String>,
    pub transaction_type: LoyaltyTransactionType,
    pub points: i64,
    pub description: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Settings
// =============================================================================

/// Loyalty and cashback program knobs from the company settings record.
///
/// A missing settings row means [`LoyaltySettings::default`]: no program.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct LoyaltySettings {
    pub loyalty_enabled: bool,
    /// Points per currency unit, in hundredths (100 = 1 point per R$ 1.00).
    pub loyalty_points_per_real_hundredths: i64,
    pub cashback_enabled: bool,
    pub cashback_bps: u32,
    pub cashback_expire_days: i64,
}

impl LoyaltySettings {
    /// Cashback percentage as a Rate.
    #[inline]
    pub fn cashback_rate(&self) -> Rate {
        Rate::from_bps(self.cashback_bps)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_method_parsing() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!(
            " Credit_Card ".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::CreditCard
        );
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_cash_equivalents() {
        assert!(PaymentMethod::Cash.is_cash_equivalent());
        assert!(PaymentMethod::Money.is_cash_equivalent());
        assert!(!PaymentMethod::Pix.is_cash_equivalent());
        assert!(!PaymentMethod::CreditCard.is_cash_equivalent());
    }

    #[test]
    fn test_fee_rate_prefers_schedule() {
        let config = PaymentMethodConfig {
            id: "cfg".to_string(),
            payment_method: PaymentMethod::CreditCard,
            provider_name: Some("acme".to_string()),
            days_to_liquidate: 30,
            receivable_mode: ReceivableMode::Flow,
            flat_fee_bps: 299,
            max_installments: 12,
            bank_account_id: None,
            is_active: true,
            installment_fees: vec![InstallmentFee {
                installments: 3,
                fee_bps: 450,
            }],
        };

        assert_eq!(config.fee_rate_for(3).bps(), 450);
        assert_eq!(config.fee_rate_for(1).bps(), 299);
    }

    #[test]
    fn test_ledger_reference() {
        assert_eq!(sale_ledger_reference("12"), "Sale #12");
    }

    #[test]
    fn test_settings_default_is_no_program() {
        let settings = LoyaltySettings::default();
        assert!(!settings.loyalty_enabled);
        assert!(!settings.cashback_enabled);
        assert!(settings.cashback_rate().is_zero());
    }
}
