//! # Receivable Planning
//!
//! Decides which receivables a sale produces for the tendered amount, and
//! whether part of it is settled on the spot.
//!
//! ## Branch Priority
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  method == store_credit ?──yes──► STORE CREDIT                          │
//! │          │                        N even rows, no fee, pending          │
//! │          no                       due = override (every row!)           │
//! │          │                              or today + 30×n                 │
//! │          ▼                                                              │
//! │  config missing or mode == immediate ?──yes──► IMMEDIATE                │
//! │          │                        1 row, fee on the full amount         │
//! │          no                       due = today + days                    │
//! │          │                        paid iff days == 0 or cash/money      │
//! │          ▼                        paid → bank credit + revenue posting  │
//! │        FLOW                                                             │
//! │        N even rows, fee per row, due = today + 30×n, pending            │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Fee precedence: explicit fee → config schedule entry for the installment
//! count → config flat fee → zero. Fees and installment counts are not
//! bounds-checked; an installment count below 1 is treated as 1.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::money::{Money, Rate};
use crate::types::{sale_ledger_reference, PaymentMethod, PaymentMethodConfig, PaymentStatus, ReceivableMode};
use crate::{DEFAULT_CREDIT_CARD_LIQUIDATION_DAYS, DEFAULT_LIQUIDATION_DAYS, INSTALLMENT_INTERVAL_DAYS};

// =============================================================================
// Input
// =============================================================================

/// Everything the planner needs, passed explicitly.
#[derive(Debug, Clone)]
pub struct ReceivableRequest<'a> {
    pub sale_number: &'a str,
    /// Tendered amount (sale total minus wallet usage).
    pub amount: Money,
    pub method: PaymentMethod,
    pub installments: i64,
    /// Caller-supplied due date. Only honoured for store credit.
    pub due_date_override: Option<NaiveDate>,
    /// Caller-supplied fee, wins over the configuration.
    pub fee_override: Option<Rate>,
    pub config: Option<&'a PaymentMethodConfig>,
    pub now: DateTime<Utc>,
}

// =============================================================================
// Output
// =============================================================================

/// Which branch produced a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanBranch {
    StoreCredit,
    Immediate,
    Flow,
}

/// A receivable row to be inserted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivableDraft {
    pub description: String,
    pub amount: Money,
    pub net_amount: Money,
    pub fee_amount: Money,
    pub fee_rate: Rate,
    pub due_date: NaiveDate,
    pub paid_date: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    pub installment_number: i64,
    pub total_installments: i64,
    pub payment_config_id: Option<String>,
}

/// Money realized at sale time by an immediate receivable born paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImmediateSettlement {
    /// Revenue posting description, `Sale #N (method)`.
    pub description: String,
    pub net_amount: Money,
    /// Account to credit, when the configuration names one.
    pub bank_account_id: Option<String>,
}

/// Complete receivable plan for one sale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivablePlan {
    pub branch: PlanBranch,
    pub receivables: Vec<ReceivableDraft>,
    pub settlement: Option<ImmediateSettlement>,
}

// =============================================================================
// Planner
// =============================================================================

/// Plans the receivables for a sale.
///
/// ## Example
/// ```rust
/// use chrono::Utc;
/// use paws_core::receivable::{plan, PlanBranch, ReceivableRequest};
/// use paws_core::{Money, PaymentMethod};
///
/// let result = plan(&ReceivableRequest {
///     sale_number: "7",
///     amount: Money::from_cents(10000),
///     method: PaymentMethod::Cash,
///     installments: 1,
///     due_date_override: None,
///     fee_override: None,
///     config: None,
///     now: Utc::now(),
/// });
///
/// assert_eq!(result.branch, PlanBranch::Immediate);
/// assert!(result.settlement.is_some());
/// ```
pub fn plan(request: &ReceivableRequest<'_>) -> ReceivablePlan {
    let installments = installment_count(request.installments);

    if request.method == PaymentMethod::StoreCredit {
        return plan_store_credit(request, installments);
    }

    match request.config {
        Some(config) if config.receivable_mode == ReceivableMode::Flow => {
            plan_flow(request, config, installments)
        }
        config => plan_immediate(request, config, installments),
    }
}

/// Effective installment count: at least 1, at most `u32::MAX`.
///
/// The sale row, its payment rows and every planned receivable carry this
/// count, so `total_installments` always matches the rows written.
pub fn installment_count(requested: i64) -> i64 {
    requested.clamp(1, i64::from(u32::MAX))
}

fn split_parts(installments: i64) -> u32 {
    u32::try_from(installments).unwrap_or(u32::MAX)
}

/// Fee for the request, by precedence.
pub fn resolve_fee_rate(
    fee_override: Option<Rate>,
    config: Option<&PaymentMethodConfig>,
    installments: i64,
) -> Rate {
    fee_override
        .or_else(|| config.map(|c| c.fee_rate_for(installments)))
        .unwrap_or_default()
}

/// Liquidation days when no configuration exists for the method.
pub fn default_liquidation_days(method: PaymentMethod) -> i64 {
    match method {
        PaymentMethod::CreditCard => DEFAULT_CREDIT_CARD_LIQUIDATION_DAYS,
        _ => DEFAULT_LIQUIDATION_DAYS,
    }
}

fn plan_store_credit(request: &ReceivableRequest<'_>, installments: i64) -> ReceivablePlan {
    let today = request.now.date_naive();
    let reference = sale_ledger_reference(request.sale_number);

    let receivables = request
        .amount
        .split_even(split_parts(installments))
        .into_iter()
        .zip(1..)
        .map(|(value, n)| ReceivableDraft {
            description: installment_description(&reference, request.method, n, installments),
            amount: value,
            net_amount: value,
            fee_amount: Money::zero(),
            fee_rate: Rate::zero(),
            // the override lands on every installment, not just the first
            due_date: request
                .due_date_override
                .unwrap_or_else(|| installment_due(today, n)),
            paid_date: None,
            status: PaymentStatus::Pending,
            installment_number: n,
            total_installments: installments,
            payment_config_id: None,
        })
        .collect();

    ReceivablePlan {
        branch: PlanBranch::StoreCredit,
        receivables,
        settlement: None,
    }
}

fn plan_immediate(
    request: &ReceivableRequest<'_>,
    config: Option<&PaymentMethodConfig>,
    installments: i64,
) -> ReceivablePlan {
    let days = config
        .map(|c| c.days_to_liquidate)
        .unwrap_or_else(|| default_liquidation_days(request.method));
    let fee_rate = resolve_fee_rate(request.fee_override, config, installments);
    let fee_amount = request.amount.percentage(fee_rate);
    let net_amount = request.amount - fee_amount;

    let description = format!(
        "{} ({})",
        sale_ledger_reference(request.sale_number),
        request.method
    );
    let born_paid = days == 0 || request.method.is_cash_equivalent();

    let receivable = ReceivableDraft {
        description: description.clone(),
        amount: request.amount,
        net_amount,
        fee_amount,
        fee_rate,
        due_date: request.now.date_naive() + Duration::days(days),
        paid_date: born_paid.then_some(request.now),
        status: if born_paid {
            PaymentStatus::Paid
        } else {
            PaymentStatus::Pending
        },
        installment_number: 1,
        total_installments: 1,
        payment_config_id: config.map(|c| c.id.clone()),
    };

    let settlement = born_paid.then(|| ImmediateSettlement {
        description,
        net_amount,
        bank_account_id: config.and_then(|c| c.bank_account_id.clone()),
    });

    ReceivablePlan {
        branch: PlanBranch::Immediate,
        receivables: vec![receivable],
        settlement,
    }
}

fn plan_flow(
    request: &ReceivableRequest<'_>,
    config: &PaymentMethodConfig,
    installments: i64,
) -> ReceivablePlan {
    let today = request.now.date_naive();
    let reference = sale_ledger_reference(request.sale_number);
    let fee_rate = resolve_fee_rate(request.fee_override, Some(config), installments);

    let receivables = request
        .amount
        .split_even(split_parts(installments))
        .into_iter()
        .zip(1..)
        .map(|(value, n)| {
            let fee_amount = value.percentage(fee_rate);
            ReceivableDraft {
                description: installment_description(&reference, request.method, n, installments),
                amount: value,
                net_amount: value - fee_amount,
                fee_amount,
                fee_rate,
                due_date: installment_due(today, n),
                paid_date: None,
                status: PaymentStatus::Pending,
                installment_number: n,
                total_installments: installments,
                payment_config_id: Some(config.id.clone()),
            }
        })
        .collect();

    ReceivablePlan {
        branch: PlanBranch::Flow,
        receivables,
        settlement: None,
    }
}

fn installment_due(today: NaiveDate, n: i64) -> NaiveDate {
    today + Duration::days(INSTALLMENT_INTERVAL_DAYS * n)
}

fn installment_description(reference: &str, method: PaymentMethod, n: i64, total: i64) -> String {
    format!("{} ({}) - {}/{}", reference, method, n, total)
}

// =============================================================================
// Unit Tests
// =============================================================================
