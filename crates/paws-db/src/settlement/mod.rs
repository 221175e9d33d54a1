//! # Sale Settlement Engine
//!
//! Creates and cancels sales. Each operation is one SQLite transaction:
//! any failure rolls back every write it made.
//!
//! ## Create
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  validate cart + payment method                   (ValidationError)     │
//! │  totals: explicit discount_amount wins over line discounts              │
//! │  ┌───────────────────────── BEGIN ──────────────────────────────────┐   │
//! │  │ next sale number (max numeric + 1)                               │   │
//! │  │ resolve operator (OperatorPolicy)                                │   │
//! │  │ INSERT sale (completed)                                          │   │
//! │  │ per line: freeze cost → INSERT item → ledger OUT                 │   │
//! │  │ split payment: wallet (cashback) part → debit wallet             │   │
//! │  │                tendered part                                     │   │
//! │  │ receivables for the tendered part (+ bank credit, revenue)       │   │
//! │  │ customer? loyalty points, cashback, total spent                  │   │
//! │  └───────────────────────── COMMIT ─────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Cancel
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  BEGIN → lock sale → NotFound / AlreadyCancelled                        │
//! │        → ledger IN per line (cost basis unchanged)                      │
//! │        → status = cancelled                                             │
//! │        → ReversalPolicy: receivables, revenue postings                  │
//! │  COMMIT                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Create does not lock product rows: two concurrent sales of the same
//! product race on its stock read-modify-write.

mod operator;
mod reversal;

pub use operator::OperatorPolicy;
pub use reversal::{LiteralReversal, ReversalPolicy};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::DbError;
use crate::pool::begin_immediate;
use crate::repository::customer::{CustomerRepository, WalletEntry};
use crate::repository::finance::FinanceRepository;
use crate::repository::inventory::{InventoryLedger, MovementRequest};
use crate::repository::product::ProductRepository;
use crate::repository::receivable::ReceivableRepository;
use crate::repository::sale::{generate_sale_id, SaleRepository};
use crate::repository::settings::SettingsRepository;
use paws_core::checkout::{compute_totals, CartLine, SaleTotals};
use paws_core::validation::{validate_cart, validate_payment_method};
use paws_core::{
    loyalty, payment, receivable, sale_ledger_reference, CoreError, Customer,
    FinancialTransaction, Money, MovementType, PaymentMethod, PaymentStatus, Rate, Receivable,
    Sale, SaleItem, SalePayment, SaleStatus, TransactionType, ValidationError,
    REFERENCE_SALE, REFERENCE_SALE_CANCELLATION,
};

// =============================================================================
// Errors
// =============================================================================

/// Outcome taxonomy of create and cancel.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed request. Nothing was written.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A referenced sale, product or customer doesn't exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The sale is already cancelled. Nothing was written.
    #[error("Sale {0} is already cancelled")]
    AlreadyCancelled(String),

    /// Storage failure. The transaction was rolled back.
    #[error("Persistence error: {0}")]
    Persistence(DbError),
}

impl From<DbError> for SettlementError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => SettlementError::NotFound { entity, id },
            other => SettlementError::Persistence(other),
        }
    }
}

impl From<CoreError> for SettlementError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(v) => SettlementError::Validation(v),
            CoreError::AlreadyCancelled(id) => SettlementError::AlreadyCancelled(id),
            CoreError::ProductNotFound(id) => SettlementError::NotFound {
                entity: "Product".to_string(),
                id,
            },
            CoreError::SaleNotFound(id) => SettlementError::NotFound {
                entity: "Sale".to_string(),
                id,
            },
            CoreError::CustomerNotFound(id) => SettlementError::NotFound {
                entity: "Customer".to_string(),
                id,
            },
        }
    }
}

/// Result type for settlement operations.
pub type SettlementResult<T> = Result<T, SettlementError>;

// =============================================================================
// Request / Response
// =============================================================================

/// A new sale, as posted by the register.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSaleRequest {
    #[serde(default)]
    pub items: Vec<CartLine>,
    pub payment_method: Option<String>,
    /// Replaces the sum of line discounts when given.
    pub discount_amount: Option<Money>,
    pub installments: Option<i64>,
    pub customer_id: Option<String>,
    /// Due date override, honoured for store credit only.
    pub due_date: Option<NaiveDate>,
    #[serde(rename = "paymentConfigId")]
    pub payment_config_id: Option<String>,
    /// Fee percentage (2.5 = 2.50%) overriding the configuration.
    #[serde(rename = "feePercent")]
    pub fee_percent: Option<f64>,
    #[serde(rename = "useWalletBalance", default)]
    pub use_wallet_balance: bool,
}

/// Summary of a created sale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedSale {
    pub id: String,
    pub sale_number: String,
    pub total: Money,
    pub payment_method: PaymentMethod,
}

/// Summary of a cancellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CancelledSale {
    pub id: String,
    pub sale_number: String,
    pub receivables_cancelled: u64,
    pub postings_deleted: u64,
}

// =============================================================================
// Engine
// =============================================================================

/// Transactional create/cancel of sales.
#[derive(Debug, Clone)]
pub struct SettlementEngine<R: ReversalPolicy = LiteralReversal> {
    pool: SqlitePool,
    operator_policy: OperatorPolicy,
    reversal: R,
}

impl<R: ReversalPolicy> SettlementEngine<R> {
    /// Creates an engine over `pool`.
    pub fn new(pool: SqlitePool, operator_policy: OperatorPolicy, reversal: R) -> Self {
        SettlementEngine {
            pool,
            operator_policy,
            reversal,
        }
    }

    /// Creates a sale with everything it settles, atomically.
    ///
    /// `operator` is the authenticated user, if any.
    pub async fn create_sale(
        &self,
        request: CreateSaleRequest,
        operator: Option<&str>,
    ) -> SettlementResult<CreatedSale> {
        validate_cart(&request.items)?;
        let method = validate_payment_method(request.payment_method.as_deref())?;
        let totals = compute_totals(&request.items, request.discount_amount)?;

        let mut tx = begin_immediate(&self.pool).await?;

        match self.create_in(&mut tx, &request, method, totals, operator).await {
            Ok(created) => {
                tx.commit().await.map_err(DbError::transaction)?;
                info!(
                    sale_id = %created.id,
                    sale_number = %created.sale_number,
                    total = created.total.cents(),
                    payment_method = %created.payment_method,
                    "Sale created"
                );
                Ok(created)
            }
            Err(err) => {
                error!(operation = "create_sale", error = %err, "Sale settlement rolled back");
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Cancels a completed sale, atomically.
    pub async fn cancel_sale(&self, sale_id: &str) -> SettlementResult<CancelledSale> {
        let mut tx = begin_immediate(&self.pool).await?;

        match self.cancel_in(&mut tx, sale_id).await {
            Ok(cancelled) => {
                tx.commit().await.map_err(DbError::transaction)?;
                info!(
                    sale_id = %cancelled.id,
                    sale_number = %cancelled.sale_number,
                    receivables_cancelled = cancelled.receivables_cancelled,
                    postings_deleted = cancelled.postings_deleted,
                    "Sale cancelled"
                );
                Ok(cancelled)
            }
            Err(err) => {
                match &err {
                    SettlementError::AlreadyCancelled(_) | SettlementError::NotFound { .. } => {
                        warn!(operation = "cancel_sale", sale_id, error = %err, "Cancellation refused")
                    }
                    _ => error!(operation = "cancel_sale", sale_id, error = %err, "Cancellation rolled back"),
                }
                if let Err(rollback) = tx.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    async fn create_in(
        &self,
        conn: &mut SqliteConnection,
        request: &CreateSaleRequest,
        method: PaymentMethod,
        totals: SaleTotals,
        operator: Option<&str>,
    ) -> SettlementResult<CreatedSale> {
        let now = Utc::now();
        let installments = receivable::installment_count(request.installments.unwrap_or(1));

        let sale_number = SaleRepository::next_sale_number(conn).await?;
        let user_id = self.operator_policy.resolve(conn, operator).await?;

        let customer = match request.customer_id.as_deref() {
            Some(id) => Some(
                CustomerRepository::find(conn, id)
                    .await?
                    .ok_or_else(|| CoreError::CustomerNotFound(id.to_string()))?,
            ),
            None => None,
        };

        let sale = Sale {
            id: generate_sale_id(),
            sale_number,
            customer_id: customer.as_ref().map(|c| c.id.clone()),
            user_id,
            subtotal_cents: totals.subtotal.cents(),
            discount_cents: totals.discount.cents(),
            total_cents: totals.total.cents(),
            payment_method: method,
            installments,
            status: SaleStatus::Completed,
            loyalty_points_earned: 0,
            created_at: now,
            updated_at: now,
            cancelled_at: None,
        };
        SaleRepository::insert_sale(conn, &sale).await?;

        debug!(sale_id = %sale.id, sale_number = %sale.sale_number, lines = request.items.len(), "Sale row inserted");

        for line in &request.items {
            Self::sell_line(conn, &sale, line, now).await?;
        }

        let split = payment::split(
            sale.total(),
            customer
                .as_ref()
                .filter(|_| request.use_wallet_balance)
                .map(Customer::wallet_balance),
        );

        if let Some(customer) = customer.as_ref().filter(|_| split.wallet_amount_used.is_positive()) {
            CustomerRepository::debit_wallet(
                conn,
                &WalletEntry {
                    customer_id: &customer.id,
                    sale_id: Some(&sale.id),
                    amount: split.wallet_amount_used,
                    description: format!("Payment of {}", sale.ledger_reference()),
                    expires_at: None,
                },
                now,
            )
            .await?;
        }

        for draft in split.drafts(method, installments) {
            SaleRepository::insert_payment(
                conn,
                &SalePayment {
                    id: Uuid::new_v4().to_string(),
                    sale_id: sale.id.clone(),
                    payment_method: draft.method,
                    amount_cents: draft.amount.cents(),
                    installments: draft.installments,
                    created_at: now,
                },
            )
            .await?;
        }

        if split.amount_to_pay.is_positive() {
            Self::post_receivables(conn, &sale, request, split.amount_to_pay, installments, now).await?;
        }

        if let Some(customer) = &customer {
            Self::accrue(conn, &sale, customer, split.amount_to_pay, now).await?;
        }

        Ok(CreatedSale {
            id: sale.id,
            sale_number: sale.sale_number,
            total: Money::from_cents(sale.total_cents),
            payment_method: method,
        })
    }

    /// Freezes the product's current cost onto the line and issues stock.
    async fn sell_line(
        conn: &mut SqliteConnection,
        sale: &Sale,
        line: &CartLine,
        now: DateTime<Utc>,
    ) -> SettlementResult<()> {
        let product = ProductRepository::find(conn, &line.product_id)
            .await?
            .ok_or_else(|| CoreError::ProductNotFound(line.product_id.clone()))?;

        SaleRepository::insert_item(
            conn,
            &SaleItem {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.id.clone(),
                product_id: product.id.clone(),
                quantity: line.quantity,
                unit_price_cents: line.unit_price.cents(),
                discount_cents: line.discount.cents(),
                line_total_cents: line.line_total()?.cents(),
                cost_price_cents: product.cost_price_cents,
                created_at: now,
            },
        )
        .await?;

        InventoryLedger::apply(
            conn,
            &MovementRequest {
                product_id: &product.id,
                movement_type: MovementType::Out,
                quantity: line.quantity,
                unit_cost: Some(product.cost_price()),
                reference_type: Some(REFERENCE_SALE),
                reference_id: Some(&sale.id),
                notes: None,
            },
        )
        .await?;

        Ok(())
    }

    async fn post_receivables(
        conn: &mut SqliteConnection,
        sale: &Sale,
        request: &CreateSaleRequest,
        amount_to_pay: Money,
        installments: i64,
        now: DateTime<Utc>,
    ) -> SettlementResult<()> {
        let method = sale.payment_method;
        let config = if method == PaymentMethod::StoreCredit {
            None
        } else {
            SettingsRepository::resolve_payment_config(conn, request.payment_config_id.as_deref(), method)
                .await?
        };

        if config.is_none() && method != PaymentMethod::StoreCredit {
            warn!(
                sale_id = %sale.id,
                payment_method = %method,
                payment_config_id = ?request.payment_config_id,
                "No payment configuration, using method defaults"
            );
        }

        let plan = receivable::plan(&receivable::ReceivableRequest {
            sale_number: &sale.sale_number,
            amount: amount_to_pay,
            method,
            installments,
            due_date_override: request.due_date,
            fee_override: request.fee_percent.map(Rate::from_percentage),
            config: config.as_ref(),
            now,
        });

        debug!(sale_id = %sale.id, branch = ?plan.branch, rows = plan.receivables.len(), "Receivables planned");

        for draft in plan.receivables {
            ReceivableRepository::insert(
                conn,
                &Receivable {
                    id: Uuid::new_v4().to_string(),
                    description: draft.description,
                    origin_type: REFERENCE_SALE.to_string(),
                    sale_id: Some(sale.id.clone()),
                    customer_id: sale.customer_id.clone(),
                    payment_method: method,
                    payment_config_id: draft.payment_config_id,
                    amount_cents: draft.amount.cents(),
                    net_amount_cents: draft.net_amount.cents(),
                    fee_amount_cents: draft.fee_amount.cents(),
                    fee_rate_bps: draft.fee_rate.bps(),
                    due_date: draft.due_date,
                    paid_date: draft.paid_date,
                    status: draft.status,
                    installment_number: draft.installment_number,
                    total_installments: draft.total_installments,
                    created_at: now,
                    updated_at: now,
                },
            )
            .await?;
        }

        if let Some(settlement) = plan.settlement {
            if let Some(account_id) = settlement.bank_account_id.as_deref() {
                FinanceRepository::credit_bank_account(conn, account_id, settlement.net_amount, now).await?;
            }

            FinanceRepository::insert_transaction(
                conn,
                &FinancialTransaction {
                    id: Uuid::new_v4().to_string(),
                    description: settlement.description,
                    transaction_type: TransactionType::Revenue,
                    amount_cents: settlement.net_amount.cents(),
                    due_date: now.date_naive(),
                    paid_date: Some(now),
                    payment_method: method,
                    bank_account_id: settlement.bank_account_id,
                    status: PaymentStatus::Paid,
                    created_at: now,
                },
            )
            .await?;
        }

        Ok(())
    }

    async fn accrue(
        conn: &mut SqliteConnection,
        sale: &Sale,
        customer: &Customer,
        amount_to_pay: Money,
        now: DateTime<Utc>,
    ) -> SettlementResult<()> {
        let settings = SettingsRepository::loyalty_settings(conn).await?;
        let accrual = loyalty::accrue(amount_to_pay, sale.total(), &settings, now);
        let reference = sale.ledger_reference();

        if accrual.points > 0 {
            CustomerRepository::earn_points(conn, &customer.id, Some(&sale.id), accrual.points, &reference, now)
                .await?;
            SaleRepository::set_loyalty_points(conn, &sale.id, accrual.points).await?;
        }

        if accrual.cashback.is_positive() {
            CustomerRepository::credit_wallet(
                conn,
                &WalletEntry {
                    customer_id: &customer.id,
                    sale_id: Some(&sale.id),
                    amount: accrual.cashback,
                    description: format!("Cashback from {}", reference),
                    expires_at: accrual.cashback_expires_at,
                },
                now,
            )
            .await?;
        }

        if accrual.touch_total_spent {
            CustomerRepository::record_purchase(conn, &customer.id, sale.total(), now).await?;
        }

        debug!(
            sale_id = %sale.id,
            customer_id = %customer.id,
            points = accrual.points,
            cashback = accrual.cashback.cents(),
            "Customer accrual applied"
        );

        Ok(())
    }

    async fn cancel_in(&self, conn: &mut SqliteConnection, sale_id: &str) -> SettlementResult<CancelledSale> {
        if !SaleRepository::lock(conn, sale_id).await? {
            return Err(CoreError::SaleNotFound(sale_id.to_string()).into());
        }

        let sale = SaleRepository::find(conn, sale_id)
            .await?
            .ok_or_else(|| CoreError::SaleNotFound(sale_id.to_string()))?;

        if sale.status == SaleStatus::Cancelled {
            return Err(CoreError::AlreadyCancelled(sale.sale_number.clone()).into());
        }

        let now = Utc::now();

        for item in SaleRepository::items(conn, &sale.id).await? {
            InventoryLedger::apply(
                conn,
                &MovementRequest {
                    product_id: &item.product_id,
                    movement_type: MovementType::In,
                    quantity: item.quantity,
                    unit_cost: None,
                    reference_type: Some(REFERENCE_SALE_CANCELLATION),
                    reference_id: Some(&sale.id),
                    notes: None,
                },
            )
            .await?;
        }

        SaleRepository::mark_cancelled(conn, &sale.id, now).await?;

        let receivables_cancelled = self.reversal.reverse_receivables(conn, &sale, now).await?;
        let postings_deleted = self.reversal.reverse_postings(conn, &sale).await?;

        debug!(
            sale_id = %sale.id,
            reference = %sale_ledger_reference(&sale.sale_number),
            "Reversal applied"
        );

        Ok(CancelledSale {
            id: sale.id,
            sale_number: sale.sale_number,
            receivables_cancelled,
            postings_deleted,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{seed_product, test_db};
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use paws_core::{LoyaltySettings, PaymentMethodConfig, ReceivableMode, WalletTransactionType};

    fn line(product_id: &str, quantity: i64, unit_price: i64) -> CartLine {
        CartLine {
            product_id: product_id.to_string(),
            quantity,
            unit_price: Money::from_cents(unit_price),
            discount: Money::zero(),
        }
    }

    fn request(items: Vec<CartLine>, method: &str) -> CreateSaleRequest {
        CreateSaleRequest {
            items,
            payment_method: Some(method.to_string()),
            ..Default::default()
        }
    }

    async fn setup() -> (Database, SettlementEngine) {
        let db = test_db().await;
        db.settings().insert_user("Owner").await.unwrap();
        let engine = db.settlement(OperatorPolicy::FallbackToFirstUser);
        (db, engine)
    }

    async fn count(db: &Database, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db.pool())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_cash_sale_without_customer() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let created = engine
            .create_sale(request(vec![line(&product.id, 2, 5000)], "cash"), None)
            .await
            .unwrap();

        assert_eq!(created.sale_number, "1");
        assert_eq!(created.total.cents(), 10000);
        assert_eq!(created.payment_method, PaymentMethod::Cash);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 8);
        assert_eq!(stored.cost_price_cents, 3000);

        let items = db.sales().get_items(&created.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].cost_price_cents, 3000);
        assert_eq!(items[0].line_total_cents, 10000);

        let movements = db.inventory().history(&product.id, 10).await.unwrap();
        assert_eq!(movements.len(), 1);
        assert_eq!(movements[0].quantity, -2);
        assert_eq!(movements[0].cost_price_cents, Some(3000));
        assert_eq!(movements[0].reference_id.as_deref(), Some(created.id.as_str()));

        let payments = db.sales().get_payments(&created.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].payment_method, PaymentMethod::Cash);
        assert_eq!(payments[0].amount_cents, 10000);

        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert_eq!(receivables.len(), 1);
        assert_eq!(receivables[0].status, PaymentStatus::Paid);
        assert!(receivables[0].paid_date.is_some());
        assert_eq!(receivables[0].net_amount_cents, 10000);

        let revenue = db.finance().get_sale_revenue("1").await.unwrap();
        assert_eq!(revenue.len(), 1);
        assert_eq!(revenue[0].amount_cents, 10000);
        assert_eq!(revenue[0].status, PaymentStatus::Paid);
    }

    #[tokio::test]
    async fn test_oversized_cart_is_rejected_before_writing() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let result = engine
            .create_sale(
                request(vec![line(&product.id, 10_000_000_000, 10_000_000_000)], "cash"),
                None,
            )
            .await;

        assert!(matches!(
            result,
            Err(SettlementError::Validation(ValidationError::Overflow { .. }))
        ));
        assert_eq!(count(&db, "sales").await, 0);
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 10);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_sales_queue_for_the_write_lock() {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(DbConfig::new(dir.path().join("paws.db")).max_connections(5))
            .await
            .unwrap();
        db.settings().insert_user("Owner").await.unwrap();
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 100).await;
        let engine = db.settlement(OperatorPolicy::FallbackToFirstUser);

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                let product_id = product.id.clone();
                tokio::spawn(async move {
                    engine
                        .create_sale(request(vec![line(&product_id, 1, 5000)], "cash"), None)
                        .await
                })
            })
            .collect();

        let mut numbers = Vec::new();
        for task in tasks {
            let created = task.await.unwrap().unwrap();
            numbers.push(created.sale_number.parse::<i64>().unwrap());
        }
        numbers.sort_unstable();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 92);
        assert_eq!(count(&db, "sales").await, 8);
        assert_eq!(count(&db, "financial_transactions").await, 8);

        db.close().await;
    }

    #[tokio::test]
    async fn test_wallet_covers_part_of_sale() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;
        let customer = db.customers().insert("Bia", Money::from_cents(3000)).await.unwrap();

        let mut req = request(vec![line(&product.id, 2, 5000)], "cash");
        req.customer_id = Some(customer.id.clone());
        req.use_wallet_balance = true;

        let created = engine.create_sale(req, None).await.unwrap();

        let payments = db.sales().get_payments(&created.id).await.unwrap();
        let summary: Vec<_> = payments.iter().map(|p| (p.payment_method, p.amount_cents)).collect();
        assert_eq!(
            summary,
            vec![(PaymentMethod::Cashback, 3000), (PaymentMethod::Cash, 7000)]
        );
        assert_eq!(db.sales().get_total_paid(&created.id).await.unwrap(), 10000);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.wallet_balance_cents, 0);
        // no program configured: spending is still tracked
        assert_eq!(customer.total_spent_cents, 10000);
        assert!(customer.last_purchase_at.is_some());

        let wallet = db.customers().wallet_transactions(&customer.id).await.unwrap();
        assert_eq!(wallet.len(), 1);
        assert_eq!(wallet[0].transaction_type, WalletTransactionType::Debit);
        assert_eq!(wallet[0].amount_cents, 3000);

        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert_eq!(receivables.len(), 1);
        assert_eq!(receivables[0].amount_cents, 7000);
    }

    #[tokio::test]
    async fn test_wallet_covering_everything_creates_no_receivable() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "TOY", 2000, 800, 5).await;
        let customer = db.customers().insert("Caio", Money::from_cents(9000)).await.unwrap();

        let mut req = request(vec![line(&product.id, 1, 2000)], "pix");
        req.customer_id = Some(customer.id.clone());
        req.use_wallet_balance = true;

        let created = engine.create_sale(req, None).await.unwrap();

        let payments = db.sales().get_payments(&created.id).await.unwrap();
        assert_eq!(payments.len(), 1);
        assert_eq!(payments[0].payment_method, PaymentMethod::Cashback);
        assert!(db.receivables().get_for_sale(&created.id).await.unwrap().is_empty());

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.wallet_balance_cents, 7000);
    }

    #[tokio::test]
    async fn test_cancel_restores_stock_and_reverses_money() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let created = engine
            .create_sale(request(vec![line(&product.id, 2, 5000)], "cash"), None)
            .await
            .unwrap();

        let cancelled = engine.cancel_sale(&created.id).await.unwrap();
        assert_eq!(cancelled.receivables_cancelled, 1);
        assert_eq!(cancelled.postings_deleted, 1);

        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 10);
        assert_eq!(stored.cost_price_cents, 3000);

        let sale = db.sales().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(sale.status, SaleStatus::Cancelled);
        assert!(sale.cancelled_at.is_some());

        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert!(receivables.iter().all(|r| r.status == PaymentStatus::Cancelled));
        assert!(db.finance().get_sale_revenue("1").await.unwrap().is_empty());

        let history = db.inventory().history(&product.id, 10).await.unwrap();
        assert_eq!(history[0].reference_type.as_deref(), Some(REFERENCE_SALE_CANCELLATION));
        assert_eq!(history[0].quantity, 2);
        assert_eq!(history[0].cost_price_cents, None);
    }

    #[tokio::test]
    async fn test_cancel_twice_writes_nothing() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let created = engine
            .create_sale(request(vec![line(&product.id, 1, 5000)], "cash"), None)
            .await
            .unwrap();
        engine.cancel_sale(&created.id).await.unwrap();

        let movements_before = count(&db, "stock_movements").await;
        let updated_before = db.sales().get_by_id(&created.id).await.unwrap().unwrap().updated_at;

        let result = engine.cancel_sale(&created.id).await;
        assert!(matches!(result, Err(SettlementError::AlreadyCancelled(_))));

        assert_eq!(count(&db, "stock_movements").await, movements_before);
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 10);
        let sale = db.sales().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(sale.updated_at, updated_before);
    }

    #[tokio::test]
    async fn test_cancel_unknown_sale() {
        let (_db, engine) = setup().await;
        let result = engine.cancel_sale("missing").await;
        assert!(matches!(result, Err(SettlementError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_cancel_only_deletes_own_postings() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "BONE", 100, 50, 100).await;

        let mut first_id = String::new();
        for n in 1..=10 {
            let created = engine
                .create_sale(request(vec![line(&product.id, 1, 100)], "cash"), None)
                .await
                .unwrap();
            assert_eq!(created.sale_number, n.to_string());
            if n == 1 {
                first_id = created.id;
            }
        }

        engine.cancel_sale(&first_id).await.unwrap();

        assert!(db.finance().get_sale_revenue("1").await.unwrap().is_empty());
        assert_eq!(db.finance().get_sale_revenue("10").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_flow_mode_installments() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "CAGE", 10000, 6000, 5).await;
        db.settings()
            .insert_payment_config(&PaymentMethodConfig {
                id: "visa".to_string(),
                payment_method: PaymentMethod::CreditCard,
                provider_name: Some("Acquirer".to_string()),
                days_to_liquidate: 30,
                receivable_mode: ReceivableMode::Flow,
                flat_fee_bps: 250,
                max_installments: 12,
                bank_account_id: None,
                is_active: true,
                installment_fees: Vec::new(),
            })
            .await
            .unwrap();

        let mut req = request(vec![line(&product.id, 3, 10000)], "credit_card");
        req.installments = Some(3);

        let created = engine.create_sale(req, None).await.unwrap();
        let today = Utc::now().date_naive();

        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert_eq!(receivables.len(), 3);
        for (i, r) in receivables.iter().enumerate() {
            let n = i as i64 + 1;
            assert_eq!(r.amount_cents, 10000);
            assert_eq!(r.fee_amount_cents, 250);
            assert_eq!(r.net_amount_cents, 9750);
            assert_eq!(r.due_date, today + Duration::days(30 * n));
            assert_eq!(r.status, PaymentStatus::Pending);
            assert_eq!(r.payment_config_id.as_deref(), Some("visa"));
        }

        assert!(db.finance().get_sale_revenue(&created.sale_number).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_zero_days_credits_bank() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "SHAMPOO", 4000, 1500, 5).await;
        let account = db.finance().insert_bank_account("Main", Money::zero()).await.unwrap();
        db.settings()
            .insert_payment_config(&PaymentMethodConfig {
                id: "pix".to_string(),
                payment_method: PaymentMethod::Pix,
                provider_name: None,
                days_to_liquidate: 0,
                receivable_mode: ReceivableMode::Immediate,
                flat_fee_bps: 100,
                max_installments: 1,
                bank_account_id: Some(account.id.clone()),
                is_active: true,
                installment_fees: Vec::new(),
            })
            .await
            .unwrap();

        let mut req = request(vec![line(&product.id, 1, 4000)], "pix");
        req.payment_config_id = Some("pix".to_string());

        let created = engine.create_sale(req, None).await.unwrap();

        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert_eq!(receivables[0].status, PaymentStatus::Paid);
        assert_eq!(receivables[0].fee_amount_cents, 40);

        let account = db.finance().get_bank_account(&account.id).await.unwrap().unwrap();
        assert_eq!(account.current_balance_cents, 3960);

        let revenue = db.finance().get_sale_revenue(&created.sale_number).await.unwrap();
        assert_eq!(revenue[0].amount_cents, 3960);
        assert_eq!(revenue[0].bank_account_id.as_deref(), Some(account.id.as_str()));
    }

    #[tokio::test]
    async fn test_explicit_fee_percent_wins() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "BED", 20000, 9000, 5).await;

        let mut req = request(vec![line(&product.id, 1, 20000)], "debit_card");
        req.fee_percent = Some(1.5);

        let created = engine.create_sale(req, None).await.unwrap();
        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();
        assert_eq!(receivables[0].fee_rate_bps, 150);
        assert_eq!(receivables[0].fee_amount_cents, 300);
        // no config: one day to liquidate, pending
        assert_eq!(receivables[0].status, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn test_store_credit_uses_override_for_every_installment() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "AQUARIUM", 30000, 12000, 2).await;
        let customer = db.customers().insert("Duda", Money::zero()).await.unwrap();
        let due = NaiveDate::from_ymd_opt(2030, 1, 10).unwrap();

        let mut req = request(vec![line(&product.id, 1, 30000)], "store_credit");
        req.installments = Some(3);
        req.customer_id = Some(customer.id.clone());
        req.due_date = Some(due);

        let created = engine.create_sale(req, None).await.unwrap();
        let receivables = db.receivables().get_for_sale(&created.id).await.unwrap();

        assert_eq!(receivables.len(), 3);
        assert!(receivables.iter().all(|r| r.due_date == due));
        assert!(receivables.iter().all(|r| r.status == PaymentStatus::Pending));
        assert!(receivables.iter().all(|r| r.customer_id.as_deref() == Some(customer.id.as_str())));
    }

    #[tokio::test]
    async fn test_loyalty_and_cashback_accrual() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-B", 10000, 5000, 10).await;
        let customer = db.customers().insert("Edu", Money::from_cents(2000)).await.unwrap();
        db.settings()
            .save_loyalty_settings(&LoyaltySettings {
                loyalty_enabled: true,
                loyalty_points_per_real_hundredths: 100,
                cashback_enabled: true,
                cashback_bps: 500,
                cashback_expire_days: 60,
            })
            .await
            .unwrap();

        let mut req = request(vec![line(&product.id, 1, 10000)], "cash");
        req.customer_id = Some(customer.id.clone());
        req.use_wallet_balance = true;

        let created = engine.create_sale(req, None).await.unwrap();

        let sale = db.sales().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(sale.loyalty_points_earned, 100);

        let customer = db.customers().get_by_id(&customer.id).await.unwrap().unwrap();
        assert_eq!(customer.loyalty_points, 100);
        assert_eq!(customer.total_spent_cents, 10000);
        // 2000 spent from wallet, 5% of the 8000 tendered back as cashback
        assert_eq!(customer.wallet_balance_cents, 400);

        let wallet = db.customers().wallet_transactions(&customer.id).await.unwrap();
        assert_eq!(wallet.len(), 2);
        assert_eq!(wallet[1].transaction_type, WalletTransactionType::Credit);
        assert_eq!(wallet[1].amount_cents, 400);
        assert!(wallet[1].expires_at.is_some());

        let loyalty = db.customers().loyalty_transactions(&customer.id).await.unwrap();
        assert_eq!(loyalty.len(), 1);
        assert_eq!(loyalty[0].points, 100);
    }

    #[tokio::test]
    async fn test_validation_errors_write_nothing() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let result = engine.create_sale(request(vec![], "cash"), None).await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));

        let mut req = request(vec![line(&product.id, 1, 5000)], "cash");
        req.payment_method = None;
        let result = engine.create_sale(req, None).await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));

        assert_eq!(count(&db, "sales").await, 0);
    }

    #[tokio::test]
    async fn test_no_system_user_is_validation_error() {
        let db = test_db().await;
        let engine = db.settlement(OperatorPolicy::FallbackToFirstUser);
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let result = engine
            .create_sale(request(vec![line(&product.id, 1, 5000)], "cash"), None)
            .await;
        assert!(matches!(result, Err(SettlementError::Validation(_))));
    }

    #[tokio::test]
    async fn test_failure_rolls_back_everything() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let result = engine
            .create_sale(
                request(vec![line(&product.id, 2, 5000), line("missing", 1, 100)], "cash"),
                None,
            )
            .await;
        assert!(matches!(result, Err(SettlementError::NotFound { .. })));

        assert_eq!(count(&db, "sales").await, 0);
        assert_eq!(count(&db, "sale_items").await, 0);
        assert_eq!(count(&db, "stock_movements").await, 0);
        let stored = db.products().get_by_id(&product.id).await.unwrap().unwrap();
        assert_eq!(stored.stock_quantity, 10);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let mut req = request(vec![line(&product.id, 1, 5000)], "cash");
        req.customer_id = Some("ghost".to_string());

        let result = engine.create_sale(req, None).await;
        assert!(matches!(result, Err(SettlementError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_explicit_discount_overrides_lines() {
        let (db, engine) = setup().await;
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let mut discounted = line(&product.id, 2, 5000);
        discounted.discount = Money::from_cents(500);
        let mut req = request(vec![discounted], "cash");
        req.discount_amount = Some(Money::from_cents(1000));

        let created = engine.create_sale(req, None).await.unwrap();
        assert_eq!(created.total.cents(), 9000);

        let sale = db.sales().get_by_id(&created.id).await.unwrap().unwrap();
        assert_eq!(sale.subtotal_cents, 10000);
        assert_eq!(sale.discount_cents, 1000);
    }

    #[tokio::test]
    async fn test_custom_reversal_policy_is_used() {
        struct KeepPostings;

        impl ReversalPolicy for KeepPostings {
            async fn reverse_receivables(
                &self,
                conn: &mut SqliteConnection,
                sale: &Sale,
                now: DateTime<Utc>,
            ) -> crate::DbResult<u64> {
                ReceivableRepository::cancel_for_sale(conn, &sale.id, now).await
            }

            async fn reverse_postings(&self, _conn: &mut SqliteConnection, _sale: &Sale) -> crate::DbResult<u64> {
                Ok(0)
            }
        }

        let (db, _) = setup().await;
        let engine = SettlementEngine::new(db.pool().clone(), OperatorPolicy::FallbackToFirstUser, KeepPostings);
        let product = seed_product(&db, "FOOD-A", 5000, 3000, 10).await;

        let created = engine
            .create_sale(request(vec![line(&product.id, 1, 5000)], "money"), None)
            .await
            .unwrap();
        let cancelled = engine.cancel_sale(&created.id).await.unwrap();

        assert_eq!(cancelled.postings_deleted, 0);
        assert_eq!(db.finance().get_sale_revenue(&created.sale_number).await.unwrap().len(), 1);
    }
}
