//! # Sale Repository
//!
//! Database operations for sales, sale items and sale payments.
//!
//! ## Sale Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Sale Lifecycle                                    │
//! │                                                                         │
//! │  1. CREATE (one transaction)                                           │
//! │     └── next_sale_number() → "42"                                      │
//! │     └── insert_sale()      → Sale { status: Completed }                │
//! │     └── insert_item() × N  (cost snapshot frozen on each line)         │
//! │     └── insert_payment() × 1..2                                        │
//! │                                                                         │
//! │  2. CANCEL (one transaction)                                           │
//! │     └── lock()             → take the write lock first                 │
//! │     └── find()             → status check                              │
//! │     └── mark_cancelled()   → Sale { status: Cancelled }                │
//! │                                                                         │
//! │  Sales are never deleted.                                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::repository::receivable::ReceivableRepository;
use paws_core::{Receivable, Sale, SaleItem, SalePayment};

const SALE_COLUMNS: &str = r#"
    id, sale_number, customer_id, user_id, subtotal_cents, discount_cents,
    total_cents, payment_method, installments, status, loyalty_points_earned,
    created_at, updated_at, cancelled_at
"#;

/// A sale with its lines, payments and receivables.
#[derive(Debug, Clone, Serialize)]
pub struct SaleDetail {
    #[serde(flatten)]
    pub sale: Sale,
    pub items: Vec<SaleItem>,
    pub payments: Vec<SalePayment>,
    pub receivables: Vec<Receivable>,
}

/// Repository for sale database operations.
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Gets a sale by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Sale>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Lists the most recent sales, newest first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Sale>> {
        let sql = format!(
            "SELECT {SALE_COLUMNS} FROM sales ORDER BY created_at DESC, rowid DESC LIMIT ?1"
        );

        let sales = sqlx::query_as::<_, Sale>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(sales)
    }

    /// Gets all items for a sale.
    pub async fn get_items(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let mut conn = self.pool.acquire().await?;
        Self::items(&mut conn, sale_id).await
    }

    /// Gets all payments for a sale.
    pub async fn get_payments(&self, sale_id: &str) -> DbResult<Vec<SalePayment>> {
        let payments = sqlx::query_as::<_, SalePayment>(
            r#"
            SELECT id, sale_id, payment_method, amount_cents, installments, created_at
            FROM sale_payments
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(payments)
    }

    /// Gets total amount paid for a sale.
    pub async fn get_total_paid(&self, sale_id: &str) -> DbResult<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(amount_cents) FROM sale_payments WHERE sale_id = ?1")
                .bind(sale_id)
                .fetch_one(&self.pool)
                .await?;

        Ok(total.unwrap_or(0))
    }

    /// Loads a sale with everything it settled.
    pub async fn get_detail(&self, id: &str) -> DbResult<Option<SaleDetail>> {
        let Some(sale) = self.get_by_id(id).await? else {
            return Ok(None);
        };

        let items = self.get_items(id).await?;
        let payments = self.get_payments(id).await?;
        let receivables = ReceivableRepository::new(self.pool.clone())
            .get_for_sale(id)
            .await?;

        Ok(Some(SaleDetail {
            sale,
            items,
            payments,
            receivables,
        }))
    }

    // =========================================================================
    // Connection-level operations (run inside a settlement transaction)
    // =========================================================================

    /// Reads a sale on the given connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Sale>> {
        let sql = format!("SELECT {SALE_COLUMNS} FROM sales WHERE id = ?1");

        let sale = sqlx::query_as::<_, Sale>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(sale)
    }

    /// Reads the items of a sale on the given connection.
    pub async fn items(conn: &mut SqliteConnection, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT id, sale_id, product_id, quantity, unit_price_cents,
                   discount_cents, line_total_cents, cost_price_cents, created_at
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(sale_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(items)
    }

    /// Allocates the next sale number: the largest purely numeric number
    /// plus one. Numbers with any non-digit are ignored.
    pub async fn next_sale_number(conn: &mut SqliteConnection) -> DbResult<String> {
        let max: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT MAX(CAST(sale_number AS INTEGER))
            FROM sales
            WHERE sale_number <> '' AND sale_number NOT GLOB '*[^0-9]*'
            "#,
        )
        .fetch_one(&mut *conn)
        .await?;

        Ok((max.unwrap_or(0) + 1).to_string())
    }

    /// Takes the write lock on a sale row.
    ///
    /// SQLite has no `SELECT ... FOR UPDATE`; a no-op update acquires the
    /// database write lock for the rest of the transaction, so a concurrent
    /// cancellation waits here until this one commits.
    ///
    /// ## Returns
    /// `false` when the sale doesn't exist.
    pub async fn lock(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let result = sqlx::query("UPDATE sales SET updated_at = updated_at WHERE id = ?1")
            .bind(id)
            .execute(&mut *conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Inserts a sale.
    pub async fn insert_sale(conn: &mut SqliteConnection, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, sale_number = %sale.sale_number, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, sale_number, customer_id, user_id,
                subtotal_cents, discount_cents, total_cents,
                payment_method, installments, status, loyalty_points_earned,
                created_at, updated_at, cancelled_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.sale_number)
        .bind(&sale.customer_id)
        .bind(&sale.user_id)
        .bind(sale.subtotal_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.payment_method)
        .bind(sale.installments)
        .bind(sale.status)
        .bind(sale.loyalty_points_earned)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.cancelled_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Adds an item to a sale.
    ///
    /// ## Snapshot Pattern
    /// The product's cost basis is copied onto the item and never
    /// recomputed, so margin reports keep the cost of the day of sale.
    pub async fn insert_item(conn: &mut SqliteConnection, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, product_id = %item.product_id, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, quantity, unit_price_cents,
                discount_cents, line_total_cents, cost_price_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(item.quantity)
        .bind(item.unit_price_cents)
        .bind(item.discount_cents)
        .bind(item.line_total_cents)
        .bind(item.cost_price_cents)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Records a payment for a sale.
    pub async fn insert_payment(conn: &mut SqliteConnection, payment: &SalePayment) -> DbResult<()> {
        debug!(
            sale_id = %payment.sale_id,
            method = %payment.payment_method,
            amount = payment.amount_cents,
            "Recording payment"
        );

        sqlx::query(
            r#"
            INSERT INTO sale_payments (
                id, sale_id, payment_method, amount_cents, installments, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&payment.id)
        .bind(&payment.sale_id)
        .bind(payment.payment_method)
        .bind(payment.amount_cents)
        .bind(payment.installments)
        .bind(payment.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Records the loyalty points granted by a sale.
    pub async fn set_loyalty_points(
        conn: &mut SqliteConnection,
        sale_id: &str,
        points: i64,
    ) -> DbResult<()> {
        sqlx::query("UPDATE sales SET loyalty_points_earned = ?2 WHERE id = ?1")
            .bind(sale_id)
            .bind(points)
            .execute(&mut *conn)
            .await?;

        Ok(())
    }

    /// Transitions a completed sale to cancelled.
    pub async fn mark_cancelled(
        conn: &mut SqliteConnection,
        sale_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE sales SET
                status = 'cancelled',
                cancelled_at = ?2,
                updated_at = ?2
            WHERE id = ?1 AND status = 'completed'
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Sale (completed)", sale_id));
        }

        Ok(())
    }
}

/// Generates a new sale ID.
pub fn generate_sale_id() -> String {
    Uuid::new_v4().to_string()
}
