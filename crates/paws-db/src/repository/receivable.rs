//! # Receivable Repository
//!
//! Accounts receivable rows produced by sales.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;

use crate::error::DbResult;
use paws_core::Receivable;

const RECEIVABLE_COLUMNS: &str = r#"
    id, description, origin_type, sale_id, customer_id, payment_method,
    payment_config_id, amount_cents, net_amount_cents, fee_amount_cents,
    fee_rate_bps, due_date, paid_date, status, installment_number,
    total_installments, created_at, updated_at
"#;

/// Repository for receivable database operations.
#[derive(Debug, Clone)]
pub struct ReceivableRepository {
    pool: SqlitePool,
}

impl ReceivableRepository {
    /// Creates a new ReceivableRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ReceivableRepository { pool }
    }

    /// Gets the receivables of a sale in installment order.
    pub async fn get_for_sale(&self, sale_id: &str) -> DbResult<Vec<Receivable>> {
        let sql = format!(
            "SELECT {RECEIVABLE_COLUMNS} FROM accounts_receivable \
             WHERE sale_id = ?1 ORDER BY installment_number, rowid"
        );

        let receivables = sqlx::query_as::<_, Receivable>(&sql)
            .bind(sale_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(receivables)
    }

    /// Inserts a receivable on the given connection.
    pub async fn insert(conn: &mut SqliteConnection, receivable: &Receivable) -> DbResult<()> {
        debug!(
            sale_id = ?receivable.sale_id,
            installment = receivable.installment_number,
            amount = receivable.amount_cents,
            status = ?receivable.status,
            "Inserting receivable"
        );

        sqlx::query(
            r#"
            INSERT INTO accounts_receivable (
                id, description, origin_type, sale_id, customer_id, payment_method,
                payment_config_id, amount_cents, net_amount_cents, fee_amount_cents,
                fee_rate_bps, due_date, paid_date, status, installment_number,
                total_installments, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17, ?18)
            "#,
        )
        .bind(&receivable.id)
        .bind(&receivable.description)
        .bind(&receivable.origin_type)
        .bind(&receivable.sale_id)
        .bind(&receivable.customer_id)
        .bind(receivable.payment_method)
        .bind(&receivable.payment_config_id)
        .bind(receivable.amount_cents)
        .bind(receivable.net_amount_cents)
        .bind(receivable.fee_amount_cents)
        .bind(receivable.fee_rate_bps)
        .bind(receivable.due_date)
        .bind(receivable.paid_date)
        .bind(receivable.status)
        .bind(receivable.installment_number)
        .bind(receivable.total_installments)
        .bind(receivable.created_at)
        .bind(receivable.updated_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Sets every receivable of a sale to cancelled, whatever its status.
    ///
    /// ## Returns
    /// Number of rows changed.
    pub async fn cancel_for_sale(
        conn: &mut SqliteConnection,
        sale_id: &str,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE accounts_receivable SET
                status = 'cancelled',
                updated_at = ?2
            WHERE sale_id = ?1
            "#,
        )
        .bind(sale_id)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }
}
