//! # Finance Repository
//!
//! Realized money: revenue postings and bank account balances.
//!
//! ## Matching Postings to Sales
//! ```text
//! financial_transactions carries no sale id. A sale's postings are found
//! by description prefix:
//!
//!     "Sale #1 (cash)"   ← LIKE 'Sale #1 %'   matches
//!     "Sale #10 (cash)"  ← LIKE 'Sale #1 %'   does not (no space after 1)
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use paws_core::{sale_ledger_reference, BankAccount, FinancialTransaction, Money};

const TRANSACTION_COLUMNS: &str = r#"
    id, description, transaction_type, amount_cents, due_date, paid_date,
    payment_method, bank_account_id, status, created_at
"#;

/// Repository for the financial ledger.
#[derive(Debug, Clone)]
pub struct FinanceRepository {
    pool: SqlitePool,
}

impl FinanceRepository {
    /// Creates a new FinanceRepository.
    pub fn new(pool: SqlitePool) -> Self {
        FinanceRepository { pool }
    }

    /// Gets the revenue postings of a sale by its number.
    pub async fn get_sale_revenue(&self, sale_number: &str) -> DbResult<Vec<FinancialTransaction>> {
        let sql = format!(
            "SELECT {TRANSACTION_COLUMNS} FROM financial_transactions \
             WHERE transaction_type = 'revenue' AND description LIKE ?1 ORDER BY rowid"
        );

        let transactions = sqlx::query_as::<_, FinancialTransaction>(&sql)
            .bind(sale_description_pattern(sale_number))
            .fetch_all(&self.pool)
            .await?;

        Ok(transactions)
    }

    /// Gets a bank account by ID.
    pub async fn get_bank_account(&self, id: &str) -> DbResult<Option<BankAccount>> {
        let account = sqlx::query_as::<_, BankAccount>(
            "SELECT id, name, current_balance_cents, updated_at FROM bank_accounts WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    /// Opens a bank account.
    pub async fn insert_bank_account(&self, name: &str, opening_balance: Money) -> DbResult<BankAccount> {
        let account = BankAccount {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            current_balance_cents: opening_balance.cents(),
            updated_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO bank_accounts (id, name, current_balance_cents, updated_at) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&account.id)
        .bind(&account.name)
        .bind(account.current_balance_cents)
        .bind(account.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(account)
    }

    // =========================================================================
    // Connection-level operations (run inside a settlement transaction)
    // =========================================================================

    /// Appends a posting.
    pub async fn insert_transaction(
        conn: &mut SqliteConnection,
        transaction: &FinancialTransaction,
    ) -> DbResult<()> {
        debug!(
            description = %transaction.description,
            amount = transaction.amount_cents,
            "Inserting financial transaction"
        );

        sqlx::query(
            r#"
            INSERT INTO financial_transactions (
                id, description, transaction_type, amount_cents, due_date, paid_date,
                payment_method, bank_account_id, status, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&transaction.id)
        .bind(&transaction.description)
        .bind(transaction.transaction_type)
        .bind(transaction.amount_cents)
        .bind(transaction.due_date)
        .bind(transaction.paid_date)
        .bind(transaction.payment_method)
        .bind(&transaction.bank_account_id)
        .bind(transaction.status)
        .bind(transaction.created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    /// Hard-deletes the revenue postings whose description belongs to the
    /// sale numbered `sale_number`.
    ///
    /// ## Returns
    /// Number of rows deleted.
    pub async fn delete_sale_revenue(conn: &mut SqliteConnection, sale_number: &str) -> DbResult<u64> {
        let result = sqlx::query(
            "DELETE FROM financial_transactions WHERE transaction_type = 'revenue' AND description LIKE ?1",
        )
        .bind(sale_description_pattern(sale_number))
        .execute(&mut *conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Adds `amount` to a bank account balance.
    pub async fn credit_bank_account(
        conn: &mut SqliteConnection,
        account_id: &str,
        amount: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE bank_accounts SET
                current_balance_cents = current_balance_cents + ?2,
                updated_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(account_id)
        .bind(amount.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("BankAccount", account_id));
        }

        debug!(account_id, amount = amount.cents(), "Bank account credited");
        Ok(())
    }
}

/// LIKE pattern for the postings of one sale. Sale numbers are digits only,
/// so no LIKE escaping is needed.
fn sale_description_pattern(sale_number: &str) -> String {
    format!("{} %", sale_ledger_reference(sale_number))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_has_trailing_space() {
        assert_eq!(sale_description_pattern("1"), "Sale #1 %");
    }
}
