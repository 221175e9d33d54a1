//! # Customer Repository
//!
//! Customer wallet balance, loyalty points and purchase totals, each change
//! paired with an audit row.
//!
//! ```text
//! debit_wallet   → customers.wallet_balance −= x  + wallet_transactions(debit)
//! credit_wallet  → customers.wallet_balance += x  + wallet_transactions(credit)
//! earn_points    → customers.loyalty_points += n  + loyalty_transactions(earn)
//! record_purchase→ customers.total_spent += t, last_purchase_at = now
//! ```

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use paws_core::{
    Customer, LoyaltyTransaction, LoyaltyTransactionType, Money, WalletTransaction,
    WalletTransactionType,
};

const CUSTOMER_COLUMNS: &str = r#"
    id, name, wallet_balance_cents, loyalty_points, total_spent_cents,
    last_purchase_at, created_at
"#;

/// A wallet movement to record.
#[derive(Debug, Clone)]
pub struct WalletEntry<'a> {
    pub customer_id: &'a str,
    pub sale_id: Option<&'a str>,
    pub amount: Money,
    pub description: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Repository for customer database operations.
#[derive(Debug, Clone)]
pub struct CustomerRepository {
    pool: SqlitePool,
}

impl CustomerRepository {
    /// Creates a new CustomerRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CustomerRepository { pool }
    }

    /// Gets a customer by ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Customer>> {
        let mut conn = self.pool.acquire().await?;
        Self::find(&mut conn, id).await
    }

    /// Registers a customer with an opening wallet balance.
    pub async fn insert(&self, name: &str, wallet_balance: Money) -> DbResult<Customer> {
        let customer = Customer {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            wallet_balance_cents: wallet_balance.cents(),
            loyalty_points: 0,
            total_spent_cents: 0,
            last_purchase_at: None,
            created_at: Utc::now(),
        };

        sqlx::query(
            r#"
            INSERT INTO customers (
                id, name, wallet_balance_cents, loyalty_points, total_spent_cents,
                last_purchase_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(&customer.id)
        .bind(&customer.name)
        .bind(customer.wallet_balance_cents)
        .bind(customer.loyalty_points)
        .bind(customer.total_spent_cents)
        .bind(customer.last_purchase_at)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;

        Ok(customer)
    }

    /// Gets a customer's wallet history, oldest first.
    pub async fn wallet_transactions(&self, customer_id: &str) -> DbResult<Vec<WalletTransaction>> {
        let rows = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT id, customer_id, sale_id, transaction_type, amount_cents,
                   balance_after_cents, description, expires_at, created_at
            FROM wallet_transactions
            WHERE customer_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Gets a customer's loyalty history, oldest first.
    pub async fn loyalty_transactions(&self, customer_id: &str) -> DbResult<Vec<LoyaltyTransaction>> {
        let rows = sqlx::query_as::<_, LoyaltyTransaction>(
            r#"
            SELECT id, customer_id, sale_id, transaction_type, points, description, created_at
            FROM loyalty_transactions
            WHERE customer_id = ?1
            ORDER BY rowid
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // =========================================================================
    // Connection-level operations (run inside a settlement transaction)
    // =========================================================================

    /// Reads a customer on the given connection.
    pub async fn find(conn: &mut SqliteConnection, id: &str) -> DbResult<Option<Customer>> {
        let sql = format!("SELECT {CUSTOMER_COLUMNS} FROM customers WHERE id = ?1");

        let customer = sqlx::query_as::<_, Customer>(&sql)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(customer)
    }

    /// Takes `entry.amount` out of the wallet.
    ///
    /// ## Returns
    /// The balance after the debit.
    pub async fn debit_wallet(
        conn: &mut SqliteConnection,
        entry: &WalletEntry<'_>,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        Self::move_wallet(conn, entry, WalletTransactionType::Debit, -entry.amount, now).await
    }

    /// Puts `entry.amount` into the wallet.
    ///
    /// ## Returns
    /// The balance after the credit.
    pub async fn credit_wallet(
        conn: &mut SqliteConnection,
        entry: &WalletEntry<'_>,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        Self::move_wallet(conn, entry, WalletTransactionType::Credit, entry.amount, now).await
    }

    async fn move_wallet(
        conn: &mut SqliteConnection,
        entry: &WalletEntry<'_>,
        transaction_type: WalletTransactionType,
        delta: Money,
        now: DateTime<Utc>,
    ) -> DbResult<Money> {
        let balance_after: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE customers SET wallet_balance_cents = wallet_balance_cents + ?2
            WHERE id = ?1
            RETURNING wallet_balance_cents
            "#,
        )
        .bind(entry.customer_id)
        .bind(delta.cents())
        .fetch_optional(&mut *conn)
        .await?;

        let balance_after =
            balance_after.ok_or_else(|| DbError::not_found("Customer", entry.customer_id))?;

        sqlx::query(
            r#"
            INSERT INTO wallet_transactions (
                id, customer_id, sale_id, transaction_type, amount_cents,
                balance_after_cents, description, expires_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(entry.customer_id)
        .bind(entry.sale_id)
        .bind(transaction_type)
        .bind(entry.amount.cents())
        .bind(balance_after)
        .bind(&entry.description)
        .bind(entry.expires_at)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(
            customer_id = entry.customer_id,
            kind = ?transaction_type,
            amount = entry.amount.cents(),
            balance_after,
            "Wallet updated"
        );

        Ok(Money::from_cents(balance_after))
    }

    /// Grants loyalty points.
    pub async fn earn_points(
        conn: &mut SqliteConnection,
        customer_id: &str,
        sale_id: Option<&str>,
        points: i64,
        description: &str,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query("UPDATE customers SET loyalty_points = loyalty_points + ?2 WHERE id = ?1")
            .bind(customer_id)
            .bind(points)
            .execute(&mut *conn)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        sqlx::query(
            r#"
            INSERT INTO loyalty_transactions (
                id, customer_id, sale_id, transaction_type, points, description, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(customer_id)
        .bind(sale_id)
        .bind(LoyaltyTransactionType::Earn)
        .bind(points)
        .bind(description)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(customer_id, points, "Loyalty points granted");
        Ok(())
    }

    /// Adds `total` to the customer's lifetime spending and stamps the
    /// purchase time.
    pub async fn record_purchase(
        conn: &mut SqliteConnection,
        customer_id: &str,
        total: Money,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE customers SET
                total_spent_cents = total_spent_cents + ?2,
                last_purchase_at = ?3
            WHERE id = ?1
            "#,
        )
        .bind(customer_id)
        .bind(total.cents())
        .bind(now)
        .execute(&mut *conn)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Customer", customer_id));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::test_db;

    #[tokio::test]
    async fn test_wallet_round_trip_keeps_audit() {
        let db = test_db().await;
        let customer = db.customers().insert("Bia", Money::from_cents(3000)).await.unwrap();

        {
            let mut conn = db.pool().acquire().await.unwrap();
            let entry = WalletEntry {
                customer_id: &customer.id,
                sale_id: None,
                amount: Money::from_cents(1000),
                description: "test".to_string(),
                expires_at: None,
            };

            let after = CustomerRepository::debit_wallet(&mut conn, &entry, Utc::now()).await.unwrap();
            assert_eq!(after.cents(), 2000);

            let after = CustomerRepository::credit_wallet(&mut conn, &entry, Utc::now()).await.unwrap();
            assert_eq!(after.cents(), 3000);
        }

        let history = db.customers().wallet_transactions(&customer.id).await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].transaction_type, WalletTransactionType::Debit);
        assert_eq!(history[0].balance_after_cents, 2000);
        assert_eq!(history[1].transaction_type, WalletTransactionType::Credit);
    }

    #[tokio::test]
    async fn test_unknown_customer_is_not_found() {
        let db = test_db().await;
        let mut conn = db.pool().acquire().await.unwrap();

        let result = CustomerRepository::record_purchase(&mut conn, "nobody", Money::from_cents(1), Utc::now()).await;
        assert!(matches!(result, Err(DbError::NotFound { .. })));
    }
}
