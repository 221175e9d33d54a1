//! # Settings Repository
//!
//! Read-only inputs of the settlement engine: the company settings record,
//! payment method configurations and the operator list.
//!
//! ## Payment Config Resolution
//! ```text
//! paymentConfigId given?  ──yes──► config by id (any status)
//!        │ no
//!        ▼
//! first active config for the payment method (oldest first)
//!        │ none
//!        ▼
//! no config → receivable planning uses its method defaults
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_immediate;
use paws_core::{InstallmentFee, LoyaltySettings, PaymentMethod, PaymentMethodConfig};

const CONFIG_COLUMNS: &str = r#"
    id, payment_method, provider_name, days_to_liquidate, receivable_mode,
    flat_fee_bps, max_installments, bank_account_id, is_active
"#;

/// Repository for settings and configuration.
#[derive(Debug, Clone)]
pub struct SettingsRepository {
    pool: SqlitePool,
}

impl SettingsRepository {
    /// Creates a new SettingsRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SettingsRepository { pool }
    }

    /// Saves the loyalty and cashback settings (single row).
    pub async fn save_loyalty_settings(&self, settings: &LoyaltySettings) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO settings (
                id, loyalty_enabled, loyalty_points_per_real_hundredths,
                cashback_enabled, cashback_bps, cashback_expire_days
            ) VALUES (1, ?1, ?2, ?3, ?4, ?5)
            ON CONFLICT (id) DO UPDATE SET
                loyalty_enabled = excluded.loyalty_enabled,
                loyalty_points_per_real_hundredths = excluded.loyalty_points_per_real_hundredths,
                cashback_enabled = excluded.cashback_enabled,
                cashback_bps = excluded.cashback_bps,
                cashback_expire_days = excluded.cashback_expire_days
            "#,
        )
        .bind(settings.loyalty_enabled)
        .bind(settings.loyalty_points_per_real_hundredths)
        .bind(settings.cashback_enabled)
        .bind(settings.cashback_bps)
        .bind(settings.cashback_expire_days)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Stores a payment method configuration and its fee schedule.
    pub async fn insert_payment_config(&self, config: &PaymentMethodConfig) -> DbResult<()> {
        let mut tx = begin_immediate(&self.pool).await?;

        sqlx::query(
            r#"
            INSERT INTO payment_method_configs (
                id, payment_method, provider_name, days_to_liquidate, receivable_mode,
                flat_fee_bps, max_installments, bank_account_id, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&config.id)
        .bind(config.payment_method)
        .bind(&config.provider_name)
        .bind(config.days_to_liquidate)
        .bind(config.receivable_mode)
        .bind(config.flat_fee_bps)
        .bind(config.max_installments)
        .bind(&config.bank_account_id)
        .bind(config.is_active)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        for fee in &config.installment_fees {
            sqlx::query(
                "INSERT INTO payment_method_installment_fees (config_id, installments, fee_bps) VALUES (?1, ?2, ?3)",
            )
            .bind(&config.id)
            .bind(fee.installments)
            .bind(fee.fee_bps)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await.map_err(DbError::transaction)?;
        Ok(())
    }

    /// Registers an operator.
    ///
    /// ## Returns
    /// The new user's ID.
    pub async fn insert_user(&self, name: &str) -> DbResult<String> {
        let id = Uuid::new_v4().to_string();

        sqlx::query("INSERT INTO users (id, name, created_at) VALUES (?1, ?2, ?3)")
            .bind(&id)
            .bind(name)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        Ok(id)
    }

    // =========================================================================
    // Connection-level operations (run inside a settlement transaction)
    // =========================================================================

    /// Reads the loyalty and cashback settings.
    ///
    /// A missing row means no program is configured.
    pub async fn loyalty_settings(conn: &mut SqliteConnection) -> DbResult<LoyaltySettings> {
        let settings = sqlx::query_as::<_, LoyaltySettings>(
            r#"
            SELECT loyalty_enabled, loyalty_points_per_real_hundredths,
                   cashback_enabled, cashback_bps, cashback_expire_days
            FROM settings
            WHERE id = 1
            "#,
        )
        .fetch_optional(&mut *conn)
        .await?;

        Ok(settings.unwrap_or_default())
    }

    /// Resolves the payment configuration for a sale.
    ///
    /// An explicit ID wins; otherwise the first active configuration for
    /// the method is used. Returns `None` when nothing matches.
    pub async fn resolve_payment_config(
        conn: &mut SqliteConnection,
        config_id: Option<&str>,
        method: PaymentMethod,
    ) -> DbResult<Option<PaymentMethodConfig>> {
        let config = match config_id {
            Some(id) => {
                let sql = format!("SELECT {CONFIG_COLUMNS} FROM payment_method_configs WHERE id = ?1");
                sqlx::query_as::<_, PaymentMethodConfig>(&sql)
                    .bind(id)
                    .fetch_optional(&mut *conn)
                    .await?
            }
            None => {
                let sql = format!(
                    "SELECT {CONFIG_COLUMNS} FROM payment_method_configs \
                     WHERE payment_method = ?1 AND is_active = 1 \
                     ORDER BY created_at, rowid LIMIT 1"
                );
                sqlx::query_as::<_, PaymentMethodConfig>(&sql)
                    .bind(method)
                    .fetch_optional(&mut *conn)
                    .await?
            }
        };

        let Some(mut config) = config else {
            debug!(?config_id, method = %method, "No payment configuration found");
            return Ok(None);
        };

        config.installment_fees = sqlx::query_as::<_, InstallmentFee>(
            r#"
            SELECT installments, fee_bps
            FROM payment_method_installment_fees
            WHERE config_id = ?1
            ORDER BY installments
            "#,
        )
        .bind(&config.id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(Some(config))
    }

    /// Returns the oldest registered operator.
    pub async fn first_user_id(conn: &mut SqliteConnection) -> DbResult<Option<String>> {
        let id: Option<String> =
            sqlx::query_scalar("SELECT id FROM users ORDER BY created_at, rowid LIMIT 1")
                .fetch_optional(&mut *conn)
                .await?;

        Ok(id)
    }

    /// Checks whether an operator exists.
    pub async fn user_exists(conn: &mut SqliteConnection, id: &str) -> DbResult<bool> {
        let found: Option<i64> = sqlx::query_scalar("SELECT 1 FROM users WHERE id = ?1")
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;

        Ok(found.is_some())
    }
}
