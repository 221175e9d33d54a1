//! # Inventory Ledger
//!
//! Append-only stock movements plus the product fields they drive.
//!
//! ## One Movement, Two Writes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  apply(product, type, qty, unit_cost?)                                  │
//! │       │                                                                 │
//! │       ├── read product (NotFound if missing)                            │
//! │       ├── paws_core::costing::apply_movement → StockChange              │
//! │       ├── UPDATE products (stock, avg cost, last cost on IN)            │
//! │       └── INSERT stock_movements (signed qty, unit cost on IN/OUT)      │
//! │                                                                         │
//! │  Both writes happen on the caller's connection, so a sale or a          │
//! │  cancellation commits or rolls back its movements with everything else. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{DbError, DbResult};
use crate::pool::begin_immediate;
use crate::repository::product::ProductRepository;
use paws_core::costing::{apply_movement, signed_quantity, StockChange};
use paws_core::{Money, MovementType, StockMovement, REFERENCE_MANUAL};

/// One movement to apply.
#[derive(Debug, Clone)]
pub struct MovementRequest<'a> {
    pub product_id: &'a str,
    pub movement_type: MovementType,
    /// Magnitude for IN/OUT, signed delta for ADJUSTMENT.
    pub quantity: i64,
    /// Unit cost. On an IN it reweights the cost basis (`None` leaves it
    /// unchanged); on an OUT it is only recorded on the movement.
    pub unit_cost: Option<Money>,
    pub reference_type: Option<&'a str>,
    pub reference_id: Option<&'a str>,
    pub notes: Option<&'a str>,
}

/// Ledger of stock movements.
#[derive(Debug, Clone)]
pub struct InventoryLedger {
    pool: SqlitePool,
}

impl InventoryLedger {
    /// Creates a new InventoryLedger.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryLedger { pool }
    }

    /// Records a movement entered by hand, in its own transaction.
    ///
    /// ## Example
    /// ```rust,ignore
    /// // receive 5 units at R$ 8.00
    /// let change = db
    ///     .inventory()
    ///     .record_manual(&product_id, MovementType::In, 5, Some(Money::from_cents(800)), None)
    ///     .await?;
    /// ```
    pub async fn record_manual(
        &self,
        product_id: &str,
        movement_type: MovementType,
        quantity: i64,
        unit_cost: Option<Money>,
        notes: Option<&str>,
    ) -> DbResult<StockChange> {
        let mut tx = begin_immediate(&self.pool).await?;

        let change = Self::apply(
            &mut tx,
            &MovementRequest {
                product_id,
                movement_type,
                quantity,
                unit_cost,
                reference_type: Some(REFERENCE_MANUAL),
                reference_id: None,
                notes,
            },
        )
        .await?;

        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            product_id,
            movement_type = ?movement_type,
            quantity,
            new_stock = change.new_stock,
            new_avg_cost = change.new_avg_cost.cents(),
            "Manual stock movement recorded"
        );

        Ok(change)
    }

    /// Lists a product's movements, newest first.
    pub async fn history(&self, product_id: &str, limit: i64) -> DbResult<Vec<StockMovement>> {
        let movements = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, movement_type, quantity, cost_price_cents,
                   reference_type, reference_id, notes, created_at
            FROM stock_movements
            WHERE product_id = ?1
            ORDER BY created_at DESC, rowid DESC
            LIMIT ?2
            "#,
        )
        .bind(product_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(movements)
    }

    /// Applies one movement on the given connection.
    ///
    /// Fails with `NotFound` when the product doesn't exist. Negative
    /// resulting stock is accepted.
    pub async fn apply(
        conn: &mut SqliteConnection,
        request: &MovementRequest<'_>,
    ) -> DbResult<StockChange> {
        let product = ProductRepository::find(conn, request.product_id)
            .await?
            .ok_or_else(|| DbError::not_found("Product", request.product_id))?;

        let change = apply_movement(
            product.stock_quantity,
            product.cost_price(),
            request.movement_type,
            request.quantity,
            request.unit_cost,
        );

        // last cost moves on receipts only; issues still record their cost
        let receipt_cost = match request.movement_type {
            MovementType::In => request.unit_cost.map(|c| c.cents()),
            MovementType::Out | MovementType::Adjustment => None,
        };
        let movement_cost = match request.movement_type {
            MovementType::In | MovementType::Out => request.unit_cost.map(|c| c.cents()),
            MovementType::Adjustment => None,
        };
        let now = Utc::now();

        ProductRepository::write_stock(
            conn,
            &product.id,
            change.new_stock,
            change.new_avg_cost.cents(),
            receipt_cost,
            now,
        )
        .await?;

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, movement_type, quantity, cost_price_cents,
                reference_type, reference_id, notes, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&product.id)
        .bind(request.movement_type)
        .bind(signed_quantity(request.movement_type, request.quantity))
        .bind(movement_cost)
        .bind(request.reference_type)
        .bind(request.reference_id)
        .bind(request.notes)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        debug!(
            product_id = %product.id,
            movement_type = ?request.movement_type,
            old_stock = change.old_stock,
            new_stock = change.new_stock,
            "Stock movement applied"
        );

        Ok(change)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
