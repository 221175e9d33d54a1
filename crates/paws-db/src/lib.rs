//! # paws-db: Database Layer and Settlement Engine for Paws POS
//!
//! SQLite storage for the pet-shop register, and the transactional engine
//! that turns a cart into a settled sale (and back).
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Paws POS Data Flow                               │
//! │                                                                         │
//! │  HTTP handler (POST /sales)                                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     paws-db (THIS CRATE)                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌───────────────┐    ┌──────────────┐    │   │
//! │  │   │  Settlement   │    │  Repositories │    │  Migrations  │    │   │
//! │  │   │   Engine      │───►│ SaleRepo      │    │  (embedded)  │    │   │
//! │  │   │               │    │ InventoryLedg │    │              │    │   │
//! │  │   │ create_sale   │    │ ReceivableRepo│    │ 001_initial  │    │   │
//! │  │   │ cancel_sale   │    │ CustomerRepo  │    │              │    │   │
//! │  │   └───────────────┘    └───────────────┘    └──────────────┘    │   │
//! │  │           │                    │                                │   │
//! │  │           └──── Database (pool.rs, SqlitePool) ◄────────────────┘   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     SQLite Database (paws.db)                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations
//! - [`settlement`] - Atomic create / cancel of sales
//!
//! ## Usage
//!
//! ```rust,ignore
//! use paws_db::{Database, DbConfig, OperatorPolicy};
//!
//! let db = Database::new(DbConfig::new("paws.db")).await?;
//!
//! let engine = db.settlement(OperatorPolicy::default());
//! let created = engine.create_sale(request, Some(&operator_id)).await?;
//! engine.cancel_sale(&created.id).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;
pub mod settlement;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::customer::CustomerRepository;
pub use repository::finance::FinanceRepository;
pub use repository::inventory::InventoryLedger;
pub use repository::product::ProductRepository;
pub use repository::receivable::ReceivableRepository;
pub use repository::sale::{SaleDetail, SaleRepository};
pub use repository::settings::SettingsRepository;

pub use settlement::{
    CancelledSale, CreateSaleRequest, CreatedSale, LiteralReversal, OperatorPolicy,
    ReversalPolicy, SettlementEngine, SettlementError, SettlementResult,
};

// =============================================================================
// Test Fixtures
// =============================================================================

#[cfg(test)]
pub(crate) mod testing {
    use chrono::Utc;

    use crate::repository::product::generate_product_id;
    use crate::{Database, DbConfig};
    use paws_core::Product;

    /// Fresh migrated in-memory database.
    pub async fn test_db() -> Database {
        Database::new(DbConfig::in_memory()).await.unwrap()
    }

    /// Inserts an active product with the given stock and cost basis.
    pub async fn seed_product(
        db: &Database,
        sku: &str,
        price_cents: i64,
        cost_cents: i64,
        stock: i64,
    ) -> Product {
        let now = Utc::now();
        let product = Product {
            id: generate_product_id(),
            sku: sku.to_string(),
            name: format!("Product {sku}"),
            price_cents,
            cost_price_cents: cost_cents,
            last_cost_cents: None,
            stock_quantity: stock,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        db.products().insert(&product).await.unwrap()
    }
}
