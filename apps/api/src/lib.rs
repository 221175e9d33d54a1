//! # Paws API
//!
//! HTTP server for the pet-shop register's sale settlement engine.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          API Server                                     │
//! │                                                                         │
//! │  Register ───► HTTP (8080) ───► routes ───► SettlementEngine ───► SQLite│
//! │                                    │                                    │
//! │                                    └──────► Repositories (reads)        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration
//! Environment variables (see [`config`]):
//! - `PAWS_CONFIG` - Optional TOML file
//! - `PAWS_HTTP_PORT` - HTTP port (default: 8080)
//! - `PAWS_BIND_ADDR` - Listen address (default: 0.0.0.0)
//! - `PAWS_DATABASE_PATH` - SQLite file (default: paws.db)
//! - `PAWS_MAX_CONNECTIONS` - Pool size (default: 5)
//! - `PAWS_LOG_LEVEL` - Default log filter
//! - `PAWS_REQUIRE_OPERATOR` - Reject sales without `x-operator-id`

pub mod config;
pub mod error;
pub mod routes;

use axum::routing::{get, post};
use axum::Router;
use tracing_subscriber::EnvFilter;

use paws_db::{Database, OperatorPolicy, SettlementEngine};

// Re-exports
pub use config::{ApiConfig, ConfigError};
pub use error::{ApiError, ErrorCode};

/// Shared application state.
#[derive(Debug, Clone)]
pub struct AppState {
    pub db: Database,
    pub engine: SettlementEngine,
}

impl AppState {
    /// Creates the state, wiring the settlement engine to `db`.
    pub fn new(db: Database, operator_policy: OperatorPolicy) -> Self {
        let engine = db.settlement(operator_policy);
        AppState { db, engine }
    }
}

/// Builds the HTTP router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/sales", post(routes::create_sale).get(routes::list_sales))
        .route("/sales/{id}", get(routes::get_sale))
        .route("/sales/{id}/cancel", post(routes::cancel_sale))
        .route(
            "/products/{id}/stock-movements",
            post(routes::record_stock_movement).get(routes::stock_movements),
        )
        .with_state(state)
}

/// Initializes the tracing subscriber.
///
/// `RUST_LOG` wins over `default_filter`.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();
}
