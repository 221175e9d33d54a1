//! # paws-core: Pure Settlement Rules for Paws POS
//!
//! This crate holds every numeric policy of the sale settlement engine as
//! pure functions. The database layer (`paws-db`) reads rows, calls into
//! this crate, and writes whatever the functions return.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Paws POS Architecture                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    HTTP API (apps/api)                          │   │
//! │  │        POST /sales, POST /sales/:id/cancel, GET /sales          │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ paws-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌────────────┐  ┌──────────┐  │   │
//! │  │   │  costing  │  │  payment  │  │ receivable │  │ loyalty  │  │   │
//! │  │   │ avg cost  │  │  wallet   │  │ fees, due  │  │ points,  │  │   │
//! │  │   │ formula   │  │  split    │  │ dates      │  │ cashback │  │   │
//! │  │   └───────────┘  └───────────┘  └────────────┘  └──────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO CLOCK READS • PURE FUNCTIONS       │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │          paws-db (SQLite, repositories, settlement)             │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Sale, Receivable, Customer, ...)
//! - [`money`] - Money and Rate types with integer arithmetic
//! - [`costing`] - Weighted-average stock costing
//! - [`checkout`] - Cart totals for a new sale
//! - [`payment`] - Wallet vs. tendered payment split
//! - [`receivable`] - Receivable schedule planning
//! - [`loyalty`] - Loyalty points and cashback accrual
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use paws_core::costing::apply_movement;
//! use paws_core::{Money, MovementType};
//!
//! // 10 units at $5.00, receive 5 more at $8.00
//! let change = apply_movement(10, Money::from_cents(500), MovementType::In, 5, Some(Money::from_cents(800)));
//!
//! assert_eq!(change.new_stock, 15);
//! assert_eq!(change.new_avg_cost.cents(), 600);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod checkout;
pub mod costing;
pub mod error;
pub mod loyalty;
pub mod money;
pub mod payment;
pub mod receivable;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use money::{Money, Rate};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Days between consecutive installments of a flow or store-credit plan.
pub const INSTALLMENT_INTERVAL_DAYS: i64 = 30;

/// Liquidation days assumed for `credit_card` when no configuration exists.
pub const DEFAULT_CREDIT_CARD_LIQUIDATION_DAYS: i64 = 30;

/// Liquidation days assumed for every other method when no configuration exists.
pub const DEFAULT_LIQUIDATION_DAYS: i64 = 1;

/// Reference type recorded on movements created by a sale.
pub const REFERENCE_SALE: &str = "sale";

/// Reference type recorded on movements created by a sale cancellation.
pub const REFERENCE_SALE_CANCELLATION: &str = "sale_cancellation";

/// Reference type recorded on movements entered by hand.
pub const REFERENCE_MANUAL: &str = "manual";
