//! # Repository Module
//!
//! Database repository implementations for Paws POS.
//!
//! ## Two Ways In
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  Pool-level (&self)                 Connection-level (associated fn)    │
//! │  ──────────────────────────         ───────────────────────────────     │
//! │  db.sales().get_by_id(id)           SaleRepository::insert_sale(        │
//! │  db.inventory().history(id, 50)         &mut tx, &sale)                 │
//! │                                                                         │
//! │  Short reads and standalone         Steps of a settlement; the caller   │
//! │  writes on a pooled connection.     owns the transaction and commits.   │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`ProductRepository`](product::ProductRepository) - Products and their stock fields
//! - [`InventoryLedger`](inventory::InventoryLedger) - Stock movements and weighted-average cost
//! - [`SaleRepository`](sale::SaleRepository) - Sales, items and payments
//! - [`ReceivableRepository`](receivable::ReceivableRepository) - Accounts receivable
//! - [`FinanceRepository`](finance::FinanceRepository) - Revenue postings and bank accounts
//! - [`CustomerRepository`](customer::CustomerRepository) - Wallet, loyalty and purchase totals
//! - [`SettingsRepository`](settings::SettingsRepository) - Settings, payment configs, operators

pub mod customer;
pub mod finance;
pub mod inventory;
pub mod product;
pub mod receivable;
pub mod sale;
pub mod settings;
