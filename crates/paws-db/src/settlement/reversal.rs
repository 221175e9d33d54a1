//! # Reversal Policy
//!
//! What cancelling a sale does to the money side of the books.
//!
//! [`LiteralReversal`] force-cancels every receivable of the sale, paid ones
//! included, and hard-deletes the revenue postings whose description carries
//! the sale number. It does not touch bank balances, wallets or loyalty
//! points. A policy that issues compensating entries instead can be plugged
//! into [`SettlementEngine`](super::SettlementEngine) without changing the
//! cancellation flow.

use std::future::Future;

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;

use crate::error::DbResult;
use crate::repository::finance::FinanceRepository;
use crate::repository::receivable::ReceivableRepository;
use paws_core::Sale;

/// Money-side reversal steps of a sale cancellation.
///
/// Both steps run on the cancellation's transaction.
pub trait ReversalPolicy: Send + Sync {
    /// Reverses the sale's receivables. Returns rows touched.
    fn reverse_receivables(
        &self,
        conn: &mut SqliteConnection,
        sale: &Sale,
        now: DateTime<Utc>,
    ) -> impl Future<Output = DbResult<u64>> + Send;

    /// Reverses the sale's realized postings. Returns rows touched.
    fn reverse_postings(
        &self,
        conn: &mut SqliteConnection,
        sale: &Sale,
    ) -> impl Future<Output = DbResult<u64>> + Send;
}

/// Cancel receivables whatever their status and delete matching revenue.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiteralReversal;

impl ReversalPolicy for LiteralReversal {
    async fn reverse_receivables(
        &self,
        conn: &mut SqliteConnection,
        sale: &Sale,
        now: DateTime<Utc>,
    ) -> DbResult<u64> {
        ReceivableRepository::cancel_for_sale(conn, &sale.id, now).await
    }

    async fn reverse_postings(&self, conn: &mut SqliteConnection, sale: &Sale) -> DbResult<u64> {
        FinanceRepository::delete_sale_revenue(conn, &sale.sale_number).await
    }
}
