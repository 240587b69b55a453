use dsb_common::Kopecks;
use thiserror::Error;

use crate::{
    db_types::{LedgerEntry, NewLedgerEntry},
    order_objects::LedgerQueryFilter,
};

/// Access to the append-only deposit ledger.
///
/// There is no stored balance anywhere: the balance of a client is *defined* as the
/// `balance_after` of their most recent completed entry. That rules out drift between a cached
/// balance and the ledger, at the cost of requiring the balance read and the chained insert to
/// happen inside one transaction — which [`LedgerManagement::append_entry`] guarantees.
#[allow(async_fn_in_trait)]
pub trait LedgerManagement {
    /// The client's current balance: `balance_after` of the latest completed entry, or 0.
    async fn balance(&self, client_id: i64) -> Result<Kopecks, LedgerError>;

    /// Appends an entry, computing `balance_before`/`balance_after` from the current chain head.
    /// The read and the insert are one atomic unit, so concurrent appends for the same client
    /// cannot interleave and corrupt the chain.
    async fn append_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError>;

    /// Entries for a client, newest first.
    async fn ledger_history(
        &self,
        client_id: i64,
        query: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError>;
}

#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Invalid ledger amount: {0}")]
    InvalidAmount(String),
}

impl From<sqlx::Error> for LedgerError {
    fn from(e: sqlx::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}
