use dsb_common::Kopecks;
use thiserror::Error;

use crate::{
    db_types::{
        Client,
        InsufficientFunds,
        LedgerEntry,
        NewOrder,
        Order,
        OrderChanged,
        OrderKey,
        OrderStatusType,
        ProductReturn,
        SettlementOutcome,
        UpsertOutcome,
    },
    traits::{LedgerError, LedgerManagement, OrderManagement, PricingStore},
};

/// The highest-level contract a backend must satisfy to run the back office:
/// * idempotent order upsert with transition reporting,
/// * exactly-once settlement of an order against the deposit ledger,
/// * the in-place status refresh for open orders,
/// * refunds for returned items.
///
/// Every mutation here is a single atomic unit on the backend. In particular the settlement
/// transaction reads the balance, checks the idempotency key, writes the debit and moves the
/// order — so two concurrent import cycles cannot both debit, and a crash mid-cycle leaves
/// nothing half-applied.
#[allow(async_fn_in_trait)]
pub trait BackOfficeDatabase: Clone + OrderManagement + LedgerManagement + PricingStore {
    /// The URL of the database.
    fn url(&self) -> &str;

    /// All clients eligible for the import cycle.
    async fn fetch_active_clients(&self) -> Result<Vec<Client>, BackOfficeError>;

    /// One client by internal id (notification routing needs its user id).
    async fn fetch_client(&self, client_id: i64) -> Result<Option<Client>, BackOfficeError>;

    /// Inserts or updates the order keyed by its identity triple, in one transaction. On update,
    /// all mutable fields (including the items blob) are replaced and `updated_at` is bumped;
    /// `created_at` keeps the value from the first insert. Reports whether the row is new and the
    /// status it had before this write.
    async fn upsert_order(&self, order: NewOrder) -> Result<UpsertOutcome, BackOfficeError>;

    /// Debits `amount` from the client's ledger for this order and moves it to `in_assembly`,
    /// atomically. Skips (without charging) when a completed debit with the order's deterministic
    /// payment id already exists. Fails with [`BackOfficeError::InsufficientFunds`] — performing
    /// no mutation at all — when the balance is short; the order stays `new` for retry.
    async fn settle_order(&self, order: &Order, amount: Kopecks) -> Result<SettlementOutcome, BackOfficeError>;

    /// Credits the ledger for a returned item and records the return, atomically.
    async fn credit_return(&self, ret: &ProductReturn, refund: Kopecks) -> Result<LedgerEntry, BackOfficeError>;

    /// Writes a re-polled status for an order, returning the old status alongside the updated row.
    async fn apply_status(&self, key: &OrderKey, new_status: OrderStatusType)
        -> Result<OrderChanged, BackOfficeError>;

    /// Purchase cost of an item in the client's warehouse stock, looked up by barcode.
    async fn warehouse_cost(&self, client_id: i64, barcode: &str) -> Result<Option<Kopecks>, BackOfficeError>;

    /// Purchase cost from the supplier price list, looked up by article.
    async fn price_list_cost(&self, article: &str) -> Result<Option<Kopecks>, BackOfficeError>;

    /// Closes the database connection.
    async fn close(&mut self) -> Result<(), BackOfficeError> {
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum BackOfficeError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("The order {0} does not exist")]
    OrderNotFound(OrderKey),
    #[error("The client #{0} does not exist")]
    ClientNotFound(i64),
    #[error("The order {0} already has that status")]
    StatusUnchanged(OrderKey),
    #[error("The order {key} has no item with article {article}")]
    ItemNotFound { key: OrderKey, article: String },
    #[error("{0}")]
    InsufficientFunds(#[from] InsufficientFunds),
    #[error("{0}")]
    Ledger(#[from] LedgerError),
}

impl From<sqlx::Error> for BackOfficeError {
    fn from(e: sqlx::Error) -> Self {
        BackOfficeError::DatabaseError(e.to_string())
    }
}
