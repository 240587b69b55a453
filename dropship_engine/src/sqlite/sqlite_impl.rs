//! `SqliteDatabase` is the concrete SQLite backend of the back office.
//!
//! It implements the traits in [`crate::traits`] by composing the low-level functions of
//! [`super::db`] into transactions. Anything that must be exactly-once — the settlement debit in
//! particular — happens inside a single transaction here, never across several round-trips.
use std::fmt::Debug;

use chrono::Duration;
use dsb_common::Kopecks;
use log::*;
use sqlx::SqlitePool;

use super::db::{clients, costs, db_url, deposits, new_pool, orders, products, returns};
use crate::{
    db_types::{
        Client,
        EntryStatus,
        InsufficientFunds,
        LedgerEntry,
        Marketplace,
        NewLedgerEntry,
        NewOrder,
        NewPriceChange,
        Order,
        OrderChanged,
        OrderKey,
        OrderStatusType,
        PricingSettings,
        ProductReturn,
        ProductSnapshot,
        SettlementOutcome,
        TransactionType,
        UpsertOutcome,
    },
    order_objects::{LedgerQueryFilter, OrderQueryFilter},
    traits::{BackOfficeDatabase, BackOfficeError, LedgerError, LedgerManagement, OrderManagement, PricingStore},
};

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./src/sqlite/migrations");

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

impl BackOfficeDatabase for SqliteDatabase {
    fn url(&self) -> &str {
        self.url.as_str()
    }

    async fn fetch_active_clients(&self) -> Result<Vec<Client>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let result = clients::fetch_active(&mut conn).await?;
        Ok(result)
    }

    async fn fetch_client(&self, client_id: i64) -> Result<Option<Client>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let result = clients::fetch_by_id(client_id, &mut conn).await?;
        Ok(result)
    }

    async fn upsert_order(&self, order: NewOrder) -> Result<UpsertOutcome, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let outcome = orders::upsert(order, &mut tx).await?;
        tx.commit().await?;
        trace!(
            "🗃️ Order {} upserted (is_new: {}, previous status: {:?})",
            outcome.order.key(),
            outcome.is_new,
            outcome.previous_status
        );
        Ok(outcome)
    }

    /// The settlement transaction. In one atomic unit:
    /// 1. look for a completed debit with this order's deterministic payment id — if present,
    ///    nothing is charged and the order is nudged back off `new` if a re-import reset it;
    /// 2. fold the ledger for the current balance — a shortfall aborts with no mutation at all;
    /// 3. append the chained debit entry and move the order to `in_assembly`.
    async fn settle_order(&self, order: &Order, amount: Kopecks) -> Result<SettlementOutcome, BackOfficeError> {
        let key = order.key();
        let payment_id = key.payment_id();
        let mut tx = self.pool.begin().await?;
        if let Some(existing) = deposits::payment_entry(&payment_id, &mut tx).await? {
            debug!("💰️ Order {key} was already settled by ledger entry #{}. Not charging again.", existing.id);
            // A re-import overwrote the status with 'new'; the ledger says it is paid for.
            if order.status == OrderStatusType::New {
                orders::update_status(order.id, OrderStatusType::InAssembly, &mut tx).await?;
            }
            tx.commit().await?;
            return Ok(SettlementOutcome::AlreadySettled(existing));
        }
        let balance = deposits::last_balance(order.client_id, &mut tx).await?;
        if balance < amount {
            // tx is dropped unharmed: no ledger row, no status change, order stays payable
            return Err(BackOfficeError::InsufficientFunds(InsufficientFunds {
                balance,
                required: amount,
                shortfall: amount - balance,
            }));
        }
        let entry = NewLedgerEntry {
            client_id: order.client_id,
            amount: -amount,
            transaction_type: TransactionType::OrderPayment,
            description: format!("Order {} purchase debit ({})", order.order_id, order.marketplace),
            payment_method: Some("internal".to_string()),
            payment_id: Some(payment_id),
            status: EntryStatus::Completed,
        };
        let entry = deposits::insert_entry(entry, &mut tx).await?;
        let updated = orders::update_status(order.id, OrderStatusType::InAssembly, &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ Order {key} settled: {} debited, balance {} -> {}", amount, entry.balance_before, entry.balance_after);
        Ok(SettlementOutcome::Settled { order: updated, entry })
    }

    async fn credit_return(&self, ret: &ProductReturn, refund: Kopecks) -> Result<LedgerEntry, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::fetch_by_key(&ret.key, &mut tx)
            .await?
            .ok_or_else(|| BackOfficeError::OrderNotFound(ret.key.clone()))?;
        let entry = NewLedgerEntry {
            client_id: order.client_id,
            amount: refund,
            transaction_type: TransactionType::Return,
            description: format!(
                "Refund for {} x{} returned on order {}. Reason: {}",
                ret.article, ret.quantity, order.order_id, ret.reason
            ),
            payment_method: Some("internal".to_string()),
            payment_id: None,
            status: EntryStatus::Completed,
        };
        let entry = deposits::insert_entry(entry, &mut tx).await?;
        returns::insert_return(order.id, &ret.article, ret.quantity, &ret.reason, refund, &mut tx).await?;
        tx.commit().await?;
        debug!("💰️ Return on order {} credited {} back to client #{}", ret.key, refund, order.client_id);
        Ok(entry)
    }

    async fn apply_status(
        &self,
        key: &OrderKey,
        new_status: OrderStatusType,
    ) -> Result<OrderChanged, BackOfficeError> {
        let mut tx = self.pool.begin().await?;
        let order =
            orders::fetch_by_key(key, &mut tx).await?.ok_or_else(|| BackOfficeError::OrderNotFound(key.clone()))?;
        if order.status == new_status {
            return Err(BackOfficeError::StatusUnchanged(key.clone()));
        }
        let old_status = order.status;
        let updated = orders::update_status(order.id, new_status, &mut tx).await?;
        tx.commit().await?;
        debug!("🗃️ Order {key} status: {old_status} -> {new_status}");
        Ok(OrderChanged { old_status, order: updated })
    }

    async fn warehouse_cost(&self, client_id: i64, barcode: &str) -> Result<Option<Kopecks>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let cost = costs::warehouse_cost(client_id, barcode, &mut conn).await?;
        Ok(cost)
    }

    async fn price_list_cost(&self, article: &str) -> Result<Option<Kopecks>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let cost = costs::price_list_cost(article, &mut conn).await?;
        Ok(cost)
    }

    async fn close(&mut self) -> Result<(), BackOfficeError> {
        self.pool.close().await;
        Ok(())
    }
}

impl OrderManagement for SqliteDatabase {
    async fn fetch_order(&self, key: &OrderKey) -> Result<Option<Order>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let order = orders::fetch_by_key(key, &mut conn).await?;
        Ok(order)
    }

    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::search_orders(query, &mut conn).await?;
        Ok(result)
    }

    async fn fetch_open_orders(
        &self,
        client_id: i64,
        marketplace: Marketplace,
        window: Duration,
    ) -> Result<Vec<Order>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let result = orders::fetch_open(client_id, marketplace, window.num_seconds(), &mut conn).await?;
        Ok(result)
    }
}

impl LedgerManagement for SqliteDatabase {
    async fn balance(&self, client_id: i64) -> Result<Kopecks, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        deposits::last_balance(client_id, &mut conn).await
    }

    async fn append_entry(&self, entry: NewLedgerEntry) -> Result<LedgerEntry, LedgerError> {
        let mut tx = self.pool.begin().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        let entry = deposits::insert_entry(entry, &mut tx).await?;
        tx.commit().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        Ok(entry)
    }

    async fn ledger_history(
        &self,
        client_id: i64,
        query: LedgerQueryFilter,
    ) -> Result<Vec<LedgerEntry>, LedgerError> {
        let mut conn = self.pool.acquire().await.map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        deposits::history(client_id, query, &mut conn).await
    }
}

impl PricingStore for SqliteDatabase {
    async fn fetch_pricing_settings(
        &self,
        client_id: i64,
        marketplace: Marketplace,
    ) -> Result<Option<PricingSettings>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let settings = products::fetch_settings(client_id, marketplace, &mut conn).await?;
        Ok(settings)
    }

    async fn fetch_active_products(&self, client_id: i64) -> Result<Vec<ProductSnapshot>, BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        let result = products::fetch_active_products(client_id, &mut conn).await?;
        Ok(result)
    }

    async fn update_cached_price(
        &self,
        client_id: i64,
        external_id: i64,
        new_price: f64,
    ) -> Result<(), BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        products::update_cached_price(client_id, external_id, new_price, &mut conn).await?;
        Ok(())
    }

    async fn set_promotion_state(
        &self,
        client_id: i64,
        external_id: i64,
        in_promotion: bool,
        discount_percent: f64,
    ) -> Result<(), BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        products::set_promotion_state(client_id, external_id, in_promotion, discount_percent, &mut conn).await?;
        Ok(())
    }

    async fn record_price_change(&self, record: NewPriceChange) -> Result<(), BackOfficeError> {
        let mut conn = self.pool.acquire().await?;
        products::insert_price_change(record, &mut conn).await?;
        Ok(())
    }
}

impl SqliteDatabase {
    /// Creates a new database API object using the URL from the environment.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    /// Applies the embedded migrations. The binary runs this at startup; tests run it against
    /// their throwaway databases.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        MIGRATOR.run(&self.pool).await
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}
