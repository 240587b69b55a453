use std::fmt::Debug;

use dsb_common::Kopecks;
use log::*;

use crate::{
    api::cost,
    db_types::{
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
    events::{EventProducers, LowBalanceEvent, OrderSettledEvent, OrderStatusChangedEvent},
    traits::{BackOfficeDatabase, BackOfficeError},
};

/// Fallback purchase-cost percentage when the client has no pricing settings row. A business
/// guess inherited from operations; clients override it per marketplace in their settings.
const DEFAULT_FALLBACK_COST_PERCENT: i64 = 70;

/// `OrderFlowApi` is the primary API for the import/settlement flow: it takes canonical orders
/// from the normalizers, runs the idempotent upsert, and settles newly payable orders against the
/// client's deposit ledger.
pub struct OrderFlowApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for OrderFlowApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "OrderFlowApi")
    }
}

impl<B> OrderFlowApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

/// What happened to one imported order.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub order: Order,
    pub is_new: bool,
    pub previous_status: Option<OrderStatusType>,
    pub settlement: SettlementStatus,
}

#[derive(Debug, Clone)]
pub enum SettlementStatus {
    /// The order was not in a payable transition; nothing was charged.
    NotPayable,
    Settled(LedgerEntry),
    AlreadySettled,
    /// Balance was short. The order stays `new`; the next cycle retries without duplicate side
    /// effects.
    InsufficientFunds(InsufficientFunds),
}

impl<B> OrderFlowApi<B>
where B: BackOfficeDatabase
{
    /// Processes one canonical order from an import cycle.
    ///
    /// The upsert reports whether the order is new or just (re-)entered the payable state; only
    /// then is the purchase cost resolved and a settlement attempted. An unchanged re-import is a
    /// no-op on the ledger, which is what makes the whole cycle safe to re-run from scratch.
    pub async fn process_imported_order(&self, order: NewOrder) -> Result<ImportOutcome, BackOfficeError> {
        let key = order.key.clone();
        let outcome = self.db.upsert_order(order).await?;
        if !outcome.payable() {
            trace!("🔄️📦️ Order {key} is not in a payable state; no settlement attempted");
            return Ok(import_outcome(outcome, SettlementStatus::NotPayable));
        }
        let fallback_percent = self.fallback_cost_percent(&key).await;
        let breakdown =
            cost::purchase_cost(&self.db, key.client_id, &outcome.order.items, fallback_percent).await?;
        if breakdown.is_estimated() {
            debug!("🔄️📦️ Order {key}: purchase cost {} includes estimated lines", breakdown.total);
        }
        match self.db.settle_order(&outcome.order, breakdown.total).await {
            Ok(SettlementOutcome::Settled { order, entry }) => {
                debug!("🔄️💰️ Order {key} settled for {}", breakdown.total);
                self.call_order_settled_hook(&order, &entry).await;
                Ok(ImportOutcome {
                    order,
                    is_new: outcome.is_new,
                    previous_status: outcome.previous_status,
                    settlement: SettlementStatus::Settled(entry),
                })
            },
            Ok(SettlementOutcome::AlreadySettled(_)) => {
                Ok(import_outcome(outcome, SettlementStatus::AlreadySettled))
            },
            Err(BackOfficeError::InsufficientFunds(shortfall)) => {
                info!(
                    "🔄️💰️ Order {key} left unsettled: balance {} short of {} by {}",
                    shortfall.balance, shortfall.required, shortfall.shortfall
                );
                self.call_low_balance_hook(&outcome.order, &shortfall).await;
                Ok(import_outcome(outcome, SettlementStatus::InsufficientFunds(shortfall)))
            },
            Err(e) => Err(e),
        }
    }

    /// Writes a re-polled marketplace status for an open order. Returns `None` when nothing
    /// changed; a real transition (including to terminal states) is written and announced.
    pub async fn refresh_order_status(
        &self,
        key: &OrderKey,
        new_status: OrderStatusType,
    ) -> Result<Option<OrderChanged>, BackOfficeError> {
        let Some(order) = self.db.fetch_order(key).await? else {
            return Err(BackOfficeError::OrderNotFound(key.clone()));
        };
        if order.status == new_status {
            return Ok(None);
        }
        let changed = self.db.apply_status(key, new_status).await?;
        self.call_status_changed_hook(&changed).await;
        Ok(Some(changed))
    }

    /// Refunds a returned item: per-unit cost is re-resolved the same way the settlement priced
    /// it, and an offsetting `return` entry is appended. The original debit is never touched.
    pub async fn process_return(&self, ret: ProductReturn) -> Result<LedgerEntry, BackOfficeError> {
        let order = self
            .db
            .fetch_order(&ret.key)
            .await?
            .ok_or_else(|| BackOfficeError::OrderNotFound(ret.key.clone()))?;
        let item = order
            .items
            .iter()
            .find(|i| i.article == ret.article)
            .ok_or_else(|| BackOfficeError::ItemNotFound { key: ret.key.clone(), article: ret.article.clone() })?;
        let fallback_percent = self.fallback_cost_percent(&ret.key).await;
        let breakdown =
            cost::purchase_cost(&self.db, ret.key.client_id, std::slice::from_ref(item), fallback_percent).await?;
        let per_unit = Kopecks::from(breakdown.total.value() / item.quantity.max(1));
        let refund = per_unit * ret.quantity;
        let entry = self.db.credit_return(&ret, refund).await?;
        info!("🔄️💰️ Return on order {} refunded {refund} to client #{}", ret.key, ret.key.client_id);
        Ok(entry)
    }

    async fn fallback_cost_percent(&self, key: &OrderKey) -> i64 {
        match self.db.fetch_pricing_settings(key.client_id, key.marketplace).await {
            Ok(Some(settings)) => settings.fallback_cost_percent,
            Ok(None) => DEFAULT_FALLBACK_COST_PERCENT,
            Err(e) => {
                warn!("🔄️ Could not load pricing settings for {key}: {e}. Using the default fallback percent.");
                DEFAULT_FALLBACK_COST_PERCENT
            },
        }
    }

    async fn call_order_settled_hook(&self, order: &Order, entry: &LedgerEntry) {
        for emitter in &self.producers.order_settled_producer {
            trace!("🔄️📬️ Notifying order settled hook subscribers");
            let event = OrderSettledEvent::new(order.clone(), entry.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_low_balance_hook(&self, order: &Order, shortfall: &InsufficientFunds) {
        for emitter in &self.producers.low_balance_producer {
            trace!("🔄️📬️ Notifying low balance hook subscribers");
            let event = LowBalanceEvent::new(order.clone(), shortfall.clone());
            emitter.publish_event(event).await;
        }
    }

    async fn call_status_changed_hook(&self, changed: &OrderChanged) {
        for emitter in &self.producers.status_changed_producer {
            trace!("🔄️📬️ Notifying status changed hook subscribers");
            let event = OrderStatusChangedEvent::new(changed.old_status, changed.order.clone());
            emitter.publish_event(event).await;
        }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

fn import_outcome(outcome: UpsertOutcome, settlement: SettlementStatus) -> ImportOutcome {
    ImportOutcome {
        order: outcome.order,
        is_new: outcome.is_new,
        previous_status: outcome.previous_status,
        settlement,
    }
}
