use crate::db_types::{InsufficientFunds, LedgerEntry, Order, OrderStatusType};

/// Fired after a successful settlement: the debit is committed and the order moved to assembly.
#[derive(Debug, Clone)]
pub struct OrderSettledEvent {
    pub order: Order,
    pub entry: LedgerEntry,
}

impl OrderSettledEvent {
    pub fn new(order: Order, entry: LedgerEntry) -> Self {
        Self { order, entry }
    }
}

/// Fired when a settlement attempt found the balance short. The order stays unsettled and will be
/// retried on the next import cycle; subscribers typically nudge the client to top up.
#[derive(Debug, Clone)]
pub struct LowBalanceEvent {
    pub client_id: i64,
    pub order: Order,
    pub shortfall: InsufficientFunds,
}

impl LowBalanceEvent {
    pub fn new(order: Order, shortfall: InsufficientFunds) -> Self {
        let client_id = order.client_id;
        Self { client_id, order, shortfall }
    }
}

/// Fired when a status re-poll moved an order to a different state.
#[derive(Debug, Clone)]
pub struct OrderStatusChangedEvent {
    pub old_status: OrderStatusType,
    pub order: Order,
}

impl OrderStatusChangedEvent {
    pub fn new(old_status: OrderStatusType, order: Order) -> Self {
        Self { old_status, order }
    }
}
