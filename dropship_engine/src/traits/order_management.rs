use chrono::Duration;

use crate::{
    db_types::{Marketplace, Order, OrderKey},
    order_objects::OrderQueryFilter,
    traits::BackOfficeError,
};

/// Read-side access to stored orders.
#[allow(async_fn_in_trait)]
pub trait OrderManagement {
    /// Fetches the order with the given identity triple, if it exists.
    async fn fetch_order(&self, key: &OrderKey) -> Result<Option<Order>, BackOfficeError>;

    /// Fetches orders matching the filter, newest first.
    async fn search_orders(&self, query: OrderQueryFilter) -> Result<Vec<Order>, BackOfficeError>;

    /// Non-terminal orders of a client on one marketplace, no older than `window`. These are the
    /// orders whose marketplace status the import cycle re-polls.
    async fn fetch_open_orders(
        &self,
        client_id: i64,
        marketplace: Marketplace,
        window: Duration,
    ) -> Result<Vec<Order>, BackOfficeError>;
}
