use chrono::SecondsFormat;
use log::{debug, trace};
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{Marketplace, NewOrder, Order, OrderKey, OrderStatusType, UpsertOutcome},
    order_objects::OrderQueryFilter,
    traits::BackOfficeError,
};

/// Inserts or updates the order keyed by `(client_id, marketplace, marketplace_order_id)`.
///
/// The existing-row read and the write share the caller's connection, so wrapping this call in a
/// transaction makes the transition report race-free: two concurrent imports cannot both observe
/// `previous_status == 'new'` for the same order.
pub async fn upsert(order: NewOrder, conn: &mut SqliteConnection) -> Result<UpsertOutcome, BackOfficeError> {
    let existing = fetch_by_key(&order.key, &mut *conn).await?;
    let items = serde_json::to_string(&order.items)
        .map_err(|e| BackOfficeError::DatabaseError(format!("Could not encode order items: {e}")))?;
    let created_at = order.created_at.to_rfc3339_opts(SecondsFormat::Secs, true);
    let row: Order = sqlx::query_as(
        r#"
        INSERT INTO orders (
            client_id,
            marketplace,
            marketplace_order_id,
            status,
            order_type,
            total_amount,
            customer_name,
            customer_phone,
            customer_email,
            delivery_address,
            items,
            created_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        ON CONFLICT (client_id, marketplace, marketplace_order_id) DO UPDATE SET
            status = excluded.status,
            order_type = excluded.order_type,
            total_amount = excluded.total_amount,
            customer_name = excluded.customer_name,
            customer_phone = excluded.customer_phone,
            customer_email = excluded.customer_email,
            delivery_address = excluded.delivery_address,
            items = excluded.items,
            updated_at = CURRENT_TIMESTAMP
        RETURNING *;
        "#,
    )
    .bind(order.key.client_id)
    .bind(order.key.marketplace)
    .bind(order.key.order_id.clone())
    .bind(order.status)
    .bind(order.order_type)
    .bind(order.total_amount)
    .bind(order.customer.name)
    .bind(order.customer.phone)
    .bind(order.customer.email)
    .bind(order.delivery_address)
    .bind(items)
    .bind(created_at)
    .fetch_one(conn)
    .await?;
    let is_new = existing.is_none();
    if is_new {
        debug!("📝️ Order {} inserted with id {}", row.key(), row.id);
    }
    Ok(UpsertOutcome { order: row, is_new, previous_status: existing.map(|o| o.status) })
}

pub async fn fetch_by_key(key: &OrderKey, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as(
        "SELECT * FROM orders WHERE client_id = $1 AND marketplace = $2 AND marketplace_order_id = $3",
    )
    .bind(key.client_id)
    .bind(key.marketplace)
    .bind(key.order_id.clone())
    .fetch_optional(conn)
    .await?;
    Ok(order)
}

pub async fn fetch_by_id(id: i64, conn: &mut SqliteConnection) -> Result<Option<Order>, sqlx::Error> {
    let order = sqlx::query_as("SELECT * FROM orders WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(order)
}

/// Fetches orders according to the criteria in the [`OrderQueryFilter`], newest first.
pub async fn search_orders(query: OrderQueryFilter, conn: &mut SqliteConnection) -> Result<Vec<Order>, sqlx::Error> {
    let mut builder = QueryBuilder::new(
        r#"
    SELECT * FROM orders
    "#,
    );
    if !query.is_empty() {
        builder.push("WHERE ");
    }
    let mut where_clause = builder.separated(" AND ");
    if let Some(client_id) = query.client_id {
        where_clause.push("client_id = ");
        where_clause.push_bind_unseparated(client_id);
    }
    if let Some(marketplace) = query.marketplace {
        where_clause.push("marketplace = ");
        where_clause.push_bind_unseparated(marketplace);
    }
    if query.status.as_ref().map(|s| !s.is_empty()).unwrap_or(false) {
        let mut statuses = vec![];
        query.status.as_ref().unwrap().iter().for_each(|s| {
            statuses.push(format!("'{s}'"));
        });
        let status_clause = statuses.join(",");
        where_clause.push(format!("status IN ({status_clause})"));
    }
    if let Some(needle) = query.search {
        let pattern = format!("%{needle}%");
        where_clause.push("(marketplace_order_id LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR customer_name LIKE ");
        where_clause.push_bind_unseparated(pattern.clone());
        where_clause.push_unseparated(" OR delivery_address LIKE ");
        where_clause.push_bind_unseparated(pattern);
        where_clause.push_unseparated(")");
    }
    if let Some(since) = query.since {
        where_clause.push("unixepoch(created_at) >= ");
        where_clause.push_bind_unseparated(since.timestamp());
    }
    if let Some(until) = query.until {
        where_clause.push("unixepoch(created_at) <= ");
        where_clause.push_bind_unseparated(until.timestamp());
    }
    if let Some(window) = query.exclude_stale_new {
        where_clause.push("NOT (status = 'new' AND unixepoch(created_at) < unixepoch('now') - ");
        where_clause.push_bind_unseparated(window.num_seconds());
        where_clause.push_unseparated(")");
    }
    builder.push(" ORDER BY created_at DESC, id DESC");
    if let Some(limit) = query.limit {
        builder.push(" LIMIT ");
        builder.push_bind(limit);
        if let Some(offset) = query.offset {
            builder.push(" OFFSET ");
            builder.push_bind(offset);
        }
    }

    trace!("📝️ Executing query: {}", builder.sql());
    let query = builder.build_query_as::<Order>();
    let orders = query.fetch_all(conn).await?;
    trace!("📝️ Result of search_orders: {:?}", orders.len());
    Ok(orders)
}

pub(crate) async fn update_status(
    id: i64,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, BackOfficeError> {
    let result: Option<Order> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = CURRENT_TIMESTAMP WHERE id = $2 RETURNING *")
            .bind(status)
            .bind(id)
            .fetch_optional(conn)
            .await?;
    result.ok_or_else(|| BackOfficeError::DatabaseError(format!("Order with internal id {id} disappeared mid-update")))
}

/// Non-terminal orders of one client/marketplace pair no older than `window_secs`. These are the
/// orders whose marketplace status is still worth re-polling; terminal and ancient ones are left
/// to the history view.
pub async fn fetch_open(
    client_id: i64,
    marketplace: Marketplace,
    window_secs: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<Order>, sqlx::Error> {
    let orders = sqlx::query_as(
        r#"
        SELECT * FROM orders
        WHERE client_id = $1
          AND marketplace = $2
          AND status IN ('new', 'in_assembly', 'shipped')
          AND unixepoch(created_at) > unixepoch('now') - $3
        ORDER BY created_at ASC
        "#,
    )
    .bind(client_id)
    .bind(marketplace)
    .bind(window_secs)
    .fetch_all(conn)
    .await?;
    Ok(orders)
}
