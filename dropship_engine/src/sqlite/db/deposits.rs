use dsb_common::Kopecks;
use log::trace;
use sqlx::{QueryBuilder, SqliteConnection};

use crate::{
    db_types::{LedgerEntry, NewLedgerEntry},
    order_objects::LedgerQueryFilter,
    traits::LedgerError,
};

const DEFAULT_HISTORY_LIMIT: i64 = 100;

/// The client's current balance: `balance_after` of the latest completed entry, 0 when the client
/// has no entries yet. Ties on `created_at` are broken by the autoincrement id, so "latest" is
/// well-defined even for entries written in the same second.
pub async fn last_balance(client_id: i64, conn: &mut SqliteConnection) -> Result<Kopecks, LedgerError> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT balance_after FROM deposits WHERE client_id = $1 AND status = 'completed' ORDER BY id DESC LIMIT 1",
    )
    .bind(client_id)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| Kopecks::from(r.0)).unwrap_or_default())
}

/// The completed settlement entry carrying the given payment id, if one exists. This is the
/// exactly-once check for order debits.
pub async fn payment_entry(payment_id: &str, conn: &mut SqliteConnection) -> Result<Option<LedgerEntry>, LedgerError> {
    let entry = sqlx::query_as(
        "SELECT * FROM deposits WHERE payment_id = $1 AND status = 'completed' ORDER BY id DESC LIMIT 1",
    )
    .bind(payment_id)
    .fetch_optional(conn)
    .await?;
    Ok(entry)
}

/// Appends an entry, chaining `balance_before`/`balance_after` onto the current head.
///
/// Not atomic on its own: the caller must wrap the call in a transaction (pass `&mut *tx`) so the
/// balance read and the insert cannot interleave with a concurrent append for the same client.
pub async fn insert_entry(entry: NewLedgerEntry, conn: &mut SqliteConnection) -> Result<LedgerEntry, LedgerError> {
    let balance_before = last_balance(entry.client_id, &mut *conn).await?;
    let balance_after = balance_before + entry.amount;
    let row: LedgerEntry = sqlx::query_as(
        r#"
        INSERT INTO deposits (
            client_id,
            amount,
            balance_before,
            balance_after,
            transaction_type,
            description,
            payment_method,
            payment_id,
            status
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING *;
        "#,
    )
    .bind(entry.client_id)
    .bind(entry.amount)
    .bind(balance_before)
    .bind(balance_after)
    .bind(entry.transaction_type)
    .bind(entry.description)
    .bind(entry.payment_method)
    .bind(entry.payment_id)
    .bind(entry.status)
    .fetch_one(conn)
    .await?;
    trace!("💰️ Ledger entry #{} for client #{}: {} -> {}", row.id, row.client_id, row.balance_before, row.balance_after);
    Ok(row)
}

/// Entries for a client, newest first, capped at 100 unless the filter says otherwise.
pub async fn history(
    client_id: i64,
    query: LedgerQueryFilter,
    conn: &mut SqliteConnection,
) -> Result<Vec<LedgerEntry>, LedgerError> {
    let mut builder = QueryBuilder::new("SELECT * FROM deposits WHERE client_id = ");
    builder.push_bind(client_id);
    if let Some(transaction_type) = query.transaction_type {
        builder.push(" AND transaction_type = ");
        builder.push_bind(transaction_type);
    }
    if let Some(since) = query.since {
        builder.push(" AND unixepoch(created_at) >= ");
        builder.push_bind(since.timestamp());
    }
    if let Some(until) = query.until {
        builder.push(" AND unixepoch(created_at) <= ");
        builder.push_bind(until.timestamp());
    }
    builder.push(" ORDER BY id DESC LIMIT ");
    builder.push_bind(query.limit.unwrap_or(DEFAULT_HISTORY_LIMIT));
    trace!("💰️ Executing query: {}", builder.sql());
    let entries = builder.build_query_as::<LedgerEntry>().fetch_all(conn).await?;
    Ok(entries)
}
