use dsb_common::Kopecks;
use sqlx::SqliteConnection;

/// Records a processed product return for audit. The matching ledger credit is written by the
/// caller inside the same transaction.
pub async fn insert_return(
    order_id: i64,
    article: &str,
    quantity: i64,
    reason: &str,
    refund: Kopecks,
    conn: &mut SqliteConnection,
) -> Result<i64, sqlx::Error> {
    let row: (i64,) = sqlx::query_as(
        r#"
        INSERT INTO product_returns (order_id, article, quantity, return_reason, refund_amount)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id;
        "#,
    )
    .bind(order_id)
    .bind(article)
    .bind(quantity)
    .bind(reason)
    .bind(refund)
    .fetch_one(conn)
    .await?;
    Ok(row.0)
}
