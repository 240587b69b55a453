use dsb_common::Kopecks;
use sqlx::SqliteConnection;

/// Purchase price of the client's own stock, looked up by barcode. First hit wins.
pub async fn warehouse_cost(
    client_id: i64,
    barcode: &str,
    conn: &mut SqliteConnection,
) -> Result<Option<Kopecks>, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT purchase_price FROM warehouse_items WHERE client_id = $1 AND barcode = $2 AND is_active = 1 LIMIT 1",
    )
    .bind(client_id)
    .bind(barcode)
    .fetch_optional(conn)
    .await?;
    Ok(row.map(|r| Kopecks::from(r.0)))
}

/// Purchase price from the supplier price list, looked up by article.
pub async fn price_list_cost(article: &str, conn: &mut SqliteConnection) -> Result<Option<Kopecks>, sqlx::Error> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT purchase_price FROM price_list WHERE article = $1 AND is_active = 1 LIMIT 1")
            .bind(article)
            .fetch_optional(conn)
            .await?;
    Ok(row.map(|r| Kopecks::from(r.0)))
}
