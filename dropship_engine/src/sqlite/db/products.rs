use log::trace;
use sqlx::SqliteConnection;

use crate::db_types::{Marketplace, NewPriceChange, PricingSettings, ProductSnapshot};

pub async fn fetch_settings(
    client_id: i64,
    marketplace: Marketplace,
    conn: &mut SqliteConnection,
) -> Result<Option<PricingSettings>, sqlx::Error> {
    let settings = sqlx::query_as(
        r#"
        SELECT
            id, client_id, marketplace, markup_percent, acquiring_percent, first_liter_logistics,
            additional_liter_logistics, warehouse_coeff_percent, shipment_handling,
            min_purchase_price, max_purchase_price, maintain_margin_in_promotions,
            auto_exit_promotions, fallback_cost_percent, purchase_estimate_percent
        FROM pricing_settings
        WHERE client_id = $1 AND marketplace = $2
        "#,
    )
    .bind(client_id)
    .bind(marketplace)
    .fetch_optional(conn)
    .await?;
    Ok(settings)
}

pub async fn fetch_active_products(
    client_id: i64,
    conn: &mut SqliteConnection,
) -> Result<Vec<ProductSnapshot>, sqlx::Error> {
    let products = sqlx::query_as(
        r#"
        SELECT
            id, client_id, external_id, article, name, current_price, purchase_price,
            commission_percent, length_cm, width_cm, height_cm, volume_liters, in_promotion,
            promotion_discount_percent, is_active
        FROM products_cache
        WHERE client_id = $1 AND is_active = 1
        ORDER BY last_updated DESC
        "#,
    )
    .bind(client_id)
    .fetch_all(conn)
    .await?;
    Ok(products)
}

pub async fn update_cached_price(
    client_id: i64,
    external_id: i64,
    new_price: f64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE products_cache SET current_price = $1, last_updated = CURRENT_TIMESTAMP WHERE client_id = $2 AND external_id = $3",
    )
    .bind(new_price)
    .bind(client_id)
    .bind(external_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn set_promotion_state(
    client_id: i64,
    external_id: i64,
    in_promotion: bool,
    discount_percent: f64,
    conn: &mut SqliteConnection,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        UPDATE products_cache
        SET in_promotion = $1, promotion_discount_percent = $2, last_updated = CURRENT_TIMESTAMP
        WHERE client_id = $3 AND external_id = $4
        "#,
    )
    .bind(in_promotion)
    .bind(discount_percent)
    .bind(client_id)
    .bind(external_id)
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn insert_price_change(record: NewPriceChange, conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    trace!("🧮️ Recording price change for product {} of client #{}", record.external_id, record.client_id);
    sqlx::query(
        r#"
        INSERT INTO pricing_history (
            client_id, external_id, article, old_price, new_price, calculated_price,
            margin_percent, logistics_cost, commission_percent, change_reason, change_source
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(record.client_id)
    .bind(record.external_id)
    .bind(record.article)
    .bind(record.old_price)
    .bind(record.new_price)
    .bind(record.calculated_price)
    .bind(record.margin_percent)
    .bind(record.logistics_cost)
    .bind(record.commission_percent)
    .bind(record.change_reason)
    .bind(record.change_source)
    .execute(conn)
    .await?;
    Ok(())
}
