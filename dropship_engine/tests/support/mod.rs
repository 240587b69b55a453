//! Shared scaffolding for the engine integration tests: a throwaway migrated database per test
//! and seed helpers for the tables the settlement flow reads.
#![allow(dead_code)] // each test binary uses its own subset of these helpers
use chrono::Utc;
use dropship_engine::{
    db_types::{CustomerInfo, Kopecks, Marketplace, NewOrder, OrderItem, OrderKey, OrderStatusType, OrderType},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    SqliteDatabase,
};

pub async fn new_test_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

pub async fn seed_client(db: &SqliteDatabase, user_id: i64, name: &str) -> i64 {
    let row: (i64,) = sqlx::query_as("INSERT INTO clients (user_id, name) VALUES ($1, $2) RETURNING id")
        .bind(user_id)
        .bind(name)
        .fetch_one(db.pool())
        .await
        .expect("Error seeding client");
    row.0
}

pub async fn seed_warehouse_item(db: &SqliteDatabase, client_id: i64, barcode: &str, purchase_price: i64) {
    sqlx::query(
        "INSERT INTO warehouse_items (client_id, barcode, article, purchase_price, quantity) VALUES ($1, $2, $3, $4, 10)",
    )
    .bind(client_id)
    .bind(barcode)
    .bind(format!("wh-{barcode}"))
    .bind(purchase_price)
    .execute(db.pool())
    .await
    .expect("Error seeding warehouse item");
}

pub async fn seed_price_list(db: &SqliteDatabase, article: &str, purchase_price: i64) {
    sqlx::query("INSERT INTO price_list (article, purchase_price) VALUES ($1, $2)")
        .bind(article)
        .bind(purchase_price)
        .execute(db.pool())
        .await
        .expect("Error seeding price list");
}

pub fn item(article: &str, quantity: i64, unit_price: i64) -> OrderItem {
    OrderItem {
        article: article.to_string(),
        name: format!("Товар {article}"),
        quantity,
        price: Kopecks::from(unit_price),
        total_price: Kopecks::from(unit_price * quantity),
        ..Default::default()
    }
}

pub fn wb_order(client_id: i64, order_id: &str, items: Vec<OrderItem>) -> NewOrder {
    let total_amount = items.iter().map(|i| i.total_price).sum();
    NewOrder {
        key: OrderKey::new(client_id, Marketplace::Wildberries, order_id),
        status: OrderStatusType::New,
        order_type: OrderType::Fbs,
        total_amount,
        customer: CustomerInfo { name: "Клиент Wildberries".to_string(), ..Default::default() },
        delivery_address: "Москва, ул. Ленина, 1".to_string(),
        items,
        created_at: Utc::now(),
    }
}
