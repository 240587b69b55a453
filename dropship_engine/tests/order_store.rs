//! Idempotent-upsert and query-surface behaviour of the order store.
use chrono::{Duration, Utc};
use dropship_engine::{
    db_types::OrderStatusType,
    order_objects::OrderQueryFilter,
    BackOfficeDatabase,
    OrderManagement,
};

mod support;
use support::{item, new_test_db, seed_client, wb_order};

#[tokio::test]
async fn upsert_is_idempotent_and_reports_transitions() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let order = wb_order(client_id, "wb-1001", vec![item("ART-1", 1, 150_000)]);

    let first = db.upsert_order(order.clone()).await.unwrap();
    assert!(first.is_new);
    assert_eq!(first.previous_status, None);
    assert_eq!(first.order.status, OrderStatusType::New);

    let second = db.upsert_order(order).await.unwrap();
    assert!(!second.is_new);
    // no transition: the reported previous status equals the order's own status
    assert_eq!(second.previous_status, Some(second.order.status));
    assert_eq!(second.order.id, first.order.id);
    assert_eq!(second.order.created_at, first.order.created_at);

    let all = db.search_orders(OrderQueryFilter::history_view(client_id)).await.unwrap();
    assert_eq!(all.len(), 1, "exactly one row per identity triple");
}

#[tokio::test]
async fn upsert_replaces_mutable_fields_wholesale() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let mut order = wb_order(client_id, "wb-1002", vec![item("ART-1", 1, 150_000)]);
    let first = db.upsert_order(order.clone()).await.unwrap();

    order.items = vec![item("ART-1", 1, 150_000), item("ART-2", 2, 50_000)];
    order.delivery_address = "Санкт-Петербург, Невский пр., 10".to_string();
    order.status = OrderStatusType::Shipped;
    let second = db.upsert_order(order).await.unwrap();

    assert_eq!(second.previous_status, Some(OrderStatusType::New));
    assert_eq!(second.order.status, OrderStatusType::Shipped);
    assert_eq!(second.order.items.len(), 2, "items are replaced, not merged");
    assert_eq!(second.order.delivery_address, "Санкт-Петербург, Невский пр., 10");
    assert!(second.order.updated_at >= first.order.updated_at);
}

#[tokio::test]
async fn current_view_hides_stale_new_orders_history_does_not() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;

    let fresh = wb_order(client_id, "wb-fresh", vec![item("ART-1", 1, 100_000)]);
    let mut stale = wb_order(client_id, "wb-stale", vec![item("ART-2", 1, 100_000)]);
    stale.created_at = Utc::now() - Duration::days(3);
    db.upsert_order(fresh).await.unwrap();
    db.upsert_order(stale).await.unwrap();

    let current = db.search_orders(OrderQueryFilter::current_view(client_id)).await.unwrap();
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].order_id.as_str(), "wb-fresh");

    let history = db.search_orders(OrderQueryFilter::history_view(client_id)).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn search_filters_compose() {
    let db = new_test_db().await;
    let client_id = seed_client(&db, 1, "ООО Ромашка").await;
    let other_client = seed_client(&db, 2, "ИП Петров").await;

    db.upsert_order(wb_order(client_id, "wb-2001", vec![item("ART-1", 1, 100_000)])).await.unwrap();
    let mut shipped = wb_order(client_id, "wb-2002", vec![item("ART-2", 1, 100_000)]);
    shipped.status = OrderStatusType::Shipped;
    db.upsert_order(shipped).await.unwrap();
    db.upsert_order(wb_order(other_client, "wb-9001", vec![item("ART-1", 1, 100_000)])).await.unwrap();

    let shipped_only = db
        .search_orders(OrderQueryFilter::history_view(client_id).with_status(OrderStatusType::Shipped))
        .await
        .unwrap();
    assert_eq!(shipped_only.len(), 1);
    assert_eq!(shipped_only[0].order_id.as_str(), "wb-2002");

    let by_search = db
        .search_orders(OrderQueryFilter::history_view(client_id).with_search("2001"))
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);
    assert_eq!(by_search[0].order_id.as_str(), "wb-2001");

    let paged = db.search_orders(OrderQueryFilter::history_view(client_id).paged(1, 0)).await.unwrap();
    assert_eq!(paged.len(), 1);
}
