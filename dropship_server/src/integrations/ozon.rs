//! Ozon FBS postings → canonical orders.
use chrono::{Duration, Utc};
use dropship_engine::db_types::{
    CustomerInfo,
    Kopecks,
    Marketplace,
    NewOrder,
    OrderItem,
    OrderKey,
    OrderType,
};
use log::trace;
use marketplace_tools::ozon::OzonPosting;

use super::{parse_timestamp, resolve_status, NormalizeError, StatusSignals, UNKNOWN_ADDRESS};

pub fn normalize_ozon_posting(
    posting: &OzonPosting,
    client_id: i64,
    stale_after: Duration,
) -> Result<NewOrder, NormalizeError> {
    let order_id = posting
        .posting_number
        .clone()
        .filter(|s| !s.is_empty())
        .or_else(|| posting.order_id.map(|v| v.to_string()))
        .or_else(|| posting.order_number.clone().filter(|s| !s.is_empty()))
        .ok_or(NormalizeError::MissingOrderId { marketplace: Marketplace::Ozon })?;

    let items: Vec<OrderItem> = posting
        .products
        .iter()
        .map(|product| {
            let quantity = product.quantity.unwrap_or(1).max(1);
            // prices arrive as decimal strings; parsed by digit manipulation, not floats
            let price = product.price.as_deref().and_then(Kopecks::parse_decimal).unwrap_or_default();
            OrderItem {
                article: product.offer_id.clone().unwrap_or_else(|| "unknown".to_string()),
                name: product.name.clone().unwrap_or_else(|| "Товар".to_string()),
                quantity,
                price,
                total_price: price * quantity,
                order_type: Some(OrderType::Fbs),
                ..Default::default()
            }
        })
        .collect();
    if items.is_empty() {
        return Err(NormalizeError::MissingItems { marketplace: Marketplace::Ozon, order_id });
    }
    let total_amount = items.iter().map(|i| i.total_price).sum();

    let created_at = parse_timestamp(posting.in_process_at.as_deref());
    let signals = StatusSignals {
        native_status: posting.status.as_deref(),
        age: Utc::now() - created_at,
        stale_after,
        ..Default::default()
    };
    let (status, rule) = resolve_status(&signals);
    trace!("📦️ Ozon posting {order_id}: status {status} via rule '{rule}'");

    let customer = posting
        .customer
        .as_ref()
        .map(|c| CustomerInfo {
            name: c.name.clone().unwrap_or_else(|| "Клиент Ozon".to_string()),
            phone: c.phone.clone().unwrap_or_default(),
            email: c.email.clone().unwrap_or_default(),
        })
        .unwrap_or_else(|| CustomerInfo { name: "Клиент Ozon".to_string(), ..Default::default() });
    let delivery_address = posting
        .delivery_method
        .as_ref()
        .and_then(|d| d.warehouse.as_ref())
        .and_then(|w| w.address.clone())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    Ok(NewOrder {
        key: OrderKey::new(client_id, Marketplace::Ozon, order_id),
        status,
        order_type: OrderType::Fbs,
        total_amount,
        customer,
        delivery_address,
        items,
        created_at,
    })
}

#[cfg(test)]
mod test {
    use dropship_engine::db_types::OrderStatusType;

    use super::*;

    fn posting() -> OzonPosting {
        serde_json::from_value(serde_json::json!({
            "posting_number": "123-0001-1",
            "order_id": 98765,
            "status": "awaiting_packaging",
            "in_process_at": Utc::now().to_rfc3339(),
            "delivery_method": {"warehouse": {"address": "Тверь, склад 1"}},
            "products": [
                {"offer_id": "ART-1", "name": "Кружка", "quantity": 2, "price": "499.0000"},
                {"offer_id": "ART-2", "name": "Чайник", "quantity": 1, "price": "1990.50"}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_postings_with_exact_money() {
        let order = normalize_ozon_posting(&posting(), 3, Duration::days(3)).unwrap();
        assert_eq!(order.key.order_id.as_str(), "123-0001-1");
        assert_eq!(order.status, OrderStatusType::New);
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.items[0].total_price, Kopecks::from(99_800));
        assert_eq!(order.items[1].total_price, Kopecks::from(199_050));
        assert_eq!(order.total_amount.format_decimal(), "2988.50");
        assert_eq!(order.delivery_address, "Тверь, склад 1");
    }

    #[test]
    fn posting_number_outranks_order_id() {
        let mut p = posting();
        let order = normalize_ozon_posting(&p, 3, Duration::days(3)).unwrap();
        assert_eq!(order.key.order_id.as_str(), "123-0001-1");
        p.posting_number = None;
        let order = normalize_ozon_posting(&p, 3, Duration::days(3)).unwrap();
        assert_eq!(order.key.order_id.as_str(), "98765");
    }

    #[test]
    fn postings_without_products_are_rejected() {
        let mut p = posting();
        p.products.clear();
        let err = normalize_ozon_posting(&p, 3, Duration::days(3)).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingItems { .. }), "{err}");
    }

    #[test]
    fn posting_statuses_map_onto_the_canonical_machine() {
        for (native, expected) in [
            ("awaiting_packaging", OrderStatusType::New),
            ("awaiting_deliver", OrderStatusType::InAssembly),
            ("delivering", OrderStatusType::Shipped),
            ("delivered", OrderStatusType::Delivered),
            ("cancelled", OrderStatusType::Cancelled),
        ] {
            let mut p = posting();
            p.status = Some(native.to_string());
            let order = normalize_ozon_posting(&p, 3, Duration::days(3)).unwrap();
            assert_eq!(order.status, expected, "posting status {native}");
        }
    }
}
