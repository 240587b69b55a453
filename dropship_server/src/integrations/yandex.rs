//! Yandex Market campaign orders → canonical orders.
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
use marketplace_tools::yandex::YmOrder;

use super::{parse_timestamp, resolve_status, NormalizeError, StatusSignals, UNKNOWN_ADDRESS};

pub fn normalize_ym_order(raw: &YmOrder, client_id: i64, stale_after: Duration) -> Result<NewOrder, NormalizeError> {
    let order_id = raw
        .id
        .map(|v| v.to_string())
        .ok_or(NormalizeError::MissingOrderId { marketplace: Marketplace::YandexMarket })?;

    let items: Vec<OrderItem> = raw
        .items
        .iter()
        .map(|item| {
            let quantity = item.count.unwrap_or(1).max(1);
            let price =
                item.price.as_ref().and_then(|n| Kopecks::parse_decimal(&n.to_string())).unwrap_or_default();
            OrderItem {
                article: item.offer_id.clone().unwrap_or_else(|| "unknown".to_string()),
                name: item.offer_name.clone().unwrap_or_else(|| "Товар".to_string()),
                quantity,
                price,
                total_price: price * quantity,
                ..Default::default()
            }
        })
        .collect();
    if items.is_empty() {
        return Err(NormalizeError::MissingItems { marketplace: Marketplace::YandexMarket, order_id });
    }
    // the order-level total includes delivery; prefer it when present
    let total_amount = raw
        .total
        .as_ref()
        .and_then(|n| Kopecks::parse_decimal(&n.to_string()))
        .unwrap_or_else(|| items.iter().map(|i| i.total_price).sum());

    let created_at = parse_timestamp(raw.creation_date.as_deref());
    let signals = StatusSignals {
        native_status: raw.status.as_deref(),
        age: Utc::now() - created_at,
        stale_after,
        ..Default::default()
    };
    let (status, rule) = resolve_status(&signals);
    trace!("📦️ YM order {order_id}: status {status} via rule '{rule}'");

    let customer = raw
        .buyer
        .as_ref()
        .map(|b| {
            let name = [b.last_name.as_deref(), b.first_name.as_deref()]
                .iter()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            CustomerInfo {
                name: if name.is_empty() { "Клиент Яндекс Маркет".to_string() } else { name },
                phone: b.phone.clone().unwrap_or_default(),
                email: b.email.clone().unwrap_or_default(),
            }
        })
        .unwrap_or_else(|| CustomerInfo { name: "Клиент Яндекс Маркет".to_string(), ..Default::default() });

    let delivery_address = raw
        .delivery
        .as_ref()
        .and_then(|d| d.address.as_ref())
        .and_then(|a| {
            a.full_address.clone().filter(|s| !s.is_empty()).or_else(|| {
                let composite = [a.city.as_deref(), a.street.as_deref()]
                    .iter()
                    .flatten()
                    .copied()
                    .filter(|s| !s.is_empty())
                    .collect::<Vec<_>>()
                    .join(", ");
                (!composite.is_empty()).then_some(composite)
            })
        })
        .unwrap_or_else(|| UNKNOWN_ADDRESS.to_string());

    Ok(NewOrder {
        key: OrderKey::new(client_id, Marketplace::YandexMarket, order_id),
        status,
        order_type: OrderType::Dbs,
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

    fn raw() -> YmOrder {
        serde_json::from_value(serde_json::json!({
            "id": 555001,
            "status": "PROCESSING",
            "creationDate": Utc::now().to_rfc3339(),
            "total": 2598.5,
            "buyer": {"firstName": "Анна", "lastName": "Иванова", "phone": "+79990001122"},
            "delivery": {"type": "DELIVERY", "address": {"fullAddress": "СПб, Невский пр., 10"}},
            "items": [{"offerId": "ART-2", "offerName": "Чайник", "count": 1, "price": 2598.5}]
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_campaign_orders() {
        let order = normalize_ym_order(&raw(), 5, Duration::days(3)).unwrap();
        assert_eq!(order.key.marketplace, Marketplace::YandexMarket);
        assert_eq!(order.key.order_id.as_str(), "555001");
        assert_eq!(order.status, OrderStatusType::New);
        assert_eq!(order.total_amount, Kopecks::from(259_850));
        assert_eq!(order.customer.name, "Иванова Анна");
        assert_eq!(order.delivery_address, "СПб, Невский пр., 10");
        assert_eq!(order.items[0].price.format_decimal(), "2598.50");
    }

    #[test]
    fn missing_id_is_rejected_missing_total_falls_back_to_items() {
        let mut r = raw();
        r.total = None;
        let order = normalize_ym_order(&r, 5, Duration::days(3)).unwrap();
        assert_eq!(order.total_amount, Kopecks::from(259_850), "summed from items");

        r.id = None;
        let err = normalize_ym_order(&r, 5, Duration::days(3)).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingOrderId { .. }), "{err}");
    }

    #[test]
    fn delivered_and_cancelled_statuses_map_terminally() {
        let mut r = raw();
        r.status = Some("DELIVERED".to_string());
        assert_eq!(normalize_ym_order(&r, 5, Duration::days(3)).unwrap().status, OrderStatusType::Delivered);
        r.status = Some("CANCELLED".to_string());
        assert_eq!(normalize_ym_order(&r, 5, Duration::days(3)).unwrap().status, OrderStatusType::Cancelled);
    }
}
