//! Wildberries FBS assembly tasks → canonical orders.
use chrono::{Duration, Utc};
use dropship_engine::db_types::{
    CustomerInfo,
    Kopecks,
    Marketplace,
    NewOrder,
    Order,
    OrderItem,
    OrderKey,
    OrderStatusType,
    OrderType,
};
use log::trace;
use marketplace_tools::wildberries::{WbAssignmentStatus, WbOrderDetails, WbProductMeta, WbRawOrder};

use super::{first_of, parse_timestamp, resolve_status, NormalizeError, StatusSignals, UNKNOWN_ADDRESS};

/// Ordered id candidates. `gNumber`/`srid` come from the statistics feed, `id` from the
/// marketplace feed, `orderUid` from older payloads.
const ID_EXTRACTORS: &[(&'static str, fn(&WbRawOrder) -> Option<String>)] = &[
    ("gNumber", |r| r.g_number.clone().filter(|s| !s.is_empty())),
    ("srid", |r| r.srid.clone().filter(|s| !s.is_empty())),
    ("id", |r| r.id.map(|v| v.to_string())),
    ("orderUid", |r| r.order_uid.clone().filter(|s| !s.is_empty())),
];

/// Ordered total-amount candidates; all are integers in minor units.
const TOTAL_EXTRACTORS: &[(&'static str, fn(&WbRawOrder) -> Option<i64>)] = &[
    ("finalPrice", |r| r.final_price),
    ("salePrice", |r| r.sale_price),
    ("price", |r| r.price),
    ("finishedPrice", |r| r.finished_price),
];

/// Optional enrichment gathered from the auxiliary endpoints before normalizing.
#[derive(Debug, Clone, Default)]
pub struct WbEnrichment<'a> {
    pub assignment: Option<&'a WbAssignmentStatus>,
    pub details: Option<&'a WbOrderDetails>,
    pub meta: Option<&'a WbProductMeta>,
}

pub fn normalize_wb_order(
    raw: &WbRawOrder,
    enrichment: &WbEnrichment<'_>,
    client_id: i64,
    stale_after: Duration,
) -> Result<NewOrder, NormalizeError> {
    let (order_id, id_source) = first_of(raw, ID_EXTRACTORS)
        .ok_or(NormalizeError::MissingOrderId { marketplace: Marketplace::Wildberries })?;
    let total = first_of(raw, TOTAL_EXTRACTORS).map(|(v, _)| v).unwrap_or(0);
    let created_at = parse_timestamp(raw.created_at.as_deref().or(raw.date.as_deref()));

    let (status, rule) = resolve_wb_status(raw, enrichment.assignment, Utc::now() - created_at, stale_after);
    trace!("📦️ WB order {order_id} (id from {id_source}): status {status} via rule '{rule}'");

    let mut item = base_item(raw, Kopecks::from(total));
    if let Some(assignment) = enrichment.assignment {
        item.supplier_status = assignment.supplier_status.clone();
        item.marketplace_status = assignment.wb_status.clone();
    }
    if let Some(meta) = enrichment.meta {
        if let Some(article) = meta.supplier_article.clone().filter(|s| !s.is_empty()) {
            item.article = article;
        }
        item.subject = meta.subject.clone().or(item.subject);
        item.brand = meta.brand.clone().or(item.brand);
        item.name = item_name(item.subject.as_deref(), item.brand.as_deref());
    }
    // keep the assembly-task id with the line: the status re-poll needs it
    item.assignment_id = raw.id.map(|v| v.to_string());
    item.order_type = Some(classify_order_type(raw));

    let mut customer = CustomerInfo { name: "Клиент Wildberries".to_string(), ..Default::default() };
    let mut delivery_address = delivery_address(raw);
    if let Some(details) = enrichment.details {
        if let Some(client) = &details.client {
            let full_name = [client.last_name.as_deref(), client.first_name.as_deref()]
                .iter()
                .flatten()
                .copied()
                .collect::<Vec<_>>()
                .join(" ");
            if !full_name.is_empty() {
                customer.name = full_name;
            }
            customer.phone = client.phone.clone().unwrap_or_default();
            customer.email = client.email.clone().unwrap_or_default();
        }
        if let Some(address) = details.address.as_ref().and_then(|a| a.best()) {
            delivery_address = address.to_string();
        }
    }

    Ok(NewOrder {
        key: OrderKey::new(client_id, Marketplace::Wildberries, order_id),
        status,
        order_type: classify_order_type(raw),
        total_amount: Kopecks::from(total),
        customer,
        delivery_address,
        items: vec![item],
        created_at,
    })
}

/// Runs the decision table over a raw order and its assignment status.
pub fn resolve_wb_status(
    raw: &WbRawOrder,
    assignment: Option<&WbAssignmentStatus>,
    age: Duration,
    stale_after: Duration,
) -> (OrderStatusType, &'static str) {
    let signals = StatusSignals {
        cancel_flag: raw.is_cancel.unwrap_or(false),
        supplier_status: assignment.and_then(|a| a.supplier_status.as_deref()),
        marketplace_status: assignment.and_then(|a| a.wb_status.as_deref()),
        native_status: raw.status.as_deref(),
        age,
        stale_after,
    };
    resolve_status(&signals)
}

/// FBS/DBW/DBS classification: the explicit flag first, then the delivery-type string, then the
/// warehouse-description text, defaulting to FBS.
pub fn classify_order_type(raw: &WbRawOrder) -> OrderType {
    if let Some(is_fbs) = raw.is_fbs {
        return if is_fbs { OrderType::Fbs } else { OrderType::Dbw };
    }
    if let Some(delivery_type) = raw.delivery_type.as_deref() {
        match delivery_type {
            "fbs" => return OrderType::Fbs,
            "dbw" => return OrderType::Dbw,
            "dbs" => return OrderType::Dbs,
            _ => {},
        }
    }
    if let Some(warehouse) = raw.warehouse_type.as_deref() {
        if warehouse.contains("продавца") {
            return OrderType::Fbs;
        }
        if warehouse.contains("WB") {
            return OrderType::Dbw;
        }
    }
    OrderType::default()
}

fn base_item(raw: &WbRawOrder, total: Kopecks) -> OrderItem {
    let article = raw
        .supplier_article
        .clone()
        .or_else(|| raw.article.clone())
        .or_else(|| raw.nm_id.map(|v| v.to_string()))
        .unwrap_or_else(|| "unknown".to_string());
    OrderItem {
        article,
        name: item_name(raw.subject.as_deref(), raw.brand.as_deref()),
        quantity: 1,
        price: total,
        total_price: total,
        subject: raw.subject.clone(),
        brand: raw.brand.clone(),
        nm_id: raw.nm_id,
        chrt_id: raw.chrt_id,
        skus: raw.skus.clone(),
        ..Default::default()
    }
}

fn item_name(subject: Option<&str>, brand: Option<&str>) -> String {
    match (subject, brand) {
        (Some(subject), Some(brand)) => format!("{subject} ({brand})"),
        (Some(subject), None) => subject.to_string(),
        (None, Some(brand)) => brand.to_string(),
        (None, None) => "Товар".to_string(),
    }
}

/// Address priority: explicit address object, then the pickup-point office, then the region pair.
fn delivery_address(raw: &WbRawOrder) -> String {
    if let Some(address) = raw.address.as_ref().and_then(|a| a.best()) {
        return address.to_string();
    }
    if let Some(office) = raw.offices.as_ref().and_then(|o| o.first()).filter(|o| !o.is_empty()) {
        return format!("ПВЗ: {office}");
    }
    let region = [raw.region_name.as_deref(), raw.oblast_okrug_name.as_deref()]
        .iter()
        .flatten()
        .copied()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if region.is_empty() {
        UNKNOWN_ADDRESS.to_string()
    } else {
        region
    }
}

/// Ids worth re-polling for an open order: the stored assignment id when present, else the order
/// id itself — but only if it looks like a real numeric WB assembly-task id (old `gNumber` keys
/// and other non-numeric ids would only earn a rejection from the status endpoint).
pub fn assignment_candidates(order: &Order) -> Option<String> {
    let candidate = order
        .items
        .first()
        .and_then(|i| i.assignment_id.clone())
        .unwrap_or_else(|| order.order_id.as_str().to_string());
    candidate.parse::<i64>().ok().filter(|n| *n > 1_000_000_000).map(|n| n.to_string())
}

#[cfg(test)]
mod test {
    use super::*;

    fn raw() -> WbRawOrder {
        serde_json::from_value(serde_json::json!({
            "id": 1234567890123i64,
            "createdAt": "2026-07-01T10:00:00Z",
            "nmId": 555,
            "skus": ["4650000000001"],
            "salePrice": 129900,
            "subject": "Кружка",
            "brand": "Посуда+",
            "supplierArticle": "ART-1",
            "address": {"fullAddress": "Москва, ул. Ленина, 1"},
            "deliveryType": "fbs"
        }))
        .unwrap()
    }

    #[test]
    fn normalizes_the_common_fbs_shape() {
        let order = normalize_wb_order(&raw(), &WbEnrichment::default(), 7, Duration::days(3)).unwrap();
        assert_eq!(order.key.client_id, 7);
        assert_eq!(order.key.marketplace, Marketplace::Wildberries);
        assert_eq!(order.key.order_id.as_str(), "1234567890123");
        assert_eq!(order.total_amount, Kopecks::from(129900));
        assert_eq!(order.order_type, OrderType::Fbs);
        assert_eq!(order.delivery_address, "Москва, ул. Ленина, 1");
        let item = &order.items[0];
        assert_eq!(item.article, "ART-1");
        assert_eq!(item.name, "Кружка (Посуда+)");
        assert_eq!(item.assignment_id.as_deref(), Some("1234567890123"));
        assert_eq!(item.price.format_decimal(), "1299.00");
    }

    #[test]
    fn id_extractors_follow_priority_order() {
        let mut r = raw();
        r.g_number = Some("g-123".to_string());
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.key.order_id.as_str(), "g-123", "gNumber outranks id");

        r.g_number = None;
        r.id = None;
        r.order_uid = Some("uid-9".to_string());
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.key.order_id.as_str(), "uid-9");

        r.order_uid = None;
        let err = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap_err();
        assert!(matches!(err, NormalizeError::MissingOrderId { .. }));
    }

    #[test]
    fn cancellation_flag_outranks_assignment_status() {
        let mut r = raw();
        r.is_cancel = Some(true);
        let assignment: WbAssignmentStatus =
            serde_json::from_value(serde_json::json!({"id": 1, "supplierStatus": "confirm"})).unwrap();
        let enrichment = WbEnrichment { assignment: Some(&assignment), ..Default::default() };
        let order = normalize_wb_order(&r, &enrichment, 1, Duration::days(3)).unwrap();
        assert_eq!(order.status, OrderStatusType::Cancelled);
    }

    #[test]
    fn stale_unmatched_orders_are_presumed_delivered() {
        let mut r = raw();
        r.created_at = Some((Utc::now() - Duration::days(4)).to_rfc3339());
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.status, OrderStatusType::Delivered);

        // a fresh order with the same (absent) signals stays new
        r.created_at = Some(Utc::now().to_rfc3339());
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.status, OrderStatusType::New);
    }

    #[test]
    fn enrichment_fills_customer_and_statuses() {
        let assignment: WbAssignmentStatus = serde_json::from_value(
            serde_json::json!({"id": 1234567890123i64, "supplierStatus": "confirm", "wbStatus": "waiting"}),
        )
        .unwrap();
        let details: WbOrderDetails = serde_json::from_value(serde_json::json!({
            "id": 1234567890123i64,
            "client": {"firstName": "Анна", "lastName": "Иванова", "phone": "+79990001122"},
            "address": {"fullAddress": "Тверь, ул. Советская, 5"}
        }))
        .unwrap();
        let enrichment = WbEnrichment { assignment: Some(&assignment), details: Some(&details), meta: None };
        let order = normalize_wb_order(&raw(), &enrichment, 1, Duration::days(3)).unwrap();
        assert_eq!(order.status, OrderStatusType::InAssembly);
        assert_eq!(order.customer.name, "Иванова Анна");
        assert_eq!(order.customer.phone, "+79990001122");
        assert_eq!(order.delivery_address, "Тверь, ул. Советская, 5");
        assert_eq!(order.items[0].supplier_status.as_deref(), Some("confirm"));
        assert_eq!(order.items[0].marketplace_status.as_deref(), Some("waiting"));
    }

    #[test]
    fn order_type_classification_heuristics() {
        let mut r = raw();
        assert_eq!(classify_order_type(&r), OrderType::Fbs);
        r.delivery_type = Some("dbs".to_string());
        assert_eq!(classify_order_type(&r), OrderType::Dbs);
        r.delivery_type = None;
        r.warehouse_type = Some("Склад WB".to_string());
        assert_eq!(classify_order_type(&r), OrderType::Dbw);
        r.warehouse_type = Some("Склад продавца".to_string());
        assert_eq!(classify_order_type(&r), OrderType::Fbs);
        r.is_fbs = Some(false);
        assert_eq!(classify_order_type(&r), OrderType::Dbw, "the explicit flag wins");
        r.warehouse_type = None;
        r.is_fbs = None;
        assert_eq!(classify_order_type(&r), OrderType::Fbs, "default");
    }

    #[test]
    fn address_fallback_chain() {
        let mut r = raw();
        r.address = None;
        r.offices = Some(vec!["Москва, Арбат 1".to_string()]);
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.delivery_address, "ПВЗ: Москва, Арбат 1");

        r.offices = None;
        r.region_name = Some("Московская обл.".to_string());
        r.oblast_okrug_name = Some("ЦФО".to_string());
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.delivery_address, "Московская обл., ЦФО");

        r.region_name = None;
        r.oblast_okrug_name = None;
        let order = normalize_wb_order(&r, &WbEnrichment::default(), 1, Duration::days(3)).unwrap();
        assert_eq!(order.delivery_address, UNKNOWN_ADDRESS);
    }
}
