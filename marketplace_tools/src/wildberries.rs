//! Wildberries Marketplace API client (FBS assembly tasks, statuses, client details, prices).
//!
//! The marketplace endpoints return raw seller vocabulary (`supplierStatus` / `wbStatus`); nothing
//! here interprets it. Envelope shapes vary between deployments (`[..]`, `{"orders": [..]}`,
//! `{"data": [..]}`), so list responses go through [`order_array`] rather than a fixed struct.
use std::{collections::HashMap, sync::Arc};

use chrono::NaiveDate;
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::MarketplaceConfig,
    data_objects::{PriceUpdate, WildberriesCredentials},
    encoding::{encode_order_ids, is_body_rejection, unique_ids, IdEncoding, CLIENT_INFO_ENCODINGS, STATUS_ENCODINGS},
    error::{error_for_response, error_for_status},
    MarketplaceApiError,
};

#[derive(Clone)]
pub struct WildberriesApi {
    config: MarketplaceConfig,
    client: Arc<Client>,
}

impl WildberriesApi {
    pub fn new(credentials: &WildberriesCredentials, config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let mut headers = HeaderMap::with_capacity(2);
        let val = HeaderValue::from_str(credentials.api_key.reveal().as_str())
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// New FBS assembly tasks from `GET /api/v3/orders/new`.
    pub async fn fetch_new_orders(&self) -> Result<Vec<WbRawOrder>, MarketplaceApiError> {
        let url = format!("{}/api/v3/orders/new", self.config.wb_marketplace_url);
        debug!("🛒️ Fetching new Wildberries assembly tasks");
        let response = self.config.retry.send(|| self.client.get(&url)).await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let value = response.json::<Value>().await.map_err(|e| MarketplaceApiError::JsonError(e.to_string()))?;
        let orders = deserialize_each::<WbRawOrder>(order_array(&value), "orders/new");
        debug!("🛒️ Wildberries returned {} new assembly tasks", orders.len());
        Ok(orders)
    }

    /// Seller- and customer-facing statuses for the given assembly task ids
    /// (`POST /api/v3/orders/status`).
    pub async fn fetch_statuses(&self, ids: &[String]) -> Result<Vec<WbAssignmentStatus>, MarketplaceApiError> {
        let ids = unique_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/v3/orders/status", self.config.wb_marketplace_url);
        debug!("🛒️ Fetching Wildberries statuses for {} assembly tasks", ids.len());
        let value = self.post_with_encodings(&url, &ids, &STATUS_ENCODINGS).await?;
        Ok(deserialize_each::<WbAssignmentStatus>(order_array(&value), "orders/status"))
    }

    /// Customer name/phone/address enrichment for the given assembly task ids
    /// (`POST /api/v3/orders/client`). Not every token is allowed to see this data, so callers
    /// treat failures as missing enrichment, not as a fatal error.
    pub async fn fetch_order_details(&self, ids: &[String]) -> Result<Vec<WbOrderDetails>, MarketplaceApiError> {
        let ids = unique_ids(ids);
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/v3/orders/client", self.config.wb_marketplace_url);
        debug!("🛒️ Fetching Wildberries client details for {} assembly tasks", ids.len());
        let value = self.post_with_encodings(&url, &ids, &CLIENT_INFO_ENCODINGS).await?;
        Ok(deserialize_each::<WbOrderDetails>(order_array(&value), "orders/client"))
    }

    /// Product subject/brand/article metadata from the statistics API, keyed by `nmId`.
    ///
    /// The statistics token class differs from the marketplace one and the data is pure
    /// enrichment, so any failure here degrades to an empty map.
    pub async fn fetch_product_meta(
        &self,
        nm_ids: &[i64],
        date_from: NaiveDate,
        date_to: NaiveDate,
    ) -> HashMap<i64, WbProductMeta> {
        let mut meta = HashMap::new();
        if nm_ids.is_empty() {
            return meta;
        }
        let url = format!("{}/api/v1/supplier/orders", self.config.wb_statistics_url);
        let from = date_from.format("%Y-%m-%d").to_string();
        let to = date_to.format("%Y-%m-%d").to_string();
        let result = self
            .config
            .retry
            .send(|| self.client.get(&url).query(&[("dateFrom", from.as_str()), ("dateTo", to.as_str())]))
            .await;
        let response = match result {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                debug!("🛒️ Statistics API meta lookup failed with {}. Continuing without enrichment.", r.status());
                return meta;
            },
            Err(e) => {
                debug!("🛒️ Statistics API meta lookup failed ({e}). Continuing without enrichment.");
                return meta;
            },
        };
        let value = match response.json::<Value>().await {
            Ok(v) => v,
            Err(e) => {
                debug!("🛒️ Statistics API meta payload unreadable ({e}). Continuing without enrichment.");
                return meta;
            },
        };
        for row in deserialize_each::<WbProductMeta>(order_array(&value), "supplier/orders") {
            let Some(nm_id) = row.nm_id else { continue };
            if nm_ids.contains(&nm_id) {
                meta.entry(nm_id).or_insert(row);
            }
        }
        debug!("🛒️ Resolved product meta for {} of {} nm ids", meta.len(), nm_ids.len());
        meta
    }

    /// Pushes recommended listing prices upstream.
    pub async fn push_prices(&self, updates: &[PriceUpdate]) -> Result<(), MarketplaceApiError> {
        if updates.is_empty() {
            return Ok(());
        }
        let url = format!("{}/api/v1/cards/update", self.config.wb_marketplace_url);
        let cards: Vec<Value> =
            updates.iter().map(|u| serde_json::json!({ "nmId": u.product_id, "price": u.price })).collect();
        let body = serde_json::json!({ "cards": cards });
        debug!("🛒️ Pushing {} price updates to Wildberries", updates.len());
        let response = self.config.retry.send(|| self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        info!("🛒️ Pushed {} price updates to Wildberries", updates.len());
        Ok(())
    }

    /// Withdraws a product from its current promotion.
    pub async fn exit_promotion(&self, nm_id: i64) -> Result<(), MarketplaceApiError> {
        let url = format!("{}/api/v1/promotion/exit", self.config.wb_marketplace_url);
        let body = serde_json::json!({ "nmId": nm_id });
        debug!("🛒️ Exiting promotion for product {nm_id}");
        let response = self.config.retry.send(|| self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        info!("🛒️ Product {nm_id} withdrawn from promotion");
        Ok(())
    }

    /// POSTs the id list, walking the encoding ladder: a body-shape rejection advances to the next
    /// encoding, anything else propagates.
    async fn post_with_encodings(
        &self,
        url: &str,
        ids: &[String],
        ladder: &[IdEncoding],
    ) -> Result<Value, MarketplaceApiError> {
        let mut last_rejection = String::new();
        for encoding in ladder {
            let body = encode_order_ids(ids, *encoding);
            let response = self.config.retry.send(|| self.client.post(url).json(&body)).await?;
            let status = response.status();
            if status.is_success() {
                return response.json::<Value>().await.map_err(|e| MarketplaceApiError::JsonError(e.to_string()));
            }
            let text = response.text().await.unwrap_or_default();
            if is_body_rejection(status.as_u16(), &text) {
                debug!("🛒️ {url} rejected the {encoding:?} id encoding, trying the next one");
                last_rejection = text;
                continue;
            }
            return Err(error_for_status(status.as_u16(), text));
        }
        Err(MarketplaceApiError::RequestRejected(last_rejection))
    }
}

/// Finds the payload list regardless of envelope: a bare array, `{"orders": [..]}` or
/// `{"data": [..]}`.
fn order_array(value: &Value) -> &[Value] {
    if let Some(arr) = value.as_array() {
        return arr;
    }
    for key in ["orders", "data"] {
        if let Some(arr) = value[key].as_array() {
            return arr;
        }
    }
    &[]
}

/// Deserializes elements one by one so a single malformed row degrades to a logged skip instead of
/// sinking the whole batch.
fn deserialize_each<T: serde::de::DeserializeOwned>(rows: &[Value], context: &str) -> Vec<T> {
    rows.iter()
        .filter_map(|row| match serde_json::from_value::<T>(row.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!("🛒️ Skipping malformed {context} payload element: {e}");
                None
            },
        })
        .collect()
}

//--------------------------------------   Raw payload types   -------------------------------------------------------

/// One raw FBS assembly task as returned by `orders/new`. Every field is optional; which ones are
/// present depends on delivery type and API vintage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbRawOrder {
    pub id: Option<i64>,
    pub g_number: Option<String>,
    pub srid: Option<String>,
    pub order_uid: Option<String>,
    pub rid: Option<String>,
    pub created_at: Option<String>,
    pub date: Option<String>,
    pub nm_id: Option<i64>,
    pub chrt_id: Option<i64>,
    pub skus: Option<Vec<String>>,
    pub sale_price: Option<i64>,
    pub price: Option<i64>,
    pub converted_price: Option<i64>,
    pub final_price: Option<i64>,
    pub finished_price: Option<i64>,
    pub subject: Option<String>,
    pub brand: Option<String>,
    pub supplier_article: Option<String>,
    pub article: Option<String>,
    pub address: Option<WbAddress>,
    pub offices: Option<Vec<String>>,
    pub region_name: Option<String>,
    pub oblast_okrug_name: Option<String>,
    pub is_cancel: Option<bool>,
    pub status: Option<String>,
    pub delivery_type: Option<String>,
    pub warehouse_type: Option<String>,
    #[serde(rename = "isFBS")]
    pub is_fbs: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbAddress {
    pub full_address: Option<String>,
    pub address: Option<String>,
}

impl WbAddress {
    pub fn best(&self) -> Option<&str> {
        self.full_address.as_deref().or(self.address.as_deref()).filter(|s| !s.is_empty())
    }
}

/// Dual-field status record from `orders/status`: `supplier_status` is the seller-facing
/// assembly-task lifecycle, `wb_status` the customer-facing one.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbAssignmentStatus {
    pub id: Option<i64>,
    pub supplier_status: Option<String>,
    pub wb_status: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbOrderDetails {
    pub id: Option<i64>,
    pub client: Option<WbClientInfo>,
    pub address: Option<WbAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbClientInfo {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WbProductMeta {
    pub nm_id: Option<i64>,
    pub subject: Option<String>,
    pub brand: Option<String>,
    pub supplier_article: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_array_handles_every_envelope() {
        let bare: Value = serde_json::json!([{"id": 1}]);
        assert_eq!(order_array(&bare).len(), 1);
        let wrapped: Value = serde_json::json!({"orders": [{"id": 1}, {"id": 2}]});
        assert_eq!(order_array(&wrapped).len(), 2);
        let data: Value = serde_json::json!({"data": [{"id": 1}]});
        assert_eq!(order_array(&data).len(), 1);
        let none: Value = serde_json::json!({"next": 0});
        assert!(order_array(&none).is_empty());
    }

    #[test]
    fn malformed_rows_are_skipped_not_fatal() {
        let rows = vec![
            serde_json::json!({"id": 42, "supplierStatus": "confirm", "wbStatus": "waiting"}),
            serde_json::json!("not an object"),
            serde_json::json!({"id": 43}),
        ];
        let parsed = deserialize_each::<WbAssignmentStatus>(&rows, "test");
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].supplier_status.as_deref(), Some("confirm"));
        assert_eq!(parsed[1].id, Some(43));
    }

    #[test]
    fn raw_order_deserializes_the_fbs_shape() {
        let raw = serde_json::json!({
            "id": 1234567890123i64,
            "orderUid": "uid-1",
            "rid": "rid-1",
            "createdAt": "2026-07-01T10:00:00Z",
            "nmId": 555, "chrtId": 777,
            "skus": ["4650000000001"],
            "salePrice": 129900, "convertedPrice": 129900,
            "address": {"fullAddress": "Москва, ул. Ленина, 1"},
            "deliveryType": "fbs",
            "isCancel": false
        });
        let order: WbRawOrder = serde_json::from_value(raw).unwrap();
        assert_eq!(order.id, Some(1234567890123));
        assert_eq!(order.nm_id, Some(555));
        assert_eq!(order.sale_price, Some(129900));
        assert_eq!(order.address.unwrap().best(), Some("Москва, ул. Ленина, 1"));
        assert_eq!(order.delivery_type.as_deref(), Some("fbs"));
    }
}
