//! Yandex Market Partner API client (campaign orders).
use std::sync::Arc;

use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::{
    config::MarketplaceConfig,
    data_objects::YandexMarketCredentials,
    error::error_for_response,
    MarketplaceApiError,
};

#[derive(Clone)]
pub struct YandexMarketApi {
    config: MarketplaceConfig,
    campaign_id: Option<i64>,
    client: Arc<Client>,
}

impl YandexMarketApi {
    pub fn new(credentials: &YandexMarketCredentials, config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let mut headers = HeaderMap::with_capacity(1);
        let val = HeaderValue::from_str(&format!("OAuth {}", credentials.api_key.reveal()))
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        headers.insert(AUTHORIZATION, val);
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        Ok(Self { config, campaign_id: credentials.campaign_id, client: Arc::new(client) })
    }

    /// Orders currently in processing for the configured campaign.
    pub async fn fetch_orders(&self) -> Result<Vec<YmOrder>, MarketplaceApiError> {
        let campaign = self
            .campaign_id
            .ok_or_else(|| MarketplaceApiError::Initialization("Yandex Market campaign_id is not set".to_string()))?;
        let url = format!("{}/v2/campaigns/{campaign}/orders", self.config.yandex_url);
        debug!("🛒️ Fetching Yandex Market orders for campaign {campaign}");
        let response = self
            .config
            .retry
            .send(|| self.client.get(&url).query(&[("status", "PROCESSING"), ("limit", "100")]))
            .await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let envelope =
            response.json::<YmOrderList>().await.map_err(|e| MarketplaceApiError::JsonError(e.to_string()))?;
        debug!("🛒️ Yandex Market returned {} orders", envelope.orders.len());
        Ok(envelope.orders)
    }
}

#[derive(Debug, Default, Deserialize)]
struct YmOrderList {
    #[serde(default)]
    orders: Vec<YmOrder>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YmOrder {
    pub id: Option<i64>,
    pub status: Option<String>,
    pub substatus: Option<String>,
    pub creation_date: Option<String>,
    /// Total in roubles, as a decimal number in the JSON.
    pub total: Option<serde_json::Number>,
    pub buyer: Option<YmBuyer>,
    pub delivery: Option<YmDelivery>,
    pub items: Vec<YmItem>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YmBuyer {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YmDelivery {
    #[serde(rename = "type")]
    pub delivery_type: Option<String>,
    pub address: Option<YmAddress>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YmAddress {
    pub full_address: Option<String>,
    pub city: Option<String>,
    pub street: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct YmItem {
    pub offer_id: Option<String>,
    pub offer_name: Option<String>,
    pub count: Option<i64>,
    pub price: Option<serde_json::Number>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_envelope_deserializes() {
        let raw = serde_json::json!({
            "orders": [{
                "id": 555001,
                "status": "PROCESSING",
                "substatus": "STARTED",
                "creationDate": "2026-07-01T12:00:00+03:00",
                "total": 2598.5,
                "buyer": {"firstName": "Анна", "lastName": "Иванова", "phone": "+79990001122"},
                "delivery": {"type": "DELIVERY", "address": {"fullAddress": "СПб, Невский пр., 10"}},
                "items": [{"offerId": "ART-2", "offerName": "Чайник", "count": 1, "price": 2598.5}]
            }]
        });
        let list: YmOrderList = serde_json::from_value(raw).unwrap();
        let order = &list.orders[0];
        assert_eq!(order.id, Some(555001));
        assert_eq!(order.items[0].offer_id.as_deref(), Some("ART-2"));
        assert_eq!(order.total.as_ref().unwrap().to_string(), "2598.5");
    }
}
