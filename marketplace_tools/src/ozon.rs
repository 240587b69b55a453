//! Ozon Seller API client (FBS posting list).
use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::*;
use reqwest::{
    header::{HeaderMap, HeaderValue, CONTENT_TYPE},
    Client,
};
use serde::{Deserialize, Serialize};

use crate::{config::MarketplaceConfig, data_objects::OzonCredentials, error::error_for_response, MarketplaceApiError};

#[derive(Clone)]
pub struct OzonApi {
    config: MarketplaceConfig,
    client: Arc<Client>,
}

impl OzonApi {
    pub fn new(credentials: &OzonCredentials, config: MarketplaceConfig) -> Result<Self, MarketplaceApiError> {
        let mut headers = HeaderMap::with_capacity(3);
        let key = HeaderValue::from_str(credentials.api_key.reveal().as_str())
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        let client_id = HeaderValue::from_str(credentials.client_id.as_str())
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        headers.insert("Api-Key", key);
        headers.insert("Client-Id", client_id);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout)
            .build()
            .map_err(|e| MarketplaceApiError::Initialization(e.to_string()))?;
        Ok(Self { config, client: Arc::new(client) })
    }

    /// FBS postings created in the given window (`POST /v3/posting/list`).
    pub async fn fetch_postings(
        &self,
        since: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<OzonPosting>, MarketplaceApiError> {
        let url = format!("{}/v3/posting/list", self.config.ozon_url);
        let body = serde_json::json!({
            "filter": { "since": since.to_rfc3339(), "to": to.to_rfc3339() },
            "limit": 100,
        });
        debug!("🛒️ Fetching Ozon postings since {since}");
        let response = self.config.retry.send(|| self.client.post(&url).json(&body)).await?;
        if !response.status().is_success() {
            return Err(error_for_response(response).await);
        }
        let envelope =
            response.json::<OzonPostingList>().await.map_err(|e| MarketplaceApiError::JsonError(e.to_string()))?;
        let postings = envelope.result.postings;
        debug!("🛒️ Ozon returned {} postings", postings.len());
        Ok(postings)
    }
}

#[derive(Debug, Default, Deserialize)]
struct OzonPostingList {
    #[serde(default)]
    result: OzonPostingResult,
}

#[derive(Debug, Default, Deserialize)]
struct OzonPostingResult {
    #[serde(default)]
    postings: Vec<OzonPosting>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OzonPosting {
    pub posting_number: Option<String>,
    pub order_id: Option<i64>,
    pub order_number: Option<String>,
    pub status: Option<String>,
    pub in_process_at: Option<String>,
    pub customer: Option<OzonCustomer>,
    pub delivery_method: Option<OzonDeliveryMethod>,
    pub products: Vec<OzonProduct>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OzonCustomer {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OzonDeliveryMethod {
    pub name: Option<String>,
    pub warehouse: Option<OzonWarehouse>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OzonWarehouse {
    pub address: Option<String>,
}

/// Prices arrive as decimal strings ("1990.0000"); they are converted to minor units by the
/// normalizer, never parsed through floats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OzonProduct {
    pub offer_id: Option<String>,
    pub name: Option<String>,
    pub quantity: Option<i64>,
    pub price: Option<String>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn posting_list_envelope_deserializes() {
        let raw = serde_json::json!({
            "result": {
                "postings": [{
                    "posting_number": "123-0001-1",
                    "order_id": 98765,
                    "status": "awaiting_packaging",
                    "in_process_at": "2026-07-01T09:30:00Z",
                    "delivery_method": {"name": "Ozon Логистика", "warehouse": {"address": "Тверь, склад 1"}},
                    "products": [{"offer_id": "ART-1", "name": "Кружка", "quantity": 2, "price": "499.0000"}]
                }]
            }
        });
        let list: OzonPostingList = serde_json::from_value(raw).unwrap();
        let posting = &list.result.postings[0];
        assert_eq!(posting.order_id, Some(98765));
        assert_eq!(posting.status.as_deref(), Some("awaiting_packaging"));
        assert_eq!(posting.products[0].price.as_deref(), Some("499.0000"));
    }
}
