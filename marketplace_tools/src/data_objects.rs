use dsb_common::Secret;
use serde::Deserialize;

/// Per-client marketplace credentials, deserialized from the `clients.api_keys` JSON blob.
/// A missing marketplace section simply means the client has not connected that marketplace.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ApiCredentials {
    #[serde(default)]
    pub wildberries: Option<WildberriesCredentials>,
    #[serde(default)]
    pub ozon: Option<OzonCredentials>,
    #[serde(default, alias = "yandexmarket")]
    pub yandex_market: Option<YandexMarketCredentials>,
}

impl ApiCredentials {
    pub fn parse(raw: &str) -> Result<Self, serde_json::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_json::from_str(raw)
    }

    pub fn is_empty(&self) -> bool {
        self.wildberries.is_none() && self.ozon.is_none() && self.yandex_market.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WildberriesCredentials {
    pub api_key: Secret<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OzonCredentials {
    pub api_key: Secret<String>,
    pub client_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct YandexMarketCredentials {
    #[serde(alias = "oauth_token")]
    pub api_key: Secret<String>,
    #[serde(default)]
    pub campaign_id: Option<i64>,
}

/// One recommended price to push upstream. Prices here live in the marketplace's listing-price
/// domain (roubles), not in ledger minor units.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub product_id: i64,
    pub price: f64,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parses_the_stored_credential_shape() {
        let raw = r#"{
            "wildberries": {"api_key": "wb-key"},
            "ozon": {"api_key": "ozon-key", "client_id": "12345"},
            "yandex_market": {"oauth_token": "ym-token", "campaign_id": 777}
        }"#;
        let creds = ApiCredentials::parse(raw).unwrap();
        assert_eq!(creds.wildberries.unwrap().api_key.reveal(), "wb-key");
        assert_eq!(creds.ozon.as_ref().unwrap().client_id, "12345");
        assert_eq!(creds.yandex_market.as_ref().unwrap().campaign_id, Some(777));
        // secrets never leak through Debug
        assert!(!format!("{:?}", ApiCredentials::parse(raw).unwrap()).contains("wb-key"));
    }

    #[test]
    fn empty_and_partial_blobs_are_fine() {
        assert!(ApiCredentials::parse("").unwrap().is_empty());
        assert!(ApiCredentials::parse("{}").unwrap().is_empty());
        let creds = ApiCredentials::parse(r#"{"wildberries": {"api_key": "k"}}"#).unwrap();
        assert!(!creds.is_empty());
        assert!(creds.ozon.is_none());
    }
}
