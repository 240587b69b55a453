use std::time::Duration;

use log::*;

use crate::retry::RetryPolicy;

const DEFAULT_WB_MARKETPLACE_URL: &str = "https://marketplace-api.wildberries.ru";
const DEFAULT_WB_STATISTICS_URL: &str = "https://statistics-api.wildberries.ru";
const DEFAULT_OZON_URL: &str = "https://api-seller.ozon.ru";
const DEFAULT_YANDEX_URL: &str = "https://api.partner.market.yandex.ru";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Base URLs and transport settings shared by all marketplace clients. The URLs are overridable so
/// that tests can point a client at a local stub server.
#[derive(Debug, Clone)]
pub struct MarketplaceConfig {
    pub wb_marketplace_url: String,
    pub wb_statistics_url: String,
    pub ozon_url: String,
    pub yandex_url: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            wb_marketplace_url: DEFAULT_WB_MARKETPLACE_URL.to_string(),
            wb_statistics_url: DEFAULT_WB_STATISTICS_URL.to_string(),
            ozon_url: DEFAULT_OZON_URL.to_string(),
            yandex_url: DEFAULT_YANDEX_URL.to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            retry: RetryPolicy::default(),
        }
    }
}

impl MarketplaceConfig {
    pub fn new_from_env_or_default() -> Self {
        let defaults = Self::default();
        let timeout = std::env::var("DSB_HTTP_TIMEOUT_SECS")
            .ok()
            .and_then(|s| {
                s.parse::<u64>()
                    .map_err(|e| warn!("🪛️ DSB_HTTP_TIMEOUT_SECS is not a valid number of seconds ({e}). Using {DEFAULT_TIMEOUT_SECS}s."))
                    .ok()
            })
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);
        Self {
            wb_marketplace_url: env_or("DSB_WB_MARKETPLACE_URL", defaults.wb_marketplace_url),
            wb_statistics_url: env_or("DSB_WB_STATISTICS_URL", defaults.wb_statistics_url),
            ozon_url: env_or("DSB_OZON_URL", defaults.ozon_url),
            yandex_url: env_or("DSB_YANDEX_URL", defaults.yandex_url),
            timeout,
            retry: RetryPolicy::default(),
        }
    }
}

fn env_or(var: &str, default: String) -> String {
    std::env::var(var).ok().map(|s| s.trim_end_matches('/').to_string()).unwrap_or(default)
}
