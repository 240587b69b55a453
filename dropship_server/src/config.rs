use std::{env, time::Duration as StdDuration};

use chrono::Duration;
use log::*;
use marketplace_tools::MarketplaceConfig;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_IMPORT_INTERVAL_SECS: u64 = 3600;
const DEFAULT_PRICING_INTERVAL_SECS: u64 = 3600;
const DEFAULT_OPEN_ORDER_WINDOW_DAYS: i64 = 30;
const DEFAULT_STALE_DELIVERED_DAYS: i64 = 3;
const DEFAULT_EVENT_BUFFER_SIZE: usize = 50;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// How often the import worker polls every client's marketplaces.
    pub import_interval: StdDuration,
    /// How often the pricing automation recomputes and pushes prices.
    pub pricing_interval: StdDuration,
    /// How far back open `new` orders are re-polled for status changes.
    pub open_order_window: Duration,
    /// An order older than this with no matched status and not cancelled is presumed delivered.
    pub stale_delivered_after: Duration,
    pub event_buffer_size: usize,
    pub marketplace: MarketplaceConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            database_url: String::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            import_interval: StdDuration::from_secs(DEFAULT_IMPORT_INTERVAL_SECS),
            pricing_interval: StdDuration::from_secs(DEFAULT_PRICING_INTERVAL_SECS),
            open_order_window: Duration::days(DEFAULT_OPEN_ORDER_WINDOW_DAYS),
            stale_delivered_after: Duration::days(DEFAULT_STALE_DELIVERED_DAYS),
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            marketplace: MarketplaceConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = env::var("DSB_DATABASE_URL").ok().unwrap_or_else(|| {
            error!("🪛️ DSB_DATABASE_URL is not set. Please set it to the URL for the back office database.");
            String::default()
        });
        let max_connections = parse_env_u64("DSB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS as u64) as u32;
        let import_interval =
            StdDuration::from_secs(parse_env_u64("DSB_IMPORT_INTERVAL_SECS", DEFAULT_IMPORT_INTERVAL_SECS));
        let pricing_interval =
            StdDuration::from_secs(parse_env_u64("DSB_PRICING_INTERVAL_SECS", DEFAULT_PRICING_INTERVAL_SECS));
        let open_order_window =
            Duration::days(parse_env_u64("DSB_OPEN_ORDER_WINDOW_DAYS", DEFAULT_OPEN_ORDER_WINDOW_DAYS as u64) as i64);
        let stale_delivered_after =
            Duration::days(parse_env_u64("DSB_STALE_DELIVERED_DAYS", DEFAULT_STALE_DELIVERED_DAYS as u64) as i64);
        Self {
            database_url,
            max_connections,
            import_interval,
            pricing_interval,
            open_order_window,
            stale_delivered_after,
            event_buffer_size: DEFAULT_EVENT_BUFFER_SIZE,
            marketplace: MarketplaceConfig::new_from_env_or_default(),
        }
    }
}

fn parse_env_u64(var: &str, default: u64) -> u64 {
    match env::var(var) {
        Ok(s) => s.parse::<u64>().unwrap_or_else(|e| {
            error!("🪛️ {s} is not a valid value for {var}. {e} Using the default, {default}, instead.");
            default
        }),
        Err(_) => default,
    }
}
