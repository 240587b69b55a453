//! HTTP clients for the marketplaces the back office imports from.
//!
//! Everything in this crate is transport-level: fetching raw order, assignment and status payloads,
//! pushing prices, and dealing with each marketplace's quirks (envelope shapes, request-body id
//! encodings, rate limits). The raw vocabulary returned by a marketplace is passed through
//! untouched; mapping it onto the canonical order model is the normalizer's job, not ours.
mod config;
mod data_objects;
mod encoding;
mod error;
mod retry;

pub mod ozon;
pub mod wildberries;
pub mod yandex;

pub use config::MarketplaceConfig;
pub use data_objects::{ApiCredentials, OzonCredentials, PriceUpdate, WildberriesCredentials, YandexMarketCredentials};
pub use encoding::IdEncoding;
pub use error::MarketplaceApiError;
pub use retry::RetryPolicy;
