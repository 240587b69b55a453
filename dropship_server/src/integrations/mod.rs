//! Normalizers: raw marketplace payloads in, canonical `NewOrder`s out.
//!
//! Pure functions — no I/O, no side effects beyond logging. Anything a marketplace omits is
//! filled with the documented fallbacks; anything unusable (no order id, no items) is a
//! [`NormalizeError`] the import loop logs and skips, never a batch failure.
mod ozon;
pub mod status_rules;
mod wildberries;
mod yandex;

use chrono::{DateTime, Utc};
use dropship_engine::db_types::Marketplace;
use thiserror::Error;

pub use ozon::normalize_ozon_posting;
pub use wildberries::{assignment_candidates, normalize_wb_order, resolve_wb_status, WbEnrichment};
pub use yandex::normalize_ym_order;

pub const UNKNOWN_ADDRESS: &str = "Не указан";

#[derive(Debug, Clone, Error)]
pub enum NormalizeError {
    #[error("Raw {marketplace} payload has no usable order id")]
    MissingOrderId { marketplace: Marketplace },
    #[error("Raw {marketplace} order {order_id} has no items")]
    MissingItems { marketplace: Marketplace, order_id: String },
}

/// Parses a marketplace timestamp, falling back to "now" — better a slightly wrong import time
/// than a dropped order.
pub(crate) fn parse_timestamp(raw: Option<&str>) -> DateTime<Utc> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok()).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(Utc::now)
}

/// Picks the first extractor that produces a value. The ordered list makes the field-guessing
/// that marketplace payloads force on us auditable per field instead of implicit in conditionals.
pub(crate) fn first_of<R, T>(raw: &R, extractors: &[(&'static str, fn(&R) -> Option<T>)]) -> Option<(T, &'static str)> {
    extractors.iter().find_map(|(name, extract)| extract(raw).map(|v| (v, *name)))
}

pub(crate) use status_rules::{resolve_status, StatusSignals};
