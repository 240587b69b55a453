//! Purchase-cost resolution for settlement.
//!
//! Per item, in order: the client's own warehouse stock by barcode, then the supplier price list
//! by article, then a deterministic estimate at a configurable percentage of the sale price. The
//! estimate is a degraded-confidence guess and is logged as such; the breakdown records the
//! source of every line so a settlement can always be audited.
use std::fmt::Display;

use dsb_common::Kopecks;
use log::warn;

use crate::{db_types::OrderItem, traits::{BackOfficeDatabase, BackOfficeError}};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CostSource {
    Warehouse,
    PriceList,
    Estimated,
}

impl Display for CostSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CostSource::Warehouse => write!(f, "warehouse"),
            CostSource::PriceList => write!(f, "price_list"),
            CostSource::Estimated => write!(f, "estimated"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CostLine {
    pub article: String,
    pub quantity: i64,
    pub unit_cost: Kopecks,
    pub source: CostSource,
}

#[derive(Debug, Clone, Default)]
pub struct CostBreakdown {
    pub total: Kopecks,
    pub lines: Vec<CostLine>,
}

impl CostBreakdown {
    /// True when any line had to fall back to the percentage estimate.
    pub fn is_estimated(&self) -> bool {
        self.lines.iter().any(|l| l.source == CostSource::Estimated)
    }
}

/// Resolves the purchase cost of a whole order.
pub async fn purchase_cost<B: BackOfficeDatabase>(
    db: &B,
    client_id: i64,
    items: &[OrderItem],
    fallback_percent: i64,
) -> Result<CostBreakdown, BackOfficeError> {
    let mut breakdown = CostBreakdown::default();
    for item in items {
        let quantity = item.quantity.max(1);
        let (unit_cost, source) = resolve_unit_cost(db, client_id, item, fallback_percent).await?;
        breakdown.total = breakdown.total + unit_cost * quantity;
        breakdown.lines.push(CostLine { article: item.article.clone(), quantity, unit_cost, source });
    }
    Ok(breakdown)
}

async fn resolve_unit_cost<B: BackOfficeDatabase>(
    db: &B,
    client_id: i64,
    item: &OrderItem,
    fallback_percent: i64,
) -> Result<(Kopecks, CostSource), BackOfficeError> {
    if let Some(barcode) = item.primary_barcode() {
        if let Some(cost) = db.warehouse_cost(client_id, barcode).await? {
            return Ok((cost, CostSource::Warehouse));
        }
    }
    if !item.article.is_empty() {
        if let Some(cost) = db.price_list_cost(&item.article).await? {
            return Ok((cost, CostSource::PriceList));
        }
    }
    let estimate = estimated_unit_cost(item.price, fallback_percent);
    warn!(
        "💰️ No purchase cost on record for article {} (client #{client_id}); estimating {estimate} as {fallback_percent}% of the sale price",
        item.article
    );
    Ok((estimate, CostSource::Estimated))
}

/// Deterministic last-resort cost: a percentage of the sale price, in integer arithmetic.
pub fn estimated_unit_cost(sale_price: Kopecks, percent: i64) -> Kopecks {
    Kopecks::from(sale_price.value() * percent / 100)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn estimate_is_integer_percentage() {
        assert_eq!(estimated_unit_cost(Kopecks::from(100_000), 70), Kopecks::from(70_000));
        assert_eq!(estimated_unit_cost(Kopecks::from(999), 70), Kopecks::from(699));
        assert_eq!(estimated_unit_cost(Kopecks::from(0), 70), Kopecks::from(0));
    }
}
