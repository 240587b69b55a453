use log::*;

use crate::{
    db_types::{Marketplace, NewPriceChange, PricingSettings, ProductSnapshot},
    pricing::{self, PriceResult},
    traits::{BackOfficeError, PricingStore},
};

/// One product the automation loop should act on, with the computed recommendation.
#[derive(Debug, Clone)]
pub struct PriceCheck {
    pub product: ProductSnapshot,
    pub result: PriceResult,
}

/// Read side of the pricing automation: recompute recommendations for a client's cached products
/// and record what was done. Pushing prices upstream is the worker's job.
pub struct PricingApi<B> {
    db: B,
}

impl<B> PricingApi<B>
where B: PricingStore
{
    pub fn new(db: B) -> Self {
        Self { db }
    }

    pub async fn settings(
        &self,
        client_id: i64,
        marketplace: Marketplace,
    ) -> Result<Option<PricingSettings>, BackOfficeError> {
        self.db.fetch_pricing_settings(client_id, marketplace).await
    }

    /// Recomputes the optimal price for every active cached product of the client and returns the
    /// ones whose listing has drifted or that need a promotion decision. Products with infeasible
    /// settings or no resolvable purchase price are logged and skipped, never fatal to the pass.
    pub async fn products_needing_update(
        &self,
        client_id: i64,
        settings: &PricingSettings,
    ) -> Result<Vec<PriceCheck>, BackOfficeError> {
        let products = self.db.fetch_active_products(client_id).await?;
        let mut checks = Vec::new();
        for product in products {
            match pricing::calculate_optimal_price(&product, settings) {
                Ok(result) => {
                    if pricing::needs_update(&product, &result) {
                        checks.push(PriceCheck { product, result });
                    }
                },
                Err(e) => {
                    warn!(
                        "🧮️ Skipping product {} (client #{client_id}) in this pricing pass: {e}",
                        product.external_id
                    );
                },
            }
        }
        debug!("🧮️ Client #{client_id}: {} of the active products need a price action", checks.len());
        Ok(checks)
    }

    /// Records an applied change in the audit log and refreshes the cached listing price.
    pub async fn record_applied_change(
        &self,
        check: &PriceCheck,
        reason: &str,
        source: &str,
    ) -> Result<(), BackOfficeError> {
        let record = NewPriceChange {
            client_id: check.product.client_id,
            external_id: check.product.external_id,
            article: check.product.article.clone(),
            old_price: check.product.current_price,
            new_price: check.result.final_price,
            calculated_price: check.result.final_price,
            margin_percent: check.result.actual_margin,
            logistics_cost: check.result.logistics_cost,
            commission_percent: check.product.commission_percent,
            change_reason: reason.to_string(),
            change_source: source.to_string(),
        };
        self.db.record_price_change(record).await?;
        self.db.update_cached_price(check.product.client_id, check.product.external_id, check.result.final_price).await?;
        Ok(())
    }

    /// Records a promotion exit and clears the cached promotion state.
    pub async fn record_promotion_exit(&self, check: &PriceCheck) -> Result<(), BackOfficeError> {
        let record = NewPriceChange {
            client_id: check.product.client_id,
            external_id: check.product.external_id,
            article: check.product.article.clone(),
            old_price: check.product.current_price,
            new_price: check.product.current_price,
            calculated_price: check.result.final_price,
            margin_percent: check.result.actual_margin,
            logistics_cost: check.result.logistics_cost,
            commission_percent: check.product.commission_percent,
            change_reason: "promotion_exit".to_string(),
            change_source: "automation".to_string(),
        };
        self.db.record_price_change(record).await?;
        self.db.set_promotion_state(check.product.client_id, check.product.external_id, false, 0.0).await?;
        Ok(())
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}
