use crate::{
    db_types::{Marketplace, NewPriceChange, PricingSettings, ProductSnapshot},
    traits::BackOfficeError,
};

/// Storage the pricing engine and automation loop read and write: per-client settings, the cached
/// marketplace products, and the price-change audit log.
#[allow(async_fn_in_trait)]
pub trait PricingStore {
    async fn fetch_pricing_settings(
        &self,
        client_id: i64,
        marketplace: Marketplace,
    ) -> Result<Option<PricingSettings>, BackOfficeError>;

    async fn fetch_active_products(&self, client_id: i64) -> Result<Vec<ProductSnapshot>, BackOfficeError>;

    /// Writes the new listing price into the cache after a successful upstream push.
    async fn update_cached_price(&self, client_id: i64, external_id: i64, new_price: f64)
        -> Result<(), BackOfficeError>;

    async fn set_promotion_state(
        &self,
        client_id: i64,
        external_id: i64,
        in_promotion: bool,
        discount_percent: f64,
    ) -> Result<(), BackOfficeError>;

    /// Appends to the pricing audit log. Every automated change records its inputs and reason.
    async fn record_price_change(&self, record: NewPriceChange) -> Result<(), BackOfficeError>;
}
