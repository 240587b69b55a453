//! The pricing automation worker: recompute recommended prices for every client with pricing
//! settings, push the changed ones upstream, exit promotions when the margin math says so, and
//! leave an audit trail for every change.
use dropship_engine::{
    db_types::{Client, Marketplace},
    pricing::RecommendedAction,
    BackOfficeDatabase,
    PriceCheck,
    PricingApi,
    SqliteDatabase,
};
use log::*;
use marketplace_tools::{wildberries::WildberriesApi, ApiCredentials, PriceUpdate};
use tokio::task::JoinHandle;

use crate::{config::ServerConfig, errors::ServerError};

/// Starts the pricing worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_pricing_worker(db: SqliteDatabase, config: ServerConfig) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.pricing_interval);
        let api = PricingApi::new(db.clone());
        info!("🕰️ Pricing automation worker started (every {:?})", config.pricing_interval);
        loop {
            timer.tick().await;
            info!("🕰️ Running pricing automation pass");
            match run_pricing_pass(&db, &api, &config).await {
                Ok(stats) => info!("🕰️ Pricing pass complete: {stats}"),
                Err(e) => error!("🕰️ Pricing pass aborted: {e}"),
            }
        }
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PassStats {
    pub products_checked: u64,
    pub prices_updated: u64,
    pub promotions_exited: u64,
    pub errors: u64,
}

impl std::fmt::Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} products checked, {} prices updated, {} promotions exited, {} errors",
            self.products_checked, self.prices_updated, self.promotions_exited, self.errors
        )
    }
}

pub async fn run_pricing_pass(
    db: &SqliteDatabase,
    api: &PricingApi<SqliteDatabase>,
    config: &ServerConfig,
) -> Result<PassStats, ServerError> {
    let clients = db.fetch_active_clients().await?;
    let mut stats = PassStats::default();
    for client in clients {
        match process_client_pricing(api, config, &client).await {
            Ok(client_stats) => {
                stats.products_checked += client_stats.products_checked;
                stats.prices_updated += client_stats.prices_updated;
                stats.promotions_exited += client_stats.promotions_exited;
                stats.errors += client_stats.errors;
            },
            Err(e) => {
                error!("🧮️ Pricing pass failed for client #{}: {e}", client.id);
                stats.errors += 1;
            },
        }
    }
    Ok(stats)
}

async fn process_client_pricing(
    api: &PricingApi<SqliteDatabase>,
    config: &ServerConfig,
    client: &Client,
) -> Result<PassStats, ServerError> {
    let mut stats = PassStats::default();
    let credentials = ApiCredentials::parse(&client.api_keys).unwrap_or_default();
    let Some(wb_credentials) = &credentials.wildberries else {
        debug!("🧮️ Client #{} has no Wildberries credentials; skipping pricing", client.id);
        return Ok(stats);
    };
    let Some(settings) = api.settings(client.id, Marketplace::Wildberries).await? else {
        debug!("🧮️ Client #{} has no pricing settings; skipping", client.id);
        return Ok(stats);
    };
    let checks = api.products_needing_update(client.id, &settings).await?;
    stats.products_checked = checks.len() as u64;
    if checks.is_empty() {
        return Ok(stats);
    }
    let wb_api = WildberriesApi::new(wb_credentials, config.marketplace.clone())?;
    for check in &checks {
        match apply_price_action(api, &wb_api, check).await {
            Ok(Applied::PriceUpdated) => stats.prices_updated += 1,
            Ok(Applied::PromotionExited) => stats.promotions_exited += 1,
            Ok(Applied::Nothing) => {},
            Err(e) => {
                error!("🧮️ Could not apply price action for product {}: {e}", check.product.external_id);
                stats.errors += 1;
            },
        }
    }
    Ok(stats)
}

enum Applied {
    PriceUpdated,
    PromotionExited,
    Nothing,
}

async fn apply_price_action(
    api: &PricingApi<SqliteDatabase>,
    wb_api: &WildberriesApi,
    check: &PriceCheck,
) -> Result<Applied, ServerError> {
    match check.result.recommended_action {
        RecommendedAction::ExitPromotion => {
            wb_api.exit_promotion(check.product.external_id).await?;
            api.record_promotion_exit(check).await?;
            info!(
                "🧮️ Product {} ({}) withdrawn from its promotion: realized margin {:.1}% vs target {:.1}%",
                check.product.external_id,
                check.product.article,
                check.result.actual_margin,
                check.result.target_margin
            );
            Ok(Applied::PromotionExited)
        },
        RecommendedAction::WarningLowMargin => {
            warn!(
                "🧮️ Product {} ({}) is selling at {:.1}% margin against a {:.1}% target; auto-exit is disabled",
                check.product.external_id,
                check.product.article,
                check.result.actual_margin,
                check.result.target_margin
            );
            Ok(Applied::Nothing)
        },
        RecommendedAction::AdjustPrice | RecommendedAction::MaintainPromotion | RecommendedAction::NoChange => {
            let update =
                PriceUpdate { product_id: check.product.external_id, price: check.result.final_price };
            wb_api.push_prices(std::slice::from_ref(&update)).await?;
            api.record_applied_change(check, "auto", "automation").await?;
            info!(
                "🧮️ Product {} ({}) price {} -> {}",
                check.product.external_id,
                check.product.article,
                check.product.current_price,
                check.result.final_price
            );
            Ok(Applied::PriceUpdated)
        },
    }
}
