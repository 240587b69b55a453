//! The import worker: the periodic cycle that pulls orders from every configured marketplace,
//! normalizes them, and hands them to the settlement flow.
//!
//! Failure containment is layered the same way the data is: one bad order is skipped, one failing
//! marketplace does not stop the client's other marketplaces, one failing client does not stop
//! the batch. Only a database-level failure aborts a cycle.
use std::collections::HashMap;

use chrono::{Duration, Utc};
use dropship_engine::{
    db_types::{Client, Marketplace, NewOrder, Order, OrderStatusType},
    events::EventProducers,
    BackOfficeDatabase,
    OrderFlowApi,
    OrderManagement,
    SettlementStatus,
    SqliteDatabase,
};
use log::*;
use marketplace_tools::{
    ozon::OzonApi,
    wildberries::{WbAssignmentStatus, WbRawOrder, WildberriesApi},
    yandex::YandexMarketApi,
    ApiCredentials,
};
use tokio::task::JoinHandle;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    integrations::{
        assignment_candidates,
        normalize_ozon_posting,
        normalize_wb_order,
        normalize_ym_order,
        resolve_wb_status,
        WbEnrichment,
    },
};

/// Starts the import worker. Do not await the returned JoinHandle, as it will run indefinitely.
pub fn start_import_worker(
    db: SqliteDatabase,
    producers: EventProducers,
    config: ServerConfig,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(config.import_interval);
        let api = OrderFlowApi::new(db.clone(), producers);
        info!("🕰️ Order import worker started (every {:?})", config.import_interval);
        loop {
            timer.tick().await;
            info!("🕰️ Running order import cycle");
            match run_import_cycle(&db, &api, &config).await {
                Ok(stats) => info!("🕰️ Import cycle complete: {stats}"),
                Err(e) => error!("🕰️ Import cycle aborted: {e}"),
            }
        }
    })
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CycleStats {
    pub clients_processed: u64,
    pub clients_skipped: u64,
    pub orders_imported: u64,
    pub orders_settled: u64,
    pub orders_unsettled: u64,
    pub statuses_refreshed: u64,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} clients ({} skipped), {} orders imported, {} settled, {} left unsettled, {} statuses refreshed",
            self.clients_processed,
            self.clients_skipped,
            self.orders_imported,
            self.orders_settled,
            self.orders_unsettled,
            self.statuses_refreshed
        )
    }
}

/// One full pass over all active clients.
pub async fn run_import_cycle(
    db: &SqliteDatabase,
    api: &OrderFlowApi<SqliteDatabase>,
    config: &ServerConfig,
) -> Result<CycleStats, ServerError> {
    // a failure here is database unavailability: the one thing that does abort the batch
    let clients = db.fetch_active_clients().await?;
    let mut stats = CycleStats::default();
    for client in clients {
        match import_for_client(db, api, config, &client).await {
            Ok(Some(client_stats)) => {
                stats.clients_processed += 1;
                stats.orders_imported += client_stats.orders_imported;
                stats.orders_settled += client_stats.orders_settled;
                stats.orders_unsettled += client_stats.orders_unsettled;
                stats.statuses_refreshed += client_stats.statuses_refreshed;
            },
            Ok(None) => stats.clients_skipped += 1,
            Err(e) => {
                // contained: the other clients still run
                error!("📦️ Import failed for client #{}: {e}", client.id);
                stats.clients_processed += 1;
            },
        }
    }
    Ok(stats)
}

/// Imports every marketplace the client has credentials for. Returns `None` for unconfigured
/// clients — an expected state, not an error.
async fn import_for_client(
    db: &SqliteDatabase,
    api: &OrderFlowApi<SqliteDatabase>,
    config: &ServerConfig,
    client: &Client,
) -> Result<Option<CycleStats>, ServerError> {
    let credentials = match ApiCredentials::parse(&client.api_keys) {
        Ok(c) => c,
        Err(e) => {
            warn!("📦️ Client #{} has an unreadable api_keys blob: {e}. Skipping.", client.id);
            return Ok(None);
        },
    };
    if credentials.is_empty() {
        debug!("📦️ Client #{} has no marketplace credentials configured. Skipping.", client.id);
        return Ok(None);
    }
    let mut stats = CycleStats::default();
    if let Some(wb) = &credentials.wildberries {
        if let Err(e) = import_wildberries(db, api, config, client, wb, &mut stats).await {
            log_marketplace_failure(client.id, Marketplace::Wildberries, &e);
        }
    }
    if let Some(ozon) = &credentials.ozon {
        if let Err(e) = import_ozon(api, config, client, ozon, &mut stats).await {
            log_marketplace_failure(client.id, Marketplace::Ozon, &e);
        }
    }
    if let Some(ym) = &credentials.yandex_market {
        if let Err(e) = import_yandex(api, config, client, ym, &mut stats).await {
            log_marketplace_failure(client.id, Marketplace::YandexMarket, &e);
        }
    }
    Ok(Some(stats))
}

fn log_marketplace_failure(client_id: i64, marketplace: Marketplace, e: &ServerError) {
    match e {
        ServerError::MarketplaceError(me) if me.is_permission_scope() => {
            // distinct from bad credentials on purpose: the fix is a token with the right
            // permission class, not a password reset
            error!(
                "📦️ {marketplace} rejected client #{client_id}'s token for missing permission scope. Reissue the \
                 token with the Marketplace category enabled. {me}"
            );
        },
        _ => error!("📦️ {marketplace} import failed for client #{client_id}: {e}"),
    }
}

async fn import_wildberries(
    db: &SqliteDatabase,
    api: &OrderFlowApi<SqliteDatabase>,
    config: &ServerConfig,
    client: &Client,
    credentials: &marketplace_tools::WildberriesCredentials,
    stats: &mut CycleStats,
) -> Result<(), ServerError> {
    let wb_api = WildberriesApi::new(credentials, config.marketplace.clone())?;
    let raw_orders = wb_api.fetch_new_orders().await?;
    debug!("📦️ Client #{}: {} new WB assembly tasks", client.id, raw_orders.len());

    let ids: Vec<String> = raw_orders.iter().filter_map(|r| r.id.map(|v| v.to_string())).collect();
    // statuses and client details are enrichment: fetched concurrently, degraded to empty on error
    let (statuses, details) =
        futures::future::join(wb_api.fetch_statuses(&ids), wb_api.fetch_order_details(&ids)).await;
    let statuses = statuses.unwrap_or_else(|e| {
        warn!("📦️ Could not fetch WB statuses for client #{}: {e}", client.id);
        Vec::new()
    });
    let details = details.unwrap_or_else(|e| {
        debug!("📦️ Could not fetch WB client details for client #{}: {e}", client.id);
        Vec::new()
    });
    let status_map: HashMap<String, &WbAssignmentStatus> =
        statuses.iter().filter_map(|s| s.id.map(|id| (id.to_string(), s))).collect();
    let details_map: HashMap<String, _> =
        details.iter().filter_map(|d| d.id.map(|id| (id.to_string(), d))).collect();

    let nm_ids: Vec<i64> = raw_orders.iter().filter_map(|r| r.nm_id).collect();
    let today = Utc::now().date_naive();
    let meta = wb_api.fetch_product_meta(&nm_ids, today, today).await;

    for raw in &raw_orders {
        let assignment_key = raw.id.map(|v| v.to_string()).unwrap_or_default();
        let enrichment = WbEnrichment {
            assignment: status_map.get(&assignment_key).copied(),
            details: details_map.get(&assignment_key).copied(),
            meta: raw.nm_id.and_then(|nm| meta.get(&nm)),
        };
        match normalize_wb_order(raw, &enrichment, client.id, config.stale_delivered_after) {
            Ok(order) => process_order(api, order, stats).await,
            Err(e) => warn!("📦️ Skipping a WB payload for client #{}: {e}", client.id),
        }
    }

    stats.statuses_refreshed += refresh_wb_statuses(db, api, &wb_api, client, config).await?;
    Ok(())
}

/// Re-polls the marketplace for the current status of open orders so that shipped/delivered/
/// cancelled transitions land even when the order never passes through the new-orders feed again.
async fn refresh_wb_statuses(
    db: &SqliteDatabase,
    api: &OrderFlowApi<SqliteDatabase>,
    wb_api: &WildberriesApi,
    client: &Client,
    config: &ServerConfig,
) -> Result<u64, ServerError> {
    let open = db.fetch_open_orders(client.id, Marketplace::Wildberries, config.open_order_window).await?;
    if open.is_empty() {
        return Ok(0);
    }
    let candidates: Vec<(String, &Order)> =
        open.iter().filter_map(|o| assignment_candidates(o).map(|id| (id, o))).collect();
    if candidates.is_empty() {
        debug!("📦️ Client #{}: no open WB orders carry a pollable assembly-task id", client.id);
        return Ok(0);
    }
    let ids: Vec<String> = candidates.iter().map(|(id, _)| id.clone()).collect();
    let statuses = wb_api.fetch_statuses(&ids).await?;
    let status_map: HashMap<String, &WbAssignmentStatus> =
        statuses.iter().filter_map(|s| s.id.map(|id| (id.to_string(), s))).collect();

    let mut refreshed = 0;
    // the decision table runs with assignment signals only: there is no raw order in this path
    let no_raw = WbRawOrder::default();
    for (candidate, order) in candidates {
        let Some(assignment) = status_map.get(&candidate) else { continue };
        let (status, rule) = resolve_wb_status(
            &no_raw,
            Some(assignment),
            Utc::now() - order.created_at,
            config.stale_delivered_after,
        );
        if status == order.status || status == OrderStatusType::New {
            continue;
        }
        match api.refresh_order_status(&order.key(), status).await {
            Ok(Some(changed)) => {
                debug!("📦️ Order {} refreshed {} -> {} (rule '{rule}')", order.key(), changed.old_status, status);
                refreshed += 1;
            },
            Ok(None) => {},
            Err(e) => error!("📦️ Could not refresh status for order {}: {e}", order.key()),
        }
    }
    Ok(refreshed)
}

async fn import_ozon(
    api: &OrderFlowApi<SqliteDatabase>,
    config: &ServerConfig,
    client: &Client,
    credentials: &marketplace_tools::OzonCredentials,
    stats: &mut CycleStats,
) -> Result<(), ServerError> {
    let ozon_api = OzonApi::new(credentials, config.marketplace.clone())?;
    let since = Utc::now() - Duration::days(7);
    let postings = ozon_api.fetch_postings(since, Utc::now()).await?;
    debug!("📦️ Client #{}: {} Ozon postings", client.id, postings.len());
    for posting in &postings {
        match normalize_ozon_posting(posting, client.id, config.stale_delivered_after) {
            Ok(order) => process_order(api, order, stats).await,
            Err(e) => warn!("📦️ Skipping an Ozon posting for client #{}: {e}", client.id),
        }
    }
    Ok(())
}

async fn import_yandex(
    api: &OrderFlowApi<SqliteDatabase>,
    config: &ServerConfig,
    client: &Client,
    credentials: &marketplace_tools::YandexMarketCredentials,
    stats: &mut CycleStats,
) -> Result<(), ServerError> {
    let ym_api = YandexMarketApi::new(credentials, config.marketplace.clone())?;
    let orders = ym_api.fetch_orders().await?;
    debug!("📦️ Client #{}: {} Yandex Market orders", client.id, orders.len());
    for raw in &orders {
        match normalize_ym_order(raw, client.id, config.stale_delivered_after) {
            Ok(order) => process_order(api, order, stats).await,
            Err(e) => warn!("📦️ Skipping a Yandex Market order for client #{}: {e}", client.id),
        }
    }
    Ok(())
}

/// Runs one canonical order through the settlement flow; a per-order failure is logged, not fatal.
async fn process_order(api: &OrderFlowApi<SqliteDatabase>, order: NewOrder, stats: &mut CycleStats) {
    let key = order.key.clone();
    match api.process_imported_order(order).await {
        Ok(outcome) => {
            stats.orders_imported += 1;
            match outcome.settlement {
                SettlementStatus::Settled(_) => stats.orders_settled += 1,
                SettlementStatus::InsufficientFunds(_) => stats.orders_unsettled += 1,
                SettlementStatus::AlreadySettled | SettlementStatus::NotPayable => {},
            }
        },
        Err(e) => error!("📦️ Could not save order {key}: {e}"),
    }
}
