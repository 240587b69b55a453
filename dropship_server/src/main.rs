use std::sync::Arc;

use dropship_engine::{events::EventHandlers, SqliteDatabase};
use dropship_server::{
    config::ServerConfig,
    errors::ServerError,
    import_worker::start_import_worker,
    notifier::{default_event_hooks, LogNotifier, Notifier},
    pricing_worker::start_pricing_worker,
};
use log::*;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    dotenvy::dotenv().ok();
    env_logger::init();
    let config = ServerConfig::from_env_or_default();
    info!("🚀️ Starting the dropship back office");

    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not open the database: {e}")))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed: {e}")))?;
    info!("🚀️ Database ready at {}", config.database_url);

    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);
    let hooks = default_event_hooks(db.clone(), notifier);
    let handlers = EventHandlers::new(config.event_buffer_size, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let import_worker = start_import_worker(db.clone(), producers, config.clone());
    let pricing_worker = start_pricing_worker(db, config);
    info!("🚀️ Workers running. Press Ctrl-C to stop.");

    tokio::signal::ctrl_c().await?;
    info!("🚀️ Shutting down");
    import_worker.abort();
    pricing_worker.abort();
    Ok(())
}
