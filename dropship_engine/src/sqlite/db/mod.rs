//! # SQLite database methods
//!
//! "Low-level" SQLite interactions: plain async functions over a `&mut SqliteConnection` rather
//! than stateful structs. Callers obtain a connection from the pool, or begin a transaction and
//! pass `&mut *tx`, composing several of these calls into one atomic unit as the need arises.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod clients;
pub mod costs;
pub mod deposits;
pub mod orders;
pub mod products;
pub mod returns;

const SQLITE_DB_URL: &str = "sqlite://data/dropship_store.db";

pub fn db_url() -> String {
    let result = env::var("DSB_DATABASE_URL").unwrap_or_else(|_| {
        info!("DSB_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
