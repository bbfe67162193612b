#![cfg(feature = "runtime")]

use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, Pool, Postgres};
use tracing::info;

use crate::config::DatabaseConfig;

pub type DbPool = Pool<Postgres>;

/// Opens the warehouse pool sized by the `[database.pool]` settings.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool> {
    let url = config.connection_url()?;
    let pool = PgPoolOptions::new()
        .max_connections(config.pool.max_connections)
        .acquire_timeout(Duration::from_secs(config.pool.acquire_timeout_secs))
        .connect(&url)
        .await
        .context("failed to connect to the warehouse database")?;

    info!(
        max_connections = config.pool.max_connections,
        acquire_timeout_secs = config.pool.acquire_timeout_secs,
        "warehouse pool ready"
    );
    Ok(pool)
}

/// Applies the dimensional schema migrations embedded at compile time.
pub async fn run_migrations(pool: &DbPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("failed to apply warehouse schema migrations")
}
