use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::time::Duration;

use crate::config::RouteServerConfig;

pub fn connect_lazy(config: &RouteServerConfig) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(config.db_acquire_timeout_seconds))
        .connect_lazy(&config.database_url)
        .context("Failed to create lazy database pool for the route store")
}
