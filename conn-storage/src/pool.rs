use std::time::Duration;

use anyhow::Context;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool};
use tracing::info;

pub async fn open_pool(
    url: &str,
    max_size: u32,
    min_idle: u32,
) -> anyhow::Result<MySqlPool> {
    MySqlPoolOptions::new()
        .max_connections(max_size)
        .min_connections(min_idle)
        .acquire_timeout(Duration::from_secs(10))
        .connect(url)
        .await
        .context("failed to open the connector resource database")
}

/// Applies the embedded `migrations/` directory.
pub async fn migrate(pool: &MySqlPool) -> anyhow::Result<()> {
    info!("running connector resource migrations");
    sqlx::migrate!()
        .run(pool)
        .await
        .context("failed to migrate the connector resource database")
}
