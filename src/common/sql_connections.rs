use crate::config::ferry_config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub async fn create_pool(database_config: &DatabaseConfig) -> Result<SqlitePool, anyhow::Error> {
    let options = SqliteConnectOptions::from_str(&database_config.url)?
        .create_if_missing(true);
    let acquire_timeout = Duration::from_secs(database_config.acquire_timeout_secs);

    // An in-memory database lives and dies with its single connection.
    let pool = if database_config.url.contains(":memory:") {
        SqlitePoolOptions::new()
            .max_connections(1)
            .acquire_timeout(acquire_timeout)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?
    } else {
        SqlitePoolOptions::new()
            .max_connections(database_config.max_connections)
            .acquire_timeout(acquire_timeout)
            .max_lifetime(Duration::from_secs(3600))
            .idle_timeout(Duration::from_secs(600))
            .connect_with(options)
            .await?
    };

    Ok(pool)
}
