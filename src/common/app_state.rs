use crate::config::ferry_config::MigrationConfig;
use crate::schedule::migration_executor::MigrationExecutor;
use sqlx::Pool;
use sqlx::Sqlite;
use std::time::Duration;

#[derive(Clone)]
pub struct AppState {
    pub db_pool: Pool<Sqlite>,
    pub executor: MigrationExecutor,
    pub connect_timeout: Duration,
}

impl AppState {
    pub fn new(db_pool: Pool<Sqlite>, migration_config: &MigrationConfig) -> Self {
        let executor = MigrationExecutor::new(db_pool.clone(), migration_config);
        Self {
            db_pool,
            executor,
            connect_timeout: migration_config.connect_timeout(),
        }
    }
}
