use crate::common::common_constants::{SAMPLE_DATABASE_PATH, SAMPLE_DATASOURCE_NAME};
use crate::connector::DatabaseKind;
use crate::dao::datasource_dao::DataSourceDao;
use crate::dao::migration_task_dao::MigrationTaskDao;
use crate::vojo::create_datasource_req::CreateDatasourceReq;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::{Connection, SqliteConnection};

pub async fn init_with_error(pool: SqlitePool) -> Result<(), anyhow::Error> {
    migrate(pool.clone()).await?;
    let interrupted = MigrationTaskDao::fail_interrupted(&pool).await?;
    if interrupted > 0 {
        warn!("{} migration tasks were interrupted and marked failed", interrupted);
    }
    Ok(())
}

async fn migrate(pool: SqlitePool) -> Result<(), anyhow::Error> {
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .map_err(|e| anyhow!("{}", e))
}

/// Registers a demo SQLite data source when the store has none yet.
pub async fn init_sample_data(pool: &SqlitePool, sample_path: &str) -> Result<bool, anyhow::Error> {
    if !DataSourceDao::fetch_datasources(pool, 0, 1).await?.is_empty() {
        info!("data sources already exist, skip sample data");
        return Ok(false);
    }
    create_sample_database(sample_path).await?;

    let req = CreateDatasourceReq {
        name: SAMPLE_DATASOURCE_NAME.to_string(),
        description: Some("sample SQLite data source".to_string()),
        kind: DatabaseKind::Sqlite,
        host: String::new(),
        port: None,
        database: sample_path.to_string(),
        username: String::new(),
        password: String::new(),
        is_active: true,
    };
    let id = DataSourceDao::create(pool, &req, 0).await?;
    info!("sample data source {} created with id {}", SAMPLE_DATASOURCE_NAME, id);
    Ok(true)
}

pub async fn init_default_sample_data(pool: &SqlitePool) -> Result<bool, anyhow::Error> {
    init_sample_data(pool, SAMPLE_DATABASE_PATH).await
}

async fn create_sample_database(path: &str) -> Result<(), anyhow::Error> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await?;
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS customers (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            country TEXT,
            created_at TEXT DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(&mut conn)
    .await?;
    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM customers")
        .fetch_one(&mut conn)
        .await?;
    if existing == 0 {
        sqlx::query(
            "INSERT INTO customers (name, country) VALUES ('alice', 'fr'), ('bob', 'de'), ('carol', 'fr')",
        )
        .execute(&mut conn)
        .await?;
    }
    conn.close().await?;
    Ok(())
}
