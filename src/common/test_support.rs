use crate::common::sql_connections::create_pool;
use crate::config::ferry_config::DatabaseConfig;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool};
use sqlx::{Connection, SqliteConnection};
use tempfile::TempDir;

/// Fresh in-memory metadata store with the schema applied.
pub async fn memory_pool() -> SqlitePool {
    let pool = create_pool(&DatabaseConfig {
        url: "sqlite::memory:".to_string(),
        ..DatabaseConfig::default()
    })
    .await
    .unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

/// SQLite file with a `users` table of four rows, two of them aged 18+.
/// Returns the directory guard and the database path.
pub async fn sqlite_fixture() -> (TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fixture.db");
    let options = SqliteConnectOptions::new()
        .filename(&path)
        .create_if_missing(true);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    for statement in [
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL, age INTEGER)",
        "INSERT INTO users (name, age) VALUES ('alice', 31), ('bob', 17), ('carol', 45), ('dave', NULL)",
    ] {
        sqlx::query(statement).execute(&mut conn).await.unwrap();
    }
    conn.close().await.unwrap();
    (dir, path.to_string_lossy().to_string())
}
