use crate::connector::ConnectionParams;
use crate::connector::DatabaseKind;
use crate::vojo::create_datasource_req::CreateDatasourceReq;
use chrono::Utc;
use sqlx::sqlite::SqlitePool;
use sqlx::types::chrono::DateTime;
use sqlx::Error;
use sqlx::FromRow;
use std::time::Duration;

#[derive(Debug, FromRow, Clone)]
pub struct DataSourceDao {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: DatabaseKind,
    pub host: String,
    pub port: i32,
    pub database_name: String,
    pub username: String,
    pub password: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = "SELECT id, name, description, kind, host, port, database_name, \
     username, password, is_active, created_at, updated_at FROM datasource";

impl DataSourceDao {
    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, Error> {
        sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Self>, Error> {
        sqlx::query_as(&format!("{} WHERE name = ?", SELECT_COLUMNS))
            .bind(name)
            .fetch_optional(pool)
            .await
    }

    pub async fn fetch_datasources(
        pool: &SqlitePool,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<DataSourceDao>, Error> {
        sqlx::query_as(&format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COLUMNS))
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await
    }

    pub async fn create(
        pool: &SqlitePool,
        req: &CreateDatasourceReq,
        port: i32,
    ) -> Result<i64, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO datasource (
                name,
                description,
                kind,
                host,
                port,
                database_name,
                username,
                password,
                is_active
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.kind)
        .bind(&req.host)
        .bind(port)
        .bind(&req.database)
        .bind(&req.username)
        .bind(&req.password)
        .bind(req.is_active)
        .execute(pool)
        .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn update(pool: &SqlitePool, datasource: &DataSourceDao) -> Result<(), Error> {
        sqlx::query(
            r#"
            UPDATE datasource SET
                name = ?,
                description = ?,
                kind = ?,
                host = ?,
                port = ?,
                database_name = ?,
                username = ?,
                password = ?,
                is_active = ?,
                updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&datasource.name)
        .bind(&datasource.description)
        .bind(datasource.kind)
        .bind(&datasource.host)
        .bind(datasource.port)
        .bind(&datasource.database_name)
        .bind(&datasource.username)
        .bind(&datasource.password)
        .bind(datasource.is_active)
        .bind(Utc::now())
        .bind(datasource.id)
        .execute(pool)
        .await?;
        Ok(())
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM datasource WHERE id = ?")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub fn connection_params(&self, connect_timeout: Duration) -> ConnectionParams {
        let port = u16::try_from(self.port)
            .ok()
            .filter(|port| *port != 0)
            .unwrap_or(self.kind.default_port());
        ConnectionParams {
            kind: self.kind,
            host: self.host.clone(),
            port,
            database: self.database_name.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            connect_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::memory_pool;

    fn request(name: &str) -> CreateDatasourceReq {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "kind": "mysql",
            "host": "db.internal",
            "database": "sales",
            "username": "etl",
            "password": "pw",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_find_update_delete() {
        let pool = memory_pool().await;
        let id = DataSourceDao::create(&pool, &request("sales"), 3306)
            .await
            .unwrap();

        let mut found = DataSourceDao::find_by_id(&pool, id).await.unwrap().unwrap();
        assert_eq!(found.name, "sales");
        assert_eq!(found.kind, DatabaseKind::Mysql);
        assert!(found.is_active);
        assert!(found.updated_at.is_none());

        found.host = "db2.internal".to_string();
        DataSourceDao::update(&pool, &found).await.unwrap();
        let found = DataSourceDao::find_by_name(&pool, "sales")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.host, "db2.internal");
        assert!(found.updated_at.is_some());

        assert_eq!(DataSourceDao::delete(&pool, id).await.unwrap(), 1);
        assert!(DataSourceDao::find_by_id(&pool, id).await.unwrap().is_none());
        assert_eq!(DataSourceDao::delete(&pool, id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_duplicate_name_is_unique_violation() {
        let pool = memory_pool().await;
        DataSourceDao::create(&pool, &request("dup"), 3306)
            .await
            .unwrap();
        let err = DataSourceDao::create(&pool, &request("dup"), 3306)
            .await
            .unwrap_err();
        let is_unique = matches!(&err, Error::Database(db_err) if db_err.is_unique_violation());
        assert!(is_unique, "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_paging() {
        let pool = memory_pool().await;
        for name in ["a", "b", "c"] {
            DataSourceDao::create(&pool, &request(name), 3306)
                .await
                .unwrap();
        }
        let page = DataSourceDao::fetch_datasources(&pool, 1, 1).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "b");
    }

    #[tokio::test]
    async fn test_connection_params_fall_back_to_default_port() {
        let pool = memory_pool().await;
        let id = DataSourceDao::create(&pool, &request("p"), 0).await.unwrap();
        let found = DataSourceDao::find_by_id(&pool, id).await.unwrap().unwrap();
        let params = found.connection_params(Duration::from_secs(3));
        assert_eq!(params.port, 3306);
        assert_eq!(params.database, "sales");
        assert_eq!(params.connect_timeout, Duration::from_secs(3));
    }
}
