use crate::connector::dialect::Dialect;
use crate::connector::filter::FilterValue;
use crate::connector::{
    prepare_count, with_timeout, ColumnDescriptor, ConnectionParams, Connector, ConnectorError,
    DatabaseKind, TableInfo,
};
use async_trait::async_trait;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::sqlite::SqliteRow;
use sqlx::Connection;
use sqlx::Row;
use sqlx::SqliteConnection;

/// SQLite data source. `database` is the path of an existing database file.
pub struct SqliteConnector {
    params: ConnectionParams,
}

impl SqliteConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    async fn connect(&self) -> Result<SqliteConnection, ConnectorError> {
        let options = SqliteConnectOptions::new()
            .filename(&self.params.database)
            .create_if_missing(false)
            .read_only(true);
        with_timeout(self.params.connect_timeout, async {
            SqliteConnection::connect_with(&options)
                .await
                .map_err(ConnectorError::connection)
        })
        .await
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlite
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let mut conn = self.connect().await?;
        // Opening never reads the file; touching the schema does.
        sqlx::query("SELECT count(*) FROM sqlite_master")
            .execute(&mut conn)
            .await
            .map_err(ConnectorError::connection)?;
        conn.close().await.map_err(ConnectorError::connection)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            r"SELECT name FROM sqlite_master
              WHERE type = 'table' AND name NOT LIKE 'sqlite\_%' ESCAPE '\'
              ORDER BY name",
        )
        .fetch_all(&mut conn)
        .await
        .map_err(ConnectorError::query)?;
        let _ = conn.close().await;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>(0)
                    .map(TableInfo::table)
                    .map_err(ConnectorError::query)
            })
            .collect()
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<ColumnDescriptor>, ConnectorError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(
            r#"SELECT name, type, "notnull", dflt_value, pk FROM pragma_table_info(?) ORDER BY cid"#,
        )
        .bind(table_name)
        .fetch_all(&mut conn)
        .await
        .map_err(ConnectorError::query)?;
        let _ = conn.close().await;

        if rows.is_empty() {
            return Err(ConnectorError::UnknownTable(table_name.to_string()));
        }
        rows.iter()
            .map(|row: &SqliteRow| -> Result<ColumnDescriptor, sqlx::Error> {
                Ok(ColumnDescriptor {
                    column_name: row.try_get("name")?,
                    data_type: row.try_get("type")?,
                    is_nullable: row.try_get::<i64, _>("notnull")? == 0,
                    default_value: row.try_get("dflt_value")?,
                    is_primary_key: row.try_get::<i64, _>("pk")? > 0,
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(ConnectorError::query)
    }

    async fn count_rows(
        &self,
        table_name: &str,
        filter: Option<&str>,
    ) -> Result<i64, ConnectorError> {
        let count_query = prepare_count(self, Dialect::Sqlite, table_name, filter).await?;
        let mut conn = self.connect().await?;
        let mut query = sqlx::query_scalar::<_, i64>(&count_query.sql);
        for value in count_query.params {
            query = match value {
                FilterValue::Integer(v) => query.bind(v),
                FilterValue::Float(v) => query.bind(v),
                FilterValue::Text(v) => query.bind(v),
                FilterValue::Boolean(v) => query.bind(v),
            };
        }
        let count = query
            .fetch_one(&mut conn)
            .await
            .map_err(ConnectorError::query)?;
        let _ = conn.close().await;
        Ok(count)
    }
}
