use crate::connector::dialect::Dialect;
use crate::connector::filter::FilterValue;
use crate::connector::{
    prepare_count, with_timeout, ColumnDescriptor, ConnectionParams, Connector, ConnectorError,
    DatabaseKind, TableInfo,
};
use async_trait::async_trait;
use sqlx::mysql::MySqlConnectOptions;
use sqlx::mysql::MySqlRow;
use sqlx::Connection;
use sqlx::MySqlConnection;
use sqlx::Row;

// information_schema columns come back as binary strings on some servers.
const DESCRIBE_SQL: &str = r#"
    SELECT
        CAST(COLUMN_NAME AS CHAR) AS column_name,
        CAST(COLUMN_TYPE AS CHAR) AS data_type,
        CAST(IS_NULLABLE AS CHAR) AS is_nullable,
        CAST(COLUMN_DEFAULT AS CHAR) AS default_value,
        CAST(COLUMN_KEY AS CHAR) AS column_key
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

pub struct MySqlConnector {
    params: ConnectionParams,
}

impl MySqlConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    fn connect_options(&self) -> MySqlConnectOptions {
        MySqlConnectOptions::new()
            .host(&self.params.host)
            .port(self.params.port)
            .username(&self.params.username)
            .password(&self.params.password)
            .database(&self.params.database)
    }

    async fn connect(&self) -> Result<MySqlConnection, ConnectorError> {
        let options = self.connect_options();
        with_timeout(self.params.connect_timeout, async {
            MySqlConnection::connect_with(&options)
                .await
                .map_err(ConnectorError::connection)
        })
        .await
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Mysql
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let mut conn = self.connect().await?;
        conn.ping().await.map_err(ConnectorError::connection)?;
        conn.close().await.map_err(ConnectorError::connection)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError> {
        let mut conn = self.connect().await?;
        let sql_rows = sqlx::query("SHOW FULL TABLES WHERE Table_type = 'BASE TABLE'")
            .fetch_all(&mut conn)
            .await
            .map_err(ConnectorError::query)?;
        let _ = conn.close().await;

        let mut res = vec![];
        for it in sql_rows.iter() {
            let item: Vec<u8> = it.try_get::<Vec<u8>, _>(0).map_err(ConnectorError::query)?;
            res.push(TableInfo::table(
                String::from_utf8(item).map_err(ConnectorError::query)?,
            ));
        }
        Ok(res)
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<ColumnDescriptor>, ConnectorError> {
        let mut conn = self.connect().await?;
        let rows = sqlx::query(DESCRIBE_SQL)
            .bind(table_name)
            .fetch_all(&mut conn)
            .await
            .map_err(ConnectorError::query)?;
        let _ = conn.close().await;

        if rows.is_empty() {
            return Err(ConnectorError::UnknownTable(table_name.to_string()));
        }
        rows.iter()
            .map(|row: &MySqlRow| -> Result<ColumnDescriptor, sqlx::Error> {
                Ok(ColumnDescriptor {
                    column_name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get::<String, _>("is_nullable")? == "YES",
                    default_value: row.try_get("default_value")?,
                    is_primary_key: row.try_get::<String, _>("column_key")? == "PRI",
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
        let count_query = prepare_count(self, Dialect::MySql, table_name, filter).await?;
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
