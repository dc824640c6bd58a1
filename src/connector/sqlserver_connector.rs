use crate::connector::dialect::Dialect;
use crate::connector::filter::FilterValue;
use crate::connector::{
    prepare_count, with_timeout, ColumnDescriptor, ConnectionParams, Connector, ConnectorError,
    DatabaseKind, TableInfo,
};
use async_trait::async_trait;
use tiberius::{AuthMethod, Client, Config, Query, Row};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

type SqlServerClient = Client<Compat<TcpStream>>;

// Unqualified table names resolve against the login's default schema, so
// catalog queries stay on that schema too.

const LIST_TABLES_SQL: &str = "SELECT TABLE_NAME FROM INFORMATION_SCHEMA.TABLES \
     WHERE TABLE_TYPE = 'BASE TABLE' AND TABLE_SCHEMA = SCHEMA_NAME() \
     ORDER BY TABLE_NAME";

const DESCRIBE_SQL: &str = r#"
    SELECT
        c.COLUMN_NAME,
        c.DATA_TYPE,
        c.IS_NULLABLE,
        c.COLUMN_DEFAULT,
        CAST(CASE WHEN pk.COLUMN_NAME IS NULL THEN 0 ELSE 1 END AS INT) AS IS_PRIMARY_KEY
    FROM INFORMATION_SCHEMA.COLUMNS c
    LEFT JOIN (
        SELECT ku.TABLE_SCHEMA, ku.TABLE_NAME, ku.COLUMN_NAME
        FROM INFORMATION_SCHEMA.TABLE_CONSTRAINTS tc
        JOIN INFORMATION_SCHEMA.KEY_COLUMN_USAGE ku
            ON tc.CONSTRAINT_NAME = ku.CONSTRAINT_NAME
            AND tc.TABLE_SCHEMA = ku.TABLE_SCHEMA
        WHERE tc.CONSTRAINT_TYPE = 'PRIMARY KEY'
    ) pk
        ON pk.TABLE_SCHEMA = c.TABLE_SCHEMA
        AND pk.TABLE_NAME = c.TABLE_NAME
        AND pk.COLUMN_NAME = c.COLUMN_NAME
    WHERE c.TABLE_SCHEMA = SCHEMA_NAME() AND c.TABLE_NAME = @P1
    ORDER BY c.ORDINAL_POSITION
"#;

pub struct SqlServerConnector {
    params: ConnectionParams,
}

impl SqlServerConnector {
    pub fn new(params: ConnectionParams) -> Self {
        Self { params }
    }

    fn config(&self) -> Config {
        let mut config = Config::new();
        config.host(&self.params.host);
        config.port(self.params.port);
        config.database(&self.params.database);
        config.authentication(AuthMethod::sql_server(
            &self.params.username,
            &self.params.password,
        ));
        config.trust_cert();
        config
    }

    async fn connect(&self) -> Result<SqlServerClient, ConnectorError> {
        let config = self.config();
        with_timeout(self.params.connect_timeout, async move {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(ConnectorError::connection)?;
            tcp.set_nodelay(true).map_err(ConnectorError::connection)?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(ConnectorError::connection)
        })
        .await
    }
}

fn text_column(row: &Row, index: usize) -> Result<Option<String>, ConnectorError> {
    row.try_get::<&str, _>(index)
        .map(|value| value.map(str::to_string))
        .map_err(ConnectorError::query)
}

fn required_text_column(row: &Row, index: usize) -> Result<String, ConnectorError> {
    text_column(row, index)?
        .ok_or_else(|| ConnectorError::Query(format!("column {} is unexpectedly NULL", index)))
}

#[async_trait]
impl Connector for SqlServerConnector {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Sqlserver
    }

    async fn ping(&self) -> Result<(), ConnectorError> {
        let mut client = self.connect().await?;
        client
            .simple_query("SELECT 1")
            .await
            .map_err(ConnectorError::connection)?
            .into_results()
            .await
            .map_err(ConnectorError::connection)?;
        client.close().await.map_err(ConnectorError::connection)
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError> {
        let mut client = self.connect().await?;
        let rows = client
            .simple_query(LIST_TABLES_SQL)
            .await
            .map_err(ConnectorError::query)?
            .into_first_result()
            .await
            .map_err(ConnectorError::query)?;
        let _ = client.close().await;

        rows.iter()
            .map(|row| required_text_column(row, 0).map(TableInfo::table))
            .collect()
    }

    async fn describe_table(
        &self,
        table_name: &str,
    ) -> Result<Vec<ColumnDescriptor>, ConnectorError> {
        let mut client = self.connect().await?;
        let rows = client
            .query(DESCRIBE_SQL, &[&table_name])
            .await
            .map_err(ConnectorError::query)?
            .into_first_result()
            .await
            .map_err(ConnectorError::query)?;
        let _ = client.close().await;

        if rows.is_empty() {
            return Err(ConnectorError::UnknownTable(table_name.to_string()));
        }
        rows.iter()
            .map(|row| {
                Ok(ColumnDescriptor {
                    column_name: required_text_column(row, 0)?,
                    data_type: required_text_column(row, 1)?,
                    is_nullable: text_column(row, 2)?.as_deref() == Some("YES"),
                    default_value: text_column(row, 3)?,
                    is_primary_key: row
                        .try_get::<i32, _>(4)
                        .map_err(ConnectorError::query)?
                        .unwrap_or(0)
                        == 1,
                })
            })
            .collect()
    }

    async fn count_rows(
        &self,
        table_name: &str,
        filter: Option<&str>,
    ) -> Result<i64, ConnectorError> {
        let count_query = prepare_count(self, Dialect::SqlServer, table_name, filter).await?;
        let mut client = self.connect().await?;
        let mut query = Query::new(count_query.sql);
        for value in count_query.params {
            match value {
                FilterValue::Integer(v) => query.bind(v),
                FilterValue::Float(v) => query.bind(v),
                FilterValue::Text(v) => query.bind(v),
                FilterValue::Boolean(v) => query.bind(v),
            }
        }
        let row = query
            .query(&mut client)
            .await
            .map_err(ConnectorError::query)?
            .into_row()
            .await
            .map_err(ConnectorError::query)?;
        let _ = client.close().await;

        let count = match row {
            Some(row) => row
                .try_get::<i64, _>(0)
                .map_err(ConnectorError::query)?
                .unwrap_or(0),
            None => 0,
        };
        Ok(count)
    }
}
