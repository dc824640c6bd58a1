//! Connection abstraction over the supported remote database kinds.
//!
//! Every kind implements [`Connector`]; [`connector_for`] picks the
//! implementation from the declared [`DatabaseKind`]. A connector opens a
//! fresh driver connection per operation and closes it before returning.

pub mod dialect;
pub mod filter;
pub mod mysql_connector;
pub mod sqlite_connector;
pub mod sqlserver_connector;

use crate::connector::dialect::Dialect;
use crate::connector::filter::FilterValue;
use crate::connector::mysql_connector::MySqlConnector;
use crate::connector::sqlite_connector::SqliteConnector;
use crate::connector::sqlserver_connector::SqlServerConnector;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum DatabaseKind {
    Mysql,
    Sqlserver,
    Sqlite,
}

impl DatabaseKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatabaseKind::Mysql => "mysql",
            DatabaseKind::Sqlserver => "sqlserver",
            DatabaseKind::Sqlite => "sqlite",
        }
    }

    /// Port used when a data source is registered without one. SQLite has none.
    pub fn default_port(&self) -> u16 {
        match self {
            DatabaseKind::Mysql => 3306,
            DatabaseKind::Sqlserver => 1433,
            DatabaseKind::Sqlite => 0,
        }
    }

    pub fn is_networked(&self) -> bool {
        !matches!(self, DatabaseKind::Sqlite)
    }
}

impl fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatabaseKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "mysql" => Ok(DatabaseKind::Mysql),
            "sqlserver" | "mssql" => Ok(DatabaseKind::Sqlserver),
            "sqlite" => Ok(DatabaseKind::Sqlite),
            other => Err(format!("unsupported database kind: {}", other)),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConnectorError {
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("unknown table: {0}")]
    UnknownTable(String),
    #[error("invalid filter: {0}")]
    InvalidFilter(String),
    #[error("query failed: {0}")]
    Query(String),
}

impl ConnectorError {
    pub(crate) fn query(err: impl ToString) -> Self {
        ConnectorError::Query(err.to_string())
    }

    pub(crate) fn connection(err: impl ToString) -> Self {
        ConnectorError::Connection(err.to_string())
    }
}

#[derive(Clone)]
pub struct ConnectionParams {
    pub kind: DatabaseKind,
    pub host: String,
    pub port: u16,
    /// Database name, or the database file path for SQLite.
    pub database: String,
    pub username: String,
    pub password: String,
    pub connect_timeout: Duration,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("kind", &self.kind)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("username", &self.username)
            .field("connect_timeout", &self.connect_timeout)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub table_type: String,
}

impl TableInfo {
    pub fn table(name: String) -> Self {
        Self {
            name,
            table_type: "table".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub column_name: String,
    /// Driver-native type name, not normalized across kinds.
    pub data_type: String,
    pub is_nullable: bool,
    pub default_value: Option<String>,
    pub is_primary_key: bool,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    /// Opens a connection, checks it answers, and closes it.
    async fn ping(&self) -> Result<(), ConnectorError>;

    async fn test_connection(&self) -> bool {
        match self.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("{} connection test failed: {}", self.kind(), e);
                false
            }
        }
    }

    async fn list_tables(&self) -> Result<Vec<TableInfo>, ConnectorError>;

    async fn describe_table(&self, table_name: &str)
        -> Result<Vec<ColumnDescriptor>, ConnectorError>;

    async fn count_rows(
        &self,
        table_name: &str,
        filter: Option<&str>,
    ) -> Result<i64, ConnectorError>;
}

pub fn connector_for(params: ConnectionParams) -> Box<dyn Connector> {
    match params.kind {
        DatabaseKind::Mysql => Box::new(MySqlConnector::new(params)),
        DatabaseKind::Sqlserver => Box::new(SqlServerConnector::new(params)),
        DatabaseKind::Sqlite => Box::new(SqliteConnector::new(params)),
    }
}

pub(crate) async fn with_timeout<T, F>(duration: Duration, fut: F) -> Result<T, ConnectorError>
where
    F: Future<Output = Result<T, ConnectorError>>,
{
    match tokio::time::timeout(duration, fut).await {
        Ok(result) => result,
        Err(_) => Err(ConnectorError::Connection(format!(
            "timed out after {}ms",
            duration.as_millis()
        ))),
    }
}

/// A `SELECT COUNT` statement and the values to bind, in placeholder order.
#[derive(Debug)]
pub(crate) struct CountQuery {
    pub sql: String,
    pub params: Vec<FilterValue>,
}

/// Checks `table_name` against the live catalog and compiles the filter
/// against the table's columns.
pub(crate) async fn prepare_count<C>(
    connector: &C,
    dialect: Dialect,
    table_name: &str,
    filter: Option<&str>,
) -> Result<CountQuery, ConnectorError>
where
    C: Connector + ?Sized,
{
    let tables = connector.list_tables().await?;
    if !tables.iter().any(|table| table.name == table_name) {
        return Err(ConnectorError::UnknownTable(table_name.to_string()));
    }
    let mut sql = format!(
        "SELECT {} FROM {}",
        dialect.count_expression(),
        dialect.quote_ident(table_name)
    );
    let mut params = vec![];
    if let Some(filter) = filter.map(str::trim).filter(|f| !f.is_empty()) {
        let columns = connector.describe_table(table_name).await?;
        let column_names: Vec<&str> = columns.iter().map(|c| c.column_name.as_str()).collect();
        let compiled = filter::compile(filter, &column_names, dialect)?;
        sql.push_str(" WHERE ");
        sql.push_str(&compiled.sql);
        params = compiled.params;
    }
    debug!("count query: {}", sql);
    Ok(CountQuery { sql, params })
}
