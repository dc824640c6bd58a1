use crate::connector::DatabaseKind;
use crate::dao::datasource_dao::DataSourceDao;
use crate::util;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::chrono::DateTime;

/// Data source as returned by the API. The password never leaves the service.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct DatasourceRes {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub kind: DatabaseKind,
    pub host: String,
    pub port: i32,
    pub database: String,
    pub username: String,
    pub is_active: bool,
    #[serde(with = "util")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "util::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<DataSourceDao> for DatasourceRes {
    fn from(item: DataSourceDao) -> Self {
        Self {
            id: item.id,
            name: item.name,
            description: item.description,
            kind: item.kind,
            host: item.host,
            port: item.port,
            database: item.database_name,
            username: item.username,
            is_active: item.is_active,
            created_at: item.created_at,
            updated_at: item.updated_at,
        }
    }
}
