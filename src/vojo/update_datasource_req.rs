use crate::connector::DatabaseKind;
use serde::Deserialize;
use serde_with::rust::double_option;

/// Partial update; absent fields keep their stored value. An explicit
/// `null` clears `description`.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct UpdateDatasourceReq {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(alias = "db_type")]
    pub kind: Option<DatabaseKind>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub database: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}
