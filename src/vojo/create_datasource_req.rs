use crate::common::app_error::AppError;
use crate::connector::DatabaseKind;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct CreateDatasourceReq {
    pub name: String,
    pub description: Option<String>,
    #[serde(alias = "db_type")]
    pub kind: DatabaseKind,
    #[serde(default)]
    pub host: String,
    pub port: Option<u16>,
    pub database: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl CreateDatasourceReq {
    /// Port to store: the declared one, or the kind's default.
    pub fn effective_port(&self) -> u16 {
        self.port
            .filter(|port| *port != 0)
            .unwrap_or(self.kind.default_port())
    }

    pub fn validate(&self) -> Result<(), AppError> {
        validate_endpoint(
            &self.name,
            self.kind,
            &self.host,
            self.effective_port(),
            &self.database,
        )
    }
}

pub(crate) fn validate_endpoint(
    name: &str,
    kind: DatabaseKind,
    host: &str,
    port: u16,
    database: &str,
) -> Result<(), AppError> {
    if name.trim().is_empty() || name.chars().count() > 100 {
        return Err(AppError::ValidationFailed(
            "name must be between 1 and 100 characters".to_string(),
        ));
    }
    if database.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "database must not be empty".to_string(),
        ));
    }
    if kind.is_networked() {
        if host.trim().is_empty() {
            return Err(AppError::ValidationFailed(format!(
                "host is required for {} data sources",
                kind
            )));
        }
        if port == 0 {
            return Err(AppError::ValidationFailed("port must not be 0".to_string()));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_port_defaults_per_kind() {
        let req: CreateDatasourceReq = serde_json::from_value(json!({
            "name": "mssql",
            "db_type": "sqlserver",
            "host": "10.0.0.5",
            "database": "erp",
        }))
        .unwrap();
        assert_eq!(req.kind, DatabaseKind::Sqlserver);
        assert_eq!(req.effective_port(), 1433);
        assert!(req.is_active);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_networked_kinds_need_a_host() {
        let req: CreateDatasourceReq = serde_json::from_value(json!({
            "name": "m",
            "kind": "mysql",
            "database": "erp",
        }))
        .unwrap();
        assert!(matches!(req.validate(), Err(AppError::ValidationFailed(_))));
    }

    #[test]
    fn test_sqlite_needs_only_a_path() {
        let req: CreateDatasourceReq = serde_json::from_value(json!({
            "name": "local",
            "kind": "sqlite",
            "database": "/tmp/local.db",
        }))
        .unwrap();
        assert_eq!(req.effective_port(), 0);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_unknown_kind_is_rejected_by_serde() {
        let result: Result<CreateDatasourceReq, _> = serde_json::from_value(json!({
            "name": "o",
            "kind": "oracle",
            "database": "x",
        }));
        assert!(result.is_err());
    }
}
