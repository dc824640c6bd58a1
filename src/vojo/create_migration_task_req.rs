use crate::common::app_error::AppError;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct CreateMigrationTaskReq {
    pub name: String,
    pub description: Option<String>,
    pub source_id: i64,
    pub target_id: i64,
    pub source_table: String,
    pub target_table: String,
    /// Stored verbatim, never interpreted.
    pub mapping_config: Option<String>,
    pub filter_condition: Option<String>,
}

impl CreateMigrationTaskReq {
    pub fn validate(&self) -> Result<(), AppError> {
        validate_definition(&self.name, &self.source_table, &self.target_table)
    }
}

pub(crate) fn validate_definition(
    name: &str,
    source_table: &str,
    target_table: &str,
) -> Result<(), AppError> {
    if name.trim().is_empty() || name.chars().count() > 100 {
        return Err(AppError::ValidationFailed(
            "name must be between 1 and 100 characters".to_string(),
        ));
    }
    if source_table.trim().is_empty() || target_table.trim().is_empty() {
        return Err(AppError::ValidationFailed(
            "source_table and target_table must not be empty".to_string(),
        ));
    }
    Ok(())
}
