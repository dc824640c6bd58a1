use serde::Deserialize;
use serde_with::rust::double_option;

/// Partial update of a task definition. Status and counters are only moved
/// by start/cancel and the executor. An explicit `null` clears the nullable
/// fields.
#[derive(Deserialize, Clone, Debug, Default)]
pub struct UpdateMigrationTaskReq {
    pub name: Option<String>,
    #[serde(default, with = "double_option")]
    pub description: Option<Option<String>>,
    pub source_id: Option<i64>,
    pub target_id: Option<i64>,
    pub source_table: Option<String>,
    pub target_table: Option<String>,
    #[serde(default, with = "double_option")]
    pub mapping_config: Option<Option<String>>,
    #[serde(default, with = "double_option")]
    pub filter_condition: Option<Option<String>>,
}
