use crate::dao::migration_task_dao::{MigrationTaskDao, TaskStatus};
use crate::util;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug)]
pub struct TaskProgressRes {
    pub task_id: i64,
    pub status: TaskStatus,
    pub progress: i32,
    pub total_rows: i64,
    pub processed_rows: i64,
    #[serde(with = "util::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "util::option")]
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl From<MigrationTaskDao> for TaskProgressRes {
    fn from(task: MigrationTaskDao) -> Self {
        Self {
            task_id: task.id,
            status: task.status,
            progress: task.progress,
            total_rows: task.total_rows,
            processed_rows: task.processed_rows,
            started_at: task.started_at,
            completed_at: task.completed_at,
            error_message: task.error_message,
        }
    }
}
