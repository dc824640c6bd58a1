use crate::util;
use crate::vojo::create_migration_task_req::CreateMigrationTaskReq;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqlitePool;
use sqlx::types::chrono::DateTime;
use sqlx::Error;
use sqlx::FromRow;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
            TaskStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, FromRow, Serialize, Clone)]
pub struct MigrationTaskDao {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub source_id: i64,
    pub target_id: i64,
    pub source_table: String,
    pub target_table: String,
    pub mapping_config: Option<String>,
    pub filter_condition: Option<String>,
    pub status: TaskStatus,
    pub progress: i32,
    pub total_rows: i64,
    pub processed_rows: i64,
    pub error_message: Option<String>,
    #[serde(with = "util::option")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "util::option")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(with = "util")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "util::option")]
    pub updated_at: Option<DateTime<Utc>>,
}

const SELECT_COLUMNS: &str = r#"
    SELECT
        id,
        name,
        description,
        source_id,
        target_id,
        source_table,
        target_table,
        mapping_config,
        filter_condition,
        status,
        progress,
        total_rows,
        processed_rows,
        error_message,
        started_at,
        completed_at,
        created_at,
        updated_at
    FROM migration_task
"#;

impl MigrationTaskDao {
    pub async fn create_task(
        pool: &SqlitePool,
        task: &CreateMigrationTaskReq,
    ) -> Result<i64, Error> {
        let result = sqlx::query(
            r#"
            INSERT INTO migration_task (
                name,
                description,
                source_id,
                target_id,
                source_table,
                target_table,
                mapping_config,
                filter_condition
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.source_id)
        .bind(task.target_id)
        .bind(&task.source_table)
        .bind(&task.target_table)
        .bind(&task.mapping_config)
        .bind(&task.filter_condition)
        .execute(pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    pub async fn get_task(
        pool: &SqlitePool,
        task_id: i64,
    ) -> Result<Option<MigrationTaskDao>, Error> {
        sqlx::query_as(&format!("{} WHERE id = ?", SELECT_COLUMNS))
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn fetch_tasks(
        pool: &SqlitePool,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<MigrationTaskDao>, Error> {
        sqlx::query_as(&format!("{} ORDER BY id LIMIT ? OFFSET ?", SELECT_COLUMNS))
            .bind(limit)
            .bind(skip)
            .fetch_all(pool)
            .await
    }

    /// Counts tasks that read from or write to the data source.
    pub async fn count_by_datasource(pool: &SqlitePool, datasource_id: i64) -> Result<i64, Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM migration_task WHERE source_id = ? OR target_id = ?")
            .bind(datasource_id)
            .bind(datasource_id)
            .fetch_one(pool)
            .await
    }

    /// Rewrites the user-editable definition. Execution fields are untouched.
    pub async fn update_definition(
        pool: &SqlitePool,
        task: &MigrationTaskDao,
    ) -> Result<u64, Error> {
        let result = sqlx::query(
            r#"
            UPDATE migration_task SET
                name = ?,
                description = ?,
                source_id = ?,
                target_id = ?,
                source_table = ?,
                target_table = ?,
                mapping_config = ?,
                filter_condition = ?,
                updated_at = ?
            WHERE id = ? AND status <> 'running'
            "#,
        )
        .bind(&task.name)
        .bind(&task.description)
        .bind(task.source_id)
        .bind(task.target_id)
        .bind(&task.source_table)
        .bind(&task.target_table)
        .bind(&task.mapping_config)
        .bind(&task.filter_condition)
        .bind(Utc::now())
        .bind(task.id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }

    pub async fn delete_task(pool: &SqlitePool, task_id: i64) -> Result<u64, Error> {
        let result = sqlx::query("DELETE FROM migration_task WHERE id = ? AND status <> 'running'")
            .bind(task_id)
            .execute(pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// pending -> running. Returns false when the task was not pending.
    pub async fn mark_running(pool: &SqlitePool, task_id: i64) -> Result<bool, Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE migration_task SET
                status = 'running',
                progress = 0,
                total_rows = 0,
                processed_rows = 0,
                error_message = NULL,
                started_at = ?,
                completed_at = NULL,
                updated_at = ?
            WHERE id = ? AND status = 'pending'
            "#,
        )
        .bind(now)
        .bind(now)
        .bind(task_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// running -> cancelled. Returns false when the task was not running.
    pub async fn mark_cancelled(pool: &SqlitePool, task_id: i64) -> Result<bool, Error> {
        Self::finish(pool, task_id, TaskStatus::Cancelled, None, None).await
    }

    pub async fn mark_completed(
        pool: &SqlitePool,
        task_id: i64,
        processed_rows: i64,
    ) -> Result<bool, Error> {
        Self::finish(pool, task_id, TaskStatus::Completed, Some(processed_rows), None).await
    }

    pub async fn mark_failed(
        pool: &SqlitePool,
        task_id: i64,
        error_message: &str,
    ) -> Result<bool, Error> {
        Self::finish(pool, task_id, TaskStatus::Failed, None, Some(error_message)).await
    }

    pub async fn set_total_rows(
        pool: &SqlitePool,
        task_id: i64,
        total_rows: i64,
    ) -> Result<bool, Error> {
        let result = sqlx::query(
            "UPDATE migration_task SET total_rows = ?, updated_at = ? WHERE id = ? AND status = 'running'",
        )
        .bind(total_rows)
        .bind(Utc::now())
        .bind(task_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Moves a running task to a terminal status. Completion also sets
    /// processed_rows and progress 100.
    async fn finish(
        pool: &SqlitePool,
        task_id: i64,
        status: TaskStatus,
        processed_rows: Option<i64>,
        error_message: Option<&str>,
    ) -> Result<bool, Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE migration_task SET
                status = ?,
                processed_rows = COALESCE(?, processed_rows),
                progress = CASE WHEN ? = 'completed' THEN 100 ELSE progress END,
                error_message = COALESCE(?, error_message),
                completed_at = ?,
                updated_at = ?
            WHERE id = ? AND status = 'running'
            "#,
        )
        .bind(status)
        .bind(processed_rows)
        .bind(status)
        .bind(error_message)
        .bind(now)
        .bind(now)
        .bind(task_id)
        .execute(pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Fails tasks left running by a previous process; their jobs are gone.
    pub async fn fail_interrupted(pool: &SqlitePool) -> Result<u64, Error> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            UPDATE migration_task SET
                status = 'failed',
                error_message = 'interrupted by service restart',
                completed_at = ?,
                updated_at = ?
            WHERE status = 'running'
            "#,
        )
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::test_support::memory_pool;

    fn request(name: &str) -> CreateMigrationTaskReq {
        serde_json::from_value(serde_json::json!({
            "name": name,
            "source_id": 1,
            "target_id": 2,
            "source_table": "users",
            "target_table": "users_copy",
            "filter_condition": "age > 18",
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_new_task_is_pending_with_zero_counters() {
        let pool = memory_pool().await;
        let id = MigrationTaskDao::create_task(&pool, &request("t"))
            .await
            .unwrap();
        let task = MigrationTaskDao::get_task(&pool, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.progress, 0);
        assert_eq!(task.total_rows, 0);
        assert_eq!(task.filter_condition.as_deref(), Some("age > 18"));
        assert!(task.started_at.is_none());
    }

    #[tokio::test]
    async fn test_guarded_transitions() {
        let pool = memory_pool().await;
        let id = MigrationTaskDao::create_task(&pool, &request("t"))
            .await
            .unwrap();

        assert!(!MigrationTaskDao::mark_cancelled(&pool, id).await.unwrap());
        assert!(MigrationTaskDao::mark_running(&pool, id).await.unwrap());
        assert!(!MigrationTaskDao::mark_running(&pool, id).await.unwrap());
        assert!(MigrationTaskDao::set_total_rows(&pool, id, 42).await.unwrap());
        assert!(MigrationTaskDao::mark_completed(&pool, id, 42).await.unwrap());

        let task = MigrationTaskDao::get_task(&pool, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.processed_rows, 42);
        assert!(task.started_at.is_some());
        assert!(task.completed_at.is_some());

        // Terminal states do not move again.
        assert!(!MigrationTaskDao::mark_failed(&pool, id, "late").await.unwrap());
    }

    #[tokio::test]
    async fn test_cancelled_task_is_not_overwritten_by_completion() {
        let pool = memory_pool().await;
        let id = MigrationTaskDao::create_task(&pool, &request("t"))
            .await
            .unwrap();
        MigrationTaskDao::mark_running(&pool, id).await.unwrap();
        assert!(MigrationTaskDao::mark_cancelled(&pool, id).await.unwrap());
        assert!(!MigrationTaskDao::mark_completed(&pool, id, 10).await.unwrap());

        let task = MigrationTaskDao::get_task(&pool, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Cancelled);
        assert_eq!(task.progress, 0);
    }

    #[tokio::test]
    async fn test_running_task_cannot_be_edited_or_deleted() {
        let pool = memory_pool().await;
        let id = MigrationTaskDao::create_task(&pool, &request("t"))
            .await
            .unwrap();
        MigrationTaskDao::mark_running(&pool, id).await.unwrap();

        let mut task = MigrationTaskDao::get_task(&pool, id).await.unwrap().unwrap();
        task.name = "renamed".to_string();
        assert_eq!(MigrationTaskDao::update_definition(&pool, &task).await.unwrap(), 0);
        assert_eq!(MigrationTaskDao::delete_task(&pool, id).await.unwrap(), 0);
        assert_eq!(MigrationTaskDao::count_by_datasource(&pool, 2).await.unwrap(), 1);

        assert_eq!(MigrationTaskDao::fail_interrupted(&pool).await.unwrap(), 1);
        let task = MigrationTaskDao::get_task(&pool, id).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(MigrationTaskDao::delete_task(&pool, id).await.unwrap(), 1);
    }
}
