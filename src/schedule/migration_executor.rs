//! Background runner for started migration tasks.
//!
//! Each started task gets a job with its own [`CancellationToken`]. The job
//! walks a fixed list of phases (wait for a slot, load, test source, test
//! target, count, complete) and checks the token at every boundary; a phase
//! in flight is abandoned as soon as the token fires. Status writes are
//! guarded on `status = 'running'`, so a cancel recorded by the API always
//! wins over a late completion.

use crate::common::app_error::AppError;
use crate::config::ferry_config::MigrationConfig;
use crate::connector::connector_for;
use crate::dao::datasource_dao::DataSourceDao;
use crate::dao::migration_task_dao::{MigrationTaskDao, TaskStatus};
use crate::record_error;
use sqlx::sqlite::SqlitePool;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone)]
pub struct MigrationExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    pool: SqlitePool,
    slots: Arc<Semaphore>,
    running: Mutex<HashMap<i64, CancellationToken>>,
    task_timeout: Duration,
    connect_timeout: Duration,
}

/// Handle on a spawned job. Dropping it detaches the job.
pub struct TaskHandle {
    token: CancellationToken,
    join: JoinHandle<()>,
}

impl TaskHandle {
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub async fn wait(self) {
        record_error!(self.join.await);
    }
}

#[derive(Debug)]
enum JobError {
    Cancelled,
    Failed(String),
}

impl From<sqlx::Error> for JobError {
    fn from(err: sqlx::Error) -> Self {
        error!("metadata store error during migration: {}", err);
        JobError::Failed("metadata store error".to_string())
    }
}

impl MigrationExecutor {
    pub fn new(pool: SqlitePool, config: &MigrationConfig) -> Self {
        Self {
            inner: Arc::new(ExecutorInner {
                pool,
                slots: Arc::new(Semaphore::new(config.max_concurrent_tasks.max(1))),
                running: Mutex::new(HashMap::new()),
                task_timeout: config.task_timeout(),
                connect_timeout: config.connect_timeout(),
            }),
        }
    }

    /// Launches the job for a task already marked running.
    pub fn spawn(&self, task_id: i64) -> TaskHandle {
        let token = CancellationToken::new();
        self.inner.running_jobs().insert(task_id, token.clone());

        let inner = self.inner.clone();
        let job_token = token.clone();
        let join = tokio::spawn(async move {
            let run_id = Uuid::new_v4();
            info!("migration task {} started, run {}", task_id, run_id);
            let result = match tokio::time::timeout(
                inner.task_timeout,
                run_job(&inner, task_id, &job_token),
            )
            .await
            {
                Ok(result) => result,
                Err(_) => Err(JobError::Failed(format!(
                    "timed out after {}s",
                    inner.task_timeout.as_secs()
                ))),
            };
            match result {
                Ok(total_rows) => info!(
                    "migration task {} completed, run {}, {} rows",
                    task_id, run_id, total_rows
                ),
                Err(JobError::Cancelled) => {
                    info!("migration task {} cancelled, run {}", task_id, run_id)
                }
                Err(JobError::Failed(message)) => {
                    warn!("migration task {} failed, run {}: {}", task_id, run_id, message);
                    record_error!(MigrationTaskDao::mark_failed(&inner.pool, task_id, &message).await);
                }
            }
            inner.running_jobs().remove(&task_id);
        });

        TaskHandle {
            token,
            join,
        }
    }

    /// Signals the job for `task_id`. Returns false when no job is running.
    pub fn cancel(&self, task_id: i64) -> bool {
        match self.inner.running_jobs().get(&task_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn running_count(&self) -> usize {
        self.inner.running_jobs().len()
    }

    /// Takes one job slot until the permit drops.
    #[cfg(test)]
    pub(crate) async fn occupy_slot(&self) -> tokio::sync::OwnedSemaphorePermit {
        self.inner.slots.clone().acquire_owned().await.unwrap()
    }
}

impl ExecutorInner {
    fn running_jobs(&self) -> MutexGuard<'_, HashMap<i64, CancellationToken>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Runs `fut` unless the token fires first.
async fn phase<T, F>(token: &CancellationToken, fut: F) -> Result<T, JobError>
where
    F: Future<Output = T>,
{
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(JobError::Cancelled),
        value = fut => Ok(value),
    }
}

fn connector_failure(context: &str, err: crate::connector::ConnectorError) -> JobError {
    warn!("{}: {}", context, err);
    JobError::Failed(format!("{}: {}", context, AppError::from(err)))
}

async fn run_job(
    inner: &ExecutorInner,
    task_id: i64,
    token: &CancellationToken,
) -> Result<i64, JobError> {
    let _permit = phase(token, inner.slots.clone().acquire_owned())
        .await?
        .map_err(|e| JobError::Failed(e.to_string()))?;

    let task = phase(token, MigrationTaskDao::get_task(&inner.pool, task_id))
        .await??
        .ok_or_else(|| JobError::Failed("task not found".to_string()))?;
    if task.status != TaskStatus::Running {
        return Err(JobError::Cancelled);
    }
    let source = phase(token, DataSourceDao::find_by_id(&inner.pool, task.source_id)).await??;
    let target = phase(token, DataSourceDao::find_by_id(&inner.pool, task.target_id)).await??;
    let (Some(source), Some(target)) = (source, target) else {
        return Err(JobError::Failed(
            "source or target data source not found".to_string(),
        ));
    };
    if !source.is_active || !target.is_active {
        return Err(JobError::Failed(
            "source or target data source is inactive".to_string(),
        ));
    }

    let source_connector = connector_for(source.connection_params(inner.connect_timeout));
    if !phase(token, source_connector.test_connection()).await? {
        return Err(JobError::Failed(
            "source data source connection failed".to_string(),
        ));
    }
    let target_connector = connector_for(target.connection_params(inner.connect_timeout));
    if !phase(token, target_connector.test_connection()).await? {
        return Err(JobError::Failed(
            "target data source connection failed".to_string(),
        ));
    }

    let total_rows = phase(
        token,
        source_connector.count_rows(&task.source_table, task.filter_condition.as_deref()),
    )
    .await?
    .map_err(|e| connector_failure("could not count source rows", e))?;
    phase(
        token,
        MigrationTaskDao::set_total_rows(&inner.pool, task_id, total_rows),
    )
    .await??;

    // No rows are copied: the task is recorded as fully processed.
    if !phase(
        token,
        MigrationTaskDao::mark_completed(&inner.pool, task_id, total_rows),
    )
    .await??
    {
        return Err(JobError::Cancelled);
    }
    Ok(total_rows)
}
