use crate::common::app_error::AppError;
use crate::common::app_state::AppState;
use crate::dao::datasource_dao::DataSourceDao;
use crate::dao::migration_task_dao::{MigrationTaskDao, TaskStatus};
use crate::handle_response;
use crate::service::{json_body, path_param, query_param};
use crate::vojo::create_migration_task_req::{validate_definition, CreateMigrationTaskReq};
use crate::vojo::page_req::PageReq;
use crate::vojo::task_progress_res::TaskProgressRes;
use crate::vojo::update_migration_task_req::UpdateMigrationTaskReq;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use sqlx::sqlite::SqlitePool;
use std::convert::Infallible;

async fn find_task(pool: &SqlitePool, id: i64) -> Result<MigrationTaskDao, AppError> {
    MigrationTaskDao::get_task(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("migration task {} not found", id)))
}

async fn ensure_datasources_exist(
    pool: &SqlitePool,
    source_id: i64,
    target_id: i64,
) -> Result<(), AppError> {
    for (side, id) in [("source", source_id), ("target", target_id)] {
        if DataSourceDao::find_by_id(pool, id).await?.is_none() {
            return Err(AppError::NotFound(format!(
                "{} data source {} not found",
                side, id
            )));
        }
    }
    Ok(())
}

pub async fn create_task(
    State(state): State<AppState>,
    payload: Result<Json<CreateMigrationTaskReq>, JsonRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        create_task_with_error(state, payload).await,
        "migration task created"
    )
}
async fn create_task_with_error(
    state: AppState,
    payload: Result<Json<CreateMigrationTaskReq>, JsonRejection>,
) -> Result<MigrationTaskDao, AppError> {
    let req = json_body(payload)?;
    req.validate()?;
    ensure_datasources_exist(&state.db_pool, req.source_id, req.target_id).await?;
    let id = MigrationTaskDao::create_task(&state.db_pool, &req).await?;
    info!("migration task {} created with id {}", req.name, id);
    find_task(&state.db_pool, id).await
}

pub async fn get_task_list(
    State(state): State<AppState>,
    query: Result<Query<PageReq>, QueryRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_task_list_with_error(state, query).await,
        "migration tasks fetched"
    )
}
async fn get_task_list_with_error(
    state: AppState,
    query: Result<Query<PageReq>, QueryRejection>,
) -> Result<Vec<MigrationTaskDao>, AppError> {
    let (skip, limit) = query_param(query)?.bounds();
    Ok(MigrationTaskDao::fetch_tasks(&state.db_pool, skip, limit).await?)
}

pub async fn get_task_by_id(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_task_by_id_with_error(state, path).await,
        "migration task fetched"
    )
}
async fn get_task_by_id_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<MigrationTaskDao, AppError> {
    let id = path_param(path)?;
    find_task(&state.db_pool, id).await
}

pub async fn update_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMigrationTaskReq>, JsonRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        update_task_with_error(state, path, payload).await,
        "migration task updated"
    )
}
async fn update_task_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateMigrationTaskReq>, JsonRejection>,
) -> Result<MigrationTaskDao, AppError> {
    let id = path_param(path)?;
    let req = json_body(payload)?;
    let mut task = find_task(&state.db_pool, id).await?;
    if task.status == TaskStatus::Running {
        return Err(AppError::Conflict(format!(
            "migration task {} is running",
            id
        )));
    }

    if let Some(name) = req.name {
        task.name = name;
    }
    if let Some(description) = req.description {
        task.description = description;
    }
    if let Some(source_id) = req.source_id {
        task.source_id = source_id;
    }
    if let Some(target_id) = req.target_id {
        task.target_id = target_id;
    }
    if let Some(source_table) = req.source_table {
        task.source_table = source_table;
    }
    if let Some(target_table) = req.target_table {
        task.target_table = target_table;
    }
    if let Some(mapping_config) = req.mapping_config {
        task.mapping_config = mapping_config;
    }
    if let Some(filter_condition) = req.filter_condition {
        task.filter_condition = filter_condition;
    }
    validate_definition(&task.name, &task.source_table, &task.target_table)?;
    ensure_datasources_exist(&state.db_pool, task.source_id, task.target_id).await?;

    // The row guard catches a start that raced the status check above.
    if MigrationTaskDao::update_definition(&state.db_pool, &task).await? == 0 {
        return Err(AppError::Conflict(format!(
            "migration task {} is running",
            id
        )));
    }
    find_task(&state.db_pool, id).await
}

pub async fn delete_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        delete_task_with_error(state, path).await,
        "migration task deleted"
    )
}
async fn delete_task_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<i64, AppError> {
    let id = path_param(path)?;
    find_task(&state.db_pool, id).await?;
    if MigrationTaskDao::delete_task(&state.db_pool, id).await? == 0 {
        return Err(AppError::Conflict(format!(
            "migration task {} is running",
            id
        )));
    }
    info!("migration task {} deleted", id);
    Ok(id)
}

pub async fn start_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        start_task_with_error(state, path).await,
        "migration task started"
    )
}
async fn start_task_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<TaskProgressRes, AppError> {
    let id = path_param(path)?;
    if !MigrationTaskDao::mark_running(&state.db_pool, id).await? {
        let task = find_task(&state.db_pool, id).await?;
        return Err(AppError::Conflict(format!(
            "migration task {} is not pending (status: {})",
            id, task.status
        )));
    }
    state.executor.spawn(id);
    Ok(find_task(&state.db_pool, id).await?.into())
}

pub async fn cancel_task(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        cancel_task_with_error(state, path).await,
        "migration task cancelled"
    )
}
async fn cancel_task_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<TaskProgressRes, AppError> {
    let id = path_param(path)?;
    if !MigrationTaskDao::mark_cancelled(&state.db_pool, id).await? {
        let task = find_task(&state.db_pool, id).await?;
        return Err(AppError::Conflict(format!(
            "migration task {} is not running (status: {})",
            id, task.status
        )));
    }
    if !state.executor.cancel(id) {
        debug!("migration task {} had no live job to signal", id);
    }
    Ok(find_task(&state.db_pool, id).await?.into())
}

pub async fn get_task_progress(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_task_progress_with_error(state, path).await,
        "migration task progress fetched"
    )
}
async fn get_task_progress_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<TaskProgressRes, AppError> {
    let id = path_param(path)?;
    Ok(find_task(&state.db_pool, id).await?.into())
}
