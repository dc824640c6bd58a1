use crate::common::app_error::AppError;
use crate::common::app_state::AppState;
use crate::connector::{connector_for, ConnectionParams};
use crate::dao::datasource_dao::DataSourceDao;
use crate::dao::migration_task_dao::MigrationTaskDao;
use crate::handle_response;
use crate::service::{json_body, path_param, query_param};
use crate::vojo::create_datasource_req::{validate_endpoint, CreateDatasourceReq};
use crate::vojo::datasource_res::DatasourceRes;
use crate::vojo::page_req::PageReq;
use crate::vojo::test_connection_res::TestConnectionRes;
use crate::vojo::update_datasource_req::UpdateDatasourceReq;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use axum::response::Response;
use axum::Json;
use std::convert::Infallible;

pub async fn create_datasource(
    State(state): State<AppState>,
    payload: Result<Json<CreateDatasourceReq>, JsonRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        create_datasource_with_error(state, payload).await,
        "data source created"
    )
}
async fn create_datasource_with_error(
    state: AppState,
    payload: Result<Json<CreateDatasourceReq>, JsonRejection>,
) -> Result<DatasourceRes, AppError> {
    let req = json_body(payload)?;
    req.validate()?;
    if DataSourceDao::find_by_name(&state.db_pool, &req.name)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict(format!(
            "data source {} already exists",
            req.name
        )));
    }

    let port = req.effective_port();
    let connector = connector_for(ConnectionParams {
        kind: req.kind,
        host: req.host.clone(),
        port,
        database: req.database.clone(),
        username: req.username.clone(),
        password: req.password.clone(),
        connect_timeout: state.connect_timeout,
    });
    connector
        .ping()
        .await
        .map_err(|e| AppError::connection_failed("could not connect to data source", e))?;

    let id = DataSourceDao::create(&state.db_pool, &req, i32::from(port)).await?;
    info!("data source {} created with id {}", req.name, id);
    let created = DataSourceDao::find_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| AppError::Internal(anyhow!("data source {} vanished after insert", id)))?;
    Ok(created.into())
}

pub async fn get_datasource_list(
    State(state): State<AppState>,
    query: Result<Query<PageReq>, QueryRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_datasource_list_with_error(state, query).await,
        "data sources fetched"
    )
}
async fn get_datasource_list_with_error(
    state: AppState,
    query: Result<Query<PageReq>, QueryRejection>,
) -> Result<Vec<DatasourceRes>, AppError> {
    let (skip, limit) = query_param(query)?.bounds();
    let res = DataSourceDao::fetch_datasources(&state.db_pool, skip, limit)
        .await?
        .into_iter()
        .map(DatasourceRes::from)
        .collect();
    Ok(res)
}

pub async fn get_datasource_by_id(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_datasource_by_id_with_error(state, path).await,
        "data source fetched"
    )
}
async fn get_datasource_by_id_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<DatasourceRes, AppError> {
    let id = path_param(path)?;
    Ok(find_datasource(&state, id).await?.into())
}

pub(crate) async fn find_datasource(state: &AppState, id: i64) -> Result<DataSourceDao, AppError> {
    DataSourceDao::find_by_id(&state.db_pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("data source {} not found", id)))
}

pub async fn update_datasource(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateDatasourceReq>, JsonRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        update_datasource_with_error(state, path, payload).await,
        "data source updated"
    )
}
async fn update_datasource_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<UpdateDatasourceReq>, JsonRejection>,
) -> Result<DatasourceRes, AppError> {
    let id = path_param(path)?;
    let req = json_body(payload)?;
    let mut datasource = find_datasource(&state, id).await?;

    if let Some(name) = req.name {
        if name != datasource.name {
            if let Some(holder) = DataSourceDao::find_by_name(&state.db_pool, &name).await? {
                if holder.id != id {
                    return Err(AppError::Conflict(format!(
                        "data source {} already exists",
                        name
                    )));
                }
            }
        }
        datasource.name = name;
    }
    if let Some(description) = req.description {
        datasource.description = description;
    }
    if let Some(kind) = req.kind {
        datasource.kind = kind;
    }
    if let Some(host) = req.host {
        datasource.host = host;
    }
    if let Some(port) = req.port {
        datasource.port = i32::from(port);
    }
    if let Some(database) = req.database {
        datasource.database_name = database;
    }
    if let Some(username) = req.username {
        datasource.username = username;
    }
    if let Some(password) = req.password {
        datasource.password = password;
    }
    if let Some(is_active) = req.is_active {
        datasource.is_active = is_active;
    }

    let port = u16::try_from(datasource.port)
        .ok()
        .filter(|port| *port != 0)
        .unwrap_or(datasource.kind.default_port());
    validate_endpoint(
        &datasource.name,
        datasource.kind,
        &datasource.host,
        port,
        &datasource.database_name,
    )?;
    datasource.port = i32::from(port);

    DataSourceDao::update(&state.db_pool, &datasource).await?;
    Ok(find_datasource(&state, id).await?.into())
}

pub async fn delete_datasource_by_id(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        delete_datasource_by_id_with_error(state, path).await,
        "data source deleted"
    )
}
async fn delete_datasource_by_id_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<i64, AppError> {
    let id = path_param(path)?;
    find_datasource(&state, id).await?;
    let references = MigrationTaskDao::count_by_datasource(&state.db_pool, id).await?;
    if references > 0 {
        return Err(AppError::Conflict(format!(
            "data source {} is used by {} migration tasks",
            id, references
        )));
    }
    DataSourceDao::delete(&state.db_pool, id).await?;
    info!("data source {} deleted", id);
    Ok(id)
}

pub async fn test_datasource_connection(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        test_datasource_connection_with_error(state, path).await,
        "connection tested"
    )
}
async fn test_datasource_connection_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<TestConnectionRes, AppError> {
    let id = path_param(path)?;
    let datasource = find_datasource(&state, id).await?;
    let connector = connector_for(datasource.connection_params(state.connect_timeout));
    Ok(TestConnectionRes {
        connected: connector.test_connection().await,
    })
}
