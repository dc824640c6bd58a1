use crate::common::app_error::AppError;
use crate::common::app_state::AppState;
use crate::connector::{connector_for, ColumnDescriptor, TableInfo};
use crate::handle_response;
use crate::service::datasource_service::find_datasource;
use crate::service::path_param;
use axum::extract::rejection::PathRejection;
use axum::extract::Path;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::response::Response;
use std::convert::Infallible;

pub async fn get_table_list(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_table_list_with_error(state, path).await,
        "tables fetched"
    )
}
async fn get_table_list_with_error(
    state: AppState,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Vec<TableInfo>, AppError> {
    let id = path_param(path)?;
    let datasource = find_datasource(&state, id).await?;
    let connector = connector_for(datasource.connection_params(state.connect_timeout));
    Ok(connector.list_tables().await?)
}

pub async fn get_table_schema(
    State(state): State<AppState>,
    path: Result<Path<(i64, String)>, PathRejection>,
) -> Result<Response, Infallible> {
    handle_response!(
        get_table_schema_with_error(state, path).await,
        "table schema fetched"
    )
}
async fn get_table_schema_with_error(
    state: AppState,
    path: Result<Path<(i64, String)>, PathRejection>,
) -> Result<Vec<ColumnDescriptor>, AppError> {
    let (id, table_name) = path_param(path)?;
    let datasource = find_datasource(&state, id).await?;
    let connector = connector_for(datasource.connection_params(state.connect_timeout));
    Ok(connector.describe_table(&table_name).await?)
}
